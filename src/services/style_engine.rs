//! Per-class style records over an immutable stylesheet
//!
//! Each class keeps its base style (resolved from the sheet) apart from the
//! currently applied override, so a reset never loses the base.

use crate::domain::style::{Style, StyleClass, StyleSheet};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRecord {
    pub base: Style,
    pub applied: Option<Style>,
}

impl StyleRecord {
    pub fn effective(&self) -> Style {
        match &self.applied {
            Some(over) => self.base.merged(over),
            None => self.base.clone(),
        }
    }
}

#[derive(Debug)]
pub struct StyleEngine {
    sheet: Arc<StyleSheet>,
    /// Display names used to look classes up in the sheet
    names: FxHashMap<StyleClass, String>,
    records: FxHashMap<StyleClass, StyleRecord>,
}

impl StyleEngine {
    pub fn new(sheet: Arc<StyleSheet>) -> Self {
        Self { sheet, names: FxHashMap::default(), records: FxHashMap::default() }
    }

    pub fn sheet(&self) -> &StyleSheet {
        &self.sheet
    }

    /// Name an amenity or path-type class so its sheet entry can be found
    pub fn register_name(&mut self, class: StyleClass, name: &str) {
        self.names.insert(class, name.to_string());
    }

    /// Base style for a class straight from the sheet
    pub fn base_for(&self, class: &StyleClass) -> Style {
        let name = self.names.get(class).map(String::as_str).unwrap_or_default();
        match class {
            StyleClass::Layer(layer) => self.sheet.layer_style(layer),
            StyleClass::Amenity(_) => self.sheet.amenity_style(name),
            StyleClass::PathType(_) => self.sheet.path_type_style(name),
            StyleClass::Unit => self.sheet.default.merged(&self.sheet.units),
            StyleClass::Wayfind => self.sheet.default.merged(&self.sheet.wayfind),
            StyleClass::OutdoorWayfind => self.sheet.default.merged(&self.sheet.outdoor_wayfind),
        }
    }

    /// Style a class currently renders with
    pub fn effective(&self, class: &StyleClass) -> Style {
        match self.records.get(class) {
            Some(record) => record.effective(),
            None => self.base_for(class),
        }
    }

    pub fn record(&self, class: &StyleClass) -> Option<&StyleRecord> {
        self.records.get(class)
    }

    /// Record an override for a class and return the resulting style
    pub fn apply(&mut self, class: &StyleClass, style: Style) -> Style {
        let base = self.base_for(class);
        let record = self
            .records
            .entry(class.clone())
            .or_insert_with(|| StyleRecord { base, applied: None });
        record.applied = Some(style);
        record.effective()
    }

    /// Drop the override for a class and return its base style
    pub fn reset(&mut self, class: &StyleClass) -> Style {
        match self.records.get_mut(class) {
            Some(record) => {
                record.applied = None;
                record.base.clone()
            }
            None => self.base_for(class),
        }
    }

    /// Drop every override matching the predicate
    pub fn reset_where(&mut self, mut pred: impl FnMut(&StyleClass) -> bool) {
        for (class, record) in self.records.iter_mut() {
            if pred(class) {
                record.applied = None;
            }
        }
    }

    pub fn reset_all(&mut self) {
        self.reset_where(|_| true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AmenityId;

    fn sheet() -> Arc<StyleSheet> {
        let mut sheet = StyleSheet { default: Style::default().with_opacity(1.0), ..Default::default() };
        sheet.amenities.insert("Washroom".to_string(), Style::default().with_icon("wc"));
        Arc::new(sheet)
    }

    #[test]
    fn test_reset_restores_base() {
        let mut engine = StyleEngine::new(sheet());
        let class = StyleClass::Amenity(AmenityId(3));
        engine.register_name(class.clone(), "Washroom");

        let styled = engine.apply(&class, Style::default().with_fill("#f00"));
        assert_eq!(styled.fill_color.as_deref(), Some("#f00"));
        assert_eq!(styled.icon.as_deref(), Some("wc"));

        let base = engine.reset(&class);
        assert_eq!(base.fill_color, None);
        assert_eq!(base.icon.as_deref(), Some("wc"));
        assert_eq!(engine.record(&class).unwrap().base, base);
    }

    #[test]
    fn test_unknown_amenity_uses_default() {
        let engine = StyleEngine::new(sheet());
        let style = engine.base_for(&StyleClass::Amenity(AmenityId(9)));
        assert_eq!(style, engine.sheet().default);
    }

    #[test]
    fn test_reset_where_only_touches_matching() {
        let mut engine = StyleEngine::new(sheet());
        let amenity = StyleClass::Amenity(AmenityId(1));
        engine.apply(&amenity, Style::default().with_fill("#0f0"));
        engine.apply(&StyleClass::Unit, Style::default().with_fill("#00f"));

        engine.reset_where(|c| matches!(c, StyleClass::Amenity(_)));
        assert!(engine.record(&amenity).unwrap().applied.is_none());
        assert!(engine.record(&StyleClass::Unit).unwrap().applied.is_some());

        engine.reset_all();
        assert!(engine.record(&StyleClass::Unit).unwrap().applied.is_none());
    }
}
