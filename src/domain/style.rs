//! Style records and the stylesheet value

use crate::domain::types::{AmenityId, PathTypeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Renderable style attributes. Unset attributes inherit from the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Style {
    pub fn with_fill(mut self, color: &str) -> Self {
        self.fill_color = Some(color.to_string());
        self
    }

    pub fn with_stroke(mut self, color: &str, width: f32) -> Self {
        self.stroke_color = Some(color.to_string());
        self.stroke_width = Some(width);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity.clamp(0.0, 1.0));
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    /// Overlay `over` on top of `self`; attributes set in `over` win
    pub fn merged(&self, over: &Style) -> Style {
        Style {
            fill_color: over.fill_color.clone().or_else(|| self.fill_color.clone()),
            stroke_color: over.stroke_color.clone().or_else(|| self.stroke_color.clone()),
            opacity: over.opacity.or(self.opacity),
            stroke_width: over.stroke_width.or(self.stroke_width),
            icon: over.icon.clone().or_else(|| self.icon.clone()),
        }
    }
}

/// Class of shapes sharing one base style
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleClass {
    Layer(String),
    Amenity(AmenityId),
    PathType(PathTypeId),
    Unit,
    Wayfind,
    OutdoorWayfind,
}

/// Immutable style configuration, looked up by layer/amenity/path-type name
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleSheet {
    /// Applied beneath every other entry
    #[serde(default)]
    pub default: Style,
    #[serde(default)]
    pub layers: HashMap<String, Style>,
    #[serde(default)]
    pub amenities: HashMap<String, Style>,
    #[serde(default)]
    pub path_types: HashMap<String, Style>,
    #[serde(default)]
    pub units: Style,
    #[serde(default)]
    pub wayfind: Style,
    #[serde(default)]
    pub outdoor_wayfind: Style,
}

impl StyleSheet {
    pub fn layer_style(&self, name: &str) -> Style {
        self.layers.get(name).map_or_else(|| self.default.clone(), |s| self.default.merged(s))
    }

    pub fn amenity_style(&self, name: &str) -> Style {
        self.amenities.get(name).map_or_else(|| self.default.clone(), |s| self.default.merged(s))
    }

    pub fn path_type_style(&self, name: &str) -> Style {
        self.path_types.get(name).map_or_else(|| self.default.clone(), |s| self.default.merged(s))
    }
}
