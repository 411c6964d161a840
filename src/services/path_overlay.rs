//! Current-path overlay slot with request-token staleness checks
//!
//! Each wayfinding request is stamped with a token at issue time. A result may
//! only be written if its token is still the newest issued; clearing the
//! overlay also retires every token issued so far.

use crate::domain::error::{Result, WayfindError};
use crate::domain::types::{MapId, ShapeId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct PathOverlay {
    issued: u64,
    /// Token whose result is currently rendered
    applied: Option<u64>,
    /// Maps holding indoor path shapes
    maps: Vec<MapId>,
    outdoor: Vec<ShapeId>,
}

impl PathOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    pub fn latest(&self) -> u64 {
        self.issued
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.issued
    }

    /// Ok when `token` may write the overlay, `Superseded` otherwise
    pub fn check(&self, token: RequestToken) -> Result<()> {
        if self.is_current(token) {
            Ok(())
        } else {
            Err(WayfindError::Superseded { token: token.0, latest: self.issued })
        }
    }

    pub fn applied(&self) -> Option<u64> {
        self.applied
    }

    pub fn mark_applied(&mut self, token: RequestToken, maps: Vec<MapId>, outdoor: Vec<ShapeId>) {
        self.applied = Some(token.0);
        self.maps = maps;
        self.outdoor = outdoor;
    }

    /// Forget the rendered path and retire every outstanding token.
    /// Returns the maps that held path shapes.
    pub fn invalidate(&mut self) -> Vec<MapId> {
        self.issued += 1;
        self.applied = None;
        self.outdoor.clear();
        std::mem::take(&mut self.maps)
    }
}
