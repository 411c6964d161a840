//! Venue wayfinder library
//!
//! Indoor/outdoor wayfinding and layered map compositing for venue maps.
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
