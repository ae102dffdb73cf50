//! Geometry/material library
//!
//! Turns declarative style inputs into renderer-native descriptors. The
//! constructors are pure; [`StyleCache`] deduplicates their outputs and
//! [`Catalog`] holds the named defaults.

pub mod cache;
pub mod catalog;
pub mod geometry;
pub mod material;

pub use cache::{CacheStats, StyleCache};
pub use catalog::Catalog;
pub use geometry::{create_geometry, GeometryDescriptor, GeometryKind, GeometryOptions};
pub use material::{create_material, MaterialDescriptor, MaterialKind, MaterialOptions};
