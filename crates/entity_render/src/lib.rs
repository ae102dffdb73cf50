//! # Entity Render
//!
//! Entity rendering and lifecycle management for real-time geospatial scenes.
//!
//! ## Features
//!
//! - **Entity Contract**: one lifecycle (add, update, remove, batch forms,
//!   culling, events) shared by every entity family
//! - **Level of Detail**: distance-driven detail levels that toggle parts of
//!   an entity without recreating it
//! - **Animation**: a throttled tick loop independent of the host's render
//!   cadence
//! - **Particles**: fixed-capacity pooled emitters with presets
//! - **Renderer Factory**: direct, batched or instanced rendering chosen per
//!   submission
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use entity_render::prelude::*;
//!
//! # async fn demo() -> Result<(), RenderError> {
//! let host = Rc::new(HeadlessHost::new());
//! let mut factory = RendererFactory::new(host, RendererConfig::default())?;
//! let records = vec![EntityRecord::point("hq", Anchor::surface(2.35, 48.85)).with_label("HQ")];
//! let outcome = factory.render(Family::Point, records, RenderOptions::default()).await?;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod animation;
pub mod core;
pub mod entity;
pub mod error;
pub mod events;
pub mod factory;
pub mod foundation;
pub mod host;
pub mod library;
pub mod lod;
pub mod renderers;
pub mod selection;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        core::{Config, RendererConfig},
        entity::{
            EntityContract, EntityId, EntityRecord, EntityRenderer, EntityResult, EntityUpdate, Family,
            FamilyPayload, RenderOptions, RenderOutcome, RendererStats, StyleOverrides,
        },
        error::{RenderError, RenderResult},
        events::{EntityEvent, EventKind},
        factory::{RendererFactory, Strategy},
        foundation::math::{Anchor, Color, Vec3},
        host::{HeadlessHost, RenderHost},
        renderers::ParticlePreset,
    };
}
