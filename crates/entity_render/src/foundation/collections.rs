//! Specialized collection types

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Arena key of one entity inside a renderer instance
    pub struct EntityKey;
}

/// Arena of values addressed by [`EntityKey`]
pub type EntityArena<T> = SlotMap<EntityKey, T>;
