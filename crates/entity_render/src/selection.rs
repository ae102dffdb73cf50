//! Selection and hover tracking
//!
//! One selected id and one hovered id per renderer. Transitions report the
//! previous and next id so the owner restores the previous entity's normal
//! style before highlighting the next one.

use crate::entity::EntityId;

/// Highlight applied to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Highlight {
    /// Normal style
    #[default]
    None,
    /// Under the cursor
    Hovered,
    /// Currently selected
    Selected,
}

/// Change produced by a select/hover call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    /// Id that lost the state
    pub previous: Option<EntityId>,
    /// Id that gained the state
    pub next: Option<EntityId>,
}

impl SelectionChange {
    /// Ids to restyle, previous first
    pub fn affected(&self) -> impl Iterator<Item = &EntityId> {
        self.previous.iter().chain(self.next.iter())
    }
}

/// Selected and hovered ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<EntityId>,
    hovered: Option<EntityId>,
}

impl SelectionState {
    /// Nothing selected or hovered
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected id
    pub const fn selected(&self) -> Option<&EntityId> {
        self.selected.as_ref()
    }

    /// Hovered id
    pub const fn hovered(&self) -> Option<&EntityId> {
        self.hovered.as_ref()
    }

    /// Change the selection; `None` when nothing changed
    pub fn select(&mut self, id: Option<EntityId>) -> Option<SelectionChange> {
        Self::transition(&mut self.selected, id)
    }

    /// Change the hover target; `None` when nothing changed
    pub fn hover(&mut self, id: Option<EntityId>) -> Option<SelectionChange> {
        Self::transition(&mut self.hovered, id)
    }

    /// Drop any reference to a removed entity
    pub fn forget(&mut self, id: &EntityId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.hovered.as_ref() == Some(id) {
            self.hovered = None;
        }
    }

    /// Clear both states
    pub fn clear(&mut self) {
        self.selected = None;
        self.hovered = None;
    }

    /// Highlight an id should show; selection wins over hover
    pub fn highlight_of(&self, id: &EntityId) -> Highlight {
        if self.selected.as_ref() == Some(id) {
            Highlight::Selected
        } else if self.hovered.as_ref() == Some(id) {
            Highlight::Hovered
        } else {
            Highlight::None
        }
    }

    fn transition(slot: &mut Option<EntityId>, next: Option<EntityId>) -> Option<SelectionChange> {
        if *slot == next {
            return None;
        }
        let previous = std::mem::replace(slot, next.clone());
        Some(SelectionChange { previous, next })
    }
}
