use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A named ordered bucket of ranked member names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub items: Vec<String>,
}

impl Tier {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
        }
    }
}

/// The full ranking state for one subject: ordered tiers plus the
/// unassigned pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub tiers: Vec<Tier>,
    pub bin: Vec<String>,
}

/// Where a member name currently lives, or where a drop lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ContainerId {
    Tier(String),
    Bin,
}

/// What a drag gesture was released over: another item (insert at that
/// item's position) or a container (append at the end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    Item(String),
    Container(ContainerId),
}

impl Default for Board {
    /// Seed state shown to users before anything has been saved.
    fn default() -> Self {
        Self {
            tiers: vec![Tier::new("S"), Tier::new("A"), Tier::new("B")],
            bin: ["Alice", "Bob", "Charlie", "David", "Eve", "Frank"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Board {
    /// Finds the container and index holding `name`, scanning tiers in
    /// order and then the bin.
    pub fn locate(&self, name: &str) -> Option<(ContainerId, usize)> {
        for tier in &self.tiers {
            if let Some(index) = tier.items.iter().position(|item| item == name) {
                return Some((ContainerId::Tier(tier.id.clone()), index));
            }
        }
        self.bin
            .iter()
            .position(|item| item == name)
            .map(|index| (ContainerId::Bin, index))
    }

    fn container(&self, id: &ContainerId) -> Option<&Vec<String>> {
        match id {
            ContainerId::Tier(tier_id) => self
                .tiers
                .iter()
                .find(|tier| &tier.id == tier_id)
                .map(|tier| &tier.items),
            ContainerId::Bin => Some(&self.bin),
        }
    }

    fn container_mut(&mut self, id: &ContainerId) -> Option<&mut Vec<String>> {
        match id {
            ContainerId::Tier(tier_id) => self
                .tiers
                .iter_mut()
                .find(|tier| &tier.id == tier_id)
                .map(|tier| &mut tier.items),
            ContainerId::Bin => Some(&mut self.bin),
        }
    }

    /// Applies one drag-end gesture and returns the resulting snapshot.
    ///
    /// Returns `None` when the gesture is a no-op: the dragged name is not
    /// on the board, the target does not resolve, the item is dropped onto
    /// itself, or the move lands the item back in its current position.
    /// The input board is never mutated.
    pub fn reassign(&self, dragged: &str, target: &DropTarget) -> Option<Board> {
        let (source, source_index) = self.locate(dragged)?;

        let destination = match target {
            DropTarget::Item(anchor) => {
                if anchor == dragged {
                    return None;
                }
                let (container, _) = self.locate(anchor)?;
                container
            }
            DropTarget::Container(container) => {
                self.container(container)?;
                container.clone()
            }
        };

        let mut next = self.clone();
        let source_items = next.container_mut(&source)?;
        let dragged_item = source_items.remove(source_index);

        // Anchor index is resolved after removal so same-container moves
        // are well-defined.
        let destination_items = next.container_mut(&destination)?;
        let insert_at = match target {
            DropTarget::Item(anchor) => destination_items
                .iter()
                .position(|item| item == anchor)
                .unwrap_or(destination_items.len()),
            DropTarget::Container(_) => destination_items.len(),
        };
        destination_items.insert(insert_at, dragged_item);

        if next == *self {
            return None;
        }
        Some(next)
    }

    /// Reports member names that appear in more than one place. The
    /// engine preserves single occurrence for boards that already satisfy
    /// it; external snapshots may not.
    pub fn duplicate_members(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for name in self.members() {
            if !seen.insert(name.clone()) && !duplicates.contains(name) {
                duplicates.push(name.clone());
            }
        }
        duplicates
    }

    /// All member names on the board, tiers first then the bin.
    pub fn members(&self) -> impl Iterator<Item = &String> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.items.iter())
            .chain(self.bin.iter())
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
