//! The set of selected entities and the snapshot reported to the host.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Placeholder name engines give nodes the exporter left unnamed.
pub const UNNAMED_ENTITY: &str = "Unnamed Entity";

/// Registry entry: the selected node's name and the drawable painted for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected<K> {
    pub name: Option<String>,
    pub drawable: K,
}

/// One entry of a selection notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedEntity<K> {
    pub id: K,
    pub name: String,
}

/// Whether a selected entity's name may be reported to the host.
pub fn is_reportable_name(name: Option<&str>) -> bool {
    matches!(name, Some(name) if !name.is_empty() && name != UNNAMED_ENTITY)
}

/// Currently-selected entities of the current scene generation.
///
/// Membership is a set; iteration and snapshots follow insertion order so
/// notifications are deterministic.
#[derive(Debug, Clone)]
pub struct SelectionRegistry<K> {
    entries: IndexMap<K, Selected<K>>,
}

impl<K> Default for SelectionRegistry<K> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> SelectionRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `id` if absent, deselects it if present.
    ///
    /// Returns `true` if `id` is now selected.
    pub fn toggle(&mut self, id: K, selected: Selected<K>) -> bool {
        if self.entries.shift_remove(&id).is_some() {
            false
        } else {
            self.entries.insert(id, selected);
            true
        }
    }

    /// Inserts `id` unless already present.
    ///
    /// Returns `true` if the registry changed.
    pub fn add_preselected(&mut self, id: K, selected: Selected<K>) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, selected);
        true
    }

    pub fn remove(&mut self, id: K) -> Option<Selected<K>> {
        self.entries.shift_remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes and returns every entry in insertion order.
    pub fn drain(&mut self) -> Vec<(K, Selected<K>)> {
        self.entries.drain(..).collect()
    }

    pub fn get(&self, id: K) -> Option<&Selected<K>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: K) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any selected entity paints `drawable`.
    pub fn uses_drawable(&self, drawable: K) -> bool {
        self.entries.values().any(|selected| selected.drawable == drawable)
    }

    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys().copied()
    }

    /// Reportable selection, skipping absent, empty and placeholder names.
    pub fn snapshot(&self) -> Vec<SelectedEntity<K>> {
        self.entries
            .iter()
            .filter_map(|(id, selected)| {
                let name = selected.name.as_deref();
                is_reportable_name(name).then(|| SelectedEntity {
                    id: *id,
                    name: name.unwrap_or_default().to_string(),
                })
            })
            .collect()
    }
}
