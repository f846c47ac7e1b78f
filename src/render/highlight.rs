//! Reversible material highlights for selected geometry.

use crate::engine::{Appearance, SceneEngine};
use crate::render::color::Rgba;
use std::collections::HashMap;
use std::hash::Hash;

/// Saved pre-highlight appearances, keyed by drawable entity.
///
/// The first `apply` on an entity captures its appearance; later applies
/// only repaint. `reset` restores the captured original and forgets it.
pub struct MaterialHighlightStore<K> {
    originals: HashMap<K, Appearance>,
    emissive_strength: f32,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> MaterialHighlightStore<K> {
    pub fn new(emissive_strength: f32) -> Self {
        Self {
            originals: HashMap::new(),
            emissive_strength,
        }
    }

    /// Paints `entity` with `color`. Returns false when nothing was painted.
    pub fn apply<E>(&mut self, engine: &mut E, entity: K, color: Rgba) -> bool
    where
        E: SceneEngine<Entity = K> + ?Sized,
    {
        if !engine.is_live(entity) {
            log::trace!("Ignoring highlight for stale entity {:?}", entity);
            return false;
        }
        if !engine.has_tintable_parameter(entity) {
            log::warn!("Entity {:?} has no tintable material parameter", entity);
            return false;
        }

        let original = match self.originals.get(&entity) {
            Some(original) => original.clone(),
            None => {
                let Some(current) = engine.appearance(entity) else {
                    log::warn!("Entity {:?} exposes no appearance to capture", entity);
                    return false;
                };
                self.originals.insert(entity, current.clone());
                current
            }
        };

        let painted = original.highlighted(color.0, self.emissive_strength);
        if !engine.set_appearance(entity, &painted) {
            log::warn!("Engine rejected highlight on entity {:?}", entity);
            return false;
        }
        true
    }

    /// Restores the saved original of `entity`, if any.
    pub fn reset<E>(&mut self, engine: &mut E, entity: K) -> bool
    where
        E: SceneEngine<Entity = K> + ?Sized,
    {
        let Some(original) = self.originals.remove(&entity) else {
            log::debug!("No saved appearance for entity {:?}", entity);
            return false;
        };
        if !engine.is_live(entity) {
            log::trace!("Dropping saved appearance of stale entity {:?}", entity);
            return false;
        }
        if !engine.has_tintable_parameter(entity) {
            log::warn!("Entity {:?} has no tintable material parameter", entity);
            return false;
        }
        engine.set_appearance(entity, &original)
    }

    /// Restores every saved original.
    pub fn reset_all<E>(&mut self, engine: &mut E)
    where
        E: SceneEngine<Entity = K> + ?Sized,
    {
        let entities: Vec<K> = self.originals.keys().copied().collect();
        for entity in entities {
            self.reset(engine, entity);
        }
    }

    /// Forgets every saved original without touching the engine.
    pub fn clear(&mut self) {
        self.originals.clear();
    }

    pub fn is_highlighted(&self, entity: K) -> bool {
        self.originals.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}
