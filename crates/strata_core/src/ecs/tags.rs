//! # Tags
//!
//! String-keyed entity membership. Each tag name owns one bitmask over
//! entity indices. Singleton tags bind a name to at most one entity; the
//! last writer wins.

use std::collections::HashMap;

use super::{Entity, EntityManager};
use crate::bits::Bits;

/// Name-keyed tag masks and singleton tag bindings.
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    masks: HashMap<String, Bits>,
    singletons: HashMap<String, Entity>,
}

impl TagRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags a live entity. Returns `false` for dead entities.
    pub fn attach(&mut self, entities: &EntityManager, entity: Entity, tag: &str) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        self.attach_ignoring_state(entity, tag);
        true
    }

    /// Tags a live entity with every name in `tags`.
    pub fn attach_many<I, S>(&mut self, entities: &EntityManager, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !entities.is_alive(entity) {
            return false;
        }
        for tag in tags {
            self.attach_ignoring_state(entity, tag.as_ref());
        }
        true
    }

    fn attach_ignoring_state(&mut self, entity: Entity, tag: &str) {
        let index = entity.index() as usize;
        if let Some(mask) = self.masks.get_mut(tag) {
            mask.set(index);
        } else {
            let mut mask = Bits::new();
            mask.set(index);
            self.masks.insert(tag.to_owned(), mask);
        }
    }

    /// Removes `tag` from a live entity.
    pub fn detach(&mut self, entities: &EntityManager, entity: Entity, tag: &str) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        self.detach_ignoring_state(entity, tag)
    }

    /// Removes every name in `tags` from a live entity.
    pub fn detach_many<I, S>(&mut self, entities: &EntityManager, entity: Entity, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !entities.is_alive(entity) {
            return;
        }
        for tag in tags {
            self.detach_ignoring_state(entity, tag.as_ref());
        }
    }

    fn detach_ignoring_state(&mut self, entity: Entity, tag: &str) -> bool {
        let index = entity.index() as usize;
        match self.masks.get_mut(tag) {
            Some(mask) if mask.get(index) => {
                mask.clear(index);
                true
            }
            _ => false,
        }
    }

    /// Removes every tag and singleton tag of a live entity.
    pub fn detach_all(&mut self, entities: &EntityManager, entity: Entity) {
        if entities.is_alive(entity) {
            self.detach_all_ignoring_state(entity);
        }
    }

    pub(crate) fn detach_all_ignoring_state(&mut self, entity: Entity) {
        let index = entity.index() as usize;
        for mask in self.masks.values_mut() {
            mask.clear(index);
        }
        self.singletons.retain(|_, owner| *owner != entity);
    }

    /// Replaces every plain tag of a live entity with `tags`.
    ///
    /// Singleton bindings are left alone.
    pub fn replace_all<I, S>(&mut self, entities: &EntityManager, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !entities.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        for mask in self.masks.values_mut() {
            mask.clear(index);
        }
        for tag in tags {
            self.attach_ignoring_state(entity, tag.as_ref());
        }
        true
    }

    /// Checks whether a live entity carries `tag`.
    #[must_use]
    pub fn has(&self, entities: &EntityManager, entity: Entity, tag: &str) -> bool {
        entities.is_alive(entity)
            && self
                .masks
                .get(tag)
                .is_some_and(|mask| mask.get(entity.index() as usize))
    }

    /// Checks whether a live entity carries every tag in `tags`.
    #[must_use]
    pub fn has_all<I, S>(&self, entities: &EntityManager, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entities.is_alive(entity)
            && tags
                .into_iter()
                .all(|tag| self.has(entities, entity, tag.as_ref()))
    }

    /// Checks whether a live entity carries none of `tags`.
    #[must_use]
    pub fn has_none<I, S>(&self, entities: &EntityManager, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entities.is_alive(entity)
            && !tags
                .into_iter()
                .any(|tag| self.has(entities, entity, tag.as_ref()))
    }

    /// Binds singleton `tag` to a live entity, replacing any previous owner.
    pub fn attach_singleton(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
        tag: &str,
    ) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        self.singletons.insert(tag.to_owned(), entity);
        true
    }

    /// Unbinds singleton `tag`, returning its owner.
    pub fn detach_singleton(&mut self, tag: &str) -> Option<Entity> {
        self.singletons.remove(tag)
    }

    /// Owner of singleton `tag`.
    #[must_use]
    pub fn entity_by_singleton(&self, tag: &str) -> Option<Entity> {
        self.singletons.get(tag).copied()
    }

    /// Checks whether a live entity owns singleton `tag`.
    #[must_use]
    pub fn has_singleton(&self, entities: &EntityManager, entity: Entity, tag: &str) -> bool {
        entities.is_alive(entity) && self.singletons.get(tag) == Some(&entity)
    }

    /// Compares the plain tags of two entities.
    ///
    /// Both dead compares equal. Exactly one dead compares unequal.
    #[must_use]
    pub fn have_equal_tags(&self, entities: &EntityManager, a: Entity, b: Entity) -> bool {
        match (entities.is_alive(a), entities.is_alive(b)) {
            (false, false) => true,
            (true, true) => {
                let (a, b) = (a.index() as usize, b.index() as usize);
                self.masks.values().all(|mask| mask.get(a) == mask.get(b))
            }
            _ => false,
        }
    }

    /// Membership mask of `tag`, if the tag was ever used.
    #[must_use]
    pub fn mask(&self, tag: &str) -> Option<&Bits> {
        self.masks.get(tag)
    }

    /// Names of every tag ever used.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.masks.keys().map(String::as_str)
    }

    /// Intersects `bits` with every mask in `tags`.
    ///
    /// Clears `bits` and stops at the first unknown tag.
    pub(crate) fn retain_with_all(&self, bits: &mut Bits, tags: &[String]) {
        for tag in tags {
            match self.masks.get(tag) {
                Some(mask) => bits.and(mask),
                None => {
                    bits.clear_all();
                    return;
                }
            }
        }
    }

    /// Removes from `bits` every index carrying a tag of `tags`.
    pub(crate) fn remove_with_any(&self, bits: &mut Bits, tags: &[String]) {
        for mask in tags.iter().filter_map(|tag| self.masks.get(tag)) {
            bits.and_not(mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (EntityManager, TagRegistry) {
        (EntityManager::new(), TagRegistry::new())
    }

    #[test]
    fn test_attach_detach() {
        let (mut entities, mut tags) = setup();
        let e = entities.create();

        assert!(tags.attach(&entities, e, "enemy"));
        assert!(tags.has(&entities, e, "enemy"));
        assert!(!tags.has(&entities, e, "friend"));

        assert!(tags.detach(&entities, e, "enemy"));
        assert!(!tags.detach(&entities, e, "enemy"));
        assert!(!tags.has(&entities, e, "enemy"));
    }

    #[test]
    fn test_many_and_predicates() {
        let (mut entities, mut tags) = setup();
        let e = entities.create();
        tags.attach_many(&entities, e, ["a", "b", "c"]);

        assert!(tags.has_all(&entities, e, ["a", "c"]));
        assert!(!tags.has_all(&entities, e, ["a", "z"]));
        assert!(tags.has_none(&entities, e, ["x", "y"]));
        assert!(!tags.has_none(&entities, e, ["x", "b"]));

        tags.detach_many(&entities, e, ["a", "b"]);
        assert!(tags.has_all(&entities, e, ["c"]));
        assert!(tags.has_none(&entities, e, ["a", "b"]));
    }

    #[test]
    fn test_replace_all_keeps_singletons() {
        let (mut entities, mut tags) = setup();
        let e = entities.create();
        tags.attach_many(&entities, e, ["a", "b"]);
        tags.attach_singleton(&entities, e, "player");

        tags.replace_all(&entities, e, ["c"]);
        assert!(tags.has_none(&entities, e, ["a", "b"]));
        assert!(tags.has(&entities, e, "c"));
        assert!(tags.has_singleton(&entities, e, "player"));
    }

    #[test]
    fn test_singleton_last_writer_wins() {
        let (mut entities, mut tags) = setup();
        let a = entities.create();
        let b = entities.create();

        tags.attach_singleton(&entities, a, "camera");
        tags.attach_singleton(&entities, b, "camera");
        assert_eq!(tags.entity_by_singleton("camera"), Some(b));
        assert!(!tags.has_singleton(&entities, a, "camera"));

        assert_eq!(tags.detach_singleton("camera"), Some(b));
        assert_eq!(tags.entity_by_singleton("camera"), None);
    }

    #[test]
    fn test_detach_all_drops_singletons() {
        let (mut entities, mut tags) = setup();
        let e = entities.create();
        tags.attach(&entities, e, "a");
        tags.attach_singleton(&entities, e, "boss");

        tags.detach_all(&entities, e);
        assert!(!tags.has(&entities, e, "a"));
        assert_eq!(tags.entity_by_singleton("boss"), None);
    }

    #[test]
    fn test_dead_entities_read_neutral() {
        let (mut entities, mut tags) = setup();
        let e = entities.create();
        tags.attach(&entities, e, "a");
        entities.remove(e);

        assert!(!tags.has(&entities, e, "a"));
        assert!(!tags.has_none(&entities, e, ["a"]));
        assert!(!tags.attach(&entities, e, "b"));
        assert!(!tags.attach_singleton(&entities, e, "c"));
    }

    #[test]
    fn test_have_equal_tags() {
        let (mut entities, mut tags) = setup();
        let a = entities.create();
        let b = entities.create();
        tags.attach_many(&entities, a, ["x", "y"]);
        tags.attach_many(&entities, b, ["x", "y"]);
        assert!(tags.have_equal_tags(&entities, a, b));

        tags.detach(&entities, b, "y");
        assert!(!tags.have_equal_tags(&entities, a, b));

        entities.remove(a);
        entities.remove(b);
        assert!(tags.have_equal_tags(&entities, a, b));
    }
}
