//! # ECS World
//!
//! The store facade: entity identity, component pools and tags behind one
//! owner, so removing an entity purges everything attached to it in the
//! same call.

use std::any::TypeId;

use super::bundle::Bundle;
use super::component::Component;
use super::filter::{self, EntityFilter};
use super::registry::ComponentRegistry;
use super::storage::ComponentPool;
use super::tags::TagRegistry;
use super::{Entity, EntityManager, EntityManagerSnapshot};
use crate::bits::Bits;

/// Container for all entity state.
///
/// # Example
///
/// ```rust
/// use strata_core::{Component, EntityFilter, World};
///
/// #[derive(Debug, PartialEq)]
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// let mut world = World::new();
/// let player = world.create_with((Position(0.0, 0.0),));
/// world.attach_tag(player, "player");
///
/// let found = world.select(&EntityFilter::new().all::<Position>().all_tags(["player"]));
/// assert_eq!(found, vec![player]);
/// ```
#[derive(Debug, Default)]
pub struct World {
    entities: EntityManager,
    components: ComponentRegistry,
    tags: TagRegistry,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a world whose entities match `snapshot`. Components and tags
    /// start empty.
    #[must_use]
    pub fn from_snapshot(snapshot: &EntityManagerSnapshot) -> Self {
        Self {
            entities: EntityManager::from_snapshot(snapshot),
            ..Self::default()
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates a new entity with no components.
    pub fn create(&mut self) -> Entity {
        self.entities.create()
    }

    /// Creates a new entity carrying `bundle`.
    pub fn create_with<B: Bundle>(&mut self, bundle: B) -> Entity {
        let entity = self.entities.create();
        bundle.attach_to(&mut self.components, entity);
        entity
    }

    /// Removes an entity along with its components, tags and singleton
    /// tags. Returns `false` if it was not alive.
    pub fn remove(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.components.detach_all_ignoring_state(entity);
        self.tags.detach_all_ignoring_state(entity);
        self.entities.remove(entity)
    }

    /// Checks whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Identity stored at `index`, alive or dead.
    #[must_use]
    pub fn entity_by_index(&self, index: u32) -> Entity {
        self.entities.entity_by_index(index)
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Entity manager, read-only.
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Component registry, read-only.
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Tag registry, read-only.
    #[must_use]
    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Split borrow for callers that mutate registries directly.
    pub fn parts_mut(&mut self) -> (&EntityManager, &mut ComponentRegistry, &mut TagRegistry) {
        (&self.entities, &mut self.components, &mut self.tags)
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `value` to a live entity.
    pub fn attach<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        self.components.attach(&self.entities, entity, value)
    }

    /// Attaches every component of `bundle` to a live entity.
    pub fn attach_bundle<B: Bundle>(&mut self, entity: Entity, bundle: B) -> bool {
        self.components.attach_bundle(&self.entities, entity, bundle)
    }

    /// Detaches and returns the `T` of a live entity.
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.components.detach(&self.entities, entity)
    }

    /// Detaches every component of a live entity.
    pub fn detach_all(&mut self, entity: Entity) {
        self.components.detach_all(&self.entities, entity);
    }

    /// Replaces every component of a live entity with `bundle`.
    pub fn replace_all<B: Bundle>(&mut self, entity: Entity, bundle: B) -> bool {
        self.components.replace_all(&self.entities, entity, bundle)
    }

    /// The `T` of a live entity.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.get(&self.entities, entity)
    }

    /// The `T` of a live entity, mutably.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(&self.entities, entity)
    }

    /// Checks whether a live entity has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.components.has::<T>(&self.entities, entity)
    }

    /// Checks whether a live entity has every component keyed by `types`.
    ///
    /// ```rust
    /// # use std::any::TypeId;
    /// # use strata_core::{Component, World};
    /// # #[derive(PartialEq)] struct Hp(u32);
    /// # impl Component for Hp {}
    /// # #[derive(PartialEq)] struct Armor(u32);
    /// # impl Component for Armor {}
    /// let mut world = World::new();
    /// let knight = world.create_with((Hp(10), Armor(3)));
    /// assert!(world.has_all_types(knight, &[TypeId::of::<Hp>(), TypeId::of::<Armor>()]));
    /// ```
    #[must_use]
    pub fn has_all_types(&self, entity: Entity, types: &[TypeId]) -> bool {
        self.components.has_all_types(&self.entities, entity, types)
    }

    /// Checks whether a live entity has none of the components keyed by
    /// `types`.
    #[must_use]
    pub fn has_none_types(&self, entity: Entity, types: &[TypeId]) -> bool {
        self.components.has_none_types(&self.entities, entity, types)
    }

    /// Detaches the components keyed by `types` from a live entity,
    /// returning how many were detached.
    pub fn detach_types(&mut self, entity: Entity, types: &[TypeId]) -> usize {
        self.components.detach_types(&self.entities, entity, types)
    }

    /// Pool for `T`.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.components.pool()
    }

    /// Mutable pool for `T`, e.g. to reorder it with
    /// [`ComponentPool::swap`].
    pub fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        self.components.pool_mut()
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Tags a live entity.
    pub fn attach_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.tags.attach(&self.entities, entity, tag)
    }

    /// Tags a live entity with every name in `tags`.
    pub fn attach_tags<I, S>(&mut self, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.attach_many(&self.entities, entity, tags)
    }

    /// Removes `tag` from a live entity.
    pub fn detach_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.tags.detach(&self.entities, entity, tag)
    }

    /// Removes every name in `tags` from a live entity.
    pub fn detach_tags<I, S>(&mut self, entity: Entity, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.detach_many(&self.entities, entity, tags);
    }

    /// Removes every tag and singleton tag of a live entity.
    pub fn detach_all_tags(&mut self, entity: Entity) {
        self.tags.detach_all(&self.entities, entity);
    }

    /// Replaces every plain tag of a live entity.
    pub fn replace_all_tags<I, S>(&mut self, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.replace_all(&self.entities, entity, tags)
    }

    /// Checks whether a live entity carries `tag`.
    #[must_use]
    pub fn has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.tags.has(&self.entities, entity, tag)
    }

    /// Checks whether a live entity carries every tag in `tags`.
    #[must_use]
    pub fn has_all_tags<I, S>(&self, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.has_all(&self.entities, entity, tags)
    }

    /// Checks whether a live entity carries none of `tags`.
    #[must_use]
    pub fn has_no_tags<I, S>(&self, entity: Entity, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.has_none(&self.entities, entity, tags)
    }

    /// Binds singleton `tag` to a live entity.
    pub fn attach_singleton_tag(&mut self, entity: Entity, tag: &str) -> bool {
        self.tags.attach_singleton(&self.entities, entity, tag)
    }

    /// Unbinds singleton `tag`, returning its owner.
    pub fn detach_singleton_tag(&mut self, tag: &str) -> Option<Entity> {
        self.tags.detach_singleton(tag)
    }

    /// Owner of singleton `tag`.
    #[must_use]
    pub fn entity_by_singleton_tag(&self, tag: &str) -> Option<Entity> {
        self.tags.entity_by_singleton(tag)
    }

    /// Checks whether a live entity owns singleton `tag`.
    #[must_use]
    pub fn has_singleton_tag(&self, entity: Entity, tag: &str) -> bool {
        self.tags.has_singleton(&self.entities, entity, tag)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Index mask of live entities matching `filter`.
    #[must_use]
    pub fn select_entity_indexes(&self, filter: &EntityFilter) -> Bits {
        filter::select_entity_indexes(&self.entities, &self.components, &self.tags, filter)
    }

    /// Live entities matching `filter`, ascending by index.
    #[must_use]
    pub fn select(&self, filter: &EntityFilter) -> Vec<Entity> {
        self.select_entity_indexes(filter)
            .iter_ones()
            .filter_map(|index| u32::try_from(index).ok())
            .map(|index| self.entities.entity_by_index(index))
            .collect()
    }

    /// Checks a single entity against `filter`.
    #[must_use]
    pub fn matches(&self, entity: Entity, filter: &EntityFilter) -> bool {
        filter::matches(&self.entities, &self.components, &self.tags, entity, filter)
    }

    /// Compares component values of two entities.
    #[must_use]
    pub fn have_equal_components(&self, a: Entity, b: Entity) -> bool {
        self.components.have_equal_components(&self.entities, a, b)
    }

    /// Compares plain tags of two entities.
    #[must_use]
    pub fn have_equal_tags(&self, a: Entity, b: Entity) -> bool {
        self.tags.have_equal_tags(&self.entities, a, b)
    }

    /// Compares both components and tags of two entities.
    #[must_use]
    pub fn have_equal_components_and_tags(&self, a: Entity, b: Entity) -> bool {
        self.have_equal_components(a, b) && self.have_equal_tags(a, b)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Captures entity identity state.
    #[must_use]
    pub fn snapshot(&self) -> EntityManagerSnapshot {
        self.entities.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32, i32);
    impl Component for Velocity {}

    #[test]
    fn test_remove_purges_everything() {
        let mut world = World::new();
        let e = world.create_with((Position(1, 2), Velocity(0, 1)));
        world.attach_tags(e, ["enemy", "flying"]);
        world.attach_singleton_tag(e, "boss");

        assert!(world.remove(e));
        assert!(!world.remove(e));

        // The recycled index starts clean.
        let next = world.create();
        assert_eq!(next.index(), e.index());
        assert!(!world.has::<Position>(next));
        assert!(!world.has_tag(next, "enemy"));
        assert_eq!(world.entity_by_singleton_tag("boss"), None);
        assert_eq!(world.pool::<Velocity>().map(ComponentPool::len), Some(0));
    }

    #[test]
    fn test_select_returns_current_generations() {
        let mut world = World::new();
        let a = world.create_with((Position(0, 0),));
        world.create();
        world.remove(a);
        let c = world.create_with((Position(5, 5),));

        let found = world.select(&EntityFilter::new().all::<Position>());
        assert_eq!(found, vec![c]);
        assert_eq!(c.generation(), 1);
    }

    #[test]
    fn test_filter_all_none() {
        let mut world = World::new();
        let still = world.create_with((Position(0, 0),));
        let moving = world.create_with((Position(0, 0), Velocity(1, 0)));

        let filter = EntityFilter::new().all::<Position>().none::<Velocity>();
        assert_eq!(world.select(&filter), vec![still]);
        assert!(world.matches(still, &filter));
        assert!(!world.matches(moving, &filter));
    }

    #[test]
    fn test_attach_detach_attach() {
        let mut world = World::new();
        let e = world.create_with((Position(0, 0),));
        let before = world.pool::<Position>().map(ComponentPool::len);

        world.detach::<Position>(e);
        world.attach(e, Position(2, 2));
        assert!(world.has::<Position>(e));
        assert_eq!(world.pool::<Position>().map(ComponentPool::len), before);
    }

    #[test]
    fn test_multi_type_component_ops() {
        let mut world = World::new();
        let mover = world.create_with((Position(0, 0), Velocity(1, 1)));
        let statue = world.create_with((Position(5, 5),));
        let kinematic = [TypeId::of::<Position>(), TypeId::of::<Velocity>()];

        assert!(world.has_all_types(mover, &kinematic));
        assert!(!world.has_all_types(statue, &kinematic));
        assert!(world.has_none_types(statue, &kinematic[1..]));

        assert_eq!(world.detach_types(mover, &kinematic), 2);
        assert!(world.has_none_types(mover, &kinematic));
        assert!(world.is_alive(mover));

        world.remove(statue);
        assert!(!world.has_none_types(statue, &kinematic));
        assert_eq!(world.detach_types(statue, &kinematic), 0);
    }

    #[test]
    fn test_have_equal_components_and_tags() {
        let mut world = World::new();
        let a = world.create_with((Position(1, 1),));
        let b = world.create_with((Position(1, 1),));
        world.attach_tag(a, "x");
        assert!(world.have_equal_components(a, b));
        assert!(!world.have_equal_components_and_tags(a, b));

        world.attach_tag(b, "x");
        assert!(world.have_equal_components_and_tags(a, b));
    }

    #[test]
    fn test_pool_swap_through_world() {
        let mut world = World::new();
        let a = world.create_with((Position(1, 0),));
        let b = world.create_with((Position(2, 0),));

        if let Some(pool) = world.pool_mut::<Position>() {
            pool.swap(a, b);
        }
        let order: Vec<_> = world
            .pool::<Position>()
            .map(|pool| pool.entities().to_vec())
            .unwrap_or_default();
        assert_eq!(order, vec![b, a]);
        assert_eq!(world.get::<Position>(a), Some(&Position(1, 0)));
    }

    #[test]
    fn test_snapshot_restores_identity() {
        let mut world = World::new();
        let es: Vec<_> = (0..5).map(|_| world.create()).collect();
        world.remove(es[2]);

        let restored = World::from_snapshot(&world.snapshot());
        for &e in &es {
            assert_eq!(restored.is_alive(e), world.is_alive(e));
        }
        assert_eq!(restored.entities(), world.entities());
    }
}
