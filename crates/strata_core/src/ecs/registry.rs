//! # Component Registry
//!
//! One [`ComponentPool`] per component type, keyed by `TypeId`.
//!
//! Public operations take the [`EntityManager`] and act only on live
//! entities. Dead or foreign handles read as absent. The crate-internal
//! `*_ignoring_state` variants skip that check for callers that already
//! know the answer.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::bundle::Bundle;
use super::component::Component;
use super::storage::{ComponentPool, ErasedPool};
use super::{Entity, EntityManager};
use crate::bits::Bits;

/// Type-keyed map of component pools.
#[derive(Default)]
pub struct ComponentRegistry {
    pools: HashMap<TypeId, Box<dyn ErasedPool>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a pool for `T`, typically a pre-sized one.
    ///
    /// Replaces any pool already registered for `T`.
    pub fn register_pool<T: Component>(&mut self, pool: ComponentPool<T>) -> &mut Self {
        tracing::debug!(component = type_name::<T>(), "component pool registered");
        self.pools.insert(TypeId::of::<T>(), Box::new(pool));
        self
    }

    /// Pool for `T`, if one was ever created.
    #[must_use]
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any().downcast_ref())
    }

    /// Mutable pool for `T`, if one was ever created.
    pub fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        self.pools
            .get_mut(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any_mut().downcast_mut())
    }

    /// Pool for `T`, created on first use.
    ///
    /// Every entry is inserted under `TypeId::of::<T>()` with a
    /// `ComponentPool<T>` value, so the downcast always succeeds.
    fn pool_or_create<T: Component>(&mut self) -> &mut ComponentPool<T> {
        let pool = self.pools.entry(TypeId::of::<T>()).or_insert_with(|| {
            tracing::debug!(component = type_name::<T>(), "component pool created");
            Box::new(ComponentPool::<T>::new())
        });
        match pool.as_any_mut().downcast_mut() {
            Some(pool) => pool,
            None => unreachable!("pool keyed by {} holds another type", type_name::<T>()),
        }
    }

    /// Membership mask of the pool keyed by `type_id`.
    #[must_use]
    pub fn mask_of(&self, type_id: TypeId) -> Option<&Bits> {
        self.pools.get(&type_id).map(|pool| pool.mask())
    }

    /// Number of registered component types.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Attaches `value` to a live entity. Returns `false` for dead entities.
    pub fn attach<T: Component>(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
        value: T,
    ) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        self.attach_ignoring_state(entity, value);
        true
    }

    /// Attaches every component of `bundle` to a live entity.
    pub fn attach_bundle<B: Bundle>(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
        bundle: B,
    ) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        bundle.attach_to(self, entity);
        true
    }

    /// Attaches without an aliveness check. Returns the overwritten value.
    pub(crate) fn attach_ignoring_state<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Option<T> {
        self.pool_or_create::<T>().attach(entity, value)
    }

    /// Detaches and returns the `T` of a live entity.
    pub fn detach<T: Component>(&mut self, entities: &EntityManager, entity: Entity) -> Option<T> {
        if !entities.is_alive(entity) {
            return None;
        }
        self.pool_mut::<T>()?.detach(entity)
    }

    /// Detaches every component of a live entity.
    pub fn detach_all(&mut self, entities: &EntityManager, entity: Entity) {
        if entities.is_alive(entity) {
            self.detach_all_ignoring_state(entity);
        }
    }

    /// Detaches the components keyed by `types` from a live entity.
    ///
    /// Types without a pool are skipped. Returns how many components were
    /// detached.
    pub fn detach_types(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
        types: &[TypeId],
    ) -> usize {
        if !entities.is_alive(entity) {
            return 0;
        }
        types
            .iter()
            .filter_map(|type_id| {
                self.pools
                    .get_mut(type_id)
                    .map(|pool| pool.detach_entity(entity))
            })
            .filter(|&detached| detached)
            .count()
    }

    pub(crate) fn detach_all_ignoring_state(&mut self, entity: Entity) {
        for pool in self.pools.values_mut() {
            pool.detach_entity(entity);
        }
    }

    /// Replaces every component of a live entity with `bundle`.
    pub fn replace_all<B: Bundle>(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
        bundle: B,
    ) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        self.detach_all_ignoring_state(entity);
        bundle.attach_to(self, entity);
        true
    }

    /// The `T` of a live entity.
    #[must_use]
    pub fn get<T: Component>(&self, entities: &EntityManager, entity: Entity) -> Option<&T> {
        if !entities.is_alive(entity) {
            return None;
        }
        self.pool::<T>()?.get(entity)
    }

    /// The `T` of a live entity, mutably.
    pub fn get_mut<T: Component>(
        &mut self,
        entities: &EntityManager,
        entity: Entity,
    ) -> Option<&mut T> {
        if !entities.is_alive(entity) {
            return None;
        }
        self.pool_mut::<T>()?.get_mut(entity)
    }

    /// Checks whether a live entity has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entities: &EntityManager, entity: Entity) -> bool {
        self.has_type(entities, entity, TypeId::of::<T>())
    }

    /// Checks whether a live entity has the component keyed by `type_id`.
    #[must_use]
    pub fn has_type(&self, entities: &EntityManager, entity: Entity, type_id: TypeId) -> bool {
        entities.is_alive(entity)
            && self
                .pools
                .get(&type_id)
                .is_some_and(|pool| pool.contains(entity))
    }

    /// Checks whether a live entity has every component keyed by `types`.
    ///
    /// An empty `types` holds for any live entity.
    #[must_use]
    pub fn has_all_types(
        &self,
        entities: &EntityManager,
        entity: Entity,
        types: &[TypeId],
    ) -> bool {
        entities.is_alive(entity)
            && types
                .iter()
                .all(|&type_id| self.has_type(entities, entity, type_id))
    }

    /// Checks whether a live entity has none of the components keyed by
    /// `types`. Dead entities answer `false`.
    #[must_use]
    pub fn has_none_types(
        &self,
        entities: &EntityManager,
        entity: Entity,
        types: &[TypeId],
    ) -> bool {
        entities.is_alive(entity)
            && !types
                .iter()
                .any(|&type_id| self.has_type(entities, entity, type_id))
    }

    /// Compares two entities component by component.
    ///
    /// Both dead compares equal. Exactly one dead compares unequal.
    /// Otherwise every pool must agree on presence and value.
    #[must_use]
    pub fn have_equal_components(&self, entities: &EntityManager, a: Entity, b: Entity) -> bool {
        match (entities.is_alive(a), entities.is_alive(b)) {
            (false, false) => true,
            (true, true) => self.pools.values().all(|pool| pool.values_equal(a, b)),
            _ => false,
        }
    }

    /// Intersects `bits` with every pool in `types`.
    ///
    /// Clears `bits` and stops at the first type that has no pool.
    pub(crate) fn retain_with_all(&self, bits: &mut Bits, types: &[TypeId]) {
        for type_id in types {
            match self.pools.get(type_id) {
                Some(pool) => bits.and(pool.mask()),
                None => {
                    bits.clear_all();
                    return;
                }
            }
        }
    }

    /// Removes from `bits` every index present in a pool of `types`.
    /// Types without a pool are skipped.
    pub(crate) fn remove_with_any(&self, bits: &mut Bits, types: &[TypeId]) {
        for pool in types.iter().filter_map(|type_id| self.pools.get(type_id)) {
            bits.and_not(pool.mask());
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.pools
                    .values()
                    .map(|pool| (pool.component_name(), pool.entry_count())),
            )
            .finish()
    }
}
