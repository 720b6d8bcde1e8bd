//! # Component Storage
//!
//! Sparse-set storage for a single component type.
//!
//! The pool keeps three views of the same association:
//! - Dense arrays of values and their owning entities (cache-friendly iteration)
//! - A sparse `index -> slot` table for O(1) lookup
//! - A membership bitmask consumed by entity filters
//!
//! Removal is swap-remove, so unrelated entries never shift more than once.

use std::any::{type_name, Any};
use std::mem;

use super::component::Component;
use super::Entity;
use crate::bits::Bits;
use crate::error::{CoreError, CoreResult};

/// Sparse slot marker for "no component".
const EMPTY: usize = usize::MAX;

/// Sparse-set storage for one component type.
///
/// Entries are keyed by entity **index**. Aliveness is the caller's concern;
/// the [`ComponentRegistry`](super::ComponentRegistry) gates every public
/// write on it.
///
/// # Example
///
/// ```rust
/// use strata_core::{Component, ComponentPool, Entity};
///
/// #[derive(Debug, PartialEq)]
/// struct Health(u32);
/// impl Component for Health {}
///
/// let mut pool = ComponentPool::new();
/// pool.attach(Entity::new(4, 0), Health(10));
/// assert_eq!(pool.get(Entity::new(4, 0)), Some(&Health(10)));
/// ```
pub struct ComponentPool<T> {
    /// Entity index -> dense slot, `EMPTY` when absent.
    sparse: Vec<usize>,
    /// Dense component values.
    values: Vec<T>,
    /// Dense owners, parallel to `values`.
    owners: Vec<Entity>,
    /// Bit `i` set iff entity index `i` has an entry.
    mask: Bits,
    /// Bumped by every structural operation.
    mod_count: u64,
}

impl<T> ComponentPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            values: Vec::new(),
            owners: Vec::new(),
            mask: Bits::new(),
            mod_count: 0,
        }
    }

    /// Creates an empty pool with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            mask: Bits::with_capacity(capacity),
            mod_count: 0,
        }
    }

    #[inline]
    fn slot_of(&self, entity: Entity) -> Option<usize> {
        self.sparse
            .get(entity.index() as usize)
            .copied()
            .filter(|&slot| slot != EMPTY)
    }

    /// Attaches `value` to `entity`.
    ///
    /// An existing entry for the same index is overwritten in place and its
    /// previous value returned; no duplicate entries ever exist.
    pub fn attach(&mut self, entity: Entity, value: T) -> Option<T> {
        self.mod_count += 1;

        if let Some(slot) = self.slot_of(entity) {
            self.owners[slot] = entity;
            return Some(mem::replace(&mut self.values[slot], value));
        }

        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY);
        }
        self.sparse[index] = self.values.len();
        self.values.push(value);
        self.owners.push(entity);
        self.mask.set(index);
        None
    }

    /// Detaches and returns the value owned by `entity`.
    ///
    /// The last dense entry moves into the freed slot.
    pub fn detach(&mut self, entity: Entity) -> Option<T> {
        let slot = self.slot_of(entity)?;
        self.mod_count += 1;

        let value = self.values.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(moved) = self.owners.get(slot) {
            self.sparse[moved.index() as usize] = slot;
        }

        let index = entity.index() as usize;
        self.sparse[index] = EMPTY;
        self.mask.clear(index);
        Some(value)
    }

    /// Exchanges the dense positions of two entries.
    ///
    /// Each entity keeps its own value; only iteration order changes.
    /// No-op unless both entities have an entry.
    pub fn swap(&mut self, a: Entity, b: Entity) {
        let (Some(slot_a), Some(slot_b)) = (self.slot_of(a), self.slot_of(b)) else {
            return;
        };
        self.mod_count += 1;

        self.values.swap(slot_a, slot_b);
        self.owners.swap(slot_a, slot_b);
        self.sparse.swap(a.index() as usize, b.index() as usize);
    }

    /// Returns the value attached to `entity`.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slot_of(entity).map(|slot| &self.values[slot])
    }

    /// Returns the value attached to `entity`, mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slot_of(entity).map(|slot| &mut self.values[slot])
    }

    /// Checks whether the entity's index has an entry.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.mask.get(entity.index() as usize)
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the pool holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Owner of the dense slot `slot`.
    ///
    /// # Errors
    ///
    /// [`CoreError::IndexOutOfBounds`] when `slot >= len`.
    pub fn entity_at(&self, slot: usize) -> CoreResult<Entity> {
        self.owners
            .get(slot)
            .copied()
            .ok_or(CoreError::IndexOutOfBounds {
                index: slot,
                len: self.len(),
            })
    }

    /// Value in the dense slot `slot`.
    ///
    /// # Errors
    ///
    /// [`CoreError::IndexOutOfBounds`] when `slot >= len`.
    pub fn value_at(&self, slot: usize) -> CoreResult<&T> {
        self.values.get(slot).ok_or(CoreError::IndexOutOfBounds {
            index: slot,
            len: self.len(),
        })
    }

    /// Dense owners, in iteration order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Dense values, in iteration order.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Iterates `(owner, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.owners.iter().copied().zip(self.values.iter())
    }

    /// Iterates `(owner, value)` pairs in dense order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.owners.iter().copied().zip(self.values.iter_mut())
    }

    /// Membership bitmask, one bit per entity index.
    #[inline]
    #[must_use]
    pub fn entity_indexes_mask(&self) -> &Bits {
        &self.mask
    }

    /// Current structural modification counter.
    #[inline]
    #[must_use]
    pub fn modification_count(&self) -> u64 {
        self.mod_count
    }

    /// Starts a detached walk over the dense range.
    ///
    /// Unlike [`ComponentPool::iter`], a cursor does not borrow the pool, so
    /// the pool can be mutated between steps. Any structural mutation makes
    /// the next [`ComponentPool::advance`] fail.
    #[must_use]
    pub fn cursor(&self) -> PoolCursor {
        PoolCursor {
            expected: self.mod_count,
            position: 0,
        }
    }

    /// Advances `cursor` by one entry.
    ///
    /// # Errors
    ///
    /// [`CoreError::ConcurrentModification`] if the pool changed
    /// structurally since the cursor was created.
    pub fn advance(&self, cursor: &mut PoolCursor) -> CoreResult<Option<(Entity, &T)>> {
        if cursor.expected != self.mod_count {
            return Err(CoreError::ConcurrentModification {
                expected: cursor.expected,
                actual: self.mod_count,
            });
        }
        let Some(&owner) = self.owners.get(cursor.position) else {
            return Ok(None);
        };
        let value = &self.values[cursor.position];
        cursor.position += 1;
        Ok(Some((owner, value)))
    }
}

impl<T> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ComponentPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentPool")
            .field("type", &type_name::<T>())
            .field("len", &self.len())
            .field("mod_count", &self.mod_count)
            .finish_non_exhaustive()
    }
}

/// Position in a [`ComponentPool`] walk. See [`ComponentPool::cursor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolCursor {
    expected: u64,
    position: usize,
}

impl PoolCursor {
    /// Dense slot the next `advance` will yield.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Type-erased pool capability used by the component registry.
pub trait ErasedPool: Send {
    /// Detaches the entity's entry, returning whether one existed.
    fn detach_entity(&mut self, entity: Entity) -> bool;

    /// Checks whether the entity's index has an entry.
    fn contains(&self, entity: Entity) -> bool;

    /// Membership bitmask.
    fn mask(&self) -> &Bits;

    /// Number of entries.
    fn entry_count(&self) -> usize;

    /// True when both entities have equal values or both lack one.
    fn values_equal(&self, a: Entity, b: Entity) -> bool;

    /// Component type name, for diagnostics.
    fn component_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete pool.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete pool.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedPool for ComponentPool<T> {
    fn detach_entity(&mut self, entity: Entity) -> bool {
        self.detach(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.has(entity)
    }

    fn mask(&self) -> &Bits {
        &self.mask
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn values_equal(&self, a: Entity, b: Entity) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => x == y,
            (None, None) => true,
            _ => false,
        }
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_attach_and_overwrite() {
        let mut pool = ComponentPool::new();
        assert_eq!(pool.attach(e(5), Health(1)), None);
        assert_eq!(pool.attach(e(5), Health(2)), Some(Health(1)));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(e(5)), Some(&Health(2)));
        assert!(pool.entity_indexes_mask().get(5));
    }

    #[test]
    fn test_detach_swap_removes() {
        let mut pool = ComponentPool::new();
        for i in 0..4 {
            pool.attach(e(i), Health(i * 10));
        }

        assert_eq!(pool.detach(e(1)), Some(Health(10)));
        assert_eq!(pool.len(), 3);
        // Last entry moved into the freed slot.
        assert_eq!(pool.entities(), &[e(0), e(3), e(2)]);
        assert_eq!(pool.get(e(3)), Some(&Health(30)));
        assert!(!pool.has(e(1)));
        assert_eq!(pool.detach(e(1)), None);
    }

    #[test]
    fn test_detach_last_entry() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(1));
        pool.attach(e(1), Health(2));
        assert_eq!(pool.detach(e(1)), Some(Health(2)));
        assert_eq!(pool.get(e(0)), Some(&Health(1)));
        assert_eq!(pool.entities(), &[e(0)]);
    }

    #[test]
    fn test_attach_detach_attach_keeps_size() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(1));
        pool.attach(e(1), Health(1));
        let before = pool.len();

        pool.detach(e(0));
        pool.attach(e(0), Health(3));
        assert!(pool.has(e(0)));
        assert_eq!(pool.len(), before);
    }

    #[test]
    fn test_swap_keeps_values_with_owners() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(0));
        pool.attach(e(1), Health(1));
        pool.attach(e(2), Health(2));

        pool.swap(e(0), e(2));
        assert_eq!(pool.entities(), &[e(2), e(1), e(0)]);
        assert_eq!(pool.get(e(0)), Some(&Health(0)));
        assert_eq!(pool.get(e(2)), Some(&Health(2)));

        // Missing side makes it a no-op.
        let count = pool.modification_count();
        pool.swap(e(0), e(9));
        assert_eq!(pool.modification_count(), count);
    }

    #[test]
    fn test_slot_accessors() {
        let mut pool = ComponentPool::new();
        pool.attach(e(7), Health(70));
        assert_eq!(pool.entity_at(0), Ok(e(7)));
        assert_eq!(pool.value_at(0), Ok(&Health(70)));
        assert_eq!(
            pool.value_at(1),
            Err(CoreError::IndexOutOfBounds { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_cursor_walks_dense_range() {
        let mut pool = ComponentPool::new();
        pool.attach(e(3), Health(3));
        pool.attach(e(1), Health(1));

        let mut cursor = pool.cursor();
        let mut seen = Vec::new();
        while let Some((owner, value)) = pool.advance(&mut cursor).unwrap() {
            seen.push((owner, *value));
        }
        assert_eq!(seen, vec![(e(3), Health(3)), (e(1), Health(1))]);
    }

    #[test]
    fn test_cursor_detects_structural_change() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(0));
        pool.attach(e(1), Health(1));

        let mut cursor = pool.cursor();
        assert!(pool.advance(&mut cursor).unwrap().is_some());

        pool.detach(e(1));
        let err = pool.advance(&mut cursor).unwrap_err();
        assert!(matches!(err, CoreError::ConcurrentModification { .. }));
    }

    #[test]
    fn test_cursor_tolerates_value_edits() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(0));

        let mut cursor = pool.cursor();
        if let Some(value) = pool.get_mut(e(0)) {
            value.0 = 9;
        }
        assert_eq!(pool.advance(&mut cursor).unwrap(), Some((e(0), &Health(9))));
    }

    #[test]
    fn test_erased_values_equal() {
        let mut pool = ComponentPool::new();
        pool.attach(e(0), Health(1));
        pool.attach(e(1), Health(1));
        pool.attach(e(2), Health(2));

        let erased: &dyn ErasedPool = &pool;
        assert!(erased.values_equal(e(0), e(1)));
        assert!(!erased.values_equal(e(0), e(2)));
        assert!(!erased.values_equal(e(0), e(5)));
        assert!(erased.values_equal(e(5), e(6)));
    }
}
