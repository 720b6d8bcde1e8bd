//! # Entity Manager
//!
//! Allocates and recycles generational entity handles.
//!
//! ## Reuse Rules
//!
//! 1. A new entity takes the **lowest** free index, so freed indices come
//!    back in ascending order.
//! 2. A never-used index starts at generation 0.
//! 3. Removing an entity bumps the stored generation, so the next occupant
//!    of that index is distinguishable from every previous one.

use std::fmt;

use super::{Entity, EntityManagerSnapshot};
use crate::bits::Bits;

/// Initial capacity of the alive mask, in bits.
const INITIAL_CAPACITY: usize = 256;

/// Owner of entity identity and the authoritative alive mask.
#[derive(Clone)]
pub struct EntityManager {
    /// Stored generation per index, alive or dead.
    generations: Vec<u32>,
    /// Bit `i` set iff the entity at index `i` is alive.
    alive: Bits,
}

impl EntityManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Bits::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Rebuilds a manager from a snapshot.
    ///
    /// The snapshot is trusted: duplicate indices are not detected.
    #[must_use]
    pub fn from_snapshot(snapshot: &EntityManagerSnapshot) -> Self {
        let mut manager = Self::new();
        manager.restore(snapshot);
        manager
    }

    /// Creates a new entity.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` indices are alive at once.
    pub fn create(&mut self) -> Entity {
        let index = self.alive.next_clear_bit(0);
        let Ok(slot) = u32::try_from(index) else {
            panic!("entity index space exhausted");
        };
        assert!(slot != u32::MAX, "entity index space exhausted");

        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }
        self.alive.set(index);
        Entity::new(slot, self.generations[index])
    }

    /// Removes an entity. Returns `false` if it was not alive.
    pub fn remove(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.alive.clear(index);
        true
    }

    /// Checks whether a handle refers to a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let index = entity.index() as usize;
        self.generations.get(index) == Some(&entity.generation()) && self.alive.get(index)
    }

    /// Identity currently stored at `index`, alive or dead.
    ///
    /// An index that was never used reports generation 0.
    #[must_use]
    pub fn entity_by_index(&self, index: u32) -> Entity {
        let generation = self.generations.get(index as usize).copied().unwrap_or(0);
        Entity::new(index, generation)
    }

    /// Read-only view of the alive mask.
    #[inline]
    #[must_use]
    pub fn alive_mask(&self) -> &Bits {
        &self.alive
    }

    /// Number of indices ever handed out (alive plus dead).
    #[inline]
    #[must_use]
    pub fn total_entities(&self) -> usize {
        self.generations.len()
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive.count_ones()
    }

    /// Iterates live entities in ascending index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive.iter_ones().map(|index| self.entity_at(index))
    }

    /// Captures every slot as either alive or dead.
    #[must_use]
    pub fn snapshot(&self) -> EntityManagerSnapshot {
        let mut snapshot = EntityManagerSnapshot::default();
        for index in 0..self.generations.len() {
            let entity = self.entity_at(index);
            if self.alive.get(index) {
                snapshot.alive.push(entity);
            } else {
                snapshot.dead.push(entity);
            }
        }
        snapshot
    }

    /// Replaces the manager state with the one described by `snapshot`.
    pub fn restore(&mut self, snapshot: &EntityManagerSnapshot) {
        let total = snapshot.total_entities();
        self.generations.clear();
        self.generations.resize(total, 0);
        self.alive = Bits::with_capacity(total.max(INITIAL_CAPACITY));

        for entity in &snapshot.dead {
            self.store_generation(*entity);
        }
        for entity in &snapshot.alive {
            self.store_generation(*entity);
            self.alive.set(entity.index() as usize);
        }

        tracing::trace!(
            alive = snapshot.alive.len(),
            dead = snapshot.dead.len(),
            "entity manager restored"
        );
    }

    fn store_generation(&mut self, entity: Entity) {
        let index = entity.index() as usize;
        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }
        self.generations[index] = entity.generation();
    }

    #[allow(clippy::cast_possible_truncation)]
    fn entity_at(&self, index: usize) -> Entity {
        Entity::new(index as u32, self.generations[index])
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EntityManager {
    fn eq(&self, other: &Self) -> bool {
        self.generations == other.generations && self.alive == other.alive
    }
}

impl Eq for EntityManager {}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("total", &self.total_entities())
            .field("alive", &self.alive_count())
            .finish()
    }
}

impl fmt::Display for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        write!(f, "EntityManager {{ alive: [")?;
        for (i, entity) in snapshot.alive.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entity}")?;
        }
        write!(f, "], dead: [")?;
        for (i, entity) in snapshot.dead.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entity}")?;
        }
        write!(f, "] }}")
    }
}
