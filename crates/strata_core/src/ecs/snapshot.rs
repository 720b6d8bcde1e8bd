//! # Entity Snapshots
//!
//! A snapshot is two sequences: every alive entity and every dead slot with
//! its stored generation. That is enough to rebuild an [`EntityManager`]
//! exactly.
//!
//! Besides serde, snapshots have a compact binary block:
//!
//! ```text
//! [alive_len: u64][dead_len: u64][alive entities...][dead entities...]
//! ```
//!
//! Each entity is its `#[repr(C)]` `{index: u32, generation: u32}` layout.
//! All values are in native byte order; the block is meant for save states
//! on the same machine, not for the wire.
//!
//! [`EntityManager`]: super::EntityManager

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use super::Entity;
use crate::error::{CoreError, CoreResult};

const HEADER_LEN: usize = 2 * size_of::<u64>();
const ENTITY_LEN: usize = size_of::<Entity>();

/// Alive and dead entity sequences captured from an entity manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityManagerSnapshot {
    /// Entities alive at snapshot time, ascending by index.
    pub alive: Vec<Entity>,
    /// Dead slots with their stored generation, ascending by index.
    pub dead: Vec<Entity>,
}

impl EntityManagerSnapshot {
    /// Number of slots the snapshot describes.
    #[must_use]
    pub fn total_entities(&self) -> usize {
        self.alive.len() + self.dead.len()
    }

    /// Encodes the snapshot as a binary block.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.total_entities() * ENTITY_LEN);
        bytes.extend_from_slice(bytemuck::bytes_of(&(self.alive.len() as u64)));
        bytes.extend_from_slice(bytemuck::bytes_of(&(self.dead.len() as u64)));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.alive));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.dead));
        bytes
    }

    /// Decodes a block produced by [`EntityManagerSnapshot::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedSnapshot`] when the header is truncated
    /// or the body length disagrees with the header counts.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CoreError::MalformedSnapshot(format!(
                "expected at least {HEADER_LEN} header bytes, got {}",
                bytes.len()
            )));
        }

        let alive_len = read_count(&bytes[..8])?;
        let dead_len = read_count(&bytes[8..HEADER_LEN])?;
        let body = &bytes[HEADER_LEN..];

        let expected = alive_len
            .checked_add(dead_len)
            .and_then(|count| count.checked_mul(ENTITY_LEN))
            .ok_or_else(|| CoreError::MalformedSnapshot("entity counts overflow".into()))?;
        if body.len() != expected {
            return Err(CoreError::MalformedSnapshot(format!(
                "header announces {alive_len} alive and {dead_len} dead entities \
                 ({expected} bytes) but body has {} bytes",
                body.len()
            )));
        }

        let mut entities = body
            .chunks_exact(ENTITY_LEN)
            .map(bytemuck::pod_read_unaligned::<Entity>);
        let alive = entities.by_ref().take(alive_len).collect();
        let dead = entities.collect();
        Ok(Self { alive, dead })
    }
}

fn read_count(bytes: &[u8]) -> CoreResult<usize> {
    let count: u64 = bytemuck::pod_read_unaligned(bytes);
    usize::try_from(count)
        .map_err(|_| CoreError::MalformedSnapshot(format!("entity count {count} too large")))
}
