//! # Entity Filters
//!
//! Queries are set algebra over bitmasks:
//!
//! ```text
//! alive & all_1 & all_2 & ... & !none_1 & !none_2 & ...
//! ```
//!
//! Every term is a word-parallel pass over `u64`s, so a query costs
//! O(words) regardless of how many attributes it names.

use std::any::TypeId;

use super::component::Component;
use super::registry::ComponentRegistry;
use super::tags::TagRegistry;
use super::{Entity, EntityManager};
use crate::bits::Bits;

/// Builder describing which entities a query selects.
///
/// # Example
///
/// ```rust
/// use strata_core::{Component, EntityFilter};
///
/// #[derive(PartialEq)]
/// struct Position;
/// impl Component for Position {}
///
/// #[derive(PartialEq)]
/// struct Frozen;
/// impl Component for Frozen {}
///
/// let movers = EntityFilter::new()
///     .all::<Position>()
///     .none::<Frozen>()
///     .none_tags(["static"]);
/// assert_eq!(movers.required_components().len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityFilter {
    all_components: Vec<TypeId>,
    none_components: Vec<TypeId>,
    all_tags: Vec<String>,
    none_tags: Vec<String>,
}

impl EntityFilter {
    /// Filter matching every live entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component `T`.
    #[must_use]
    pub fn all<T: Component>(mut self) -> Self {
        self.all_components.push(TypeId::of::<T>());
        self
    }

    /// Excludes entities with component `T`.
    #[must_use]
    pub fn none<T: Component>(mut self) -> Self {
        self.none_components.push(TypeId::of::<T>());
        self
    }

    /// Requires every tag in `tags`.
    #[must_use]
    pub fn all_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Excludes entities carrying any tag in `tags`.
    #[must_use]
    pub fn none_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.none_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Required component types.
    #[must_use]
    pub fn required_components(&self) -> &[TypeId] {
        &self.all_components
    }

    /// Excluded component types.
    #[must_use]
    pub fn excluded_components(&self) -> &[TypeId] {
        &self.none_components
    }

    /// Required tags.
    #[must_use]
    pub fn required_tags(&self) -> &[String] {
        &self.all_tags
    }

    /// Excluded tags.
    #[must_use]
    pub fn excluded_tags(&self) -> &[String] {
        &self.none_tags
    }
}

/// Computes the index mask of live entities matching `filter`.
///
/// A required component or tag that was never registered empties the result
/// without evaluating further terms. Unknown excluded terms are skipped.
#[must_use]
pub fn select_entity_indexes(
    entities: &EntityManager,
    components: &ComponentRegistry,
    tags: &TagRegistry,
    filter: &EntityFilter,
) -> Bits {
    let mut result = entities.alive_mask().clone();

    components.retain_with_all(&mut result, &filter.all_components);
    if result.is_empty() {
        return result;
    }
    tags.retain_with_all(&mut result, &filter.all_tags);
    if result.is_empty() {
        return result;
    }

    components.remove_with_any(&mut result, &filter.none_components);
    tags.remove_with_any(&mut result, &filter.none_tags);
    result
}

/// Checks a single entity against `filter` without building a mask.
#[must_use]
pub fn matches(
    entities: &EntityManager,
    components: &ComponentRegistry,
    tags: &TagRegistry,
    entity: Entity,
    filter: &EntityFilter,
) -> bool {
    entities.is_alive(entity)
        && filter
            .all_components
            .iter()
            .all(|&type_id| components.has_type(entities, entity, type_id))
        && filter
            .all_tags
            .iter()
            .all(|tag| tags.has(entities, entity, tag))
        && !filter
            .none_components
            .iter()
            .any(|&type_id| components.has_type(entities, entity, type_id))
        && !filter
            .none_tags
            .iter()
            .any(|tag| tags.has(entities, entity, tag))
}
