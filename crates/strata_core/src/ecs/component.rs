//! # Component System
//!
//! Components are plain data attached to entities. Each component type gets
//! its own [`ComponentPool`](super::ComponentPool), keyed by `TypeId` in the
//! [`ComponentRegistry`](super::ComponentRegistry).

/// Marker trait for ECS components.
///
/// Components must be:
/// - `PartialEq`: entity comparison checks component values pairwise
/// - `Send`: the world may be handed to the loop thread
/// - `'static`: pools are looked up by `TypeId`
///
/// # Example
///
/// ```rust
/// use strata_core::Component;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: PartialEq + Send + 'static {}
