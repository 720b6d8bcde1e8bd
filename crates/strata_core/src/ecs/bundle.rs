//! # Component Bundles
//!
//! Tuples of components attached in one call.

use super::component::Component;
use super::registry::ComponentRegistry;
use super::Entity;

/// A group of components attached together.
///
/// Implemented for tuples of up to eight components. Liveness is checked by
/// the caller before `attach_to` runs.
pub trait Bundle {
    /// Attaches every component of the bundle to `entity`.
    fn attach_to(self, components: &mut ComponentRegistry, entity: Entity);
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn attach_to(self, components: &mut ComponentRegistry, entity: Entity) {
                let ($($name,)+) = self;
                $(components.attach_ignoring_state(entity, $name);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
