//! # System Scheduler
//!
//! Systems are named callables. Groups are named, ordered lists of
//! bindings to systems; one system may appear in many groups and several
//! times in the same group.
//!
//! ## Rules
//!
//! 1. Bindings refer to systems **by name**. Re-registering a name swaps the
//!    implementation behind every existing binding.
//! 2. Every binding knows its position and its group's size. Both are
//!    renumbered on every membership change.
//! 3. A group is dispatched from a snapshot taken before the first system
//!    runs, so edits made by a running system apply from the next pass.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult, SystemResult};

/// Position of one binding within its group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemMeta {
    system_name: String,
    group_name: String,
    index: usize,
    group_size: usize,
}

impl SystemMeta {
    /// Name of the bound system.
    #[must_use]
    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Name of the group holding the binding.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Position of the binding in its group.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bindings in the group.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }
}

/// Update logic invoked with its binding metadata and a context.
///
/// Closures of the shape `Fn(&SystemMeta, &mut C) -> SystemResult` are
/// systems; register them with [`SystemScheduler::register_fn`].
pub trait System<C>: Send + Sync {
    /// Runs one update.
    ///
    /// # Errors
    ///
    /// Any error aborts the current group pass.
    fn update(&self, meta: &SystemMeta, ctx: &mut C) -> SystemResult;
}

impl<C, F> System<C> for F
where
    F: Fn(&SystemMeta, &mut C) -> SystemResult + Send + Sync,
{
    fn update(&self, meta: &SystemMeta, ctx: &mut C) -> SystemResult {
        self(meta, ctx)
    }
}

struct Binding<C> {
    meta: SystemMeta,
    system: Arc<dyn System<C>>,
}

impl<C> Clone for Binding<C> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            system: Arc::clone(&self.system),
        }
    }
}

fn renumber<C>(bindings: &mut [Binding<C>]) {
    let size = bindings.len();
    for (index, binding) in bindings.iter_mut().enumerate() {
        binding.meta.index = index;
        binding.meta.group_size = size;
    }
}

/// Registry of systems and the groups that order them.
pub struct SystemScheduler<C> {
    systems: HashMap<String, Arc<dyn System<C>>>,
    groups: HashMap<String, Vec<Binding<C>>>,
}

impl<C> SystemScheduler<C> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    /// Registers `system` under `name`, replacing any previous system of
    /// that name in every group that binds it.
    pub fn register_system<S>(&mut self, name: &str, system: S) -> &mut Self
    where
        S: System<C> + 'static,
    {
        let system: Arc<dyn System<C>> = Arc::new(system);
        let mut rebound = 0_usize;
        for binding in self.groups.values_mut().flatten() {
            if binding.meta.system_name == name {
                binding.system = Arc::clone(&system);
                rebound += 1;
            }
        }
        if self.systems.insert(name.to_owned(), system).is_some() {
            tracing::debug!(system = name, rebound, "system replaced");
        } else {
            tracing::debug!(system = name, "system registered");
        }
        self
    }

    /// Registers a closure as a system.
    pub fn register_fn<F>(&mut self, name: &str, system: F) -> &mut Self
    where
        F: Fn(&SystemMeta, &mut C) -> SystemResult + Send + Sync + 'static,
    {
        self.register_system(name, system)
    }

    fn lookup(&self, system: &str) -> EngineResult<Arc<dyn System<C>>> {
        self.systems
            .get(system)
            .cloned()
            .ok_or_else(|| EngineError::UnregisteredSystem(system.to_owned()))
    }

    fn binding(group: &str, system: &str, implementation: Arc<dyn System<C>>) -> Binding<C> {
        Binding {
            meta: SystemMeta {
                system_name: system.to_owned(),
                group_name: group.to_owned(),
                index: 0,
                group_size: 0,
            },
            system: implementation,
        }
    }

    /// Appends a binding of `system` to `group`, creating the group if
    /// needed.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnregisteredSystem`] if `system` is unknown.
    pub fn append_to_group(&mut self, group: &str, system: &str) -> EngineResult<&mut Self> {
        let implementation = self.lookup(system)?;
        let bindings = self.groups.entry(group.to_owned()).or_default();
        bindings.push(Self::binding(group, system, implementation));
        renumber(bindings);
        tracing::debug!(group, system, size = bindings.len(), "system appended to group");
        Ok(self)
    }

    /// Inserts a binding of `system` at `index` in `group`, creating the
    /// group if needed.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnregisteredSystem`] if `system` is unknown,
    /// [`EngineError::InvalidGroupIndex`] if `index` exceeds the group size.
    pub fn insert_into_group(
        &mut self,
        group: &str,
        system: &str,
        index: usize,
    ) -> EngineResult<&mut Self> {
        let implementation = self.lookup(system)?;
        let len = self.groups.get(group).map_or(0, Vec::len);
        if index > len {
            return Err(EngineError::InvalidGroupIndex {
                group: group.to_owned(),
                index,
                len,
            });
        }
        let bindings = self.groups.entry(group.to_owned()).or_default();
        bindings.insert(index, Self::binding(group, system, implementation));
        renumber(bindings);
        tracing::debug!(group, system, index, "system inserted into group");
        Ok(self)
    }

    /// Replaces the whole binding list of `group`.
    ///
    /// Nothing changes unless every name is registered.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnregisteredSystem`] for the first unknown name.
    pub fn replace_all_for_group<I, S>(
        &mut self,
        group: &str,
        systems: I,
    ) -> EngineResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bindings = systems
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.lookup(name)
                    .map(|implementation| Self::binding(group, name, implementation))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        renumber(&mut bindings);
        tracing::debug!(group, size = bindings.len(), "group replaced");
        self.groups.insert(group.to_owned(), bindings);
        Ok(self)
    }

    /// Removes every binding of `system` from `group`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownGroup`] if `group` does not exist.
    pub fn remove_from_group(&mut self, group: &str, system: &str) -> EngineResult<usize> {
        let bindings = self
            .groups
            .get_mut(group)
            .ok_or_else(|| EngineError::UnknownGroup(group.to_owned()))?;
        let before = bindings.len();
        bindings.retain(|binding| binding.meta.system_name != system);
        renumber(bindings);
        let removed = before - bindings.len();
        tracing::debug!(group, system, removed, "system removed from group");
        Ok(removed)
    }

    /// Unregisters `system` and drops its bindings from every group.
    /// Returns `false` if it was not registered.
    pub fn remove_system(&mut self, system: &str) -> bool {
        if self.systems.remove(system).is_none() {
            return false;
        }
        for bindings in self.groups.values_mut() {
            let before = bindings.len();
            bindings.retain(|binding| binding.meta.system_name != system);
            if bindings.len() != before {
                renumber(bindings);
            }
        }
        tracing::debug!(system, "system unregistered");
        true
    }

    /// Dispatches `group` in stored order against `ctx`.
    ///
    /// An unknown group is a no-op.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemFailed`] for the first failing system; later
    /// bindings do not run.
    pub fn update_group(&self, group: &str, ctx: &mut C) -> EngineResult<()> {
        match self.snapshot_group(group) {
            Some(snapshot) => snapshot.dispatch(ctx),
            None => Ok(()),
        }
    }

    /// Copies the current bindings of `group`.
    ///
    /// The copy owns its systems, so it can be dispatched against a context
    /// that owns this scheduler.
    #[must_use]
    pub fn snapshot_group(&self, group: &str) -> Option<GroupSnapshot<C>> {
        self.groups.get(group).map(|bindings| GroupSnapshot {
            group: group.to_owned(),
            bindings: bindings.clone(),
        })
    }

    /// Metadata of every binding in `group`, in dispatch order.
    #[must_use]
    pub fn group_bindings(&self, group: &str) -> Vec<SystemMeta> {
        self.groups
            .get(group)
            .map(|bindings| bindings.iter().map(|b| b.meta.clone()).collect())
            .unwrap_or_default()
    }

    /// Checks whether `group` exists.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Checks whether `system` is registered.
    #[must_use]
    pub fn has_system(&self, system: &str) -> bool {
        self.systems.contains_key(system)
    }

    /// Names of registered systems, in no particular order.
    pub fn system_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.keys().map(String::as_str)
    }

    /// Names of existing groups, in no particular order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }
}

impl<C> Default for SystemScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for SystemScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemScheduler")
            .field("systems", &self.systems.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

/// Frozen copy of a group's bindings. See [`SystemScheduler::snapshot_group`].
pub struct GroupSnapshot<C> {
    group: String,
    bindings: Vec<Binding<C>>,
}

impl<C> GroupSnapshot<C> {
    /// Name of the captured group.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Number of captured bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when the group had no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Runs every captured binding in order.
    ///
    /// # Errors
    ///
    /// [`EngineError::SystemFailed`] for the first failing system.
    pub fn dispatch(&self, ctx: &mut C) -> EngineResult<()> {
        for binding in &self.bindings {
            binding
                .system
                .update(&binding.meta, ctx)
                .map_err(|source| EngineError::SystemFailed {
                    system: binding.meta.system_name.clone(),
                    group: self.group.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
