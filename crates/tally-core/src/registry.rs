//! Module registry and dependency resolution.
//!
//! Descriptors are validated on registration. [`ModuleRegistry::resolve`]
//! takes a selection of module ids, adds the transitive closure of their
//! declared dependencies, and returns a topological order in which every
//! module follows everything it depends on. Ties are broken by declaration
//! order, so the same registry and selection always yield the same order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::context::BuildContext;
use crate::error::{BuildError, ResolveError};
use crate::module::{self, ErasedModule, Module, ModuleId};

type Factory = fn(&mut BuildContext<'_>) -> Result<Box<dyn ErasedModule>, BuildError>;

/// Identifier, declared dependencies, and constructor of one module type.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    id: ModuleId,
    dependencies: &'static [ModuleId],
    factory: Factory,
}

impl ModuleDescriptor {
    /// Describe module type `M`.
    pub fn of<M: Module>() -> Self {
        Self {
            id: M::ID,
            dependencies: M::DEPENDENCIES,
            factory: module::build_erased::<M>,
        }
    }

    /// The module's identifier.
    pub const fn id(&self) -> ModuleId {
        self.id
    }

    /// Declared dependency identifiers.
    pub const fn dependencies(&self) -> &'static [ModuleId] {
        self.dependencies
    }

    pub(crate) fn build(
        &self,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Box<dyn ErasedModule>, BuildError> {
        (self.factory)(ctx)
    }

    fn validate(&self) -> Result<(), ResolveError> {
        let mut seen = BTreeSet::new();
        for &dependency in self.dependencies {
            if dependency == self.id {
                return Err(ResolveError::SelfDependency(self.id));
            }
            if !seen.insert(dependency) {
                return Err(ResolveError::DuplicateDependency {
                    module: self.id,
                    dependency,
                });
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// All module types known to an application, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    descriptors: Vec<ModuleDescriptor>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Register module type `M`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateModule`] if the id is taken, or a
    /// descriptor error if `M` depends on itself or repeats a dependency.
    pub fn register<M: Module>(&mut self) -> Result<&mut Self, ResolveError> {
        self.register_descriptor(ModuleDescriptor::of::<M>())?;
        Ok(self)
    }

    /// Register a descriptor.
    ///
    /// # Errors
    ///
    /// See [`ModuleRegistry::register`].
    pub fn register_descriptor(&mut self, descriptor: ModuleDescriptor) -> Result<(), ResolveError> {
        if self.descriptors.iter().any(|d| d.id == descriptor.id) {
            return Err(ResolveError::DuplicateModule(descriptor.id));
        }
        descriptor.validate()?;
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Registered ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.descriptors.iter().map(|d| d.id)
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.id.as_str() == id)
    }

    /// Order the selected modules and their dependency closure.
    ///
    /// An empty selection means every registered module.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownModule`] for an unregistered
    /// selection, [`ResolveError::UnknownDependency`] for a dependency that
    /// is not registered, and [`ResolveError::DependencyCycle`] if the
    /// closure is not acyclic.
    pub fn resolve<S: AsRef<str>>(
        &self,
        selection: &[S],
    ) -> Result<Vec<&ModuleDescriptor>, ResolveError> {
        let included = self.closure(selection)?;

        // Kahn's algorithm over the included set; the ready set is keyed by
        // declaration index so the lowest-declared ready module goes first.
        let mut remaining: BTreeMap<usize, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &index in &included {
            let deps = self.dependency_indices(index)?;
            remaining.insert(index, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(index);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&index, _)| index)
            .collect();
        let mut order = Vec::with_capacity(included.len());

        while let Some(index) = ready.pop_first() {
            remaining.remove(&index);
            order.push(index);
            for &dependent in dependents.get(&index).map_or(&[][..], Vec::as_slice) {
                if let Some(count) = remaining.get_mut(&dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let stuck: BTreeSet<usize> = remaining.keys().copied().collect();
            return Err(ResolveError::DependencyCycle {
                cycle: self.find_cycle(&stuck)?,
            });
        }

        let resolved: Vec<&ModuleDescriptor> = order
            .into_iter()
            .filter_map(|index| self.descriptors.get(index))
            .collect();
        debug!(
            order = ?resolved.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "Resolved module order"
        );
        Ok(resolved)
    }

    /// Selected indices plus everything they transitively depend on.
    fn closure<S: AsRef<str>>(&self, selection: &[S]) -> Result<BTreeSet<usize>, ResolveError> {
        let mut stack = Vec::new();
        if selection.is_empty() {
            stack.extend(0..self.descriptors.len());
        } else {
            for id in selection {
                let id = id.as_ref();
                let index = self
                    .position(id)
                    .ok_or_else(|| ResolveError::UnknownModule(String::from(id)))?;
                stack.push(index);
            }
        }

        let mut included = BTreeSet::new();
        while let Some(index) = stack.pop() {
            if included.insert(index) {
                stack.extend(self.dependency_indices(index)?);
            }
        }
        Ok(included)
    }

    fn dependency_indices(&self, index: usize) -> Result<Vec<usize>, ResolveError> {
        let Some(descriptor) = self.descriptors.get(index) else {
            return Ok(Vec::new());
        };
        descriptor
            .dependencies
            .iter()
            .map(|&dependency| {
                self.position(dependency.as_str())
                    .ok_or(ResolveError::UnknownDependency {
                        module: descriptor.id,
                        dependency,
                    })
            })
            .collect()
    }

    /// Walk first-declared dependencies from the lowest stuck index until a
    /// module repeats. Every stuck module has at least one stuck dependency.
    fn find_cycle(&self, stuck: &BTreeSet<usize>) -> Result<Vec<ModuleId>, ResolveError> {
        let mut path: Vec<usize> = Vec::new();
        let mut current = stuck.first().copied();
        while let Some(index) = current {
            if let Some(start) = path.iter().position(|&seen| seen == index) {
                let mut cycle: Vec<ModuleId> = path
                    .iter()
                    .skip(start)
                    .filter_map(|&i| self.descriptors.get(i).map(|d| d.id))
                    .collect();
                if let Some(&first) = cycle.first() {
                    cycle.push(first);
                }
                return Ok(cycle);
            }
            path.push(index);
            current = self
                .dependency_indices(index)?
                .into_iter()
                .find(|dep| stuck.contains(dep));
        }
        Ok(path
            .iter()
            .filter_map(|&i| self.descriptors.get(i).map(|d| d.id))
            .collect())
    }
}
