// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! System execution framework
//!
//! A system declares which components it reads and which it writes, and
//! runs in two phases:
//!
//! 1. **Evaluate**: read the world through a shared borrow and compute new
//!    values for every matching row. Rows only ever see the world as it was
//!    before the stage started, so row order cannot leak into results.
//! 2. **Commit**: write the staged values back into their columns.
//!
//! A failed evaluation stages nothing, so a stage either commits every row
//! or none of them. With the `parallel` feature enabled, rows of a single
//! system are evaluated on the rayon thread pool once their count reaches
//! the configured threshold.
//!
//! Most systems are built with [`system`], which wraps a plain function from
//! read values to write values:
//!
//! ```
//! use sixdof_ecs::ecs::{system, System};
//! use sixdof_ecs::ecs::components::{Force, Inertia};
//! use glam::DVec3;
//!
//! let weight = system::<(Inertia, Force), Force, _>("weight", |(inertia, force)| {
//!     force + Force::from_linear(DVec3::new(0.0, -9.81 * inertia.mass(), 0.0))
//! });
//! assert_eq!(weight.name(), "weight");
//! ```

use crate::ecs::query::{self, Query, QueryData};
use crate::ecs::{Column, Component, ComponentId, Entity, World};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Components a system reads and writes
///
/// Optional components are accessed only when their column exists; they are
/// exempt from the schema check performed before a pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAccess {
    reads: BTreeSet<ComponentId>,
    writes: BTreeSet<ComponentId>,
    optional: BTreeSet<ComponentId>,
    duplicate_writes: Vec<ComponentId>,
}

impl SystemAccess {
    /// Empty access set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read
    pub fn read(mut self, id: ComponentId) -> Self {
        self.reads.insert(id);
        self
    }

    /// Add a write; declaring the same write twice is recorded and later
    /// rejected when the system is composed into a pipeline
    pub fn write(mut self, id: ComponentId) -> Self {
        if !self.writes.insert(id) {
            self.duplicate_writes.push(id);
        }
        self
    }

    /// Mark a component as optional
    pub fn optional(mut self, id: ComponentId) -> Self {
        self.optional.insert(id);
        self
    }

    /// Components read
    pub fn reads(&self) -> &BTreeSet<ComponentId> {
        &self.reads
    }

    /// Components written
    pub fn writes(&self) -> &BTreeSet<ComponentId> {
        &self.writes
    }

    /// Writes declared more than once
    pub fn duplicate_writes(&self) -> &[ComponentId] {
        &self.duplicate_writes
    }

    /// Components that must be registered for the system to run
    pub fn required(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.reads
            .union(&self.writes)
            .filter(|id| !self.optional.contains(id))
            .copied()
    }

    /// Components both systems touch where at least one of them writes
    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        !self.writes.is_disjoint(&other.writes)
            || !self.writes.is_disjoint(&other.reads)
            || !self.reads.is_disjoint(&other.writes)
    }

    /// First component both systems write
    pub fn shared_write(&self, other: &SystemAccess) -> Option<ComponentId> {
        self.writes.intersection(&other.writes).next().copied()
    }
}

/// Execution settings handed to every system evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecContext {
    /// Minimum row count for row-parallel evaluation, `None` to disable
    pub parallel_rows: Option<usize>,
}

impl ExecContext {
    /// Evaluate every row on the calling thread
    pub fn sequential() -> Self {
        ExecContext { parallel_rows: None }
    }

    /// Whether `rows` rows should be evaluated in parallel
    pub fn use_parallel(&self, rows: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel_rows.is_some_and(|threshold| rows >= threshold)
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        ExecContext::sequential()
    }
}

type CommitFn = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Values computed by an evaluation, waiting to be written back
#[derive(Default)]
pub struct StagedWrites {
    commits: Vec<CommitFn>,
    rows: usize,
}

impl StagedWrites {
    /// Nothing staged
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage new values for one component column
    ///
    /// Every entity must already hold the component; writes never add
    /// components to entities.
    pub fn push<T: Component>(&mut self, rows: Vec<(Entity, T)>) {
        if rows.is_empty() {
            return;
        }
        self.rows = self.rows.max(rows.len());
        self.commits.push(Box::new(move |world: &mut World| {
            let column: &mut Column<T> = world.column_mut::<T>()?;
            for (entity, value) in rows {
                match column.get_mut(entity) {
                    Some(slot) => *slot = value,
                    None => {
                        return Err(Error::MissingComponent {
                            entity,
                            component: T::name(),
                        })
                    }
                }
            }
            Ok(())
        }));
    }

    /// Number of rows evaluated
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write every staged column back into the world
    pub fn commit(self, world: &mut World) -> Result<()> {
        for commit in self.commits {
            commit(world)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StagedWrites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedWrites")
            .field("columns", &self.commits.len())
            .field("rows", &self.rows)
            .finish()
    }
}

/// Map `f` over `inputs`, on the rayon pool when `parallel` is set
///
/// Results keep input order either way, and the error of the lowest failing
/// row is the one reported.
#[cfg(feature = "parallel")]
pub(crate) fn map_rows<I, O, F>(inputs: &[I], parallel: bool, f: F) -> Result<Vec<O>>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> Result<O> + Sync + Send,
{
    if parallel {
        let results: Vec<Result<O>> = inputs.par_iter().map(f).collect();
        results.into_iter().collect()
    } else {
        inputs.iter().map(f).collect()
    }
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_rows<I, O, F>(inputs: &[I], _parallel: bool, f: F) -> Result<Vec<O>>
where
    F: Fn(&I) -> Result<O>,
{
    inputs.iter().map(f).collect()
}

/// Trait for systems that operate on the ECS world
///
/// Systems are stateless between ticks: `evaluate` takes `&self` and a
/// shared world, and everything it produces goes through [`StagedWrites`].
pub trait System: Send + Sync {
    /// Unique name within a pipeline, used for ordering and errors
    fn name(&self) -> &str;

    /// Declared reads and writes
    fn access(&self) -> &SystemAccess;

    /// Compute new values from the current world without modifying it
    fn evaluate(&self, world: &World, ctx: &ExecContext) -> Result<StagedWrites>;

    /// Check that every required column exists in `world`
    fn validate(&self, world: &World) -> Result<()> {
        match self.access().required().find(|id| !world.has_column(*id)) {
            Some(missing) => Err(Error::ComponentNotRegistered {
                component: missing.name(),
            }),
            None => Ok(()),
        }
    }

    /// Evaluate, then commit
    fn run(&self, world: &mut World, ctx: &ExecContext) -> Result<usize> {
        let staged = self.evaluate(world, ctx)?;
        let rows = staged.rows();
        staged.commit(world)?;
        Ok(rows)
    }
}

/// Components a [`QuerySystem`] produces for each row
pub trait WriteSet: Copy + Send + Sync + 'static {
    /// Append the ids of every written component
    fn component_ids(ids: &mut Vec<ComponentId>);

    /// Name of the first non-finite component, if any
    fn non_finite(&self) -> Option<&'static str>;

    /// Stage one column per written component
    fn stage(rows: &[(Entity, Self)], writes: &mut StagedWrites);
}

impl<T: Component> WriteSet for T {
    fn component_ids(ids: &mut Vec<ComponentId>) {
        ids.push(ComponentId::of::<T>());
    }

    fn non_finite(&self) -> Option<&'static str> {
        (!self.is_finite()).then(T::name)
    }

    fn stage(rows: &[(Entity, Self)], writes: &mut StagedWrites) {
        writes.push(rows.to_vec());
    }
}

macro_rules! impl_write_set_tuple {
    ($(($idx:tt, $name:ident)),+) => {
        impl<$($name: Component),+> WriteSet for ($($name,)+) {
            fn component_ids(ids: &mut Vec<ComponentId>) {
                $(ids.push(ComponentId::of::<$name>());)+
            }

            fn non_finite(&self) -> Option<&'static str> {
                $(
                    if !self.$idx.is_finite() {
                        return Some($name::name());
                    }
                )+
                None
            }

            fn stage(rows: &[(Entity, Self)], writes: &mut StagedWrites) {
                $(
                    writes.push::<$name>(rows.iter().map(|(entity, row)| (*entity, row.$idx)).collect());
                )+
            }
        }
    };
}

impl_write_set_tuple!((0, W0));
impl_write_set_tuple!((0, W0), (1, W1));
impl_write_set_tuple!((0, W0), (1, W1), (2, W2));
impl_write_set_tuple!((0, W0), (1, W1), (2, W2), (3, W3));
impl_write_set_tuple!((0, W0), (1, W1), (2, W2), (3, W3), (4, W4));

/// A system defined by a read set, a write set and a pure per-row function
///
/// The system matches every entity holding all of `R` and all of `W`, calls
/// the function with a copy of the `R` values, and stages the returned `W`
/// values. Outputs are checked for NaN and infinities before anything is
/// staged.
pub struct QuerySystem<R, W, F> {
    name: String,
    access: SystemAccess,
    compute: F,
    marker: PhantomData<fn(R) -> W>,
}

impl<R, W, F> QuerySystem<R, W, F>
where
    R: QueryData,
    W: WriteSet,
    F: Fn(R::Values) -> W + Send + Sync,
{
    /// Create a system named `name`
    pub fn new(name: impl Into<String>, compute: F) -> Self {
        let mut access = SystemAccess::new();
        for id in query::component_ids::<R>() {
            access = access.read(id);
        }
        let mut writes = Vec::new();
        W::component_ids(&mut writes);
        for id in writes {
            access = access.write(id);
        }
        QuerySystem {
            name: name.into(),
            access,
            compute,
            marker: PhantomData,
        }
    }

    fn compute_row(&self, entity: Entity, values: R::Values) -> Result<(Entity, W)> {
        let output = (self.compute)(values);
        match output.non_finite() {
            Some(component) => Err(Error::NonFinite {
                stage: self.name.clone(),
                component,
                entity,
            }),
            None => Ok((entity, output)),
        }
    }
}

/// Build a [`QuerySystem`] from a per-row function
pub fn system<R, W, F>(name: impl Into<String>, compute: F) -> QuerySystem<R, W, F>
where
    R: QueryData,
    W: WriteSet,
    F: Fn(R::Values) -> W + Send + Sync,
{
    QuerySystem::new(name, compute)
}

impl<R, W, F> System for QuerySystem<R, W, F>
where
    R: QueryData,
    W: WriteSet + QueryData,
    F: Fn(R::Values) -> W + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> &SystemAccess {
        &self.access
    }

    fn evaluate(&self, world: &World, ctx: &ExecContext) -> Result<StagedWrites> {
        let query: Query<'_, (R, W)> = world.query()?;
        let inputs: Vec<(Entity, R::Values)> = query
            .iter()
            .map(|(entity, (read, _))| (entity, R::values(read)))
            .collect();

        let outputs = map_rows(&inputs, ctx.use_parallel(inputs.len()), |(entity, values)| {
            self.compute_row(*entity, *values)
        })?;

        log::trace!("system `{}` evaluated {} rows", self.name, outputs.len());
        let mut staged = StagedWrites::new();
        W::stage(&outputs, &mut staged);
        Ok(staged)
    }
}

impl<R, W, F> fmt::Debug for QuerySystem<R, W, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySystem")
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Force, Inertia, WorldPos, WorldVel};
    use glam::DVec3;

    fn world_with_chain() -> (World, Vec<Entity>) {
        let mut world = World::new();
        let entities = (0..4)
            .map(|i| {
                world
                    .spawn((
                        WorldPos::from_linear(DVec3::new(i as f64, 0.0, 0.0)),
                        WorldVel::zero(),
                    ))
                    .unwrap()
            })
            .collect();
        (world, entities)
    }

    #[test]
    fn test_access_conflicts() {
        let pos = ComponentId::of::<WorldPos>();
        let force = ComponentId::of::<Force>();
        let a = SystemAccess::new().read(pos).write(force);
        let b = SystemAccess::new().read(force);
        let c = SystemAccess::new().read(pos);

        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
        assert!(!a.conflicts_with(&c));
        assert_eq!(a.shared_write(&a), Some(force));
    }

    #[test]
    fn test_duplicate_write_recorded() {
        let force = ComponentId::of::<Force>();
        let access = SystemAccess::new().write(force).write(force);
        assert_eq!(access.duplicate_writes(), &[force]);
        assert_eq!(access.writes().len(), 1);
    }

    #[test]
    fn test_optional_not_required() {
        let force = ComponentId::of::<Force>();
        let pos = ComponentId::of::<WorldPos>();
        let access = SystemAccess::new().read(pos).write(force).optional(force);
        let required: Vec<_> = access.required().collect();
        assert_eq!(required, vec![pos]);
    }

    #[test]
    fn test_two_stage_chain() {
        let (mut world, entities) = world_with_chain();
        let snapshot: Vec<DVec3> = entities
            .iter()
            .map(|e| world.get::<WorldPos>(*e).unwrap().linear())
            .collect();

        let shift = system::<WorldPos, WorldVel, _>("shift", |pos| {
            WorldVel::from_linear(pos.linear() - DVec3::X)
        });
        let copy = system::<WorldVel, WorldPos, _>("copy", |vel| {
            WorldPos::from_linear(vel.linear())
        });

        shift.run(&mut world, &ExecContext::sequential()).unwrap();
        copy.run(&mut world, &ExecContext::sequential()).unwrap();

        for (entity, before) in entities.iter().zip(snapshot) {
            let after = world.get::<WorldPos>(*entity).unwrap().linear();
            assert_eq!(after, before - DVec3::X);
        }
    }

    #[test]
    fn test_non_finite_output_aborts_stage() {
        let (mut world, entities) = world_with_chain();
        let poison = system::<WorldPos, WorldVel, _>("poison", |pos| {
            if pos.linear().x >= 2.0 {
                WorldVel::from_linear(DVec3::new(f64::NAN, 0.0, 0.0))
            } else {
                WorldVel::from_linear(DVec3::ONE)
            }
        });

        let err = poison
            .run(&mut world, &ExecContext::sequential())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NonFinite { component: "WorldVel", entity, .. } if entity == entities[2]
        ));
        // Nothing committed, not even the rows that evaluated cleanly
        assert_eq!(world.get::<WorldVel>(entities[0]).unwrap(), &WorldVel::zero());
    }

    #[test]
    fn test_writes_only_touch_matching_entities() {
        let mut world = World::new();
        let with_mass = world
            .spawn((Inertia::from_mass(2.0), Force::zero()))
            .unwrap();
        let without_mass = world.spawn(Force::zero()).unwrap();

        let weight = system::<Inertia, Force, _>("weight", |inertia| {
            Force::from_linear(DVec3::new(0.0, -inertia.mass(), 0.0))
        });
        let rows = weight.run(&mut world, &ExecContext::sequential()).unwrap();

        assert_eq!(rows, 1);
        assert_eq!(world.get::<Force>(with_mass).unwrap().linear().y, -2.0);
        assert_eq!(world.get::<Force>(without_mass).unwrap(), &Force::zero());
    }

    #[test]
    fn test_tuple_write_set() {
        let (mut world, entities) = world_with_chain();
        let stop = system::<WorldPos, (WorldPos, WorldVel), _>("stop", |pos| {
            (
                WorldPos::from_linear(pos.linear() * 2.0),
                WorldVel::from_linear(DVec3::Y),
            )
        });
        stop.run(&mut world, &ExecContext::sequential()).unwrap();

        assert_eq!(world.get::<WorldPos>(entities[3]).unwrap().linear().x, 6.0);
        assert_eq!(world.get::<WorldVel>(entities[3]).unwrap().linear(), DVec3::Y);
    }

    #[test]
    fn test_validate_reports_missing_column() {
        let world = World::new();
        let weight = system::<Inertia, Force, _>("weight", |_| Force::zero());
        assert!(matches!(
            weight.validate(&world),
            Err(Error::ComponentNotRegistered { .. })
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_rows_match_sequential() {
        let build = || {
            let mut world = World::new();
            for i in 0..256 {
                world
                    .spawn((
                        WorldPos::from_linear(DVec3::new(i as f64, 1.0, -1.0)),
                        WorldVel::zero(),
                    ))
                    .unwrap();
            }
            world
        };
        let spin = system::<WorldPos, WorldVel, _>("spin", |pos| {
            WorldVel::from_linear(pos.linear().cross(DVec3::Z) * 0.5)
        });

        let mut sequential = build();
        let mut parallel = build();
        spin.run(&mut sequential, &ExecContext::sequential()).unwrap();
        spin.run(&mut parallel, &ExecContext { parallel_rows: Some(16) })
            .unwrap();

        let a = sequential.query::<WorldVel>().unwrap().values();
        let b = parallel.query::<WorldVel>().unwrap().values();
        assert_eq!(a, b);
    }
}
