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
//! Pipeline composition and staged execution
//!
//! A [`PipelineBuilder`] collects systems, resolves their ordering and
//! produces an immutable [`Pipeline`]. Ordering is decided once, at build
//! time:
//!
//! - Systems run in registration order unless `after`/`before` constraints
//!   say otherwise.
//! - Two systems that write the same component must be ordered explicitly;
//!   otherwise the build fails with [`Error::AmbiguousWrite`].
//! - A system that reads what another writes runs after it if it was
//!   registered later, and before it if it was registered earlier.
//! - Constraint cycles fail with [`Error::CyclicDependency`].
//! - The terminal stage (the integrator) always runs last.
//!
//! The resolved order is split into batches. In [`ExecutionMode::Parallel`]
//! a batch holds every system whose predecessors all ran in earlier
//! batches; such systems never touch each other's writes, so they are
//! evaluated concurrently on the rayon pool and committed in pipeline
//! order. In [`ExecutionMode::Sequential`] each batch holds one system.
//!
//! # Examples
//!
//! ```
//! use sixdof_ecs::ecs::scheduler::{PipelineBuilder, SystemOrder};
//! use sixdof_ecs::ecs::system;
//! use sixdof_ecs::ecs::components::{Force, Inertia};
//! use glam::DVec3;
//!
//! let mut builder = PipelineBuilder::new();
//! builder.add_system(system::<(Inertia, Force), Force, _>("weight", |(inertia, force)| {
//!     force + Force::from_linear(DVec3::new(0.0, -9.81 * inertia.mass(), 0.0))
//! }));
//! builder.add_system_ordered(
//!     system::<Force, Force, _>("damp", |force| Force::from_linear(force.linear() * 0.5)),
//!     SystemOrder::new().after("weight"),
//! );
//! let pipeline = builder.build().unwrap();
//! assert_eq!(pipeline.stage_names(), vec!["weight", "damp"]);
//! ```

use crate::ecs::system::{map_rows, ExecContext, StagedWrites};
use crate::ecs::{System, World};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// How batches of independent systems are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One system at a time, in pipeline order
    #[default]
    Sequential,
    /// Independent systems evaluated concurrently, committed in order
    Parallel,
}

/// Ordering constraints for one system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemOrder {
    after: Vec<String>,
    before: Vec<String>,
}

impl SystemOrder {
    /// No constraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Run after the named system
    pub fn after(mut self, system: impl Into<String>) -> Self {
        self.after.push(system.into());
        self
    }

    /// Run before the named system
    pub fn before(mut self, system: impl Into<String>) -> Self {
        self.before.push(system.into());
        self
    }
}

struct Registered {
    system: Arc<dyn System>,
    order: SystemOrder,
}

/// Collects systems and resolves them into a [`Pipeline`]
pub struct PipelineBuilder {
    systems: Vec<Registered>,
    terminal: Option<Arc<dyn System>>,
    mode: ExecutionMode,
    parallel_rows: Option<usize>,
    time_step: Option<f64>,
}

impl PipelineBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        PipelineBuilder {
            systems: Vec::new(),
            terminal: None,
            mode: ExecutionMode::Sequential,
            parallel_rows: None,
            time_step: None,
        }
    }

    /// Add a system in registration order
    pub fn add_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.add_system_ordered(system, SystemOrder::new())
    }

    /// Add a system with ordering constraints
    pub fn add_system_ordered<S: System + 'static>(
        &mut self,
        system: S,
        order: SystemOrder,
    ) -> &mut Self {
        self.systems.push(Registered {
            system: Arc::new(system),
            order,
        });
        self
    }

    /// Add an already boxed system
    pub fn add_boxed(&mut self, system: Box<dyn System>) -> &mut Self {
        self.systems.push(Registered {
            system: Arc::from(system),
            order: SystemOrder::new(),
        });
        self
    }

    /// Set the stage that runs after every other system
    pub fn terminal<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.terminal = Some(Arc::new(system));
        self
    }

    /// Record the fixed timestep the terminal stage advances by
    pub fn time_step(&mut self, dt: f64) -> &mut Self {
        self.time_step = Some(dt);
        self
    }

    /// Choose sequential or parallel batch execution
    pub fn execution_mode(&mut self, mode: ExecutionMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Evaluate rows in parallel once a system matches at least `threshold`
    /// entities; `None` keeps row evaluation on the calling thread
    pub fn parallel_rows(&mut self, threshold: Option<usize>) -> &mut Self {
        self.parallel_rows = threshold;
        self
    }

    /// Number of systems added so far, excluding the terminal stage
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Resolve ordering and produce the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let n = self.systems.len();
        let names: Vec<&str> = self.systems.iter().map(|r| r.system.name()).collect();

        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, registered) in self.systems.iter().enumerate() {
            if index.insert(names[i], i).is_some() {
                return Err(Error::DuplicateSystem(names[i].to_string()));
            }
            check_duplicate_writes(registered.system.as_ref())?;
        }
        if let Some(terminal) = &self.terminal {
            if index.contains_key(terminal.name()) {
                return Err(Error::DuplicateSystem(terminal.name().to_string()));
            }
            check_duplicate_writes(terminal.as_ref())?;
        }

        let lookup = |system: usize, target: &str| {
            index.get(target).copied().ok_or_else(|| Error::UnknownSystem {
                system: names[system].to_string(),
                target: target.to_string(),
            })
        };

        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (i, registered) in self.systems.iter().enumerate() {
            for target in &registered.order.after {
                edges[lookup(i, target.as_str())?].insert(i);
            }
            for target in &registered.order.before {
                edges[i].insert(lookup(i, target.as_str())?);
            }
        }

        if let Some(cycle) = find_cycle(&edges) {
            return Err(Error::CyclicDependency {
                systems: cycle.into_iter().map(|i| names[i].to_string()).collect(),
            });
        }

        // Pairs that touch each other's writes need an order. Explicit
        // constraints win; write/write pairs without one are rejected and
        // read/write pairs fall back to registration order.
        let mut reach = Reachability::new(&edges);
        for i in 0..n {
            for j in (i + 1)..n {
                let first = self.systems[i].system.access();
                let second = self.systems[j].system.access();
                if !first.conflicts_with(second) || reach.ordered(i, j) {
                    continue;
                }
                if let Some(component) = first.shared_write(second) {
                    return Err(Error::AmbiguousWrite {
                        component: component.name(),
                        first: names[i].to_string(),
                        second: names[j].to_string(),
                    });
                }
                edges[i].insert(j);
                reach.add_edge(i, j);
            }
        }

        let order = topological_order(&edges);
        let batches = match self.mode {
            ExecutionMode::Sequential => order.iter().map(|&i| vec![i]).collect(),
            ExecutionMode::Parallel => level_batches(&edges, &order),
        };

        // Re-index stages into execution order
        let mut position = vec![0; n];
        for (pos, &i) in order.iter().enumerate() {
            position[i] = pos;
        }
        let mut stages: Vec<Arc<dyn System>> = order
            .iter()
            .map(|&i| Arc::clone(&self.systems[i].system))
            .collect();
        let mut batches: Vec<Vec<usize>> = batches
            .into_iter()
            .map(|batch: Vec<usize>| batch.into_iter().map(|i| position[i]).collect())
            .collect();
        if let Some(terminal) = self.terminal {
            batches.push(vec![stages.len()]);
            stages.push(terminal);
        }

        let pipeline = Pipeline {
            stages,
            batches,
            mode: self.mode,
            ctx: ExecContext {
                parallel_rows: self.parallel_rows,
            },
            time_step: self.time_step,
        };
        log::info!(
            "composed pipeline [{}] in {} batches ({:?})",
            pipeline.stage_names().join(", "),
            pipeline.batches.len(),
            pipeline.mode
        );
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_duplicate_writes(system: &dyn System) -> Result<()> {
    match system.access().duplicate_writes().first() {
        Some(component) => Err(Error::DuplicateWrite {
            system: system.name().to_string(),
            component: component.name(),
        }),
        None => Ok(()),
    }
}

/// Depth-first search for a cycle; returns it with the first node repeated
/// at the end
fn find_cycle(edges: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    fn visit(
        node: usize,
        edges: &[BTreeSet<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::OnStack;
        stack.push(node);
        for &next in &edges[node] {
            match marks[next] {
                Mark::OnStack => {
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(next, edges, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; edges.len()];
    let mut stack = Vec::new();
    for node in 0..edges.len() {
        if marks[node] == Mark::Unvisited {
            if let Some(cycle) = visit(node, edges, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Transitive closure of the ordering graph
struct Reachability {
    reach: Vec<Vec<bool>>,
}

impl Reachability {
    fn new(edges: &[BTreeSet<usize>]) -> Self {
        let n = edges.len();
        let mut reach = vec![vec![false; n]; n];
        for (start, row) in reach.iter_mut().enumerate() {
            let mut pending: Vec<usize> = edges[start].iter().copied().collect();
            while let Some(node) = pending.pop() {
                if !row[node] {
                    row[node] = true;
                    pending.extend(edges[node].iter().copied());
                }
            }
        }
        Reachability { reach }
    }

    fn ordered(&self, a: usize, b: usize) -> bool {
        self.reach[a][b] || self.reach[b][a]
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        let n = self.reach.len();
        let sources: Vec<usize> = (0..n).filter(|&a| a == from || self.reach[a][from]).collect();
        let targets: Vec<usize> = (0..n).filter(|&b| b == to || self.reach[to][b]).collect();
        for &a in &sources {
            for &b in &targets {
                self.reach[a][b] = true;
            }
        }
    }
}

/// Kahn's algorithm, breaking ties by registration index
fn topological_order(edges: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut in_degree = vec![0usize; edges.len()];
    for targets in edges {
        for &t in targets {
            in_degree[t] += 1;
        }
    }
    let mut ready: BTreeSet<usize> = (0..edges.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(edges.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &t in &edges[node] {
            in_degree[t] -= 1;
            if in_degree[t] == 0 {
                ready.insert(t);
            }
        }
    }
    order
}

/// Group nodes by longest path from a root; nodes in one level share no edge
fn level_batches(edges: &[BTreeSet<usize>], order: &[usize]) -> Vec<Vec<usize>> {
    let mut level = vec![0usize; edges.len()];
    for &node in order {
        for &t in &edges[node] {
            level[t] = level[t].max(level[node] + 1);
        }
    }
    let mut batches: Vec<Vec<usize>> = Vec::new();
    for &node in order {
        let l = level[node];
        if batches.len() <= l {
            batches.resize_with(l + 1, Vec::new);
        }
        batches[l].push(node);
    }
    batches
}

/// Summary of one executed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// World tick counter after the tick
    pub tick: u64,
    /// Stages executed
    pub stages: usize,
    /// Rows evaluated, summed over stages
    pub rows: usize,
}

/// An ordered, validated set of systems
///
/// Pipelines are immutable and cheap to clone; systems are shared.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn System>>,
    batches: Vec<Vec<usize>>,
    mode: ExecutionMode,
    ctx: ExecContext,
    time_step: Option<f64>,
}

impl Pipeline {
    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Stage names grouped by batch
    pub fn batches(&self) -> Vec<Vec<&str>> {
        self.batches
            .iter()
            .map(|batch| batch.iter().map(|&i| self.stages[i].name()).collect())
            .collect()
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Batch execution mode
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Timestep of the terminal stage, if one was recorded
    pub fn time_step(&self) -> Option<f64> {
        self.time_step
    }

    /// Check that `world` has a column for every component a stage requires
    pub fn validate(&self, world: &World) -> Result<()> {
        for stage in &self.stages {
            stage.validate(world)?;
        }
        Ok(())
    }

    /// Run every stage once without advancing the tick counter
    ///
    /// Stages run against a working copy of `world` that replaces it only
    /// when every stage succeeded, so a failure leaves `world` untouched.
    pub fn execute(&self, world: &mut World) -> Result<usize> {
        let mut working = world.clone();
        let rows = self.execute_in(&mut working)?;
        *world = working;
        Ok(rows)
    }

    fn execute_in(&self, world: &mut World) -> Result<usize> {
        let mut rows = 0;
        for batch in &self.batches {
            let parallel = self.mode == ExecutionMode::Parallel && batch.len() > 1;
            let snapshot: &World = world;
            let staged: Vec<StagedWrites> = map_rows(batch, parallel, |&i| {
                let stage = &self.stages[i];
                log::trace!("evaluating stage `{}`", stage.name());
                stage.evaluate(snapshot, &self.ctx)
            })?;
            for writes in staged {
                rows += writes.rows();
                writes.commit(world)?;
            }
        }
        Ok(rows)
    }

    /// Run every stage once and advance the world's tick counter
    ///
    /// A failing stage aborts the whole tick: nothing any stage wrote is
    /// kept and the counter does not move, so the tick can be retried.
    pub fn tick(&self, world: &mut World) -> Result<TickReport> {
        match self.execute(world) {
            Ok(rows) => {
                world.advance_tick();
                log::trace!("tick {} complete: {} rows", world.tick(), rows);
                Ok(TickReport {
                    tick: world.tick(),
                    stages: self.stages.len(),
                    rows,
                })
            }
            Err(err) => {
                log::error!("tick {} aborted: {}", world.tick() + 1, err);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("batches", &self.batches())
            .field("mode", &self.mode)
            .field("time_step", &self.time_step)
            .finish()
    }
}
