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
//! Simulation driver
//!
//! [`WorldBuilder`] collects bodies, assets, startup systems and a
//! configuration. Handing it a [`Pipeline`] with [`WorldBuilder::run`]
//! checks the pipeline against the world schema, runs the startup systems
//! once and returns a [`Simulation`] that the caller steps tick by tick.
//!
//! # Example
//!
//! ```
//! use sixdof_ecs::ecs::components::{Inertia, WorldPos, WorldVel};
//! use sixdof_ecs::ecs::Body;
//! use sixdof_ecs::integration::six_dof;
//! use sixdof_ecs::sim::WorldBuilder;
//! use glam::DVec3;
//!
//! let mut builder = WorldBuilder::new();
//! builder
//!     .spawn(Body::new(
//!         WorldPos::default(),
//!         WorldVel::from_linear(DVec3::X),
//!         Inertia::from_mass(1.0),
//!     ))
//!     .unwrap();
//!
//! let mut sim = builder.run(six_dof(0.5, Vec::new()).unwrap()).unwrap();
//! sim.run_for(4).unwrap();
//! assert_eq!(sim.tick_count(), 4);
//! assert_eq!(sim.elapsed(), 2.0);
//! ```

use crate::config::SimulationConfig;
use crate::ecs::components::{Inertia, WorldPos, WorldVel};
use crate::ecs::{Asset, Bundle, Entity, Handle, Pipeline, PipelineBuilder, System, World};
use crate::error::Result;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Owned builder for the initial world
#[derive(Default)]
pub struct WorldBuilder {
    world: World,
    config: SimulationConfig,
    startup: Vec<Box<dyn System>>,
}

impl WorldBuilder {
    /// Empty world with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Spawn a body; see [`World::spawn`]
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        self.world.spawn(bundle)
    }

    /// Store an asset and get a handle to attach to bodies
    pub fn insert_asset<A: Asset>(&mut self, asset: A) -> Handle<A> {
        self.world.insert_asset(asset)
    }

    /// Add a system that runs once, before the first tick
    pub fn startup<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.startup.push(Box::new(system));
        self
    }

    /// The world being built
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world being built
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Start simulating with `pipeline`
    ///
    /// Fails if the configuration is invalid, if any system requires a
    /// component the world has no column for, or if a startup system fails.
    pub fn run(self, pipeline: Pipeline) -> Result<Simulation> {
        let WorldBuilder {
            mut world,
            config,
            startup,
        } = self;

        config.validate()?;
        pipeline.validate(&world)?;

        if !startup.is_empty() {
            let mut builder = PipelineBuilder::new();
            builder.parallel_rows(config.row_parallelism());
            for system in startup {
                builder.add_boxed(system);
            }
            let startup = builder.build()?;
            startup.validate(&world)?;
            let rows = startup.execute(&mut world)?;
            log::debug!("startup systems wrote {} rows", rows);
        }

        let time_step = match pipeline.time_step() {
            Some(dt) if dt != config.time_step => {
                log::warn!(
                    "pipeline timestep {} overrides configured timestep {}",
                    dt,
                    config.time_step
                );
                dt
            }
            Some(dt) => dt,
            None => config.time_step,
        };

        let mut history = config.history_capacity.map(History::new);
        if let Some(history) = history.as_mut() {
            history.push(Snapshot::capture(&world, time_step)?);
        }

        log::info!(
            "simulation started: {} bodies, {} stages, dt = {}",
            world.entity_count(),
            pipeline.len(),
            time_step
        );

        Ok(Simulation {
            world,
            pipeline,
            time_step,
            history,
        })
    }
}

/// A running simulation: a world and the pipeline that advances it
#[derive(Debug, Clone)]
pub struct Simulation {
    world: World,
    pipeline: Pipeline,
    time_step: f64,
    history: Option<History>,
}

impl Simulation {
    /// Advance by one tick
    ///
    /// A failed tick leaves the world as it was before the call.
    pub fn tick(&mut self) -> Result<()> {
        self.pipeline.tick(&mut self.world)?;
        if let Some(history) = self.history.as_mut() {
            history.push(Snapshot::capture(&self.world, self.time_step)?);
        }
        Ok(())
    }

    /// Advance by `ticks` ticks, stopping at the first failure
    pub fn run_for(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// The world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world between ticks
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Completed ticks
    pub fn tick_count(&self) -> u64 {
        self.world.tick()
    }

    /// Fixed timestep in seconds
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Simulated time in seconds
    pub fn elapsed(&self) -> f64 {
        self.world.tick() as f64 * self.time_step
    }

    /// Recorded snapshots, when history is enabled
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Independent copy of the world, pipeline and history
    pub fn fork(&self) -> Simulation {
        self.clone()
    }

    /// Stop simulating and take the world
    pub fn into_world(self) -> World {
        self.world
    }
}

/// Pose, velocity and mass of one body at one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    /// The body
    pub entity: Entity,
    /// World-frame position
    pub position: DVec3,
    /// World-frame orientation
    pub orientation: DQuat,
    /// Linear velocity
    pub linear_velocity: DVec3,
    /// Angular velocity
    pub angular_velocity: DVec3,
    /// Mass
    pub mass: f64,
}

/// State of every rigid body at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Completed ticks when captured
    pub tick: u64,
    /// Simulated time in seconds
    pub time: f64,
    /// Bodies in ascending entity order
    pub bodies: Vec<BodySnapshot>,
}

impl Snapshot {
    /// Capture every body holding `WorldPos`, `WorldVel` and `Inertia`
    pub fn capture(world: &World, time_step: f64) -> Result<Self> {
        let bodies = world
            .query::<(WorldPos, WorldVel, Inertia)>()?
            .iter()
            .map(|(entity, (pos, vel, inertia))| BodySnapshot {
                entity,
                position: pos.linear(),
                orientation: pos.angular(),
                linear_velocity: vel.linear(),
                angular_velocity: vel.angular(),
                mass: inertia.mass(),
            })
            .collect();

        Ok(Snapshot {
            tick: world.tick(),
            time: world.tick() as f64 * time_step,
            bodies,
        })
    }

    /// Snapshot of one body, if it was captured
    pub fn body(&self, entity: Entity) -> Option<&BodySnapshot> {
        self.bodies.iter().find(|body| body.entity == entity)
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Bounded ring of snapshots; the oldest is dropped when full
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

impl History {
    /// Empty history keeping at most `capacity` snapshots
    pub fn new(capacity: usize) -> Self {
        History {
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a snapshot
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Maximum number of snapshots retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of snapshots retained
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// Snapshots from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::Force;
    use crate::ecs::{system, Body};
    use crate::error::Error;
    use crate::integration::six_dof;

    fn moving_body(x: f64, vx: f64) -> Body {
        Body::new(
            WorldPos::from_linear(DVec3::new(x, 0.0, 0.0)),
            WorldVel::from_linear(DVec3::new(vx, 0.0, 0.0)),
            Inertia::from_mass(1.0),
        )
    }

    #[test]
    fn test_run_and_tick() {
        let mut builder = WorldBuilder::new();
        let e = builder.spawn(moving_body(0.0, 2.0)).unwrap();

        let mut sim = builder.run(six_dof(0.25, Vec::new()).unwrap()).unwrap();
        sim.tick().unwrap();
        sim.tick().unwrap();

        assert_eq!(sim.tick_count(), 2);
        assert_eq!(sim.elapsed(), 0.5);
        assert_eq!(sim.world().get::<WorldPos>(e).unwrap().linear().x, 1.0);
    }

    #[test]
    fn test_run_rejects_missing_columns() {
        let mut builder = WorldBuilder::new();
        builder.spawn(WorldPos::default()).unwrap();

        let result = builder.run(six_dof(0.1, Vec::new()).unwrap());
        assert!(matches!(result, Err(Error::ComponentNotRegistered { .. })));
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let builder = WorldBuilder::new().with_config(SimulationConfig::new().with_history(0));
        let result = builder.run(six_dof(0.1, Vec::new()).unwrap());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_startup_runs_once() {
        let mut builder = WorldBuilder::new();
        let e = builder.spawn(moving_body(0.0, 0.0)).unwrap();
        builder.startup(system::<WorldVel, WorldVel, _>("launch", |_| {
            WorldVel::from_linear(DVec3::new(4.0, 0.0, 0.0))
        }));

        let mut sim = builder.run(six_dof(0.5, Vec::new()).unwrap()).unwrap();
        assert_eq!(sim.tick_count(), 0);
        assert_eq!(sim.world().get::<WorldVel>(e).unwrap().linear().x, 4.0);

        sim.run_for(2).unwrap();
        assert_eq!(sim.world().get::<WorldPos>(e).unwrap().linear().x, 4.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut builder =
            WorldBuilder::new().with_config(SimulationConfig::new().with_time_step(0.5).with_history(3));
        let e = builder.spawn(moving_body(0.0, 1.0)).unwrap();

        let mut sim = builder.run(six_dof(0.5, Vec::new()).unwrap()).unwrap();
        assert_eq!(sim.history().unwrap().len(), 1);

        sim.run_for(5).unwrap();
        let history = sim.history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.capacity(), 3);

        let ticks: Vec<u64> = history.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);

        let latest = history.latest().unwrap();
        assert_eq!(latest.time, 2.5);
        assert_eq!(latest.body(e).unwrap().position.x, 2.5);
    }

    #[test]
    fn test_history_disabled_by_default() {
        let mut builder = WorldBuilder::new();
        builder.spawn(moving_body(0.0, 1.0)).unwrap();
        let sim = builder.run(six_dof(0.1, Vec::new()).unwrap()).unwrap();
        assert!(sim.history().is_none());
    }

    #[test]
    fn test_fork_is_independent() {
        let mut builder = WorldBuilder::new();
        let e = builder.spawn(moving_body(0.0, 1.0)).unwrap();
        let mut sim = builder.run(six_dof(1.0, Vec::new()).unwrap()).unwrap();

        sim.tick().unwrap();
        let mut fork = sim.fork();
        fork.world_mut()
            .insert(e, Force::from_linear(DVec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        fork.tick().unwrap();
        sim.tick().unwrap();

        assert_eq!(sim.world().get::<WorldPos>(e).unwrap().linear().x, 2.0);
        assert_eq!(fork.world().get::<WorldPos>(e).unwrap().linear().x, 12.0);
        assert_eq!(sim.tick_count(), fork.tick_count());
    }

    #[test]
    fn test_snapshot_json() {
        let mut world = World::new();
        world.spawn(moving_body(1.5, -0.25)).unwrap();
        let snapshot = Snapshot::capture(&world, 0.1).unwrap();

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"linear_velocity\""));
        assert_eq!(Snapshot::from_json_str(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_assets_pass_through() {
        struct Mesh(&'static str);

        let mut builder = WorldBuilder::new();
        let mesh = builder.insert_asset(Mesh("cube"));
        let e = builder.spawn((moving_body(0.0, 0.0), mesh)).unwrap();

        let mut sim = builder.run(six_dof(0.1, Vec::new()).unwrap()).unwrap();
        sim.run_for(3).unwrap();

        let handle = *sim.world().get::<Handle<Mesh>>(e).unwrap();
        assert_eq!(sim.world().asset(handle).unwrap().0, "cube");
    }
}
