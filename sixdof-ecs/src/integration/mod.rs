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
//! Fixed-step integration for rigid bodies
//!
//! This module provides the integrator that closes every tick: it consumes
//! the forces accumulated by user systems and advances pose and velocity by
//! one fixed timestep.
//!
//! # Building a pipeline
//!
//! [`six_dof`] composes user systems with the integrator in one call:
//!
//! ```
//! use sixdof_ecs::ecs::System;
//! use sixdof_ecs::integration::six_dof;
//! use sixdof_ecs::forces::gravity::CentralGravity;
//!
//! let gravity: Box<dyn System> = Box::new(CentralGravity::unit_attractor().into_system());
//! let pipeline = six_dof(1.0 / 60.0, vec![gravity]).unwrap();
//! assert_eq!(pipeline.stage_names(), vec!["gravity", "six_dof"]);
//! ```
//!
//! # Timestep Guidelines
//!
//! - Too small: Numerical precision issues and wasted computation
//! - Too large: Instability and inaccuracy
//! - Recommended: Start with dt = 1/60 (60 FPS) and adjust based on simulation needs

use crate::config::SimulationConfig;
use crate::ecs::components::{Inertia, WorldPos, WorldVel};
use crate::ecs::{Entity, Pipeline, PipelineBuilder, System, World};
use crate::error::{Error, Result};
use glam::DVec3;

mod six_dof;

pub use six_dof::{BodyState, BodyStep, IntegratorStage, SixDofIntegrator, STAGE_NAME};

/// Trait for numerical integration methods
///
/// An integrator advances one body by one timestep. It never sees other
/// bodies, so bodies can be stepped in any order or in parallel.
pub trait Integrator: Send + Sync {
    /// Get the name of this integrator, used as its stage name
    fn name(&self) -> &str;

    /// Get the timestep used by this integrator
    fn timestep(&self) -> f64;

    /// Set the timestep for this integrator
    fn set_timestep(&mut self, dt: f64) -> Result<()>;

    /// Validate the timestep for stability
    ///
    /// Non-positive or non-finite timesteps are errors. Extremely small
    /// timesteps (precision loss) and large ones (instability) are logged as
    /// warnings but accepted.
    fn validate_timestep(&self) -> Result<()> {
        let dt = self.timestep();

        if dt <= 0.0 || !dt.is_finite() {
            return Err(Error::InvalidTimestep(dt));
        }

        if dt < 1e-9 {
            log::warn!(
                "timestep {} is extremely small and may cause precision loss with f64",
                dt
            );
        }

        if dt > 1.0 {
            log::warn!(
                "timestep {} is large and may cause instability; consider a smaller step",
                dt
            );
        }

        Ok(())
    }

    /// Advance one body by one timestep
    fn step(&self, entity: Entity, state: &BodyState) -> Result<BodyStep>;
}

/// Start a pipeline whose terminal stage is the six-DOF integrator
///
/// The builder inherits the timestep, execution mode, row-parallelism
/// threshold and force clearing from `config`.
pub fn six_dof_builder(config: &SimulationConfig) -> Result<PipelineBuilder> {
    config.validate()?;
    let integrator = SixDofIntegrator::new(config.time_step)?;
    let mut builder = PipelineBuilder::new();
    builder
        .terminal(IntegratorStage::new(integrator, config.clear_forces))
        .time_step(config.time_step)
        .execution_mode(config.execution)
        .parallel_rows(config.row_parallelism());
    Ok(builder)
}

/// Compose `systems`, in registration order, with the six-DOF integrator
///
/// Uses the default configuration with timestep `dt`. Fails if `dt` is
/// invalid or the systems cannot be ordered.
pub fn six_dof<I>(dt: f64, systems: I) -> Result<Pipeline>
where
    I: IntoIterator<Item = Box<dyn System>>,
{
    let config = SimulationConfig::default().with_time_step(dt);
    let mut builder = six_dof_builder(&config)?;
    for system in systems {
        builder.add_boxed(system);
    }
    builder.build()
}

/// Kinetic energy of one body, translational plus rotational
///
/// KE = ½·m·|v|² + ½·ωᵀ·I_w·ω
pub fn kinetic_energy(pos: &WorldPos, vel: &WorldVel, inertia: &Inertia) -> f64 {
    let omega = vel.angular();
    let inertia_world = inertia.0.world_tensor(pos.angular());
    0.5 * inertia.mass() * vel.linear().length_squared()
        + 0.5 * omega.dot(inertia_world * omega)
}

/// Total kinetic energy of every rigid body in the world
pub fn total_kinetic_energy(world: &World) -> Result<f64> {
    let query = world.query::<(WorldPos, WorldVel, Inertia)>()?;
    Ok(query
        .iter()
        .map(|(_, (pos, vel, inertia))| kinetic_energy(pos, vel, inertia))
        .sum())
}

/// Total linear momentum of every rigid body in the world
pub fn total_momentum(world: &World) -> Result<DVec3> {
    let query = world.query::<(WorldVel, Inertia)>()?;
    Ok(query
        .iter()
        .map(|(_, (vel, inertia))| vel.linear() * inertia.mass())
        .sum())
}

/// Total mass of every rigid body in the world
pub fn total_mass(world: &World) -> Result<f64> {
    Ok(world.column::<Inertia>()?.values().iter().map(Inertia::mass).sum())
}
