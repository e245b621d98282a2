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
//! # Six-DOF ECS
//!
//! A deterministic, fixed-timestep rigid-body simulation core built on a
//! columnar Entity Component System.
//!
//! ## Features
//!
//! - **ECS Architecture**: generational entities, one column per component
//!   type, multi-column queries in ascending entity order
//! - **Declarative Systems**: per-row functions with declared read and write
//!   sets, evaluated against a snapshot and committed in one phase
//! - **Pipeline Composition**: ordering constraints, ambiguity and cycle
//!   detection before the first tick
//! - **Six-DOF Integration**: semi-implicit Euler over pose, velocity, mass
//!   and inertia tensor
//! - **Parallelization**: optional Rayon integration for rows and for
//!   independent systems
//!
//! ## Example
//!
//! ```rust
//! use sixdof_ecs::ecs::components::{Inertia, WorldPos, WorldVel};
//! use sixdof_ecs::ecs::{Body, System};
//! use sixdof_ecs::forces::gravity::CentralGravity;
//! use sixdof_ecs::integration::six_dof;
//! use sixdof_ecs::sim::WorldBuilder;
//! use glam::DVec3;
//!
//! let mut builder = WorldBuilder::new();
//! let body = builder
//!     .spawn(Body::new(
//!         WorldPos::from_linear(DVec3::new(5.0, 0.0, 0.0)),
//!         WorldVel::zero(),
//!         Inertia::from_mass(1.0),
//!     ))
//!     .unwrap();
//!
//! let gravity: Box<dyn System> = Box::new(CentralGravity::unit_attractor().into_system());
//! let mut sim = builder.run(six_dof(1.0 / 60.0, vec![gravity]).unwrap()).unwrap();
//! sim.run_for(60).unwrap();
//!
//! let x = sim.world().get::<WorldPos>(body).unwrap().linear().x;
//! assert!(x < 5.0);
//! ```

#![warn(missing_docs)]

/// Simulation configuration
pub mod config;

/// Entity Component System implementation
pub mod ecs;

/// Error types
pub mod error;

/// Force systems
pub mod forces;

/// Numerical integration methods
pub mod integration;

/// Spatial math types
pub mod math;

/// World builder and simulation driver
pub mod sim;

pub use ecs::{Entity, World};
pub use error::{Error, Result};
