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
//! Error types shared by the store, the composer and the integrator
//!
//! Errors fall into four groups:
//!
//! - **Schema**: unregistered components, missing components, stale entities
//! - **Numeric**: non-positive mass, NaN/Inf produced while evaluating a tick
//! - **Dependency**: ambiguous or cyclic write ordering between systems
//! - **Configuration**: invalid timesteps and malformed configuration files
//!
//! Schema and dependency errors are raised while a pipeline is composed or
//! handed to a world, before any tick runs. Numeric errors abort the tick that
//! produced them and carry the offending entity.

use crate::ecs::Entity;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the simulation core can report
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A column was requested for a component type the world has never seen
    #[error("component `{component}` is not registered in this world")]
    ComponentNotRegistered {
        /// Type name of the component
        component: &'static str,
    },

    /// An entity is alive but lacks a component an operation needs
    #[error("{entity} has no `{component}` component")]
    MissingComponent {
        /// The entity that was accessed
        entity: Entity,
        /// Type name of the missing component
        component: &'static str,
    },

    /// The entity handle is stale or was never allocated
    #[error("{0} does not exist")]
    EntityNotFound(Entity),

    /// No asset is stored under the handle
    #[error("asset {id} of type `{asset}` does not exist")]
    AssetNotFound {
        /// Raw handle id
        id: u64,
        /// Type name of the asset
        asset: &'static str,
    },

    /// A bundle carried a value that cannot be spawned
    #[error("invalid `{component}` in spawned bundle: {reason}")]
    InvalidComponent {
        /// Type name of the component
        component: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Mass is zero, negative or not finite
    #[error("invalid mass {mass} on {}", entity_label(.entity))]
    InvalidMass {
        /// Offending entity, when known
        entity: Option<Entity>,
        /// The rejected mass value
        mass: f64,
    },

    /// The inertia tensor cannot be inverted
    #[error("singular inertia tensor on {}", entity_label(.entity))]
    SingularInertia {
        /// Offending entity, when known
        entity: Option<Entity>,
    },

    /// A stage produced NaN or infinite values
    #[error("stage `{stage}` produced a non-finite `{component}` for {entity}")]
    NonFinite {
        /// Name of the stage that produced the value
        stage: String,
        /// Type name of the component
        component: &'static str,
        /// The entity whose row was being evaluated
        entity: Entity,
    },

    /// Two systems share a name within one pipeline
    #[error("system `{0}` is registered more than once")]
    DuplicateSystem(String),

    /// An ordering constraint refers to a system that was never added
    #[error("system `{system}` is ordered relative to unknown system `{target}`")]
    UnknownSystem {
        /// The system carrying the constraint
        system: String,
        /// The name it referred to
        target: String,
    },

    /// A single system declares the same component twice in its write set
    #[error("system `{system}` declares write access to `{component}` more than once")]
    DuplicateWrite {
        /// The offending system
        system: String,
        /// Type name of the component
        component: &'static str,
    },

    /// Two systems write the same component with no order between them
    #[error(
        "systems `{first}` and `{second}` both write `{component}` with no explicit order; \
         add an `after` or `before` constraint"
    )]
    AmbiguousWrite {
        /// Type name of the contested component
        component: &'static str,
        /// Earlier-registered system
        first: String,
        /// Later-registered system
        second: String,
    },

    /// Ordering constraints form a cycle
    #[error("cyclic ordering between systems: {}", .systems.join(" -> "))]
    CyclicDependency {
        /// Systems participating in the cycle
        systems: Vec<String>,
    },

    /// A timestep is zero, negative or not finite
    #[error("invalid timestep {0}; must be positive and finite")]
    InvalidTimestep(f64),

    /// Configuration values are inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration or snapshot (de)serialization failed
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

fn entity_label(entity: &Option<Entity>) -> String {
    match entity {
        Some(entity) => entity.to_string(),
        None => "unspawned body".to_string(),
    }
}

impl Error {
    /// The entity this error refers to, if any
    pub fn entity(&self) -> Option<Entity> {
        match self {
            Error::MissingComponent { entity, .. } | Error::NonFinite { entity, .. } => {
                Some(*entity)
            }
            Error::EntityNotFound(entity) => Some(*entity),
            Error::InvalidMass { entity, .. } | Error::SingularInertia { entity } => *entity,
            _ => None,
        }
    }

    /// Whether this error is raised while composing a pipeline
    pub fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateSystem(_)
                | Error::UnknownSystem { .. }
                | Error::DuplicateWrite { .. }
                | Error::AmbiguousWrite { .. }
                | Error::CyclicDependency { .. }
        )
    }
}
