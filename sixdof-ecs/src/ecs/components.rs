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
//! Rigid-body components
//!
//! This module provides the components the six-DOF pipeline operates on:
//! world pose, world velocity, optional world acceleration, accumulated force
//! and inertia. Each wraps one of the spatial types from [`crate::math`] and
//! uses double precision throughout.

use crate::ecs::Component;
use crate::error::{Error, Result};
use crate::math::{SpatialForce, SpatialInertia, SpatialMotion, SpatialTransform};
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// World-space pose: position of the center of mass and orientation
///
/// # Examples
///
/// ```
/// use sixdof_ecs::ecs::components::WorldPos;
/// use glam::{DQuat, DVec3};
///
/// let pos = WorldPos::from_linear(DVec3::new(5.0, 0.0, 0.0));
/// assert_eq!(pos.linear().x, 5.0);
/// assert_eq!(pos.angular(), DQuat::IDENTITY);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos(pub SpatialTransform);

impl WorldPos {
    /// Pose at `linear` with identity orientation
    pub fn from_linear(linear: DVec3) -> Self {
        WorldPos(SpatialTransform::from_linear(linear))
    }

    /// Pose from both parts
    pub fn new(angular: DQuat, linear: DVec3) -> Self {
        WorldPos(SpatialTransform::new(angular, linear))
    }

    /// Position
    pub fn linear(&self) -> DVec3 {
        self.0.linear
    }

    /// Orientation
    pub fn angular(&self) -> DQuat {
        self.0.angular
    }
}

impl Component for WorldPos {
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// World-space linear and angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldVel(pub SpatialMotion);

impl WorldVel {
    /// Pure translation
    pub fn from_linear(linear: DVec3) -> Self {
        WorldVel(SpatialMotion::from_linear(linear))
    }

    /// Pure rotation
    pub fn from_angular(angular: DVec3) -> Self {
        WorldVel(SpatialMotion::from_angular(angular))
    }

    /// Velocity from both parts
    pub fn new(angular: DVec3, linear: DVec3) -> Self {
        WorldVel(SpatialMotion::new(angular, linear))
    }

    /// At rest
    pub fn zero() -> Self {
        WorldVel(SpatialMotion::zero())
    }

    /// Linear velocity
    pub fn linear(&self) -> DVec3 {
        self.0.linear
    }

    /// Angular velocity
    pub fn angular(&self) -> DVec3 {
        self.0.angular
    }
}

impl Component for WorldVel {
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// Acceleration applied by the integrator on the last tick
///
/// Optional. Bodies that carry it get it overwritten every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldAccel(pub SpatialMotion);

impl WorldAccel {
    /// Linear acceleration
    pub fn linear(&self) -> DVec3 {
        self.0.linear
    }

    /// Angular acceleration
    pub fn angular(&self) -> DVec3 {
        self.0.angular
    }
}

impl Component for WorldAccel {
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// Force and torque accumulated for the current tick
///
/// Systems add to this column; the integrator consumes it and, unless
/// configured otherwise, resets it to zero for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Force(pub SpatialForce);

impl Force {
    /// Pure force through the center of mass
    pub fn from_linear(linear: DVec3) -> Self {
        Force(SpatialForce::from_linear(linear))
    }

    /// Pure torque
    pub fn from_torque(torque: DVec3) -> Self {
        Force(SpatialForce::from_torque(torque))
    }

    /// No force
    pub fn zero() -> Self {
        Force(SpatialForce::zero())
    }

    /// Linear part
    pub fn linear(&self) -> DVec3 {
        self.0.linear
    }

    /// Torque
    pub fn torque(&self) -> DVec3 {
        self.0.angular
    }
}

impl std::ops::Add for Force {
    type Output = Force;

    fn add(self, rhs: Force) -> Force {
        Force(self.0 + rhs.0)
    }
}

impl Component for Force {
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// Mass and body-frame inertia tensor
///
/// Mass must be strictly positive. The integrator divides by it every tick,
/// so zero-mass bodies are rejected rather than treated as immovable.
///
/// # Examples
///
/// ```
/// use sixdof_ecs::ecs::components::Inertia;
///
/// let inertia = Inertia::from_mass(2.0);
/// assert_eq!(inertia.mass(), 2.0);
///
/// assert!(Inertia::try_from_mass(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inertia(pub SpatialInertia);

impl Inertia {
    /// Point-like body with a unit tensor scaled by mass
    ///
    /// # Panics
    ///
    /// Panics if the mass is not strictly positive and finite. Use
    /// `try_from_mass` for fallible construction.
    pub fn from_mass(mass: f64) -> Self {
        assert!(mass > 0.0 && mass.is_finite(), "Mass must be positive and finite");
        Inertia(SpatialInertia::from_mass(mass))
    }

    /// Fallible version of `from_mass`
    pub fn try_from_mass(mass: f64) -> Result<Self> {
        let inertia = Inertia(SpatialInertia::from_mass(mass));
        inertia.validate()?;
        Ok(inertia)
    }

    /// Body with principal moments `principal`
    pub fn from_diagonal(principal: DVec3, mass: f64) -> Result<Self> {
        let inertia = Inertia(SpatialInertia::from_diagonal(principal, mass));
        inertia.validate()?;
        Ok(inertia)
    }

    /// Mass in kilograms
    pub fn mass(&self) -> f64 {
        self.0.mass
    }
}

impl Component for Inertia {
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    fn validate(&self) -> Result<()> {
        if !self.0.has_valid_mass() {
            return Err(Error::InvalidMass {
                entity: None,
                mass: self.0.mass,
            });
        }
        if !self.0.tensor.is_finite() || self.0.inverse_tensor().is_none() {
            return Err(Error::SingularInertia { entity: None });
        }
        Ok(())
    }
}
