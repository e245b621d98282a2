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
//! Spatial (six-degree-of-freedom) value types
//!
//! Every rigid-body quantity is split into a linear part and an angular part:
//!
//! | Type               | Linear            | Angular                     |
//! |--------------------|-------------------|-----------------------------|
//! | `SpatialTransform` | position (m)      | orientation (unit quaternion) |
//! | `SpatialMotion`    | velocity (m/s)    | angular velocity (rad/s)    |
//! | `SpatialForce`     | force (N)         | torque (N·m)                |
//! | `SpatialInertia`   | mass (kg)         | body-frame inertia tensor   |
//!
//! All values are double precision and backed by `glam`'s `f64` types, which
//! act as the numeric backend for the whole crate. The `from_linear`
//! constructors always zero the angular part (identity for orientations).

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Position and orientation of a body in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialTransform {
    /// Orientation as a unit quaternion (body to world)
    pub angular: DQuat,
    /// Position of the center of mass
    pub linear: DVec3,
}

impl SpatialTransform {
    /// Create a transform from both parts
    pub fn new(angular: DQuat, linear: DVec3) -> Self {
        SpatialTransform { angular, linear }
    }

    /// Transform at `linear` with identity orientation
    pub fn from_linear(linear: DVec3) -> Self {
        SpatialTransform::new(DQuat::IDENTITY, linear)
    }

    /// Transform at the origin with the given orientation
    pub fn from_angular(angular: DQuat) -> Self {
        SpatialTransform::new(angular, DVec3::ZERO)
    }

    /// Identity transform at the origin
    pub fn identity() -> Self {
        SpatialTransform::new(DQuat::IDENTITY, DVec3::ZERO)
    }

    /// Linear part
    pub fn linear(&self) -> DVec3 {
        self.linear
    }

    /// Angular part
    pub fn angular(&self) -> DQuat {
        self.angular
    }

    /// Check that every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

impl Default for SpatialTransform {
    fn default() -> Self {
        SpatialTransform::identity()
    }
}

/// Linear and angular velocity (or acceleration) in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialMotion {
    /// Angular rate about the center of mass
    pub angular: DVec3,
    /// Linear rate of the center of mass
    pub linear: DVec3,
}

impl SpatialMotion {
    /// Create a motion from both parts
    pub fn new(angular: DVec3, linear: DVec3) -> Self {
        SpatialMotion { angular, linear }
    }

    /// Pure translation
    pub fn from_linear(linear: DVec3) -> Self {
        SpatialMotion::new(DVec3::ZERO, linear)
    }

    /// Pure rotation
    pub fn from_angular(angular: DVec3) -> Self {
        SpatialMotion::new(angular, DVec3::ZERO)
    }

    /// No motion
    pub fn zero() -> Self {
        SpatialMotion::default()
    }

    /// Linear part
    pub fn linear(&self) -> DVec3 {
        self.linear
    }

    /// Angular part
    pub fn angular(&self) -> DVec3 {
        self.angular
    }

    /// Check that every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

impl std::ops::Add for SpatialMotion {
    type Output = SpatialMotion;

    fn add(self, rhs: SpatialMotion) -> SpatialMotion {
        SpatialMotion::new(self.angular + rhs.angular, self.linear + rhs.linear)
    }
}

impl std::ops::Mul<f64> for SpatialMotion {
    type Output = SpatialMotion;

    fn mul(self, rhs: f64) -> SpatialMotion {
        SpatialMotion::new(self.angular * rhs, self.linear * rhs)
    }
}

/// Force and torque acting on a body, expressed in world space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialForce {
    /// Torque about the center of mass
    pub angular: DVec3,
    /// Force through the center of mass
    pub linear: DVec3,
}

impl SpatialForce {
    /// Create a force from both parts
    pub fn new(angular: DVec3, linear: DVec3) -> Self {
        SpatialForce { angular, linear }
    }

    /// Pure force, no torque
    pub fn from_linear(linear: DVec3) -> Self {
        SpatialForce::new(DVec3::ZERO, linear)
    }

    /// Pure torque, no force
    pub fn from_torque(angular: DVec3) -> Self {
        SpatialForce::new(angular, DVec3::ZERO)
    }

    /// No force
    pub fn zero() -> Self {
        SpatialForce::default()
    }

    /// Linear part
    pub fn linear(&self) -> DVec3 {
        self.linear
    }

    /// Angular part (torque)
    pub fn torque(&self) -> DVec3 {
        self.angular
    }

    /// Check that every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

impl std::ops::Add for SpatialForce {
    type Output = SpatialForce;

    fn add(self, rhs: SpatialForce) -> SpatialForce {
        SpatialForce::new(self.angular + rhs.angular, self.linear + rhs.linear)
    }
}

impl std::ops::AddAssign for SpatialForce {
    fn add_assign(&mut self, rhs: SpatialForce) {
        self.angular += rhs.angular;
        self.linear += rhs.linear;
    }
}

/// Mass and rotational inertia of a rigid body
///
/// The tensor is expressed in the body frame about the center of mass. It is
/// rotated into world space by the integrator every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialInertia {
    /// Body-frame inertia tensor (kg·m²)
    pub tensor: DMat3,
    /// Mass (kg)
    pub mass: f64,
}

impl SpatialInertia {
    /// Create an inertia from a full tensor and a mass
    pub fn new(tensor: DMat3, mass: f64) -> Self {
        SpatialInertia { tensor, mass }
    }

    /// Point-like body: unit diagonal tensor scaled by mass
    pub fn from_mass(mass: f64) -> Self {
        SpatialInertia::new(DMat3::from_diagonal(DVec3::splat(mass)), mass)
    }

    /// Body with a diagonal (principal axes) tensor
    pub fn from_diagonal(principal: DVec3, mass: f64) -> Self {
        SpatialInertia::new(DMat3::from_diagonal(principal), mass)
    }

    /// Solid sphere of uniform density
    pub fn solid_sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        SpatialInertia::from_diagonal(DVec3::splat(i), mass)
    }

    /// Mass
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Body-frame tensor
    pub fn tensor(&self) -> DMat3 {
        self.tensor
    }

    /// Inverse body-frame tensor, `None` when singular
    pub fn inverse_tensor(&self) -> Option<DMat3> {
        let det = self.tensor.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inverse = self.tensor.inverse();
        inverse.is_finite().then_some(inverse)
    }

    /// Tensor rotated into world space: `R · I · Rᵀ`
    pub fn world_tensor(&self, orientation: DQuat) -> DMat3 {
        let rotation = DMat3::from_quat(orientation);
        rotation * self.tensor * rotation.transpose()
    }

    /// Mass is strictly positive and finite
    pub fn has_valid_mass(&self) -> bool {
        self.mass > 0.0 && self.mass.is_finite()
    }

    /// Check that mass and tensor are finite
    pub fn is_finite(&self) -> bool {
        self.mass.is_finite() && self.tensor.is_finite()
    }
}

/// Integrate an orientation by angular velocity `omega` over `dt`
///
/// Uses the quaternion derivative `q̇ = ½ · ω ⊗ q` and renormalizes the result.
pub fn integrate_orientation(orientation: DQuat, omega: DVec3, dt: f64) -> DQuat {
    let spin = DQuat::from_xyzw(omega.x, omega.y, omega.z, 0.0) * orientation;
    (orientation + spin * (0.5 * dt)).normalize()
}
