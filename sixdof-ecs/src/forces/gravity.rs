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
//! Central gravitational attraction
//!
//! Every body is pulled toward a single fixed point mass. Bodies do not
//! attract each other, which keeps every row independent of every other.
//!
//! # Force laws
//!
//! With `r` the body position relative to the attractor, `G` the
//! gravitational constant, `M` the attractor mass and `m` the body mass:
//!
//! - [`GravityLaw::InverseSquare`]: **F = −G·M·m · r / (|r|² + ε²)^(3/2)**,
//!   Newton's law with an optional softening length ε
//! - [`GravityLaw::DistanceScaled`]: **F = −r / |r| · |r| · |r| · G · M · m**,
//!   a force that grows with the square of distance
//!
//! The inverse-square law is the default. The distance-scaled law keeps the
//! left-to-right arithmetic of older scenes so their trajectories can be
//! reproduced exactly.
//!
//! A body sitting exactly on the attractor receives no force.
//!
//! # References
//!
//! - Newton, I. (1687). "Philosophiæ Naturalis Principia Mathematica"
//! - [CODATA 2018 value for G](https://physics.nist.gov/cgi-bin/cuu/Value?bg)
//! - Dehnen, W. (2001). "Towards optimal softening in three-dimensional N-body codes"

use crate::ecs::components::{Force, Inertia, WorldPos};
use crate::ecs::system::map_rows;
use crate::ecs::{Component, ComponentId, Entity, ExecContext, StagedWrites, System, SystemAccess, World};
use crate::error::{Error, Result};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Standard gravitational constant in SI units (m³/(kg⋅s²))
///
/// CODATA 2018 recommended value: 6.67430(15) × 10⁻¹¹ m³/(kg⋅s²)
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67430e-11;

/// Name of the gravity stage inside a pipeline
pub const STAGE_NAME: &str = "gravity";

/// How force magnitude depends on distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityLaw {
    /// Newtonian attraction, falling off with the square of distance
    #[default]
    InverseSquare,
    /// Attraction growing with the square of distance
    DistanceScaled,
}

/// A fixed point mass attracting every body
///
/// # Example
///
/// ```
/// use sixdof_ecs::forces::gravity::CentralGravity;
/// use sixdof_ecs::ecs::components::{Inertia, WorldPos};
/// use glam::DVec3;
///
/// // G·M = 1
/// let gravity = CentralGravity::unit_attractor();
/// let force = gravity.force_on(
///     &WorldPos::from_linear(DVec3::new(5.0, 0.0, 0.0)),
///     &Inertia::from_mass(1.0),
/// );
/// assert!((force.linear().x + 1.0 / 25.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CentralGravity {
    g_constant: f64,
    central_mass: f64,
    center: DVec3,
    softening: f64,
    law: GravityLaw,
}

impl CentralGravity {
    /// Attractor of `central_mass` at the origin, using `g_constant`
    ///
    /// # Panics
    ///
    /// Panics if either value is negative or not finite.
    pub fn new(g_constant: f64, central_mass: f64) -> Self {
        assert!(
            g_constant >= 0.0 && g_constant.is_finite(),
            "Gravitational constant must be non-negative and finite"
        );
        assert!(
            central_mass >= 0.0 && central_mass.is_finite(),
            "Central mass must be non-negative and finite"
        );

        CentralGravity {
            g_constant,
            central_mass,
            center: DVec3::ZERO,
            softening: 0.0,
            law: GravityLaw::InverseSquare,
        }
    }

    /// Attractor with `G·M = 1`, using the standard gravitational constant
    pub fn unit_attractor() -> Self {
        Self::new(GRAVITATIONAL_CONSTANT, 1.0 / GRAVITATIONAL_CONSTANT)
    }

    /// Move the attractor to `center`
    pub fn with_center(mut self, center: DVec3) -> Self {
        self.center = center;
        self
    }

    /// Set the softening length used by the inverse-square law
    ///
    /// # Panics
    ///
    /// Panics if `softening` is negative or not finite.
    pub fn with_softening(mut self, softening: f64) -> Self {
        assert!(
            softening >= 0.0 && softening.is_finite(),
            "Softening factor must be non-negative and finite"
        );
        self.softening = softening;
        self
    }

    /// Select the force law
    pub fn with_law(mut self, law: GravityLaw) -> Self {
        self.law = law;
        self
    }

    /// Gravitational parameter G·M
    pub fn mu(&self) -> f64 {
        self.g_constant * self.central_mass
    }

    /// Position of the attractor
    pub fn center(&self) -> DVec3 {
        self.center
    }

    /// Softening length
    pub fn softening(&self) -> f64 {
        self.softening
    }

    /// Active force law
    pub fn law(&self) -> GravityLaw {
        self.law
    }

    /// Force exerted on a body with the given pose and mass
    pub fn force_on(&self, pos: &WorldPos, inertia: &Inertia) -> Force {
        let r = pos.linear() - self.center;

        let linear = match self.law {
            GravityLaw::InverseSquare => {
                let d2 = r.length_squared() + self.softening * self.softening;
                if d2 == 0.0 {
                    return Force::zero();
                }
                let strength = self.g_constant * self.central_mass * inertia.mass();
                -r / (d2 * d2.sqrt()) * strength
            }
            GravityLaw::DistanceScaled => {
                let norm = r.length();
                if norm == 0.0 {
                    return Force::zero();
                }
                // Evaluated strictly left to right
                -r / norm * norm * norm * self.g_constant * self.central_mass * inertia.mass()
            }
        };
        Force::from_linear(linear)
    }

    /// Turn this attractor into a pipeline stage named `gravity`
    pub fn into_system(self) -> GravitySystem {
        GravitySystem::new(self)
    }
}

/// Stage adding [`CentralGravity`] to every body's `Force`
///
/// Reads `WorldPos`, `Inertia` and `Force`; writes `Force`.
#[derive(Debug, Clone)]
pub struct GravitySystem {
    gravity: CentralGravity,
    access: SystemAccess,
}

impl GravitySystem {
    /// Create the stage
    pub fn new(gravity: CentralGravity) -> Self {
        let access = SystemAccess::new()
            .read(ComponentId::of::<WorldPos>())
            .read(ComponentId::of::<Inertia>())
            .read(ComponentId::of::<Force>())
            .write(ComponentId::of::<Force>());
        GravitySystem { gravity, access }
    }

    /// The attractor applied by this stage
    pub fn gravity(&self) -> &CentralGravity {
        &self.gravity
    }
}

impl System for GravitySystem {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn access(&self) -> &SystemAccess {
        &self.access
    }

    fn evaluate(&self, world: &World, ctx: &ExecContext) -> Result<StagedWrites> {
        let rows = world.query::<(WorldPos, Inertia, Force)>()?.values();

        let forces = map_rows(
            &rows,
            ctx.use_parallel(rows.len()),
            |(entity, (pos, inertia, force))| accumulate(&self.gravity, *entity, pos, inertia, *force),
        )?;

        let mut staged = StagedWrites::new();
        staged.push(forces);
        Ok(staged)
    }
}

fn accumulate(
    gravity: &CentralGravity,
    entity: Entity,
    pos: &WorldPos,
    inertia: &Inertia,
    force: Force,
) -> Result<(Entity, Force)> {
    let total = force + gravity.force_on(pos, inertia);
    if !total.is_finite() {
        return Err(Error::NonFinite {
            stage: STAGE_NAME.to_string(),
            component: Force::name(),
            entity,
        });
    }
    Ok((entity, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::WorldVel;
    use crate::ecs::Body;

    fn at(x: f64, y: f64, z: f64) -> WorldPos {
        WorldPos::from_linear(DVec3::new(x, y, z))
    }

    #[test]
    fn test_inverse_square_on_axis() {
        let gravity = CentralGravity::unit_attractor();
        let force = gravity.force_on(&at(5.0, 0.0, 0.0), &Inertia::from_mass(1.0));

        assert!((force.linear().x + 1.0 / 25.0).abs() < 1e-12);
        assert_eq!(force.linear().y, 0.0);
        assert_eq!(force.linear().z, 0.0);
        assert_eq!(force.torque(), DVec3::ZERO);
    }

    #[test]
    fn test_distance_scaled_on_axis() {
        let gravity = CentralGravity::unit_attractor().with_law(GravityLaw::DistanceScaled);
        let force = gravity.force_on(&at(5.0, 0.0, 0.0), &Inertia::from_mass(1.0));

        assert!((force.linear().x + 25.0).abs() < 1e-9);
        assert_eq!(force.linear().y, 0.0);
    }

    #[test]
    fn test_distance_scaled_is_bit_exact() {
        let g = 0.37;
        let big_m = 12.5;
        let gravity = CentralGravity::new(g, big_m).with_law(GravityLaw::DistanceScaled);

        for i in 1..2000 {
            let t = i as f64;
            let r = DVec3::new(t * 0.001 + 0.3 * t.sin(), 0.4 * t.cos(), t * 1e-5);
            let mass = 0.1 + (i % 37) as f64 * 0.3;
            let force = gravity.force_on(&WorldPos::from_linear(r), &Inertia::from_mass(mass));

            let norm = r.length();
            let expected = [r.x, r.y, r.z].map(|c| -c / norm * norm * norm * g * big_m * mass);
            let got = force.linear().to_array();
            for axis in 0..3 {
                assert_eq!(got[axis].to_bits(), expected[axis].to_bits(), "r = {r}, m = {mass}");
            }
        }
    }

    #[test]
    fn test_force_scales_with_body_mass() {
        let gravity = CentralGravity::new(1.0, 4.0);
        let light = gravity.force_on(&at(0.0, 2.0, 0.0), &Inertia::from_mass(1.0));
        let heavy = gravity.force_on(&at(0.0, 2.0, 0.0), &Inertia::from_mass(3.0));

        // G·M·m / r² = 4 / 4
        assert!((light.linear().y + 1.0).abs() < 1e-12);
        assert!((heavy.linear().y + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_offset_center() {
        let gravity = CentralGravity::new(1.0, 1.0).with_center(DVec3::new(1.0, 1.0, 1.0));
        let force = gravity.force_on(&at(1.0, 1.0, 3.0), &Inertia::from_mass(1.0));
        assert!((force.linear().z + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_zero_distance_is_zero_force() {
        let gravity = CentralGravity::new(1.0, 1.0);
        let force = gravity.force_on(&WorldPos::default(), &Inertia::from_mass(1.0));
        assert_eq!(force, Force::zero());

        let literal = gravity.with_law(GravityLaw::DistanceScaled);
        assert_eq!(literal.force_on(&WorldPos::default(), &Inertia::from_mass(1.0)), Force::zero());
    }

    #[test]
    fn test_softening_limits_force() {
        let sharp = CentralGravity::new(1.0, 1.0);
        let soft = sharp.with_softening(1.0);
        let pos = at(0.1, 0.0, 0.0);
        let inertia = Inertia::from_mass(1.0);

        assert!(soft.force_on(&pos, &inertia).linear().length()
            < sharp.force_on(&pos, &inertia).linear().length());
    }

    #[test]
    #[should_panic(expected = "Softening factor must be non-negative")]
    fn test_negative_softening_panics() {
        CentralGravity::new(1.0, 1.0).with_softening(-1.0);
    }

    #[test]
    fn test_system_accumulates_into_force() {
        let mut world = World::new();
        let body = Body::new(at(5.0, 0.0, 0.0), WorldVel::zero(), Inertia::from_mass(1.0))
            .with_force(Force::from_linear(DVec3::new(0.0, 2.0, 0.0)));
        let e = world.spawn(body).unwrap();

        let stage = CentralGravity::unit_attractor().into_system();
        assert_eq!(stage.name(), "gravity");
        assert!(stage.access().writes().contains(&ComponentId::of::<Force>()));
        stage.validate(&world).unwrap();

        assert_eq!(stage.run(&mut world, &ExecContext::sequential()).unwrap(), 1);
        let force = world.get::<Force>(e).unwrap().linear();
        assert!((force.x + 1.0 / 25.0).abs() < 1e-12);
        assert_eq!(force.y, 2.0);
    }

    #[test]
    fn test_system_skips_bodies_without_force() {
        let mut world = World::new();
        let with_force = world
            .spawn(Body::new(at(1.0, 0.0, 0.0), WorldVel::zero(), Inertia::from_mass(1.0)))
            .unwrap();
        let without_force = world
            .spawn((at(2.0, 0.0, 0.0), WorldVel::zero(), Inertia::from_mass(1.0)))
            .unwrap();

        let stage = CentralGravity::new(1.0, 1.0).into_system();
        assert_eq!(stage.run(&mut world, &ExecContext::sequential()).unwrap(), 1);
        assert_ne!(world.get::<Force>(with_force).unwrap(), &Force::zero());
        assert!(world.get::<Force>(without_force).is_err());
    }

    #[test]
    fn test_law_serde() {
        let json = serde_json::to_string(&GravityLaw::DistanceScaled).unwrap();
        assert_eq!(json, "\"distance_scaled\"");
    }
}
