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
//! Component bundles
//!
//! A bundle is the set of components a single `spawn` inserts. Any component
//! is a bundle on its own, tuples of bundles are bundles, and [`Body`] is the
//! typed bundle for a rigid body.

use crate::ecs::components::{Force, Inertia, WorldAccel, WorldPos, WorldVel};
use crate::ecs::{Component, ComponentId, Entity, World};
use crate::error::Result;

/// A group of components inserted together
pub trait Bundle: Send + 'static {
    /// Append the ids of every component this value will insert
    fn component_ids(&self, ids: &mut Vec<ComponentId>);

    /// Check every value before anything is inserted
    fn validate_bundle(&self) -> Result<()>;

    /// Insert every value for `entity`, registering columns as needed
    fn insert_into(self, world: &mut World, entity: Entity);
}

impl<T: Component> Bundle for T {
    fn component_ids(&self, ids: &mut Vec<ComponentId>) {
        ids.push(ComponentId::of::<T>());
    }

    fn validate_bundle(&self) -> Result<()> {
        Component::validate(self)
    }

    fn insert_into(self, world: &mut World, entity: Entity) {
        world.column_or_register::<T>().insert(entity, self);
    }
}

macro_rules! impl_bundle_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Bundle),+> Bundle for ($($name,)+) {
            fn component_ids(&self, ids: &mut Vec<ComponentId>) {
                let ($($name,)+) = self;
                $($name.component_ids(ids);)+
            }

            fn validate_bundle(&self) -> Result<()> {
                let ($($name,)+) = self;
                $($name.validate_bundle()?;)+
                Ok(())
            }

            fn insert_into(self, world: &mut World, entity: Entity) {
                let ($($name,)+) = self;
                $($name.insert_into(world, entity);)+
            }
        }
    };
}

impl_bundle_tuple!(B1);
impl_bundle_tuple!(B1, B2);
impl_bundle_tuple!(B1, B2, B3);
impl_bundle_tuple!(B1, B2, B3, B4);
impl_bundle_tuple!(B1, B2, B3, B4, B5);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6, B7);
impl_bundle_tuple!(B1, B2, B3, B4, B5, B6, B7, B8);

/// Typed bundle for a rigid body
///
/// Pose, velocity and inertia are required. `Force` defaults to zero and
/// `WorldAccel` is only inserted when requested. Render handles and other
/// pass-through components can be spawned alongside it in a tuple:
///
/// ```
/// use sixdof_ecs::ecs::{Body, World};
/// use sixdof_ecs::ecs::components::{Inertia, WorldPos, WorldVel};
/// use glam::DVec3;
///
/// struct Sphere(f64);
///
/// let mut world = World::new();
/// let mesh = world.insert_asset(Sphere(0.2));
/// let body = Body::new(
///     WorldPos::from_linear(DVec3::new(5.0, 0.0, 0.0)),
///     WorldVel::from_linear(DVec3::new(0.0, 0.0, 10.0)),
///     Inertia::from_mass(1.0),
/// );
/// let entity = world.spawn((body, mesh)).unwrap();
/// assert!(world.is_alive(entity));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    /// World pose
    pub world_pos: WorldPos,
    /// World velocity
    pub world_vel: WorldVel,
    /// Mass and inertia tensor
    pub inertia: Inertia,
    /// Initial accumulated force
    pub force: Force,
    /// Acceleration recorded by the integrator, if tracked
    pub world_accel: Option<WorldAccel>,
}

impl Body {
    /// Body at rest force-wise with the required components
    pub fn new(world_pos: WorldPos, world_vel: WorldVel, inertia: Inertia) -> Self {
        Body {
            world_pos,
            world_vel,
            inertia,
            force: Force::zero(),
            world_accel: None,
        }
    }

    /// Start with a non-zero force
    pub fn with_force(mut self, force: Force) -> Self {
        self.force = force;
        self
    }

    /// Track the integrator's acceleration on this body
    pub fn with_world_accel(mut self) -> Self {
        self.world_accel = Some(WorldAccel::default());
        self
    }
}

impl Bundle for Body {
    fn component_ids(&self, ids: &mut Vec<ComponentId>) {
        ids.extend([
            ComponentId::of::<WorldPos>(),
            ComponentId::of::<WorldVel>(),
            ComponentId::of::<Inertia>(),
            ComponentId::of::<Force>(),
        ]);
        if self.world_accel.is_some() {
            ids.push(ComponentId::of::<WorldAccel>());
        }
    }

    fn validate_bundle(&self) -> Result<()> {
        self.world_pos.validate()?;
        self.world_vel.validate()?;
        self.inertia.validate()?;
        self.force.validate()?;
        if let Some(accel) = &self.world_accel {
            accel.validate()?;
        }
        Ok(())
    }

    fn insert_into(self, world: &mut World, entity: Entity) {
        self.world_pos.insert_into(world, entity);
        self.world_vel.insert_into(world, entity);
        self.inertia.insert_into(world, entity);
        self.force.insert_into(world, entity);
        if let Some(accel) = self.world_accel {
            accel.insert_into(world, entity);
        }
    }
}
