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
//! Basic ECS usage example
//!
//! This example shows how to create a world, spawn bodies, query columns
//! and run a user-defined system without the integrator.

use glam::DVec3;
use sixdof_ecs::ecs::components::{Force, Inertia, WorldPos, WorldVel};
use sixdof_ecs::ecs::{system, Body, ExecContext, System, World};

fn main() {
    println!("Six-DOF ECS - Basic Example");
    println!("===========================\n");

    let mut world = World::new();
    println!("Created new world");

    let e1 = world
        .spawn(Body::new(
            WorldPos::from_linear(DVec3::ZERO),
            WorldVel::from_linear(DVec3::new(1.0, 0.0, 0.0)),
            Inertia::from_mass(2.0),
        ))
        .expect("valid body");
    let e2 = world
        .spawn(Body::new(
            WorldPos::from_linear(DVec3::new(5.0, 5.0, 0.0)),
            WorldVel::from_linear(DVec3::new(-1.0, 1.0, 0.0)),
            Inertia::from_mass(1.0),
        ))
        .expect("valid body");
    // No Force column entry: excluded from anything that queries Force
    let e3 = world
        .spawn((
            WorldPos::from_linear(DVec3::new(-3.0, 2.0, 1.0)),
            WorldVel::zero(),
            Inertia::from_mass(1.0),
        ))
        .expect("valid body");

    println!("Spawned {} entities:", world.entity_count());
    for entity in [e1, e2, e3] {
        println!("  - {}", entity);
    }

    println!("\nEntities with WorldPos and Force:");
    let query = world
        .query::<(WorldPos, Force)>()
        .expect("columns registered");
    for (entity, (pos, _)) in query.iter() {
        let p = pos.linear();
        println!("  {} -> ({:.1}, {:.1}, {:.1})", entity, p.x, p.y, p.z);
    }

    println!("\nRunning a thrust system once:");
    let thrust = system::<(Inertia, Force), Force, _>("thrust", |(inertia, force)| {
        force + Force::from_linear(DVec3::new(0.0, 9.81 * inertia.mass(), 0.0))
    });
    let rows = thrust
        .run(&mut world, &ExecContext::sequential())
        .expect("thrust runs");
    println!("  `{}` wrote {} rows", thrust.name(), rows);
    for entity in [e1, e2] {
        let f = world.get::<Force>(entity).expect("force present").linear();
        println!("  {} force = ({:.2}, {:.2}, {:.2})", entity, f.x, f.y, f.z);
    }

    world.despawn(e2).expect("alive");
    println!("\nDespawned {}", e2);
    println!("Remaining entities: {}", world.entity_count());

    #[cfg(feature = "parallel")]
    println!("\n[Parallel execution support enabled via Rayon]");

    #[cfg(not(feature = "parallel"))]
    println!("\n[Running in sequential mode]");

    println!("\nExample completed successfully!");
}
