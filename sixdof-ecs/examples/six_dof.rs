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
//! Three-body six-DOF example
//!
//! Three spinning bodies orbit a fixed central attractor. Each body carries
//! mesh and material handles that the simulation passes through untouched.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=info cargo run --example six_dof --release
//! ```

use glam::{DQuat, DVec3};
use sixdof_ecs::config::SimulationConfig;
use sixdof_ecs::ecs::components::{Inertia, WorldPos, WorldVel};
use sixdof_ecs::ecs::{Body, Handle};
use sixdof_ecs::forces::gravity::CentralGravity;
use sixdof_ecs::integration::{six_dof_builder, total_kinetic_energy};
use sixdof_ecs::math::SpatialInertia;
use sixdof_ecs::sim::WorldBuilder;

/// Render-side data the simulation never reads
#[allow(dead_code)]
struct Mesh {
    name: &'static str,
    vertices: usize,
}

#[allow(dead_code)]
struct Material {
    color: [f32; 3],
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Six-DOF ECS - Three Body Example");
    println!("================================\n");

    let config = SimulationConfig::new()
        .with_time_step(1.0 / 60.0)
        .with_history(120);
    let mut builder = WorldBuilder::new().with_config(config.clone());

    let cube = builder.insert_asset(Mesh {
        name: "cube",
        vertices: 8,
    });
    let steel = builder.insert_asset(Material {
        color: [0.6, 0.6, 0.65],
    });

    let mut bodies = Vec::new();
    for (i, radius) in [2.0, 3.5, 5.0].into_iter().enumerate() {
        // Circular orbit speed for G·M = 1
        let speed = (1.0_f64 / radius).sqrt();
        let body = Body::new(
            WorldPos::new(DQuat::IDENTITY, DVec3::new(radius, 0.0, 0.0)),
            WorldVel::new(DVec3::new(0.0, 0.0, 1.0 + i as f64), DVec3::new(0.0, speed, 0.0)),
            Inertia(SpatialInertia::from_diagonal(DVec3::new(0.2, 0.3, 0.4), 1.0)),
        );
        let entity = builder.spawn((body, cube, steel))?;
        bodies.push(entity);
    }
    println!("Spawned {} bodies", bodies.len());

    let mut pipeline = six_dof_builder(&config)?;
    pipeline.add_system(CentralGravity::unit_attractor().into_system());
    let pipeline = pipeline.build()?;
    println!("Pipeline stages: {:?}", pipeline.stage_names());

    let mut sim = builder.run(pipeline)?;
    let initial_energy = total_kinetic_energy(sim.world())?;

    for second in 1..=5 {
        sim.run_for(60)?;
        println!("\nt = {:.2} s (tick {})", sim.elapsed(), sim.tick_count());
        for &entity in &bodies {
            let pos = sim.world().get::<WorldPos>(entity)?;
            let p = pos.linear();
            let (axis, angle) = pos.angular().to_axis_angle();
            println!(
                "  {} at ({:+.3}, {:+.3}, {:+.3}), rotated {:.2} rad about ({:.1}, {:.1}, {:.1})",
                entity, p.x, p.y, p.z, angle, axis.x, axis.y, axis.z
            );
        }
        log::info!("second {} complete", second);
    }

    let mesh: Handle<Mesh> = *sim.world().get::<Handle<Mesh>>(bodies[0])?;
    println!("\nBody 0 still renders as `{}`", sim.world().asset(mesh)?.name);

    let energy = total_kinetic_energy(sim.world())?;
    println!("Kinetic energy: {:.6} -> {:.6}", initial_energy, energy);

    if let Some(latest) = sim.history().and_then(|history| history.latest()) {
        println!("\nLatest snapshot ({} bytes of JSON)", latest.to_json()?.len());
    }

    println!("\nExample completed successfully!");
    Ok(())
}
