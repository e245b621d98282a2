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
//! Determinism tests: identical inputs must give bit-identical state

use glam::{DQuat, DVec3};
use sixdof_ecs::config::SimulationConfig;
use sixdof_ecs::ecs::components::{Force, Inertia, WorldPos, WorldVel};
use sixdof_ecs::ecs::{system, Body, ExecutionMode, System, SystemOrder};
use sixdof_ecs::forces::gravity::CentralGravity;
use sixdof_ecs::integration::six_dof_builder;
use sixdof_ecs::sim::{Simulation, WorldBuilder};

fn scenario(config: SimulationConfig, bodies: usize) -> Simulation {
    let mut builder = WorldBuilder::new().with_config(config.clone());
    for i in 0..bodies {
        let t = i as f64;
        let inertia = Inertia::from_diagonal(DVec3::new(1.0, 1.5 + t * 0.01, 2.0), 1.0 + t * 0.1)
            .unwrap();
        let body = Body::new(
            WorldPos::new(
                DQuat::from_rotation_y(t * 0.3),
                DVec3::new(3.0 + t.sin(), t.cos(), 0.1 * t),
            ),
            WorldVel::new(DVec3::new(0.1, 0.2 * t.sin(), 0.3), DVec3::new(0.0, 0.5, 0.0)),
            inertia,
        );
        builder.spawn(body).unwrap();
    }

    let mut pipeline = six_dof_builder(&config).unwrap();
    pipeline
        .add_system(CentralGravity::new(1.0, 20.0).with_softening(0.01).into_system())
        .add_system_ordered(
            system::<(WorldVel, Force), Force, _>("spin_drag", |(vel, force)| {
                force + Force::from_torque(-vel.angular() * 0.05)
            }),
            SystemOrder::new().after("gravity"),
        );
    builder.run(pipeline.build().unwrap()).unwrap()
}

fn state_bits(sim: &Simulation) -> Vec<u64> {
    let query = sim
        .world()
        .query::<(WorldPos, WorldVel)>()
        .unwrap();
    let mut bits = Vec::new();
    for (_, (pos, vel)) in query.iter() {
        let q = pos.angular();
        for value in pos
            .linear()
            .to_array()
            .into_iter()
            .chain([q.x, q.y, q.z, q.w])
            .chain(vel.linear().to_array())
            .chain(vel.angular().to_array())
        {
            bits.push(value.to_bits());
        }
    }
    bits
}

#[test]
fn test_same_inputs_bit_identical() {
    let config = SimulationConfig::new().with_time_step(0.005);
    let mut first = scenario(config.clone(), 16);
    let mut second = scenario(config, 16);

    first.run_for(300).unwrap();
    second.run_for(300).unwrap();

    assert_eq!(state_bits(&first), state_bits(&second));
}

#[test]
fn test_fork_replays_identically() {
    let mut sim = scenario(SimulationConfig::new(), 8);
    sim.run_for(50).unwrap();

    let mut fork = sim.fork();
    sim.run_for(100).unwrap();
    fork.run_for(100).unwrap();

    assert_eq!(sim.tick_count(), 150);
    assert_eq!(state_bits(&sim), state_bits(&fork));
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_matches_sequential() {
    let sequential = SimulationConfig::new().with_time_step(0.01);
    let parallel = sequential
        .clone()
        .with_execution(ExecutionMode::Parallel)
        .with_parallel_row_threshold(1);

    let mut a = scenario(sequential, 64);
    let mut b = scenario(parallel, 64);
    assert_eq!(b.pipeline().mode(), ExecutionMode::Parallel);

    a.run_for(100).unwrap();
    b.run_for(100).unwrap();

    assert_eq!(state_bits(&a), state_bits(&b));
}

#[test]
fn test_boxed_system_list_is_order_stable() {
    let build = || -> Vec<Box<dyn System>> {
        vec![Box::new(CentralGravity::new(1.0, 1.0).into_system())]
    };
    let a = sixdof_ecs::integration::six_dof(0.1, build()).unwrap();
    let b = sixdof_ecs::integration::six_dof(0.1, build()).unwrap();
    assert_eq!(a.stage_names(), b.stage_names());
    assert_eq!(a.batches(), b.batches());
}
