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
//! Edge case tests for spawning, queries and numeric failures

use glam::DVec3;
use sixdof_ecs::ecs::components::{Force, Inertia, WorldAccel, WorldPos, WorldVel};
use sixdof_ecs::ecs::{system, Body, System, World};
use sixdof_ecs::forces::gravity::CentralGravity;
use sixdof_ecs::integration::six_dof;
use sixdof_ecs::math::SpatialInertia;
use sixdof_ecs::sim::WorldBuilder;
use sixdof_ecs::Error;

fn body_at(x: f64) -> Body {
    Body::new(
        WorldPos::from_linear(DVec3::new(x, 0.0, 0.0)),
        WorldVel::zero(),
        Inertia::from_mass(1.0),
    )
}

#[test]
fn test_query_excludes_bodies_without_force() {
    let mut world = World::new();
    let with_force = world.spawn(body_at(1.0)).unwrap();
    let without_force = world
        .spawn((WorldPos::default(), WorldVel::zero(), Inertia::from_mass(1.0)))
        .unwrap();

    let query = world
        .query::<(WorldPos, WorldVel, Inertia, Force)>()
        .unwrap();
    assert_eq!(query.entities(), &[with_force]);

    let partial = world.query::<(WorldPos, WorldVel, Inertia)>().unwrap();
    assert_eq!(partial.entities(), &[with_force, without_force]);
}

#[test]
fn test_integrator_skips_bodies_without_force() {
    let mut builder = WorldBuilder::new();
    builder.spawn(body_at(0.0)).unwrap();
    let still = builder
        .spawn((
            WorldPos::default(),
            WorldVel::from_linear(DVec3::X),
            Inertia::from_mass(1.0),
        ))
        .unwrap();

    let mut sim = builder.run(six_dof(1.0, Vec::new()).unwrap()).unwrap();
    sim.run_for(3).unwrap();

    assert_eq!(sim.world().get::<WorldPos>(still).unwrap().linear(), DVec3::ZERO);
}

#[test]
fn test_empty_world_ticks() {
    let mut world = World::new();
    world.register::<WorldPos>();
    world.register::<WorldVel>();
    world.register::<Inertia>();
    world.register::<Force>();

    let pipeline = six_dof(0.1, Vec::new()).unwrap();
    pipeline.validate(&world).unwrap();
    let report = pipeline.tick(&mut world).unwrap();

    assert_eq!(report.rows, 0);
    assert_eq!(world.tick(), 1);
}

#[test]
fn test_zero_mass_rejected_at_spawn() {
    let mut world = World::new();
    let mut body = body_at(0.0);
    body.inertia = Inertia(SpatialInertia::from_mass(0.0));

    let err = world.spawn(body).unwrap_err();
    assert!(matches!(err, Error::InvalidMass { entity: None, mass } if mass == 0.0));
    assert_eq!(world.entity_count(), 0);

    assert!(Inertia::try_from_mass(-1.0).is_err());
}

#[test]
#[should_panic(expected = "Mass must be positive and finite")]
fn test_zero_mass_constructor_panics() {
    Inertia::from_mass(0.0);
}

#[test]
fn test_non_finite_spawn_rejected() {
    let mut world = World::new();
    let body = Body::new(
        WorldPos::from_linear(DVec3::new(f64::NAN, 0.0, 0.0)),
        WorldVel::zero(),
        Inertia::from_mass(1.0),
    );
    assert!(matches!(
        world.spawn(body),
        Err(Error::InvalidComponent { component: "WorldPos", .. })
    ));
}

#[test]
fn test_zero_mass_rejected_at_integration() {
    let mut builder = WorldBuilder::new();
    builder.spawn(body_at(0.0)).unwrap();
    let bad = builder.spawn(body_at(1.0)).unwrap();
    let mut sim = builder.run(six_dof(0.1, Vec::new()).unwrap()).unwrap();

    sim.world_mut().get_mut::<Inertia>(bad).unwrap().0.mass = 0.0;

    let err = sim.tick().unwrap_err();
    assert!(matches!(err, Error::InvalidMass { entity: Some(e), .. } if e == bad));
    assert_eq!(sim.tick_count(), 0);
}

#[test]
fn test_nan_force_names_entity_and_commits_nothing() {
    let mut builder = WorldBuilder::new();
    let good = builder.spawn(body_at(0.0)).unwrap();
    let bad = builder.spawn(body_at(2.0)).unwrap();

    let poison = system::<(WorldPos, Force), Force, _>("poison", |(pos, force)| {
        if pos.linear().x > 1.0 {
            Force::from_linear(DVec3::splat(f64::NAN))
        } else {
            force + Force::from_linear(DVec3::X)
        }
    });
    let pipeline = six_dof(0.1, vec![Box::new(poison) as Box<dyn System>]).unwrap();
    let mut sim = builder.run(pipeline).unwrap();

    let err = sim.tick().unwrap_err();
    match err {
        Error::NonFinite {
            ref stage,
            component,
            entity,
        } => {
            assert_eq!(stage, "poison");
            assert_eq!(component, "Force");
            assert_eq!(entity, bad);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.entity(), Some(bad));

    // The failing stage staged nothing, so the good body kept its force
    assert_eq!(sim.world().get::<Force>(good).unwrap(), &Force::zero());
    assert_eq!(sim.world().get::<WorldPos>(good).unwrap().linear(), DVec3::ZERO);
    assert_eq!(sim.tick_count(), 0);
}

#[test]
fn test_overflow_in_integrator_is_reported() {
    let mut builder = WorldBuilder::new();
    let body = Body::new(WorldPos::default(), WorldVel::zero(), Inertia::from_mass(1e-300))
        .with_force(Force::from_linear(DVec3::new(1e300, 0.0, 0.0)));
    let e = builder.spawn(body).unwrap();

    let mut sim = builder.run(six_dof(1.0, Vec::new()).unwrap()).unwrap();
    let err = sim.tick().unwrap_err();

    assert!(matches!(err, Error::NonFinite { ref stage, .. } if stage == "six_dof"));
    assert_eq!(err.entity(), Some(e));
}

#[test]
fn test_stale_entity_rejected() {
    let mut world = World::new();
    let e = world.spawn(body_at(0.0)).unwrap();
    world.despawn(e).unwrap();
    let reused = world.spawn(body_at(1.0)).unwrap();

    assert_eq!(reused.index(), e.index());
    assert!(matches!(world.get::<WorldPos>(e), Err(Error::EntityNotFound(_))));
    assert!(matches!(world.insert(e, Force::zero()), Err(Error::EntityNotFound(_))));
}

#[test]
fn test_world_accel_recorded_when_present() {
    let mut builder = WorldBuilder::new();
    let body = body_at(0.0)
        .with_force(Force::from_linear(DVec3::new(0.0, 4.0, 0.0)))
        .with_world_accel();
    let tracked = builder.spawn(body).unwrap();
    let untracked = builder.spawn(body_at(1.0)).unwrap();

    let mut sim = builder.run(six_dof(0.5, Vec::new()).unwrap()).unwrap();
    sim.tick().unwrap();

    let accel = sim.world().get::<WorldAccel>(tracked).unwrap();
    assert_eq!(accel.linear(), DVec3::new(0.0, 4.0, 0.0));
    assert!(sim.world().get::<WorldAccel>(untracked).is_err());
}

#[test]
fn test_retried_tick_matches_clean_run() {
    let start = |builder: &mut WorldBuilder| {
        let healthy = builder
            .spawn(Body::new(
                WorldPos::from_linear(DVec3::new(5.0, 0.0, 0.0)),
                WorldVel::zero(),
                Inertia::from_mass(1.0),
            ))
            .unwrap();
        let fragile = builder.spawn(body_at(-5.0)).unwrap();
        (healthy, fragile)
    };
    let pipeline = || {
        let gravity: Box<dyn System> = Box::new(CentralGravity::new(1.0, 25.0).into_system());
        six_dof(1.0, vec![gravity]).unwrap()
    };

    let mut clean_builder = WorldBuilder::new();
    let (healthy, _) = start(&mut clean_builder);
    let mut clean = clean_builder.run(pipeline()).unwrap();
    clean.tick().unwrap();

    let mut builder = WorldBuilder::new();
    let (_, fragile) = start(&mut builder);
    let mut retried = builder.run(pipeline()).unwrap();

    retried.world_mut().get_mut::<Inertia>(fragile).unwrap().0.mass = 0.0;
    assert!(matches!(retried.tick(), Err(Error::InvalidMass { .. })));
    // Gravity ran before the integrator failed, but none of it was kept
    assert_eq!(retried.world().get::<Force>(healthy).unwrap(), &Force::zero());
    assert_eq!(retried.tick_count(), 0);

    retried.world_mut().get_mut::<Inertia>(fragile).unwrap().0.mass = 1.0;
    retried.tick().unwrap();

    for entity in [healthy, fragile] {
        assert_eq!(
            retried.world().get::<WorldVel>(entity).unwrap(),
            clean.world().get::<WorldVel>(entity).unwrap()
        );
        assert_eq!(
            retried.world().get::<WorldPos>(entity).unwrap(),
            clean.world().get::<WorldPos>(entity).unwrap()
        );
    }
    assert_eq!(clean.world().get::<WorldVel>(healthy).unwrap().linear(), DVec3::new(-1.0, 0.0, 0.0));
}
