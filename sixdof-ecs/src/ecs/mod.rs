//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Entity management with generational handles
//! - Column storage, one dense column per component type
//! - Multi-column queries ordered by entity index
//! - Systems with declared read/write sets and staged commits
//! - Pipeline composition with ordering constraints and parallel batches

mod assets;
mod bundle;
mod component;
pub mod components;
mod entity;
pub mod query;
pub mod scheduler;
pub(crate) mod system;
mod world;

pub use assets::{Asset, AssetStore, Handle};
pub use bundle::{Body, Bundle};
pub use component::{Column, Component, ComponentId};
pub use entity::Entity;
pub use query::{Query, QueryData};
pub use scheduler::{ExecutionMode, Pipeline, PipelineBuilder, SystemOrder, TickReport};
pub use system::{
    system, ExecContext, QuerySystem, StagedWrites, System, SystemAccess, WriteSet,
};
pub use world::World;
