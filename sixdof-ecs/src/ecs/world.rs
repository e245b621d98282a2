//! World management
//!
//! The World is the central container for all ECS data. It owns the entity
//! allocator, one column per registered component type and the asset store,
//! and it is the only thing systems read from while a tick is evaluated.

use crate::ecs::assets::{Asset, AssetStore, Handle};
use crate::ecs::component::ErasedColumn;
use crate::ecs::entity::EntityAllocator;
use crate::ecs::query::{Query, QueryData};
use crate::ecs::{Bundle, Column, Component, ComponentId, Entity};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// The main ECS world container
///
/// World manages entity lifecycles and stores components column by column.
/// Cloning a world deep-copies every column, which is how simulations are
/// forked.
pub struct World {
    entities: EntityAllocator,
    columns: BTreeMap<ComponentId, Box<dyn ErasedColumn>>,
    assets: AssetStore,
    tick: u64,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        World {
            entities: EntityAllocator::default(),
            columns: BTreeMap::new(),
            assets: AssetStore::new(),
            tick: 0,
        }
    }

    /// Spawn a body from a bundle of components
    ///
    /// Every value is validated before an entity is allocated, so a rejected
    /// bundle leaves the world untouched.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        let count = check_bundle(&bundle)?;
        let entity = self.entities.allocate();
        bundle.insert_into(self, entity);
        log::debug!("spawned {} with {} components", entity, count);
        Ok(entity)
    }

    /// Add or overwrite every component of `bundle` on a live entity
    ///
    /// Validation happens before anything is written, as for [`spawn`].
    ///
    /// [`spawn`]: World::spawn
    pub fn insert_bundle<B: Bundle>(&mut self, entity: Entity, bundle: B) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(Error::EntityNotFound(entity));
        }
        let count = check_bundle(&bundle)?;
        bundle.insert_into(self, entity);
        log::debug!("inserted {} components on {}", count, entity);
        Ok(())
    }

    /// Remove an entity and every component it owns
    pub fn despawn(&mut self, entity: Entity) -> Result<()> {
        if !self.entities.free(entity) {
            return Err(Error::EntityNotFound(entity));
        }
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        log::debug!("despawned {}", entity);
        Ok(())
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Get the number of alive entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Alive entities in ascending index order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    /// Register a component type without inserting any values
    ///
    /// Querying a registered but empty column yields no rows instead of an
    /// error.
    pub fn register<T: Component>(&mut self) {
        self.column_or_register::<T>();
    }

    /// Whether a column exists for `T`
    pub fn is_registered<T: Component>(&self) -> bool {
        self.columns.contains_key(&ComponentId::of::<T>())
    }

    /// Whether a column exists for the component id
    pub fn has_column(&self, id: ComponentId) -> bool {
        self.columns.contains_key(&id)
    }

    /// Registered component ids in name order
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.columns.keys().copied()
    }

    /// Column for `T`
    pub fn column<T: Component>(&self) -> Result<&Column<T>> {
        self.columns
            .get(&ComponentId::of::<T>())
            .and_then(|column| column.as_any().downcast_ref::<Column<T>>())
            .ok_or(Error::ComponentNotRegistered {
                component: T::name(),
            })
    }

    /// Mutable column for `T`
    pub fn column_mut<T: Component>(&mut self) -> Result<&mut Column<T>> {
        self.columns
            .get_mut(&ComponentId::of::<T>())
            .and_then(|column| column.as_any_mut().downcast_mut::<Column<T>>())
            .ok_or(Error::ComponentNotRegistered {
                component: T::name(),
            })
    }

    pub(crate) fn column_or_register<T: Component>(&mut self) -> &mut Column<T> {
        let column = self
            .columns
            .entry(ComponentId::of::<T>())
            .or_insert_with(|| {
                log::debug!("registered component column `{}`", T::name());
                Box::new(Column::<T>::new())
            });
        match column.as_any_mut().downcast_mut::<Column<T>>() {
            Some(column) => column,
            // Ids are derived from the TypeId of T, so the downcast cannot miss
            None => unreachable!("column for `{}` has a different type", T::name()),
        }
    }

    /// Component value of an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        if !self.is_alive(entity) {
            return Err(Error::EntityNotFound(entity));
        }
        self.column::<T>()?
            .get(entity)
            .ok_or(Error::MissingComponent {
                entity,
                component: T::name(),
            })
    }

    /// Mutable component value of an entity
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        if !self.is_alive(entity) {
            return Err(Error::EntityNotFound(entity));
        }
        self.column_mut::<T>()?
            .get_mut(entity)
            .ok_or(Error::MissingComponent {
                entity,
                component: T::name(),
            })
    }

    /// Add or overwrite one component on a live entity
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(Error::EntityNotFound(entity));
        }
        value.validate()?;
        self.column_or_register::<T>().insert(entity, value);
        Ok(())
    }

    /// Remove one component from an entity
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T> {
        self.column_mut::<T>()?
            .remove(entity)
            .ok_or(Error::MissingComponent {
                entity,
                component: T::name(),
            })
    }

    /// Entities holding every component in `Q`, in ascending index order
    ///
    /// # Example
    ///
    /// ```
    /// use sixdof_ecs::ecs::World;
    /// use sixdof_ecs::ecs::components::{Force, WorldPos};
    /// use glam::DVec3;
    ///
    /// let mut world = World::new();
    /// world.spawn((WorldPos::from_linear(DVec3::X), Force::zero())).unwrap();
    /// world.spawn(WorldPos::from_linear(DVec3::Y)).unwrap();
    ///
    /// let query = world.query::<(WorldPos, Force)>().unwrap();
    /// assert_eq!(query.len(), 1);
    /// ```
    pub fn query<Q: QueryData>(&self) -> Result<Query<'_, Q>> {
        Query::new(self)
    }

    /// Store an asset and get a handle that can be attached to bodies
    pub fn insert_asset<A: Asset>(&mut self, asset: A) -> Handle<A> {
        self.assets.insert(asset)
    }

    /// Look up an asset by handle
    pub fn asset<A: Asset>(&self, handle: Handle<A>) -> Result<&A> {
        self.assets.get(handle)
    }

    /// The asset store
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Number of completed ticks
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }
}

/// Reject duplicate components and invalid values; returns the component count
fn check_bundle<B: Bundle>(bundle: &B) -> Result<usize> {
    let mut ids = Vec::new();
    bundle.component_ids(&mut ids);
    ids.sort();
    if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(Error::InvalidComponent {
            component: pair[0].name(),
            reason: "appears more than once in the bundle".to_string(),
        });
    }
    bundle.validate_bundle()?;
    Ok(ids.len())
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for World {
    fn clone(&self) -> Self {
        World {
            entities: self.entities.clone(),
            columns: self
                .columns
                .iter()
                .map(|(id, column)| (*id, column.clone_boxed()))
                .collect(),
            assets: self.assets.clone(),
            tick: self.tick,
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: BTreeMap<&str, usize> = self
            .columns
            .iter()
            .map(|(id, column)| (id.name(), column.len()))
            .collect();
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("columns", &columns)
            .field("assets", &self.assets.len())
            .field("tick", &self.tick)
            .finish()
    }
}
