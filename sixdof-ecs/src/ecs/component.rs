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
//! Component storage
//!
//! Components are plain `Copy` values attached to entities. Each component
//! type lives in its own [`Column`], a densely packed array of values kept in
//! parallel with the entity that owns each row and a sparse index from entity
//! slot to row.
//!
//! # Memory Layout
//!
//! ```text
//! values:   [v0, v1, v2, v3]      // contiguous, insertion order
//! entities: [e0, e1, e2, e3]      // owner of each row
//! sparse:   [0, -, 1, 2, -, 3]    // entity index -> row
//! ```
//!
//! Rows are appended on insert and stay put until their entity is removed.
//! Removal swaps the last row into the hole, so only the moved entity's row
//! changes.

use crate::ecs::Entity;
use crate::error::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::cmp::Ordering;
use std::fmt;

/// Trait that all components must implement
///
/// Components should be small plain data. They are copied out of columns
/// when a system evaluates a row, so `Copy` is required.
pub trait Component: Copy + Send + Sync + 'static {
    /// Human-readable name used in errors and logs
    fn name() -> &'static str {
        short_type_name::<Self>()
    }

    /// Check that the value holds no NaN or infinite numbers
    fn is_finite(&self) -> bool {
        true
    }

    /// Validate a value before it is spawned into a world
    fn validate(&self) -> Result<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidComponent {
                component: Self::name(),
                reason: "value is not finite".to_string(),
            })
        }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    if full.contains('<') {
        full
    } else {
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Identity of a component type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentId {
    /// Identifier of component `T`
    pub fn of<T: Component>() -> Self {
        ComponentId {
            type_id: TypeId::of::<T>(),
            name: T::name(),
        }
    }

    /// Component name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialOrd for ComponentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.name)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const VACANT: usize = usize::MAX;

/// Dense, insertion-ordered storage for one component type
///
/// # Example
///
/// ```
/// use sixdof_ecs::ecs::{Column, Entity};
/// use sixdof_ecs::ecs::components::Force;
///
/// let mut column = Column::<Force>::new();
/// let entity = Entity::new(1, 0);
///
/// column.insert(entity, Force::zero());
/// assert!(column.contains(entity));
/// assert_eq!(column.row(entity), Some(0));
/// ```
#[derive(Clone)]
pub struct Column<T: Component> {
    values: Vec<T>,
    entities: Vec<Entity>,
    sparse: Vec<usize>,
}

impl<T: Component> Column<T> {
    /// Create an empty column
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty column with room for `capacity` rows
    pub fn with_capacity(capacity: usize) -> Self {
        Column {
            values: Vec::with_capacity(capacity),
            entities: Vec::with_capacity(capacity),
            sparse: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Insert or overwrite the value for `entity`
    pub fn insert(&mut self, entity: Entity, value: T) {
        if let Some(row) = self.row(entity) {
            self.values[row] = value;
            return;
        }

        let slot = entity.index() as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, VACANT);
        }
        self.sparse[slot] = self.values.len();
        self.values.push(value);
        self.entities.push(entity);

        debug_assert_eq!(self.values.len(), self.entities.len());
    }

    /// Remove the row owned by `entity`
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let row = self.row(entity)?;
        let last = self.values.len() - 1;
        if row != last {
            let moved = self.entities[last];
            self.sparse[moved.index() as usize] = row;
        }
        self.sparse[entity.index() as usize] = VACANT;
        self.entities.swap_remove(row);

        debug_assert_eq!(self.values.len() - 1, self.entities.len());
        Some(self.values.swap_remove(row))
    }

    /// Row index of `entity`, if it has a value here
    pub fn row(&self, entity: Entity) -> Option<usize> {
        let row = *self.sparse.get(entity.index() as usize)?;
        if row == VACANT || self.entities[row] != entity {
            None
        } else {
            Some(row)
        }
    }

    /// Whether `entity` has a value here
    pub fn contains(&self, entity: Entity) -> bool {
        self.row(entity).is_some()
    }

    /// Value for `entity`
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.row(entity).map(|row| &self.values[row])
    }

    /// Mutable value for `entity`
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let row = self.row(entity)?;
        Some(&mut self.values[row])
    }

    /// Dense values in row order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable dense values in row order
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Row owners in row order
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate `(entity, value)` pairs in row order
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.entities.iter().copied().zip(self.values.iter())
    }

    /// Overwrite every value with `value`
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component + fmt::Debug> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Object-safe view of a column, used by the world to hold columns of
/// different component types side by side
pub(crate) trait ErasedColumn: Send + Sync {
    fn component(&self) -> ComponentId;
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn clone_boxed(&self) -> Box<dyn ErasedColumn>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for Column<T> {
    fn component(&self) -> ComponentId {
        ComponentId::of::<T>()
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        Column::contains(self, entity)
    }

    fn len(&self) -> usize {
        Column::len(self)
    }

    fn clone_boxed(&self) -> Box<dyn ErasedColumn> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct TestComponent {
        x: f32,
        y: f32,
    }

    impl Component for TestComponent {}

    #[test]
    fn test_component_name() {
        assert_eq!(TestComponent::name(), "TestComponent");
        assert_eq!(ComponentId::of::<TestComponent>().name(), "TestComponent");
    }

    #[test]
    fn test_column_insert_get() {
        let mut column = Column::<TestComponent>::new();
        let entity = Entity::new(1, 0);

        column.insert(entity, TestComponent { x: 10.0, y: 20.0 });
        assert!(column.contains(entity));
        assert_eq!(column.get(entity).unwrap().x, 10.0);
        assert_eq!(column.len(), 1);
    }

    #[test]
    fn test_column_overwrite_keeps_row() {
        let mut column = Column::<TestComponent>::new();
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        column.insert(a, TestComponent { x: 1.0, y: 1.0 });
        column.insert(b, TestComponent { x: 2.0, y: 2.0 });
        column.insert(a, TestComponent { x: 3.0, y: 3.0 });

        assert_eq!(column.len(), 2);
        assert_eq!(column.row(a), Some(0));
        assert_eq!(column.get(a).unwrap().x, 3.0);
    }

    #[test]
    fn test_column_insertion_order() {
        let mut column = Column::<TestComponent>::new();
        for i in [5u32, 2, 9] {
            column.insert(Entity::new(i, 0), TestComponent { x: i as f32, y: 0.0 });
        }
        let order: Vec<u32> = column.entities().iter().map(|e| e.index()).collect();
        assert_eq!(order, vec![5, 2, 9]);
    }

    #[test]
    fn test_column_remove_swaps_last() {
        let mut column = Column::<TestComponent>::new();
        let entities: Vec<Entity> = (0..3).map(|i| Entity::new(i, 0)).collect();
        for (i, e) in entities.iter().enumerate() {
            column.insert(*e, TestComponent { x: i as f32, y: 0.0 });
        }

        let removed = column.remove(entities[0]).unwrap();
        assert_eq!(removed.x, 0.0);
        assert!(!column.contains(entities[0]));
        assert_eq!(column.row(entities[2]), Some(0));
        assert_eq!(column.get(entities[2]).unwrap().x, 2.0);
        assert_eq!(column.row(entities[1]), Some(1));
    }

    #[test]
    fn test_column_rejects_stale_generation() {
        let mut column = Column::<TestComponent>::new();
        column.insert(Entity::new(4, 0), TestComponent { x: 1.0, y: 0.0 });
        assert!(!column.contains(Entity::new(4, 1)));
        assert!(column.remove(Entity::new(4, 1)).is_none());
    }

    #[test]
    fn test_erased_column_downcast() {
        let mut column = Column::<TestComponent>::new();
        column.insert(Entity::new(0, 0), TestComponent { x: 1.0, y: 2.0 });
        let erased: Box<dyn ErasedColumn> = Box::new(column);

        assert_eq!(erased.component(), ComponentId::of::<TestComponent>());
        let cloned = erased.clone_boxed();
        let typed = cloned.as_any().downcast_ref::<Column<TestComponent>>().unwrap();
        assert_eq!(typed.values()[0].y, 2.0);
    }
}
