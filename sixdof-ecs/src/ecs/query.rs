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
//! Multi-column queries
//!
//! A query names a set of component types and yields every entity that holds
//! all of them. Matching is a set intersection driven by the shortest column.
//! Results are always ordered by ascending entity index, independent of the
//! row order inside any column, so that every consumer of a query sees the
//! same sequence for the same world.
//!
//! Query data is any component type or a tuple of query data, so tuples nest:
//! `((WorldPos, Inertia), Force)` is a valid query.

use crate::ecs::{Column, Component, ComponentId, Entity, World};
use crate::error::Result;

/// Component types that can be fetched together
pub trait QueryData: 'static {
    /// Borrowed columns
    type Fetch<'w>;
    /// Borrowed row
    type Item<'w>;
    /// Owned copy of a row
    type Values: Copy + Send + Sync;

    /// Append the ids of every fetched component
    fn component_ids(ids: &mut Vec<ComponentId>);

    /// Borrow the columns, failing if any is unregistered
    fn fetch(world: &World) -> Result<Self::Fetch<'_>>;

    /// Candidate entities from the shortest fetched column
    fn driver<'w>(fetch: &Self::Fetch<'w>) -> &'w [Entity];

    /// Row for `entity`, if present in every column
    fn get<'w>(fetch: &Self::Fetch<'w>, entity: Entity) -> Option<Self::Item<'w>>;

    /// Copy a row out of the columns
    fn values(item: Self::Item<'_>) -> Self::Values;
}

impl<T: Component> QueryData for T {
    type Fetch<'w> = &'w Column<T>;
    type Item<'w> = &'w T;
    type Values = T;

    fn component_ids(ids: &mut Vec<ComponentId>) {
        ids.push(ComponentId::of::<T>());
    }

    fn fetch(world: &World) -> Result<Self::Fetch<'_>> {
        world.column::<T>()
    }

    fn driver<'w>(fetch: &Self::Fetch<'w>) -> &'w [Entity] {
        let column: &'w Column<T> = *fetch;
        column.entities()
    }

    fn get<'w>(fetch: &Self::Fetch<'w>, entity: Entity) -> Option<Self::Item<'w>> {
        let column: &'w Column<T> = *fetch;
        column.get(entity)
    }

    fn values(item: Self::Item<'_>) -> Self::Values {
        *item
    }
}

macro_rules! impl_query_tuple {
    ($(($idx:tt, $name:ident)),+) => {
        impl<$($name: QueryData),+> QueryData for ($($name,)+) {
            type Fetch<'w> = ($($name::Fetch<'w>,)+);
            type Item<'w> = ($($name::Item<'w>,)+);
            type Values = ($($name::Values,)+);

            fn component_ids(ids: &mut Vec<ComponentId>) {
                $($name::component_ids(ids);)+
            }

            fn fetch(world: &World) -> Result<Self::Fetch<'_>> {
                Ok(($($name::fetch(world)?,)+))
            }

            fn driver<'w>(fetch: &Self::Fetch<'w>) -> &'w [Entity] {
                let mut shortest: Option<&'w [Entity]> = None;
                $(
                    let candidate = $name::driver(&fetch.$idx);
                    if shortest.map_or(true, |current| candidate.len() < current.len()) {
                        shortest = Some(candidate);
                    }
                )+
                shortest.unwrap_or(&[])
            }

            fn get<'w>(fetch: &Self::Fetch<'w>, entity: Entity) -> Option<Self::Item<'w>> {
                Some(($($name::get(&fetch.$idx, entity)?,)+))
            }

            fn values(item: Self::Item<'_>) -> Self::Values {
                ($($name::values(item.$idx),)+)
            }
        }
    };
}

impl_query_tuple!((0, Q0));
impl_query_tuple!((0, Q0), (1, Q1));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2), (3, Q3));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2), (3, Q3), (4, Q4));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2), (3, Q3), (4, Q4), (5, Q5));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2), (3, Q3), (4, Q4), (5, Q5), (6, Q6));
impl_query_tuple!((0, Q0), (1, Q1), (2, Q2), (3, Q3), (4, Q4), (5, Q5), (6, Q6), (7, Q7));

/// Result of matching `Q` against a world
///
/// The match set is computed once when the query is built; iteration then
/// reads rows straight out of the borrowed columns.
pub struct Query<'w, Q: QueryData> {
    fetch: Q::Fetch<'w>,
    matches: Vec<Entity>,
}

impl<'w, Q: QueryData> Query<'w, Q> {
    pub(crate) fn new(world: &'w World) -> Result<Self> {
        let fetch = Q::fetch(world)?;
        let mut matches: Vec<Entity> = Q::driver(&fetch)
            .iter()
            .copied()
            .filter(|entity| Q::get(&fetch, *entity).is_some())
            .collect();
        matches.sort_unstable();
        Ok(Query { fetch, matches })
    }

    /// Number of matching entities
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matching entities in ascending index order
    pub fn entities(&self) -> &[Entity] {
        &self.matches
    }

    /// Row for one entity
    pub fn get(&self, entity: Entity) -> Option<Q::Item<'w>> {
        Q::get(&self.fetch, entity)
    }

    /// Iterate `(entity, row)` in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (Entity, Q::Item<'w>)> + '_ {
        self.matches
            .iter()
            .filter_map(move |entity| Q::get(&self.fetch, *entity).map(|item| (*entity, item)))
    }

    /// Copy every row out, in ascending index order
    pub fn values(&self) -> Vec<(Entity, Q::Values)> {
        self.iter().map(|(entity, item)| (entity, Q::values(item))).collect()
    }
}

/// Component ids fetched by `Q`
pub fn component_ids<Q: QueryData>() -> Vec<ComponentId> {
    let mut ids = Vec::new();
    Q::component_ids(&mut ids);
    ids
}
