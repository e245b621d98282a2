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
//! Entity management
//!
//! Entities are opaque keys into component columns. They carry no data of
//! their own. An entity is an index plus a generation: despawning bumps the
//! generation so stale handles never alias a body spawned later into the same
//! index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a simulated body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Create an entity handle from raw parts
    pub fn new(index: u32, generation: u32) -> Self {
        Entity { index, generation }
    }

    /// Slot index, used to address column rows
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.index, self.generation)
    }
}

/// Allocates entity handles and recycles despawned indices
///
/// Freed indices are reused lowest-first so that allocation order stays
/// deterministic for a given sequence of spawns and despawns.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: std::collections::BTreeSet<u32>,
    alive_count: usize,
}

impl EntityAllocator {
    pub(crate) fn allocate(&mut self) -> Entity {
        let index = match self.free.pop_first() {
            Some(index) => index,
            None => {
                let index = self.generations.len() as u32;
                self.generations.push(0);
                self.alive.push(false);
                index
            }
        };
        self.alive[index as usize] = true;
        self.alive_count += 1;
        Entity::new(index, self.generations[index as usize])
    }

    pub(crate) fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index() as usize;
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.insert(entity.index());
        self.alive_count -= 1;
        true
    }

    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        slot < self.alive.len()
            && self.alive[slot]
            && self.generations[slot] == entity.generation()
    }

    pub(crate) fn len(&self) -> usize {
        self.alive_count
    }

    /// Alive entities in ascending index order
    pub(crate) fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(index, _)| Entity::new(index as u32, self.generations[index]))
    }
}
