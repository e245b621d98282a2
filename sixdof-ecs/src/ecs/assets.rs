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
//! Opaque asset storage
//!
//! Meshes, materials and similar data are not interpreted by the simulation
//! core. They are stored here and referenced through typed [`Handle`]s, which
//! are ordinary components and travel with a body as pass-through columns.

use crate::ecs::Component;
use crate::error::{Error, Result};
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Marker for anything that can be stored as an asset
pub trait Asset: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Asset for T {}

/// Typed reference to an asset in an [`AssetStore`]
pub struct Handle<A> {
    id: u64,
    marker: PhantomData<fn() -> A>,
}

impl<A> Handle<A> {
    fn new(id: u64) -> Self {
        Handle {
            id,
            marker: PhantomData,
        }
    }

    /// Raw id, stable for the lifetime of the store
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<A> Clone for Handle<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Handle<A> {}

impl<A> PartialEq for Handle<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A> Eq for Handle<A> {}

impl<A> fmt::Debug for Handle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({})", type_name::<A>(), self.id)
    }
}

impl<A: Asset> Component for Handle<A> {}

/// Append-only store of type-erased assets
#[derive(Clone, Default)]
pub struct AssetStore {
    assets: BTreeMap<u64, Arc<dyn Any + Send + Sync>>,
    next_id: u64,
}

impl AssetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `asset` and return its handle
    pub fn insert<A: Asset>(&mut self, asset: A) -> Handle<A> {
        let id = self.next_id;
        self.next_id += 1;
        self.assets.insert(id, Arc::new(asset));
        Handle::new(id)
    }

    /// Look up an asset
    pub fn get<A: Asset>(&self, handle: Handle<A>) -> Result<&A> {
        self.assets
            .get(&handle.id)
            .and_then(|asset| asset.downcast_ref::<A>())
            .ok_or(Error::AssetNotFound {
                id: handle.id,
                asset: type_name::<A>(),
            })
    }

    /// Number of stored assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStore")
            .field("len", &self.assets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sphere {
        radius: f64,
    }

    #[derive(Debug)]
    struct Color(f32, f32, f32);

    #[test]
    fn test_insert_and_get() {
        let mut store = AssetStore::new();
        let sphere = store.insert(Sphere { radius: 0.2 });
        let color = store.insert(Color(1.0, 1.0, 1.0));

        assert_ne!(sphere.id(), color.id());
        assert_eq!(store.get(sphere).unwrap(), &Sphere { radius: 0.2 });
        assert_eq!(store.get(color).unwrap().0, 1.0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_asset() {
        let store = AssetStore::new();
        let handle = Handle::<Sphere>::new(7);
        assert!(matches!(
            store.get(handle),
            Err(Error::AssetNotFound { id: 7, .. })
        ));
    }

    #[test]
    fn test_handle_type_mismatch() {
        let mut store = AssetStore::new();
        let sphere = store.insert(Sphere { radius: 1.0 });
        let wrong = Handle::<Color>::new(sphere.id());
        assert!(store.get(wrong).is_err());
    }
}
