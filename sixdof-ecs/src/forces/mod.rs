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
//! Force systems
//!
//! Force systems read body state and add to the `Force` component. They run
//! before the integrator, which consumes the accumulated force and, by
//! default, clears it for the next tick.
//!
//! # Available Forces
//!
//! - [`gravity`]: attraction toward a fixed point mass

pub mod gravity;

pub use gravity::{CentralGravity, GravityLaw, GravitySystem};
