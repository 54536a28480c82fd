// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Synchronization primitives of the control path.
//!
//! Built with the `shuttle` feature, these resolve to shuttle's models so that the registry
//! can be exercised under randomized schedules.

#[cfg(not(feature = "shuttle"))]
pub(crate) use std::sync::Mutex;

#[cfg(feature = "shuttle")]
pub(crate) use shuttle::sync::Mutex;
