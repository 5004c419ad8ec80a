//! Test utilities and helpers
//!
//! Fixtures for users and devices, deterministic key material, and scripted
//! doubles of the provisioning collaborators with call counters and failure
//! injection.

pub mod async_helpers;
pub mod deterministic_rng;
pub mod fixtures;
pub mod mocks;

pub use async_helpers::*;
pub use deterministic_rng::*;
pub use fixtures::*;
pub use mocks::*;
