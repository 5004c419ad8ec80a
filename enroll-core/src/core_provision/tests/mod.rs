//! Device provisioning test suite

mod cancellation_tests;
mod scenario_tests;

// Test helpers
pub mod helpers;
