//! Core identity test suite

mod key_chain_tests;

// Test helpers and fixtures
pub mod helpers;
