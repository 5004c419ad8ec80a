//! Active device test suite

mod swap_tests;
