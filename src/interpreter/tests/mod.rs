//! Tests for the step interpreter
//!
//! Organized by step type

mod helpers;

mod assistant_tests;
mod cancel_tests;
mod halt_tests;
