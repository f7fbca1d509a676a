//! Testability harness utilities.
//!
//! Deterministic input generators shared by unit tests, integration tests,
//! the fixture catalog and the `pen_cli synth` command, so no test depends
//! on recorded digitizer data.

pub mod synthetic;

pub use synthetic::SyntheticTrace;
