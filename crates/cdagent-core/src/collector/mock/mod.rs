//! Mock host for tests: an in-memory filesystem and ready-made scenarios.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
