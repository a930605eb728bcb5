//! cdagent - host metrics agent speaking the collectd network protocol.
//!
//! This library provides everything the `cdagentd` daemon runs:
//! - `collector` - host counters from `/proc` (with a mock for tests)
//! - `protocol` - collectd part encoding, datagram batching, decoding
//! - `report` - one reporter per collectd plugin
//! - `agent` / `scheduler` - the sweep and the loop that drives it

pub mod agent;
pub mod collector;
pub mod config;
pub mod protocol;
pub mod report;
pub mod scheduler;
pub mod transport;

pub use agent::{Agent, Sweep, SweepStats};
pub use config::{AgentConfig, ConfigError, LogDestination, LogLevel, Overrides};
pub use scheduler::{Exit, Lifecycle, Phase, ScheduleState, Scheduler};
pub use transport::{DEFAULT_PORT, RecordingTransport, Transport, UdpTransport};
