//! Logic Module - Event Processing & Response
//!
//! ## Controllers
//! - `prevention/` - offense scoring, time-bounded blocking
//! - `alerting/` - throttled notifications
//! - `monitoring/` - traffic telemetry for the live dashboard
//!
//! ## Shared
//! - `types` - event vocabulary shared by all controllers
//! - `worker` - polling loop driving each controller
//! - `dispatch` - off-path delivery to slow collaborators
//! - `store` - timestamped JSON snapshots
//! - `events` - live update sink
//! - `clock` - time source

// Shared
pub mod buffer;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod store;
pub mod types;
pub mod worker;

// Controllers
pub mod alerting;
pub mod monitoring;
pub mod prevention;

// Runtime
pub mod simulate;
pub mod status;
