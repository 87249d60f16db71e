//! The monitoring engine: SLA polling and lifecycle supervision.
//!
//! ## Architecture
//!
//! - `sla` - HTTP client for the scanner status endpoint
//! - `poller` - periodic SLA evaluation with hysteresis and
//!   failure-streak escalation
//! - `controller` - start/stop lifecycle supervising the poller task
//!   and one subscriber task per configured chain

pub mod controller;
pub mod poller;
pub mod sla;

pub use controller::*;
pub use poller::*;
pub use sla::*;
