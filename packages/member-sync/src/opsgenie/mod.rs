//! Opsgenie adapters.
//!
//! - `OnCall` - Reads the people currently on call for a schedule (read-only)

pub mod oncall;

pub use oncall::{OnCall, OnCallRequest, OnCallResult, ScheduleClient, ScheduleIdentifierType};
