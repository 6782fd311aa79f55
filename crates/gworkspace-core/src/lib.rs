//! Core types shared across gworkspace: the calendar event model and tracing setup.

pub mod event;
pub mod tracing;

pub use event::Event;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
