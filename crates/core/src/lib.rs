//! Polling and state reconciliation for the aquarium heater monitor.
//!
//! [`settings::SettingsController`] owns the operator's bounds,
//! [`poller::SamplePoller`] keeps a bounded history of readings, and
//! [`runtime::Monitor`] runs both against one controller.

pub mod config;
pub mod io;
pub mod poller;
pub mod runtime;
pub mod settings;
pub mod types;
