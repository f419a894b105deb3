//! Board-level hooks consumed by the control plane.

pub use sara_at::hal::{Clock, SerialPort, SystemClock};

use tracing::debug;

/// The module's power-on line.
pub trait PowerControl {
    /// Drive the power line high (`true`) or low (`false`).
    fn set_powered(&mut self, on: bool);
}

/// A supervising watchdog that must be kicked during long waits.
pub trait Watchdog {
    fn refresh(&mut self);
}

/// Power control for modules that are powered externally.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerControl;

impl PowerControl for NoPowerControl {
    fn set_powered(&mut self, on: bool) {
        debug!("NoPowerControl: power line {}", if on { "high" } else { "low" });
    }
}

/// Watchdog for hosts without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn refresh(&mut self) {}
}
