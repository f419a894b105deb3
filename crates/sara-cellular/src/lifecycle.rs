//! Module power and boot state machine
//!
//! ```text
//!            power_on                 probe answered
//!   Off ───────────────▶ Booting ─────────────────────▶ On
//!    ▲                     │ ▲
//!    │ power_off           │ │ power_on
//!    │                     ▼ │
//!    └──────────────── Unresponsive
//!       (boot window elapsed without an answer)
//! ```
//!
//! `power_off` returns to `Off` from any state.

use std::time::Duration;

use sara_at::{AtChannel, AtError, AtResult, Command, Expect};
use tracing::{debug, info, warn};

use crate::config::ModemConfig;
use crate::executor::CommandExecutor;
use crate::hal::{Clock, Watchdog};

/// Power state of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    /// Powered, not yet known to accept commands.
    Booting,
    /// Accepting commands.
    On,
    /// Did not answer within the boot window. Stays here until powered on again.
    Unresponsive,
}

/// Timing of the boot liveness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTiming {
    pub boot_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
}

impl BootTiming {
    pub fn from_config(config: &ModemConfig) -> Self {
        BootTiming {
            boot_timeout: config.boot_timeout(),
            poll_interval: config.boot_poll_interval(),
            probe_timeout: config.probe_timeout(),
        }
    }
}

/// Tracks whether the module is powered and responsive.
#[derive(Debug)]
pub struct Lifecycle {
    state: PowerState,
    powered_on_at: Duration,
    timing: BootTiming,
}

impl Lifecycle {
    /// Create a state machine in the `Off` state.
    pub fn new(timing: BootTiming) -> Self {
        Lifecycle {
            state: PowerState::Off,
            powered_on_at: Duration::ZERO,
            timing,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Get the time the current boot started.
    pub fn powered_on_at(&self) -> Duration {
        self.powered_on_at
    }

    /// Return to `Off` and forget the boot timestamp.
    pub fn reset(&mut self) {
        self.state = PowerState::Off;
        self.powered_on_at = Duration::ZERO;
    }

    /// Record a power-on at `now`.
    ///
    /// A module that is already `On` stays `On`; any other state starts a new
    /// boot window.
    pub fn power_on(&mut self, now: Duration) {
        if self.state != PowerState::On {
            debug!("Lifecycle: {:?} -> Booting at {:?}", self.state, now);
            self.powered_on_at = now;
            self.state = PowerState::Booting;
        }
    }

    /// Record a power-off.
    pub fn power_off(&mut self) {
        debug!("Lifecycle: {:?} -> Off", self.state);
        self.state = PowerState::Off;
    }

    /// Determine whether the module is ready for commands.
    ///
    /// While `Booting`, probes the module until it answers or the boot window
    /// closes, kicking `watchdog` on every poll. A probe whose send times out
    /// only means "not yet"; any other channel failure ends this call with
    /// `false` but leaves the state `Booting`, so the next call probes again.
    pub fn probe<A, C, W>(&mut self, executor: &mut CommandExecutor<A>, clock: &C, watchdog: &mut W) -> bool
    where
        A: AtChannel,
        C: Clock,
        W: Watchdog,
    {
        match self.state {
            PowerState::Off | PowerState::Unresponsive => false,
            PowerState::On => true,
            PowerState::Booting => {
                loop {
                    match self.probe_once(executor) {
                        Ok(true) => {
                            info!("Lifecycle: module answered, now On");
                            self.state = PowerState::On;
                            return true;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            warn!("Lifecycle: liveness probe failed: {}", err);
                            return false;
                        }
                    }

                    clock.delay(self.timing.poll_interval);
                    let now = clock.now();
                    watchdog.refresh();

                    if now.saturating_sub(self.powered_on_at) >= self.timing.boot_timeout {
                        break;
                    }
                }

                warn!(
                    "Lifecycle: no answer within {:?}, module unresponsive",
                    self.timing.boot_timeout
                );
                self.state = PowerState::Unresponsive;
                false
            }
        }
    }

    /// One probe: `Ok(true)` if acknowledged, `Ok(false)` if timed out.
    fn probe_once<A: AtChannel>(&self, executor: &mut CommandExecutor<A>) -> AtResult<bool> {
        match executor.exchange(&Command::Attention, &Expect::Ok, self.timing.probe_timeout) {
            Ok(_) => Ok(true),
            Err(AtError::Timeout) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
