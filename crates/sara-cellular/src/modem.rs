//! The modem controller and its lifecycle operations.

use sara_at::{AtChannel, Command};
use tracing::{debug, info, warn};

use crate::config::ModemConfig;
use crate::error::{CellularError, CellularResult};
use crate::executor::CommandExecutor;
use crate::hal::{Clock, PowerControl, Watchdog};
use crate::lifecycle::{BootTiming, Lifecycle, PowerState};

/// Controller for a single SARA module.
///
/// Owns the command channel, the power line and the lifecycle state. Every
/// operation except the power transitions and the raw passthrough first
/// checks that the module has booted, and fails with
/// [`CellularError::BootFailure`] without touching the channel if it has not.
///
/// The module has one staging file and one profile of each kind, so a
/// `Modem` must be driven by a single caller at a time.
pub struct Modem<A, P, C, W> {
    pub(crate) executor: CommandExecutor<A>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) power: P,
    pub(crate) clock: C,
    pub(crate) watchdog: W,
    pub(crate) config: ModemConfig,
}

impl<A, P, C, W> Modem<A, P, C, W>
where
    A: AtChannel,
    P: PowerControl,
    C: Clock,
    W: Watchdog,
{
    /// Create a new controller. The module is assumed to be off.
    pub fn new(channel: A, power: P, clock: C, watchdog: W, config: ModemConfig) -> Self {
        Modem {
            executor: CommandExecutor::new(channel),
            lifecycle: Lifecycle::new(BootTiming::from_config(&config)),
            power,
            clock,
            watchdog,
            config,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Get the current power state.
    pub fn state(&self) -> PowerState {
        self.lifecycle.state()
    }

    /// Get the command channel.
    pub fn channel(&self) -> &A {
        self.executor.channel()
    }

    /// Release the command channel.
    pub fn into_channel(self) -> A {
        self.executor.into_inner()
    }

    /// Check that the module is ready for commands, probing it if it is booting.
    pub(crate) fn ensure_ready(&mut self) -> CellularResult<()> {
        if self
            .lifecycle
            .probe(&mut self.executor, &self.clock, &mut self.watchdog)
        {
            Ok(())
        } else {
            Err(CellularError::BootFailure)
        }
    }

    // ========================================================================
    // Power
    // ========================================================================

    /// Hold the module off and configure the serial link.
    pub fn init(&mut self) -> CellularResult<()> {
        self.power.set_powered(false);
        self.lifecycle.reset();

        self.executor
            .channel_mut()
            .set_baud_rate(self.config.baud_rate)
            .map_err(|e| CellularError::Device(format!("failed to set baud rate: {}", e)))?;

        debug!("Modem: initialized at {} baud", self.config.baud_rate);
        Ok(())
    }

    /// Raise the power line and start the boot window.
    pub fn power_on(&mut self) -> CellularResult<()> {
        self.power.set_powered(true);
        self.lifecycle.power_on(self.clock.now());
        Ok(())
    }

    /// Drop the power line.
    pub fn power_off(&mut self) -> CellularResult<()> {
        self.lifecycle.power_off();
        self.power.set_powered(false);
        Ok(())
    }

    /// Put the command interface into the mode the workflows rely on:
    /// no echo, no message waiting indications, numeric error codes.
    pub fn sync_comms(&mut self) -> CellularResult<()> {
        self.ensure_ready()?;

        let timeout = self.config.command_timeout();
        self.executor.execute_ok(&Command::EchoOff, timeout)?;
        self.executor.execute_ok(&Command::DisableMessageWaiting, timeout)?;
        self.executor.execute_ok(&Command::NumericErrors, timeout)?;

        info!("Modem: command interface synchronized");
        Ok(())
    }

    /// Power the module on and synchronize with it.
    ///
    /// Leaves the module powered and ready for commands when it returns `true`.
    pub fn is_present(&mut self) -> bool {
        if self.power_on().is_err() {
            return false;
        }
        match self.sync_comms() {
            Ok(()) => true,
            Err(err) => {
                warn!("Modem: module not detected: {}", err);
                false
            }
        }
    }

    // ========================================================================
    // Raw Passthrough
    // ========================================================================

    /// Send bytes to the module verbatim.
    pub fn send_raw(&mut self, data: &[u8]) -> CellularResult<()> {
        self.executor
            .channel_mut()
            .send_raw(data)
            .map_err(|e| CellularError::Device(e.to_string()))
    }

    /// Read whatever the module has sent, up to `buffer.len()` bytes.
    pub fn receive_raw(&mut self, buffer: &mut [u8]) -> CellularResult<usize> {
        self.executor
            .channel_mut()
            .receive_raw(buffer)
            .map_err(|e| CellularError::Device(e.to_string()))
    }

    /// Number of received bytes waiting to be read.
    pub fn available_raw(&mut self) -> usize {
        self.executor.channel_mut().available()
    }
}
