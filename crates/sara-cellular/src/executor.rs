//! Command executor - the flush, send, expect step every workflow is built from

use std::time::Duration;

use sara_at::{AtChannel, AtResult, Command, Expect, Response};
use tracing::trace;

use crate::error::CellularResult;

/// Runs single command exchanges over an [`AtChannel`].
///
/// Every exchange starts by discarding unconsumed input so that a late or
/// partial response to an earlier, possibly aborted, command is never read as
/// the answer to the next one. Nothing is retried here.
pub struct CommandExecutor<A> {
    channel: A,
}

impl<A: AtChannel> CommandExecutor<A> {
    /// Create a new executor owning `channel`.
    pub fn new(channel: A) -> Self {
        CommandExecutor { channel }
    }

    /// Get the underlying channel.
    pub fn channel(&self) -> &A {
        &self.channel
    }

    /// Get the underlying channel mutably.
    pub fn channel_mut(&mut self) -> &mut A {
        &mut self.channel
    }

    /// Release the channel.
    pub fn into_inner(self) -> A {
        self.channel
    }

    /// Run one exchange and classify its outcome.
    pub fn execute(&mut self, command: &Command, expect: &Expect, timeout: Duration) -> CellularResult<Response> {
        Ok(self.exchange(command, expect, timeout)?)
    }

    /// Run one exchange that must be acknowledged with `OK`.
    pub fn execute_ok(&mut self, command: &Command, timeout: Duration) -> CellularResult<()> {
        self.execute(command, &Expect::Ok, timeout)?;
        Ok(())
    }

    /// Run one exchange, returning the channel's own error.
    ///
    /// For callers that need to tell specific module errors apart before
    /// they are folded into the closed error set.
    pub fn exchange(&mut self, command: &Command, expect: &Expect, timeout: Duration) -> AtResult<Response> {
        trace!("CommandExecutor: {} -> {:?}", command.to_command_string(), expect);
        self.channel.flush()?;
        self.channel.send(command)?;
        self.channel.expect(expect, timeout)
    }

    /// Send a command without flushing or waiting.
    pub fn send(&mut self, command: &Command) -> CellularResult<()> {
        Ok(self.channel.send(command)?)
    }

    /// Wait for a further response to the last command.
    pub fn expect(&mut self, expect: &Expect, timeout: Duration) -> CellularResult<Response> {
        Ok(self.channel.expect(expect, timeout)?)
    }

    /// Discard unconsumed input.
    pub fn flush(&mut self) -> CellularResult<()> {
        Ok(self.channel.flush()?)
    }
}
