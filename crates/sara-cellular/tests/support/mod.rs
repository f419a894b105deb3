//! Test doubles for driving a [`Modem`] without hardware.
//!
//! Every double is a cheap handle over shared state, so a test keeps a clone
//! to script and inspect it after the original has moved into the modem.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use sara_at::{AtChannel, AtError, AtResult, Command, Expect, HttpHeader, Response};
use sara_cellular::{Clock, Modem, ModemConfig, PowerControl, SerialPort, Watchdog};

// ============================================================================
// Clock, Watchdog, Power
// ============================================================================

/// Clock that only moves when delayed or advanced.
#[derive(Clone, Default)]
pub struct FakeClock {
    now: Rc<Cell<Duration>>,
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn delay(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
        self.advance(duration);
    }
}

#[derive(Clone, Default)]
pub struct CountingWatchdog {
    refreshes: Rc<Cell<usize>>,
}

impl CountingWatchdog {
    pub fn refreshes(&self) -> usize {
        self.refreshes.get()
    }
}

impl Watchdog for CountingWatchdog {
    fn refresh(&mut self) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}

/// Power line that records every level it is driven to.
#[derive(Clone, Default)]
pub struct RecordingPower {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPower {
    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl PowerControl for RecordingPower {
    fn set_powered(&mut self, on: bool) {
        self.levels.borrow_mut().push(on);
    }
}

// ============================================================================
// Mock Channel
// ============================================================================

#[derive(Default)]
struct MockState {
    commands: Vec<Command>,
    flushes: usize,
    raw_sent: Vec<u8>,
    replies: VecDeque<(Expect, AtResult<Response>)>,
    headers: VecDeque<AtResult<HttpHeader>>,
    send_failures: VecDeque<AtError>,
    body: VecDeque<u8>,
    incoming: VecDeque<u8>,
    discarded: Vec<usize>,
    raw_reads: Vec<usize>,
    baud: Option<u32>,
    clock: Option<FakeClock>,
}

/// Scripted [`AtChannel`].
///
/// Each `expect` pops the next scripted reply, which must be for the same
/// pattern. With nothing scripted it times out. Timeouts advance the attached
/// clock by the requested timeout.
#[derive(Clone, Default)]
pub struct MockChannel {
    state: Rc<RefCell<MockState>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` whenever an exchange times out.
    pub fn with_clock(self, clock: &FakeClock) -> Self {
        self.state.borrow_mut().clock = Some(clock.clone());
        self
    }

    /// Queue the outcome of the next `expect` call.
    pub fn reply(&self, pattern: Expect, result: AtResult<Response>) -> &Self {
        self.state.borrow_mut().replies.push_back((pattern, result));
        self
    }

    pub fn reply_ok(&self) -> &Self {
        self.reply(Expect::Ok, Ok(Response::Ok))
    }

    /// Queue the outcome of the next `expect_http_header` call.
    pub fn header(&self, result: AtResult<HttpHeader>) -> &Self {
        self.state.borrow_mut().headers.push_back(result);
        self
    }

    /// Make the next `send` fail with `err`.
    pub fn fail_next_send(&self, err: AtError) -> &Self {
        self.state.borrow_mut().send_failures.push_back(err);
        self
    }

    /// Raw bytes handed out by the read-back calls.
    pub fn body(&self, data: &[u8]) -> &Self {
        self.state.borrow_mut().body.extend(data);
        self
    }

    /// Raw bytes handed out by `receive_raw`.
    pub fn incoming(&self, data: &[u8]) -> &Self {
        self.state.borrow_mut().incoming.extend(data);
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.clone()
    }

    pub fn count(&self, command: &Command) -> usize {
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|c| *c == command)
            .count()
    }

    pub fn flushes(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn raw_sent(&self) -> Vec<u8> {
        self.state.borrow().raw_sent.clone()
    }

    pub fn discarded(&self) -> Vec<usize> {
        self.state.borrow().discarded.clone()
    }

    pub fn raw_reads(&self) -> Vec<usize> {
        self.state.borrow().raw_reads.clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.state.borrow().replies.len()
    }

    pub fn baud(&self) -> Option<u32> {
        self.state.borrow().baud
    }

    /// Forget everything recorded so far, keeping the script.
    pub fn clear_history(&self) {
        let mut state = self.state.borrow_mut();
        state.commands.clear();
        state.flushes = 0;
        state.raw_sent.clear();
        state.discarded.clear();
        state.raw_reads.clear();
    }

    fn time_out(&self, timeout: Duration) -> AtError {
        if let Some(clock) = &self.state.borrow().clock {
            clock.advance(timeout);
        }
        AtError::Timeout
    }

    fn take_body(&self, len: usize) -> AtResult<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.raw_reads.push(len);
        if state.body.len() < len {
            return Err(AtError::Timeout);
        }
        Ok(state.body.drain(..len).collect())
    }
}

impl AtChannel for MockChannel {
    fn flush(&mut self) -> AtResult<()> {
        self.state.borrow_mut().flushes += 1;
        Ok(())
    }

    fn send(&mut self, command: &Command) -> AtResult<()> {
        let mut state = self.state.borrow_mut();
        state.commands.push(command.clone());
        match state.send_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn expect(&mut self, pattern: &Expect, timeout: Duration) -> AtResult<Response> {
        let next = self.state.borrow_mut().replies.pop_front();
        match next {
            Some((expected, result)) => {
                assert_eq!(&expected, pattern, "expect called with an unscripted pattern");
                match result {
                    Err(AtError::Timeout) => Err(self.time_out(timeout)),
                    other => other,
                }
            }
            None => Err(self.time_out(timeout)),
        }
    }

    fn expect_http_header(&mut self, timeout: Duration) -> AtResult<HttpHeader> {
        let next = self.state.borrow_mut().headers.pop_front();
        match next {
            Some(result) => result,
            None => Err(self.time_out(timeout)),
        }
    }

    fn discard(&mut self, len: usize, _timeout: Duration) -> AtResult<()> {
        self.state.borrow_mut().discarded.push(len);
        Ok(())
    }

    fn read_raw_to_buffer(&mut self, _timeout: Duration, buffer: &mut [u8]) -> AtResult<()> {
        let data = self.take_body(buffer.len())?;
        buffer.copy_from_slice(&data);
        Ok(())
    }

    fn read_raw_to_sink(&mut self, _timeout: Duration, len: usize, sink: &mut dyn Write) -> AtResult<()> {
        let data = self.take_body(len)?;
        sink.write_all(&data)?;
        Ok(())
    }

    fn send_raw(&mut self, data: &[u8]) -> AtResult<()> {
        self.state.borrow_mut().raw_sent.extend_from_slice(data);
        Ok(())
    }

    fn send_raw_from(&mut self, source: &mut dyn Read, len: usize) -> AtResult<()> {
        let mut data = vec![0u8; len];
        source.read_exact(&mut data)?;
        self.state.borrow_mut().raw_sent.extend_from_slice(&data);
        Ok(())
    }

    fn receive_raw(&mut self, buffer: &mut [u8]) -> AtResult<usize> {
        let mut state = self.state.borrow_mut();
        let n = buffer.len().min(state.incoming.len());
        for (slot, byte) in buffer.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&mut self) -> usize {
        self.state.borrow().incoming.len()
    }

    fn set_baud_rate(&mut self, baud: u32) -> AtResult<()> {
        self.state.borrow_mut().baud = Some(baud);
        Ok(())
    }
}

// ============================================================================
// Serial Port
// ============================================================================

/// Serial port whose replies can arrive some time after the command.
///
/// Each `\r`-terminated write releases the next reply: its first part at
/// once, its second part once the clock has moved on by the given delay.
/// Reads hand out at most 8 bytes at a time.
pub struct GatedPort {
    clock: FakeClock,
    rx: VecDeque<u8>,
    replies: VecDeque<(Vec<u8>, Duration, Vec<u8>)>,
    pending: Vec<(Duration, Vec<u8>)>,
}

impl GatedPort {
    pub fn new(clock: &FakeClock) -> Self {
        GatedPort {
            clock: clock.clone(),
            rx: VecDeque::new(),
            replies: VecDeque::new(),
            pending: Vec::new(),
        }
    }

    pub fn reply(self, now: &[u8]) -> Self {
        self.reply_split(now, Duration::ZERO, b"")
    }

    pub fn reply_after(self, delay: Duration, later: &[u8]) -> Self {
        self.reply_split(b"", delay, later)
    }

    pub fn reply_split(mut self, now: &[u8], delay: Duration, later: &[u8]) -> Self {
        self.replies
            .push_back((now.to_vec(), delay, later.to_vec()));
        self
    }

    fn release_due(&mut self) {
        let now = self.clock.now();
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|(at, _)| *at <= now);
        self.pending = waiting;
        for (_, data) in due {
            self.rx.extend(data);
        }
    }
}

impl SerialPort for GatedPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if data.last() == Some(&b'\r') {
            if let Some((now, delay, later)) = self.replies.pop_front() {
                self.rx.extend(now);
                if !later.is_empty() {
                    self.pending.push((self.clock.now() + delay, later));
                }
            }
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.release_due();
        let n = buf.len().min(8).min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&mut self) -> usize {
        self.release_due();
        self.rx.len()
    }

    fn set_baud_rate(&mut self, _baud: u32) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that fails every write.
pub struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "storage full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub type TestModem = Modem<MockChannel, RecordingPower, FakeClock, CountingWatchdog>;

/// Handles to the doubles owned by a [`TestModem`].
#[derive(Clone, Default)]
pub struct Rig {
    pub channel: MockChannel,
    pub power: RecordingPower,
    pub clock: FakeClock,
    pub watchdog: CountingWatchdog,
}

impl Rig {
    pub fn new() -> Self {
        let clock = FakeClock::default();
        Rig {
            channel: MockChannel::new().with_clock(&clock),
            clock,
            ..Default::default()
        }
    }

    /// Build a modem that is still off.
    pub fn modem(&self) -> TestModem {
        self.modem_with(ModemConfig::default())
    }

    pub fn modem_with(&self, config: ModemConfig) -> TestModem {
        Modem::new(
            self.channel.clone(),
            self.power.clone(),
            self.clock.clone(),
            self.watchdog.clone(),
            config,
        )
    }

    /// Build a modem that has booted and synchronized, with history cleared.
    pub fn ready_modem(&self) -> TestModem {
        let mut modem = self.modem();
        modem.power_on().expect("power on");
        // Liveness probe, then the three synchronization steps
        self.channel.reply_ok().reply_ok().reply_ok().reply_ok();
        modem.sync_comms().expect("sync comms");
        self.channel.clear_history();
        modem
    }
}
