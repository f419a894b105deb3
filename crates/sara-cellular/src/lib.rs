//! u-blox SARA Cellular Control Plane
//!
//! Drives a SARA module from power-on to HTTPS transfers over the AT command
//! channel provided by [`sara_at`].
//!
//! # Architecture
//!
//! - [`Lifecycle`]: the power and boot state machine. Every operation asks it
//!   whether the module is ready and fails with
//!   [`CellularError::BootFailure`] if it is not.
//! - [`CommandExecutor`]: the flush, send, expect step every workflow is
//!   built from.
//! - [`Modem`]: the controller. Its operations are split by concern:
//!   - power and synchronization in `modem`
//!   - SIM, security profile, network and packet data in `provisioning`
//!   - the HTTP tunnel over staged files in `http`
//!
//! # Example
//!
//! ```rust,ignore
//! use sara_cellular::{Apn, Modem, ModemConfig, NoPowerControl, NoWatchdog, SystemClock};
//!
//! let mut modem = Modem::new(channel, NoPowerControl, SystemClock::new(), NoWatchdog, ModemConfig::default());
//! modem.init()?;
//! modem.power_on()?;
//! modem.sync_comms()?;
//! let imsi = modem.check_sim()?;
//! modem.create_secure_profile()?;
//! let attachment = modem.attach(Duration::from_secs(180))?;
//! let session = modem.activate_packet_context(&attachment, &Apn::new("internet"), Duration::from_secs(150))?;
//! let file = modem.https_get(&session, Duration::from_secs(60), "example.com", 443, "/status")?;
//! let body = modem.read_staged_file_to_buffer(file, &mut buffer)?;
//! ```

mod config;
mod error;
mod executor;
pub mod hal;
mod http;
mod lifecycle;
mod modem;
mod provisioning;

pub use config::*;
pub use error::*;
pub use executor::*;
pub use hal::{Clock, NoPowerControl, NoWatchdog, PowerControl, SerialPort, SystemClock, Watchdog};
pub use http::*;
pub use lifecycle::*;
pub use modem::*;
pub use provisioning::*;
