//! u-blox SARA AT Command Protocol
//!
//! This crate provides the vocabulary and the transport for driving a u-blox
//! SARA cellular module over its serial AT command interface.
//!
//! # Protocol Overview
//!
//! The AT interface is a half-duplex, line-based text protocol:
//!
//! - **Commands** (host → module): `AT+<name>=<params>` terminated with `\r`
//! - **Responses** (module → host): zero or more information lines followed by
//!   a final result code (`OK`, `ERROR` or `+CME ERROR: <n>`), each wrapped
//!   in `\r\n`
//! - **Unsolicited codes**: lines such as `+UUHTTPCR: 0,1,1` that arrive
//!   whenever the module finishes a background operation
//! - **Raw data**: file uploads after a `>` prompt and file read-backs after a
//!   `+URDFILE:` header carry unframed bytes of a known length
//!
//! # Example
//!
//! ```rust,ignore
//! use sara_at::{AtChannel, AtClient, Command, Expect, SystemClock};
//!
//! let mut client = AtClient::new(port, SystemClock::new());
//! client.flush()?;
//! client.send(&Command::RequestImsi)?;
//! let response = client.expect(&Expect::Imsi, Duration::from_secs(1))?;
//! ```

mod channel;
mod client;
mod codec;
mod commands;
mod error;
pub mod hal;
mod responses;

pub use channel::*;
pub use client::*;
pub use codec::*;
pub use commands::*;
pub use error::*;
pub use hal::{Clock, SerialPort, SystemClock};
pub use responses::*;
