//! Provisioning workflows: identity, security profile, network and packet data.
//!
//! Each workflow is an ordered list of exchanges. The first failure stops the
//! workflow and is returned as-is; steps already applied are not rolled back.

use std::fmt;
use std::time::Duration;

use sara_at::{
    AtChannel, CertValidation, Command, Expect, OperatorSelection, RadioTechnology, Response,
    TlsVersion,
};
use tracing::{debug, info, warn};

use crate::error::{CellularError, CellularResult};
use crate::hal::{Clock, PowerControl, Watchdog};
use crate::modem::Modem;

/// Maximum number of digits in a subscriber identity.
pub const IMSI_MAX_DIGITS: usize = 15;

/// A validated subscriber identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imsi(String);

impl Imsi {
    /// Get the identity digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `text` is a plausible identity: only decimal digits, at most 15.
fn is_numeric_identity(text: &str) -> bool {
    !text.is_empty() && text.len() <= IMSI_MAX_DIGITS && text.bytes().all(|b| b.is_ascii_digit())
}

/// Username and password of an access point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnCredentials {
    pub username: String,
    pub password: String,
}

/// Access point of a packet data context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apn {
    pub name: String,
    pub credentials: Option<ApnCredentials>,
}

impl Apn {
    /// Create an access point that needs no credentials.
    pub fn new(name: impl Into<String>) -> Self {
        Apn {
            name: name.into(),
            credentials: None,
        }
    }

    /// Create an access point with a username and password.
    pub fn with_credentials(name: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Apn {
            name: name.into(),
            credentials: Some(ApnCredentials {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Credentials to send, if any. An empty username means none.
    pub fn credentials(&self) -> Option<&ApnCredentials> {
        self.credentials.as_ref().filter(|c| !c.username.is_empty())
    }
}

/// First cell heard during a network scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellInfo {
    /// Mobile country code.
    pub mcc: u32,
}

/// Proof that automatic network registration was requested.
#[derive(Debug)]
pub struct Attachment {
    _private: (),
}

/// Proof that a packet data context was activated.
///
/// Required by the HTTP operations. It records that the workflows ran in
/// order; it does not prove the module is still on, which every operation
/// checks again.
#[derive(Debug)]
pub struct DataSession {
    _private: (),
}

impl<A, P, C, W> Modem<A, P, C, W>
where
    A: AtChannel,
    P: PowerControl,
    C: Clock,
    W: Watchdog,
{
    /// Read the subscriber identity.
    ///
    /// A SIM that has only just started can answer with zeros or garbage, so
    /// the read is retried on timeout or invalid content until the attempt
    /// budget runs out, which is reported as a timeout.
    pub fn check_sim(&mut self) -> CellularResult<Imsi> {
        self.ensure_ready()?;

        let timeout = self.config.command_timeout();
        let retry_delay = self.config.imsi_retry_delay();

        for attempt in 1..=self.config.imsi_attempts {
            let identity = match self.executor.execute(&Command::RequestImsi, &Expect::Imsi, timeout) {
                Ok(Response::Imsi(identity)) => identity,
                Ok(other) => {
                    return Err(CellularError::UnexpectedResponse(format!("{:?}", other)));
                }
                Err(CellularError::Timeout) => {
                    debug!("Modem: IMSI attempt {} timed out", attempt);
                    self.clock.delay(retry_delay);
                    continue;
                }
                Err(err) => return Err(err),
            };

            if !is_numeric_identity(&identity) {
                debug!("Modem: IMSI attempt {} returned '{}'", attempt, identity);
                self.clock.delay(retry_delay);
                continue;
            }

            self.executor.expect(&Expect::Ok, timeout)?;

            if identity.bytes().any(|b| b != b'0') {
                info!("Modem: SIM ready after {} attempt(s)", attempt);
                return Ok(Imsi(identity));
            }

            debug!("Modem: IMSI attempt {} returned all zeros", attempt);
            self.clock.delay(retry_delay);
        }

        warn!(
            "Modem: no valid IMSI after {} attempts",
            self.config.imsi_attempts
        );
        Err(CellularError::Timeout)
    }

    /// Configure security profile 0 with the stored TLS credentials.
    ///
    /// Certificate validation is disabled and TLS 1.2 is the minimum version.
    pub fn create_secure_profile(&mut self) -> CellularResult<()> {
        self.ensure_ready()?;

        let timeout = self.config.command_timeout();
        let credentials = self.config.credentials.clone();
        let steps = [
            Command::ResetSecurityProfile,
            Command::SetCertValidation(CertValidation::None),
            Command::SetMinTlsVersion(TlsVersion::Tls12),
            Command::SetRootCertificate {
                name: credentials.root_ca,
            },
            Command::SetClientCertificate {
                name: credentials.device_cert,
            },
            Command::SetClientKey {
                name: credentials.device_key,
            },
        ];

        for step in &steps {
            self.executor.execute_ok(step, timeout)?;
        }

        debug!("Modem: security profile configured");
        Ok(())
    }

    /// Select the radio access technology.
    ///
    /// The module may start a network search, so `timeout` can be long.
    pub fn set_radio_technology(&mut self, timeout: Duration, mode: RadioTechnology) -> CellularResult<()> {
        self.ensure_ready()?;
        self.executor
            .execute_ok(&Command::SelectRadioTechnology(mode), timeout)
    }

    /// Check that at least one cell can be heard.
    ///
    /// Starts an extended network search and stops it as soon as the first
    /// cell is reported. The search is aborted whatever the outcome.
    pub fn scan(&mut self, timeout: Duration) -> CellularResult<CellInfo> {
        self.ensure_ready()?;

        self.clock.delay(self.config.scan_settle_delay());

        let search = Command::SelectOperator(OperatorSelection::ExtendedSearch);
        let cell = match self.executor.execute(&search, &Expect::CellFound, timeout) {
            Ok(Response::Cell { mcc }) => CellInfo { mcc },
            Ok(other) => return Err(CellularError::UnexpectedResponse(format!("{:?}", other))),
            Err(CellularError::Timeout) => {
                if let Err(err) = self.executor.send(&Command::Abort) {
                    warn!("Modem: failed to abort network search: {}", err);
                }
                return Err(CellularError::Timeout);
            }
            Err(err) => return Err(err),
        };

        // Let the rest of the search output arrive so the flush drops it
        self.clock.delay(self.config.scan_drain_delay());

        self.executor
            .execute(&Command::Abort, &Expect::Aborted, self.config.command_timeout())?;

        info!("Modem: found cell with MCC {}", cell.mcc);
        Ok(cell)
    }

    /// Enable automatic network registration.
    pub fn attach(&mut self, timeout: Duration) -> CellularResult<Attachment> {
        self.ensure_ready()?;
        self.executor
            .execute_ok(&Command::SelectOperator(OperatorSelection::Automatic), timeout)?;
        info!("Modem: attached");
        Ok(Attachment { _private: () })
    }

    /// Deregister from the network.
    pub fn detach(&mut self, timeout: Duration) -> CellularResult<()> {
        self.ensure_ready()?;
        self.executor
            .execute_ok(&Command::SelectOperator(OperatorSelection::Deregister), timeout)?;
        info!("Modem: detached");
        Ok(())
    }

    /// Configure and activate the packet data context.
    pub fn activate_packet_context(
        &mut self,
        _attachment: &Attachment,
        apn: &Apn,
        timeout: Duration,
    ) -> CellularResult<DataSession> {
        self.ensure_ready()?;

        let command_timeout = self.config.command_timeout();
        self.executor.execute_ok(
            &Command::SetApn {
                apn: apn.name.clone(),
            },
            command_timeout,
        )?;

        if let Some(credentials) = apn.credentials() {
            self.executor.execute_ok(
                &Command::SetPacketUsername {
                    username: credentials.username.clone(),
                },
                command_timeout,
            )?;
            self.executor.execute_ok(
                &Command::SetPacketPassword {
                    password: credentials.password.clone(),
                },
                command_timeout,
            )?;
        }

        self.executor
            .execute_ok(&Command::ActivatePacketData, timeout)?;

        info!("Modem: packet data context active on '{}'", apn.name);
        Ok(DataSession { _private: () })
    }
}
