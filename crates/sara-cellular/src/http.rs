//! HTTP tunnel over staged files
//!
//! The module performs HTTPS requests itself and writes each response, status
//! line and headers included, into a file on its own storage. Request bodies
//! are uploaded into a file the same way. This module drives both directions:
//!
//! ```text
//!   https_get/https_post ──▶ +UHTTPC ──▶ OK ──▶ +UUHTTPCR: 0,<cmd>,1
//!   read_staged_file_*   ──▶ +URDFILE ──▶ "<total>,"  ──▶ HTTP header ──▶ body
//!   write_*_to_staged_file ──▶ +UDELFILE ──▶ +UDWNFILE ──▶ '>' ──▶ bytes ──▶ OK
//! ```

use std::io::{Read, Write};
use std::time::Duration;

use sara_at::{AtChannel, Command, Expect, HttpCommand, Response};
use tracing::{debug, info, warn};

use crate::error::{CellularError, CellularResult};
use crate::hal::{Clock, PowerControl, Watchdog};
use crate::modem::Modem;
use crate::provisioning::DataSession;

/// A file on the module's storage used to stage HTTP transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedFile {
    /// Upload source and GET response.
    Staging,
    /// POST response.
    Result,
}

/// Lengths recovered from the start of a staged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSession {
    /// Size of the staged file.
    pub total_length: usize,
    /// Bytes taken by the embedded HTTP header.
    pub header_length: usize,
    pub http_status: u16,
}

impl TransferSession {
    /// Bytes of body following the header.
    pub fn body_length(&self) -> usize {
        self.total_length - self.header_length
    }
}

/// Outcome of reading a staged response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedBody {
    pub http_status: u16,
    /// Body bytes delivered.
    pub size: usize,
}

impl<A, P, C, W> Modem<A, P, C, W>
where
    A: AtChannel,
    P: PowerControl,
    C: Clock,
    W: Watchdog,
{
    /// Name of `file` on the module.
    pub fn staged_file_name(&self, file: StagedFile) -> &str {
        match file {
            StagedFile::Staging => &self.config.files.staging,
            StagedFile::Result => &self.config.files.result,
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Point the HTTP profile at `domain:port` over the security profile.
    fn configure_http(&mut self, domain: &str, port: u16) -> CellularResult<()> {
        let timeout = self.config.command_timeout();
        let steps = [
            Command::ResetHttpProfile,
            Command::SetHttpServer {
                domain: domain.to_string(),
            },
            Command::EnableHttpsSecurity,
            Command::SetHttpPort { port },
        ];
        for step in &steps {
            self.executor.execute_ok(step, timeout)?;
        }
        Ok(())
    }

    /// GET `path` from `domain:port` into the staging file.
    ///
    /// Returns the file holding the response, to be read back with
    /// [`read_staged_file_to_buffer`](Self::read_staged_file_to_buffer) or
    /// [`read_staged_file_to_storage`](Self::read_staged_file_to_storage).
    pub fn https_get(
        &mut self,
        _session: &DataSession,
        timeout: Duration,
        domain: &str,
        port: u16,
        path: &str,
    ) -> CellularResult<StagedFile> {
        self.ensure_ready()?;
        self.configure_http(domain, port)?;

        let request = Command::HttpGet {
            path: path.to_string(),
            response_file: self.config.files.staging.clone(),
        };
        self.executor.execute_ok(&request, timeout)?;
        self.executor
            .expect(&Expect::HttpResult(HttpCommand::Get), timeout)?;

        info!("Modem: GET {}:{}{} staged", domain, port, path);
        Ok(StagedFile::Staging)
    }

    /// POST the staging file to `path` on `domain:port`.
    ///
    /// The request body is whatever was last written with
    /// [`write_buffer_to_staged_file`](Self::write_buffer_to_staged_file). The
    /// response lands in the result file, which is returned.
    pub fn https_post(
        &mut self,
        _session: &DataSession,
        timeout: Duration,
        domain: &str,
        port: u16,
        path: &str,
    ) -> CellularResult<StagedFile> {
        self.ensure_ready()?;
        self.configure_http(domain, port)?;

        let request = Command::HttpPost {
            path: path.to_string(),
            response_file: self.config.files.result.clone(),
            source_file: self.config.files.staging.clone(),
        };
        self.executor.execute_ok(&request, timeout)?;
        self.executor
            .expect(&Expect::HttpResult(HttpCommand::Post), timeout)?;

        info!("Modem: POST {}:{}{} staged", domain, port, path);
        Ok(StagedFile::Result)
    }

    // ========================================================================
    // Read-back
    // ========================================================================

    /// Start reading `file` back and consume its embedded HTTP header.
    ///
    /// On success the channel is positioned at the first body byte. A non-2xx
    /// status drains the body before failing.
    fn read_file_header(&mut self, file: StagedFile) -> CellularResult<TransferSession> {
        let name = self.staged_file_name(file).to_string();
        let timeout = self.config.command_timeout();

        let response = self.executor.execute(
            &Command::ReadFile { name: name.clone() },
            &Expect::FileContents { name },
            timeout,
        )?;
        let total_length = match response {
            Response::FileContents { length } => length,
            other => return Err(CellularError::UnexpectedResponse(format!("{:?}", other))),
        };

        let header = self.executor.channel_mut().expect_http_header(timeout)?;
        if header.consumed > total_length {
            return Err(CellularError::UnexpectedResponse(format!(
                "HTTP header of {} bytes exceeds staged length {}",
                header.consumed, total_length
            )));
        }

        let session = TransferSession {
            total_length,
            header_length: header.consumed,
            http_status: header.status,
        };
        debug!("Modem: staged response {:?}", session);

        if !header.is_success() {
            self.executor
                .channel_mut()
                .discard(session.body_length(), timeout)?;
            warn!("Modem: HTTP request failed with status {}", header.status);
            return Err(CellularError::Http {
                status: header.status,
            });
        }

        Ok(session)
    }

    /// Copy the body of a staged response into `buffer`.
    ///
    /// Fails with [`CellularError::BufferOverflow`] and leaves `buffer`
    /// untouched if the body does not fit. The body is drained either way.
    pub fn read_staged_file_to_buffer(&mut self, file: StagedFile, buffer: &mut [u8]) -> CellularResult<StagedBody> {
        self.ensure_ready()?;

        let session = self.read_file_header(file)?;
        let size = session.body_length();
        if size > buffer.len() {
            // Drain the body so it is not read as the answer to the next command
            self.executor
                .channel_mut()
                .discard(size, self.config.command_timeout())?;
            return Err(CellularError::BufferOverflow {
                capacity: buffer.len(),
                required: size,
            });
        }

        self.executor
            .channel_mut()
            .read_raw_to_buffer(self.config.command_timeout(), &mut buffer[..size])?;

        Ok(StagedBody {
            http_status: session.http_status,
            size,
        })
    }

    /// Stream the body of a staged response into `sink`.
    pub fn read_staged_file_to_storage(&mut self, file: StagedFile, sink: &mut dyn Write) -> CellularResult<StagedBody> {
        self.ensure_ready()?;

        let session = self.read_file_header(file)?;
        let size = session.body_length();
        self.executor
            .channel_mut()
            .read_raw_to_sink(self.config.command_timeout(), size, sink)?;

        Ok(StagedBody {
            http_status: session.http_status,
            size,
        })
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Replace the staging file with the contents of `data`.
    pub fn write_buffer_to_staged_file(&mut self, data: &[u8]) -> CellularResult<()> {
        self.ensure_ready()?;
        self.begin_upload(data.len())?;

        self.executor.channel_mut().send_raw(data)?;

        self.finish_upload(data.len())
    }

    /// Replace the staging file with `len` bytes read from `source`.
    pub fn write_storage_to_staged_file(&mut self, source: &mut dyn Read, len: usize) -> CellularResult<()> {
        self.ensure_ready()?;
        self.begin_upload(len)?;

        self.executor.channel_mut().send_raw_from(source, len)?;

        self.finish_upload(len)
    }

    /// Remove the old staging file and wait for the module to accept data.
    fn begin_upload(&mut self, len: usize) -> CellularResult<()> {
        let name = self.config.files.staging.clone();

        match self.executor.exchange(
            &Command::DeleteFile { name: name.clone() },
            &Expect::Ok,
            self.config.command_timeout(),
        ) {
            Ok(_) => {}
            Err(err) if err.is_file_not_found() => {
                debug!("Modem: no previous '{}' to delete", name);
            }
            Err(err) => return Err(err.into()),
        }

        self.executor.execute(
            &Command::DownloadFile { name, length: len },
            &Expect::DataPrompt,
            self.config.file_timeout(),
        )?;
        Ok(())
    }

    fn finish_upload(&mut self, len: usize) -> CellularResult<()> {
        self.executor
            .expect(&Expect::Ok, self.config.file_timeout())?;
        debug!("Modem: staged {} bytes", len);
        Ok(())
    }
}
