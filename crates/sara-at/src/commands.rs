//! Commands that can be sent to the module.
//!
//! Every request the control plane issues is a variant of [`Command`], so the
//! positional parameters of each AT command are fixed by the type rather than
//! by a format string. Extended commands are prefixed with `AT+`; the few basic
//! commands (`AT`, `ATE0`) and the in-band `abort` token are sent verbatim.

use crate::codec::LineCodec;

/// Profile index used for the security, packet data and HTTP profiles.
pub const PROFILE_ID: u8 = 0;

/// Radio access technology selection (`+URAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioTechnology {
    /// GSM only.
    Gsm,
    /// GSM/UMTS dual mode, letting the module choose.
    Automatic,
    /// UMTS only.
    Umts,
}

impl RadioTechnology {
    /// Numeric value used by `+URAT`.
    pub fn value(&self) -> u8 {
        match self {
            RadioTechnology::Gsm => 0,
            RadioTechnology::Automatic => 1,
            RadioTechnology::Umts => 2,
        }
    }
}

/// Operator selection mode (`+COPS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSelection {
    /// Automatic network registration.
    Automatic,
    /// Deregister from the network.
    Deregister,
    /// Extended network search, reporting every cell heard.
    ExtendedSearch,
}

impl OperatorSelection {
    /// Numeric value used by `+COPS`.
    pub fn value(&self) -> u8 {
        match self {
            OperatorSelection::Automatic => 0,
            OperatorSelection::Deregister => 2,
            OperatorSelection::ExtendedSearch => 5,
        }
    }
}

/// Server certificate validation level of a security profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertValidation {
    /// No certificate validation.
    None,
    /// Validate against the trusted root certificate.
    RootCertificate,
}

impl CertValidation {
    pub fn value(&self) -> u8 {
        match self {
            CertValidation::None => 0,
            CertValidation::RootCertificate => 1,
        }
    }
}

/// Minimum SSL/TLS version accepted by a security profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// Any version supported by the module.
    Any,
    Tls10,
    Tls11,
    Tls12,
}

impl TlsVersion {
    pub fn value(&self) -> u8 {
        match self {
            TlsVersion::Any => 0,
            TlsVersion::Tls10 => 1,
            TlsVersion::Tls11 => 2,
            TlsVersion::Tls12 => 3,
        }
    }
}

/// HTTP operations issued through `+UHTTPC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCommand {
    Get,
    Post,
}

impl HttpCommand {
    /// Command index used in `+UHTTPC` and reported back in `+UUHTTPCR`.
    pub fn value(&self) -> u8 {
        match self {
            HttpCommand::Get => 1,
            HttpCommand::Post => 4,
        }
    }

    /// Parse a command index reported by the module.
    pub fn from_value(value: u8) -> Option<HttpCommand> {
        match value {
            1 => Some(HttpCommand::Get),
            4 => Some(HttpCommand::Post),
            _ => None,
        }
    }
}

/// Commands that can be sent to the module.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ========== Basic Commands ==========
    /// Bare attention command, used as the liveness probe.
    Attention,

    /// Disable command echo (`ATE0`).
    EchoOff,

    /// Abort the running command. Sent as raw text, not as an AT command.
    Abort,

    /// Disable message waiting indications (`+UMWI=0`).
    DisableMessageWaiting,

    /// Report errors as numeric `+CME ERROR` codes (`+CMEE=1`).
    NumericErrors,

    // ========== Identity ==========
    /// Request the subscriber identity (`+CIMI`).
    RequestImsi,

    // ========== Security Profile ==========
    /// Reset the security profile to factory values.
    ResetSecurityProfile,

    /// Set the certificate validation level.
    SetCertValidation(CertValidation),

    /// Set the minimum accepted TLS version.
    SetMinTlsVersion(TlsVersion),

    /// Select the trusted root certificate by its stored name.
    SetRootCertificate { name: String },

    /// Select the client certificate by its stored name.
    SetClientCertificate { name: String },

    /// Select the client private key by its stored name.
    SetClientKey { name: String },

    // ========== Network ==========
    /// Select the radio access technology (`+URAT`).
    SelectRadioTechnology(RadioTechnology),

    /// Select the operator registration mode (`+COPS`).
    SelectOperator(OperatorSelection),

    // ========== Packet Switched Data ==========
    /// Set the access point name of the packet data profile.
    SetApn { apn: String },

    /// Set the packet data profile username.
    SetPacketUsername { username: String },

    /// Set the packet data profile password.
    SetPacketPassword { password: String },

    /// Activate the packet data profile.
    ActivatePacketData,

    // ========== HTTP ==========
    /// Reset the HTTP profile.
    ResetHttpProfile,

    /// Set the HTTP server domain name.
    SetHttpServer { domain: String },

    /// Enable HTTPS on the HTTP profile, using the security profile.
    EnableHttpsSecurity,

    /// Set the HTTP server port.
    SetHttpPort { port: u16 },

    /// GET `path`, storing the response in `response_file`.
    HttpGet { path: String, response_file: String },

    /// POST the contents of `source_file` to `path`, storing the response in
    /// `response_file`.
    HttpPost {
        path: String,
        response_file: String,
        source_file: String,
    },

    // ========== File System ==========
    /// Read back a file from the module file system.
    ReadFile { name: String },

    /// Delete a file from the module file system.
    DeleteFile { name: String },

    /// Start writing `length` bytes into a file on the module file system.
    DownloadFile { name: String, length: usize },
}

impl Command {
    /// Encode the command as a line to send to the module.
    /// Returns the bytes to send (including the `\r` terminator).
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string())
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Attention => "AT".to_string(),
            Command::EchoOff => "ATE0".to_string(),
            Command::Abort => "abort".to_string(),
            other => format!("AT+{}", other.extended_body()),
        }
    }

    /// Body of an extended command, without the `AT+` prefix.
    fn extended_body(&self) -> String {
        let p = PROFILE_ID;
        match self {
            Command::Attention | Command::EchoOff | Command::Abort => String::new(),
            Command::DisableMessageWaiting => "UMWI=0".to_string(),
            Command::NumericErrors => "CMEE=1".to_string(),
            Command::RequestImsi => "CIMI".to_string(),

            Command::ResetSecurityProfile => format!("USECPRF={}", p),
            Command::SetCertValidation(level) => format!("USECPRF={},0,{}", p, level.value()),
            Command::SetMinTlsVersion(version) => format!("USECPRF={},1,{}", p, version.value()),
            Command::SetRootCertificate { name } => format!("USECPRF={},3,\"{}\"", p, name),
            Command::SetClientCertificate { name } => format!("USECPRF={},5,\"{}\"", p, name),
            Command::SetClientKey { name } => format!("USECPRF={},6,\"{}\"", p, name),

            Command::SelectRadioTechnology(rat) => format!("URAT={}", rat.value()),
            Command::SelectOperator(mode) => format!("COPS={}", mode.value()),

            Command::SetApn { apn } => format!("UPSD={},1,\"{}\"", p, apn),
            Command::SetPacketUsername { username } => format!("UPSD={},2,\"{}\"", p, username),
            Command::SetPacketPassword { password } => format!("UPSD={},3,\"{}\"", p, password),
            Command::ActivatePacketData => format!("UPSDA={},3", p),

            Command::ResetHttpProfile => format!("UHTTP={}", p),
            Command::SetHttpServer { domain } => format!("UHTTP={},1,\"{}\"", p, domain),
            Command::EnableHttpsSecurity => format!("UHTTP={},6,1,{}", p, p),
            Command::SetHttpPort { port } => format!("UHTTP={},5,{}", p, port),
            Command::HttpGet { path, response_file } => format!(
                "UHTTPC={},{},\"{}\",\"{}\"",
                p,
                HttpCommand::Get.value(),
                path,
                response_file
            ),
            Command::HttpPost {
                path,
                response_file,
                source_file,
            } => format!(
                "UHTTPC={},{},\"{}\",\"{}\",\"{}\",0",
                p,
                HttpCommand::Post.value(),
                path,
                response_file,
                source_file
            ),

            Command::ReadFile { name } => format!("URDFILE=\"{}\"", name),
            Command::DeleteFile { name } => format!("UDELFILE=\"{}\"", name),
            Command::DownloadFile { name, length } => format!("UDWNFILE=\"{}\",{}", name, length),
        }
    }
}
