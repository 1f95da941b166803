//! Decoders for the individual frontend messages.
//!
//! Startup-phase packets carry no type tag and are read with their own
//! length prefix. Tagged messages implement [`FrontendBody`] and are handed
//! an already-framed body by the dispatcher in [`super::frontend`].

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::config::DecodePolicy;
use crate::error::Result;
use crate::protocol::cursor::{read_cstring, read_int32, read_int32_delim_message};

/// Protocol 3.0, the only version PostgreSQL clients speak today.
pub const PROTOCOL_VERSION_3: i32 = 3 << 16; // 196608

/// SSLRequest magic number
pub const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103

/// GSSENCRequest magic number
pub const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104

/// CancelRequest magic number
pub const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678; // 80877102

/// Body decoder for a tagged frontend message.
pub trait FrontendBody: Sized + Default {
    /// Type byte that selects this decoder.
    const TAG: u8;

    /// Decode from a body whose tag and length have already been consumed.
    fn read_body(cur: &mut Bytes) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SslRequest {
    pub code: i32,
}

impl SslRequest {
    pub fn try_read(cur: &mut Bytes) -> Result<Self> {
        let mut body = read_int32_delim_message(cur)?.body;
        let code = read_int32(&mut body)?;
        Ok(Self { code })
    }

    /// Like [`SslRequest::try_read`], but a malformed frame yields the default.
    pub fn read(cur: &mut Bytes) -> Self {
        Self::try_read(cur).unwrap_or_else(|e| {
            tracing::warn!("malformed SSLRequest, using defaults: {e}");
            Self::default()
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelRequest {
    pub process_id: i32,
    pub secret_key: i32,
}

impl CancelRequest {
    fn read_after_code(body: &mut Bytes) -> Result<Self> {
        let process_id = read_int32(body)?;
        let secret_key = read_int32(body)?;
        Ok(Self {
            process_id,
            secret_key,
        })
    }
}

/// Normal connection startup: protocol version plus `key=value` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupMessage {
    pub protocol_version: i32,
    /// Every option the client sent. Duplicate keys keep the last value.
    pub parameters: HashMap<String, String>,
    pub user: String,
    pub database: String,
    pub options: String,
}

impl StartupMessage {
    /// Build a message from decoded parts, filling the well-known fields.
    pub fn from_parameters(protocol_version: i32, parameters: HashMap<String, String>) -> Self {
        let field = |k: &str| parameters.get(k).cloned().unwrap_or_default();
        Self {
            protocol_version,
            user: field("user"),
            database: field("database"),
            options: field("options"),
            parameters,
        }
    }

    pub fn try_read(cur: &mut Bytes) -> Result<Self> {
        let mut body = read_int32_delim_message(cur)?.body;
        let version = read_int32(&mut body)?;
        Self::read_after_version(version, &mut body)
    }

    /// Like [`StartupMessage::try_read`], but a malformed frame yields the default.
    pub fn read(cur: &mut Bytes) -> Self {
        Self::try_read(cur).unwrap_or_else(|e| {
            tracing::warn!("malformed StartupMessage, using defaults: {e}");
            Self::default()
        })
    }

    fn read_after_version(protocol_version: i32, body: &mut Bytes) -> Result<Self> {
        let mut parameters = HashMap::new();
        // An absent or empty key ends the list; so does a key with no value.
        while !body.is_empty() {
            let Some(key) = read_cstring(body)? else {
                break;
            };
            if key.is_empty() {
                break;
            }
            let Some(value) = read_cstring(body)? else {
                break;
            };
            parameters.insert(key, value);
        }
        Ok(Self::from_parameters(protocol_version, parameters))
    }

    /// Major protocol version (3 for every modern client).
    #[inline]
    pub fn major_version(&self) -> i32 {
        self.protocol_version >> 16
    }

    #[inline]
    pub fn minor_version(&self) -> i32 {
        self.protocol_version & 0xFFFF
    }

    /// Option pairs sorted by key, suitable for re-encoding.
    pub fn encode_parameters(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// The untagged first packet on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupPacket {
    /// Client wants to negotiate TLS before starting up.
    SslRequest(SslRequest),
    /// Client wants GSSAPI transport encryption.
    GssEncRequest,
    /// Client wants a running query on another connection cancelled.
    CancelRequest(CancelRequest),
    Startup(StartupMessage),
}

impl StartupPacket {
    /// Decode the packet, branching on the request code after the length.
    pub fn try_read(cur: &mut Bytes) -> Result<Self> {
        let (code, mut body) = Self::read_code(cur)?;
        Self::read_after_code(code, &mut body)
    }

    fn read_code(cur: &mut Bytes) -> Result<(i32, Bytes)> {
        let mut body = read_int32_delim_message(cur)?.body;
        let code = read_int32(&mut body)?;
        Ok((code, body))
    }

    fn read_after_code(code: i32, body: &mut Bytes) -> Result<Self> {
        match code {
            SSL_REQUEST_CODE => Ok(StartupPacket::SslRequest(SslRequest { code })),
            GSSENC_REQUEST_CODE => Ok(StartupPacket::GssEncRequest),
            CANCEL_REQUEST_CODE => Ok(StartupPacket::CancelRequest(
                CancelRequest::read_after_code(body)?,
            )),
            version => Ok(StartupPacket::Startup(StartupMessage::read_after_version(
                version, body,
            )?)),
        }
    }

    /// Default value for a packet whose code was (or was not) readable.
    fn degraded(code: Option<i32>) -> Self {
        match code {
            Some(SSL_REQUEST_CODE) => StartupPacket::SslRequest(SslRequest {
                code: SSL_REQUEST_CODE,
            }),
            Some(GSSENC_REQUEST_CODE) => StartupPacket::GssEncRequest,
            Some(CANCEL_REQUEST_CODE) => StartupPacket::CancelRequest(CancelRequest::default()),
            _ => StartupPacket::Startup(StartupMessage::default()),
        }
    }

    /// Decode under `policy`.
    ///
    /// A degraded packet keeps its variant once the request code is known;
    /// only an unreadable code falls back to an empty `Startup`.
    pub fn read_with(cur: &mut Bytes, policy: DecodePolicy) -> Result<Self> {
        let (code, decoded) = match Self::read_code(cur) {
            Ok((code, mut body)) => (Some(code), Self::read_after_code(code, &mut body)),
            Err(e) => (None, Err(e)),
        };
        match decoded {
            Ok(p) => Ok(p),
            Err(e) if policy.degrades(&e) => {
                tracing::warn!("malformed startup packet, using defaults: {e}");
                Ok(Self::degraded(code))
            }
            Err(e) => Err(e),
        }
    }

    pub fn read(cur: &mut Bytes) -> Self {
        Self::read_with(cur, DecodePolicy::Permissive)
            .unwrap_or_else(|_| StartupPacket::Startup(StartupMessage::default()))
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StartupPacket::SslRequest(_) => "SSLRequest",
            StartupPacket::GssEncRequest => "GSSENCRequest",
            StartupPacket::CancelRequest(_) => "CancelRequest",
            StartupPacket::Startup(_) => "StartupMessage",
        }
    }
}

/// `'p'` - password (or SASL payload) response.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordMessage {
    pub password: String,
}

// Keep secrets out of logs.
impl fmt::Debug for PasswordMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordMessage")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FrontendBody for PasswordMessage {
    const TAG: u8 = b'p';

    fn read_body(cur: &mut Bytes) -> Result<Self> {
        let password = read_cstring(cur)?.unwrap_or_default();
        Ok(Self { password })
    }
}

/// `'Q'` - simple query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMessage {
    pub query: String,
}

impl QueryMessage {
    /// Routing label for whatever executes the query downstream.
    pub const PROCESS_NAME: &'static str = "SIMPLE_QUERY";

    #[inline]
    pub fn process_name(&self) -> &'static str {
        Self::PROCESS_NAME
    }
}

impl FrontendBody for QueryMessage {
    const TAG: u8 = b'Q';

    fn read_body(cur: &mut Bytes) -> Result<Self> {
        let query = read_cstring(cur)?.unwrap_or_default();
        Ok(Self { query })
    }
}

/// `'X'` - client is closing the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Terminate;

impl FrontendBody for Terminate {
    const TAG: u8 = b'X';

    fn read_body(_cur: &mut Bytes) -> Result<Self> {
        Ok(Terminate)
    }
}
