//! Per-connection frontend reader over an async byte source.
//!
//! [`FrontendStream`] reads whole frames off the socket and decodes them the
//! same way as [`MessageReader`](crate::protocol::MessageReader), including
//! skipping the frame of an unrecognized message.
//!
//! # Example
//!
//! ```ignore
//! use pgwire_frontend::{FrontendMessage, FrontendStream, StartupPacket};
//!
//! let mut conn = FrontendStream::new(socket);
//! while let Some(packet) = conn.next_startup().await? {
//!     match packet {
//!         StartupPacket::SslRequest(_) => { /* answer 'N', keep reading */ }
//!         StartupPacket::Startup(startup) => break,
//!         _ => return Ok(()),
//!     }
//! }
//! while let Some(msg) = conn.next().await? {
//!     if let FrontendMessage::Query(q) = msg {
//!         run(&q.query).await?;
//!     }
//! }
//! ```

use tokio::io::AsyncRead;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::protocol::framing::{read_frontend_frame, read_startup_frame};
use crate::protocol::frontend::{FrontendMessage, Phase, read_message_with};
use crate::protocol::messages::StartupPacket;

pub struct FrontendStream<R> {
    rd: R,
    cfg: ReaderConfig,
    phase: Phase,
}

impl<R: AsyncRead + Unpin> FrontendStream<R> {
    pub fn new(rd: R) -> Self {
        Self::with_config(rd, ReaderConfig::default())
    }

    pub fn with_config(rd: R, cfg: ReaderConfig) -> Self {
        Self {
            rd,
            cfg,
            phase: Phase::Startup,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Give back the byte source, e.g. to upgrade it to TLS after an SSLRequest.
    pub fn into_inner(self) -> R {
        self.rd
    }

    /// Reattach to a (possibly upgraded) byte source, keeping config and phase.
    pub fn map_inner<S, F: FnOnce(R) -> S>(self, f: F) -> FrontendStream<S> {
        FrontendStream {
            rd: f(self.rd),
            cfg: self.cfg,
            phase: self.phase,
        }
    }

    /// Read the next untagged startup-phase packet.
    pub async fn next_startup(&mut self) -> Result<Option<StartupPacket>> {
        if self.phase == Phase::Closed {
            return Ok(None);
        }
        self.phase.expect(Phase::Startup, "startup packet")?;

        let Some(mut frame) = read_startup_frame(&mut self.rd, self.cfg.max_message_size).await?
        else {
            tracing::debug!("peer closed during startup");
            self.phase = Phase::Closed;
            return Ok(None);
        };
        let packet = StartupPacket::read_with(&mut frame, self.cfg.policy)?;
        self.phase = Phase::after_startup(&packet);

        match &packet {
            StartupPacket::Startup(m) => tracing::debug!(
                user = %m.user,
                database = %m.database,
                "startup: protocol {}.{}",
                m.major_version(),
                m.minor_version()
            ),
            other => tracing::debug!("startup: {}", other.name()),
        }
        Ok(Some(packet))
    }

    /// Read the next tagged message; `None` once the connection is closed.
    pub async fn next(&mut self) -> Result<Option<FrontendMessage>> {
        if self.phase == Phase::Closed {
            return Ok(None);
        }
        self.phase.expect(Phase::Ready, "tagged message")?;

        let msg = match read_frontend_frame(&mut self.rd, self.cfg.max_message_size).await? {
            Some(mut frame) => read_message_with(&mut frame, self.cfg.policy)?,
            None => None,
        };
        self.phase = Phase::after_message(msg.as_ref());

        match &msg {
            Some(FrontendMessage::Query(q)) => {
                tracing::debug!("query: {} bytes", q.query.len())
            }
            Some(m) => tracing::debug!("message '{}'", m.tag() as char),
            None => tracing::debug!("peer closed"),
        }
        Ok(msg)
    }
}
