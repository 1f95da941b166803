//! Tag dispatch and the top-level readers.
//!
//! After the startup packet every frontend message is
//! `tag(1) | length(4, counts itself) | body`. The tag selects a
//! [`FrontendBody`] decoder through [`MessageTag`]; unknown tags are handed
//! back to the caller as [`FrontendMessage::Unrecognized`].

use bytes::Bytes;

use crate::config::DecodePolicy;
use crate::error::{FrontendError, Result};
use crate::protocol::cursor::{read_byte, read_int32_delim_message};
use crate::protocol::messages::{
    FrontendBody, PasswordMessage, QueryMessage, StartupPacket, Terminate,
};

/// Type bytes this crate knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    Password = b'p',
    Query = b'Q',
    Terminate = b'X',
}

impl TryFrom<u8> for MessageTag {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            b'p' => Ok(MessageTag::Password),
            b'Q' => Ok(MessageTag::Query),
            b'X' => Ok(MessageTag::Terminate),
            _ => Err(value),
        }
    }
}

/// A decoded tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    Password(PasswordMessage),
    Query(QueryMessage),
    Terminate(Terminate),
    /// Tag not in [`MessageTag`]. [`read_message`] consumes only the tag byte;
    /// [`MessageReader`] also skips the frame behind it.
    Unrecognized(u8),
}

impl FrontendMessage {
    /// The type byte this message arrived with.
    pub fn tag(&self) -> u8 {
        match self {
            FrontendMessage::Password(_) => PasswordMessage::TAG,
            FrontendMessage::Query(_) => QueryMessage::TAG,
            FrontendMessage::Terminate(_) => Terminate::TAG,
            FrontendMessage::Unrecognized(tag) => *tag,
        }
    }

    #[inline]
    pub fn is_terminate(&self) -> bool {
        matches!(self, FrontendMessage::Terminate(_))
    }
}

/// Read one tagged message, degrading malformed bodies to defaults.
///
/// Returns `None` at end of stream.
pub fn read_message(cur: &mut Bytes) -> Option<FrontendMessage> {
    // Permissive never surfaces an error.
    read_message_with(cur, DecodePolicy::Permissive).unwrap_or(None)
}

/// Read one tagged message under `policy`.
pub fn read_message_with(cur: &mut Bytes, policy: DecodePolicy) -> Result<Option<FrontendMessage>> {
    let Some(tag) = read_byte(cur) else {
        return Ok(None);
    };
    let Ok(kind) = MessageTag::try_from(tag) else {
        tracing::debug!("unrecognized frontend message type 0x{tag:02x}");
        return Ok(Some(FrontendMessage::Unrecognized(tag)));
    };
    let msg = match kind {
        MessageTag::Password => FrontendMessage::Password(decode_framed(cur, policy)?),
        MessageTag::Query => FrontendMessage::Query(decode_framed(cur, policy)?),
        MessageTag::Terminate => FrontendMessage::Terminate(decode_framed(cur, policy)?),
    };
    Ok(Some(msg))
}

fn decode_framed<T: FrontendBody>(cur: &mut Bytes, policy: DecodePolicy) -> Result<T> {
    let decoded = read_int32_delim_message(cur).and_then(|frame| {
        let mut body = frame.body;
        T::read_body(&mut body)
    });
    match decoded {
        Ok(msg) => Ok(msg),
        Err(e) if policy.degrades(&e) => {
            tracing::warn!(
                "malformed '{}' message body, using defaults: {e}",
                T::TAG as char
            );
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Expecting an untagged startup-phase packet.
    Startup,
    /// Expecting tagged messages.
    Ready,
    /// End of stream or Terminate seen; nothing more will be read.
    Closed,
}

impl Phase {
    /// Phase after receiving `packet` in [`Phase::Startup`].
    pub fn after_startup(packet: &StartupPacket) -> Phase {
        match packet {
            // The host answers these and the client retries startup.
            StartupPacket::SslRequest(_) | StartupPacket::GssEncRequest => Phase::Startup,
            StartupPacket::CancelRequest(_) => Phase::Closed,
            StartupPacket::Startup(_) => Phase::Ready,
        }
    }

    /// Phase after reading `msg` in [`Phase::Ready`]; `None` means end of stream.
    pub fn after_message(msg: Option<&FrontendMessage>) -> Phase {
        match msg {
            None => Phase::Closed,
            Some(m) if m.is_terminate() => Phase::Closed,
            Some(_) => Phase::Ready,
        }
    }

    pub(crate) fn expect(self, want: Phase, what: &str) -> Result<()> {
        if self == want {
            Ok(())
        } else {
            Err(FrontendError::Protocol(format!(
                "cannot read {what} in {self:?} phase"
            )))
        }
    }
}

/// Stateful reader over an in-memory buffer of frontend bytes.
#[derive(Debug)]
pub struct MessageReader {
    buf: Bytes,
    policy: DecodePolicy,
    phase: Phase,
}

impl MessageReader {
    /// Reader positioned at the start of a connection.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            policy: DecodePolicy::default(),
            phase: Phase::Startup,
        }
    }

    /// Reader for a buffer that begins after startup, at the first tagged message.
    pub fn ready(buf: impl Into<Bytes>) -> Self {
        Self {
            phase: Phase::Ready,
            ..Self::new(buf)
        }
    }

    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Unread bytes left in the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Read the next untagged startup-phase packet.
    pub fn read_startup(&mut self) -> Result<Option<StartupPacket>> {
        if self.phase == Phase::Closed {
            return Ok(None);
        }
        self.phase.expect(Phase::Startup, "startup packet")?;
        if self.buf.is_empty() {
            self.phase = Phase::Closed;
            return Ok(None);
        }
        let packet = StartupPacket::read_with(&mut self.buf, self.policy)?;
        self.phase = Phase::after_startup(&packet);
        Ok(Some(packet))
    }

    /// Read the next tagged message.
    pub fn read(&mut self) -> Result<Option<FrontendMessage>> {
        if self.phase == Phase::Closed {
            return Ok(None);
        }
        self.phase.expect(Phase::Ready, "tagged message")?;
        let msg = read_message_with(&mut self.buf, self.policy)?;
        if let Some(FrontendMessage::Unrecognized(tag)) = msg {
            self.skip_frame(tag)?;
        }
        self.phase = Phase::after_message(msg.as_ref());
        Ok(msg)
    }

    /// Step over the body of a message whose tag was not recognized.
    fn skip_frame(&mut self, tag: u8) -> Result<()> {
        match read_int32_delim_message(&mut self.buf) {
            Ok(frame) => {
                tracing::debug!(
                    "skipped {} byte body of message 0x{tag:02x}",
                    frame.body.len()
                );
                Ok(())
            }
            Err(e) if self.policy.degrades(&e) => {
                tracing::warn!("malformed frame for message 0x{tag:02x}: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{PROTOCOL_VERSION_3, SSL_REQUEST_CODE};
    use bytes::BufMut;

    /// Helper to create a tagged message with given type and body
    fn make_frontend_message(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(tag);
        buf.put_i32((4 + body.len()) as i32);
        buf.extend_from_slice(body);
        buf
    }

    fn make_startup_packet(code: i32, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i32((8 + body.len()) as i32);
        buf.put_i32(code);
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn tag_table() {
        assert_eq!(MessageTag::try_from(b'p'), Ok(MessageTag::Password));
        assert_eq!(MessageTag::try_from(b'Q'), Ok(MessageTag::Query));
        assert_eq!(MessageTag::try_from(b'X'), Ok(MessageTag::Terminate));
        assert_eq!(MessageTag::try_from(b'P'), Err(b'P'));
    }

    #[test]
    fn empty_cursor_is_end_of_stream() {
        let mut b = Bytes::new();
        assert_eq!(read_message(&mut b), None);
    }

    #[test]
    fn unrecognized_tag_consumes_only_tag() {
        let mut b = Bytes::from_static(b"Zanything at all");
        let msg = read_message(&mut b).unwrap();
        assert_eq!(msg, FrontendMessage::Unrecognized(b'Z'));
        assert_eq!(msg.tag(), b'Z');
        assert_eq!(&b[..], b"anything at all");
    }

    #[test]
    fn query_end_to_end() {
        let mut b = Bytes::from(make_frontend_message(b'Q', b"SELECT 1\0"));
        let msg = read_message(&mut b).unwrap();
        assert_eq!(
            msg,
            FrontendMessage::Query(QueryMessage {
                query: "SELECT 1".into()
            })
        );
        assert_eq!(msg.tag(), b'Q');
        assert!(b.is_empty());
    }

    #[test]
    fn password_and_terminate() {
        let mut raw = make_frontend_message(b'p', b"secret\0");
        raw.extend(make_frontend_message(b'X', &[]));
        let mut b = Bytes::from(raw);

        let FrontendMessage::Password(p) = read_message(&mut b).unwrap() else {
            panic!("expected password");
        };
        assert_eq!(p.password, "secret");
        assert!(read_message(&mut b).unwrap().is_terminate());
        assert_eq!(read_message(&mut b), None);
    }

    #[test]
    fn malformed_body_degrades_to_default() {
        // Length below the minimum.
        let mut b = Bytes::from_static(&[b'Q', 0, 0, 0, 1]);
        assert_eq!(
            read_message(&mut b),
            Some(FrontendMessage::Query(QueryMessage::default()))
        );

        // Length cut short.
        let mut b = Bytes::from_static(&[b'p', 0, 0]);
        assert_eq!(
            read_message(&mut b),
            Some(FrontendMessage::Password(PasswordMessage::default()))
        );

        // Bad UTF-8.
        let mut b = Bytes::from(make_frontend_message(b'Q', &[0xFF, 0xFE, 0]));
        assert_eq!(
            read_message(&mut b),
            Some(FrontendMessage::Query(QueryMessage::default()))
        );
    }

    #[test]
    fn truncation_only_policy_propagates_other_errors() {
        let mut b = Bytes::from(make_frontend_message(b'Q', &[0xFF, 0]));
        let err = read_message_with(&mut b, DecodePolicy::TruncationOnly).unwrap_err();
        assert!(matches!(err, FrontendError::InvalidUtf8(_)));

        let mut b = Bytes::from_static(&[b'Q', 0, 0, 0, 0]);
        let err = read_message_with(&mut b, DecodePolicy::TruncationOnly).unwrap_err();
        assert_eq!(err, FrontendError::InvalidFrameLength(0));

        let mut b = Bytes::from_static(&[b'Q', 0]);
        let msg = read_message_with(&mut b, DecodePolicy::TruncationOnly).unwrap();
        assert_eq!(msg, Some(FrontendMessage::Query(QueryMessage::default())));
    }

    #[test]
    fn reader_walks_the_phases() {
        let mut raw = make_startup_packet(SSL_REQUEST_CODE, &[]);
        raw.extend(make_startup_packet(
            PROTOCOL_VERSION_3,
            b"user\0alice\0database\0test\0\0",
        ));
        raw.extend(make_frontend_message(b'p', b"pw\0"));
        raw.extend(make_frontend_message(b'Q', b"SELECT 1\0"));
        raw.extend(make_frontend_message(b'X', &[]));
        raw.extend(make_frontend_message(b'Q', b"never read\0"));

        let mut r = MessageReader::new(raw);
        assert!(matches!(
            r.read_startup().unwrap(),
            Some(StartupPacket::SslRequest(_))
        ));
        assert_eq!(r.phase(), Phase::Startup);

        let Some(StartupPacket::Startup(startup)) = r.read_startup().unwrap() else {
            panic!("expected startup");
        };
        assert_eq!(startup.user, "alice");
        assert_eq!(r.phase(), Phase::Ready);

        assert_eq!(r.read().unwrap().map(|m| m.tag()), Some(b'p'));
        assert_eq!(r.read().unwrap().map(|m| m.tag()), Some(b'Q'));
        assert!(r.read().unwrap().unwrap().is_terminate());
        assert_eq!(r.phase(), Phase::Closed);
        assert_eq!(r.read().unwrap(), None);
        assert!(r.remaining() > 0);
    }

    #[test]
    fn reader_skips_unrecognized_frames() {
        // Bind-like frame whose body holds bytes that look like tags.
        let mut raw = make_frontend_message(b'B', b"aXQ\0");
        raw.extend(make_frontend_message(b'Q', b"SELECT 1\0"));
        raw.extend(make_frontend_message(b'X', &[]));

        let mut r = MessageReader::ready(raw);
        assert_eq!(r.read().unwrap(), Some(FrontendMessage::Unrecognized(b'B')));
        assert_eq!(r.phase(), Phase::Ready);
        assert_eq!(
            r.read().unwrap(),
            Some(FrontendMessage::Query(QueryMessage {
                query: "SELECT 1".into()
            }))
        );
        assert!(r.read().unwrap().unwrap().is_terminate());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reader_unrecognized_with_bad_length() {
        let mut raw = vec![b'B', 0, 0, 0, 2];
        raw.extend(make_frontend_message(b'Q', b"SELECT 1\0"));

        let mut r = MessageReader::ready(raw.clone());
        assert_eq!(r.read().unwrap(), Some(FrontendMessage::Unrecognized(b'B')));
        assert!(matches!(r.read().unwrap(), Some(FrontendMessage::Query(q)) if q.query == "SELECT 1"));

        let mut r = MessageReader::ready(raw).with_policy(DecodePolicy::TruncationOnly);
        assert_eq!(r.read().unwrap_err(), FrontendError::InvalidFrameLength(2));

        // Unknown tag as the last byte: nothing to skip.
        let mut r = MessageReader::ready(vec![b'B']);
        assert_eq!(r.read().unwrap(), Some(FrontendMessage::Unrecognized(b'B')));
        assert_eq!(r.read().unwrap(), None);
    }

    #[test]
    fn reader_truncated_cancel_closes() {
        let mut raw = make_startup_packet(crate::protocol::messages::CANCEL_REQUEST_CODE, &[0, 0]);
        raw.extend(make_frontend_message(b'Q', b"SELECT 1\0"));

        let mut r = MessageReader::new(raw);
        assert!(matches!(
            r.read_startup().unwrap(),
            Some(StartupPacket::CancelRequest(_))
        ));
        assert_eq!(r.phase(), Phase::Closed);
        assert_eq!(r.read().unwrap(), None);
    }

    #[test]
    fn reader_rejects_out_of_phase_reads() {
        let mut r = MessageReader::new(make_frontend_message(b'Q', b"x\0"));
        assert!(matches!(r.read(), Err(FrontendError::Protocol(_))));

        let mut r = MessageReader::ready(make_frontend_message(b'Q', b"x\0"));
        assert!(matches!(r.read_startup(), Err(FrontendError::Protocol(_))));
    }

    #[test]
    fn reader_closes_at_end_of_stream() {
        let mut r = MessageReader::ready(Bytes::new());
        assert_eq!(r.read().unwrap(), None);
        assert_eq!(r.phase(), Phase::Closed);

        let mut r = MessageReader::new(Bytes::new());
        assert_eq!(r.read_startup().unwrap(), None);
        assert_eq!(r.phase(), Phase::Closed);
    }
}
