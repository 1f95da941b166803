//! Buffer-reading primitives shared by every decoder.
//!
//! A cursor is a [`Bytes`] value consumed from the front. Sub-cursors are
//! carved out with `split_to`, so they share the parent allocation.

use bytes::{Buf, Bytes};

use crate::error::{FrontendError, Result};

/// Size of the length prefix, which counts itself.
pub const LENGTH_FIELD_LEN: usize = 4;

/// One length-delimited message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Declared length, including the 4 length bytes.
    pub len: i32,
    /// Body bytes, bounded by what actually remained in the source.
    pub body: Bytes,
}

impl Frame {
    /// True when the source ran out before the declared length was reached.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        let declared = usize::try_from(self.len)
            .unwrap_or(0)
            .saturating_sub(LENGTH_FIELD_LEN);
        self.body.len() < declared
    }
}

/// Read a big-endian `i32`. Nothing is consumed on failure.
pub fn read_int32(cur: &mut Bytes) -> Result<i32> {
    if cur.remaining() < 4 {
        return Err(FrontendError::TruncatedStream {
            needed: 4,
            remaining: cur.remaining(),
        });
    }
    Ok(cur.get_i32())
}

/// Read one byte; `None` at end of stream.
#[inline]
pub fn read_byte(cur: &mut Bytes) -> Option<u8> {
    if cur.has_remaining() {
        Some(cur.get_u8())
    } else {
        None
    }
}

/// Read a NUL-terminated string and consume the terminator.
///
/// Returns `Ok(None)` without consuming anything when no NUL is present, which
/// callers treat as an absent field.
pub fn read_cstring(cur: &mut Bytes) -> Result<Option<String>> {
    let Some(nul) = cur.iter().position(|&b| b == 0) else {
        return Ok(None);
    };
    let raw = cur.split_to(nul);
    cur.advance(1);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|e| FrontendError::InvalidUtf8(e.to_string()))
}

/// Read a length prefix and split off the body it announces.
///
/// If the source holds fewer bytes than declared, the body is bounded by what
/// remains; check [`Frame::is_truncated`] to tell the two apart.
pub fn read_int32_delim_message(cur: &mut Bytes) -> Result<Frame> {
    let len = read_int32(cur)?;
    if len < LENGTH_FIELD_LEN as i32 {
        return Err(FrontendError::InvalidFrameLength(len));
    }
    let want = len as usize - LENGTH_FIELD_LEN;
    let body = cur.split_to(want.min(cur.remaining()));
    Ok(Frame { len, body })
}
