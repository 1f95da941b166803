use std::io::ErrorKind;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FrontendError, Result};
use crate::protocol::cursor::LENGTH_FIELD_LEN;
use crate::protocol::messages::{CANCEL_REQUEST_CODE, GSSENC_REQUEST_CODE, SSL_REQUEST_CODE};

/// Read one byte, or `None` if the stream ended cleanly before it.
async fn read_u8_or_eof<R: AsyncRead + Unpin>(rd: &mut R) -> Result<Option<u8>> {
    match rd.read_u8().await {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn check_len(len: i32, max: usize) -> Result<usize> {
    if len < LENGTH_FIELD_LEN as i32 {
        return Err(FrontendError::InvalidFrameLength(len));
    }
    let len = len as usize;
    if len > max {
        return Err(FrontendError::MessageTooLarge { len, max });
    }
    Ok(len - LENGTH_FIELD_LEN)
}

/// Read a complete untagged startup-phase frame, length prefix included.
///
/// `Ok(None)` means the peer closed before sending anything.
pub async fn read_startup_frame<R: AsyncRead + Unpin>(
    rd: &mut R,
    max: usize,
) -> Result<Option<Bytes>> {
    let Some(first) = read_u8_or_eof(rd).await? else {
        return Ok(None);
    };
    let mut hdr = [first, 0, 0, 0];
    rd.read_exact(&mut hdr[1..]).await?;
    let payload_len = check_len(i32::from_be_bytes(hdr), max)?;

    let mut buf = BytesMut::with_capacity(LENGTH_FIELD_LEN + payload_len);
    buf.extend_from_slice(&hdr);
    buf.resize(LENGTH_FIELD_LEN + payload_len, 0);
    rd.read_exact(&mut buf[LENGTH_FIELD_LEN..]).await?;
    Ok(Some(buf.freeze()))
}

/// Read a complete tagged frame: tag, length, and body.
///
/// `Ok(None)` means the peer closed on a message boundary.
pub async fn read_frontend_frame<R: AsyncRead + Unpin>(
    rd: &mut R,
    max: usize,
) -> Result<Option<Bytes>> {
    let Some(tag) = read_u8_or_eof(rd).await? else {
        return Ok(None);
    };
    let mut hdr = [0u8; 4];
    rd.read_exact(&mut hdr).await?;
    let payload_len = check_len(i32::from_be_bytes(hdr), max)?;

    let mut buf = BytesMut::with_capacity(1 + LENGTH_FIELD_LEN + payload_len);
    buf.put_u8(tag);
    buf.extend_from_slice(&hdr);
    buf.resize(1 + LENGTH_FIELD_LEN + payload_len, 0);
    rd.read_exact(&mut buf[1 + LENGTH_FIELD_LEN..]).await?;
    Ok(Some(buf.freeze()))
}

async fn write_request_code<W: AsyncWrite + Unpin>(wr: &mut W, code: i32) -> Result<()> {
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&(8i32).to_be_bytes());
    buf[4..8].copy_from_slice(&code.to_be_bytes());
    wr.write_all(&buf).await?;
    wr.flush().await?;
    Ok(())
}

pub async fn write_ssl_request<W: AsyncWrite + Unpin>(wr: &mut W) -> Result<()> {
    write_request_code(wr, SSL_REQUEST_CODE).await
}

pub async fn write_gssenc_request<W: AsyncWrite + Unpin>(wr: &mut W) -> Result<()> {
    write_request_code(wr, GSSENC_REQUEST_CODE).await
}

pub async fn write_cancel_request<W: AsyncWrite + Unpin>(
    wr: &mut W,
    process_id: i32,
    secret_key: i32,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_i32(16);
    buf.put_i32(CANCEL_REQUEST_CODE);
    buf.put_i32(process_id);
    buf.put_i32(secret_key);
    wr.write_all(&buf).await?;
    wr.flush().await?;
    Ok(())
}

pub async fn write_startup_message<W: AsyncWrite + Unpin>(
    wr: &mut W,
    protocol_version: i32,
    params: &[(&str, &str)],
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_i32(0); // length placeholder
    buf.put_i32(protocol_version);

    for (k, v) in params {
        buf.extend_from_slice(k.as_bytes());
        buf.put_u8(0);
        buf.extend_from_slice(v.as_bytes());
        buf.put_u8(0);
    }
    buf.put_u8(0); // terminator

    let len = buf.len() as i32;
    buf[0..4].copy_from_slice(&len.to_be_bytes());

    wr.write_all(&buf).await?;
    wr.flush().await?;
    Ok(())
}

/// Write `tag | length | body` where body is `text` plus a NUL.
async fn write_cstring_message<W: AsyncWrite + Unpin>(
    wr: &mut W,
    tag: u8,
    text: &str,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(text.len() + 6);
    buf.put_u8(tag);
    buf.put_i32(0);
    buf.extend_from_slice(text.as_bytes());
    buf.put_u8(0);

    let len = (buf.len() - 1) as i32;
    buf[1..5].copy_from_slice(&len.to_be_bytes());

    wr.write_all(&buf).await?;
    wr.flush().await?;
    Ok(())
}

pub async fn write_query<W: AsyncWrite + Unpin>(wr: &mut W, sql: &str) -> Result<()> {
    write_cstring_message(wr, b'Q', sql).await
}

pub async fn write_password_message<W: AsyncWrite + Unpin>(
    wr: &mut W,
    password: &str,
) -> Result<()> {
    write_cstring_message(wr, b'p', password).await
}

pub async fn write_terminate<W: AsyncWrite + Unpin>(wr: &mut W) -> Result<()> {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(b'X');
    buf.put_i32(4); // length includes itself; Terminate has no payload
    wr.write_all(&buf).await?;
    wr.flush().await?;
    Ok(())
}
