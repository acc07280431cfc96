//! Frame codec for the LSP base protocol: `Content-Length` headers around
//! UTF-8 JSON bodies.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::lsp::error::LspError;
use crate::lsp::types::SendMessage;

/// Encode a message into its wire frame: canonical JSON body prefixed with
/// `Content-Length: N\r\n\r\n`, no trailing data.
pub fn encode_frame(message: &SendMessage) -> Result<Vec<u8>, LspError> {
    let body = match message {
        SendMessage::Request(request) => serde_json::to_vec(request),
        SendMessage::Notification(notification) => serde_json::to_vec(notification),
    }
    .map_err(LspError::Encoding)?;

    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Frame a message and write it fully, flushing so pipe buffering never
/// delays delivery.
pub async fn write_frame<W>(writer: &mut W, message: &SendMessage) -> Result<(), LspError>
where
    W: AsyncWrite + Unpin + Send,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from the stream and return its JSON body.
///
/// Header blocks without a `Content-Length` (stray blank-line noise) are
/// skipped; bytes past the declared length are left for the next frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, LspError>
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let header = read_header_block(reader).await?;
        let content_length = match content_length_of(&header)? {
            Some(length) => length,
            None => continue,
        };

        let body = read_body(reader, content_length).await?;
        return String::from_utf8(body).map_err(|e| LspError::MalformedBody(e.to_string()));
    }
}

/// Accumulate header bytes until the blank-line terminator. EOF here means
/// the peer ended its stream, not that a frame was malformed.
async fn read_header_block<R>(reader: &mut R) -> Result<String, LspError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut header_buffer = Vec::new();

    loop {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte).await? == 0 {
            return Err(LspError::StreamClosed);
        }
        header_buffer.push(byte[0]);

        if header_buffer.ends_with(b"\r\n\r\n") {
            break;
        }
    }

    String::from_utf8(header_buffer)
        .map_err(|_| LspError::MalformedHeader("header is not valid UTF-8".to_string()))
}

/// Extract `Content-Length` from a header block. Case-insensitive; any other
/// header (Content-Type etc.) is read and ignored.
fn content_length_of(header: &str) -> Result<Option<usize>, LspError> {
    for line in header.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            let value = line.split(':').nth(1).unwrap_or("").trim();
            return value.parse::<usize>().map(Some).map_err(|_| {
                LspError::MalformedHeader(format!("bad Content-Length value `{}`", value))
            });
        }
    }
    Ok(None)
}

/// Read exactly `expected` body bytes. A stream that ends short of that is a
/// truncated frame, not a silent partial parse.
async fn read_body<R>(reader: &mut R, expected: usize) -> Result<Vec<u8>, LspError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut body = vec![0u8; expected];
    let mut filled = 0;

    while filled < expected {
        match reader.read(&mut body[filled..]).await? {
            0 => {
                return Err(LspError::TruncatedFrame {
                    expected,
                    read: filled,
                })
            }
            n => filled += n,
        }
    }

    Ok(body)
}
