//! Wire protocol for the socket front end
//!
//! Frames are a 4-byte big-endian length prefix followed by a JSON
//! payload. Requests are tagged by `type`; replies carry an HTTP-style
//! status code next to a JSON body so clients share one envelope for
//! success and failure.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on one frame. Answers are captured stdout, so this is
/// generous already.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Bound on one reply write. A peer that stops draining the socket for
/// this long is treated as gone.
pub const WRITE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Liveness probe
    Ping,
    /// Create a session, replacing any existing one with the same id
    CreateSession { session_id: String },
    /// Delete a session
    RemoveSession { session_id: String },
    /// Ask a question within a session. Only `question`, `database` and
    /// `wordiness` shape the prompt; the remaining fields are advisory and
    /// accepted for compatibility.
    AskQuestion {
        session_id: String,
        #[serde(default)]
        question: Option<String>,
        #[serde(default)]
        database: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        packages: Option<Vec<String>>,
        #[serde(default)]
        wordiness: Option<String>,
    },
}

/// Status-coded reply envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: serde_json::Value,
}

impl Response {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// Serialize a message to its JSON frame payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Deserialize a frame payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed frame. A clean EOF before the prefix reads as
/// [`ProtocolError::ConnectionClosed`].
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(ProtocolError::ConnectionClosed);
        }
        return Err(ProtocolError::Io(e));
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one length-prefixed frame.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(bytes.len()));
    }
    writer.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode and write a reply frame with a write timeout.
///
/// The size check runs before any byte hits the wire, so a
/// [`ProtocolError::MessageTooLarge`] from here leaves the stream clean
/// for a replacement reply.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}
