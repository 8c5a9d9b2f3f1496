//! Length-prefixed framing for the console bridge
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ JSON payload (variable)  │
//! │ Big-endian u32   │                          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! - **Maximum payload**: 64 KiB
//! - **Oversized length**: connection closed
//! - **Bad JSON**: frame logged and skipped, connection stays open
//! - **Read timeout mid-frame**: reading resumes, bytes already read are kept

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Append one frame (prefix + payload) to `buffer`
pub fn encode_frame(payload: &[u8], buffer: &mut Vec<u8>) -> Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::Other(format!(
            "Frame too large: {} bytes",
            payload.len()
        )));
    }
    buffer.reserve(4 + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Write one frame to `writer`
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let mut buffer = Vec::with_capacity(4 + payload.len());
    encode_frame(payload, &mut buffer)?;
    writer.write_all(&buffer)?;
    Ok(())
}

/// Read one frame into `buffer`
///
/// Returns `Ok(None)` when the read timed out before any byte of the next
/// frame arrived, `Ok(Some(len))` with the payload in `buffer[..len]`
/// otherwise. A timeout inside a frame does not lose data: reading resumes
/// until the frame is complete or the stream ends.
pub fn read_frame<R: Read>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<Option<usize>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf, true)? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::Other(format!("Frame too large: {} bytes", len)));
    }

    buffer.clear();
    buffer.resize(len, 0);
    read_full(reader, buffer, false)?;
    Ok(Some(len))
}

/// Fill `buf`, retrying on read timeouts
///
/// Returns `false` only when `may_idle` is set and the first read timed out.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8], may_idle: bool) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(Error::Io(io::ErrorKind::UnexpectedEof.into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if may_idle && filled == 0 {
                    return Ok(false);
                }
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}
