//! Framing for response files.
//!
//! A file starts with a preamble (magic bytes and a format version) and
//! continues with frames. Each frame is
//!
//! ```text
//! [format: 1 byte][payload length: u32 LE][JSON payload][crc32 of payload: u32 LE]
//! ```

use std::io::{self, ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Format version written into the preamble and every frame.
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes identifying response files.
pub const MAGIC: [u8; 4] = *b"CRSP";

/// Largest accepted frame payload (256 MB). Dense six-axis responses get big.
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

fn corrupt(message: impl Into<String>) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, message.into())
}

fn read_bytes<const N: usize>(reader: &mut impl Read) -> io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn check_version(found: u8, what: &str) -> io::Result<()> {
    if found == FORMAT_VERSION {
        Ok(())
    } else {
        Err(corrupt(format!(
            "unsupported {what} version {found}, this build reads version {FORMAT_VERSION}"
        )))
    }
}

/// Write the file preamble.
pub fn write_preamble(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])
}

/// Read and check the file preamble.
///
/// # Errors
///
/// Foreign magic bytes or an unsupported version give
/// [`ErrorKind::InvalidData`].
pub fn read_preamble(reader: &mut impl Read) -> io::Result<()> {
    let magic: [u8; 4] = read_bytes(reader)?;
    if magic != MAGIC {
        return Err(corrupt(format!("not a response file: magic bytes {magic:02x?}")));
    }
    let [version] = read_bytes::<1>(reader)?;
    check_version(version, "file")
}

/// Serialize `value` as one frame into `writer`.
///
/// # Errors
///
/// Serialization failures and payloads above [`MAX_FRAME_SIZE`] give
/// [`ErrorKind::InvalidData`]; write errors are passed through.
pub fn write_frame<T: Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(value).map_err(|e| corrupt(format!("cannot serialize frame: {e}")))?;
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|&n| n as usize <= MAX_FRAME_SIZE)
        .ok_or_else(|| corrupt(format!("frame of {} bytes is above the {MAX_FRAME_SIZE} byte limit", payload.len())))?;

    writer.write_all(&[FORMAT_VERSION])?;
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Read one frame from `reader` and deserialize its payload.
///
/// # Errors
///
/// A short read gives [`ErrorKind::UnexpectedEof`]. An unsupported version,
/// an oversized length, a checksum mismatch or a payload of the wrong shape
/// give [`ErrorKind::InvalidData`].
pub fn read_frame<T: DeserializeOwned>(reader: &mut impl Read) -> io::Result<T> {
    let [version] = read_bytes::<1>(reader)?;
    check_version(version, "frame")?;

    let length = u32::from_le_bytes(read_bytes(reader)?) as usize;
    if length > MAX_FRAME_SIZE {
        return Err(corrupt(format!("frame of {length} bytes is above the {MAX_FRAME_SIZE} byte limit")));
    }
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;

    let stored = u32::from_le_bytes(read_bytes(reader)?);
    let actual = crc32fast::hash(&payload);
    if stored != actual {
        return Err(corrupt(format!("CRC mismatch in frame: stored {stored:08x}, payload {actual:08x}")));
    }
    serde_json::from_slice(&payload).map_err(|e| corrupt(format!("frame payload does not parse: {e}")))
}
