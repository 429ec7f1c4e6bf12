//! Persistence of response matrices.
//!
//! Each matrix lives in its own file:
//!
//! ```text
//! [magic "CRSP"][version][frame(MatrixHeader)][frame(ResponseMatrix)]
//! ```
//!
//! Files are written to a uuid-suffixed temporary next to the target, synced
//! and renamed into place, so a reader never sees a partial checkpoint.

pub mod codec;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::response::ResponseMatrix;

/// Summary stored in front of every matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixHeader {
    /// Matrix name.
    pub name: String,
    /// Hex encoded layout digest (see [`ResponseMatrix::layout_digest`]).
    pub layout: String,
    /// When the file was written.
    pub created_at: DateTime<Utc>,
    /// Version of the crate that wrote the file.
    pub version: String,
    /// Accepted adds at write time.
    pub entries: u64,
}

impl MatrixHeader {
    fn describe(matrix: &ResponseMatrix) -> Self {
        Self {
            name: matrix.name().to_string(),
            layout: matrix.layout_digest().to_hex().to_string(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            entries: matrix.entries(),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "response".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()))
}

/// Atomically write `matrix` to `path`.
///
/// # Errors
///
/// Returns [`StorageError::Io`] if the temporary file cannot be written or
/// renamed. The temporary file is removed on failure.
pub fn write_matrix(path: &Path, matrix: &ResponseMatrix) -> Result<(), StorageError> {
    let tmp = temp_path(path);
    let result = write_to(&tmp, matrix).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    } else {
        log::debug!("wrote {} ({} entries) to {}", matrix.name(), matrix.entries(), path.display());
    }
    result
}

fn write_to(tmp: &Path, matrix: &ResponseMatrix) -> Result<(), StorageError> {
    let io = |e| StorageError::io(tmp, e);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)
        .map_err(io)?;
    let mut writer = BufWriter::new(file);
    codec::write_preamble(&mut writer).map_err(io)?;
    codec::write_frame(&mut writer, &MatrixHeader::describe(matrix)).map_err(io)?;
    codec::write_frame(&mut writer, matrix).map_err(io)?;
    writer.flush().map_err(io)?;
    let file = writer.into_inner().map_err(|e| StorageError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(io)
}

/// Read only the header of a matrix file.
///
/// # Errors
///
/// Returns [`StorageError::Io`] on I/O errors, bad magic, unsupported
/// versions or checksum failures.
pub fn read_header(path: &Path) -> Result<MatrixHeader, StorageError> {
    let io = |e| StorageError::io(path, e);
    let mut reader = BufReader::new(File::open(path).map_err(io)?);
    codec::read_preamble(&mut reader).map_err(io)?;
    codec::read_frame(&mut reader).map_err(io)
}

/// Read a matrix written by [`write_matrix`].
///
/// # Errors
///
/// Returns [`StorageError::Io`] on I/O or framing errors and
/// [`StorageError::LayoutMismatch`] if the matrix does not match the layout
/// recorded in its header.
pub fn read_matrix(path: &Path) -> Result<ResponseMatrix, StorageError> {
    let io = |e| StorageError::io(path, e);
    let mut reader = BufReader::new(File::open(path).map_err(io)?);
    codec::read_preamble(&mut reader).map_err(io)?;
    let header: MatrixHeader = codec::read_frame(&mut reader).map_err(io)?;
    let matrix: ResponseMatrix = codec::read_frame(&mut reader).map_err(io)?;

    let layout = matrix.layout_digest().to_hex().to_string();
    if layout != header.layout || header.name != matrix.name() {
        return Err(StorageError::LayoutMismatch {
            name: matrix.name().to_string(),
            reason: format!("header of {} describes another matrix", path.display()),
        });
    }
    Ok(matrix)
}
