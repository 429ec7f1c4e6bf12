//! JSON-lines oracles.
//!
//! One serde record per line: a [`SimulatedEvent`] per line for the
//! simulation file, a [`RawEventList`] per line for the reconstruction file.
//! Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::DeserializeOwned;

use super::traits::{ReconstructionSource, SimulationSource};
use crate::error::SourceError;
use crate::reconstruction::RawEventList;
use crate::simulation::SimulatedEvent;

fn open(path: &Path) -> Result<BufReader<File>, SourceError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Line reader shared by both sources.
#[derive(Debug)]
struct JsonLines<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, SourceError> {
        loop {
            self.buf.clear();
            self.line += 1;
            let read = self.reader.read_line(&mut self.buf).map_err(|e| SourceError::Io {
                line: self.line,
                message: e.to_string(),
            })?;
            if read == 0 {
                return Ok(None);
            }
            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|e| SourceError::Parse {
                    line: self.line,
                    message: e.to_string(),
                });
        }
    }
}

/// Simulated events from a JSON-lines file.
#[derive(Debug)]
pub struct JsonlSimulationSource<R = BufReader<File>> {
    lines: JsonLines<R>,
    read: u64,
}

impl JsonlSimulationSource {
    /// Open a simulation file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        log::info!("reading simulated events from {}", path.display());
        Ok(Self::from_reader(open(path)?))
    }
}

impl<R: BufRead> JsonlSimulationSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: JsonLines::new(reader),
            read: 0,
        }
    }
}

impl<R: BufRead> SimulationSource for JsonlSimulationSource<R> {
    fn next_event(&mut self, require_untruncated: bool) -> Result<Option<SimulatedEvent>, SourceError> {
        while let Some(event) = self.lines.next_record::<SimulatedEvent>()? {
            self.read += 1;
            event.validate()?;
            if require_untruncated && event.is_truncated() {
                log::debug!("skipping truncated simulated event {}", event.event_id);
                continue;
            }
            return Ok(Some(event));
        }
        Ok(None)
    }

    fn simulated_events(&self) -> u64 {
        self.read
    }
}

/// Reconstructed event lists from a JSON-lines file.
#[derive(Debug)]
pub struct JsonlReconstructionSource<R = BufReader<File>> {
    lines: JsonLines<R>,
}

impl JsonlReconstructionSource {
    /// Open a reconstruction file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        log::info!("reading reconstructed events from {}", path.display());
        Ok(Self::from_reader(open(path)?))
    }
}

impl<R: BufRead> JsonlReconstructionSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: JsonLines::new(reader),
        }
    }
}

impl<R: BufRead> ReconstructionSource for JsonlReconstructionSource<R> {
    fn analyze_next(&mut self) -> Result<Option<RawEventList>, SourceError> {
        match self.lines.next_record::<RawEventList>()? {
            Some(list) => {
                list.validate()?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }
}
