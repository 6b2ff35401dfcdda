//! Persisted symbol records.
//!
//! One record per line, `x,y` as decimal integers, no header. Record order
//! is symbol order.

use super::mapper::Symbol;
use crate::error::{Error, Result, Stage};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Somewhere a chunk's symbols live between modulation and demodulation.
pub trait SymbolStore {
    /// Replace the stored sequence with `symbols`.
    fn write(&mut self, symbols: &[Symbol]) -> Result<()>;

    /// Every stored symbol, in write order.
    fn read_all(&mut self) -> Result<Vec<Symbol>>;

    /// Release whatever backs the store once the chunk is done with it.
    fn discard(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn write_records<W: Write>(symbols: &[Symbol], mut writer: W) -> io::Result<()> {
    for symbol in symbols {
        writeln!(writer, "{},{}", symbol.x, symbol.y)?;
    }
    writer.flush()
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Symbol>> {
    let mut symbols = Vec::new();

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| Error::io(Stage::Demodulating, e))?;
        let line_no = index + 1;
        let raw = line.strip_suffix(b"\r").unwrap_or(&line[..]);
        let record = std::str::from_utf8(raw).map_err(|e| Error::MalformedRecord {
            line: line_no,
            reason: format!("record is not valid UTF-8: {}", e),
        })?;
        if record.is_empty() {
            continue;
        }

        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() != 2 {
            return Err(Error::MalformedRecord {
                line: line_no,
                reason: format!("expected 2 fields, found {}", fields.len()),
            });
        }

        let x = parse_field(fields[0], line_no, "x")?;
        let y = parse_field(fields[1], line_no, "y")?;
        symbols.push(Symbol::new(x, y));
    }

    Ok(symbols)
}

fn parse_field(field: &str, line: usize, name: &str) -> Result<i64> {
    if field.is_empty() {
        return Err(Error::MalformedRecord {
            line,
            reason: format!("{} field is empty", name),
        });
    }
    field.parse::<i64>().map_err(|e| Error::MalformedRecord {
        line,
        reason: format!("{} field {:?} is not an integer: {}", name, field, e),
    })
}

/// CSV file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    keep: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, keep: bool) -> Self {
        Self {
            path: path.into(),
            keep,
        }
    }

    /// Store scoped to one chunk, so chunks never share a file.
    pub fn for_chunk(base: &Path, chunk_index: u64, keep: bool) -> Self {
        Self::new(chunk_symbol_path(base, chunk_index), keep)
    }
}

impl SymbolStore for FileStore {
    fn write(&mut self, symbols: &[Symbol]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(Stage::Persisting, e))?;
            }
        }

        let file = File::create(&self.path).map_err(|e| Error::io(Stage::Persisting, e))?;
        write_records(symbols, BufWriter::new(file))
            .map_err(|e| Error::io(Stage::Persisting, e))?;

        trace!("wrote {} symbols to {}", symbols.len(), self.path.display());
        Ok(())
    }

    fn read_all(&mut self) -> Result<Vec<Symbol>> {
        let file = File::open(&self.path).map_err(|e| Error::io(Stage::Demodulating, e))?;
        read_records(BufReader::new(file))
    }

    fn discard(&mut self) -> Result<()> {
        if self.keep {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(Stage::Demodulating, e)),
        }
    }
}

/// Same record format, held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buffer: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolStore for MemoryStore {
    fn write(&mut self, symbols: &[Symbol]) -> Result<()> {
        self.buffer.clear();
        write_records(symbols, &mut self.buffer).map_err(|e| Error::io(Stage::Persisting, e))
    }

    fn read_all(&mut self) -> Result<Vec<Symbol>> {
        read_records(self.buffer.as_slice())
    }

    fn discard(&mut self) -> Result<()> {
        self.buffer = Vec::new();
        Ok(())
    }
}

/// `dir/name.csv` -> `dir/name.000042.csv`
pub fn chunk_symbol_path(base: &Path, chunk_index: u64) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    base.with_file_name(format!("{}.{:06}.{}", stem, chunk_index, ext))
}
