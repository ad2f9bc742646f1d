//! JSON-lines output files
//!
//! Incremental resources are append-only with one JSON value per line. The
//! comments file stores two lines per ticket: the ticket id, then the JSON array
//! of its comments. Opening a writer first cuts off any incomplete tail a crash
//! may have left (a line without `\n`, or an id line without its comments), so
//! every later append starts on a record boundary.

use super::{OutputError, OutputResult};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Append-only writer with one JSON value per line
pub struct JsonLinesWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: u64,
}

impl JsonLinesWriter {
    /// Open `path` for appending, creating it lazily on first open
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = open_for_append(&path, 1)?;
        Ok(Self {
            path,
            writer,
            records_written: 0,
        })
    }

    /// Append one record
    pub fn append(&mut self, record: &Value) -> OutputResult<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| OutputError::io(&self.path, e))?;
        self.records_written += 1;
        Ok(())
    }

    /// Append a page of records and flush it to disk
    pub fn append_page(&mut self, records: &[Value]) -> OutputResult<usize> {
        for record in records {
            self.append(record)?;
        }
        self.flush()?;
        Ok(records.len())
    }

    /// Flush buffered lines
    pub fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::io(&self.path, e))
    }

    /// Records appended through this writer
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

/// Streaming reader over a JSON-lines file
pub struct JsonLinesReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl JsonLinesReader {
    /// Open `path`; `None` when it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| OutputError::io(&path, e))?;
        Ok(Some(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_number: 0,
        }))
    }
}

impl Iterator for JsonLinesReader {
    type Item = OutputResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(OutputError::io(&self.path, e))),
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| OutputError::MalformedLine {
                path: self.path.display().to_string(),
                line: self.line_number,
                message: e.to_string(),
            }));
        }
    }
}

/// Writer for the two-line-per-ticket comments file
pub struct CommentsWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    tickets_written: u64,
}

impl CommentsWriter {
    /// Open the comments file for appending
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = open_for_append(&path, 2)?;
        Ok(Self {
            path,
            writer,
            tickets_written: 0,
        })
    }

    /// Append the full comment list of one ticket and flush it
    pub fn append_ticket(&mut self, ticket_id: u64, comments: &[Value]) -> OutputResult<()> {
        let array = serde_json::to_string(comments)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;

        // One write per record keeps a torn write to a single tail fragment.
        let mut record = String::with_capacity(array.len() + 24);
        record.push_str(&ticket_id.to_string());
        record.push('\n');
        record.push_str(&array);
        record.push('\n');

        self.writer
            .write_all(record.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| OutputError::io(&self.path, e))?;
        self.tickets_written += 1;
        Ok(())
    }

    /// Tickets appended through this writer
    pub fn tickets_written(&self) -> u64 {
        self.tickets_written
    }
}

/// One ticket's entry in the comments file
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    /// Ticket id
    pub ticket_id: u64,
    /// Comments in API order
    pub comments: Vec<Value>,
}

/// Streaming reader over the comments file, one ticket at a time
pub struct CommentPairs {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl CommentPairs {
    /// Open the comments file; `None` when it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> OutputResult<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| OutputError::io(&path, e))?;
        Ok(Some(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_number: 0,
        }))
    }

    fn next_line(&mut self) -> Option<OutputResult<String>> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line.map_err(|e| OutputError::io(&self.path, e)))
    }

    fn malformed(&self, line: usize, message: impl Into<String>) -> OutputError {
        OutputError::MalformedLine {
            path: self.path.display().to_string(),
            line,
            message: message.into(),
        }
    }
}

impl Iterator for CommentPairs {
    type Item = OutputResult<CommentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let id_line = match self.next_line()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        let id_line_number = self.line_number;

        // An id without its comments line is an interrupted write: not a record.
        let comments_line = match self.next_line() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Some(Err(e)),
            None => {
                debug!(line = id_line_number, "Ignoring unpaired trailing ticket id");
                return None;
            }
        };

        let ticket_id = match id_line.trim().parse::<u64>() {
            Ok(id) => id,
            Err(e) => return Some(Err(self.malformed(id_line_number, e.to_string()))),
        };

        match serde_json::from_str::<Vec<Value>>(&comments_line) {
            Ok(comments) => Some(Ok(CommentRecord {
                ticket_id,
                comments,
            })),
            Err(e) => Some(Err(self.malformed(self.line_number, e.to_string()))),
        }
    }
}

/// Atomically replace `path` with `value` serialized as one JSON line
pub fn write_snapshot(path: impl AsRef<Path>, value: &Value) -> OutputResult<()> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;

    let json =
        serde_json::to_string(value).map_err(|e| OutputError::SerializationError(e.to_string()))?;

    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| OutputError::io(parent, e))?;
    temp_file
        .write_all(json.as_bytes())
        .and_then(|_| temp_file.write_all(b"\n"))
        .and_then(|_| temp_file.flush())
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| OutputError::io(path, e))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = json.len() + 1, "Snapshot written");
    Ok(())
}

fn open_for_append(path: &Path, lines_per_record: usize) -> OutputResult<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
        }
    }

    if path.exists() {
        let dropped = truncate_incomplete_tail(path, lines_per_record)?;
        if dropped > 0 {
            warn!(
                path = %path.display(),
                bytes_dropped = dropped,
                "Removed incomplete record left by an interrupted run"
            );
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OutputError::io(path, e))?;
    info!(path = %path.display(), "Opened output file for appending");
    Ok(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file))
}

/// Truncate `path` after its last complete record; returns the bytes removed.
fn truncate_incomplete_tail(path: &Path, lines_per_record: usize) -> OutputResult<u64> {
    let file = File::open(path).map_err(|e| OutputError::io(path, e))?;
    let file_len = file
        .metadata()
        .map_err(|e| OutputError::io(path, e))?
        .len();
    let mut reader = BufReader::new(file);

    let mut buf = Vec::new();
    let mut offset: u64 = 0;
    let mut complete_lines: usize = 0;
    let mut boundary: u64 = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| OutputError::io(path, e))?;
        if n == 0 {
            break;
        }
        offset += n as u64;
        if buf.last() != Some(&b'\n') {
            break;
        }
        complete_lines += 1;
        if complete_lines % lines_per_record == 0 {
            boundary = offset;
        }
    }

    if boundary < file_len {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| OutputError::io(path, e))?;
        file.set_len(boundary)
            .map_err(|e| OutputError::io(path, e))?;
        return Ok(file_len - boundary);
    }
    Ok(0)
}
