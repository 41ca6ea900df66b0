//! Incremental CSV output: one row per record, flushed as it is written.

use crate::error::ScrapeError;
use crate::models::Record;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// What happened to a record handed to [`CsvSink::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Same id already written during this run
    Duplicate,
    /// Blank identifying field
    MissingId,
}

pub struct CsvSink<R: Record> {
    path: PathBuf,
    writer: csv::Writer<File>,
    header: Vec<String>,
    seen: HashSet<String>,
    _record: PhantomData<fn(&R)>,
}

impl<R: Record> CsvSink<R> {
    /// Open `path` for appending. An existing non-empty file keeps its
    /// header; otherwise the header is written from `R::COLUMNS`.
    pub fn open(path: impl AsRef<Path>, write_bom: bool) -> Result<Self, ScrapeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let existing = match fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => read_header(&path)?,
            _ => None,
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file.try_clone()?);

        let header = match existing {
            Some(header) => {
                log::info!("Appending to {} ({} columns)", path.display(), header.len());
                header
            }
            None => {
                if write_bom {
                    file.write_all(BOM)?;
                }
                let header: Vec<String> = R::COLUMNS.iter().map(|c| c.to_string()).collect();
                writer.write_record(&header)?;
                writer.flush()?;
                log::info!("Created {}", path.display());
                header
            }
        };

        for column in R::COLUMNS {
            if !header.iter().any(|h| h == column) {
                log::warn!("{} has no {} column; values will not be saved", path.display(), column);
            }
        }

        Ok(Self {
            path,
            writer,
            header,
            seen: HashSet::new(),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Append `record` unless it has no id or was already written this run
    pub fn write(&mut self, record: &R) -> Result<WriteOutcome, ScrapeError> {
        let id = record.id().trim();
        if id.is_empty() {
            return Ok(WriteOutcome::MissingId);
        }
        if !self.seen.insert(id.to_string()) {
            log::debug!("Duplicate {}, not written", id);
            return Ok(WriteOutcome::Duplicate);
        }

        let row: Vec<String> = self
            .header
            .iter()
            .map(|column| record.field(column).unwrap_or_default())
            .collect();
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(WriteOutcome::Written)
    }

    /// Flush and sync to disk
    pub fn checkpoint(&mut self) -> Result<(), ScrapeError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ScrapeError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// First record of an existing file, without a leading BOM
fn read_header(path: &Path) -> Result<Option<Vec<String>>, ScrapeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let Some(first) = reader.records().next() else {
        return Ok(None);
    };
    let header: Vec<String> = first?
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let col = if i == 0 { col.trim_start_matches('\u{feff}') } else { col };
            col.trim().to_string()
        })
        .collect();

    if header.iter().all(|c| c.is_empty()) {
        return Ok(None);
    }
    Ok(Some(header))
}
