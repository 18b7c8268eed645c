use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use colored::Colorize;
use log::{debug, info};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::worker::SubdomainRecord;

pub const CSV_HEADER: [&str; 8] = [
    "DOMAIN",
    "CNAME",
    "A",
    "STATUS_CODE",
    "TITLE",
    "LOCATION",
    "CONTENT_LENGTH",
    "HTTP_ERROR",
];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write result row: {source}")]
    Write {
        #[source]
        source: csv::Error,
    },
}

pub trait RecordSink: Send {
    fn write_record(&mut self, record: &SubdomainRecord) -> Result<(), SinkError>;
}

/// Truncates `path` on creation and flushes after every row.
pub struct CsvSink {
    writer: csv::Writer<File>,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut sink = Self {
            writer: csv::Writer::from_writer(file),
        };
        sink.write_row(CSV_HEADER.iter().map(|s| s.to_string()).collect())?;
        Ok(sink)
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<(), SinkError> {
        self.writer
            .write_record(&row)
            .map_err(|source| SinkError::Write { source })?;
        self.writer
            .flush()
            .map_err(|e| SinkError::Write { source: e.into() })
    }
}

impl RecordSink for CsvSink {
    fn write_record(&mut self, record: &SubdomainRecord) -> Result<(), SinkError> {
        self.write_row(csv_row(record))
    }
}

pub fn csv_row(record: &SubdomainRecord) -> Vec<String> {
    let SubdomainRecord { resolve, probe } = record;
    vec![
        resolve.domain.clone(),
        resolve.cname_records.join(","),
        resolve.a_records.join(","),
        probe.status_code.to_string(),
        probe.title.clone(),
        probe.location.clone(),
        probe.body_length.to_string(),
        probe.error.clone(),
    ]
}

/// Persists nothing; the accepted records come back from `ResultSink::run`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemorySink;

impl RecordSink for MemorySink {
    fn write_record(&mut self, _record: &SubdomainRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

pub struct ResultSink {
    sink: Box<dyn RecordSink>,
    announce: bool,
}

impl ResultSink {
    pub fn new(sink: Box<dyn RecordSink>, announce: bool) -> Self {
        Self { sink, announce }
    }

    /// Drains `results_rx` until it closes. The first record seen for a
    /// domain wins. A write failure ends the run and drops the receiver.
    pub async fn run(
        mut self,
        mut results_rx: mpsc::Receiver<SubdomainRecord>,
    ) -> Result<Vec<SubdomainRecord>, SinkError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted: Vec<SubdomainRecord> = Vec::new();

        while let Some(record) = results_rx.recv().await {
            if !record.resolve.has_records() {
                continue;
            }
            if !seen.insert(record.resolve.domain.clone()) {
                debug!("duplicate result for {}, ignored", record.resolve.domain);
                continue;
            }
            self.sink.write_record(&record)?;
            if self.announce {
                info!("{}", announce_line(&record));
            } else {
                debug!("accepted {}", record.resolve.domain);
            }
            accepted.push(record);
        }
        debug!("result sink finished with {} records", accepted.len());
        Ok(accepted)
    }
}

fn announce_line(record: &SubdomainRecord) -> String {
    let mut line = format!(
        "{} cname: {:?} a: {:?}",
        record.resolve.domain.bold().green(),
        record.resolve.cname_records,
        record.resolve.a_records,
    );
    if record.probe.status_code != 0 {
        line.push_str(&format!(
            " [{}] [{}]",
            record.probe.status_code.to_string().yellow(),
            record.probe.title.cyan()
        ));
    }
    line
}
