use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use common::config::{OutputConfig, OutputFormat};
use normalizer::{header_line, CanonicalRecord, SCHEMA_VERSION};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sink lock poisoned by a panicked writer")]
    Poisoned,
}

/// Destination for canonical records. Implementations serialize writes
/// internally so both streams can share one sink.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, record: &CanonicalRecord) -> Result<(), SinkError>;

    async fn flush(&self) -> Result<(), SinkError>;
}

pub type SharedSink = Arc<dyn RecordSink>;

/// Comma-delimited file with a header row in the historical column layout.
pub struct CsvFileSink {
    writer: Mutex<BufWriter<File>>,
}

impl CsvFileSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path.as_ref()).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(header_line().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl RecordSink for CsvFileSink {
    async fn write(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        let mut line = record.csv_line();
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// One JSON object per line, each tagged with `schema_version`.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path.as_ref()).await?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn write(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        let mut value = serde_json::to_value(record)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("schema_version".into(), SCHEMA_VERSION.into());
        }
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory; used by tests and embedding callers.
#[derive(Default)]
pub struct MemorySink {
    records: StdMutex<Vec<CanonicalRecord>>,
    flushes: StdMutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.lock().map(|f| *f).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        *self.flushes.lock().map_err(|_| SinkError::Poisoned)? += 1;
        Ok(())
    }
}

pub async fn open_sink(output: &OutputConfig) -> Result<SharedSink, SinkError> {
    info!(path = %output.path, format = ?output.format, "opening output");
    let sink: SharedSink = match output.format {
        OutputFormat::Csv => Arc::new(CsvFileSink::create(&output.path).await?),
        OutputFormat::Jsonl => Arc::new(JsonLinesSink::create(&output.path).await?),
    };
    Ok(sink)
}
