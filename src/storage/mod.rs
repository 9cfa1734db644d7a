//! Session record persistence
//!
//! [`RecordSink`] writes a [`SessionRecord`] as a self-describing JSON
//! document and reads it back, migrating older schema versions.
//!
//! # Degraded saves
//!
//! If any sample cannot be encoded, or the full write fails partway, the
//! sink still writes a valid document with the session id, stream info,
//! zero samples and an `error` field, and reports the failure in
//! [`SaveReport::degraded`]. A degraded record loads
//! like any other; the marker is surfaced as [`LoadedRecord::save_error`].
//!
//! # Tolerant loading
//!
//! Sample entries that fail to decode are skipped and counted. The session
//! start time is inferred from the first sample when the file lacks it.

pub mod export;
pub mod migrate;
pub mod schema;

pub use migrate::{detect_version, migrate, RECORD_SCHEMA_VERSION};
pub use schema::{RecordFile, SampleEntry, StreamInfoEntry};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StorageSettings;
use crate::error::{Result, ResultExt, SyncError};
use crate::session::{RecordedSample, SessionRecord, SyncInfo};
use crate::types::{ChannelData, StreamDescriptor};

use schema::infer_kind;

/// Outcome of a save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub path: Option<PathBuf>,
    pub samples_written: usize,
    /// Why the full record could not be written, if it could not
    pub degraded: Option<String>,
}

impl SaveReport {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// A record read back from storage
#[derive(Debug, Clone)]
pub struct LoadedRecord {
    pub record: SessionRecord,
    /// Schema version the file was written with
    pub source_version: u32,
    /// Entries that failed to decode
    pub skipped_samples: usize,
    /// Error marker of a degraded save
    pub save_error: Option<String>,
    pub synchronization_info: Option<SyncInfo>,
}

impl LoadedRecord {
    pub fn was_migrated(&self) -> bool {
        self.source_version < RECORD_SCHEMA_VERSION
    }
}

/// Writes and reads session records
#[derive(Debug, Clone)]
pub struct RecordSink {
    pretty: bool,
}

impl Default for RecordSink {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl RecordSink {
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            pretty: settings.pretty,
        }
    }

    /// Conventional record location: `<dir>/<session_id>/<file_name>`
    pub fn record_path(dir: impl AsRef<Path>, session_id: &str, file_name: &str) -> PathBuf {
        dir.as_ref().join(session_id).join(file_name)
    }

    /// Write `record` to `path`, creating parent directories.
    ///
    /// The file is written to a temporary sibling and renamed into place. If
    /// the full write fails partway, the partial file is discarded and a
    /// degraded document is written instead.
    pub fn save(&self, record: &SessionRecord, path: impl AsRef<Path>) -> Result<SaveReport> {
        self.save_with(record, path.as_ref(), |tmp| {
            File::create(tmp).with_context(|| format!("Failed to create record file {:?}", tmp))
        })
    }

    fn save_with<W, F>(
        &self,
        record: &SessionRecord,
        path: &Path,
        mut create: F,
    ) -> Result<SaveReport>
    where
        W: Write,
        F: FnMut(&Path) -> Result<W>,
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create record directory {:?}", parent))?;
        }

        let tmp = path.with_extension("json.tmp");
        let mut report = match write_through(&tmp, &mut create, |w| self.write(record, w)) {
            Ok(report) => report,
            Err(e) => {
                discard(&tmp);
                let reason = e.to_string();
                tracing::warn!("Full record write failed, writing degraded record: {}", reason);
                if let Err(e) =
                    write_through(&tmp, &mut create, |w| self.write_degraded(record, &reason, w))
                {
                    discard(&tmp);
                    return Err(e.with_context(format!("Failed to save record to {:?}", path)));
                }
                SaveReport {
                    path: None,
                    samples_written: 0,
                    degraded: Some(reason),
                }
            }
        };
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move record into place at {:?}", path))?;

        report.path = Some(path.to_path_buf());
        if let Some(reason) = &report.degraded {
            tracing::warn!("Saved degraded record to {:?}: {}", path, reason);
        } else {
            tracing::info!(
                "Saved {} sample(s) of session '{}' to {:?}",
                report.samples_written,
                record.session_id,
                path
            );
        }
        Ok(report)
    }

    /// Encode `record` into `writer`, falling back to a degraded document
    pub fn write<W: Write>(&self, record: &SessionRecord, writer: W) -> Result<SaveReport> {
        match encode_samples(record) {
            Ok(entries) => {
                let doc = full_document(record, entries);
                self.write_document(&doc, writer)?;
                Ok(SaveReport {
                    path: None,
                    samples_written: doc.lsl_samples.len(),
                    degraded: None,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                self.write_degraded(record, &reason, writer)?;
                Ok(SaveReport {
                    path: None,
                    samples_written: 0,
                    degraded: Some(reason),
                })
            }
        }
    }

    /// Write the minimal document: metadata, zero samples and an error marker
    pub fn write_degraded<W: Write>(
        &self,
        record: &SessionRecord,
        reason: &str,
        writer: W,
    ) -> Result<()> {
        let mut doc = full_document(record, Vec::new());
        doc.error = Some(reason.to_string());
        self.write_document(&doc, writer)
    }

    fn write_document<W: Write>(&self, doc: &RecordFile<SampleEntry>, writer: W) -> Result<()> {
        let result = if self.pretty {
            serde_json::to_writer_pretty(writer, doc)
        } else {
            serde_json::to_writer(writer, doc)
        };
        result.map_err(|e| SyncError::Serialization(format!("Failed to encode record: {}", e)))
    }

    /// Load a record file
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedRecord> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open record {:?}", path))?;
        let loaded = Self::read(BufReader::new(file))
            .map_err(|e| e.with_context(format!("Failed to load record {:?}", path)))?;
        tracing::info!(
            "Loaded session '{}' ({} sample(s), schema v{}) from {:?}",
            loaded.record.session_id,
            loaded.record.samples.len(),
            loaded.source_version,
            path
        );
        Ok(loaded)
    }

    /// Decode a record document, migrating it if needed
    pub fn read<R: Read>(reader: R) -> Result<LoadedRecord> {
        let mut doc: serde_json::Value = serde_json::from_reader(reader)
            .map_err(|e| SyncError::Serialization(format!("Invalid record JSON: {}", e)))?;
        let source_version = migrate(&mut doc)?;
        let file: RecordFile<serde_json::Value> = serde_json::from_value(doc)
            .map_err(|e| SyncError::Serialization(format!("Invalid record layout: {}", e)))?;
        Ok(decode_document(file, source_version))
    }
}

/// Open `path` through `create`, run `write` on a buffered writer and flush
fn write_through<W, F, T>(
    path: &Path,
    create: &mut F,
    write: impl FnOnce(&mut BufWriter<W>) -> Result<T>,
) -> Result<T>
where
    W: Write,
    F: FnMut(&Path) -> Result<W>,
{
    let mut writer = BufWriter::new(create(path)?);
    let value = write(&mut writer)?;
    writer.flush()?;
    Ok(value)
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial record {:?}: {}", path, e);
        }
    }
}

fn encode_samples(record: &SessionRecord) -> Result<Vec<SampleEntry>> {
    record
        .samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            if !sample.timestamp.is_finite() || !sample.relative_time.is_finite() {
                return Err(SyncError::Serialization(format!(
                    "sample {} on '{}' has a non-finite timestamp",
                    i,
                    sample.stream_name()
                )));
            }
            Ok(SampleEntry::from_sample(sample))
        })
        .collect()
}

fn full_document(record: &SessionRecord, entries: Vec<SampleEntry>) -> RecordFile<SampleEntry> {
    RecordFile {
        schema_version: RECORD_SCHEMA_VERSION,
        session_id: record.session_id.clone(),
        stream_info: record
            .streams
            .iter()
            .map(|s| StreamInfoEntry::from_descriptor(s, &record.session_id))
            .collect(),
        session_start_time: Some(record.session_start_timestamp),
        total_samples: entries.len(),
        lsl_samples: entries,
        synchronization_info: Some(SyncInfo::default()),
        recorded_at: record.recorded_at,
        capture_reference: record.capture_reference,
        error: None,
    }
}

fn decode_document(file: RecordFile<serde_json::Value>, source_version: u32) -> LoadedRecord {
    let mut streams: Vec<Arc<StreamDescriptor>> = file
        .stream_info
        .into_iter()
        .map(|entry| Arc::new(entry.into_descriptor()))
        .collect();

    let mut skipped = 0;
    let mut samples = Vec::with_capacity(file.lsl_samples.len());
    for (i, raw) in file.lsl_samples.into_iter().enumerate() {
        let entry: SampleEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping malformed sample entry {}: {}", i, e);
                skipped += 1;
                continue;
            }
        };

        let raw = entry.raw_data.as_ref().unwrap_or(&entry.data);
        let stream_index = match entry.resolve_stream(&streams) {
            Some(index) => index,
            None => {
                tracing::debug!("Sample references unlisted stream '{}'", entry.stream_name);
                let channel_count = raw.as_array().map_or(1, Vec::len);
                let kind = infer_kind(&entry.stream_type, channel_count);
                streams.push(Arc::new(StreamDescriptor {
                    name: entry.stream_name.clone(),
                    kind,
                    content_type: entry.stream_type.clone(),
                    channel_count,
                    nominal_rate: 0.0,
                    source_id: entry.source_id.clone().unwrap_or_default(),
                }));
                streams.len() - 1
            }
        };
        let data = ChannelData::from_json_for(raw, &streams[stream_index].kind);

        samples.push(RecordedSample {
            timestamp: entry.timestamp,
            relative_time: entry.relative_time,
            stream_index,
            stream: Arc::clone(&streams[stream_index]),
            data,
            clock_offset: entry.clock_offset,
            local_time_when_recorded: entry.local_time_when_recorded,
        });
    }

    let session_start_timestamp = file
        .session_start_time
        .or_else(|| samples.first().map(|s| s.timestamp - s.relative_time))
        .unwrap_or(0.0);

    LoadedRecord {
        record: SessionRecord {
            session_id: file.session_id,
            streams,
            session_start_timestamp,
            samples,
            recorded_at: file.recorded_at,
            capture_reference: file.capture_reference,
        },
        source_version,
        skipped_samples: skipped,
        save_error: file.error,
        synchronization_info: file.synchronization_info,
    }
}
