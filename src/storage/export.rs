//! CSV export of recorded samples
//!
//! Two layouts:
//! - **Long**: one row per (sample, field) pair
//! - **Wide**: one row per sample, one column per flattened field across the
//!   whole record (sorted); missing fields are empty cells

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, ResultExt};
use crate::session::{Payload, RecordedSample, SessionRecord};

const META_HEADER: &str = "relative_time,timestamp,stream_name,stream_type,clock_offset";

/// CSV layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportLayout {
    Long,
    #[default]
    Wide,
}

/// Flattened `(field, value)` pairs of a sample's payload
pub fn flatten_sample(sample: &RecordedSample) -> Vec<(String, String)> {
    match sample.payload() {
        Payload::Event(value) => value.flatten(),
        Payload::Numeric(values) => values
            .iter()
            .enumerate()
            .map(|(i, v)| (sample.stream.channel_label(i), v.to_string()))
            .collect(),
        Payload::Raw(values) => values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("raw[{i}]"), v.clone()))
            .collect(),
    }
}

/// Quote a CSV field when it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn meta_columns(sample: &RecordedSample) -> String {
    format!(
        "{:.6},{:.6},{},{},{}",
        sample.relative_time,
        sample.timestamp,
        csv_field(&sample.stream.name),
        csv_field(&sample.stream.content_type),
        sample
            .clock_offset
            .map(|o| format!("{:.9}", o))
            .unwrap_or_default()
    )
}

/// Write `record` as CSV; returns the number of data rows
pub fn write_csv<W: Write>(
    record: &SessionRecord,
    layout: ExportLayout,
    mut writer: W,
) -> Result<u64> {
    let mut rows = 0u64;
    match layout {
        ExportLayout::Long => {
            writeln!(writer, "{},field,value", META_HEADER)?;
            for sample in &record.samples {
                let meta = meta_columns(sample);
                for (field, value) in flatten_sample(sample) {
                    writeln!(writer, "{},{},{}", meta, csv_field(&field), csv_field(&value))?;
                    rows += 1;
                }
            }
        }
        ExportLayout::Wide => {
            let flattened: Vec<Vec<(String, String)>> =
                record.samples.iter().map(flatten_sample).collect();
            let columns: BTreeSet<&str> = flattened
                .iter()
                .flat_map(|fields| fields.iter().map(|(k, _)| k.as_str()))
                .collect();

            let mut header = String::from(META_HEADER);
            for column in &columns {
                header.push(',');
                header.push_str(&csv_field(column));
            }
            writeln!(writer, "{}", header)?;

            for (sample, fields) in record.samples.iter().zip(&flattened) {
                let mut row = meta_columns(sample);
                for column in &columns {
                    row.push(',');
                    // Missing fields stay empty
                    if let Some((_, value)) = fields.iter().find(|(k, _)| k == column) {
                        row.push_str(&csv_field(value));
                    }
                }
                writeln!(writer, "{}", row)?;
                rows += 1;
            }
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Export `record` to a CSV file
pub fn export_csv(
    record: &SessionRecord,
    layout: ExportLayout,
    path: impl AsRef<Path>,
) -> Result<u64> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let rows = write_csv(record, layout, BufWriter::new(file))?;
    tracing::info!("Exported {} row(s) to {:?}", rows, path);
    Ok(rows)
}
