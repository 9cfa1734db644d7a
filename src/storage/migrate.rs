//! Record schema migrations
//!
//! Records are migrated as untyped JSON before being decoded, one function
//! per version step:
//!
//! | From | To | Change |
//! |------|----|--------|
//! | 1 | 2 | Samples gain explicit `clock_offset` / `local_time_when_recorded` (null = unknown) and a `synchronization_info` block |
//! | 2 | 3 | `schema_version` field; streams gain `nominal_srate`, `kind` and, for pointer streams, a declared coordinate space |
//!
//! Version 1 and 2 files carry no `schema_version`; they are told apart by
//! whether any sample has a `clock_offset` key.

use serde_json::{json, Map, Value};

use super::schema::infer_kind;
use crate::error::{Result, SyncError};
use crate::session::SyncInfo;
use crate::types::{CoordinateSpace, StreamKind, POINTER_CONTENT_TYPE};

/// Schema version written by this crate
pub const RECORD_SCHEMA_VERSION: u32 = 3;

/// Note attached to records migrated from version 1
pub const LEGACY_OFFSET_NOTE: &str =
    "Clock offsets were not captured for this record; cross-device alignment is unavailable";

/// Schema version of an undecoded record document
pub fn detect_version(doc: &Value) -> u32 {
    if let Some(version) = doc.get("schema_version").and_then(Value::as_u64) {
        return version as u32;
    }
    let has_offsets = doc
        .get("lsl_samples")
        .and_then(Value::as_array)
        .is_some_and(|samples| samples.iter().any(|s| s.get("clock_offset").is_some()));
    if has_offsets || doc.get("synchronization_info").is_some() {
        2
    } else {
        1
    }
}

/// Bring `doc` up to [`RECORD_SCHEMA_VERSION`]; returns the source version
pub fn migrate(doc: &mut Value) -> Result<u32> {
    if !doc.is_object() {
        return Err(SyncError::Serialization(
            "record document is not a JSON object".to_string(),
        ));
    }

    let source = detect_version(doc);
    if source > RECORD_SCHEMA_VERSION {
        return Err(SyncError::UnsupportedSchema(source));
    }

    let mut version = source.max(1);
    while version < RECORD_SCHEMA_VERSION {
        match version {
            1 => v1_to_v2(doc),
            2 => v2_to_v3(doc),
            _ => break,
        }
        version += 1;
        tracing::debug!("Migrated record to schema version {}", version);
    }
    Ok(source)
}

fn samples_mut(doc: &mut Value) -> impl Iterator<Item = &mut Map<String, Value>> + '_ {
    doc.get_mut("lsl_samples")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

fn v1_to_v2(doc: &mut Value) {
    for sample in samples_mut(doc) {
        sample.entry("clock_offset").or_insert(Value::Null);
        sample
            .entry("local_time_when_recorded")
            .or_insert(Value::Null);
    }

    if let Some(root) = doc.as_object_mut() {
        if !root.contains_key("synchronization_info") {
            let info = SyncInfo {
                note: LEGACY_OFFSET_NOTE.to_string(),
                ..SyncInfo::default()
            };
            root.insert(
                "synchronization_info".to_string(),
                json!({
                    "sync_method": info.sync_method,
                    "clock_offset_type": info.clock_offset_type,
                    "note": info.note,
                }),
            );
        }
    }
}

fn v2_to_v3(doc: &mut Value) {
    let pointer_spaces = infer_pointer_spaces(doc);

    if let Some(streams) = doc.get_mut("stream_info").and_then(Value::as_array_mut) {
        for stream in streams.iter_mut().filter_map(Value::as_object_mut) {
            stream.entry("nominal_srate").or_insert(json!(0.0));
            if stream.contains_key("kind") {
                continue;
            }
            let name = stream
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let content_type = stream
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let channels = stream
                .get("channel_count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;

            let mut kind = infer_kind(&content_type, channels);
            if let StreamKind::Sample {
                coordinate_space, ..
            } = &mut kind
            {
                if content_type == POINTER_CONTENT_TYPE {
                    *coordinate_space = pointer_spaces
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, space)| *space);
                }
            }
            if let Ok(kind) = serde_json::to_value(&kind) {
                stream.insert("kind".to_string(), kind);
            }
        }
    }

    if let Some(root) = doc.as_object_mut() {
        root.insert("schema_version".to_string(), json!(3));
    }
}

/// Per pointer stream: normalized if every recorded position lies in [0,1]²
fn infer_pointer_spaces(doc: &Value) -> Vec<(String, CoordinateSpace)> {
    let mut spaces: Vec<(String, CoordinateSpace)> = Vec::new();
    let Some(samples) = doc.get("lsl_samples").and_then(Value::as_array) else {
        return spaces;
    };

    for sample in samples {
        if sample.get("stream_type").and_then(Value::as_str) != Some(POINTER_CONTENT_TYPE) {
            continue;
        }
        let Some(name) = sample.get("stream_name").and_then(Value::as_str) else {
            continue;
        };
        let values = sample
            .get("raw_data")
            .or_else(|| sample.get("data"))
            .and_then(Value::as_array);
        let Some((x, y)) = values.and_then(|v| Some((v.first()?.as_f64()?, v.get(1)?.as_f64()?)))
        else {
            continue;
        };

        let point_space = CoordinateSpace::classify(x, y);
        match spaces.iter_mut().find(|(n, _)| n == name) {
            Some((_, space)) => {
                if point_space == CoordinateSpace::Absolute {
                    *space = CoordinateSpace::Absolute;
                }
            }
            None => spaces.push((name.to_string(), point_space)),
        }
    }
    spaces
}
