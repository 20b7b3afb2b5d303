//! Creation and removal of grouped records (persons, visited places, trips,
//! segments), expressed as update batches.

use log::debug;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::interview::Interview;
use crate::path::{ResponsePath, UpdateBatch};
use crate::records::number_as_i64;

/// The records under `path`, as `(uuid, sequence)` in sequence order.
fn sequenced_children(interview: &Interview, path: &ResponsePath) -> Vec<(String, Option<i64>)> {
    let mut res: Vec<(String, Option<i64>)> = match interview.response(path) {
        Some(JSValue::Object(m)) => m
            .iter()
            .map(|(k, v)| (k.clone(), v.get("_sequence").and_then(number_as_i64)))
            .collect(),
        _ => vec![],
    };
    res.sort_by_key(|(_, seq)| (seq.is_none(), *seq));
    res
}

/// Adds `count` records to the collection at `path`.
///
/// The new records take the sequences starting at `insert_sequence`, or are
/// appended when it is `None`. Existing records at or after the insertion
/// point are shifted. Each new record gets a fresh v4 uuid, and the
/// attributes given at its index.
pub fn add_grouped_objects(
    interview: &Interview,
    count: usize,
    insert_sequence: Option<i64>,
    path: &ResponsePath,
    attributes: &[JSMap<String, JSValue>],
) -> UpdateBatch {
    let mut batch = UpdateBatch::new();
    let siblings = sequenced_children(interview, path);
    let insert_at = insert_sequence
        .filter(|s| *s >= 1)
        .unwrap_or(siblings.len() as i64 + 1);
    for (uuid, seq) in siblings.iter() {
        if let Some(s) = seq {
            if *s >= insert_at {
                batch.set(&path.join(uuid).join("_sequence"), s + count as i64);
            }
        }
    }
    for i in 0..count {
        let uuid = Uuid::new_v4().to_string();
        let mut record = attributes.get(i).cloned().unwrap_or_default();
        record.insert("_sequence".to_string(), JSValue::from(insert_at + i as i64));
        record.insert("_uuid".to_string(), JSValue::from(uuid.clone()));
        debug!("add_grouped_objects: new record {} in {}", uuid, path);
        batch.set(&path.join(&uuid), JSValue::Object(record));
    }
    batch
}

/// Removes the records at `paths`, and renumbers the remaining records of
/// each affected collection from 1.
pub fn remove_grouped_objects(interview: &Interview, paths: &[ResponsePath]) -> UpdateBatch {
    let mut batch = UpdateBatch::new();
    let mut removed_by_parent: BTreeMap<ResponsePath, BTreeSet<String>> = BTreeMap::new();
    for p in paths {
        match (p.parent(), p.last()) {
            (Some(parent), Some(uuid)) => {
                removed_by_parent
                    .entry(parent)
                    .or_default()
                    .insert(uuid.to_string());
                batch.unset(p);
            }
            _ => debug!("remove_grouped_objects: cannot remove {:?}", p.to_string()),
        }
    }
    for (parent, removed) in removed_by_parent.iter() {
        let remaining = sequenced_children(interview, parent)
            .into_iter()
            .filter(|(uuid, _)| !removed.contains(uuid));
        for (idx, (uuid, seq)) in remaining.enumerate() {
            let new_seq = idx as i64 + 1;
            if seq != Some(new_seq) {
                batch.set(&parent.join(&uuid).join("_sequence"), new_seq);
            }
        }
    }
    batch
}
