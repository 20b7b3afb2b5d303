//! Repairs of derived fields after structural edits.
//!
//! All repairs are computed from scratch from a snapshot and returned as
//! update batches. Removals are done in two phases: a [`RemovalPlan`] is
//! computed before the host removes the records, and the repair batch is
//! computed from the snapshot the host obtains after the removal.

use log::{debug, info};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::completion::select_next_visited_place_id;
use crate::config::{activities, NextPlaceCategory};
use crate::grouped::{add_grouped_objects, remove_grouped_objects};
use crate::interview::{active_visited_place_key, segments, trips, visited_places, Interview};
use crate::path::{ResponsePath, UpdateBatch};
use crate::records::*;

/// The section the repairs of visited places are reported to.
pub const VISITED_PLACES_SECTION: &str = "visitedPlaces";

/// Keeps the next place categories, the first arrival time and the last
/// departure time consistent with the order of the visited places, and
/// points the active visited place to the next place that needs answers.
///
/// `visited_places` must be in sequence order. Only the fields that need a
/// change are in the batch, so running it on consistent places gives an
/// empty batch.
pub fn update_visited_places(
    person: &Person,
    visited_places: &[&VisitedPlace],
    interview: &Interview,
    attribute_prefix: Option<&str>,
    include_selected_visited_place_id: bool,
) -> UpdateBatch {
    let mut batch = UpdateBatch::new();
    let went_back_home = NextPlaceCategory::WentBackHome.as_str();
    let stayed = NextPlaceCategory::StayedThereUntilTheNextDay.as_str();
    let count = visited_places.len();
    for (idx, vp) in visited_places.iter().enumerate() {
        let vp_path = ResponsePath::person(&person.uuid).visited_place(&vp.uuid);
        let category = vp.next_place_category.as_deref();
        match visited_places.get(idx + 1) {
            Some(next) if next.is_home() && category != Some(went_back_home) => {
                batch.set(&vp_path.join("nextPlaceCategory"), went_back_home);
            }
            Some(next) if !next.is_home() && category == Some(went_back_home) => {
                batch.set(
                    &vp_path.join("nextPlaceCategory"),
                    NextPlaceCategory::VisitedAnotherPlace.as_str(),
                );
            }
            None if !vp.next_place_category.is_blank() && category != Some(stayed) => {
                batch.set(&vp_path.join("nextPlaceCategory"), JSValue::Null);
            }
            _ => {}
        }
        if idx == 0 && vp.arrival_time.is_some() {
            batch.set(&vp_path.join("arrivalTime"), JSValue::Null);
        }
        if category == Some(stayed) && idx + 1 == count && vp.departure_time.is_some() {
            batch.set(&vp_path.join("departureTime"), JSValue::Null);
        }
    }
    if include_selected_visited_place_id {
        let key = active_visited_place_key(attribute_prefix);
        let next_id = select_next_visited_place_id(visited_places, person, interview);
        let current = interview.active_visited_place_id(attribute_prefix);
        if current != next_id {
            batch.set(&ResponsePath::parse(&key), next_id.map(JSValue::from).unwrap_or(JSValue::Null));
        }
    }
    debug!(
        "update_visited_places: {} updates for person {}",
        batch.values_by_path.len(),
        person.uuid
    );
    batch
}

/// Before the visited place at `shortcut_to` disappears, makes the places
/// that point to it independent.
///
/// The first place pointing to it takes its geography, and its name or its
/// own shortcut. The other places are pointed to that first place. Returns
/// `None` when no place points to `shortcut_to`.
pub fn replace_visited_place_shortcuts(
    interview: &Interview,
    shortcut_to: &ResponsePath,
) -> Option<UpdateBatch> {
    replace_shortcuts_excluding(interview, shortcut_to, &[])
}

fn replace_shortcuts_excluding(
    interview: &Interview,
    shortcut_to: &ResponsePath,
    excluded: &[ResponsePath],
) -> Option<UpdateBatch> {
    let target = shortcut_to.to_string();
    let holders: Vec<ResponsePath> = interview
        .persons_ordered()
        .into_iter()
        .flat_map(|person| {
            visited_places(person)
                .into_iter()
                .filter(|vp| vp.shortcut.as_deref() == Some(target.as_str()))
                .map(move |vp| ResponsePath::person(&person.uuid).visited_place(&vp.uuid))
        })
        .filter(|p| !excluded.contains(p))
        .collect();
    let (first, others) = holders.split_first()?;

    let original = interview.response(shortcut_to);
    let original_field = |field: &str| {
        original
            .and_then(|o| o.get(field))
            .cloned()
            .unwrap_or(JSValue::Null)
    };
    let mut batch = UpdateBatch::new();
    let original_shortcut = original_field("shortcut");
    if !original_shortcut.is_blank() {
        batch.set(&first.join("shortcut"), original_shortcut);
    } else {
        batch.unset(&first.join("shortcut"));
        batch.set(&first.join("name"), original_field("name"));
    }
    batch.set(&first.join("geography"), original_field("geography"));
    for other in others {
        batch.set(&other.join("shortcut"), first.to_string());
    }
    info!(
        "replace_visited_place_shortcuts: {} places pointed to {}",
        holders.len(),
        target
    );
    Some(batch)
}

// ********* Removals ***********

/// What to remove, and what to commit with the repair once the removal is
/// done.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalPlan {
    /// The section the repair is reported to.
    pub section: String,
    pub paths_to_remove: Vec<ResponsePath>,
    /// Updates computed before the removal. They are part of the repair
    /// batch.
    pub pre_removal: UpdateBatch,
}

fn collapses(previous: &VisitedPlace, next: &VisitedPlace) -> bool {
    match (previous.activity.as_deref(), next.activity.as_deref()) {
        (Some(a), Some(b)) => a == b && activities::COLLAPSIBLE.contains(&a),
        _ => false,
    }
}

/// Plans the deletion of a visited place of the active person.
///
/// When the places before and after it have the same home, usual place,
/// on the road or stroll activity, the place after it is deleted as well.
/// Places pointing to a deleted place are made independent first.
pub fn plan_visited_place_deletion(
    interview: &Interview,
    visited_place_path: &ResponsePath,
) -> Option<RemovalPlan> {
    let person = interview.active_person()?;
    let vp_uuid = match interview.response(visited_place_path) {
        Some(v) => v
            .get("_uuid")
            .and_then(|u| u.as_str())
            .or_else(|| visited_place_path.last())?
            .to_string(),
        None => {
            debug!(
                "plan_visited_place_deletion: nothing at {}",
                visited_place_path
            );
            return None;
        }
    };
    let ordered = visited_places(person);
    let mut paths = vec![visited_place_path.clone()];
    if let (Some(prev), Some(next)) = (previous(&vp_uuid, &ordered), next(&vp_uuid, &ordered)) {
        if collapses(prev, next) {
            debug!(
                "plan_visited_place_deletion: {} and {} collapse, also deleting {}",
                prev.uuid, next.uuid, next.uuid
            );
            paths.push(ResponsePath::person(&person.uuid).visited_place(&next.uuid));
        }
    }
    let mut pre_removal = UpdateBatch::new();
    for p in paths.iter() {
        if let Some(b) = replace_shortcuts_excluding(interview, p, &paths) {
            pre_removal.merge(b);
        }
    }
    Some(RemovalPlan {
        section: VISITED_PLACES_SECTION.to_string(),
        paths_to_remove: paths,
        pre_removal,
    })
}

/// The batch to commit once the places of the plan are removed: the
/// shortcut updates of the plan and the repair of the remaining places.
pub fn repair_after_visited_place_deletion(
    updated_interview: &Interview,
    plan: &RemovalPlan,
) -> UpdateBatch {
    let mut batch = plan.pre_removal.clone();
    match updated_interview.active_person() {
        Some(person) => {
            let vps = visited_places(person);
            batch.merge(update_visited_places(
                person,
                &vps,
                updated_interview,
                None,
                true,
            ));
        }
        None => debug!("repair_after_visited_place_deletion: no active person"),
    }
    batch
}

/// Plans the removal of a visited place whose trips are merged.
pub fn plan_visited_place_merge(
    interview: &Interview,
    visited_place_path: &ResponsePath,
) -> Option<RemovalPlan> {
    if interview.response(visited_place_path).is_none() {
        debug!("plan_visited_place_merge: nothing at {}", visited_place_path);
        return None;
    }
    Some(RemovalPlan {
        section: VISITED_PLACES_SECTION.to_string(),
        paths_to_remove: vec![visited_place_path.clone()],
        pre_removal: UpdateBatch::new(),
    })
}

fn renumbered_segment(segment: &Segment, sequence: i64) -> JSValue {
    let mut m: JSMap<String, JSValue> = segment.other.clone();
    m.insert("_uuid".to_string(), json!(segment.uuid));
    m.insert("_sequence".to_string(), json!(sequence));
    if let Some(mode) = &segment.mode {
        m.insert("mode".to_string(), json!(mode));
    }
    if let Some(mode_pre) = &segment.mode_pre {
        m.insert("modePre".to_string(), json!(mode_pre));
    }
    JSValue::Object(m)
}

/// Realigns the trips of the active person with its visited places, once a
/// visited place is removed.
///
/// Trip `n` goes from visited place `n` to visited place `n + 1`. Missing
/// trips are created. The first misaligned trip takes the segments of the
/// following trip after its own, later misaligned trips take the segments of
/// their following trip. Trips past the last visited place are removed.
pub fn repair_after_visited_place_merge(updated_interview: &Interview) -> UpdateBatch {
    let mut batch = UpdateBatch::new();
    let person = match updated_interview.active_person() {
        Some(p) => p,
        None => {
            debug!("repair_after_visited_place_merge: no active person");
            return batch;
        }
    };
    let trips_path = ResponsePath::person(&person.uuid).trips();
    let vps = visited_places(person);
    let ts = trips(person);
    let mut trip_to_merge_found = false;

    for trip_sequence in 1..vps.len() {
        let origin = vps[trip_sequence - 1];
        let destination = vps[trip_sequence];
        match ts.get(trip_sequence - 1) {
            None => {
                let mut attributes = JSMap::new();
                attributes.insert("_originVisitedPlaceUuid".to_string(), json!(origin.uuid));
                attributes.insert(
                    "_destinationVisitedPlaceUuid".to_string(),
                    json!(destination.uuid),
                );
                batch.merge(add_grouped_objects(
                    updated_interview,
                    1,
                    Some(trip_sequence as i64),
                    &trips_path,
                    &[attributes],
                ));
            }
            Some(trip)
                if trip.origin_visited_place_uuid.as_deref() != Some(origin.uuid.as_str())
                    || trip.destination_visited_place_uuid.as_deref()
                        != Some(destination.uuid.as_str()) =>
            {
                let trip_path = trips_path.join(&trip.uuid);
                batch.set(&trip_path.join("_originVisitedPlaceUuid"), origin.uuid.as_str());
                batch.set(
                    &trip_path.join("_destinationVisitedPlaceUuid"),
                    destination.uuid.as_str(),
                );
                let next_segments = ts
                    .get(trip_sequence)
                    .map(|next_trip| segments(next_trip))
                    .unwrap_or_default();
                let new_segments: Vec<&Segment> = if !trip_to_merge_found {
                    trip_to_merge_found = true;
                    segments(trip).into_iter().chain(next_segments).collect()
                } else {
                    next_segments
                };
                let mut by_id = JSMap::new();
                for (idx, s) in new_segments.iter().enumerate() {
                    by_id.insert(s.uuid.clone(), renumbered_segment(s, idx as i64 + 1));
                }
                debug!(
                    "repair_after_visited_place_merge: trip {} now has {} segments",
                    trip.uuid,
                    by_id.len()
                );
                batch.set(&trip_path.join("segments"), JSValue::Object(by_id));
            }
            Some(_) => {}
        }
    }

    if ts.len() >= vps.len() {
        let first_extra = vps.len().saturating_sub(1);
        let extra: Vec<ResponsePath> = ts[first_extra..]
            .iter()
            .map(|t| trips_path.join(&t.uuid))
            .collect();
        if !extra.is_empty() {
            batch.merge(remove_grouped_objects(updated_interview, &extra));
        }
    }
    info!(
        "repair_after_visited_place_merge: {} updates, {} removals",
        batch.values_by_path.len(),
        batch.unset_paths.len()
    );
    batch
}

// ********* Section bookkeeping ***********

/// Past this many entries, the action log is restarted.
pub const MAX_SECTION_ACTIONS: usize = 200;

/// Past this many entries, language changes are no longer recorded.
pub const MAX_LANGUAGES: usize = 200;

fn response_array(interview: &Interview, path: &str) -> Vec<JSValue> {
    interview
        .response(&ResponsePath::parse(path))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// The section action log with a new entry. `now` is a unix timestamp.
pub fn generate_section_action(
    interview: &Interview,
    section: &str,
    action: &str,
    now: i64,
) -> Vec<JSValue> {
    let mut actions = response_array(interview, "_sections._actions");
    if actions.len() > MAX_SECTION_ACTIONS {
        actions = vec![json!({"section": "", "action": "eraseOldActionTooMany", "ts": now})];
    }
    actions.push(json!({"section": section, "action": action, "ts": now}));
    actions
}

/// The list of languages used in the interview, with `language` appended if
/// it differs from the last one.
pub fn detect_language_changes(interview: &Interview, language: &str) -> Vec<JSValue> {
    let mut languages = response_array(interview, "_languages");
    if languages.len() <= MAX_LANGUAGES && languages.last().and_then(|l| l.as_str()) != Some(language) {
        languages.push(json!(language));
    }
    languages
}
