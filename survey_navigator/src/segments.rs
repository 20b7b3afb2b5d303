// ********* Segments ***********

// Mode categories and the junction between segments of a trip.

use log::debug;
use serde::Serialize;
use std::fmt::Display;

use crate::config::activities;
use crate::interview::{segments, visited_places, Interview};
use crate::path::ResponsePath;
use crate::records::*;

/// From a segment field (`household.persons.P.trips.T.segments.S.field`),
/// the visited places of the person.
pub const SEGMENT_FIELD_TO_VISITED_PLACES: &str = "../../../../../visitedPlaces";

/// From a segment field, the trip holding the segment.
pub const SEGMENT_FIELD_TO_TRIP: &str = "../../../";

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeCategory {
    Private,
    Public,
    Other,
}

impl ModeCategory {
    const PRIVATE_MODES: [&'static str; 11] = [
        "carDriver",
        "carPassenger",
        "bicycle",
        "bicycleBikeSharingElectric",
        "bicycleBikeSharing",
        "bicycleElectric",
        "taxi",
        "uber",
        "motorcycle",
        "carDriverCarsharingStationBased",
        "carDriverCarsharingFreeFloating",
    ];

    const PUBLIC_MODES: [&'static str; 8] = [
        "transitBus",
        "transitSubway",
        "transitRail",
        "transitTaxi",
        "intercityBus",
        "intercityRail",
        "busOther",
        "plane",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeCategory::Private => "private",
            ModeCategory::Public => "public",
            ModeCategory::Other => "other",
        }
    }
}

impl Display for ModeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn mode_category(mode: &str) -> ModeCategory {
    if ModeCategory::PRIVATE_MODES.contains(&mode) {
        ModeCategory::Private
    } else if ModeCategory::PUBLIC_MODES.contains(&mode) {
        ModeCategory::Public
    } else {
        ModeCategory::Other
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
pub enum TransferCategory {
    #[serde(rename = "public_private")]
    PublicPrivate,
    #[serde(rename = "private_public")]
    PrivatePublic,
}

/// The first change between public and private modes in a trip.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct TripTransfer {
    pub category: TransferCategory,
    #[serde(rename = "previousMode")]
    pub previous_mode: String,
    #[serde(rename = "nextMode")]
    pub next_mode: String,
}

/// Finds the first pair of consecutive segments going from a public to a
/// private mode, or from a private to a public mode. Segments without a mode
/// break the pair.
pub fn trip_transfer_category(trip: &Trip) -> Option<TripTransfer> {
    let mut last: Option<(&str, ModeCategory)> = None;
    for segment in segments(trip) {
        let current = segment.mode.as_deref().map(|m| (m, mode_category(m)));
        if let (Some((previous_mode, previous_category)), Some((next_mode, next_category))) =
            (last, current)
        {
            let category = match (previous_category, next_category) {
                (ModeCategory::Public, ModeCategory::Private) => Some(TransferCategory::PublicPrivate),
                (ModeCategory::Private, ModeCategory::Public) => Some(TransferCategory::PrivatePublic),
                _ => None,
            };
            if let Some(category) = category {
                return Some(TripTransfer {
                    category,
                    previous_mode: previous_mode.to_string(),
                    next_mode: next_mode.to_string(),
                });
            }
        }
        last = current;
    }
    None
}

const JUNCTION_PRIVATE_MODES_PRE: [&str; 6] =
    ["carDriver", "carPassenger", "bicycle", "taxi", "train", "paratransit"];
const JUNCTION_PRIVATE_MODES: [&str; 8] = [
    "taxi",
    "ferryWithCar",
    "motorcycle",
    "bicycle",
    "bicycleElectric",
    "scooterElectric",
    "plane",
    "other",
];
const JUNCTION_PUBLIC_MODES_AFTER: [&str; 4] = ["ferryNoCar", "train", "intercityBus", "taxi"];
const JUNCTION_PUBLIC_MODES_BEFORE: [&str; 5] =
    ["transitBus", "ferryNoCar", "train", "intercityBus", "taxi"];

fn in_list(value: &Option<String>, list: &[&str]) -> bool {
    value.as_deref().map(|v| list.contains(&v)).unwrap_or(false)
}

fn is_junction_private(segment: &Segment) -> bool {
    in_list(&segment.mode_pre, &JUNCTION_PRIVATE_MODES_PRE)
        || in_list(&segment.mode, &JUNCTION_PRIVATE_MODES)
}

/// Whether the place where the respondent switched between `previous` and
/// `current` should be asked: a change between a private mode and public
/// transit, except when working on the road.
pub fn should_display_trip_junction(
    previous: Option<&Segment>,
    current: &Segment,
    activity: Option<&str>,
) -> bool {
    let previous = match previous {
        Some(p) => p,
        None => return false,
    };
    let private_to_public = is_junction_private(previous)
        && (current.mode_pre.as_deref() == Some("transit")
            || in_list(&current.mode, &JUNCTION_PUBLIC_MODES_AFTER));
    let public_to_private = is_junction_private(current)
        && (previous.mode_pre.as_deref() == Some("transit")
            || in_list(&previous.mode, &JUNCTION_PUBLIC_MODES_BEFORE));
    (private_to_public || public_to_private) && activity != Some(activities::WORK_ON_THE_ROAD)
}

/// The owner of a resolved path, when it is
/// `household.persons.<id>.<collection>`.
fn person_of(interview: &Interview, resolved: &ResponsePath, collection: &str) -> Option<String> {
    let parent = resolved.parent()?;
    let person_id = parent.last()?;
    if resolved.last() != Some(collection) || parent != ResponsePath::person(person_id) {
        debug!(
            "person_of: {} is not a {} collection of a person",
            resolved, collection
        );
        return None;
    }
    interview.person(person_id).map(|p| p.uuid.clone())
}

/// The visited places of the person owning the segment field at
/// `field_path`, in sequence order.
pub fn visited_places_for_segment_path<'a>(
    interview: &'a Interview,
    field_path: &ResponsePath,
) -> Option<Vec<&'a VisitedPlace>> {
    let resolved = field_path.resolve_relative(SEGMENT_FIELD_TO_VISITED_PLACES)?;
    let person_id = person_of(interview, &resolved, "visitedPlaces")?;
    interview.person(&person_id).map(visited_places)
}

/// The trip holding the segment field at `field_path`.
pub fn trip_for_segment_path<'a>(
    interview: &'a Interview,
    field_path: &ResponsePath,
) -> Option<&'a Trip> {
    let trip_path = field_path.resolve_relative(SEGMENT_FIELD_TO_TRIP)?;
    let trip_id = trip_path.last()?;
    let trips_path = trip_path.parent()?;
    let person_id = person_of(interview, &trips_path, "trips")?;
    interview.person(&person_id)?.trips.get(trip_id)
}
