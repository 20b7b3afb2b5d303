use log::{debug, info};
use serde::Serialize;
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::collections::BTreeMap;

use crate::config::{
    activities, MalformedResponsesSnafu, MissingResponsesSnafu, NavigatorError, SurveyConfig,
};
use crate::geography::geography;
use crate::grouped::remove_grouped_objects;
use crate::path::{self, ResponsePath, UpdateBatch, RESPONSES};
use crate::records::*;

static NO_PERSONS: BTreeMap<String, Person> = BTreeMap::new();

/// A snapshot of one interview.
///
/// Holds the raw interview object, for path lookups, and its typed responses.
/// The snapshot is never modified by the engine.
#[derive(Debug, Clone)]
pub struct Interview {
    raw: JSValue,
    responses: Responses,
}

impl Interview {
    /// Reads a full interview object (`{"responses": {...}, ...}`).
    pub fn from_value(raw: JSValue) -> Result<Interview, NavigatorError> {
        let resp_value = raw.get(RESPONSES).context(MissingResponsesSnafu {})?;
        let responses: Responses =
            serde_json::from_value(resp_value.clone()).context(MalformedResponsesSnafu {})?;
        debug!(
            "from_value: {} persons",
            responses
                .household
                .as_ref()
                .map(|h| h.persons.len())
                .unwrap_or(0)
        );
        Ok(Interview { raw, responses })
    }

    /// Reads a bare responses object.
    pub fn from_responses(responses: JSValue) -> Result<Interview, NavigatorError> {
        let mut raw = serde_json::Map::new();
        raw.insert(RESPONSES.to_string(), responses);
        Interview::from_value(JSValue::Object(raw))
    }

    /// Reads either a full interview object or a bare responses object.
    pub fn from_any(value: JSValue) -> Result<Interview, NavigatorError> {
        if value.get(RESPONSES).map(|r| r.is_object()).unwrap_or(false) {
            Interview::from_value(value)
        } else {
            Interview::from_responses(value)
        }
    }

    /// The snapshot after the host committed a batch.
    pub fn updated(&self, batch: &UpdateBatch) -> Result<Interview, NavigatorError> {
        info!(
            "updated: applying {} values and {} unsets",
            batch.values_by_path.len(),
            batch.unset_paths.len()
        );
        let mut raw = self.raw.clone();
        batch.apply(&mut raw);
        Interview::from_value(raw)
    }

    /// The same snapshot with some records removed and their siblings
    /// renumbered, as the grouped-object service would do it.
    pub fn without(&self, paths: &[ResponsePath]) -> Result<Interview, NavigatorError> {
        self.updated(&remove_grouped_objects(self, paths))
    }

    pub fn raw(&self) -> &JSValue {
        &self.raw
    }

    pub fn responses(&self) -> &Responses {
        &self.responses
    }

    /// The response at a path relative to the responses object.
    pub fn response(&self, path: &ResponsePath) -> Option<&JSValue> {
        self.raw.get(RESPONSES).and_then(|r| path::get(r, path))
    }

    pub fn household(&self) -> Option<&Household> {
        self.responses.household.as_ref()
    }

    pub fn home(&self) -> Option<&Home> {
        self.responses.home.as_ref()
    }

    pub fn persons(&self) -> &BTreeMap<String, Person> {
        self.household().map(|h| &h.persons).unwrap_or(&NO_PERSONS)
    }

    pub fn persons_ordered(&self) -> Vec<&Person> {
        to_ordered(self.persons())
    }

    pub fn count_persons(&self) -> usize {
        self.persons().len()
    }

    pub fn person(&self, person_id: &str) -> Option<&Person> {
        self.persons().get(person_id)
    }

    pub fn active_person_id(&self) -> Option<&str> {
        self.responses.active_person_id.as_deref()
    }

    /// The person currently being interviewed.
    pub fn active_person(&self) -> Option<&Person> {
        self.active_person_id().and_then(|id| self.person(id))
    }

    /// The id stored under `_active<Prefix>VisitedPlaceId`.
    pub fn active_visited_place_id(&self, attribute_prefix: Option<&str>) -> Option<&str> {
        let key = active_visited_place_key(attribute_prefix);
        self.response(&ResponsePath::parse(&key))
            .and_then(|v| v.as_str())
    }

    pub fn active_visited_place<'a>(&'a self, person: &'a Person) -> Option<&'a VisitedPlace> {
        self.active_visited_place_id(None)
            .and_then(|id| person.visited_places.get(id))
    }

    pub fn active_trip_id(&self) -> Option<&str> {
        self.responses.active_trip_id.as_deref()
    }

    pub fn active_trip<'a>(&'a self, person: &'a Person) -> Option<&'a Trip> {
        self.active_trip_id().and_then(|id| person.trips.get(id))
    }

    /// Finds a visited place in the whole household.
    pub fn visited_place_and_person_by_id(
        &self,
        visited_place_id: &str,
    ) -> Option<(&Person, &VisitedPlace)> {
        self.persons().values().find_map(|p| {
            p.visited_places
                .get(visited_place_id)
                .map(|vp| (p, vp))
        })
    }

    /// The visited place at a response path.
    pub fn visited_place_at(&self, path: &ResponsePath) -> Option<(&Person, &VisitedPlace)> {
        match path.parts() {
            [h, ps, person_id, vps, vp_id] if h == "household" && ps == "persons" && vps == "visitedPlaces" => {
                let person = self.person(person_id)?;
                person.visited_places.get(vp_id).map(|vp| (person, vp))
            }
            _ => {
                debug!("visited_place_at: {} is not a visited place path", path);
                None
            }
        }
    }

    /// Only the active person is interviewed when so configured, or when the
    /// interview has no access code.
    pub fn is_single_person_interview(&self, config: &SurveyConfig) -> bool {
        config.single_person_interview || self.responses.access_code.is_none()
    }

    pub fn household_places(&self) -> HouseholdPlaces<'_> {
        HouseholdPlaces::from_persons(self.persons())
    }

    // ******** Shortcuts *********

    /// The place a shortcut points to: a visited place of any person, or
    /// else a usual place of any person.
    pub fn shortcut_visited_place(&self, place_id: &str) -> Option<PlaceRef<'_>> {
        let places = self.household_places();
        if let Some(vp) = places.visited_places.iter().find(|vp| vp.uuid == place_id) {
            return Some(PlaceRef::Visited(*vp));
        }
        places
            .usual_places
            .iter()
            .find(|up| up.uuid.as_deref() == Some(place_id))
            .copied()
            .map(PlaceRef::Usual)
    }

    /// The owner of the place a shortcut points to.
    pub fn shortcut_visited_place_person(&self, place_id: &str) -> Option<&Person> {
        let places = self.household_places();
        let owner = places
            .visited_places_by_person_id
            .iter()
            .find(|(_, vps)| vps.iter().any(|vp| vp.uuid == place_id))
            .map(|(pid, _)| *pid)
            .or_else(|| {
                places
                    .usual_places_by_person_id
                    .iter()
                    .find(|(_, ups)| ups.iter().any(|up| up.uuid.as_deref() == Some(place_id)))
                    .map(|(pid, _)| *pid)
            })?;
        self.person(owner)
    }

    /// The name to display for a shortcut target.
    ///
    /// Usual places visited as such take their name from the person who owns
    /// them. Home has no name.
    pub fn shortcut_visited_place_name(&self, place: &PlaceRef<'_>) -> Option<String> {
        if let Some(name) = place.name().filter(|n| !n.is_blank()) {
            return Some(name.to_string());
        }
        let vp = match place {
            PlaceRef::Visited(vp) => vp,
            PlaceRef::Usual(_) => return None,
        };
        if vp.has_activity(activities::WORK_USUAL) {
            self.shortcut_visited_place_person(&vp.uuid)
                .and_then(|p| p.usual_work_place_name.clone())
                .filter(|n| !n.is_blank())
        } else if vp.has_activity(activities::SCHOOL_USUAL) {
            self.shortcut_visited_place_person(&vp.uuid)
                .and_then(|p| p.usual_school_place_name.clone())
                .filter(|n| !n.is_blank())
        } else {
            None
        }
    }

    /// The places of the household that the active visited place could be a
    /// shortcut to.
    ///
    /// Home, the active place itself, places without coordinates and places
    /// at the coordinates of the previous place are left out.
    pub fn shortcut_visited_places(&self) -> Vec<ShortcutCandidate> {
        let active_person = match self.active_person() {
            Some(p) => p,
            None => return vec![],
        };
        let active_place = match self.active_visited_place(active_person) {
            Some(vp) => vp,
            None => return vec![],
        };
        let ordered = to_ordered(&active_person.visited_places);
        let previous_coordinates = previous(&active_place.uuid, &ordered)
            .and_then(|prev| geography(prev, active_person, self))
            .and_then(|g| coordinates(&g));
        let previous_coordinates = match previous_coordinates {
            Some(c) => c,
            None => return vec![],
        };
        let mut res = Vec::new();
        for person in self.persons().values() {
            for vp in to_ordered(&person.visited_places) {
                if vp.has_activity(activities::HOME)
                    || vp.has_activity(activities::WORK_ON_THE_ROAD_FROM_HOME)
                    || vp.uuid == active_place.uuid
                {
                    continue;
                }
                let coords = geography(vp, person, self).and_then(|g| coordinates(&g));
                match coords {
                    Some(c) if c != previous_coordinates => {
                        res.push(ShortcutCandidate {
                            person_nickname: person.nickname.clone(),
                            visited_place_id: ResponsePath::person(&person.uuid)
                                .visited_place(&vp.uuid)
                                .to_string(),
                            description: place_description(vp),
                        });
                    }
                    _ => {}
                }
            }
        }
        debug!("shortcut_visited_places: {} candidates", res.len());
        res
    }
}

/// The response key holding the active visited place.
pub fn active_visited_place_key(attribute_prefix: Option<&str>) -> String {
    match attribute_prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => {
            let mut chars = prefix.chars();
            let upper: String = match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            format!("_active{}VisitedPlaceId", upper)
        }
        None => "_activeVisitedPlaceId".to_string(),
    }
}

fn coordinates(geography: &JSValue) -> Option<JSValue> {
    path::get(geography, &ResponsePath::parse("geometry.coordinates"))
        .filter(|c| !c.is_blank())
        .cloned()
}

fn place_description(vp: &VisitedPlace) -> String {
    vp.name
        .clone()
        .filter(|n| !n.is_blank())
        .or_else(|| vp.activity.clone())
        .unwrap_or_default()
}

/// A place referenced by a shortcut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceRef<'a> {
    Visited(&'a VisitedPlace),
    Usual(&'a UsualPlace),
}

impl<'a> PlaceRef<'a> {
    pub fn uuid(&self) -> Option<&'a str> {
        match self {
            PlaceRef::Visited(vp) => Some(vp.uuid.as_str()),
            PlaceRef::Usual(up) => up.uuid.as_deref(),
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        match self {
            PlaceRef::Visited(vp) => vp.name.as_deref(),
            PlaceRef::Usual(up) => up.name.as_deref(),
        }
    }

    pub fn geography(&self) -> Option<&'a JSValue> {
        match self {
            PlaceRef::Visited(vp) => vp.geography.as_ref(),
            PlaceRef::Usual(up) => up.geography.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortcutCandidate {
    #[serde(rename = "personNickname")]
    pub person_nickname: Option<String>,
    /// Path of the candidate visited place.
    #[serde(rename = "visitedPlaceId")]
    pub visited_place_id: String,
    pub description: String,
}

// ******** Per-person collections *********

pub fn visited_places(person: &Person) -> Vec<&VisitedPlace> {
    to_ordered(&person.visited_places)
}

pub fn trips(person: &Person) -> Vec<&Trip> {
    to_ordered(&person.trips)
}

pub fn segments(trip: &Trip) -> Vec<&Segment> {
    to_ordered(&trip.segments)
}

/// The visited place a trip starts from.
pub fn origin<'a>(trip: &Trip, person: &'a Person) -> Option<&'a VisitedPlace> {
    trip.origin_visited_place_uuid
        .as_deref()
        .and_then(|id| person.visited_places.get(id))
}

/// The visited place a trip ends at.
pub fn destination<'a>(trip: &Trip, person: &'a Person) -> Option<&'a VisitedPlace> {
    trip.destination_visited_place_uuid
        .as_deref()
        .and_then(|id| person.visited_places.get(id))
}
