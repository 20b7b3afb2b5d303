//! Section completion and next-record selection.
//!
//! The predicates here decide whether a section of the questionnaire can be
//! left, and which visited place or trip should be presented next. They
//! never fail on missing data; they only fail when a person who is known to
//! have an age turns out not to have a readable one.

use log::{debug, info};
use serde::Serialize;
use serde_json::Value as JSValue;

use crate::age::{has_age, is_at_least, is_known_younger_than};
use crate::config::{activities, AgeError, NextPlaceCategory, SurveyConfig};
use crate::geography::geography;
use crate::interview::{trips, visited_places, Interview};
use crate::path::ResponsePath;
use crate::records::*;

/// Below this age, a person has no profile, trips or travel behavior
/// sections.
pub const TRIPS_MINIMUM_AGE: i64 = 5;

/// From this age, a person is asked about a driving licence.
pub const DRIVING_LICENSE_MINIMUM_AGE: i64 = 16;

/// JavaScript-like truthiness of a stored answer.
pub(crate) fn is_truthy(v: &Option<JSValue>) -> bool {
    match v {
        None | Some(JSValue::Null) => false,
        Some(JSValue::Bool(b)) => *b,
        Some(JSValue::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(JSValue::String(s)) => !s.is_empty(),
        Some(JSValue::Array(_)) | Some(JSValue::Object(_)) => true,
    }
}

// ********* Next record selection ***********

/// The first visited place that still needs answers, in the given order.
///
/// A place needs answers when any of these holds:
///  1. its activity or activity category is missing
///  2. it has the highest sequence and the respondent did not stay there
///     until the next day
///  3. it is not the first place and has no arrival time
///  4. it is the last place of the list and has no next place category
///  5. it has no location and its activity requires one
pub fn select_next_visited_place_id<'a>(
    visited_places: &[&'a VisitedPlace],
    person: &Person,
    interview: &Interview,
) -> Option<&'a str> {
    let last_sequence = visited_places.iter().filter_map(|vp| vp.sequence).max();
    let stayed = NextPlaceCategory::StayedThereUntilTheNextDay.as_str();
    for (idx, vp) in visited_places.iter().enumerate() {
        let is_last_in_list = idx + 1 == visited_places.len();
        let needs_answers = vp.activity_category.is_blank()
            || vp.activity.is_blank()
            || (vp.sequence.is_some()
                && vp.sequence == last_sequence
                && vp.next_place_category.as_deref() != Some(stayed))
            || (vp.arrival_time.is_none() && vp.sequence.map(|s| s > 1).unwrap_or(false))
            || (vp.next_place_category.is_blank() && is_last_in_list)
            || (!activities::WITHOUT_LOCATION.contains(&vp.activity.as_deref().unwrap_or(""))
                && geography(vp, person, interview).is_blank());
        if needs_answers {
            debug!("select_next_visited_place_id: {} needs answers", vp.uuid);
            return Some(vp.uuid.as_str());
        }
    }
    None
}

/// The first trip that still needs its modes.
///
/// Trips leaving a place that needs no location (work on the road, leisure
/// stroll) are skipped.
pub fn select_next_trip_id<'a>(person: &Person, trips: &[&'a Trip]) -> Option<&'a str> {
    for trip in trips.iter() {
        let origin = trip
            .origin_visited_place_uuid
            .as_deref()
            .and_then(|id| person.visited_places.get(id));
        if let Some(o) = origin {
            if activities::WITHOUT_LOCATION.contains(&o.activity.as_deref().unwrap_or("")) {
                continue;
            }
        }
        if trip.segments.is_empty() || trip.segments.values().any(|s| s.mode.is_blank()) {
            debug!("select_next_trip_id: {} needs answers", trip.uuid);
            return Some(trip.uuid.as_str());
        }
    }
    None
}

// ********* Section predicates ***********

/// The household size, the number of cars and the home location are known.
pub fn home_section_complete(interview: &Interview) -> bool {
    let household = match interview.household() {
        Some(h) => h,
        None => return false,
    };
    let home_coordinates =
        interview.response(&ResponsePath::parse("home.geography.geometry.coordinates"));
    !(household.size.is_blank() || household.car_number.is_blank() || home_coordinates.is_blank())
}

/// Age, then gender from 5, nickname in households of more than one person
/// and driving licence from 16.
pub fn basic_info_for_person_complete(
    person: &Person,
    household_size: Option<i64>,
) -> Result<bool, AgeError> {
    if !has_age(person) {
        return Ok(false);
    }
    if person.gender.is_blank() && is_at_least(person, TRIPS_MINIMUM_AGE)? {
        return Ok(false);
    }
    if household_size.map(|s| s > 1).unwrap_or(false) && person.nickname.is_blank() {
        return Ok(false);
    }
    if person.driving_license_owner.is_blank() && is_at_least(person, DRIVING_LICENSE_MINIMUM_AGE)? {
        return Ok(false);
    }
    Ok(true)
}

fn household_size(interview: &Interview) -> Option<i64> {
    interview
        .household()
        .and_then(|h| h.size.as_ref())
        .and_then(|s| s.as_i64())
}

/// The home section is complete, every declared person exists and has its
/// basic information.
pub fn household_members_section_complete(interview: &Interview) -> Result<bool, AgeError> {
    if !home_section_complete(interview) {
        return Ok(false);
    }
    let size = household_size(interview);
    if size != Some(interview.count_persons() as i64) {
        debug!(
            "household_members_section_complete: declared size {:?}, {} persons",
            size,
            interview.count_persons()
        );
        return Ok(false);
    }
    for person in interview.persons().values() {
        if !basic_info_for_person_complete(person, size)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn profile_info_for_person_complete(person: &Person) -> Result<bool, AgeError> {
    if !has_age(person) {
        return Ok(false);
    }
    if !is_at_least(person, TRIPS_MINIMUM_AGE)? {
        return Ok(true);
    }
    let profile = person
        .completed_sections
        .as_ref()
        .and_then(|c| c.profile.clone());
    Ok(is_truthy(&profile) || (!person.is_worker() && !person.is_student()))
}

pub fn trips_intro_for_person_complete(person: &Person) -> Result<bool, AgeError> {
    if is_known_younger_than(person, TRIPS_MINIMUM_AGE)? {
        return Ok(true);
    }
    if !person.short_trip_section_did_trip_on_trips_date.is_blank() {
        return Ok(true);
    }
    let trips_intro = person
        .completed_sections
        .as_ref()
        .and_then(|c| c.trips_intro.clone());
    Ok(is_truthy(&trips_intro))
}

/// At least two visited places, none of which needs answers.
pub fn visited_places_for_person_complete(
    person: &Person,
    interview: &Interview,
) -> Result<bool, AgeError> {
    if is_known_younger_than(person, TRIPS_MINIMUM_AGE)? || person.did_no_trips() {
        return Ok(true);
    }
    let vps = visited_places(person);
    Ok(vps.len() >= 2 && select_next_visited_place_id(&vps, person, interview).is_none())
}

/// At least one trip, none of which needs answers.
pub fn trips_for_person_complete(person: &Person) -> Result<bool, AgeError> {
    if is_known_younger_than(person, TRIPS_MINIMUM_AGE)? || person.did_no_trips() {
        return Ok(true);
    }
    if !person.short_trip_section_did_trip_on_trips_date.is_blank() {
        return Ok(true);
    }
    let ts = trips(person);
    Ok(!ts.is_empty() && select_next_trip_id(person, &ts).is_none())
}

pub fn travel_behavior_for_person_complete(person: &Person) -> Result<bool, AgeError> {
    if is_known_younger_than(person, TRIPS_MINIMUM_AGE)?
        || (!person.is_worker() && !person.is_student())
    {
        return Ok(true);
    }
    let travel_behavior = person
        .completed_sections
        .as_ref()
        .and_then(|c| c.travel_behavior.as_ref());
    Ok(travel_behavior == Some(&JSValue::Bool(true)))
}

pub fn all_persons_profiles_complete(interview: &Interview) -> Result<bool, AgeError> {
    household_members_section_complete(interview)
}

/// Trips and travel behavior are complete for every interviewed person.
///
/// In single-person interviews only the active person is checked.
pub fn all_persons_trips_and_travel_behavior_complete(
    interview: &Interview,
    config: &SurveyConfig,
) -> Result<bool, AgeError> {
    if !household_members_section_complete(interview)? {
        return Ok(false);
    }
    let persons: Vec<&Person> = if interview.is_single_person_interview(config) {
        match interview.active_person() {
            Some(p) => vec![p],
            None => return Ok(false),
        }
    } else {
        interview.persons().values().collect()
    };
    for person in persons {
        if !travel_behavior_for_person_complete(person)? || !trips_for_person_complete(person)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// ********* Completion report ***********

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonCompletion {
    #[serde(rename = "personId")]
    pub person_id: String,
    #[serde(rename = "basicInfo")]
    pub basic_info: bool,
    pub profile: bool,
    #[serde(rename = "tripsIntro")]
    pub trips_intro: bool,
    #[serde(rename = "visitedPlaces")]
    pub visited_places: bool,
    pub trips: bool,
    #[serde(rename = "travelBehavior")]
    pub travel_behavior: bool,
    #[serde(rename = "nextVisitedPlaceId")]
    pub next_visited_place_id: Option<String>,
    #[serde(rename = "nextTripId")]
    pub next_trip_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewCompletion {
    pub home: bool,
    #[serde(rename = "householdMembers")]
    pub household_members: bool,
    #[serde(rename = "allPersonsProfiles")]
    pub all_persons_profiles: bool,
    #[serde(rename = "allPersonsTripsAndTravelBehavior")]
    pub all_persons_trips_and_travel_behavior: bool,
    pub persons: Vec<PersonCompletion>,
}

pub fn person_completion(
    person: &Person,
    interview: &Interview,
) -> Result<PersonCompletion, AgeError> {
    let vps = visited_places(person);
    let ts = trips(person);
    Ok(PersonCompletion {
        person_id: person.uuid.clone(),
        basic_info: basic_info_for_person_complete(person, household_size(interview))?,
        profile: profile_info_for_person_complete(person)?,
        trips_intro: trips_intro_for_person_complete(person)?,
        visited_places: visited_places_for_person_complete(person, interview)?,
        trips: trips_for_person_complete(person)?,
        travel_behavior: travel_behavior_for_person_complete(person)?,
        next_visited_place_id: select_next_visited_place_id(&vps, person, interview)
            .map(|s| s.to_string()),
        next_trip_id: select_next_trip_id(person, &ts).map(|s| s.to_string()),
    })
}

/// Evaluates every section of the interview, persons in sequence order.
pub fn evaluate(interview: &Interview, config: &SurveyConfig) -> Result<InterviewCompletion, AgeError> {
    info!("evaluate: {} persons", interview.count_persons());
    let persons = interview
        .persons_ordered()
        .into_iter()
        .map(|p| person_completion(p, interview))
        .collect::<Result<Vec<_>, AgeError>>()?;
    Ok(InterviewCompletion {
        home: home_section_complete(interview),
        household_members: household_members_section_complete(interview)?,
        all_persons_profiles: all_persons_profiles_complete(interview)?,
        all_persons_trips_and_travel_behavior: all_persons_trips_and_travel_behavior_complete(
            interview, config,
        )?,
        persons,
    })
}
