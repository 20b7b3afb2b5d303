// ********* Response records ***********

// Typed views over the plain response tree. Every record keeps the fields it
// does not know about in `other`, so a record written back to the tree does
// not lose anything.

use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

use crate::config::activities;

/// Blank values: absent, `null`, empty string, empty array or empty object.
/// Numbers and booleans are never blank.
pub trait IsBlank {
    fn is_blank(&self) -> bool;
}

impl IsBlank for JSValue {
    fn is_blank(&self) -> bool {
        match self {
            JSValue::Null => true,
            JSValue::String(s) => s.is_empty(),
            JSValue::Array(a) => a.is_empty(),
            JSValue::Object(m) => m.is_empty(),
            JSValue::Bool(_) | JSValue::Number(_) => false,
        }
    }
}

impl IsBlank for str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl IsBlank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsBlank for BTreeMap<K, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl IsBlank for JSMap<String, JSValue> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T: IsBlank + ?Sized> IsBlank for &T {
    fn is_blank(&self) -> bool {
        (**self).is_blank()
    }
}

impl<T: IsBlank> IsBlank for Option<T> {
    fn is_blank(&self) -> bool {
        match self {
            None => true,
            Some(x) => x.is_blank(),
        }
    }
}

/// The capability shared by every record kept in a `{uuid: record}` map.
pub trait Sequenced {
    fn uuid(&self) -> &str;
    /// The 1-based rank of the record among its siblings.
    fn sequence(&self) -> Option<i64>;
}

/// Records that can be read out of a `{uuid: record}` map.
pub(crate) trait Record: Sequenced + Default + DeserializeOwned {
    fn set_uuid(&mut self, uuid: &str);
}

// ******** Lenient field readers *********

/// Reads integers stored as numbers or numeric strings.
pub fn number_as_i64(v: &JSValue) -> Option<i64> {
    match v {
        JSValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        JSValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Option::<JSValue>::deserialize(d)?;
    Ok(v.as_ref().and_then(number_as_i64))
}

/// Reads a `{uuid: record}` map. `null` entries become empty records, and
/// records without a `_uuid` take the key of the map.
fn records_map<'de, D, T>(d: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Record,
{
    let raw = Option::<BTreeMap<String, JSValue>>::deserialize(d)?.unwrap_or_default();
    let mut res = BTreeMap::new();
    for (key, value) in raw {
        let mut record: T = if value.is_null() {
            T::default()
        } else {
            serde_json::from_value(value).map_err(D::Error::custom)?
        };
        if record.uuid().is_empty() {
            record.set_uuid(&key);
        }
        res.insert(key, record);
    }
    Ok(res)
}

/// `true` and `"yes"` are the affirmative answers of a yes/no question.
pub fn is_yes(v: &Option<JSValue>) -> bool {
    matches!(v, Some(JSValue::Bool(true))) || matches!(v, Some(JSValue::String(s)) if s == "yes")
}

macro_rules! sequenced_record {
    ($t:ty) => {
        impl Sequenced for $t {
            fn uuid(&self) -> &str {
                &self.uuid
            }
            fn sequence(&self) -> Option<i64> {
                self.sequence
            }
        }

        impl Record for $t {
            fn set_uuid(&mut self, uuid: &str) {
                self.uuid = uuid.to_string();
            }
        }
    };
}

// ******** Records *********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Responses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household: Option<Household>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Home>,
    #[serde(rename = "_activePersonId", skip_serializing_if = "Option::is_none")]
    pub active_person_id: Option<String>,
    #[serde(rename = "_activeVisitedPlaceId", skip_serializing_if = "Option::is_none")]
    pub active_visited_place_id: Option<String>,
    #[serde(rename = "_activeTripId", skip_serializing_if = "Option::is_none")]
    pub active_trip_id: Option<String>,
    #[serde(rename = "accessCode", skip_serializing_if = "Option::is_none")]
    pub access_code: Option<JSValue>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Home {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<JSValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "postalCode", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Household {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<JSValue>,
    #[serde(rename = "carNumber", skip_serializing_if = "Option::is_none")]
    pub car_number: Option<JSValue>,
    #[serde(default, deserialize_with = "records_map")]
    pub persons: BTreeMap<String, Person>,
    #[serde(
        rename = "atLeastOnePersonWithDisability",
        skip_serializing_if = "Option::is_none"
    )]
    pub at_least_one_person_with_disability: Option<JSValue>,
    #[serde(
        rename = "_shouldAskWorkCommutingQuestions",
        skip_serializing_if = "Option::is_none"
    )]
    pub should_ask_work_commuting_questions: Option<JSValue>,
    #[serde(
        rename = "_shouldAskSchoolCommutingQuestions",
        skip_serializing_if = "Option::is_none"
    )]
    pub should_ask_school_commuting_questions: Option<JSValue>,
    #[serde(
        rename = "_shouldAskAnyTripModesFrequencies",
        skip_serializing_if = "Option::is_none"
    )]
    pub should_ask_any_trip_modes_frequencies: Option<JSValue>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletedSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<JSValue>,
    #[serde(rename = "tripsIntro", skip_serializing_if = "Option::is_none")]
    pub trips_intro: Option<JSValue>,
    #[serde(rename = "travelBehavior", skip_serializing_if = "Option::is_none")]
    pub travel_behavior: Option<JSValue>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_uuid", default)]
    pub uuid: String,
    #[serde(
        rename = "_sequence",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<JSValue>,
    #[serde(rename = "ageGroup", skip_serializing_if = "Option::is_none")]
    pub age_group: Option<JSValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(rename = "schoolType", skip_serializing_if = "Option::is_none")]
    pub school_type: Option<String>,
    #[serde(rename = "drivingLicenseOwner", skip_serializing_if = "Option::is_none")]
    pub driving_license_owner: Option<String>,
    #[serde(rename = "usualWorkPlace", skip_serializing_if = "Option::is_none")]
    pub usual_work_place: Option<UsualPlace>,
    #[serde(rename = "usualSchoolPlace", skip_serializing_if = "Option::is_none")]
    pub usual_school_place: Option<UsualPlace>,
    #[serde(rename = "usualWorkPlaceName", skip_serializing_if = "Option::is_none")]
    pub usual_work_place_name: Option<String>,
    #[serde(rename = "usualSchoolPlaceName", skip_serializing_if = "Option::is_none")]
    pub usual_school_place_name: Option<String>,
    #[serde(rename = "personDidTrips", skip_serializing_if = "Option::is_none")]
    pub person_did_trips: Option<JSValue>,
    #[serde(
        rename = "shortTripSectionDidTripOnTripsDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub short_trip_section_did_trip_on_trips_date: Option<JSValue>,
    #[serde(
        rename = "whoWillAnswerForThisPerson",
        skip_serializing_if = "Option::is_none"
    )]
    pub who_will_answer_for_this_person: Option<String>,
    #[serde(rename = "hasDisability", skip_serializing_if = "Option::is_none")]
    pub has_disability: Option<String>,
    #[serde(rename = "carSharingMember", skip_serializing_if = "Option::is_none")]
    pub car_sharing_member: Option<String>,
    #[serde(
        rename = "usedBixiBikesharingServicesInLast6Months",
        skip_serializing_if = "Option::is_none"
    )]
    pub used_bikesharing: Option<String>,
    #[serde(
        rename = "studiesFromFixedLocation",
        skip_serializing_if = "Option::is_none"
    )]
    pub studies_from_fixed_location: Option<JSValue>,
    #[serde(rename = "visitedPlaces", default, deserialize_with = "records_map")]
    pub visited_places: BTreeMap<String, VisitedPlace>,
    #[serde(default, deserialize_with = "records_map")]
    pub trips: BTreeMap<String, Trip>,
    #[serde(rename = "_completedSections", skip_serializing_if = "Option::is_none")]
    pub completed_sections: Option<CompletedSections>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

impl Person {
    pub fn is_worker(&self) -> bool {
        matches!(
            self.occupation.as_deref(),
            Some("fullTimeWorker") | Some("partTimeWorker") | Some("workerAndStudent")
        )
    }

    pub fn is_full_time_worker(&self) -> bool {
        self.occupation.as_deref() == Some("fullTimeWorker")
    }

    pub fn is_part_time_worker(&self) -> bool {
        self.occupation.as_deref() == Some("partTimeWorker")
    }

    pub fn is_student(&self) -> bool {
        matches!(
            self.occupation.as_deref(),
            Some("fullTimeStudent") | Some("partTimeStudent") | Some("workerAndStudent")
        )
    }

    pub fn is_full_time_student(&self) -> bool {
        self.occupation.as_deref() == Some("fullTimeStudent")
    }

    pub fn is_part_time_student(&self) -> bool {
        self.occupation.as_deref() == Some("partTimeStudent")
    }

    /// A non-blank answer other than yes means the person made no trips.
    pub fn did_no_trips(&self) -> bool {
        !self.person_did_trips.is_blank() && !is_yes(&self.person_did_trips)
    }

    /// The usual work and school places, in that order.
    pub fn usual_places(&self) -> Vec<&UsualPlace> {
        self.usual_work_place
            .iter()
            .chain(self.usual_school_place.iter())
            .collect()
    }
}

/// A usual work or school place, attached to the person rather than to a
/// visit.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsualPlace {
    #[serde(rename = "_uuid", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<JSValue>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitedPlace {
    #[serde(rename = "_uuid", default)]
    pub uuid: String,
    #[serde(
        rename = "_sequence",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(rename = "activityCategory", skip_serializing_if = "Option::is_none")]
    pub activity_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Seconds since midnight.
    #[serde(
        rename = "arrivalTime",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub arrival_time: Option<i64>,
    /// Seconds since midnight.
    #[serde(
        rename = "departureTime",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub departure_time: Option<i64>,
    #[serde(rename = "nextPlaceCategory", skip_serializing_if = "Option::is_none")]
    pub next_place_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<JSValue>,
    /// Path of the visited place holding the canonical name and geography.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
    #[serde(
        rename = "alreadyVisitedBySelfOrAnotherHouseholdMember",
        skip_serializing_if = "Option::is_none"
    )]
    pub already_visited_by_self_or_another_household_member: Option<JSValue>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

impl VisitedPlace {
    pub fn is_home(&self) -> bool {
        self.activity_category.as_deref() == Some(activities::HOME)
            || self.activity.as_deref() == Some(activities::HOME)
    }

    pub fn has_activity(&self, activity: &str) -> bool {
        self.activity.as_deref() == Some(activity)
    }

    pub fn already_visited(&self) -> bool {
        is_yes(&self.already_visited_by_self_or_another_household_member)
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trip {
    #[serde(rename = "_uuid", default)]
    pub uuid: String,
    #[serde(
        rename = "_sequence",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<i64>,
    #[serde(
        rename = "_originVisitedPlaceUuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_visited_place_uuid: Option<String>,
    #[serde(
        rename = "_destinationVisitedPlaceUuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_visited_place_uuid: Option<String>,
    #[serde(default, deserialize_with = "records_map")]
    pub segments: BTreeMap<String, Segment>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "_uuid", default)]
    pub uuid: String,
    #[serde(
        rename = "_sequence",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(rename = "modePre", skip_serializing_if = "Option::is_none")]
    pub mode_pre: Option<String>,
    #[serde(flatten)]
    pub other: JSMap<String, JSValue>,
}

sequenced_record!(Person);
sequenced_record!(VisitedPlace);
sequenced_record!(Trip);
sequenced_record!(Segment);

// ******** Ordered collections *********

/// The records of a map, ascending by `_sequence`.
///
/// Records without a sequence come after all the others. Ties keep the
/// iteration order of the map.
pub fn to_ordered<T: Sequenced>(records: &BTreeMap<String, T>) -> Vec<&T> {
    let mut res: Vec<&T> = records.values().collect();
    res.sort_by_key(|r| (r.sequence().is_none(), r.sequence()));
    res
}

/// The record just before the one with the given uuid.
pub fn previous<'a, T: Sequenced>(uuid: &str, ordered: &[&'a T]) -> Option<&'a T> {
    let idx = ordered.iter().position(|r| r.uuid() == uuid)?;
    if idx == 0 {
        None
    } else {
        Some(ordered[idx - 1])
    }
}

/// The record just after the one with the given uuid.
pub fn next<'a, T: Sequenced>(uuid: &str, ordered: &[&'a T]) -> Option<&'a T> {
    let idx = ordered.iter().position(|r| r.uuid() == uuid)?;
    ordered.get(idx + 1).copied()
}

pub fn first<'a, T: Sequenced>(ordered: &[&'a T]) -> Option<&'a T> {
    ordered.first().copied()
}

pub fn last<'a, T: Sequenced>(ordered: &[&'a T]) -> Option<&'a T> {
    ordered.last().copied()
}

/// The n-th record, counting from 1 like `_sequence`.
pub fn nth<'a, T: Sequenced>(ordered: &[&'a T], n: usize) -> Option<&'a T> {
    if n == 0 {
        return None;
    }
    ordered.get(n - 1).copied()
}

// ******** Household aggregation *********

/// All the places of a household, flattened and grouped by person.
///
/// Visited places are ordered per person. Usual places hold at most the work
/// and the school place of each person.
#[derive(Debug, Clone, Default)]
pub struct HouseholdPlaces<'a> {
    pub visited_places: Vec<&'a VisitedPlace>,
    pub visited_places_by_person_id: BTreeMap<&'a str, Vec<&'a VisitedPlace>>,
    pub usual_places: Vec<&'a UsualPlace>,
    pub usual_places_by_person_id: BTreeMap<&'a str, Vec<&'a UsualPlace>>,
}

impl<'a> HouseholdPlaces<'a> {
    pub fn from_persons(persons: &'a BTreeMap<String, Person>) -> HouseholdPlaces<'a> {
        let mut res = HouseholdPlaces::default();
        for (person_id, person) in persons.iter() {
            let vps = to_ordered(&person.visited_places);
            res.visited_places.extend(vps.iter().copied());
            res.visited_places_by_person_id
                .insert(person_id.as_str(), vps);

            let ups = person.usual_places();
            res.usual_places.extend(ups.iter().copied());
            res.usual_places_by_person_id.insert(person_id.as_str(), ups);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn places(v: JSValue) -> BTreeMap<String, VisitedPlace> {
        let p: Person = serde_json::from_value(json!({ "visitedPlaces": v })).unwrap();
        p.visited_places
    }

    #[test]
    fn blank_values() {
        assert!(JSValue::Null.is_blank());
        assert!(json!("").is_blank());
        assert!(json!([]).is_blank());
        assert!(json!({}).is_blank());
        assert!(!json!(0).is_blank());
        assert!(!json!(false).is_blank());
        assert!(!json!(" ").is_blank());
        let none: Option<String> = None;
        assert!(none.is_blank());
        assert!(Some("".to_string()).is_blank());
        assert!(!Some("a".to_string()).is_blank());
    }

    #[test]
    fn records_keep_unknown_fields() {
        let v = json!({"_uuid": "s1", "_sequence": 2, "mode": "walk", "busLines": ["51"]});
        let s: Segment = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(s.sequence, Some(2));
        assert_eq!(s.other.get("busLines"), Some(&json!(["51"])));
        assert_eq!(serde_json::to_value(&s).unwrap(), v);
    }

    #[test]
    fn records_map_fills_uuid_and_tolerates_null() {
        let vps = places(json!({
            "a": {"_sequence": "1", "arrivalTime": 36000.4},
            "b": null,
        }));
        assert_eq!(vps["a"].uuid, "a");
        assert_eq!(vps["a"].sequence, Some(1));
        assert_eq!(vps["a"].arrival_time, Some(36000));
        assert_eq!(vps["b"].uuid, "b");
        assert_eq!(vps["b"].sequence, None);
    }

    #[test]
    fn ordering_and_lookups() {
        let vps = places(json!({
            "c": {"_sequence": 3},
            "x": {},
            "a": {"_sequence": 1},
            "b": {"_sequence": 2},
        }));
        let ordered = to_ordered(&vps);
        let ids: Vec<&str> = ordered.iter().map(|r| r.uuid()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "x"]);

        assert_eq!(previous("b", &ordered).map(|r| r.uuid()), Some("a"));
        assert_eq!(previous("a", &ordered), None);
        assert_eq!(next("c", &ordered).map(|r| r.uuid()), Some("x"));
        assert_eq!(next("x", &ordered), None);
        assert_eq!(next("missing", &ordered), None);
        assert_eq!(first(&ordered).map(|r| r.uuid()), Some("a"));
        assert_eq!(last(&ordered).map(|r| r.uuid()), Some("x"));
        assert_eq!(nth(&ordered, 2).map(|r| r.uuid()), Some("b"));
        assert_eq!(nth(&ordered, 0), None);
        assert_eq!(nth(&ordered, 5), None);
        let empty: Vec<&VisitedPlace> = vec![];
        assert_eq!(first(&empty), None);
        assert_eq!(last(&empty), None);
    }

    #[test]
    fn equal_sequences_keep_key_order() {
        let vps = places(json!({
            "b": {"_sequence": 1},
            "a": {"_sequence": 1},
        }));
        let ids: Vec<&str> = to_ordered(&vps).iter().map(|r| r.uuid()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn household_places_by_person() {
        let persons: BTreeMap<String, Person> = serde_json::from_value::<Household>(json!({
            "persons": {
                "p1": {
                    "_sequence": 1,
                    "usualWorkPlace": {"_uuid": "w1", "name": "Office"},
                    "visitedPlaces": {"v2": {"_sequence": 2}, "v1": {"_sequence": 1}},
                },
                "p2": {"_sequence": 2, "usualSchoolPlace": {"_uuid": "s1"}},
            }
        }))
        .unwrap()
        .persons;
        let hp = HouseholdPlaces::from_persons(&persons);
        let ids: Vec<&str> = hp.visited_places.iter().map(|v| v.uuid()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
        assert_eq!(hp.visited_places_by_person_id["p2"].len(), 0);
        assert_eq!(hp.usual_places.len(), 2);
        assert_eq!(
            hp.usual_places_by_person_id["p2"][0].uuid.as_deref(),
            Some("s1")
        );
    }

    #[test]
    fn person_roles() {
        let p: Person = serde_json::from_value(json!({"occupation": "workerAndStudent"})).unwrap();
        assert!(p.is_worker());
        assert!(p.is_student());
        assert!(!p.is_full_time_worker());
        let p: Person = serde_json::from_value(json!({"personDidTrips": "no"})).unwrap();
        assert!(p.did_no_trips());
        let p: Person = serde_json::from_value(json!({"personDidTrips": true})).unwrap();
        assert!(!p.did_no_trips());
        assert!(!Person::default().did_no_trips());
    }
}
