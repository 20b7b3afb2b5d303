// End-to-end editing scenarios: a snapshot is loaded, the navigator computes
// a batch, the batch is applied like a host would, and the next snapshot is
// checked.

use serde_json::{json, Value as JSValue};
use std::cmp::Ordering;

use survey_navigator::age::{age_compare, has_age};
use survey_navigator::completion::{evaluate, select_next_visited_place_id};
use survey_navigator::consistency::*;
use survey_navigator::interview::{segments, trips, visited_places};
use survey_navigator::validation::*;
use survey_navigator::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn point(x: f64, y: f64) -> JSValue {
    json!({"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [x, y]}})
}

fn person(age: JSValue) -> Person {
    serde_json::from_value(json!({ "_uuid": "p", "age": age })).unwrap()
}

fn person_with_group(group: &str) -> Person {
    serde_json::from_value(json!({ "_uuid": "p", "ageGroup": group })).unwrap()
}

#[test]
fn age_boundaries() {
    init();
    assert_eq!(age_compare(&person(json!(5)), 5).unwrap(), Ordering::Equal);
    assert_eq!(age_compare(&person_with_group("5-9"), 5).unwrap(), Ordering::Equal);
    assert_eq!(age_compare(&person_with_group("5-9"), 4).unwrap(), Ordering::Greater);
    assert_eq!(age_compare(&person_with_group("100+"), 150).unwrap(), Ordering::Less);
    assert!(!has_age(&Person::default()));
    assert!(age_compare(&Person::default(), 5).is_err());
}

#[test]
fn next_place_with_blank_activity() {
    init();
    let interview = Interview::from_responses(json!({
        "_activePersonId": "p1",
        "home": {"geography": point(0.0, 0.0)},
        "household": {"persons": {"p1": {"_sequence": 1, "age": 30, "visitedPlaces": {
            "v1": {"_sequence": 1, "activity": "home", "activityCategory": "home", "departureTime": 28800},
            "v2": {"_sequence": 2, "activityCategory": "work", "activity": "", "arrivalTime": 32400},
        }}}},
    }))
    .unwrap();
    let p1 = interview.active_person().unwrap();
    let vps = visited_places(p1);
    assert_eq!(select_next_visited_place_id(&vps, p1, &interview), Some("v2"));
}

fn day_with_two_trips() -> Interview {
    Interview::from_responses(json!({
        "_activePersonId": "p1",
        "accessCode": "1234-5678",
        "home": {"geography": point(0.0, 0.0)},
        "household": {"size": 1, "carNumber": 0, "persons": {"p1": {
            "_sequence": 1, "age": 35, "gender": "female", "drivingLicenseOwner": "no",
            "personDidTrips": "yes",
            "visitedPlaces": {
                "home1": {"_sequence": 1, "activity": "home", "activityCategory": "home",
                          "departureTime": 28800, "nextPlaceCategory": "visitedAnotherPlace"},
                "work": {"_sequence": 2, "activity": "work", "activityCategory": "work",
                         "arrivalTime": 30600, "departureTime": 61200,
                         "nextPlaceCategory": "wentBackHome", "geography": point(500.0, 0.0)},
                "home2": {"_sequence": 3, "activity": "home", "activityCategory": "home",
                          "arrivalTime": 63000, "nextPlaceCategory": "stayedThereUntilTheNextDay"},
            },
            "trips": {
                "t1": {"_sequence": 1, "_originVisitedPlaceUuid": "home1", "_destinationVisitedPlaceUuid": "work",
                       "segments": {
                           "s1": {"_sequence": 1, "mode": "walk"},
                           "s2": {"_sequence": 2, "mode": "transitSubway"},
                       }},
                "t2": {"_sequence": 2, "_originVisitedPlaceUuid": "work", "_destinationVisitedPlaceUuid": "home2",
                       "segments": {"s3": {"_sequence": 1, "mode": "bicycle"}}},
            },
        }}},
    }))
    .unwrap()
}

#[test]
fn complete_day_needs_nothing() {
    init();
    let interview = day_with_two_trips();
    let report = evaluate(&interview, &SurveyConfig::DEFAULT_CONFIG).unwrap();
    assert!(report.home);
    assert!(report.household_members);
    assert!(report.persons[0].visited_places);
    assert!(report.persons[0].trips);
    assert_eq!(report.persons[0].next_visited_place_id, None);
    assert_eq!(report.persons[0].next_trip_id, None);

    let p1 = interview.active_person().unwrap();
    let batch = update_visited_places(p1, &visited_places(p1), &interview, None, false);
    assert!(batch.is_empty());
}

#[test]
fn merge_on_delete() {
    init();
    let interview = day_with_two_trips();
    let work = ResponsePath::person("p1").visited_place("work");
    let plan = plan_visited_place_merge(&interview, &work).unwrap();
    assert_eq!(plan.paths_to_remove, vec![work]);

    let removed = interview.without(&plan.paths_to_remove).unwrap();
    let batch = repair_after_visited_place_merge(&removed);
    let repaired = removed.updated(&batch).unwrap();

    let p1 = repaired.active_person().unwrap();
    let ts = trips(p1);
    assert_eq!(ts.len(), 1);
    let trip = ts[0];
    assert_eq!(trip.origin_visited_place_uuid.as_deref(), Some("home1"));
    assert_eq!(trip.destination_visited_place_uuid.as_deref(), Some("home2"));
    let segs: Vec<(&str, Option<i64>, Option<&str>)> = segments(trip)
        .iter()
        .map(|s| (s.uuid.as_str(), s.sequence, s.mode.as_deref()))
        .collect();
    assert_eq!(
        segs,
        vec![
            ("s1", Some(1), Some("walk")),
            ("s2", Some(2), Some("transitSubway")),
            ("s3", Some(3), Some("bicycle")),
        ]
    );
}

#[test]
fn delete_repairs_next_place_categories() {
    init();
    let interview = day_with_two_trips();
    let plan =
        plan_visited_place_deletion(&interview, &ResponsePath::person("p1").visited_place("work")).unwrap();
    // Both neighbours are home: the second one goes too.
    assert_eq!(plan.paths_to_remove.len(), 2);
    let removed = interview.without(&plan.paths_to_remove).unwrap();
    let batch = repair_after_visited_place_deletion(&removed, &plan);
    let repaired = removed.updated(&batch).unwrap();
    let p1 = repaired.active_person().unwrap();
    let vps = visited_places(p1);
    assert_eq!(vps.len(), 1);
    // The only place left is the last one.
    assert_eq!(vps[0].next_place_category, None);
    assert_eq!(
        repaired.response(&ResponsePath::parse("_activeVisitedPlaceId")),
        Some(&json!("home1"))
    );
}

#[test]
fn shortcut_promotion_before_removal() {
    init();
    let interview = Interview::from_responses(json!({
        "_activePersonId": "p1",
        "household": {"persons": {
            "p1": {"_sequence": 1, "visitedPlaces": {
                "h": {"_sequence": 1, "activity": "home", "activityCategory": "home"},
                "a": {"_sequence": 2, "activity": "work", "name": "Office", "geography": point(3.0, 4.0)},
                "s": {"_sequence": 3, "activity": "shopping"},
            }},
            "p2": {"_sequence": 2, "visitedPlaces": {
                "b": {"_sequence": 1, "activity": "work",
                      "alreadyVisitedBySelfOrAnotherHouseholdMember": "yes",
                      "shortcut": "household.persons.p1.visitedPlaces.a"},
            }},
        }},
    }))
    .unwrap();
    let path_to_a = ResponsePath::person("p1").visited_place("a");
    let path_to_b = ResponsePath::person("p2").visited_place("b");
    let plan = plan_visited_place_deletion(&interview, &path_to_a).unwrap();
    assert_eq!(plan.paths_to_remove, vec![path_to_a]);
    assert_eq!(plan.pre_removal.value(&path_to_b.join("name")), Some(&json!("Office")));
    assert_eq!(
        plan.pre_removal.value(&path_to_b.join("geography")),
        Some(&point(3.0, 4.0))
    );
    assert!(plan
        .pre_removal
        .unset_paths
        .contains(&path_to_b.join("shortcut").response_key()));

    let removed = interview.without(&plan.paths_to_remove).unwrap();
    let repaired = removed
        .updated(&repair_after_visited_place_deletion(&removed, &plan))
        .unwrap();
    let b = &repaired.person("p2").unwrap().visited_places["b"];
    assert_eq!(b.name.as_deref(), Some("Office"));
    assert_eq!(b.shortcut, None);
    assert_eq!(b.geography, Some(point(3.0, 4.0)));
}

#[test]
fn dangling_references_are_tolerated() {
    init();
    let interview = Interview::from_responses(json!({
        "household": {"persons": {"p1": {"_sequence": 1, "visitedPlaces": {
            "x": {"_sequence": 1, "shortcut": "household.persons.gone.visitedPlaces.y",
                  "alreadyVisitedBySelfOrAnotherHouseholdMember": "yes"},
        }, "trips": {
            "t": {"_sequence": 1, "_originVisitedPlaceUuid": "nowhere"},
        }}}},
    }))
    .unwrap();
    assert!(interview.active_person().is_none());
    assert!(interview.shortcut_visited_place("y").is_none());
    let p1 = interview.person("p1").unwrap();
    assert!(interview::origin(&p1.trips["t"], p1).is_none());
    assert!(repair_after_visited_place_merge(&interview).is_empty());
    let t = |k: &str| k.to_string();
    assert_eq!(
        display::visited_place_name(&p1.visited_places["x"], t, &interview),
        "survey:placeGeneric 1"
    );
}

#[test]
fn validation_isolation() {
    init();
    let interview = day_with_two_trips();
    let ctx = InterviewContext::new(&interview, None);
    let validations = Validations::new()
        .add(
            "throws",
            ValidationRule::new(|c: &InterviewContext| {
                let p = c.persons.first().ok_or("no person")?;
                Ok(age_compare(&Person { uuid: p.uuid.clone(), ..Default::default() }, 5)?
                    == Ordering::Greater)
            }),
        )
        .add(
            "alwaysFalse",
            ValidationRule::new(|_: &InterviewContext| Ok(false)).message("en", "Always false"),
        );
    let res = validate_interview(&validations, &ctx);
    assert_eq!(res.errors, vec!["alwaysFalse"]);
    assert_eq!(res.audits.len(), 1);
}
