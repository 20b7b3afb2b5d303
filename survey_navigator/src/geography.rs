use log::debug;
use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;

use crate::config::activities;
use crate::interview::{destination, origin, Interview};
use crate::records::{IsBlank, Person, Trip, VisitedPlace};

/// The geometry operations the navigator needs. They are provided by the
/// host, the navigator does not compute geometry itself.
pub trait GeoPrimitives {
    /// Distance in meters between two GeoJSON geometries.
    fn distance_meters(&self, from: &JSValue, to: &JSValue) -> f64;

    /// Whether two GeoJSON line features intersect.
    fn lines_intersect(&self, line: &JSValue, other: &JSValue) -> bool;
}

/// The location of a visited place, as a GeoJSON feature.
///
/// Home visits are located at the household home. Visits to the usual work
/// or school place are located at the person's usual place. When the usual
/// place has no location, it may belong to another member of the household:
/// the owner of the visited place is looked up once and the resolution is
/// retried with that person.
pub fn geography(place: &VisitedPlace, person: &Person, interview: &Interview) -> Option<JSValue> {
    resolve_geography(place, person, interview, false)
}

fn resolve_geography(
    place: &VisitedPlace,
    person: &Person,
    interview: &Interview,
    recursive: bool,
) -> Option<JSValue> {
    if place.activity_category.as_deref() == Some(activities::HOME) {
        return interview.home().and_then(|h| h.geography.clone());
    }
    let usual_place = if place.has_activity(activities::WORK_USUAL) {
        Some(&person.usual_work_place)
    } else if place.has_activity(activities::SCHOOL_USUAL) {
        Some(&person.usual_school_place)
    } else {
        None
    };
    let usual_place = match usual_place {
        Some(u) => u,
        None => return place.geography.clone(),
    };
    let geojson = usual_place
        .as_ref()
        .and_then(|u| u.geography.clone())
        .or_else(|| place.geography.clone());
    if geojson.is_blank() && !recursive {
        debug!(
            "geography: no usual place location for {}, looking for its owner",
            place.uuid
        );
        return match interview.visited_place_and_person_by_id(&place.uuid) {
            Some((owner, _)) => resolve_geography(place, owner, interview, true),
            None => None,
        };
    }
    geojson
}

pub fn origin_geography(trip: &Trip, person: &Person, interview: &Interview) -> Option<JSValue> {
    origin(trip, person).and_then(|o| geography(o, person, interview))
}

pub fn destination_geography(
    trip: &Trip,
    person: &Person,
    interview: &Interview,
) -> Option<JSValue> {
    destination(trip, person).and_then(|d| geography(d, person, interview))
}

fn is_feature(v: &JSValue) -> bool {
    v.get("type").and_then(|t| t.as_str()) == Some("Feature")
        && v.get("geometry").map(|g| g.is_object()).unwrap_or(false)
}

/// Straight-line distance between the origin and the destination of a trip.
pub fn bird_distance_meters(
    trip: &Trip,
    person: &Person,
    interview: &Interview,
    geo: &dyn GeoPrimitives,
) -> Option<f64> {
    let o = origin_geography(trip, person, interview)?;
    let d = destination_geography(trip, person, interview)?;
    if !is_feature(&o) || !is_feature(&d) {
        return None;
    }
    Some(geo.distance_meters(&o["geometry"], &d["geometry"]))
}

/// Straight-line speed of a trip, when both its distance and a positive
/// duration are known.
pub fn bird_speed_mps(
    trip: &Trip,
    person: &Person,
    interview: &Interview,
    geo: &dyn GeoPrimitives,
) -> Option<f64> {
    let distance = bird_distance_meters(trip, person, interview, geo)?;
    let duration = duration_sec(trip, person)?;
    if duration > 0 && distance >= 0.0 {
        Some(distance / duration as f64)
    } else {
        None
    }
}

/// Whether the straight line between the origin and the destination of a
/// trip crosses `line`.
pub fn trip_crosses_line(
    trip: &Trip,
    person: &Person,
    interview: &Interview,
    line: &JSValue,
    geo: &dyn GeoPrimitives,
) -> bool {
    let coordinates = |g: Option<JSValue>| {
        g.filter(|g| !g.is_blank())
            .and_then(|g| g.pointer("/geometry/coordinates").cloned())
    };
    let o = coordinates(origin_geography(trip, person, interview));
    let d = coordinates(destination_geography(trip, person, interview));
    match (o, d) {
        (Some(o), Some(d)) => {
            let trip_line = json!({
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "LineString", "coordinates": [o, d]},
            });
            geo.lines_intersect(line, &trip_line)
        }
        _ => false,
    }
}

// ******** Trip timing *********

/// Departure time from the origin, in seconds since midnight.
pub fn start_at(trip: &Trip, person: &Person) -> Option<i64> {
    origin(trip, person).and_then(|o| o.departure_time)
}

/// Arrival time at the destination, in seconds since midnight.
pub fn end_at(trip: &Trip, person: &Person) -> Option<i64> {
    destination(trip, person).and_then(|d| d.arrival_time)
}

/// `None` when a time is missing or the difference does not fit.
pub fn duration_sec(trip: &Trip, person: &Person) -> Option<i64> {
    end_at(trip, person)?.checked_sub(start_at(trip, person)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct HourMinute {
    pub hour: Option<i64>,
    pub minute: Option<i64>,
}

/// Splits a duration in whole hours and the remaining rounded minutes.
pub fn duration_with_hour_from_seconds(duration_seconds: Option<f64>) -> HourMinute {
    match duration_seconds.filter(|s| s.is_finite()) {
        None => HourMinute::default(),
        Some(s) => {
            let hour = (s / 3600.0).floor() as i64;
            // Halves round up.
            let minute = (s / 60.0 + 0.5).floor() as i64 - hour * 60;
            HourMinute {
                hour: Some(hour),
                minute: Some(minute),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Planar geometry on `[x, y]` points, in meters.
    pub(crate) struct PlanarGeo;

    fn xy(v: &JSValue) -> (f64, f64) {
        let c = &v["coordinates"];
        (c[0].as_f64().unwrap_or(0.0), c[1].as_f64().unwrap_or(0.0))
    }

    impl GeoPrimitives for PlanarGeo {
        fn distance_meters(&self, from: &JSValue, to: &JSValue) -> f64 {
            let (x1, y1) = xy(from);
            let (x2, y2) = xy(to);
            ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
        }

        // Only checks whether the second line crosses the vertical line
        // x = first coordinate of the first line.
        fn lines_intersect(&self, line: &JSValue, other: &JSValue) -> bool {
            let x = line["geometry"]["coordinates"][0][0].as_f64().unwrap_or(0.0);
            let c = &other["geometry"]["coordinates"];
            let x1 = c[0][0].as_f64().unwrap_or(0.0);
            let x2 = c[1][0].as_f64().unwrap_or(0.0);
            (x1 - x) * (x2 - x) <= 0.0
        }
    }

    pub(crate) fn point(x: f64, y: f64) -> JSValue {
        json!({"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [x, y]}})
    }

    fn interview() -> Interview {
        Interview::from_responses(json!({
            "home": {"geography": point(0.0, 0.0)},
            "household": {"persons": {
                "p1": {
                    "_uuid": "p1",
                    "usualWorkPlace": {"geography": point(300.0, 400.0)},
                    "visitedPlaces": {
                        "h": {"_sequence": 1, "activityCategory": "home", "activity": "home", "departureTime": 28800},
                        "w": {"_sequence": 2, "activity": "workUsual", "arrivalTime": 30600, "departureTime": 61200},
                        "s": {"_sequence": 3, "activity": "schoolUsual", "arrivalTime": 63000},
                        "o": {"_sequence": 4, "activity": "shopping", "geography": point(10.0, 0.0)},
                    },
                    "trips": {
                        "t1": {"_sequence": 1, "_originVisitedPlaceUuid": "h", "_destinationVisitedPlaceUuid": "w"},
                        "t2": {"_sequence": 2, "_originVisitedPlaceUuid": "w", "_destinationVisitedPlaceUuid": "s"},
                        "t3": {"_sequence": 3, "_originVisitedPlaceUuid": "s", "_destinationVisitedPlaceUuid": "missing"},
                    },
                },
                "p2": {
                    "_uuid": "p2",
                    "visitedPlaces": {
                        "w2": {"_sequence": 1, "activity": "workUsual"},
                    },
                },
            }},
        }))
        .unwrap()
    }

    #[test]
    fn geography_rules() {
        let interview = interview();
        let p1 = interview.person("p1").unwrap();
        let p2 = interview.person("p2").unwrap();
        let vps = &p1.visited_places;
        assert_eq!(geography(&vps["h"], p1, &interview), Some(point(0.0, 0.0)));
        assert_eq!(geography(&vps["w"], p1, &interview), Some(point(300.0, 400.0)));
        assert_eq!(geography(&vps["o"], p1, &interview), Some(point(10.0, 0.0)));
        // No usual school place anywhere: one lookup, then nothing.
        assert_eq!(geography(&vps["s"], p1, &interview), None);
        // Asked with the wrong person, the owner's usual place is used.
        assert_eq!(geography(&vps["w"], p2, &interview), Some(point(300.0, 400.0)));
        let w2 = &p2.visited_places["w2"];
        assert_eq!(geography(w2, p2, &interview), None);
    }

    #[test]
    fn distances_and_speed() {
        let interview = interview();
        let p1 = interview.person("p1").unwrap();
        let t1 = &p1.trips["t1"];
        assert_eq!(
            bird_distance_meters(t1, p1, &interview, &PlanarGeo),
            Some(500.0)
        );
        assert_eq!(duration_sec(t1, p1), Some(1800));
        assert_eq!(bird_speed_mps(t1, p1, &interview, &PlanarGeo), Some(500.0 / 1800.0));
        let t2 = &p1.trips["t2"];
        assert_eq!(bird_distance_meters(t2, p1, &interview, &PlanarGeo), None);
        assert_eq!(duration_sec(&p1.trips["t3"], p1), None);
        assert_eq!(start_at(t2, p1), Some(61200));
        assert_eq!(end_at(t2, p1), Some(63000));
    }

    #[test]
    fn duration_out_of_range() {
        let interview = Interview::from_responses(json!({"household": {"persons": {"p1": {
            "visitedPlaces": {
                "a": {"_sequence": 1, "departureTime": i64::MIN},
                "b": {"_sequence": 2, "arrivalTime": i64::MAX},
            },
            "trips": {"t": {"_sequence": 1, "_originVisitedPlaceUuid": "a",
                            "_destinationVisitedPlaceUuid": "b"}},
        }}}}))
        .unwrap();
        let p1 = interview.person("p1").unwrap();
        assert_eq!(start_at(&p1.trips["t"], p1), Some(i64::MIN));
        assert_eq!(duration_sec(&p1.trips["t"], p1), None);
    }

    #[test]
    fn crossing_lines() {
        let interview = interview();
        let p1 = interview.person("p1").unwrap();
        let t1 = &p1.trips["t1"];
        let line = |x: f64| {
            json!({"type": "Feature", "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[x, -1000.0], [x, 1000.0]]}})
        };
        assert!(trip_crosses_line(t1, p1, &interview, &line(100.0), &PlanarGeo));
        assert!(!trip_crosses_line(t1, p1, &interview, &line(-100.0), &PlanarGeo));
        assert!(!trip_crosses_line(&p1.trips["t2"], p1, &interview, &line(100.0), &PlanarGeo));
    }

    #[test]
    fn hours_and_minutes() {
        assert_eq!(
            duration_with_hour_from_seconds(Some(3900.0)),
            HourMinute { hour: Some(1), minute: Some(5) }
        );
        assert_eq!(
            duration_with_hour_from_seconds(Some(90.0)),
            HourMinute { hour: Some(0), minute: Some(2) }
        );
        assert_eq!(
            duration_with_hour_from_seconds(Some(7170.0)),
            HourMinute { hour: Some(1), minute: Some(60) }
        );
        assert_eq!(duration_with_hour_from_seconds(None), HourMinute::default());
        assert_eq!(
            duration_with_hour_from_seconds(Some(f64::NAN)),
            HourMinute::default()
        );
    }
}
