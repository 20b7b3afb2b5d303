use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_navigator::completion::evaluate;
use survey_navigator::consistency::*;
use survey_navigator::grouped::remove_grouped_objects;
use survey_navigator::interview::visited_places;
use survey_navigator::*;

use crate::args::{Args, Command};

#[derive(Debug, Snafu)]
pub enum NavError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the output"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Malformed interview"))]
    MalformedInterview { source: NavigatorError },
    #[snafu(display("Corrupted person data"))]
    CorruptedAge { source: AgeError },
    #[snafu(display("The interview does not have an active person"))]
    MissingActivePerson {},
    #[snafu(display("No visited place found at {path}"))]
    MissingVisitedPlace { path: String },
    #[snafu(display("Difference detected between the output and the reference output"))]
    ReferenceMismatch {},
}

pub type NavResult<T> = Result<T, NavError>;

// ********* Configuration ***********

/// The survey configuration, as written in the configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavConfig {
    #[serde(rename = "selfResponseMinimumAge")]
    pub self_response_minimum_age: Option<u32>,
    #[serde(rename = "interviewableMinimumAge")]
    pub interviewable_minimum_age: Option<u32>,
    #[serde(rename = "singlePersonInterview")]
    pub single_person_interview: Option<bool>,
}

impl NavConfig {
    pub fn survey_config(&self) -> SurveyConfig {
        let d = SurveyConfig::DEFAULT_CONFIG;
        SurveyConfig {
            self_response_minimum_age: self
                .self_response_minimum_age
                .unwrap_or(d.self_response_minimum_age),
            interviewable_minimum_age: self
                .interviewable_minimum_age
                .unwrap_or(d.interviewable_minimum_age),
            single_person_interview: self
                .single_person_interview
                .unwrap_or(d.single_person_interview),
        }
    }
}

fn read_json(path: &str) -> NavResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_json: {} bytes from {}", contents.len(), path);
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

pub fn parse_config(content: &str) -> NavResult<SurveyConfig> {
    let config: NavConfig = serde_json::from_str(content).context(ParsingJsonSnafu {
        path: "<config>".to_string(),
    })?;
    Ok(config.survey_config())
}

pub fn read_config(path: Option<&str>) -> NavResult<SurveyConfig> {
    match path {
        Some(p) => {
            let contents = fs::read_to_string(p).context(OpeningJsonSnafu { path: p })?;
            let config = parse_config(contents.as_str())?;
            info!("read_config: {:?}", config);
            Ok(config)
        }
        None => Ok(SurveyConfig::DEFAULT_CONFIG),
    }
}

pub fn read_interview(path: &str) -> NavResult<Interview> {
    let js = read_json(path)?;
    Interview::from_any(js).context(MalformedInterviewSnafu {})
}

// ********* Commands ***********

/// The completion of every section, and what to present next.
pub fn status_js(interview: &Interview, config: &SurveyConfig) -> NavResult<JSValue> {
    let completion = evaluate(interview, config).context(CorruptedAgeSnafu {})?;
    Ok(json!({
        "activePersonId": interview.active_person_id(),
        "singlePersonInterview": interview.is_single_person_interview(config),
        "completion": completion,
    }))
}

/// The repair of the visited places of the active person.
pub fn repair_js(interview: &Interview) -> NavResult<JSValue> {
    let person = interview
        .active_person()
        .context(MissingActivePersonSnafu {})?;
    let vps = visited_places(person);
    let batch = update_visited_places(person, &vps, interview, None, true);
    debug!("repair_js: {:?}", batch);
    Ok(json!({ "updates": batch }))
}

/// The removal renumbers the remaining places, so the repair is computed on
/// the renumbered snapshot and the batch carries both.
fn removal_js(interview: &Interview, plan: &RemovalPlan, merge: bool) -> NavResult<JSValue> {
    let mut batch = remove_grouped_objects(interview, &plan.paths_to_remove);
    let removed = interview
        .updated(&batch)
        .context(MalformedInterviewSnafu {})?;
    if merge {
        batch.merge(plan.pre_removal.clone());
        batch.merge(repair_after_visited_place_merge(&removed));
    } else {
        batch.merge(repair_after_visited_place_deletion(&removed, plan));
    }
    let paths: Vec<String> = plan.paths_to_remove.iter().map(|p| p.to_string()).collect();
    Ok(json!({
        "section": plan.section,
        "pathsToRemove": paths,
        "updates": batch,
    }))
}

pub fn delete_place_js(interview: &Interview, path: &str) -> NavResult<JSValue> {
    interview
        .active_person()
        .context(MissingActivePersonSnafu {})?;
    let plan = plan_visited_place_deletion(interview, &ResponsePath::parse(path))
        .context(MissingVisitedPlaceSnafu { path })?;
    info!("delete_place_js: removing {:?}", plan.paths_to_remove);
    removal_js(interview, &plan, false)
}

pub fn merge_place_js(interview: &Interview, path: &str) -> NavResult<JSValue> {
    interview
        .active_person()
        .context(MissingActivePersonSnafu {})?;
    let plan = plan_visited_place_merge(interview, &ResponsePath::parse(path))
        .context(MissingVisitedPlaceSnafu { path })?;
    info!("merge_place_js: removing {:?}", plan.paths_to_remove);
    removal_js(interview, &plan, true)
}

pub fn command_js(
    command: &Command,
    interview: &Interview,
    config: &SurveyConfig,
) -> NavResult<JSValue> {
    match command {
        Command::Status => status_js(interview, config),
        Command::Repair => repair_js(interview),
        Command::DeletePlace { path } => delete_place_js(interview, path),
        Command::MergePlace { path } => merge_place_js(interview, path),
    }
}

/// Prints the differences and fails when the output does not match the
/// reference.
pub fn check_reference(reference: &JSValue, pretty_output: &str) -> NavResult<()> {
    let pretty_ref = serde_json::to_string_pretty(reference).context(WritingJsonSnafu {})?;
    if pretty_ref != pretty_output {
        warn!("Found differences with the reference output");
        print_diff(pretty_ref.as_str(), pretty_output, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

pub fn run_command(args: &Args) -> NavResult<()> {
    let config = read_config(args.config.as_deref())?;
    let interview = read_interview(args.interview.as_str())?;
    info!(
        "run_command: {:?} on {} persons",
        args.command,
        interview.count_persons()
    );

    let result_js = command_js(&args.command, &interview, &config)?;
    let pretty_js = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") | Some("") => println!("{}", pretty_js),
        Some(p) => {
            fs::write(p, pretty_js.as_bytes()).context(WritingFileSnafu { path: p })?;
            info!("run_command: output written to {}", p);
        }
    }

    if let Some(ref_p) = args.reference.as_deref() {
        let reference = read_json(ref_p)?;
        check_reference(&reference, pretty_js.as_str())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn point(x: f64, y: f64) -> JSValue {
        json!({"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [x, y]}})
    }

    fn interview() -> Interview {
        Interview::from_any(json!({
            "id": 1,
            "responses": {
                "_activePersonId": "p1",
                "accessCode": "1234-5678",
                "home": {"geography": point(0.0, 0.0)},
                "household": {"size": 1, "carNumber": 1, "persons": {"p1": {
                    "_sequence": 1, "age": 40, "gender": "male", "drivingLicenseOwner": "yes",
                    "personDidTrips": "yes",
                    "visitedPlaces": {
                        "h1": {"_sequence": 1, "activity": "home", "activityCategory": "home",
                               "departureTime": 28800, "nextPlaceCategory": "visitedAnotherPlace"},
                        "s": {"_sequence": 2, "activity": "shopping", "activityCategory": "shopping",
                              "arrivalTime": 30000, "departureTime": 32000,
                              "nextPlaceCategory": "visitedAnotherPlace", "geography": point(1.0, 1.0)},
                        "h2": {"_sequence": 3, "activity": "home", "activityCategory": "home",
                               "arrivalTime": 33000},
                    },
                }}},
            },
        }))
        .unwrap()
    }

    #[test]
    fn config_keys_are_optional() {
        init();
        assert_eq!(parse_config("{}").unwrap(), SurveyConfig::DEFAULT_CONFIG);
        let config = parse_config(r#"{"selfResponseMinimumAge": 16, "singlePersonInterview": true}"#)
            .unwrap();
        assert_eq!(config.self_response_minimum_age, 16);
        assert_eq!(config.interviewable_minimum_age, 5);
        assert!(config.single_person_interview);
        assert!(parse_config("[1, 2]").is_err());
        assert_eq!(read_config(None).unwrap(), SurveyConfig::DEFAULT_CONFIG);
    }

    #[test]
    fn status_reports_next_place() {
        init();
        let js = status_js(&interview(), &SurveyConfig::DEFAULT_CONFIG).unwrap();
        assert_eq!(js["activePersonId"], json!("p1"));
        assert_eq!(js["singlePersonInterview"], json!(false));
        assert_eq!(js["completion"]["home"], json!(true));
        // The last place has no next place category.
        assert_eq!(js["completion"]["persons"][0]["nextVisitedPlaceId"], json!("h2"));
    }

    #[test]
    fn repair_fixes_categories() {
        init();
        let js = repair_js(&interview()).unwrap();
        let values = &js["updates"]["valuesByPath"];
        assert_eq!(
            values["responses.household.persons.p1.visitedPlaces.s.nextPlaceCategory"],
            json!("wentBackHome")
        );
        assert_eq!(values["responses._activeVisitedPlaceId"], json!("h2"));
    }

    #[test]
    fn delete_place_collapses_homes() {
        init();
        let js = delete_place_js(&interview(), "household.persons.p1.visitedPlaces.s").unwrap();
        assert_eq!(js["section"], json!("visitedPlaces"));
        assert_eq!(
            js["pathsToRemove"],
            json!([
                "household.persons.p1.visitedPlaces.s",
                "household.persons.p1.visitedPlaces.h2"
            ])
        );
        assert_eq!(
            js["updates"]["valuesByPath"]
                ["responses.household.persons.p1.visitedPlaces.h1.nextPlaceCategory"],
            JSValue::Null
        );
    }

    #[test]
    fn delete_first_place_renumbers_before_repair() {
        init();
        let interview = Interview::from_responses(json!({
            "_activePersonId": "p1",
            "home": {"geography": point(0.0, 0.0)},
            "household": {"size": 1, "persons": {"p1": {"_sequence": 1, "age": 40, "visitedPlaces": {
                "a": {"_sequence": 1, "activity": "shopping", "activityCategory": "shopping",
                      "geography": point(1.0, 1.0), "nextPlaceCategory": "visitedAnotherPlace"},
                "b": {"_sequence": 2, "activity": "work", "activityCategory": "work",
                      "geography": point(2.0, 2.0), "nextPlaceCategory": "wentBackHome"},
                "c": {"_sequence": 3, "activity": "home", "activityCategory": "home",
                      "arrivalTime": 61200, "nextPlaceCategory": "stayedThereUntilTheNextDay"},
            }}}},
        }))
        .unwrap();
        let js = delete_place_js(&interview, "household.persons.p1.visitedPlaces.a").unwrap();
        let updates = &js["updates"];
        assert_eq!(
            updates["unsetPaths"],
            json!(["responses.household.persons.p1.visitedPlaces.a"])
        );
        let values = &updates["valuesByPath"];
        assert_eq!(values["responses.household.persons.p1.visitedPlaces.b._sequence"], json!(1));
        assert_eq!(values["responses.household.persons.p1.visitedPlaces.c._sequence"], json!(2));
        // b is now first and needs no arrival time.
        assert_eq!(values["responses._activeVisitedPlaceId"], JSValue::Null);

        // Committing the batch gives a snapshot with nothing left to repair.
        let batch: UpdateBatch = serde_json::from_value(updates.clone()).unwrap();
        let committed = interview.updated(&batch).unwrap();
        assert_eq!(repair_js(&committed).unwrap()["updates"]["valuesByPath"], json!({}));
    }

    #[test]
    fn missing_targets_are_errors() {
        init();
        assert!(matches!(
            merge_place_js(&interview(), "household.persons.p1.visitedPlaces.nope"),
            Err(NavError::MissingVisitedPlace { .. })
        ));
        let no_active = Interview::from_responses(json!({"household": {"persons": {}}})).unwrap();
        assert!(matches!(
            repair_js(&no_active),
            Err(NavError::MissingActivePerson {})
        ));
    }

    #[test]
    fn reference_comparison() {
        init();
        let js = json!({"updates": {"valuesByPath": {}, "unsetPaths": []}});
        let pretty = serde_json::to_string_pretty(&js).unwrap();
        assert!(check_reference(&js, pretty.as_str()).is_ok());
        assert!(matches!(
            check_reference(&json!({"updates": null}), pretty.as_str()),
            Err(NavError::ReferenceMismatch {})
        ));
    }
}
