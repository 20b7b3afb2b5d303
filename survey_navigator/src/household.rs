// ********* Household helpers ***********

// Questions asked about the household as a whole: who answers for whom, who
// gets the commuting questions, and a few counts over the persons.

use log::debug;
use std::cmp::Ordering;

use crate::age::{age_compare, age_compare_with_null, has_age};
use crate::completion::{is_truthy, TRIPS_MINIMUM_AGE};
use crate::config::{AgeError, SurveyConfig};
use crate::interview::Interview;
use crate::records::*;

/// School types for which a person counts as enrolled.
pub const SCHOOL_ENROLLED_VALUES: [&str; 6] = [
    "kindergarten",
    "childcare",
    "primarySchool",
    "secondarySchool",
    "schoolAtHome",
    "other",
];

/// Answers to the disability question that may mean a disability.
const MAY_HAVE_DISABILITY_VALUES: [&str; 3] = ["yes", "preferNotToAnswer", "dontKnow"];

/// Consent from a parent is asked for persons in this age range.
pub const PARENT_CONSENT_AGES: (i64, i64) = (5, 13);

/// Only this many persons of a household are asked the commuting and
/// frequency questions.
pub const MAX_COMMUTING_RESPONDENTS: usize = 2;

/// The persons holding a driving licence, in sequence order.
pub fn drivers(interview: &Interview) -> Vec<&Person> {
    interview
        .persons_ordered()
        .into_iter()
        .filter(|p| p.driving_license_owner.as_deref() == Some("yes"))
        .collect()
}

/// The persons old enough to be interviewed, in sequence order.
pub fn interviewable_persons<'a>(
    interview: &'a Interview,
    config: &SurveyConfig,
) -> Result<Vec<&'a Person>, AgeError> {
    let mut res = Vec::new();
    for person in interview.persons_ordered() {
        if has_age(person)
            && age_compare(person, config.interviewable_minimum_age as i64)? != Ordering::Less
        {
            res.push(person);
        }
    }
    Ok(res)
}

/// Whether the person answers for themselves: either the only person old
/// enough to answer, or declared as answering for themselves.
pub fn is_self_declared(person: &Person, interview: &Interview, config: &SurveyConfig) -> bool {
    let min_age = config.self_response_minimum_age as i64;
    let can_self_respond: Vec<&Person> = interview
        .persons_ordered()
        .into_iter()
        .filter(|p| matches!(age_compare_with_null(p, min_age), Some(o) if o != Ordering::Less))
        .collect();
    let only_respondent = can_self_respond.len() == 1 && can_self_respond[0].uuid == person.uuid;
    only_respondent || person.who_will_answer_for_this_person.as_deref() == Some(person.uuid.as_str())
}

/// The number of persons of the household, or 1 when the person answers for
/// themselves. Labels address the respondent directly when this is 1.
pub fn count_or_self_declared(person: &Person, interview: &Interview, config: &SurveyConfig) -> usize {
    let count = interview.count_persons();
    if count > 1 && is_self_declared(person, interview, config) {
        1
    } else {
        count
    }
}

pub fn should_ask_parent_consent(person: &Person) -> Result<bool, AgeError> {
    let (min_age, max_age) = PARENT_CONSENT_AGES;
    Ok(has_age(person)
        && age_compare(person, min_age)? != Ordering::Less
        && age_compare(person, max_age)? != Ordering::Greater)
}

/// Persons who did not answer the disability question are not counted.
pub fn person_may_have_disability(person: &Person) -> bool {
    person
        .has_disability
        .as_deref()
        .map(|d| MAY_HAVE_DISABILITY_VALUES.contains(&d))
        .unwrap_or(false)
}

pub fn household_has_disabled_persons(interview: &Interview) -> bool {
    interview.persons().values().any(person_may_have_disability)
}

pub fn carsharing_members_count(interview: &Interview) -> usize {
    interview
        .persons()
        .values()
        .filter(|p| p.car_sharing_member.as_deref() == Some("yes"))
        .count()
}

/// Persons who used bike sharing recently, or do not know.
pub fn bikesharing_members_count(interview: &Interview) -> usize {
    interview
        .persons()
        .values()
        .filter(|p| matches!(p.used_bikesharing.as_deref(), Some("yes") | Some("dontKnow")))
        .count()
}

fn comes_before(other: &Person, person: &Person) -> bool {
    match (other.sequence, person.sequence) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

fn household_flag(interview: &Interview, flag: fn(&Household) -> &Option<serde_json::Value>) -> bool {
    interview.household().map(|h| is_truthy(flag(h))).unwrap_or(false)
}

/// Count the persons before `person` that qualify, and check that `person`
/// qualifies while fewer than two did.
fn within_first_respondents<F>(interview: &Interview, person: &Person, qualifies: F) -> Result<bool, AgeError>
where
    F: Fn(&Person) -> Result<bool, AgeError>,
{
    let mut already_asked = 0;
    for other in interview.persons().values() {
        if comes_before(other, person) && qualifies(other)? {
            already_asked += 1;
        }
    }
    let res = already_asked < MAX_COMMUTING_RESPONDENTS && qualifies(person)?;
    debug!(
        "within_first_respondents: {} earlier respondents, {} for {}",
        already_asked, res, person.uuid
    );
    Ok(res)
}

/// Same as `within_first_respondents`, for a condition that cannot fail.
fn within_first_respondents_by(interview: &Interview, person: &Person, qualifies: fn(&Person) -> bool) -> bool {
    let already_asked = interview
        .persons()
        .values()
        .filter(|other| comes_before(other, person) && qualifies(other))
        .count();
    let res = already_asked < MAX_COMMUTING_RESPONDENTS && qualifies(person);
    debug!(
        "within_first_respondents_by: {} earlier respondents, {} for {}",
        already_asked, res, person.uuid
    );
    res
}

fn is_commuting_worker(person: &Person) -> bool {
    person.is_worker() && !person.is_student()
}

/// The household was selected for the work commuting questions, and the
/// person is a worker who is not also a student.
pub fn should_ask_person_work_commuting_questions(interview: &Interview, person: &Person) -> bool {
    if !household_flag(interview, |h| &h.should_ask_work_commuting_questions) {
        return false;
    }
    within_first_respondents_by(interview, person, is_commuting_worker)
}

/// The household was selected for the school commuting questions, and the
/// person studies from a fixed location.
pub fn should_ask_person_school_commuting_questions(interview: &Interview, person: &Person) -> bool {
    if !household_flag(interview, |h| &h.should_ask_school_commuting_questions) {
        return false;
    }
    within_first_respondents_by(interview, person, |p| is_yes(&p.studies_from_fixed_location))
}

/// The household was selected for the mode frequency questions, and the
/// person is old enough to make trips.
pub fn should_ask_person_any_trip_modes_frequencies_questions(
    interview: &Interview,
    person: &Person,
) -> Result<bool, AgeError> {
    if !household_flag(interview, |h| &h.should_ask_any_trip_modes_frequencies) {
        return Ok(false);
    }
    within_first_respondents(interview, person, |p| {
        Ok(has_age(p) && age_compare(p, TRIPS_MINIMUM_AGE)? != Ordering::Less)
    })
}

/// Picks the string matching the gender of the person.
pub fn gender_string<'a>(
    person: Option<&Person>,
    female: &'a str,
    male: &'a str,
    custom: &'a str,
    default: &'a str,
) -> &'a str {
    match person.and_then(|p| p.gender.as_deref()) {
        Some("female") => female,
        Some("male") => male,
        Some("custom") => custom,
        _ => default,
    }
}

pub fn is_student_from_enrolled(person: &Person) -> bool {
    person
        .school_type
        .as_deref()
        .map(|s| SCHOOL_ENROLLED_VALUES.contains(&s))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurveyConfig;
    use serde_json::json;

    fn interview() -> Interview {
        Interview::from_responses(json!({
            "household": {
                "size": 5,
                "_shouldAskWorkCommutingQuestions": true,
                "_shouldAskSchoolCommutingQuestions": "yes",
                "persons": {
                    "p1": {"_sequence": 1, "age": 45, "occupation": "fullTimeWorker",
                           "drivingLicenseOwner": "yes", "carSharingMember": "yes",
                           "gender": "female", "hasDisability": "no"},
                    "p2": {"_sequence": 2, "age": 43, "occupation": "partTimeWorker",
                           "drivingLicenseOwner": "no", "gender": "male",
                           "usedBixiBikesharingServicesInLast6Months": "dontKnow"},
                    "p3": {"_sequence": 3, "age": 19, "occupation": "workerAndStudent",
                           "drivingLicenseOwner": "yes", "studiesFromFixedLocation": true,
                           "usedBixiBikesharingServicesInLast6Months": "yes"},
                    "p4": {"_sequence": 4, "age": 17, "occupation": "fullTimeWorker",
                           "hasDisability": "preferNotToAnswer"},
                    "p5": {"_sequence": 5, "ageGroup": "0-4", "schoolType": "childcare"},
                },
            },
        }))
        .unwrap()
    }

    fn uuids(persons: &[&Person]) -> Vec<String> {
        persons.iter().map(|p| p.uuid.clone()).collect()
    }

    #[test]
    fn drivers_and_interviewable() {
        let interview = interview();
        assert_eq!(uuids(&drivers(&interview)), vec!["p1", "p3"]);
        assert_eq!(
            uuids(&interviewable_persons(&interview, &SurveyConfig::DEFAULT_CONFIG).unwrap()),
            vec!["p1", "p2", "p3", "p4"]
        );
    }

    #[test]
    fn self_declared_respondents() {
        let interview = Interview::from_responses(json!({
            "household": {"persons": {
                "a": {"_sequence": 1, "age": 40},
                "b": {"_sequence": 2, "age": 8},
                "c": {"_sequence": 3, "age": 12, "whoWillAnswerForThisPerson": "c"},
            }},
        }))
        .unwrap();
        let a = interview.person("a").unwrap();
        let b = interview.person("b").unwrap();
        let c = interview.person("c").unwrap();
        assert!(is_self_declared(a, &interview, &SurveyConfig::DEFAULT_CONFIG));
        assert!(!is_self_declared(b, &interview, &SurveyConfig::DEFAULT_CONFIG));
        assert!(is_self_declared(c, &interview, &SurveyConfig::DEFAULT_CONFIG));
        assert_eq!(count_or_self_declared(a, &interview, &SurveyConfig::DEFAULT_CONFIG), 1);
        assert_eq!(count_or_self_declared(b, &interview, &SurveyConfig::DEFAULT_CONFIG), 3);
    }

    #[test]
    fn parent_consent_range() {
        let consent = |age: i64| {
            let p = Person {
                age: Some(json!(age)),
                ..Default::default()
            };
            should_ask_parent_consent(&p).unwrap()
        };
        assert!(!consent(4));
        assert!(consent(5));
        assert!(consent(13));
        assert!(!consent(14));
        assert!(!should_ask_parent_consent(&Person::default()).unwrap());
    }

    #[test]
    fn counts_over_persons() {
        let interview = interview();
        assert_eq!(carsharing_members_count(&interview), 1);
        assert_eq!(bikesharing_members_count(&interview), 2);
        assert!(household_has_disabled_persons(&interview));
        assert!(!person_may_have_disability(interview.person("p1").unwrap()));
        assert!(!person_may_have_disability(interview.person("p2").unwrap()));
    }

    #[test]
    fn commuting_questions_go_to_the_first_two() {
        let interview = interview();
        let ask_work = |id: &str| {
            should_ask_person_work_commuting_questions(&interview, interview.person(id).unwrap())
        };
        assert!(ask_work("p1"));
        assert!(ask_work("p2"));
        // Also a student.
        assert!(!ask_work("p3"));
        // Two workers were asked before.
        assert!(!ask_work("p4"));

        let ask_school = |id: &str| {
            should_ask_person_school_commuting_questions(&interview, interview.person(id).unwrap())
        };
        assert!(ask_school("p3"));
        assert!(!ask_school("p1"));

        // The household was not selected for the frequency questions.
        assert!(!should_ask_person_any_trip_modes_frequencies_questions(
            &interview,
            interview.person("p1").unwrap()
        )
        .unwrap());
    }

    #[test]
    fn commuting_questions_do_not_read_ages() {
        let interview = Interview::from_responses(json!({
            "household": {"_shouldAskWorkCommutingQuestions": true, "persons": {
                "a": {"_sequence": 1, "ageGroup": "abc", "occupation": "fullTimeWorker"},
                "b": {"_sequence": 2, "occupation": "partTimeWorker"},
                "c": {"_sequence": 3, "age": 50, "occupation": "fullTimeWorker"},
            }},
        }))
        .unwrap();
        let ask = |id: &str| {
            should_ask_person_work_commuting_questions(&interview, interview.person(id).unwrap())
        };
        assert!(ask("a"));
        assert!(ask("b"));
        assert!(!ask("c"));
    }

    #[test]
    fn frequency_questions_need_age() {
        let interview = Interview::from_responses(json!({
            "household": {"_shouldAskAnyTripModesFrequencies": true, "persons": {
                "a": {"_sequence": 1, "age": 3},
                "b": {"_sequence": 2, "age": 30},
                "c": {"_sequence": 3, "age": 31},
                "d": {"_sequence": 4, "age": 32},
            }},
        }))
        .unwrap();
        let ask = |id: &str| {
            should_ask_person_any_trip_modes_frequencies_questions(
                &interview,
                interview.person(id).unwrap(),
            )
            .unwrap()
        };
        assert!(!ask("a"));
        assert!(ask("b"));
        assert!(ask("c"));
        assert!(!ask("d"));
    }

    #[test]
    fn gender_and_enrollment() {
        let interview = interview();
        let g = |id: &str| gender_string(interview.person(id), "elle", "il", "iel", "-");
        assert_eq!(g("p1"), "elle");
        assert_eq!(g("p2"), "il");
        assert_eq!(g("p3"), "-");
        assert_eq!(gender_string(None, "f", "m", "c", "d"), "d");
        assert!(is_student_from_enrolled(interview.person("p5").unwrap()));
        assert!(!is_student_from_enrolled(interview.person("p1").unwrap()));
    }
}
