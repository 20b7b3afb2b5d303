// ********* Response vocabulary ***********

use snafu::Snafu;

/// Activity values that carry a special meaning for the navigation rules.
pub mod activities {
    pub const HOME: &str = "home";
    pub const WORK_USUAL: &str = "workUsual";
    pub const SCHOOL_USUAL: &str = "schoolUsual";
    pub const WORK_ON_THE_ROAD: &str = "workOnTheRoad";
    pub const WORK_ON_THE_ROAD_FROM_HOME: &str = "workOnTheRoadFromHome";
    pub const LEISURE_STROLL: &str = "leisureStroll";

    /// Activities for which a visited place does not need its own location.
    pub const WITHOUT_LOCATION: [&str; 2] = [WORK_ON_THE_ROAD, LEISURE_STROLL];

    /// When the places on both sides of a deleted place share one of these
    /// activities, the second one is deleted too.
    pub const COLLAPSIBLE: [&str; 5] = [
        HOME,
        WORK_USUAL,
        SCHOOL_USUAL,
        WORK_ON_THE_ROAD,
        LEISURE_STROLL,
    ];
}

/// What the respondent did after leaving a visited place.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum NextPlaceCategory {
    WentBackHome,
    VisitedAnotherPlace,
    StayedThereUntilTheNextDay,
}

impl NextPlaceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextPlaceCategory::WentBackHome => "wentBackHome",
            NextPlaceCategory::VisitedAnotherPlace => "visitedAnotherPlace",
            NextPlaceCategory::StayedThereUntilTheNextDay => "stayedThereUntilTheNextDay",
        }
    }

    pub fn parse(s: &str) -> Option<NextPlaceCategory> {
        match s {
            "wentBackHome" => Some(NextPlaceCategory::WentBackHome),
            "visitedAnotherPlace" => Some(NextPlaceCategory::VisitedAnotherPlace),
            "stayedThereUntilTheNextDay" => Some(NextPlaceCategory::StayedThereUntilTheNextDay),
            _ => None,
        }
    }
}

// ******** Errors *********

/// Raised when a person is expected to have an age and does not.
///
/// This signals corrupted data: callers that cannot guarantee an age must
/// check with `has_age` first.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AgeError {
    #[snafu(display("Invalid age or ageGroup for person {uuid:?}"))]
    InvalidAge { uuid: String },
}

/// Errors that prevent an interview from being loaded.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NavigatorError {
    #[snafu(display("Malformed interview responses: {source}"))]
    MalformedResponses { source: serde_json::Error },
    #[snafu(display("The interview does not contain a responses object"))]
    MissingResponses {},
}

// ********* Configuration **********

// Survey-level settings. They are passed explicitly to the functions that
// need them.

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyConfig {
    /// Minimum age at which a person answers for themselves.
    pub self_response_minimum_age: u32,
    /// Minimum age at which a person is interviewed at all.
    pub interviewable_minimum_age: u32,
    /// Only the active person is interviewed. Interviews without an access
    /// code are always treated as single-person interviews.
    pub single_person_interview: bool,
}

impl SurveyConfig {
    pub const DEFAULT_CONFIG: SurveyConfig = SurveyConfig {
        self_response_minimum_age: 14,
        interviewable_minimum_age: 5,
        single_person_interview: false,
    };
}

impl Default for SurveyConfig {
    fn default() -> Self {
        SurveyConfig::DEFAULT_CONFIG
    }
}
