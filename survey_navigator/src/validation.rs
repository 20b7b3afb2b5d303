//! Named validation rules run against one record of the interview.
//!
//! Rules receive a context that grows with the depth of the record: an
//! interview context, then the person, the visited place or the trip, and
//! finally the segment. A rule that fails to run is logged and skipped, it
//! never stops the other rules.

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value as JSValue;
use std::collections::BTreeMap;
use std::ops::Deref;

use crate::interview::Interview;
use crate::records::*;

/// The error a rule returns when it cannot be evaluated.
pub type RuleError = Box<dyn std::error::Error + Send + Sync>;

type RuleFn<C> = Box<dyn Fn(&C) -> Result<bool, RuleError>>;

pub struct ValidationRule<C> {
    pub is_valid: RuleFn<C>,
    /// Failures of warning rules do not block the interview.
    pub is_warning: bool,
    pub error_code: Option<String>,
    /// Error message by language.
    pub error_message: BTreeMap<String, String>,
}

impl<C> ValidationRule<C> {
    pub fn new<F>(is_valid: F) -> ValidationRule<C>
    where
        F: Fn(&C) -> Result<bool, RuleError> + 'static,
    {
        ValidationRule {
            is_valid: Box::new(is_valid),
            is_warning: false,
            error_code: None,
            error_message: BTreeMap::new(),
        }
    }

    pub fn warning(mut self) -> ValidationRule<C> {
        self.is_warning = true;
        self
    }

    pub fn code(mut self, code: &str) -> ValidationRule<C> {
        self.error_code = Some(code.to_string());
        self
    }

    pub fn message(mut self, language: &str, message: &str) -> ValidationRule<C> {
        self.error_message
            .insert(language.to_string(), message.to_string());
        self
    }
}

/// Validation rules by id, evaluated in insertion order.
pub struct Validations<C> {
    rules: Vec<(String, ValidationRule<C>)>,
}

impl<C> Default for Validations<C> {
    fn default() -> Self {
        Validations { rules: Vec::new() }
    }
}

impl<C> Validations<C> {
    pub fn new() -> Validations<C> {
        Validations::default()
    }

    /// Adds a rule. A rule with the same id replaces the previous one, at
    /// its position.
    pub fn add(mut self, id: &str, rule: ValidationRule<C>) -> Validations<C> {
        match self.rules.iter_mut().find(|(rid, _)| rid == id) {
            Some(slot) => slot.1 = rule,
            None => self.rules.push((id.to_string(), rule)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationAudit {
    pub id: String,
    #[serde(rename = "isWarning")]
    pub is_warning: bool,
    pub code: Option<String>,
    pub messages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ValidationResults {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub audits: Vec<ValidationAudit>,
}

impl ValidationResults {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs every rule against the context.
pub fn validate<C>(validations: &Validations<C>, ctx: &C) -> ValidationResults {
    run("record", validations, ctx)
}

fn run<C>(kind: &str, validations: &Validations<C>, ctx: &C) -> ValidationResults {
    let mut res = ValidationResults::default();
    for (id, rule) in validations.rules.iter() {
        match (rule.is_valid)(ctx) {
            Ok(true) => {}
            Ok(false) => {
                debug!("validate: {} rule {} failed", kind, id);
                if rule.is_warning {
                    res.warnings.push(id.clone());
                } else {
                    res.errors.push(id.clone());
                }
                res.audits.push(ValidationAudit {
                    id: id.clone(),
                    is_warning: rule.is_warning,
                    code: rule.error_code.clone(),
                    messages: rule.error_message.clone(),
                });
            }
            Err(e) => {
                warn!("validate: exception in {} validation {}: {}", kind, id, e);
            }
        }
    }
    res
}

// ********* Contexts ***********

/// What interview and household rules see.
#[derive(Clone)]
pub struct InterviewContext<'a> {
    /// The user editing the interview, when known.
    pub user: Option<&'a JSValue>,
    pub interview: &'a Interview,
    pub responses: &'a Responses,
    pub household: Option<&'a Household>,
    pub home: Option<&'a Home>,
    pub persons_by_id: &'a BTreeMap<String, Person>,
    pub persons: Vec<&'a Person>,
}

impl<'a> InterviewContext<'a> {
    pub fn new(interview: &'a Interview, user: Option<&'a JSValue>) -> InterviewContext<'a> {
        InterviewContext {
            user,
            interview,
            responses: interview.responses(),
            household: interview.household(),
            home: interview.home(),
            persons_by_id: interview.persons(),
            persons: interview.persons_ordered(),
        }
    }
}

#[derive(Clone)]
pub struct PersonContext<'a> {
    pub base: InterviewContext<'a>,
    pub person: &'a Person,
}

impl<'a> PersonContext<'a> {
    pub fn new(base: InterviewContext<'a>, person: &'a Person) -> PersonContext<'a> {
        PersonContext { base, person }
    }
}

impl<'a> Deref for PersonContext<'a> {
    type Target = InterviewContext<'a>;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[derive(Clone)]
pub struct VisitedPlaceContext<'a> {
    pub base: PersonContext<'a>,
    pub visited_places_by_id: &'a BTreeMap<String, VisitedPlace>,
    pub visited_places: Vec<&'a VisitedPlace>,
    pub visited_place: &'a VisitedPlace,
}

impl<'a> VisitedPlaceContext<'a> {
    pub fn new(base: PersonContext<'a>, visited_place: &'a VisitedPlace) -> VisitedPlaceContext<'a> {
        let person = base.person;
        VisitedPlaceContext {
            base,
            visited_places_by_id: &person.visited_places,
            visited_places: to_ordered(&person.visited_places),
            visited_place,
        }
    }
}

impl<'a> Deref for VisitedPlaceContext<'a> {
    type Target = PersonContext<'a>;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[derive(Clone)]
pub struct TripContext<'a> {
    pub base: PersonContext<'a>,
    pub visited_places_by_id: &'a BTreeMap<String, VisitedPlace>,
    pub visited_places: Vec<&'a VisitedPlace>,
    pub trips_by_id: &'a BTreeMap<String, Trip>,
    pub trips: Vec<&'a Trip>,
    pub trip: &'a Trip,
}

impl<'a> TripContext<'a> {
    pub fn new(base: PersonContext<'a>, trip: &'a Trip) -> TripContext<'a> {
        let person = base.person;
        TripContext {
            base,
            visited_places_by_id: &person.visited_places,
            visited_places: to_ordered(&person.visited_places),
            trips_by_id: &person.trips,
            trips: to_ordered(&person.trips),
            trip,
        }
    }
}

impl<'a> Deref for TripContext<'a> {
    type Target = PersonContext<'a>;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[derive(Clone)]
pub struct SegmentContext<'a> {
    pub base: TripContext<'a>,
    pub segments_by_id: &'a BTreeMap<String, Segment>,
    pub segments: Vec<&'a Segment>,
    pub segment: &'a Segment,
}

impl<'a> SegmentContext<'a> {
    pub fn new(base: TripContext<'a>, segment: &'a Segment) -> SegmentContext<'a> {
        let trip = base.trip;
        SegmentContext {
            base,
            segments_by_id: &trip.segments,
            segments: to_ordered(&trip.segments),
            segment,
        }
    }
}

impl<'a> Deref for SegmentContext<'a> {
    type Target = TripContext<'a>;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

pub fn validate_interview<'a>(
    validations: &Validations<InterviewContext<'a>>,
    ctx: &InterviewContext<'a>,
) -> ValidationResults {
    run("interview", validations, ctx)
}

pub fn validate_household<'a>(
    validations: &Validations<InterviewContext<'a>>,
    ctx: &InterviewContext<'a>,
) -> ValidationResults {
    run("household", validations, ctx)
}

pub fn validate_person<'a>(
    validations: &Validations<PersonContext<'a>>,
    ctx: &PersonContext<'a>,
) -> ValidationResults {
    run("person", validations, ctx)
}

pub fn validate_visited_place<'a>(
    validations: &Validations<VisitedPlaceContext<'a>>,
    ctx: &VisitedPlaceContext<'a>,
) -> ValidationResults {
    run("visited place", validations, ctx)
}

pub fn validate_trip<'a>(
    validations: &Validations<TripContext<'a>>,
    ctx: &TripContext<'a>,
) -> ValidationResults {
    run("trip", validations, ctx)
}

pub fn validate_segment<'a>(
    validations: &Validations<SegmentContext<'a>>,
    ctx: &SegmentContext<'a>,
) -> ValidationResults {
    run("segment", validations, ctx)
}
