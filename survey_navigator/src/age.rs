//! Age comparisons.
//!
//! A person has either an exact `age` or an `ageGroup` such as `"5-9"` or
//! `"100+"`. Comparing against an age group tells whether the group is
//! entirely below the age, contains it, or is entirely above it.

use log::debug;
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::cmp::Ordering;

use crate::config::{AgeError, InvalidAgeSnafu};
use crate::records::Person;

/// Leading integer of a string, after leading whitespace, with an optional
/// sign. `"12 ans"` reads as 12.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn compare_group(age_group: &str, age: i64) -> Option<Ordering> {
    if let Some(pos) = age_group.find('-') {
        let min_age = parse_leading_int(&age_group[..pos])?;
        let max_age = parse_leading_int(&age_group[pos + 1..])?;
        return Some(if max_age < age {
            Ordering::Less
        } else if min_age > age {
            Ordering::Greater
        } else {
            Ordering::Equal
        });
    }
    if let Some(pos) = age_group.find('+') {
        let min_age = parse_leading_int(&age_group[..pos])?;
        return Some(min_age.cmp(&age));
    }
    None
}

/// Compares the age of a person with `age`, or `None` when the person has
/// neither a numeric age nor a readable age group.
pub fn age_compare_with_null(person: &Person, age: i64) -> Option<Ordering> {
    if let Some(JSValue::Number(n)) = &person.age {
        return n.as_f64().and_then(|a| a.partial_cmp(&(age as f64)));
    }
    match &person.age_group {
        Some(JSValue::String(group)) => compare_group(group, age),
        _ => None,
    }
}

/// Compares the age of a person with `age`.
///
/// Fails when the person has no usable age. Callers for which the age may
/// legitimately be missing check [`has_age`] first.
pub fn age_compare(person: &Person, age: i64) -> Result<Ordering, AgeError> {
    let res = age_compare_with_null(person, age);
    if res.is_none() {
        debug!("age_compare: person {:?} has no age", person.uuid);
    }
    res.context(InvalidAgeSnafu { uuid: &person.uuid })
}

/// Whether the person has a usable, non-negative age or age group.
pub fn has_age(person: &Person) -> bool {
    matches!(
        age_compare_with_null(person, 0),
        Some(Ordering::Equal) | Some(Ordering::Greater)
    )
}

/// Whether the person is at least `age` years old. An age group containing
/// `age` counts.
pub fn is_at_least(person: &Person, age: i64) -> Result<bool, AgeError> {
    Ok(age_compare(person, age)? != Ordering::Less)
}

/// Whether the person has an age and is younger than `age`.
pub fn is_known_younger_than(person: &Person, age: i64) -> Result<bool, AgeError> {
    if !has_age(person) {
        return Ok(false);
    }
    Ok(age_compare(person, age)? == Ordering::Less)
}

pub fn age_as_string(person: &Person) -> String {
    match (&person.age, &person.age_group) {
        (Some(JSValue::Number(n)), _) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        (_, Some(JSValue::String(group))) => group.clone(),
        _ => "-".to_string(),
    }
}
