// ********* Display strings ***********

// Labels shown to the respondent. Translations come from the host as a
// function from a translation key to the translated text.

use log::debug;
use serde_json::Value as JSValue;

use crate::config::activities;
use crate::geography::duration_with_hour_from_seconds;
use crate::interview::Interview;
use crate::path::ResponsePath;
use crate::records::*;

pub const PLACE_GENERIC_KEY: &str = "survey:placeGeneric";

fn activity_category_key(category: &str) -> String {
    format!("survey:visitedPlace:activityCategories:{}", category)
}

/// The name of a visited place as shown to the respondent.
///
/// A place already visited by someone of the household takes the name of
/// the place its shortcut points to. Home places are named after their
/// category. Places without a name get a generic label with their sequence.
pub fn visited_place_name<T>(place: &VisitedPlace, t: T, interview: &Interview) -> String
where
    T: Fn(&str) -> String,
{
    let generic = match place.sequence {
        Some(seq) => format!("{} {}", t(PLACE_GENERIC_KEY), seq),
        None => t(PLACE_GENERIC_KEY),
    };
    let (category, name) = match place.shortcut.as_deref() {
        Some(shortcut) if place.already_visited() && !shortcut.is_blank() => {
            let original = interview.response(&ResponsePath::parse(shortcut));
            debug!(
                "visited_place_name: {} follows shortcut {}",
                place.uuid, shortcut
            );
            let field = |f: &str| {
                original
                    .and_then(|o| o.get(f))
                    .and_then(JSValue::as_str)
                    .map(str::to_string)
            };
            (field("activityCategory"), field("name"))
        }
        _ => (place.activity_category.clone(), place.name.clone()),
    };
    if category.as_deref() == Some(activities::HOME) {
        t(&activity_category_key(activities::HOME))
    } else {
        name.filter(|n| !n.is_blank()).unwrap_or(generic)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The address on one line, or an empty string when the street address or
/// the city is missing.
pub fn address_one_line(
    home: Option<&Home>,
    include_region: bool,
    include_country: bool,
    include_postal_code: bool,
) -> String {
    let home = match home {
        Some(h) => h,
        None => return String::new(),
    };
    let (address, city) = match (home.address.as_deref(), home.city.as_deref()) {
        (Some(a), Some(c)) if !a.is_blank() && !c.is_blank() => (a, c),
        _ => return String::new(),
    };
    let mut res = format!("{}, {}", address, capitalize(city));
    let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.is_blank());
    if let Some(region) = non_blank(&home.region).filter(|_| include_region) {
        res.push_str(&format!(", {}", region));
    }
    if let Some(country) = non_blank(&home.country).filter(|_| include_country) {
        res.push_str(&format!(", {}", country));
    }
    if let Some(postal_code) = non_blank(&home.postal_code).filter(|_| include_postal_code) {
        res.push_str(&format!(" {}", postal_code.to_uppercase()));
    }
    res
}

pub fn home_address_one_line(
    interview: &Interview,
    include_region: bool,
    include_country: bool,
    include_postal_code: bool,
) -> String {
    address_one_line(
        interview.home(),
        include_region,
        include_country,
        include_postal_code,
    )
}

/// The duration of a trip as an HTML fragment, in French or in English.
///
/// Times are in seconds since midnight. An empty string is returned when
/// one of them is missing.
pub fn format_trip_duration(start_time: Option<i64>, end_time: Option<i64>, language: &str) -> String {
    let elapsed = match (start_time, end_time) {
        (Some(s), Some(e)) => e.checked_sub(s),
        _ => None,
    };
    let elapsed = match elapsed {
        Some(d) => d,
        None => return String::new(),
    };
    let duration = duration_with_hour_from_seconds(Some(elapsed as f64));
    let hour = duration.hour.unwrap_or(0);
    let minute = duration.minute.unwrap_or(0);
    let text = if language == "fr" {
        let mut s = String::new();
        if hour > 0 {
            s.push_str(&format!(" {} heure{}", hour, if hour >= 2 { "s" } else { "" }));
        }
        if hour == 0 && minute == 0 {
            s.push_str(" moins de 5 minutes");
        } else if minute > 0 {
            s.push_str(&format!(" {} minutes", minute));
        }
        format!("(déplacement de{})", s)
    } else {
        let mut s = String::new();
        if hour > 0 {
            s.push_str(&format!("{} h", hour));
        }
        if hour == 0 && minute == 0 {
            s.push_str("less than 5 min");
        } else if minute > 0 {
            if hour > 0 {
                s.push(' ');
            }
            s.push_str(&format!("{} min", minute));
        }
        format!("({} trip)", s)
    };
    format!("<br /><span class=\"_pale _oblique\">{}</span>", text)
}
