//! Patient demographics recovery from report text
//!
//! Lab reports carry the patient header in wildly different layouts. The
//! extractor runs an ordered cascade of named matchers: a combined
//! name/age/gender expression first (the most reliable when present),
//! then independent per-field fallbacks. The report date is matched
//! independently of that cascade because it can appear anywhere.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Normalized patient gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Patient demographics. Every field defaults to empty/absent; a miss on
/// any individual field is expected steady-state behavior, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
}

/// A named pattern recovering one field; first capture group is the value.
pub struct FieldMatcher {
    pub name: &'static str,
    pattern: &'static Lazy<Regex>,
}

impl FieldMatcher {
    /// Run the pattern and return the trimmed first capture, if any.
    pub fn capture(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

// Combined header form: "NAME : B G MANJUNATH SWAMY (57Y/M)" or
// "PATIENT NAME: ... (57 YRS/F)". When this hits it fully determines
// name, age, and gender, and the per-field fallbacks are skipped.
static COMBINED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:NAME|PATIENT NAME)\s*[:\s]*([A-Z\s\.]+)\s*\((\d+)\s*(?:Y|YRS)?/?([MF])\)")
        .expect("combined patient pattern")
});

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Patient Name|Name)\s*[:\s]*(.*)").expect("name pattern"));

static AGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Age|DOB Year)\s*[:\s]*(\d+)").expect("age pattern"));

static GENDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Gender|Sex)\s*[:\s]*(Male|Female|M|F)").expect("gender pattern")
});

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:Date|Report Released on \(RRT\)|Report Date|Test Date|Collection Date)\s*[:\s]*(\d{1,2}\s+\w+\s+\d{4}|\d{1,2}[-/]\d{1,2}[-/]\d{2,4})",
    )
    .expect("date pattern")
});

/// Fallback matchers, in the order they are attempted.
pub static NAME_MATCHER: FieldMatcher = FieldMatcher {
    name: "name",
    pattern: &NAME,
};
pub static AGE_MATCHER: FieldMatcher = FieldMatcher {
    name: "age",
    pattern: &AGE,
};
pub static GENDER_MATCHER: FieldMatcher = FieldMatcher {
    name: "gender",
    pattern: &GENDER,
};
pub static DATE_MATCHER: FieldMatcher = FieldMatcher {
    name: "report_date",
    pattern: &DATE,
};

/// Match the combined name/age/gender header form.
pub fn match_combined(text: &str) -> Option<(String, String, Gender)> {
    let caps = COMBINED.captures(text)?;
    let name = title_case(caps[1].trim());
    let age = caps[2].trim().to_string();
    let gender = if caps[3].eq_ignore_ascii_case("M") {
        Gender::Male
    } else {
        Gender::Female
    };
    Some((name, age, gender))
}

/// Recover patient name, age, gender, and report date from report text.
pub fn find_patient_info(text: &str) -> PatientInfo {
    let mut info = PatientInfo::default();

    if let Some((name, age, gender)) = match_combined(text) {
        tracing::debug!(%name, %age, ?gender, "Patient header matched via combined pattern");
        info.name = name;
        info.age = Some(age);
        info.gender = Some(gender);
    } else {
        tracing::debug!("Combined pattern missed, trying per-field fallbacks");

        if let Some(name) = NAME_MATCHER.capture(text) {
            info.name = title_case(&name);
        }
        if let Some(age) = AGE_MATCHER.capture(text) {
            info.age = Some(age);
        }
        if let Some(raw) = GENDER_MATCHER.capture(text) {
            info.gender = normalize_gender(&raw);
        }
    }

    // The date label can sit anywhere in the report, independent of the
    // demographics header. Stored as matched, unnormalized.
    if let Some(date) = DATE_MATCHER.capture(text) {
        tracing::debug!(%date, "Report date matched");
        info.report_date = Some(date);
    }

    info
}

fn normalize_gender(raw: &str) -> Option<Gender> {
    match raw.to_ascii_uppercase().as_str() {
        "M" | "MALE" => Some(Gender::Male),
        "F" | "FEMALE" => Some(Gender::Female),
        _ => None,
    }
}

/// Uppercase every letter that follows a non-letter, lowercase the
/// rest. "JOHN SMITH" becomes "John Smith", "B.G. RAO" becomes
/// "B.G. Rao" (dotted initials keep their capitals).
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
