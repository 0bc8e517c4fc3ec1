//! Biomarker panel recovery from report text
//!
//! Reports interleave result, unit, and reference range on one line in
//! varying column orders, but the result is consistently the first
//! standalone number after the biomarker's label. That heuristic holds
//! across formats without a full tabular parser.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// Static configuration for one biomarker: display name, the keyword
/// aliases that may introduce its result line, and the reporting unit.
pub struct BiomarkerSpec {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub unit: &'static str,
}

const TOTAL_CHOLESTEROL: &str = "Total Cholesterol";

/// The closed biomarker panel, in matching priority order. The order is
/// part of the contract: biomarkers are checked against each line in
/// this sequence.
pub const BIOMARKER_PANEL: &[BiomarkerSpec] = &[
    BiomarkerSpec {
        name: TOTAL_CHOLESTEROL,
        keywords: &["total cholesterol", "cholesterol:"],
        unit: "mg/dL",
    },
    BiomarkerSpec {
        name: "HDL",
        keywords: &["hdl cholesterol", "hdl:"],
        unit: "mg/dL",
    },
    BiomarkerSpec {
        name: "LDL",
        keywords: &["ldl cholesterol", "ldl:"],
        unit: "mg/dL",
    },
    BiomarkerSpec {
        name: "Triglycerides",
        keywords: &["triglycerides"],
        unit: "mg/dL",
    },
    BiomarkerSpec {
        name: "Vitamin D",
        keywords: &["25-oh vitamin d", "vitamin d:", "vitamin d total"],
        unit: "ng/mL",
    },
    BiomarkerSpec {
        name: "Vitamin B12",
        keywords: &["vitamin b-12", "vitamin b12", "cyanocobalamin"],
        unit: "pg/mL",
    },
    BiomarkerSpec {
        name: "Creatinine",
        keywords: &["creatinine - serum", "creatinine:", "serum creatinine"],
        unit: "mg/dL",
    },
    BiomarkerSpec {
        name: "HbA1c",
        keywords: &["hba1c", "hemoglobin a1c", "glycated hemoglobin"],
        unit: "%",
    },
];

// Lines starting with these tokens repeat biomarker-adjacent vocabulary
// without carrying a value (column headers, method notes, page footers).
// Authoritative minimum set; extend here when new layouts surface.
static HEADER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(bio\.\sref|method|technology|units|remarks|--|test details|test name|result|reference range|unit|page)",
    )
    .expect("header line pattern")
});

// Integer or decimal, word-bounded. findall-then-take-first keeps the
// result and discards the trailing reference range.
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\.?\d*\b").expect("number pattern"));

/// One recovered measurement. The unit is always populated from
/// configuration; the value is empty when no line matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BiomarkerReading {
    pub value: String,
    pub unit: String,
}

/// The full panel, always carrying exactly the configured biomarkers in
/// configured order. Serializes as a map of name to reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiomarkerPanel {
    entries: Vec<(&'static str, BiomarkerReading)>,
}

impl BiomarkerPanel {
    /// Panel with every configured biomarker at its default empty value.
    pub fn empty() -> Self {
        Self {
            entries: BIOMARKER_PANEL
                .iter()
                .map(|spec| {
                    (
                        spec.name,
                        BiomarkerReading {
                            value: String::new(),
                            unit: spec.unit.to_string(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&BiomarkerReading> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, reading)| reading)
    }

    /// Biomarker names in configured order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set_value(&mut self, name: &str, value: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1.value = value;
        }
    }
}

impl Serialize for BiomarkerPanel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, reading) in &self.entries {
            map.serialize_entry(name, reading)?;
        }
        map.end()
    }
}

/// Accumulator for the line fold: the partial panel plus the set of
/// biomarkers already resolved (first match wins, later lines skipped).
struct ScanState {
    panel: BiomarkerPanel,
    resolved: HashSet<&'static str>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            panel: BiomarkerPanel::empty(),
            resolved: HashSet::new(),
        }
    }

    fn scan_line(mut self, line: &str) -> Self {
        let lower = line.to_lowercase();

        if HEADER_LINE.is_match(&lower) {
            return self;
        }

        for spec in BIOMARKER_PANEL {
            if self.resolved.contains(spec.name) {
                continue;
            }

            for keyword in spec.keywords {
                if !lower.contains(keyword) {
                    continue;
                }

                // "Non-HDL Cholesterol" lines must not be misread as the
                // Total Cholesterol result; keep scanning later lines.
                if spec.name == TOTAL_CHOLESTEROL && lower.contains("non-hdl") {
                    continue;
                }

                if let Some(m) = NUMBER.find(line) {
                    let value = m.as_str().to_string();
                    tracing::debug!(
                        biomarker = spec.name,
                        %value,
                        unit = spec.unit,
                        "Biomarker matched"
                    );
                    self.panel.set_value(spec.name, value);
                    self.resolved.insert(spec.name);
                    break;
                }
            }
        }

        self
    }
}

/// Recover the fixed biomarker panel from report text.
///
/// Line-scoped and greedy: every unresolved biomarker is checked against
/// each line in panel order, and the first word-bounded number on a
/// keyword-matching line is taken as the value.
pub fn find_biomarkers(text: &str) -> BiomarkerPanel {
    text.lines()
        .fold(ScanState::new(), |state, line| state.scan_line(line))
        .panel
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_panel_has_all_configured_keys() {
        let panel = BiomarkerPanel::empty();
        assert_eq!(panel.len(), 8);
        for spec in BIOMARKER_PANEL {
            let reading = panel.get(spec.name).unwrap();
            assert_eq!(reading.value, "");
            assert_eq!(reading.unit, spec.unit);
        }
    }

    #[test]
    fn panel_key_set_is_fixed_regardless_of_input() {
        for text in ["", "random noise", "HbA1c 5.8 % 4.0-5.6"] {
            let panel = find_biomarkers(text);
            assert_eq!(panel.len(), 8);
            assert_eq!(
                panel.names().collect::<Vec<_>>(),
                BIOMARKER_PANEL.iter().map(|s| s.name).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn first_number_wins_range_discarded() {
        let panel = find_biomarkers("Total Cholesterol 190 mg/dL 125-200");
        assert_eq!(panel.get(TOTAL_CHOLESTEROL).unwrap().value, "190");
    }

    #[test]
    fn non_hdl_line_does_not_satisfy_total_cholesterol() {
        let panel = find_biomarkers("Total Cholesterol: 165 (Non-HDL)");
        assert_eq!(panel.get(TOTAL_CHOLESTEROL).unwrap().value, "");
    }

    #[test]
    fn non_hdl_line_falls_through_to_later_line() {
        let text = "Total Cholesterol: 165 (Non-HDL)\n\
                    Total Cholesterol 201 mg/dL 125-200";
        let panel = find_biomarkers(text);
        assert_eq!(panel.get(TOTAL_CHOLESTEROL).unwrap().value, "201");
    }

    #[test]
    fn header_lines_are_skipped() {
        // A column header mentioning result vocabulary must not produce
        // a false positive for any biomarker.
        let text = "Test Name Result Unit Reference Range 12\n\
                    Bio. Ref 100 mg/dL\n\
                    HDL Cholesterol 48 mg/dL 40-60";
        let panel = find_biomarkers(text);
        assert_eq!(panel.get("HDL").unwrap().value, "48");
        assert_eq!(panel.get(TOTAL_CHOLESTEROL).unwrap().value, "");
    }

    #[test]
    fn first_match_wins_per_biomarker() {
        let text = "HbA1c 5.8 %\nHbA1c 9.9 %";
        let panel = find_biomarkers(text);
        assert_eq!(panel.get("HbA1c").unwrap().value, "5.8");
    }

    #[test]
    fn keyword_line_without_number_is_ignored() {
        let text = "Triglycerides\nTriglycerides 140 mg/dL 35-160";
        let panel = find_biomarkers(text);
        assert_eq!(panel.get("Triglycerides").unwrap().value, "140");
    }

    #[rstest]
    #[case("Vitamin D: 31.2 ng/mL 30-100", "Vitamin D", "31.2")]
    #[case("Vitamin D Total 28 ng/mL", "Vitamin D", "28")]
    #[case("Vitamin B12 412 pg/mL 211-946", "Vitamin B12", "412")]
    #[case("Cyanocobalamin 350 pg/mL", "Vitamin B12", "350")]
    #[case("Creatinine - Serum 0.9 mg/dL 0.7-1.3", "Creatinine", "0.9")]
    #[case("Serum Creatinine 1.1 mg/dL", "Creatinine", "1.1")]
    #[case("Glycated Hemoglobin 6.2 % 4.0-5.6", "HbA1c", "6.2")]
    #[case("LDL Cholesterol 110 mg/dL 0-130", "LDL", "110")]
    fn keyword_aliases_match(
        #[case] line: &str,
        #[case] biomarker: &str,
        #[case] expected: &str,
    ) {
        let panel = find_biomarkers(line);
        assert_eq!(panel.get(biomarker).unwrap().value, expected);
    }

    #[test]
    fn one_line_can_resolve_multiple_biomarkers() {
        // All unresolved biomarkers are checked per line, in panel order.
        let panel = find_biomarkers("Total Cholesterol 190 HDL Cholesterol 48");
        assert_eq!(panel.get(TOTAL_CHOLESTEROL).unwrap().value, "190");
        assert_eq!(panel.get("HDL").unwrap().value, "190");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "Total Cholesterol 190 mg/dL 125-200\nHbA1c 5.8 %";
        assert_eq!(find_biomarkers(text), find_biomarkers(text));
    }

    #[test]
    fn serializes_as_map_with_all_keys() {
        let value = serde_json::to_value(find_biomarkers("")).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert_eq!(obj["HbA1c"]["unit"], "%");
        assert_eq!(obj["HbA1c"]["value"], "");
    }
}
