//! Integration tests for the field-recovery pipeline
//!
//! These operate on report text (past the acquisition boundary) so they
//! run without a PDFium library or OCR backend installed.

use lab_report_mcp_server::{
    extract_info_from_text, find_biomarkers, find_patient_info, Error, ExtractionPipeline, Gender,
    BIOMARKER_PANEL,
};
use pretty_assertions::assert_eq;

/// A realistic digitally-generated report layout: tabular biomarker
/// section with column headers, reference ranges, and a page footer.
const SAMPLE_REPORT: &str = "\
ACME DIAGNOSTICS PVT LTD
NAME : JOHN SMITH (45Y/M)
Report Released on (RRT): 12-05-2023
Test Name Result Unit Bio. Ref Interval
Total Cholesterol 190 mg/dL 125-200
HDL Cholesterol 48 mg/dL 40-60
LDL Cholesterol 110 mg/dL 0-130
Triglycerides 140 mg/dL 35-160
Vitamin D Total 32.4 ng/mL 30-100
Vitamin B12 412 pg/mL 211-946
Creatinine - Serum 0.9 mg/dL 0.7-1.3
HbA1c 5.8 % 4.0-5.6
Method: CMIA
Page 1 of 2
";

#[test]
fn full_report_extraction() {
    let result = extract_info_from_text(SAMPLE_REPORT);

    assert_eq!(result.patient_info.name, "John Smith");
    assert_eq!(result.patient_info.age.as_deref(), Some("45"));
    assert_eq!(result.patient_info.gender, Some(Gender::Male));
    assert_eq!(result.patient_info.report_date.as_deref(), Some("12-05-2023"));

    let expected = [
        ("Total Cholesterol", "190"),
        ("HDL", "48"),
        ("LDL", "110"),
        ("Triglycerides", "140"),
        ("Vitamin D", "32.4"),
        ("Vitamin B12", "412"),
        ("Creatinine", "0.9"),
        ("HbA1c", "5.8"),
    ];
    for (name, value) in expected {
        assert_eq!(result.biomarkers.get(name).unwrap().value, value, "{}", name);
    }
}

#[test]
fn panel_always_has_exactly_the_configured_keys() {
    for text in ["", "garbage with no biomarkers", SAMPLE_REPORT] {
        let panel = find_biomarkers(text);
        assert_eq!(panel.len(), BIOMARKER_PANEL.len());
        assert_eq!(
            panel.names().collect::<Vec<_>>(),
            BIOMARKER_PANEL.iter().map(|s| s.name).collect::<Vec<_>>()
        );
    }
}

#[test]
fn first_number_is_the_result_range_discarded() {
    let panel = find_biomarkers("Total Cholesterol 190 mg/dL 125-200");
    assert_eq!(panel.get("Total Cholesterol").unwrap().value, "190");
}

#[test]
fn non_hdl_line_never_populates_total_cholesterol() {
    // Adversarial: the keyword "cholesterol:" literally matches, but the
    // line carries the non-HDL figure. It must be skipped, and the scan
    // must fall through to the later well-formed line.
    let text = "Total Cholesterol: 165 (Non-HDL)\n\
                Total Cholesterol 190 mg/dL 125-200";
    let panel = find_biomarkers(text);
    assert_eq!(panel.get("Total Cholesterol").unwrap().value, "190");

    // Without a later well-formed line the value stays empty.
    let panel = find_biomarkers("Total Cholesterol: 165 (Non-HDL)");
    assert_eq!(panel.get("Total Cholesterol").unwrap().value, "");
}

#[test]
fn combined_pattern_beats_fallback_patterns() {
    // The fallback patterns would recover "Somebody Else" / "99" /
    // Female from the trailing lines; the combined header must win.
    let text = "NAME: JOHN SMITH (45Y/M)\n\
                Patient Name: Somebody Else\n\
                Age: 99\n\
                Gender: Female\n";
    let info = find_patient_info(text);
    assert_eq!(info.name, "John Smith");
    assert_eq!(info.age.as_deref(), Some("45"));
    assert_eq!(info.gender, Some(Gender::Male));
}

#[test]
fn report_date_is_stored_unnormalized() {
    let info = find_patient_info("Report Date: 12-05-2023");
    assert_eq!(info.report_date.as_deref(), Some("12-05-2023"));
}

#[test]
fn insufficient_text_is_a_typed_error() {
    let short = "only forty characters of report text....";
    assert_eq!(short.len(), 40);

    let err = ExtractionPipeline::extract_from_report_text(short).unwrap_err();
    assert!(matches!(err, Error::InsufficientText { chars: 40 }));
    assert!(err.is_insufficient_text());
}

#[test]
fn extractors_are_idempotent() {
    assert_eq!(
        find_patient_info(SAMPLE_REPORT),
        find_patient_info(SAMPLE_REPORT)
    );
    assert_eq!(find_biomarkers(SAMPLE_REPORT), find_biomarkers(SAMPLE_REPORT));
    assert_eq!(
        extract_info_from_text(SAMPLE_REPORT),
        extract_info_from_text(SAMPLE_REPORT)
    );
}

#[test]
fn fallback_patterns_recover_plain_layout() {
    let text = "\
Patient Name: Raju
Age: 32
Sex: M
Collection Date: 3 March 2024
Serum Creatinine 1.1 mg/dL 0.7-1.3
";
    let result = extract_info_from_text(text);
    assert_eq!(result.patient_info.name, "Raju");
    assert_eq!(result.patient_info.age.as_deref(), Some("32"));
    assert_eq!(result.patient_info.gender, Some(Gender::Male));
    assert_eq!(
        result.patient_info.report_date.as_deref(),
        Some("3 March 2024")
    );
    assert_eq!(result.biomarkers.get("Creatinine").unwrap().value, "1.1");
}

#[test]
fn missing_fields_are_absent_not_errors() {
    let text = format!(
        "{}\nno demographics or biomarkers in this block of filler text",
        "lorem ipsum dolor sit amet consectetur adipiscing elit"
    );
    let result = ExtractionPipeline::extract_from_report_text(&text).unwrap();
    assert_eq!(result.patient_info.name, "");
    assert_eq!(result.patient_info.age, None);
    assert_eq!(result.patient_info.gender, None);
    for name in result.biomarkers.names().collect::<Vec<_>>() {
        assert_eq!(result.biomarkers.get(name).unwrap().value, "");
    }
}

#[test]
fn result_serialization_shape() {
    let value = serde_json::to_value(extract_info_from_text(SAMPLE_REPORT)).unwrap();

    let patient = value.get("patientInfo").expect("patientInfo key");
    assert_eq!(patient["name"], "John Smith");
    assert_eq!(patient["report_date"], "12-05-2023");

    let biomarkers = value.get("biomarkers").expect("biomarkers key");
    let obj = biomarkers.as_object().unwrap();
    assert_eq!(obj.len(), 8);
    assert_eq!(obj["HbA1c"]["value"], "5.8");
    assert_eq!(obj["HbA1c"]["unit"], "%");
}
