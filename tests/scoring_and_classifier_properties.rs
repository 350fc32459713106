//! spec.md §8 property 6 (classifier determinism) and property 7 (score clamping + grade
//! monotonicity), run as black-box checks against the public `classifier`/`scoring` APIs.

use pdfua_tagger::classifier::{classify_document, PageLayout};
use pdfua_tagger::layout::{BBox, ImageBlock, TextBlock};
use pdfua_tagger::scoring::score;
use pdfua_tagger::validator::{CheckContext, ValidationFailure, ValidationRecord, ValidationSummary};

fn text_block(index: usize, text: &str, size: f64, bold: bool, y: f64) -> TextBlock {
    TextBlock {
        block_index: index,
        text: text.to_string(),
        font_size_max: size,
        is_bold: bold,
        bbox: (0.0, y, 200.0, y + size),
    }
}

fn sample_pages() -> Vec<PageLayout> {
    vec![PageLayout {
        text_blocks: vec![
            text_block(0, "A Very Important Heading", 24.0, true, 700.0),
            text_block(1, "This is a body paragraph with enough words to read naturally on the page.", 11.0, false, 650.0),
            text_block(2, "A Secondary Heading", 16.0, false, 600.0),
            text_block(3, "\u{E010} \u{E011}", 12.0, false, 550.0),
        ],
        image_blocks: vec![ImageBlock { block_index: 4, bbox: (10.0, 10.0, 60.0, 60.0) as BBox, xobject_name: "Im0".to_string() }],
    }]
}

#[test]
fn classifier_is_deterministic_across_repeated_runs() {
    let pages = sample_pages();
    let first = classify_document(&pages);
    let second = classify_document(&pages);
    let third = classify_document(&pages);

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn classifier_gives_same_roles_regardless_of_call_count() {
    let pages = sample_pages();
    let roles_a: Vec<_> = classify_document(&pages)[0].iter().map(|b| b.role).collect();
    let roles_b: Vec<_> = classify_document(&pages)[0].iter().map(|b| b.role).collect();
    assert_eq!(roles_a, roles_b);
}

fn failure(clause: &str, test_number: i64) -> ValidationFailure {
    ValidationFailure {
        clause: clause.to_string(),
        test_number,
        description: "synthetic failure for property testing".to_string(),
        checks: vec![CheckContext { context: "/Document".to_string() }],
    }
}

fn record(passed_rules: u32, failed_rules: u32, failures: Vec<ValidationFailure>) -> ValidationRecord {
    ValidationRecord {
        compliant: failed_rules == 0,
        profile: "ua1".to_string(),
        summary: ValidationSummary { passed_rules, failed_rules, passed_checks: 0, failed_checks: 0 },
        failures,
    }
}

#[test]
fn score_is_always_clamped_to_0_100_even_with_many_critical_failures() {
    let many_failures: Vec<ValidationFailure> = (0..50).map(|i| failure("7.1", 2 + i)).collect();
    let result = score(&record(0, 50, many_failures));
    assert!(result.value >= 0 && result.value <= 100);
}

#[test]
fn score_is_100_and_clamped_with_zero_denominator_and_no_failures() {
    let result = score(&record(0, 0, vec![]));
    assert_eq!(result.value, 100);
    assert_eq!(result.grade.as_str(), "A");
}

#[test]
fn grade_mapping_is_monotonic_in_score() {
    // More failures (same severity mix) must never produce a strictly better score, and
    // the letter grade boundaries must stay ordered A >= B >= C >= D >= F as failures grow.
    let mut previous_value = 100;
    for failed in [0u32, 2, 5, 10, 20, 40] {
        let failures: Vec<ValidationFailure> = (0..failed).map(|i| failure("7.2", i as i64 + 100)).collect();
        let result = score(&record(40u32.saturating_sub(failed), failed, failures));
        assert!(result.value <= previous_value, "score must not increase as failures grow");
        previous_value = result.value;
    }
}

#[test]
fn grade_letters_are_ordered_consistently_with_score_thresholds() {
    for (value, expected) in [(100, "A"), (90, "A"), (89, "B"), (80, "B"), (79, "C"), (70, "C"), (69, "D"), (60, "D"), (59, "F"), (0, "F")] {
        // Build a record whose base_score lands exactly at `value` with no failures, to
        // probe the grade boundary directly.
        let result = score(&record(value as u32, (100 - value) as u32, vec![]));
        assert_eq!(result.grade.as_str(), expected, "score {value} should grade {expected}");
    }
}
