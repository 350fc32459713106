//! The MorphMind score (spec.md §6): a pure function of a [`ValidationRecord`] with no
//! knowledge of the PDF itself. Takes a validator report, hands back a 0-100 score, a
//! letter grade, and a breakdown across six categories a document owner can act on.

use std::collections::HashMap;

use crate::validator::{ValidationFailure, ValidationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Severity {
    fn weight(self) -> f64 {
        match self {
            Self::Critical => 10.0,
            Self::Serious => 7.0,
            Self::Moderate => 3.0,
            Self::Minor => 1.0,
        }
    }
}

/// Per-(clause, test_number) severity overrides for failures that don't follow the
/// clause-prefix default. PDF/UA-1 clause 7 (structure) test 1 is "document is not
/// tagged at all" -- worse than a generic structure nit, so it's bumped to critical.
/// Clause 7 test 9 (heading level skip) is cosmetic by comparison, demoted to minor.
fn severity_override(clause: &str, test_number: i64) -> Option<Severity> {
    match (clause, test_number) {
        ("7.1", 1) => Some(Severity::Critical),
        ("7.1", 9) => Some(Severity::Minor),
        _ => None,
    }
}

/// Default severity by clause prefix, used when no override applies. Clause numbers
/// follow ISO 14289-1's section layout: 7.1 general structure, 7.2 headings, 7.3 language,
/// 7.18 metadata and viewer preferences, 7.21 graphics/figures.
fn default_severity(clause: &str) -> Severity {
    match clause_section(clause) {
        Some("1") => Severity::Serious,
        Some("2") => Severity::Moderate,
        Some("18") => Severity::Moderate,
        Some("21") => Severity::Serious,
        _ => Severity::Moderate,
    }
}

fn severity_of(failure: &ValidationFailure) -> Severity {
    severity_override(&failure.clause, failure.test_number).unwrap_or_else(|| default_severity(&failure.clause))
}

/// The six categories a score breaks down into (spec.md §6). Order here is the display
/// order; `category_scores` in [`Score`] always carries all six, even at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Structure,
    Language,
    Figures,
    Links,
    Fonts,
    Metadata,
}

impl Category {
    fn key(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Language => "language",
            Self::Figures => "figures",
            Self::Links => "links",
            Self::Fonts => "fonts",
            Self::Metadata => "metadata",
        }
    }

    const ALL: [Category; 6] = [
        Category::Structure,
        Category::Language,
        Category::Figures,
        Category::Links,
        Category::Fonts,
        Category::Metadata,
    ];
}

/// The clause's second dot-separated segment, e.g. `"21"` for `"7.21"`. Compared as a
/// whole segment rather than a string prefix, since `"7.21".starts_with("7.2")` would
/// otherwise wrongly catch clause 7.21 (graphics) under the 7.2 (headings) rule.
fn clause_section(clause: &str) -> Option<&str> {
    clause.split('.').nth(1)
}

/// Routes a failure to the category its description is actually about. Clause section is
/// checked first (it is the more reliable signal); the description is scanned for
/// keywords only when the clause alone is ambiguous (7.1 covers several categories'
/// worth of checks) or unrecognised. Exposed so the `validate` CLI command can list
/// failures in the same structure-before-alt-text order the category table implies.
pub fn categorize(failure: &ValidationFailure) -> Category {
    let description = failure.description.to_lowercase();
    let section = clause_section(&failure.clause);

    match section {
        Some("3") => return Category::Language,
        Some("18") => return Category::Metadata,
        Some("2") => return Category::Structure,
        Some("21") => return Category::Figures,
        _ => {}
    }

    let keyword_hits: &[(&str, Category)] = &[
        ("alt", Category::Figures),
        ("alternate description", Category::Figures),
        ("figure", Category::Figures),
        ("formula", Category::Figures),
        ("image", Category::Figures),
        ("link", Category::Links),
        ("annotation", Category::Links),
        ("contents", Category::Links),
        ("font", Category::Fonts),
        ("glyph", Category::Fonts),
        ("embed", Category::Fonts),
        ("cmap", Category::Fonts),
        ("metadata", Category::Metadata),
        ("xmp", Category::Metadata),
        ("title", Category::Metadata),
        ("viewerpreferences", Category::Metadata),
        ("markinfo", Category::Metadata),
        ("language", Category::Language),
        ("lang", Category::Language),
    ];

    for (keyword, category) in keyword_hits {
        if description.contains(keyword) {
            return *category;
        }
    }

    Category::Structure
}

/// Letter grade banding: A >= 90, B >= 80, C >= 70, D >= 60, else F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    fn from_score(score: i64) -> Self {
        match score {
            s if s >= 90 => Self::A,
            s if s >= 80 => Self::B,
            s if s >= 70 => Self::C,
            s if s >= 60 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

/// The MorphMind score: overall 0-100 value, its letter grade, and a per-category
/// breakdown, each also clamped to 0-100.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub value: i64,
    pub grade: Grade,
    pub category_scores: HashMap<&'static str, i64>,
}

const PENALTY_CAP: f64 = 50.0;

/// Computes the MorphMind score from a validator record. Pure: no PDF, no I/O, no
/// clock -- same record always yields the same score.
pub fn score(record: &ValidationRecord) -> Score {
    let passed = record.summary.passed_rules as f64;
    let failed = record.summary.failed_rules as f64;
    let base_score = if passed + failed == 0.0 { 100.0 } else { 100.0 * passed / (passed + failed) };

    let mut severity_totals: HashMap<Severity, f64> = HashMap::new();
    let mut category_penalty: HashMap<Category, f64> = HashMap::new();

    for failure in &record.failures {
        let severity = severity_of(failure);
        *severity_totals.entry(severity).or_insert(0.0) += 1.0;

        let category = categorize(failure);
        *category_penalty.entry(category).or_insert(0.0) += 5.0 * severity.weight();
    }

    let critical = *severity_totals.get(&Severity::Critical).unwrap_or(&0.0);
    let serious = *severity_totals.get(&Severity::Serious).unwrap_or(&0.0);
    let moderate = *severity_totals.get(&Severity::Moderate).unwrap_or(&0.0);
    let minor = *severity_totals.get(&Severity::Minor).unwrap_or(&0.0);

    let penalty = (8.0 * critical + 4.0 * serious + 1.5 * moderate + 0.5 * minor).min(PENALTY_CAP);
    let value = (base_score - penalty).round().clamp(0.0, 100.0) as i64;
    let grade = Grade::from_score(value);

    let mut category_scores = HashMap::new();
    for category in Category::ALL {
        let penalty = category_penalty.get(&category).copied().unwrap_or(0.0);
        let category_score = (100.0 - penalty).clamp(0.0, 100.0).round() as i64;
        category_scores.insert(category.key(), category_score);
    }

    Score { value, grade, category_scores }
}
