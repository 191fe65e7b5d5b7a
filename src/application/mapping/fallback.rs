//! Static keyword table used when the store cannot resolve an input.

use crate::domain::{DEFAULT_CATEGORY, MappingResult, ResultSource, contains_phrase};

const EXACT_CONFIDENCE: f64 = 0.5;
const CONTAINED_CONFIDENCE: f64 = 0.4;
const DEFAULT_CONFIDENCE: f64 = 0.3;

const ENGLISH: &[(&str, &str)] = &[
    ("food", "Food & Dining"),
    ("restaurant", "Food & Dining"),
    ("coffee", "Food & Dining"),
    ("taxi", "Transportation"),
    ("uber", "Transportation"),
    ("hotel", "Travel"),
    ("shopping", "Shopping"),
    ("grocery", "Groceries"),
    ("hospital", "Healthcare"),
    ("movie", "Entertainment"),
];

const THAI: &[(&str, &str)] = &[
    ("อาหาร", "Food & Dining"),
    ("ร้านอาหาร", "Food & Dining"),
    ("กาแฟ", "Food & Dining"),
    ("แท็กซี่", "Transportation"),
    ("โรงแรม", "Travel"),
    ("ซื้อของ", "Shopping"),
    ("ตลาด", "Groceries"),
    ("โรงพยาบาล", "Healthcare"),
    ("หนัง", "Entertainment"),
];

fn table(language: &str) -> &'static [(&'static str, &'static str)] {
    match language {
        "en" => ENGLISH,
        "th" => THAI,
        _ => &[],
    }
}

/// Resolves `normalized` against the fallback table.
///
/// Always returns a categorized result with `fallback_used` set: an exact
/// keyword, then a keyword occurring as a whole word, then the default category.
pub fn fallback_result(normalized: &str, language: &str) -> MappingResult {
    let entries = table(language);

    if let Some((_, category)) = entries.iter().find(|(keyword, _)| *keyword == normalized) {
        return MappingResult::fallback(*category, EXACT_CONFIDENCE, ResultSource::Fallback);
    }

    if let Some((_, category)) = entries
        .iter()
        .find(|(keyword, _)| contains_phrase(normalized, keyword))
    {
        return MappingResult::fallback(*category, CONTAINED_CONFIDENCE, ResultSource::Fallback);
    }

    MappingResult::fallback(DEFAULT_CATEGORY, DEFAULT_CONFIDENCE, ResultSource::DefaultFallback)
}
