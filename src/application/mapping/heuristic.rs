use crate::domain::{Suggestion, SuggestionSource};

/// Confidence attached to every keyword-based suggestion.
pub const HEURISTIC_CONFIDENCE: f64 = 0.6;

type KeywordTable = &'static [(&'static str, &'static [&'static str])];

const ENGLISH: KeywordTable = &[
    ("Food & Dining", &["food", "restaurant", "cafe", "coffee", "meal", "dining"]),
    ("Transportation", &["taxi", "uber", "transport", "bus", "train", "ride"]),
    ("Shopping", &["shop", "store", "mall", "buy", "purchase"]),
    ("Travel", &["hotel", "booking", "travel", "flight", "accommodation"]),
    ("Groceries", &["grocery", "supermarket", "market"]),
    ("Healthcare", &["hospital", "doctor", "medical", "pharmacy"]),
    ("Entertainment", &["movie", "game", "entertainment", "cinema"]),
    ("Utilities", &["electric", "water", "internet", "phone", "utility"]),
];

const THAI: KeywordTable = &[
    ("Food & Dining", &["อาหาร", "ร้าน", "กิน", "ทาน", "กาแฟ", "เครื่องดื่ม", "ข้าว"]),
    ("Transportation", &["แท็กซี่", "รถ", "เดินทาง", "วิน", "grab", "bolt"]),
    ("Shopping", &["ซื้อ", "ช้อป", "ห้าง", "ตลาด"]),
    ("Travel", &["โรงแรม", "ที่พัก", "เที่ยว", "จอง"]),
    ("Groceries", &["ซุปเปอร์", "เซเว่น", "บิ๊กซี", "ท็อปส์"]),
    ("Healthcare", &["โรงพยาบาล", "หมอ", "ยา", "คลินิก"]),
    ("Entertainment", &["หนัง", "เกม", "บันเทิง"]),
    ("Utilities", &["ไฟฟ้า", "น้ำ", "บิล", "อินเทอร์เน็ต"]),
];

/// Proposes a category for unmapped text from keyword lists.
///
/// Keywords match as substrings so Thai text, which has no word spacing,
/// still hits. The first category with a matching keyword wins. Languages
/// other than Thai use the English lists.
pub fn suggest_category(normalized: &str, language: &str) -> Option<Suggestion> {
    let table = if language == "th" { THAI } else { ENGLISH };
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| normalized.contains(*keyword)))
        .map(|(category, _)| Suggestion {
            category: (*category).to_string(),
            confidence: HEURISTIC_CONFIDENCE,
            source: SuggestionSource::Heuristic,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_keywords() {
        let suggestion = suggest_category("late ride home", "en").unwrap();
        assert_eq!(suggestion.category, "Transportation");
        assert_eq!(suggestion.confidence, HEURISTIC_CONFIDENCE);
        assert_eq!(suggestion.source, SuggestionSource::Heuristic);
    }

    #[test]
    fn test_substring_matching_follows_table_order() {
        // "coffeeshop" contains both "coffee" and "shop"; food is listed first.
        let suggestion = suggest_category("coffeeshop", "en").unwrap();
        assert_eq!(suggestion.category, "Food & Dining");
    }

    #[test]
    fn test_thai_keywords() {
        let suggestion = suggest_category("ค่ารถไปทำงาน", "th").unwrap();
        assert_eq!(suggestion.category, "Transportation");
    }

    #[test]
    fn test_no_match() {
        assert!(suggest_category("zxqv", "en").is_none());
        assert!(suggest_category("", "th").is_none());
    }
}
