//! Turns a free-text ingredient line into a canonical search term.
//!
//! Quantity/unit runs ("200g", "2 顆", "1/2 cup") and filler qualifiers
//! ("about", "少許") are removed. Both Traditional Chinese and English
//! vocabularies are recognised.

use regex::Regex;
use std::sync::OnceLock;

const CHINESE_UNITS: &[&str] = &[
    "公克", "公斤", "毫升", "公升", "大匙", "小匙", "茶匙", "湯匙", "克", "杯", "顆", "個", "片",
    "匙", "條", "根", "塊", "碗", "把", "瓣", "隻", "支", "包", "罐", "斤", "兩",
];

const ENGLISH_UNITS: &[&str] = &[
    "kilograms", "kilogram", "grams", "gram", "kg", "mg", "g", "ml", "l", "ounces", "ounce", "oz",
    "pounds", "pound", "lbs", "lb", "cups", "cup", "tablespoons", "tablespoon", "tbsp",
    "teaspoons", "teaspoon", "tsp", "pieces", "piece", "pcs", "slices", "slice", "cloves",
    "clove", "cans", "can", "pinches", "pinch",
];

const CHINESE_FILLERS: &[&str] = &["大約", "少許", "適量", "一些", "些許", "一點", "左右", "約"];

const ENGLISH_FILLERS: &[&str] = &[
    "a handful of", "a pinch of", "a little", "approximately", "approx.", "to taste", "around",
    "about", "some",
];

fn alternation(words: &[&str]) -> String {
    words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|")
}

fn quantity_unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let number = r"(?:\d+(?:[./]\d+)?|[½¼¾⅓⅔]|[一二三四五六七八九十半兩]+)";
        let pattern = format!(
            r"(?i){number}\s*(?:(?:{zh})|(?:{en})\b)",
            zh = alternation(CHINESE_UNITS),
            en = alternation(ENGLISH_UNITS),
        );
        Regex::new(&pattern).expect("quantity/unit pattern is valid")
    })
}

fn filler_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // English fillers are whitespace-delimited: `\b` never matches after `approx.`.
        let pattern = format!(
            r"(?i)(?:{zh})|(?:^|\s)(?:{en})(?:\s|$)",
            zh = alternation(CHINESE_FILLERS),
            en = alternation(ENGLISH_FILLERS),
        );
        Regex::new(&pattern).expect("filler pattern is valid")
    })
}

fn leftover_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d+(?:[./]\d+)?|[½¼¾⅓⅔]").expect("number pattern is valid")
    })
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s,，、()（）:：~\-]+").expect("separator pattern is valid"))
}

/// Canonical search term for `raw`. Never empty: if nothing survives
/// cleaning, `raw` is handed back untouched.
pub fn normalize(raw: &str) -> String {
    let without_quantities = quantity_unit_pattern().replace_all(raw, " ");
    // Adjacent fillers share a delimiter ("about some rice"), so repeat until stable.
    let mut cleaned = without_quantities.into_owned();
    loop {
        let next = filler_pattern().replace_all(&cleaned, " ").into_owned();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    let cleaned = leftover_number_pattern().replace_all(&cleaned, " ");
    let cleaned = separator_pattern().replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        raw.to_string()
    } else {
        cleaned.to_string()
    }
}
