use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::nlp::RawEntity;

/// Normalized view of one message's entities. Transient: either folded into
/// the conversation context or consumed immediately.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedEntities {
    pub amount: Option<f64>,
    pub item: Option<String>,
    pub persons: Vec<String>,
}

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

const WRITTEN_NUMBERS: &[(&str, f64)] = &[
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("hundred", 100.0),
    ("thousand", 1000.0),
];

/// Parse a number out of a raw entity value. Handles spelled-out small
/// numbers, then falls back to the first digit run (with optional decimal).
/// Never errors: unparseable input yields `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let lowered = raw.trim().to_lowercase();
    if let Some((_, value)) = WRITTEN_NUMBERS.iter().find(|(word, _)| *word == lowered) {
        return Some(*value);
    }

    NUMBER_RE
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Turn raw NLP entity tuples into a structured record: first AMOUNT (parsed),
/// first ITEM (verbatim), every PERSON in mention order. Also used over a
/// single synthesized tuple when a follow-up reply has to be reinterpreted as
/// one entity kind.
pub fn extract_entities(entities: &[RawEntity]) -> ExtractedEntities {
    let mut extracted = ExtractedEntities::default();

    if let Some(amount) = entities.iter().find(|e| e.entity == "AMOUNT") {
        extracted.amount = parse_amount(&amount.value);
    }

    if let Some(item) = entities.iter().find(|e| e.entity == "ITEM") {
        extracted.item = Some(item.value.clone());
    }

    extracted.persons = entities
        .iter()
        .filter(|e| e.entity == "PERSON")
        .map(|e| e.value.clone())
        .collect();

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: &str, value: &str) -> RawEntity {
        RawEntity::new(kind, value)
    }

    #[test]
    fn extracts_amount_item_and_person() {
        let entities = vec![
            entity("AMOUNT", "500"),
            entity("ITEM", "groceries"),
            entity("PERSON", "Kamal"),
        ];
        let extracted = extract_entities(&entities);
        assert_eq!(extracted.amount, Some(500.0));
        assert_eq!(extracted.item.as_deref(), Some("groceries"));
        assert_eq!(extracted.persons, vec!["Kamal".to_string()]);
    }

    #[test]
    fn takes_first_amount_and_item_but_all_persons() {
        let entities = vec![
            entity("AMOUNT", "100"),
            entity("AMOUNT", "200"),
            entity("ITEM", "taxi"),
            entity("ITEM", "lunch"),
            entity("PERSON", "Kamal"),
            entity("PERSON", "Nimal"),
            entity("PERSON", "Kamal"),
        ];
        let extracted = extract_entities(&entities);
        assert_eq!(extracted.amount, Some(100.0));
        assert_eq!(extracted.item.as_deref(), Some("taxi"));
        // Mention order preserved, duplicates kept.
        assert_eq!(extracted.persons, vec!["Kamal", "Nimal", "Kamal"]);
    }

    #[test]
    fn empty_entity_list_yields_defaults() {
        let extracted = extract_entities(&[]);
        assert_eq!(extracted, ExtractedEntities::default());
    }

    #[test]
    fn parses_spelled_out_numbers() {
        assert_eq!(parse_amount("five"), Some(5.0));
        assert_eq!(parse_amount(" Thousand "), Some(1000.0));
    }

    #[test]
    fn parses_first_digit_run_with_decimals() {
        assert_eq!(parse_amount("500"), Some(500.0));
        assert_eq!(parse_amount("Rs. 1250.50 total"), Some(1250.5));
        assert_eq!(parse_amount("12 and 34"), Some(12.0));
    }

    #[test]
    fn unparseable_amount_is_absent_not_an_error() {
        assert_eq!(parse_amount("a lot"), None);
        assert_eq!(parse_amount(""), None);
        let extracted = extract_entities(&[entity("AMOUNT", "plenty")]);
        assert_eq!(extracted.amount, None);
    }

    #[test]
    fn works_over_a_single_synthesized_tuple() {
        let extracted = extract_entities(&[entity("PERSON", "Kamal")]);
        assert_eq!(extracted.persons, vec!["Kamal"]);
        assert_eq!(extracted.amount, None);
    }
}
