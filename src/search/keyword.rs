//! Keyword tokenization and field-weighted keyword scoring

use crate::graph::EntityRecord;

/// Words dropped from keyword queries
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "by", "can", "class",
    "code", "do", "does", "find", "for", "from", "get", "has", "have", "how", "i", "in", "into",
    "is", "it", "its", "me", "method", "my", "of", "on", "or", "show", "that", "the", "there",
    "these", "this", "those", "to", "uses", "was", "what", "when", "where", "which", "who",
    "why", "with",
];

/// Weight of a match in the entity's simple name
pub const NAME_WEIGHT: f32 = 3.0;
/// Weight of a match in the qualified name or file path
pub const QUALIFIED_WEIGHT: f32 = 2.0;
/// Weight of a match in the generated description
pub const DESCRIPTION_WEIGHT: f32 = 1.5;
/// Weight of a match in raw source text
pub const SOURCE_WEIGHT: f32 = 1.0;

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Split a query into lowercase keywords.
///
/// Characters outside `[a-z0-9.-_/]` are stripped so package names and
/// paths survive as single tokens; a trailing sentence period is dropped.
/// Tokens shorter than two characters and stop words are discarded, and
/// duplicates keep their first position.
pub fn tokenize_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let cleaned: String = word
            .to_lowercase()
            .chars()
            .filter(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-' | '_' | '/'))
            .collect();
        let token = cleaned.trim_end_matches('.');
        if token.len() < 2 || is_stop_word(token) {
            continue;
        }
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// True when a query reads like a file or package path
pub fn looks_like_path(query: &str) -> bool {
    query.contains('.') || query.contains('/')
}

/// Field-weighted match score in [0, 1] before any entity-type weighting.
///
/// Each keyword contributes the weight of the best field it appears in; the
/// sum is divided by the score of every keyword matching the name.
pub fn keyword_score(entity: &EntityRecord, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let name = entity.name.to_lowercase();
    let fqn = entity.fqn.to_lowercase();
    let path = entity.file_path.to_lowercase();
    let description = entity.description.as_deref().unwrap_or_default().to_lowercase();
    let source = entity.source.as_deref().unwrap_or_default().to_lowercase();

    let total: f32 = keywords
        .iter()
        .map(|k| {
            if name.contains(k.as_str()) {
                NAME_WEIGHT
            } else if fqn.contains(k.as_str()) || path.contains(k.as_str()) {
                QUALIFIED_WEIGHT
            } else if description.contains(k.as_str()) {
                DESCRIPTION_WEIGHT
            } else if source.contains(k.as_str()) {
                SOURCE_WEIGHT
            } else {
                0.0
            }
        })
        .sum();

    (total / (NAME_WEIGHT * keywords.len() as f32)).clamp(0.0, 1.0)
}
