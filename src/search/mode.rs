use crate::types::SearchMode;

/// Whole words that mark a query as asking about relationships
const RELATIONSHIP_WORDS: &[&str] = &[
    "call",
    "calls",
    "called",
    "caller",
    "callers",
    "calling",
    "callee",
    "callees",
    "depend",
    "depends",
    "depended",
    "depending",
    "dependent",
    "dependents",
    "dependency",
    "dependencies",
    "extend",
    "extends",
    "extended",
    "extending",
    "implement",
    "implements",
    "implemented",
    "implementing",
    "implementor",
    "implementors",
    "implementation",
    "implementations",
    "inherit",
    "inherits",
    "inherited",
    "inheriting",
    "inheritance",
];

/// Pick a retrieval mode from the query text.
///
/// Queries using relationship vocabulary ("who calls", "depends on",
/// "extends") go to structural search; everything else is hybrid.
pub fn detect_mode(query: &str) -> SearchMode {
    let relational = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .any(|w| RELATIONSHIP_WORDS.contains(&w.as_str()));

    if relational {
        SearchMode::Structural
    } else {
        SearchMode::Hybrid
    }
}
