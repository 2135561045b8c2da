use super::*;

fn sample_entity() -> EntityRecord {
    EntityRecord {
        id: "type-1".to_string(),
        entity_type: EntityType::Type,
        repository_id: "repo-1".to_string(),
        name: "PaymentService".to_string(),
        fqn: "com.acme.PaymentService".to_string(),
        file_path: "src/main/java/com/acme/PaymentService.java".to_string(),
        detail: Some("class".to_string()),
        description: Some("Payment service handling retries".to_string()),
        source: Some("class PaymentService {}".to_string()),
        start_line: 3,
        end_line: 40,
        owner_id: None,
    }
}

#[test]
fn test_search_mode_parse() {
    assert_eq!("Hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
    assert_eq!(
        "structural".parse::<SearchMode>().unwrap(),
        SearchMode::Structural
    );
    let err = "fuzzy".parse::<SearchMode>().unwrap_err();
    assert!(err.contains("fuzzy"));
}

#[test]
fn test_search_mode_serialization() {
    let json = serde_json::to_string(&SearchMode::Semantic).unwrap();
    assert_eq!(json, "\"semantic\"");
    let mode: SearchMode = serde_json::from_str("\"temporal\"").unwrap();
    assert_eq!(mode, SearchMode::Temporal);
}

#[test]
fn test_search_options_defaults() {
    let options = SearchOptions::default();
    assert!(options.repository_ids.is_empty());
    assert!(options.preferred_mode.is_none());
    assert!(options.max_results.is_none());
    assert!(options.validate().is_ok());
}

#[test]
fn test_search_options_builder() {
    let options = SearchOptions::default()
        .in_repository("repo-1")
        .with_mode(SearchMode::Semantic)
        .with_max_results(5);
    assert_eq!(options.repository_ids, vec!["repo-1".to_string()]);
    assert_eq!(options.preferred_mode, Some(SearchMode::Semantic));
    assert_eq!(options.max_results, Some(5));
}

#[test]
fn test_search_options_rejects_zero_max_results() {
    let options = SearchOptions::default().with_max_results(0);
    let err = options.validate().unwrap_err();
    assert!(err.to_string().contains("max_results"));
}

#[test]
fn test_search_options_rejects_blank_repository_id() {
    let options = SearchOptions::default().in_repository("  ");
    assert!(options.validate().is_err());
}

#[test]
fn test_search_options_deserialize_partial() {
    let options: SearchOptions = serde_json::from_str(r#"{"preferred_mode":"hybrid"}"#).unwrap();
    assert_eq!(options.preferred_mode, Some(SearchMode::Hybrid));
    assert!(options.repository_ids.is_empty());
}

#[test]
fn test_search_result_from_entity() {
    let entity = sample_entity();
    let result = SearchResult::from_entity(&entity, 1.3, SearchMode::Structural);

    assert_eq!(result.entity_id, "type-1");
    assert_eq!(result.fully_qualified_name, "com.acme.PaymentService");
    assert_eq!(result.content, "Payment service handling retries");
    assert_eq!(result.score, 1.0);
    assert_eq!(result.mode, SearchMode::Structural);
}

#[test]
fn test_index_state_serialization() {
    let json = serde_json::to_string(&IndexState::UpToDate).unwrap();
    assert_eq!(json, "\"UP_TO_DATE\"");
    assert_eq!(IndexState::NotIndexed.to_string(), "NOT_INDEXED");
}

#[test]
fn test_up_to_date_outcome() {
    let outcome = IndexOutcome::up_to_date("repo-1".to_string(), Some("abc".to_string()));
    assert!(outcome.reused);
    assert!(outcome.is_success());
    assert_eq!(outcome.types_stored, 0);
    assert_eq!(outcome.commit.as_deref(), Some("abc"));
}

#[test]
fn test_failed_outcome_is_not_success() {
    let mut outcome = IndexOutcome::up_to_date("repo-1".to_string(), None);
    outcome.state = IndexState::Failed;
    outcome.errors.push("embedding timed out".to_string());
    assert!(!outcome.is_success());
}

#[test]
fn test_dependency_tree_serialization() {
    let tree = DependencyTree {
        root: sample_entity(),
        requested_depth: 3,
        depth: 1,
        direction: Direction::Outgoing,
        dependencies: vec![DependencyNode {
            id: "method-1".to_string(),
            name: "com.acme.PaymentService.charge".to_string(),
            entity_type: Some(EntityType::Method),
            relationship: RelationshipType::Declares,
            direction: Direction::Outgoing,
        }],
    };

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["depth"], 1);
    assert_eq!(json["requested_depth"], 3);
    assert_eq!(json["dependencies"][0]["relationship"], "DECLARES");
    assert_eq!(json["direction"], "outgoing");
}
