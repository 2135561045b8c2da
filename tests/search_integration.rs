//! Search and graph navigation through the public client
mod common;

use anyhow::Result;
use common::{offline_config, shop_origin};
use repograph::{
    Direction, EntityType, RelationshipType, RepoGraphClient, SearchMode, SearchOptions,
    SearchResult,
};
use tempfile::TempDir;

async fn indexed_client(temp: &TempDir) -> Result<(RepoGraphClient, String)> {
    let origin = shop_origin(temp);
    let client = RepoGraphClient::with_config(offline_config(temp)).await?;
    let outcome = client.ensure_indexed(&origin.url(), "main").await?;
    assert!(outcome.is_success(), "{:?}", outcome.errors);
    Ok((client, outcome.repository_id))
}

fn by_fqn<'a>(results: &'a [SearchResult], fqn: &str) -> Option<&'a SearchResult> {
    results.iter().find(|r| r.fully_qualified_name == fqn)
}

async fn entity_id(client: &RepoGraphClient, name: &str, fqn: &str) -> Result<String> {
    let results = client.search(name, &SearchOptions::default()).await?;
    let hit = by_fqn(&results, fqn).unwrap_or_else(|| panic!("{} not found in {:?}", fqn, results));
    Ok(hit.entity_id.clone())
}

#[tokio::test]
async fn test_exact_name_wins_in_hybrid() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;

    let results = client.search("placeOrder", &SearchOptions::default()).await?;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.score == 1.0));
    assert!(results.iter().all(|r| r.mode == SearchMode::Hybrid));
    assert!(results.iter().all(|r| r.entity_type == EntityType::Method));
    assert!(by_fqn(&results, "com.shop.orders.OrderApi.placeOrder").is_some());
    assert!(by_fqn(&results, "com.shop.orders.OrderService.placeOrder").is_some());
    Ok(())
}

#[tokio::test]
async fn test_structural_query_detected() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;

    let results = client
        .search("who calls PaymentClient", &SearchOptions::default())
        .await?;
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.mode == SearchMode::Structural));

    let top = &results[0];
    assert_eq!(top.fully_qualified_name, "com.shop.payments.PaymentClient");
    assert_eq!(top.entity_type, EntityType::Type);
    Ok(())
}

#[tokio::test]
async fn test_semantic_mode_scores_within_bounds() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, repository_id) = indexed_client(&temp).await?;

    let options = SearchOptions::default()
        .in_repository(repository_id.clone())
        .with_mode(SearchMode::Semantic)
        .with_max_results(3);
    let results = client
        .search("authorize payment for an order", &options)
        .await?;
    assert!(results.len() <= 3);
    for result in &results {
        assert_eq!(result.repository_id, repository_id);
        assert!(result.score > 0.0);
    }
    Ok(())
}

#[tokio::test]
async fn test_temporal_mode_is_empty() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;

    let options = SearchOptions::default().with_mode(SearchMode::Temporal);
    assert!(client.search("OrderService", &options).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_queries_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;

    assert!(client.search("   ", &SearchOptions::default()).await.is_err());
    let zero = SearchOptions::default().with_max_results(0);
    assert!(client.search("OrderService", &zero).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_dependencies_of_method() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;
    let place_order = entity_id(&client, "placeOrder", "com.shop.orders.OrderService.placeOrder").await?;

    let outgoing = client
        .find_dependencies(&place_order, 1, Direction::Outgoing)
        .await?;
    assert_eq!(outgoing.root.id, place_order);
    assert!(outgoing.dependencies.iter().any(|d| {
        d.relationship == RelationshipType::Calls
            && d.name == "com.shop.payments.PaymentClient.authorize"
    }));
    assert!(outgoing.dependencies.iter().all(|d| d.direction == Direction::Outgoing));

    let incoming = client
        .find_dependencies(&place_order, 1, Direction::Incoming)
        .await?;
    assert!(incoming.dependencies.iter().any(|d| {
        d.relationship == RelationshipType::Declares && d.name == "com.shop.orders.OrderService"
    }));

    assert!(client.find_dependencies(&place_order, 0, Direction::Both).await.is_err());
    assert!(
        client
            .find_dependencies("no-such-entity", 1, Direction::Both)
            .await
            .is_err()
    );
    Ok(())
}

#[tokio::test]
async fn test_inheritance_is_linked() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;
    let service = entity_id(&client, "OrderService", "com.shop.orders.OrderService").await?;

    let tree = client
        .find_dependencies(&service, 1, Direction::Outgoing)
        .await?;
    assert!(tree.dependencies.iter().any(|d| {
        d.relationship == RelationshipType::Implements && d.name == "com.shop.orders.OrderApi"
    }));
    assert!(tree.dependencies.iter().any(|d| {
        d.relationship == RelationshipType::Extends && d.name == "com.shop.orders.BaseService"
    }));
    Ok(())
}

#[tokio::test]
async fn test_explain_call_chain() -> Result<()> {
    let temp = TempDir::new()?;
    let (client, _) = indexed_client(&temp).await?;
    let place_order = entity_id(&client, "placeOrder", "com.shop.orders.OrderService.placeOrder").await?;
    let send = entity_id(&client, "send", "com.shop.payments.PaymentClient.send").await?;

    let path = client.explain_relationship(&place_order, &send).await?;
    assert!(path.found);
    assert_eq!(path.steps.len(), 2);
    assert!(path.steps.iter().all(|s| s.relationship == RelationshipType::Calls && s.forward));
    assert_eq!(path.steps[0].from_id, place_order);
    assert_eq!(path.steps[1].to_id, send);

    let reverse = client.explain_relationship(&send, &place_order).await?;
    assert!(reverse.found);
    assert_eq!(reverse.steps.len(), 2);
    assert!(reverse.steps.iter().all(|s| !s.forward));
    Ok(())
}
