use super::*;
use crate::embedding::HashingEmbedder;
use crate::parser::{SourceFile, parse_batch};

const ORDER_SERVICE: &str = r#"
package com.acme.orders;

@Service
public class OrderService {
    private OrderRepository orders;

    public Order place(Cart cart) { return orders.save(cart.toOrder()); }

    public void cancel(long id) { orders.delete(id); }
}
"#;

fn entities() -> Vec<TypeEntity> {
    let files = vec![
        SourceFile::from_content("OrderService.java", ORDER_SERVICE),
        SourceFile::from_content(
            "Order.java",
            "package com.acme.orders; public class Order { long id; }",
        ),
    ];
    parse_batch(&files, "repo").entities
}

fn pipeline(embedder: Arc<dyn EmbeddingProvider>, batch_size: usize) -> EnrichmentPipeline {
    EnrichmentPipeline::new(
        Arc::new(TemplateDescriber),
        embedder,
        batch_size,
        Duration::from_secs(5),
    )
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Err(EmbeddingError::GenerationFailed("model unavailable".to_string()).into())
    }
    fn dimension(&self) -> usize {
        8
    }
    fn model_name(&self) -> &str {
        "failing"
    }
}

struct ShortEmbedder;

impl EmbeddingProvider for ShortEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![0.0; 8]).collect())
    }
    fn dimension(&self) -> usize {
        8
    }
    fn model_name(&self) -> &str {
        "short"
    }
}

struct WrongDimensionEmbedder;

impl EmbeddingProvider for WrongDimensionEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }
    fn dimension(&self) -> usize {
        8
    }
    fn model_name(&self) -> &str {
        "wrong-dimension"
    }
}

struct SlowEmbedder;

impl EmbeddingProvider for SlowEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        std::thread::sleep(Duration::from_millis(1500));
        Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
    }
    fn dimension(&self) -> usize {
        8
    }
    fn model_name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_enrich_fills_descriptions_and_embeddings() {
    let mut entities = entities();
    let pipeline = pipeline(Arc::new(HashingEmbedder::new(32)), 2);

    let stats = pipeline
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap();

    // 2 types + 2 methods
    assert_eq!(stats.descriptions, 4);
    assert_eq!(stats.embeddings, 4);
    for entity in &entities {
        assert!(!entity.description.is_empty());
        assert_eq!(entity.embedding.as_ref().unwrap().len(), 32);
        for method in &entity.methods {
            assert!(method.description.contains(&method.name));
            assert!(method.embedding.is_some());
        }
    }
    let service = entities.iter().find(|e| e.name == "OrderService").unwrap();
    assert!(service.description.contains("service implementing business logic"));
}

#[tokio::test]
async fn test_embedding_matches_description() {
    let mut entities = entities();
    let embedder = Arc::new(HashingEmbedder::new(32));
    let pipeline = pipeline(embedder.clone(), 8);
    pipeline
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap();

    let method = &entities[0].methods[0];
    assert_eq!(
        method.embedding.as_ref().unwrap(),
        &embedder.embed(&method.description).unwrap()
    );
}

#[tokio::test]
async fn test_provider_failure_is_fatal() {
    let mut entities = entities();
    let err = pipeline(Arc::new(FailingEmbedder), 8)
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("model unavailable"));
}

#[tokio::test]
async fn test_count_mismatch_is_fatal() {
    let mut entities = entities();
    let err = pipeline(Arc::new(ShortEmbedder), 8)
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EmbeddingError>(),
        Some(EmbeddingError::CountMismatch { .. })
    ));
}

#[tokio::test]
async fn test_dimension_mismatch_is_fatal() {
    let mut entities = entities();
    let err = pipeline(Arc::new(WrongDimensionEmbedder), 8)
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EmbeddingError>(),
        Some(EmbeddingError::DimensionMismatch {
            expected: 8,
            actual: 4
        })
    ));
}

#[tokio::test]
async fn test_batch_timeout() {
    let mut entities = entities();
    let pipeline = EnrichmentPipeline::new(
        Arc::new(TemplateDescriber),
        Arc::new(SlowEmbedder),
        8,
        Duration::from_millis(100),
    );
    let err = pipeline
        .enrich(&mut entities, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EmbeddingError>(),
        Some(EmbeddingError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mut entities = entities();
    let token = CancellationToken::new();
    token.cancel();
    let err = pipeline(Arc::new(HashingEmbedder::new(8)), 8)
        .enrich(&mut entities, &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IndexingError>(),
        Some(IndexingError::Cancelled)
    ));
}

#[tokio::test]
async fn test_cancelled_during_batch() {
    let mut entities = entities();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = pipeline(Arc::new(SlowEmbedder), 8)
        .enrich(&mut entities, &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IndexingError>(),
        Some(IndexingError::Cancelled)
    ));
}

#[tokio::test]
async fn test_single_embed() {
    let pipeline = pipeline(Arc::new(HashingEmbedder::new(16)), 8);
    let vector = pipeline.embed("where are orders placed").await.unwrap();
    assert_eq!(vector.len(), 16);
    assert_eq!(pipeline.embedder().model_name(), "feature-hashing");
}

#[tokio::test]
async fn test_empty_input() {
    let pipeline = pipeline(Arc::new(HashingEmbedder::new(16)), 8);
    let stats = pipeline
        .enrich(&mut [], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats, EnrichmentStats::default());
}

#[test]
fn test_describe_helpers() {
    let entities = entities();
    let pipeline = pipeline(Arc::new(HashingEmbedder::new(16)), 8);
    assert!(pipeline.describe_type(&entities[0]).unwrap().contains("OrderService"));
    assert!(pipeline.describe_method(&entities[0], 0).unwrap().contains("place"));
    assert!(pipeline.describe_method(&entities[0], 99).is_err());
}
