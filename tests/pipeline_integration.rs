//! Integration tests for the retrieval pipeline and its trace.
//!
//! Run entirely against in-memory doubles; no network.

mod common;

use common::{connected_settings, scored_chunks, FakeEmbedder, FakeStore};
use ragtrace::config::{StoreConfig, ENV_CONNECTION_STRING};
use ragtrace::rag::trace::TraceStep;
use ragtrace::rag::{build_context, format_context, retrieve_with_deadline, Retriever};
use std::sync::Arc;
use std::time::Duration;

fn retriever(embedder: Arc<FakeEmbedder>, store: Arc<FakeStore>, settings: StoreConfig) -> Retriever {
    Retriever::new(embedder, store, settings)
}

fn elapsed_values(steps: &[TraceStep]) -> Vec<u64> {
    steps.iter().filter_map(|s| s.timing().elapsed_ms).collect()
}

#[tokio::test]
async fn test_successful_trace_order() {
    let embedder = Arc::new(FakeEmbedder::ok(1024));
    let store = Arc::new(FakeStore::ok(scored_chunks(&[
        ("Revenue grew 12% year over year.", 0.91),
        ("Subscriptions drove most of the growth.", 0.85),
    ])));
    let retriever = retriever(embedder.clone(), store.clone(), connected_settings(5));

    let result = retriever.search_rag_with_trace("revenue growth").await;

    assert_eq!(result.chunks.len(), 2);
    assert_eq!(
        result.trace.kinds(),
        vec!["query", "embedding", "vector_search", "chunks"]
    );

    let elapsed = elapsed_values(&result.trace.steps);
    assert_eq!(elapsed.len(), 4);
    assert_eq!(elapsed[0], 0);
    assert!(elapsed.windows(2).all(|w| w[0] <= w[1]), "elapsed not monotonic: {:?}", elapsed);

    match &result.trace.steps[1] {
        TraceStep::Embedding { dimensions, duration_ms, .. } => {
            assert_eq!(*dimensions, 1024);
            assert!(duration_ms.is_some());
        }
        other => panic!("unexpected step {:?}", other),
    }
    match &result.trace.steps[3] {
        TraceStep::Chunks { count, chunks, duration_ms, .. } => {
            assert_eq!(*count, 2);
            assert_eq!(chunks.len(), *count);
            assert_eq!(chunks[0].preview, "Revenue grew 12% year over year.");
            assert_eq!(chunks[0].score, Some(0.91));
            assert!(duration_ms.is_some());
        }
        other => panic!("unexpected step {:?}", other),
    }

    assert_eq!(embedder.call_count(), 1);
    assert_eq!(store.call_count(), 1);
}

#[tokio::test]
async fn test_missing_connection_string() {
    let embedder = Arc::new(FakeEmbedder::ok(1024));
    let store = Arc::new(FakeStore::ok(Vec::new()));
    let retriever = retriever(embedder.clone(), store.clone(), StoreConfig::default());

    let result = retriever
        .search_rag_with_trace("What is the policy on refunds?")
        .await;

    assert!(result.chunks.is_empty());
    assert_eq!(result.trace.kinds(), vec!["query", "config"]);
    match &result.trace.steps[1] {
        TraceStep::Config { message, elapsed_ms } => {
            assert_eq!(message, &format!("{} is not set", ENV_CONNECTION_STRING));
            assert!(elapsed_ms.is_some());
        }
        other => panic!("unexpected step {:?}", other),
    }
    assert_eq!(embedder.call_count(), 0);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_embedding_failure_stops_pipeline() {
    let embedder = Arc::new(FakeEmbedder::failing("Service unavailable"));
    let store = Arc::new(FakeStore::ok(scored_chunks(&[("unused", 0.9)])));
    let retriever = retriever(embedder, store.clone(), connected_settings(5));

    let result = retriever.search_rag_with_trace("revenue growth").await;

    assert!(result.chunks.is_empty());
    assert_eq!(result.trace.kinds(), vec!["query", "embed_error"]);
    match &result.trace.steps[1] {
        TraceStep::EmbedError { message, .. } => {
            assert_eq!(message, "Embeddings request failed: 503 Service unavailable");
        }
        other => panic!("unexpected step {:?}", other),
    }
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_search_failure_recorded() {
    let embedder = Arc::new(FakeEmbedder::ok(8));
    let store = Arc::new(FakeStore::failing("connection refused"));
    let retriever = retriever(embedder, store.clone(), connected_settings(5));

    let result = retriever.search_rag_with_trace("revenue growth").await;

    assert!(result.chunks.is_empty());
    assert_eq!(
        result.trace.kinds(),
        vec!["query", "embedding", "vector_search", "vector_search_error"]
    );
    match result.trace.last() {
        Some(TraceStep::VectorSearchError { message, .. }) => {
            assert_eq!(message, "Vector search failed: connection refused");
        }
        other => panic!("unexpected step {:?}", other),
    }
    // Search is never retried
    assert_eq!(store.call_count(), 1);
}

#[tokio::test]
async fn test_search_rag_never_fails() {
    let cases = vec![
        retriever(
            Arc::new(FakeEmbedder::ok(8)),
            Arc::new(FakeStore::ok(scored_chunks(&[("x", 0.5)]))),
            StoreConfig::default(),
        ),
        retriever(
            Arc::new(FakeEmbedder::failing("boom")),
            Arc::new(FakeStore::ok(scored_chunks(&[("x", 0.5)]))),
            connected_settings(5),
        ),
        retriever(
            Arc::new(FakeEmbedder::ok(8)),
            Arc::new(FakeStore::failing("boom")),
            connected_settings(5),
        ),
    ];

    for retriever in cases {
        assert!(retriever.search_rag("anything").await.is_empty());
    }
}

#[tokio::test]
async fn test_candidate_pool_in_trace_and_request() {
    for (top_k, expected) in [(5, 100), (10, 200)] {
        let store = Arc::new(FakeStore::ok(Vec::new()));
        let retriever = retriever(Arc::new(FakeEmbedder::ok(4)), store.clone(), connected_settings(top_k));

        let result = retriever.search_rag_with_trace("q").await;

        match &result.trace.steps[2] {
            TraceStep::VectorSearch { num_candidates, limit, .. } => {
                assert_eq!(*num_candidates, expected);
                assert_eq!(*limit, top_k);
            }
            other => panic!("unexpected step {:?}", other),
        }

        let requests = store.requests.lock().unwrap();
        let (uri, request) = &requests[0];
        assert_eq!(uri, "mongodb://localhost:27017/kb");
        assert_eq!(request.num_candidates, expected);
        assert_eq!(request.limit, top_k);
        assert_eq!(request.query_vector.len(), 4);
    }
}

#[tokio::test]
async fn test_empty_search_result_still_records_chunks_step() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(Vec::new())),
        connected_settings(5),
    );

    let result = retriever.search_rag_with_trace("q").await;
    assert!(result.chunks.is_empty());
    match result.trace.last() {
        Some(TraceStep::Chunks { count, chunks, .. }) => {
            assert_eq!(*count, 0);
            assert!(chunks.is_empty());
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[tokio::test]
async fn test_revenue_growth_context() {
    let store = Arc::new(FakeStore::ok(scored_chunks(&[
        ("Revenue grew 12% year over year.", 0.91),
        ("Subscription revenue rose to $4.2B.", 0.85),
        ("Services growth slowed in Q4.", 0.80),
    ])));
    let retriever = retriever(Arc::new(FakeEmbedder::ok(1024)), store, connected_settings(5));

    let chunks = retriever.search_rag("revenue growth").await;
    let scores: Vec<_> = chunks.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![Some(0.91), Some(0.85), Some(0.80)]);

    assert_eq!(
        format_context(&chunks),
        "Relevant context from the knowledge base (use this to answer accurately):\n\n\
         [1] Revenue grew 12% year over year.\n\n\
         [2] Subscription revenue rose to $4.2B.\n\n\
         [3] Services growth slowed in Q4."
    );
}

#[tokio::test]
async fn test_long_chunk_preview_truncated() {
    let long_text = "a".repeat(300);
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[(long_text.as_str(), 0.7)]))),
        connected_settings(5),
    );

    let result = retriever.search_rag_with_trace("q").await;

    // Full text reaches the caller, only the trace is shortened
    assert_eq!(result.chunks[0].text.len(), 300);
    match result.trace.last() {
        Some(TraceStep::Chunks { chunks, .. }) => {
            assert_eq!(chunks[0].preview, format!("{}…", "a".repeat(120)));
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_keeps_partial_trace() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(Vec::new()).with_delay(Duration::from_secs(5))),
        connected_settings(5),
    );

    let result = retrieve_with_deadline(&retriever, "q", Duration::from_millis(100)).await;

    assert!(result.chunks.is_empty());
    assert_eq!(
        result.trace.kinds(),
        vec!["query", "embedding", "vector_search", "timeout", "timeout_diagnosis"]
    );
    match &result.trace.steps[3] {
        TraceStep::Timeout { message } => assert_eq!(message, "Retrieval timed out after 100ms"),
        other => panic!("unexpected step {:?}", other),
    }
    match &result.trace.steps[4] {
        TraceStep::TimeoutDiagnosis { message, .. } => {
            assert!(message.contains(ENV_CONNECTION_STRING), "{}", message)
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_during_embedding() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4).with_delay(Duration::from_secs(5))),
        Arc::new(FakeStore::ok(Vec::new())),
        connected_settings(5),
    );

    let result = retrieve_with_deadline(&retriever, "q", Duration::from_millis(100)).await;

    assert_eq!(result.trace.kinds(), vec!["query", "timeout", "timeout_diagnosis"]);
    match result.trace.last() {
        Some(TraceStep::TimeoutDiagnosis { message, .. }) => {
            assert!(message.contains("embedding"), "{}", message)
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_not_hit_matches_plain_run() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[("a", 0.9)]))),
        connected_settings(5),
    );

    let result = retrieve_with_deadline(&retriever, "q", Duration::from_secs(10)).await;
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(
        result.trace.kinds(),
        vec!["query", "embedding", "vector_search", "chunks"]
    );
}

#[tokio::test]
async fn test_build_context_appends_context_step() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[("Refunds are issued within 30 days.", 0.9)]))),
        connected_settings(5),
    );

    let traced = build_context(&retriever, "What is the policy on refunds?", Duration::from_secs(10), 20).await;

    assert!(traced.context.ends_with("[1] Refunds are issued within 30 days."));
    assert_eq!(
        traced.trace.kinds(),
        vec!["query", "embedding", "vector_search", "chunks", "context"]
    );
    match traced.trace.last() {
        Some(TraceStep::Context { formatted_length, snippet, .. }) => {
            assert_eq!(*formatted_length, traced.context.chars().count());
            assert_eq!(snippet, "Relevant context fro");
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[tokio::test]
async fn test_build_context_without_chunks_has_no_context_step() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[("x", 0.9)]))),
        StoreConfig::default(),
    );

    let traced = build_context(&retriever, "q", Duration::from_secs(10), 20).await;
    assert_eq!(traced.context, "");
    assert_eq!(traced.trace.kinds(), vec!["query", "config"]);
}

#[tokio::test]
async fn test_concurrent_calls_have_independent_traces() {
    let ok = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[("a", 0.9)]))),
        connected_settings(5),
    );
    let failing = retriever(
        Arc::new(FakeEmbedder::failing("down")),
        Arc::new(FakeStore::ok(Vec::new())),
        connected_settings(5),
    );

    let (a, b, c) = tokio::join!(
        ok.search_rag_with_trace("first"),
        failing.search_rag_with_trace("second"),
        ok.search_rag_with_trace("third"),
    );

    assert_eq!(a.trace.kinds(), vec!["query", "embedding", "vector_search", "chunks"]);
    assert_eq!(b.trace.kinds(), vec!["query", "embed_error"]);
    assert_eq!(c.trace.kinds(), vec!["query", "embedding", "vector_search", "chunks"]);
    match &c.trace.steps[0] {
        TraceStep::Query { query, .. } => assert_eq!(query, "third"),
        other => panic!("unexpected step {:?}", other),
    }
}

#[test]
fn test_trace_payload_json_roundtrip_shape() {
    let retriever = retriever(
        Arc::new(FakeEmbedder::ok(4)),
        Arc::new(FakeStore::ok(scored_chunks(&[("a", 0.9)]))),
        connected_settings(5),
    );
    let result = tokio_test::block_on(retriever.search_rag_with_trace("q"));

    let value = serde_json::to_value(&result.trace).unwrap();
    let steps = value["steps"].as_array().unwrap();
    assert_eq!(steps[0]["step"], "query");
    assert_eq!(steps[0]["elapsedMs"], 0);
    assert_eq!(steps[2]["numCandidates"], 100);
    assert_eq!(steps[3]["count"], 1);
    assert!(steps[3]["durationMs"].is_number());
}
