//! End-to-end query flow against the in-memory broker and static registry

use async_trait::async_trait;
use domain_embeddings::{Embedding, EmbeddingError, EmbeddingProvider, EmbeddingResult};
use domain_queries::{
    EventEncoder, LoopState, QueryEvent, QueryLoop, QueryLoopConfig, StaticSchemaRegistry, frame_schema_id,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stream_publisher::{DeliveryOutcome, MemoryBroker, StreamPublisher};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

const TOPIC: &str = "user_query_embeddings";
const SUBJECT: &str = "user_query_embeddings-value";
const SCHEMA_ID: u32 = 100_012;

/// Embeds every query as `[len, 0.5]`, or fails when `down`
#[derive(Default)]
struct FakeEmbedder {
    down: bool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    fn down() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model(&self) -> &str {
        "fake-embedder"
    }

    fn dimension(&self) -> Option<usize> {
        Some(2)
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(EmbeddingError::Unavailable("connection refused".into()));
        }
        Ok(Embedding::new("fake-embedder", vec![text.len() as f64, 0.5]))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Embedding call that never completes
struct StalledEmbedder;

#[async_trait]
impl EmbeddingProvider for StalledEmbedder {
    fn model(&self) -> &str {
        "stalled"
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, _text: &str) -> EmbeddingResult<Embedding> {
        std::future::pending().await
    }

    async fn embed_batch(&self, _texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        std::future::pending().await
    }
}

fn registry() -> StaticSchemaRegistry {
    StaticSchemaRegistry::user_queries(SUBJECT, SCHEMA_ID).expect("default schema parses")
}

fn build_loop(
    embedder: FakeEmbedder,
    publisher: StreamPublisher<MemoryBroker>,
) -> QueryLoop<FakeEmbedder, StaticSchemaRegistry, MemoryBroker> {
    QueryLoop::new(
        embedder,
        EventEncoder::new(registry()),
        publisher,
        QueryLoopConfig::new(TOPIC).with_pace(Duration::ZERO),
    )
}

async fn published_events(publisher: &StreamPublisher<MemoryBroker>) -> Vec<QueryEvent> {
    let decoder = EventEncoder::new(registry());
    let mut events = Vec::new();
    for message in publisher.broker().messages() {
        assert_eq!(message.destination, TOPIC);
        assert_eq!(frame_schema_id(&message.payload).unwrap(), SCHEMA_ID);
        events.push(decoder.decode(&message.payload).await.unwrap());
    }
    events
}

#[tokio::test]
async fn test_embedding_outage_publishes_text_with_null_vector() {
    let mut query_loop = build_loop(FakeEmbedder::down(), StreamPublisher::new(MemoryBroker::new()));
    let (_tx, rx) = watch::channel(false);

    let summary = query_loop.run(&b"pump overheating\nexit\n"[..], tokio::io::sink(), rx).await;

    assert_eq!(summary.queries, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.degraded, 1);
    assert_eq!(summary.encode_failures, 0);
    assert_eq!(summary.drain.delivered, 1);

    let events = published_events(query_loop.publisher()).await;
    assert_eq!(events, vec![QueryEvent::new("pump overheating", None)]);
}

#[tokio::test]
async fn test_queries_are_published_in_order_with_vectors() {
    let mut query_loop = build_loop(FakeEmbedder::default(), StreamPublisher::new(MemoryBroker::new()));
    let (_tx, rx) = watch::channel(false);

    let input = b"bearing noise\n\n  hydraulic leak  \nvalve stuck\n";
    let summary = query_loop.run(&input[..], tokio::io::sink(), rx).await;

    assert_eq!(summary.queries, 3);
    assert_eq!(summary.degraded, 0);

    let events = published_events(query_loop.publisher()).await;
    let texts: Vec<_> = events.iter().filter_map(|e| e.text.as_deref()).collect();
    assert_eq!(texts, ["bearing noise", "hydraulic leak", "valve stuck"]);
    assert_eq!(events[1].vector, Some(vec![14.0, 0.5]));
}

#[tokio::test]
async fn test_shutdown_drains_every_accepted_message() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let publisher = StreamPublisher::new(MemoryBroker::new()).on_delivery(move |outcome| {
        if let DeliveryOutcome::Delivered { .. } = outcome {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let mut query_loop = build_loop(FakeEmbedder::default(), publisher);
    let (_tx, rx) = watch::channel(false);

    let summary = query_loop.run(&b"one\ntwo\nthree\n"[..], tokio::io::sink(), rx).await;

    assert_eq!(summary.published, 3);
    assert_eq!(summary.drain.pending, 0);
    assert_eq!(summary.drain.delivered, 3);
    assert!(summary.drain.is_complete());
    assert_eq!(delivered.load(Ordering::SeqCst), 3);
    assert_eq!(query_loop.state(), LoopState::Shutdown);
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_waiting_for_input() {
    let mut query_loop = build_loop(FakeEmbedder::default(), StreamPublisher::new(MemoryBroker::new()));
    let (tx, rx) = watch::channel(false);
    let (mut writer, reader) = tokio::io::duplex(64);

    let run = tokio::spawn(async move {
        let summary = query_loop.run(tokio::io::BufReader::new(reader), tokio::io::sink(), rx).await;
        (summary, query_loop)
    });

    writer.write_all(b"first query\n").await.unwrap();
    writer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let (summary, query_loop) = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("loop stops after the shutdown signal")
        .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(summary.drain.delivered, 1);
    assert_eq!(query_loop.publisher().broker().messages().len(), 1);
    drop(writer);
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_pacing() {
    let mut query_loop = QueryLoop::new(
        FakeEmbedder::default(),
        EventEncoder::new(registry()),
        StreamPublisher::new(MemoryBroker::new()),
        QueryLoopConfig::new(TOPIC).with_pace(Duration::from_secs(3600)),
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move { query_loop.run(&b"slow\nnever\n"[..], tokio::io::sink(), rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("pacing sleep is interruptible")
        .unwrap();

    assert_eq!(summary.queries, 1);
    assert_eq!(summary.published, 1);
}

#[tokio::test]
async fn test_unknown_subject_counts_encode_failure() {
    let mut query_loop = QueryLoop::new(
        FakeEmbedder::default(),
        EventEncoder::new(registry()),
        StreamPublisher::new(MemoryBroker::new()),
        QueryLoopConfig::new(TOPIC)
            .with_subject("unregistered-value")
            .with_pace(Duration::ZERO),
    );
    let (_tx, rx) = watch::channel(false);

    let summary = query_loop.run(&b"pump overheating\n"[..], tokio::io::sink(), rx).await;

    assert_eq!(summary.queries, 1);
    assert_eq!(summary.encode_failures, 1);
    assert_eq!(summary.published, 0);
    assert!(query_loop.publisher().broker().messages().is_empty());
}

#[tokio::test]
async fn test_shutdown_signal_abandons_query_while_embedding() {
    let mut query_loop = QueryLoop::new(
        StalledEmbedder,
        EventEncoder::new(registry()),
        StreamPublisher::new(MemoryBroker::new()),
        QueryLoopConfig::new(TOPIC).with_pace(Duration::ZERO),
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move {
        let summary = query_loop.run(&b"pump overheating\n"[..], tokio::io::sink(), rx).await;
        (summary, query_loop)
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let (summary, query_loop) = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("loop stops while the embedding call is pending")
        .unwrap();

    assert_eq!(summary.queries, 1);
    assert_eq!(summary.published, 0);
    assert_eq!(summary.degraded, 0);
    assert!(summary.drain.is_complete());
    assert_eq!(query_loop.state(), LoopState::Shutdown);
    assert!(query_loop.publisher().broker().messages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_on_multi_thread_runtime() {
    let mut query_loop = build_loop(FakeEmbedder::default(), StreamPublisher::new(MemoryBroker::new()));
    let (_tx, rx) = watch::channel(false);

    let summary = query_loop.run(&b"bearing noise\nvalve stuck\n"[..], tokio::io::sink(), rx).await;

    assert_eq!(summary.published, 2);
    assert_eq!(summary.drain.delivered, 2);
    assert!(summary.drain.is_complete());
}
