//! Interactive query loop
//!
//! Reads one query per line, embeds it, encodes it and publishes it, one
//! query at a time. Shutdown (an `exit` line, end of input, or the shutdown
//! signal) always ends with a bounded drain of the publisher.
//!
//! ```text
//! Idle → AwaitingInput → EmbeddingInFlight → Encoding → Publishing → Idle
//!              │
//!              └──────────────► Shutdown (drain)
//! ```

use core_config::{ConfigError, FromEnv, env_optional, env_parse_or, env_required_any};
use domain_embeddings::EmbeddingProvider;
use std::time::Duration;
use stream_publisher::{DrainReport, StreamBroker, StreamPublisher};
use strum::Display;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task::block_in_place;
use tracing::{debug, info, instrument, warn};

use crate::encoder::EventEncoder;
use crate::error::QueryResult;
use crate::models::QueryEvent;
use crate::registry::{SchemaRegistry, value_subject};

pub const PROMPT: &str = "Enter your query (or 'exit' to quit): ";
pub const EXIT_COMMAND: &str = "exit";
pub const FLUSH_NOTICE: &str = "Flushing remaining messages...\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    Idle,
    AwaitingInput,
    EmbeddingInFlight,
    Encoding,
    Publishing,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct QueryLoopConfig {
    pub topic: String,
    /// Registry subject; defaults to `{topic}-value`
    pub subject: String,
    /// Pause after each publish
    pub pace: Duration,
    /// Upper bound on the final drain
    pub drain_timeout: Duration,
}

impl QueryLoopConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            subject: value_subject(&topic),
            topic,
            pace: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

impl FromEnv for QueryLoopConfig {
    /// - `QUERY_TOPIC` or `CC_TOPIC_USER_QUERY` (required)
    /// - `QUERY_SUBJECT` (default: `{QUERY_TOPIC}-value`)
    /// - `QUERY_PACE_MS` (default: 500)
    /// - `DRAIN_TIMEOUT_SECS` (default: 30)
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required_any(&["QUERY_TOPIC", "CC_TOPIC_USER_QUERY"])?)
            .with_pace(Duration::from_millis(env_parse_or("QUERY_PACE_MS", 500)?))
            .with_drain_timeout(Duration::from_secs(env_parse_or("DRAIN_TIMEOUT_SECS", 30)?));
        if let Some(subject) = env_optional("QUERY_SUBJECT") {
            config = config.with_subject(subject);
        }
        Ok(config)
    }
}

/// What happened during one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Non-blank, non-exit lines read
    pub queries: u64,
    /// Events handed to the publisher
    pub published: u64,
    /// Events published without a vector
    pub degraded: u64,
    /// Queries dropped because encoding failed
    pub encode_failures: u64,
    pub drain: DrainReport,
}

/// Encoded event ready to publish
struct PreparedEvent {
    payload: Vec<u8>,
    degraded: bool,
}

/// Resolves once shutdown is requested; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct QueryLoop<P, R, B>
where
    P: EmbeddingProvider,
    R: SchemaRegistry,
    B: StreamBroker,
{
    provider: P,
    encoder: EventEncoder<R>,
    publisher: StreamPublisher<B>,
    config: QueryLoopConfig,
    state: LoopState,
}

impl<P, R, B> QueryLoop<P, R, B>
where
    P: EmbeddingProvider,
    R: SchemaRegistry,
    B: StreamBroker,
{
    pub fn new(provider: P, encoder: EventEncoder<R>, publisher: StreamPublisher<B>, config: QueryLoopConfig) -> Self {
        Self {
            provider,
            encoder,
            publisher,
            config,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn publisher(&self) -> &StreamPublisher<B> {
        &self.publisher
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = %self.state, to = %next, "Query loop state change");
        self.state = next;
    }

    /// Run until `exit`, end of input, or `shutdown` flips to true
    ///
    /// The shutdown signal is observed at every await except the publish
    /// itself: a query still embedding or encoding is abandoned, one already
    /// handed to the publisher is drained.
    #[instrument(skip_all, fields(topic = %self.config.topic, subject = %self.config.subject))]
    pub async fn run<I, W>(&mut self, input: I, mut output: W, mut shutdown: watch::Receiver<bool>) -> LoopSummary
    where
        I: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = LoopSummary::default();
        let mut lines = input.lines();

        loop {
            self.transition(LoopState::AwaitingInput);
            if *shutdown.borrow() {
                info!("Shutdown requested");
                break;
            }

            if let Err(error) = write_text(&mut output, PROMPT).await {
                warn!(%error, "Failed to write prompt");
            }

            let line = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested while waiting for input");
                    break;
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(error) => {
                    warn!(%error, "Failed to read input");
                    break;
                }
            };

            let query = line.trim();
            if query.is_empty() {
                self.transition(LoopState::Idle);
                continue;
            }
            if query.eq_ignore_ascii_case(EXIT_COMMAND) {
                info!("Exit requested");
                break;
            }

            summary.queries += 1;
            let prepared = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested before publishing; query abandoned");
                    break;
                }
                prepared = self.prepare(query) => prepared,
            };

            match prepared {
                Ok(prepared) => {
                    if prepared.degraded {
                        summary.degraded += 1;
                    }
                    self.transition(LoopState::Publishing);
                    self.publisher.publish(&self.config.topic, &prepared.payload);
                    summary.published += 1;
                    self.publisher.poll_outcomes();
                }
                Err(error) => {
                    warn!(%error, "Encoding failed; query dropped");
                    summary.encode_failures += 1;
                }
            }
            self.transition(LoopState::Idle);

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested while pacing");
                    break;
                }
                _ = tokio::time::sleep(self.config.pace) => {}
            }
        }

        self.transition(LoopState::Shutdown);
        info!(in_flight = self.publisher.in_flight(), "Flushing remaining messages");
        if let Err(error) = write_text(&mut output, FLUSH_NOTICE).await {
            warn!(%error, "Failed to write flush notice");
        }
        summary.drain = self.drain_publisher();

        info!(
            queries = summary.queries,
            published = summary.published,
            degraded = summary.degraded,
            encode_failures = summary.encode_failures,
            delivered = summary.drain.delivered,
            failed = summary.drain.failed,
            pending = summary.drain.pending,
            "Query loop finished"
        );
        summary
    }

    /// Embed and encode one query
    ///
    /// Nothing is published here, so the future may be dropped at any await.
    async fn prepare(&mut self, query: &str) -> QueryResult<PreparedEvent> {
        self.transition(LoopState::EmbeddingInFlight);
        let vector = match self.provider.embed(query).await {
            Ok(embedding) if !embedding.values.is_empty() => Some(embedding.to_f32()),
            Ok(_) => {
                warn!("Embedding service returned an empty vector; sending query without vector");
                None
            }
            Err(error) => {
                warn!(%error, "Embedding failed; sending query without vector");
                None
            }
        };

        let event = QueryEvent::new(query, vector);
        info!(
            msg_len = query.len(),
            vector_len = event.vector.as_ref().map_or(0, Vec::len),
            "Producing query event"
        );

        self.transition(LoopState::Encoding);
        let payload = self.encoder.encode(&event, &self.config.subject).await?;
        Ok(PreparedEvent {
            payload,
            degraded: !event.has_vector(),
        })
    }

    /// Blocking drain, moved off the async worker when the runtime allows it
    fn drain_publisher(&self) -> DrainReport {
        let timeout = self.config.drain_timeout;
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => block_in_place(|| self.publisher.drain(timeout)),
            _ => self.publisher.drain(timeout),
        }
    }
}

async fn write_text<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await
}
