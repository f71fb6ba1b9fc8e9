/// CLI Interface Module
///
/// Replays a stream of JSON-lines requests through the matching engine and
/// writes the merged action stream to stdout, either as JSON lines or as
/// length-delimited frames. Logs go to stderr so stdout carries only actions.
///
/// ## Input
/// One `Request` per line, e.g.
/// ```text
/// {"type":"SUBMIT","pair":{"base":"ETH","quote":"EOS"},"id":1,"side":"SELL","price":50,"amount":50}
/// {"type":"CANCEL","pair":{"base":"ETH","quote":"EOS"},"id":1}
/// {"type":"SHUTDOWN_ALL"}
/// ```
/// Blank lines and lines starting with `#` are skipped.

use crate::application::services::{BookLayout, EngineConfig, MatchingEngine, QueuePolicy};
use crate::shared::codec::{ActionCodec, CodecError};
use crate::shared::error::EngineError;
use crate::shared::metrics::gather_text;
use crate::shared::protocol::{Action, Request, TradingPair, DEFAULT_MAX_PRICE};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{info, warn};

const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Command line configuration for the matching engine
#[derive(Parser, Debug, Clone)]
#[command(name = "matching-engine")]
#[command(version)]
#[command(about = "Limit-order matching engine with one book per trading pair", long_about = None)]
pub struct CliConfig {
    /// Request file (JSON lines); reads stdin when omitted
    #[arg(short, long, env = "ENGINE_INPUT")]
    pub input: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, default_value = "json", value_parser = ["json", "framed"], env = "ENGINE_OUTPUT_FORMAT")]
    pub output_format: String,

    /// Pairs created at startup (BASE/QUOTE), repeated or comma separated
    #[arg(short, long = "pair", value_delimiter = ',', env = "ENGINE_PAIRS")]
    pub pairs: Vec<TradingPair>,

    /// Create a book on first use of an unregistered pair
    #[arg(short, long, default_value_t = false, env = "ENGINE_AUTO_CREATE")]
    pub auto_create: bool,

    /// Exclusive price bound
    #[arg(long, default_value_t = DEFAULT_MAX_PRICE, env = "ENGINE_MAX_PRICE")]
    pub max_price: u32,

    /// Request queue capacity per book
    #[arg(short = 'q', long, default_value_t = 1024, env = "ENGINE_BOOK_QUEUE_DEPTH")]
    pub book_queue_depth: usize,

    /// Action queue capacity per book
    #[arg(long, default_value_t = 1024, env = "ENGINE_ACTION_QUEUE_DEPTH")]
    pub action_queue_depth: usize,

    /// Merged audit stream capacity
    #[arg(long, default_value_t = 8192, env = "ENGINE_EVENT_QUEUE_DEPTH")]
    pub event_queue_depth: usize,

    /// Broadcast ring capacity
    #[arg(long, default_value_t = 4096, env = "ENGINE_FANOUT_CAPACITY")]
    pub fanout_capacity: usize,

    /// Price point storage (dense / sparse)
    #[arg(long, default_value_t = BookLayout::Dense, env = "ENGINE_LAYOUT")]
    pub layout: BookLayout,

    /// Behaviour when a book queue is full (block / reject)
    #[arg(long, default_value_t = QueuePolicy::Block, env = "ENGINE_QUEUE_POLICY")]
    pub queue_policy: QueuePolicy,

    /// Worker threads (0 detects the CPU count)
    #[arg(short = 'n', long, default_value_t = 0, env = "ENGINE_WORKER_THREADS")]
    pub worker_threads: usize,

    /// Log level
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"], env = "ENGINE_LOG_LEVEL")]
    pub log_level: String,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, default_value_t = false)]
    pub print_metrics: bool,
}

impl CliConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_price: self.max_price,
            book_queue_depth: self.book_queue_depth,
            action_queue_depth: self.action_queue_depth,
            event_queue_depth: self.event_queue_depth,
            fanout_capacity: self.fanout_capacity,
            layout: self.layout,
            queue_policy: self.queue_policy,
        }
    }

    /// Runtime worker threads, resolving 0 to the CPU count.
    pub fn worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line codec error: {0}")]
    Lines(#[from] LinesCodecError),

    #[error("frame codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("output task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// Replays the configured input through a fresh engine.
pub async fn run(config: CliConfig) -> Result<(), CliError> {
    info!(
        layout = %config.layout,
        queue_policy = %config.queue_policy,
        max_price = config.max_price,
        "matching engine starting"
    );

    let (engine, audit) = MatchingEngine::new(config.engine_config());
    for pair in &config.pairs {
        engine.create_book(pair.clone())?;
    }

    let writer = tokio::spawn(write_actions(audit, config.output_format.clone()));

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &config.input {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let mut line_no = 0u64;
    let mut accepted = 0u64;
    let mut rejected = 0u64;
    while let Some(line) = lines.next().await {
        let line = line?;
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, error = %e, "malformed request");
                continue;
            }
        };

        if config.auto_create {
            if let Request::Submit { pair, .. } | Request::Cancel { pair, .. } = &request {
                if !engine.is_registered(pair) {
                    if let Err(e) = engine.create_book(pair.clone()) {
                        warn!(line = line_no, error = %e, "could not create book");
                    }
                }
            }
        }

        match engine.handle(request).await {
            Ok(()) => accepted += 1,
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, error = %e, "request rejected");
            }
        }
    }

    let shutdown = engine.shutdown_all().await;
    drop(engine);
    let written = writer.await??;
    info!(accepted, rejected, written, "replay finished");

    if config.print_metrics {
        eprint!("{}", gather_text());
    }
    shutdown?;
    Ok(())
}

/// Drains the audit stream to stdout until every book is gone.
async fn write_actions(mut audit: mpsc::Receiver<Action>, format: String) -> Result<u64, CliError> {
    let stdout = tokio::io::stdout();
    let mut written = 0u64;

    if format == "framed" {
        let mut sink = FramedWrite::new(stdout, ActionCodec::new());
        while let Some(action) = audit.recv().await {
            sink.send(action).await?;
            written += 1;
        }
    } else {
        let mut sink = FramedWrite::new(stdout, LinesCodec::new());
        while let Some(action) = audit.recv().await {
            sink.send(serde_json::to_string(&action)?).await?;
            written += 1;
        }
    }
    Ok(written)
}

/// Initialise logging to stderr
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_config_default() {
        let config = CliConfig::parse_from(["matching-engine"]);
        assert_eq!(config.input, None);
        assert_eq!(config.output_format, "json");
        assert!(config.pairs.is_empty());
        assert!(!config.auto_create);
        assert_eq!(config.engine_config(), EngineConfig::default());
        assert_eq!(config.worker_threads, 0);
        assert!(config.worker_threads() >= 1);
        assert_eq!(config.log_level, "info");
        assert!(!config.print_metrics);
    }

    #[test]
    fn test_cli_config_custom() {
        let config = CliConfig::parse_from([
            "matching-engine",
            "--input", "orders.jsonl",
            "--output-format", "framed",
            "--pair", "ETH/EOS,BTC/USDT",
            "--auto-create",
            "--max-price", "100000",
            "--book-queue-depth", "64",
            "--layout", "sparse",
            "--queue-policy", "reject",
            "--worker-threads", "2",
            "--log-level", "debug",
            "--print-metrics",
        ]);

        assert_eq!(config.input, Some(PathBuf::from("orders.jsonl")));
        assert_eq!(config.output_format, "framed");
        assert_eq!(
            config.pairs,
            vec![TradingPair::new("ETH", "EOS"), TradingPair::new("BTC", "USDT")]
        );
        assert!(config.auto_create);
        let engine = config.engine_config();
        assert_eq!(engine.max_price, 100_000);
        assert_eq!(engine.book_queue_depth, 64);
        assert_eq!(engine.layout, BookLayout::Sparse);
        assert_eq!(engine.queue_policy, QueuePolicy::Reject);
        assert_eq!(config.worker_threads(), 2);
        assert!(config.print_metrics);
    }

    #[test]
    fn test_cli_config_short_flags() {
        let config = CliConfig::parse_from([
            "matching-engine",
            "-p", "ETH/EOS",
            "-a",
            "-q", "512",
            "-n", "4",
            "-l", "warn",
        ]);

        assert_eq!(config.pairs, vec![TradingPair::new("ETH", "EOS")]);
        assert!(config.auto_create);
        assert_eq!(config.book_queue_depth, 512);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_rejects_malformed_pair_flag() {
        assert!(CliConfig::try_parse_from(["matching-engine", "--pair", "ETHEOS"]).is_err());
    }
}
