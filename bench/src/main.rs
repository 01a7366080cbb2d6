//! Load generator for the store write path.
//!
//! Drives put/get/merge loops against a local store node and reports
//! throughput and latency percentiles per test. This is a harness around
//! the public store API, not part of the coordination core.
//!
//! Usage:
//!   cargo run -p vireo-bench -- --ops 100000 --batch-size 100 --tests put,get
//!   cargo run -p vireo-bench -- --shards 8 --wal-dir /tmp/vireo-bench --tests put,merge

use std::path::PathBuf;
use std::time::Instant;

use bytes::Bytes;
use clap::Parser;
use tracing::info;
use vireo_store::{MergeRequest, PutRequest, StoreNode, StoreNodeConfig};

/// CLI arguments for the store benchmark.
#[derive(Debug, Parser)]
#[command(name = "vireo-bench")]
#[command(about = "Load generator for the vireo store write path")]
struct Args {
    /// Total number of keys per test.
    #[arg(long, default_value_t = 100_000)]
    ops: usize,

    /// Keys per put batch.
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Number of shards on the node.
    #[arg(long, default_value_t = 4)]
    shards: u32,

    /// Write-ahead log directory; omitted means no logging.
    #[arg(long)]
    wal_dir: Option<PathBuf>,

    /// Comma-separated tests to run: put, get, merge.
    #[arg(long, default_value = "put,get")]
    tests: String,
}

/// Latency recorder reporting simple percentiles.
struct Histogram {
    samples_us: Vec<u64>,
}

impl Histogram {
    fn new() -> Self {
        Self {
            samples_us: Vec::new(),
        }
    }

    fn add(&mut self, micros: u64) {
        self.samples_us.push(micros);
    }

    fn percentile(&mut self, p: f64) -> u64 {
        if self.samples_us.is_empty() {
            return 0;
        }
        self.samples_us.sort_unstable();
        let rank = (p / 100.0 * (self.samples_us.len() - 1) as f64).round() as usize;
        self.samples_us[rank]
    }

    fn len(&self) -> usize {
        self.samples_us.len()
    }
}

fn key(i: usize) -> Bytes {
    Bytes::from(format!("k{:05}", i))
}

fn value(i: usize) -> Bytes {
    Bytes::from(format!("v{:05}", i))
}

async fn run_put(node: &StoreNode, args: &Args, hist: &mut Histogram) {
    let mut i = 0;
    while i < args.ops {
        let stop = (i + args.batch_size).min(args.ops);
        let batch: Vec<PutRequest> = (i..stop)
            .map(|n| PutRequest {
                key: key(n),
                value: value(n),
            })
            .collect();

        let start = Instant::now();
        let response = node.put_batch(batch).await;
        if !response.ok {
            info!(status = %response.status, "put batch failed");
            return;
        }
        hist.add(start.elapsed().as_micros() as u64);

        i = stop;
    }
}

async fn run_get(node: &StoreNode, args: &Args, hist: &mut Histogram) {
    for i in 0..args.ops {
        let start = Instant::now();
        match node.get(key(i)).await {
            Err(err) => {
                info!(key = %format!("k{:05}", i), error = %err, "get failed");
                return;
            }
            Ok(found) => {
                if found != Some(value(i)) {
                    info!(key = %format!("k{:05}", i), "get returned unexpected value");
                }
            }
        }
        hist.add(start.elapsed().as_micros() as u64);
    }
}

async fn run_merge(node: &StoreNode, args: &Args, hist: &mut Histogram) {
    for i in 0..args.ops {
        let start = Instant::now();
        let response = node
            .merge(MergeRequest {
                key: key(i),
                payload: value(i),
            })
            .await;
        if !response.ok {
            info!(status = %response.status, "merge failed");
            return;
        }
        hist.add(start.elapsed().as_micros() as u64);
    }
}

fn report(test: &str, ops: usize, elapsed_secs: f64, hist: &mut Histogram) {
    println!(
        "{:>6}: {} ops in {:.2}s ({:.0} ops/s)  p50={}us p95={}us p99={}us max={}us  ({} timed calls)",
        test,
        ops,
        elapsed_secs,
        ops as f64 / elapsed_secs,
        hist.percentile(50.0),
        hist.percentile(95.0),
        hist.percentile(99.0),
        hist.percentile(100.0),
        hist.len(),
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = StoreNodeConfig {
        shard_count: args.shards,
        wal_dir: args.wal_dir.clone(),
    };
    let node = StoreNode::open(&config).await?;

    for test in args.tests.split(',') {
        let mut hist = Histogram::new();
        let start = Instant::now();
        match test.trim() {
            "put" => run_put(&node, &args, &mut hist).await,
            "get" => run_get(&node, &args, &mut hist).await,
            "merge" => run_merge(&node, &args, &mut hist).await,
            other => {
                info!(test = other, "skipping unknown test");
                continue;
            }
        }
        report(test.trim(), args.ops, start.elapsed().as_secs_f64(), &mut hist);
    }

    Ok(())
}
