use clap::Parser;
use futures::SinkExt;
use matching_engine::shared::protocol::{Request, Side, TradingPair};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::codec::{FramedWrite, LinesCodec};

/// Generates a random request stream (JSON lines) for matching-engine
#[derive(Parser, Debug)]
#[command(name = "load_generator")]
struct Args {
    /// RNG seed; the same seed yields the same stream
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of requests
    #[arg(short = 'c', long, default_value_t = 100_000)]
    count: u64,

    /// Trading pairs
    #[arg(short, long = "pair", value_delimiter = ',', default_value = "ETH/EOS")]
    pairs: Vec<TradingPair>,

    /// Mid price
    #[arg(long, default_value_t = 50_000)]
    mid_price: u32,

    /// Ticks of spread around the mid price
    #[arg(long, default_value_t = 10)]
    spread: u32,

    /// Share of cancel requests
    #[arg(long, default_value_t = 0.2)]
    cancel_ratio: f64,

    /// Largest amount per order
    #[arg(long, default_value_t = 5)]
    max_amount: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.pairs.is_empty() {
        return Err("at least one pair is required".into());
    }
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut out = FramedWrite::new(tokio::io::stdout(), LinesCodec::new());

    let spread = args.spread.min(args.mid_price.saturating_sub(1));
    let max_amount = args.max_amount.max(1);
    let mut next_id = vec![0u64; args.pairs.len()];

    for _ in 0..args.count {
        let book = rng.gen_range(0..args.pairs.len());
        let pair = args.pairs[book].clone();

        let request = if next_id[book] > 0 && rng.gen_bool(args.cancel_ratio.clamp(0.0, 1.0)) {
            Request::Cancel {
                pair,
                id: rng.gen_range(1..=next_id[book]),
            }
        } else {
            next_id[book] += 1;
            // both sides quote the same band so trades keep happening
            let side = if rng.gen::<bool>() { Side::Buy } else { Side::Sell };
            let price = args.mid_price - spread / 2 + rng.gen_range(0..=spread);
            Request::Submit {
                pair,
                id: next_id[book],
                side,
                price,
                amount: rng.gen_range(1..=max_amount),
            }
        };
        out.feed(serde_json::to_string(&request)?).await?;
    }

    out.feed(serde_json::to_string(&Request::ShutdownAll)?).await?;
    SinkExt::<String>::flush(&mut out).await?;
    Ok(())
}
