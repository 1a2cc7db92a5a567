#![forbid(unsafe_code)]
//! Replays a JSON block file: verifies signatures and payloads, links every block and prints its
//! identity and difficulty.

use chrono::{DateTime, Utc};
use clap::Parser;
use forgechain::blockchain::{difficulty, validate_payload, Block, InMemoryChain};
use forgechain::config::{load_params, GENESIS_EPOCH_UNIX};
use forgechain::error::ChainError;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding an array of blocks, genesis first
    blocks: PathBuf,

    /// Protocol parameters (TOML); defaults apply when absent
    #[arg(long, default_value = "forgechain.toml")]
    params: PathBuf,

    /// Skip the payload hash and totals check
    #[arg(long)]
    skip_payload: bool,

    /// Log base target changes
    #[arg(long)]
    log_retargets: bool,
}

fn format_timestamp(timestamp: i32) -> String {
    DateTime::<Utc>::from_timestamp(GENESIS_EPOCH_UNIX + timestamp as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("epoch+{}", timestamp))
}

fn print_block(block: &Block) -> Result<(), ChainError> {
    println!(
        "{:>8}  {:>20}  {}  generator {:>20}  base target {:>12}  difficulty {}  txs {}",
        block.height()?,
        block.string_id()?,
        format_timestamp(block.timestamp()),
        block.generator_id(),
        block.base_target()?,
        block.cumulative_difficulty()?,
        block.transactions().len()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut params = load_params(&cli.params)?;
    params.log_base_target_changes |= cli.log_retargets;

    let content = std::fs::read_to_string(&cli.blocks)
        .map_err(|e| format!("Failed to read {}: {}", cli.blocks.display(), e))?;
    let document: Value = serde_json::from_str(&content)?;
    let entries = match &document {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(map) => map
            .get("blocks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or("Expected an array of blocks or an object with a \"blocks\" array")?,
        _ => return Err("Expected an array of blocks".into()),
    };
    let (first, rest) = entries.split_first().ok_or("Block file is empty")?;

    let mut genesis = Block::parse_json(first)?;
    genesis.link_as_genesis(&params)?;
    if !cli.skip_payload {
        validate_payload(&genesis)?;
    }
    let mut chain = InMemoryChain::new(genesis)?;
    print_block(chain.last_block())?;

    for (offset, entry) in rest.iter().enumerate() {
        let mut block = match Block::parse_json(entry) {
            Ok(block) => block,
            Err(e) => {
                warn!("Block #{} failed to parse: {}", offset + 1, e);
                return Err(e.into());
            }
        };
        block.link_to_chain(chain.last_block(), &chain, &params)?;
        if !cli.skip_payload {
            validate_payload(&block)?;
        }
        print_block(&block)?;
        chain.push(block)?;
    }

    let tip = chain.last_block();
    info!(
        "Replayed {} blocks; tip {} at height {} with cumulative difficulty {} ({} per block at current target)",
        chain.blocks().len(),
        tip.string_id()?,
        chain.height(),
        tip.cumulative_difficulty()?,
        difficulty::difficulty_increment(tip.base_target()?)
    );
    Ok(())
}
