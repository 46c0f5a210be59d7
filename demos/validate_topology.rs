use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use clap_derive::Parser;
use clustermap::clustermap::clustermap_config::ClusterMapConfig;
use clustermap::clustermap::data_node::DataNode;
use clustermap::clustermap::datacenter::DatacenterId;
use clustermap::clustermap::topology_validator::OwnerValidation;
use tracing::{info, Level};

/// Loads a data node from its canonical JSON form, validates it and prints a summary
#[derive(Parser)]
struct Args {
    /// file containing the data node document
    document: String,

    /// owning datacenter; without it, the data node is loaded standalone
    #[clap(long)]
    datacenter: Option<String>,

    #[clap(long)]
    error_threshold: Option<u32>,

    #[clap(long)]
    retry_backoff_ms: Option<u64>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ClusterMapConfig::new();
    if let Some(threshold) = args.error_threshold {
        config.datanode_error_threshold = threshold;
    }
    if let Some(backoff) = args.retry_backoff_ms {
        config.datanode_retry_backoff = Duration::from_millis(backoff);
    }

    let datacenter = args.datacenter.as_deref().map(DatacenterId::new);
    if datacenter.is_none() {
        config.owner_validation = OwnerValidation::Skip;
    }

    let json = std::fs::read_to_string(&args.document)
        .with_context(|| format!("reading {}", args.document))?;
    let data_node = DataNode::from_json_str(datacenter, &json, &config)
        .with_context(|| format!("loading data node from {}", args.document))?;

    info!("loaded {:?}", data_node);
    println!("{}:{} (ssl {}) in {:?}: {}",
        data_node.hostname(),
        data_node.port(),
        data_node.ssl_port(),
        data_node.datacenter(),
        data_node.state(),
    );
    for disk in data_node.disks() {
        println!("  {} {} bytes {}", disk.mount_path(), disk.raw_capacity_in_bytes(), disk.state());
    }
    println!("raw capacity: {} bytes", data_node.raw_capacity_in_bytes());

    if data_node.to_json_string() != json.trim() {
        info!("document is not in canonical form");
    }
    Ok(())
}
