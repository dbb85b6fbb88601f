//! registry-node binary - operator CLI over the settlement runtime
//!
//! Runs against the in-process ledger and store adapters, seeded from the
//! config file. Production deployments swap in RPC/database-backed
//! implementations of the same gateway traits.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use registry_node::catalog::Catalog;
use registry_node::config::Config;
use registry_node::ledger::sim::SimLedger;
use registry_node::ledger::{MemberAddress, MemberRecord};
use registry_node::node::RegistryNode;
use registry_node::projection::{MemberSummary, TaskState, TaskView};
use registry_node::store::memory::MemoryStore;
use registry_node::store::Submission;

#[derive(Parser)]
#[command(name = "registry-node")]
#[command(about = "Reward settlement runtime for the Identity Registry community program")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "registry-node.toml")]
    config: String,

    /// Node ID (overrides config file)
    #[arg(long, env = "REGISTRY_NODE_ID")]
    node_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the pending review queue
    Queue,

    /// Show the task catalog, or one member's per-task availability
    Tasks {
        /// Member address to compute availability for
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Show a member's dashboard summary
    Member {
        address: String,
    },

    /// File a proof of task completion
    Submit {
        #[arg(short, long)]
        address: String,
        /// Catalog task id
        #[arg(short, long)]
        task: u32,
        #[arg(short, long)]
        proof: String,
    },

    /// Approve a pending submission and settle its XP on the ledger
    Approve {
        id: u64,
    },

    /// Reject a pending submission (no ledger interaction)
    Reject {
        id: u64,
    },

    /// Mark a pending submission approved without a ledger write, after
    /// verifying the credit already landed on chain
    MarkSettled {
        id: u64,
    },

    /// Mint the member's identity NFT for their current tier
    Mint {
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("registry_node=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load or create default config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)
            .with_context(|| format!("reading {}", cli.config))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", cli.config))?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    if let Some(node_id) = cli.node_id {
        config.node.id = node_id;
    }

    info!("Node ID: {}", config.node.id);
    info!("Contract: {}", config.ledger.contract_address);

    let node = build_node(&config).await?;

    let result = run_command(&node, cli.command).await;
    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Assemble the node from the in-process adapters, applying seed data
async fn build_node(config: &Config) -> anyhow::Result<RegistryNode> {
    let ledger = SimLedger::new();
    let store = MemoryStore::with_event_capacity(config.store.event_capacity);

    for member in &config.seed.members {
        let address = MemberAddress::parse(&member.address)
            .map_err(|e| anyhow::anyhow!("seed member: {}", e))?;
        ledger
            .register(
                address,
                MemberRecord {
                    xp: member.xp,
                    tier: member.tier,
                    has_nft: member.has_nft,
                },
            )
            .await;
    }

    let node = RegistryNode::new(
        Catalog::builtin(),
        ledger,
        store,
        config.settlement.confirmation_timeout(),
    );

    for seed in &config.seed.submissions {
        node.submit_proof(&seed.address, seed.task, &seed.proof)
            .await
            .map_err(|e| anyhow::anyhow!("seed submission: {}", e))?;
    }

    Ok(node)
}

async fn run_command(node: &RegistryNode, command: Commands) -> Result<String, String> {
    match command {
        Commands::Queue => {
            let queue = node.pending_queue().await.map_err(|e| e.to_string())?;
            Ok(format_queue(&queue))
        }

        Commands::Tasks { address: None } => Ok(format_catalog(node.catalog())),

        Commands::Tasks {
            address: Some(address),
        } => {
            let views = node.task_views(&address).await.map_err(|e| e.to_string())?;
            Ok(format_task_views(&views))
        }

        Commands::Member { address } => {
            let summary = node
                .member_summary(&address)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format_member(&summary))
        }

        Commands::Submit {
            address,
            task,
            proof,
        } => {
            let id = node
                .submit_proof(&address, task, &proof)
                .await
                .map_err(|e| e.to_string())?;
            Ok(format!("Submitted as #{}, awaiting review", id))
        }

        Commands::Approve { id } => {
            let outcome = node.approve(id).await.map_err(|e| e.to_string())?;
            let mut line = format!(
                "Approved #{}: +{} XP for {} (tx {})",
                outcome.submission_id,
                outcome.xp_credited,
                shorten(outcome.member.as_str()),
                outcome.tx
            );
            if outcome.reconciled {
                line.push_str("\n  note: confirmation timed out; credit verified by ledger re-read");
            }
            Ok(line)
        }

        Commands::Reject { id } => {
            node.reject(id).await.map_err(|e| e.to_string())?;
            Ok(format!("Rejected #{}", id))
        }

        Commands::MarkSettled { id } => {
            node.mark_settled(id).await.map_err(|e| e.to_string())?;
            Ok(format!("Marked #{} settled (no ledger write)", id))
        }

        Commands::Mint { address } => {
            let outcome = node.mint(&address).await.map_err(|e| e.to_string())?;
            Ok(format!(
                "Minted tier-{} identity NFT for {} (tx {})",
                outcome.tier,
                shorten(outcome.member.as_str()),
                outcome.tx
            ))
        }
    }
}

/// Format the pending queue for display
fn format_queue(queue: &[Submission]) -> String {
    if queue.is_empty() {
        return "All caught up! No pending submissions.".to_string();
    }

    let mut output = String::new();
    output.push_str("Pending Submissions\n");
    output.push_str("===================\n\n");

    for sub in queue {
        output.push_str(&format!(
            "#{:<4} {}  +{} XP  {}\n",
            sub.id,
            shorten(&sub.member_address),
            sub.xp_reward,
            sub.task_title
        ));
        output.push_str(&format!("      proof: {}\n", sub.proof));
    }

    output
}

/// Format the raw catalog for display
fn format_catalog(catalog: &Catalog) -> String {
    let mut output = String::new();
    output.push_str("Community Tasks\n");
    output.push_str("===============\n\n");

    for task in catalog.tasks() {
        output.push_str(&format!(
            "[{}] {} (+{} XP{})\n     {}\n",
            task.id,
            task.title,
            task.xp_reward,
            if task.one_time { ", one-time" } else { "" },
            task.description
        ));
    }

    output
}

/// Format one member's per-task availability
fn format_task_views(views: &[TaskView]) -> String {
    let mut output = String::new();
    output.push_str("Community Tasks\n");
    output.push_str("===============\n\n");

    for view in views {
        let state = match view.state {
            TaskState::Available => "available",
            TaskState::AwaitingReview => "awaiting review",
            TaskState::Locked { .. } if view.approved > 0 => "completed",
            TaskState::Locked { .. } => "pending review",
        };
        output.push_str(&format!(
            "[{}] {} (+{} XP) - {}\n",
            view.task_id, view.title, view.xp_reward, state
        ));
    }

    output
}

/// Format a member dashboard summary
fn format_member(summary: &MemberSummary) -> String {
    let mut output = String::new();
    output.push_str("Identity Status\n");
    output.push_str("===============\n\n");

    output.push_str(&format!("Total XP:   {}\n", summary.xp));
    output.push_str(&format!(
        "Rank:       {} (tier {})\n",
        summary.tier_name, summary.tier
    ));
    if let Some(uri) = &summary.badge_uri {
        output.push_str(&format!("Badge:      {}\n", uri));
    }
    output.push_str(&format!("NFT:        {}\n", if summary.has_nft { "owned" } else { "not minted" }));

    match &summary.mint_blocked {
        None => output.push_str("Mint:       eligible\n"),
        Some(reason) => output.push_str(&format!("Mint:       unavailable ({})\n", reason)),
    }

    output
}

fn shorten(address: &str) -> String {
    if address.len() < 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
