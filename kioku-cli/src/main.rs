use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use kioku_core::logging::init_tracing;
use kioku_core::{DEFAULT_AGENT_ID, Settings};
use kioku_memory::{
    MemoryManagerRegistry, ReadFileRequest, SearchOptions, SyncProgress, SyncRequest,
};

/// Search and read an agent's file-backed memory.
#[derive(Parser, Debug)]
#[command(name = "kioku")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent whose memory to use
    #[arg(short, long, global = true, default_value = DEFAULT_AGENT_ID)]
    agent: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Print index status as JSON
    Status,

    /// Rebuild the memory index
    Index,

    /// Search memory
    Search {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(long = "max")]
        max_results: Option<usize>,

        /// Minimum normalized score
        #[arg(long = "min")]
        min_score: Option<f64>,
    },

    /// Print a memory file
    Read {
        /// Workspace-relative or absolute path
        path: String,

        /// First line to print (1-based)
        #[arg(long, allow_negative_numbers = true)]
        from: Option<i64>,

        /// Number of lines to print
        #[arg(long, allow_negative_numbers = true)]
        lines: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = Settings::load()?;
    init_tracing(&settings.logging);

    let registry = MemoryManagerRegistry::new();
    let Some(manager) = registry.get(&settings, &cli.agent)? else {
        eprintln!(
            "memory search is disabled for agent '{}'",
            cli.agent
        );
        return Ok(());
    };
    info!(
        agent_id = %cli.agent,
        workspace = %manager.workspace_dir().display(),
        "memory manager ready"
    );

    let outcome = run(&manager, cli.command).await;
    registry.close_all();
    outcome
}

async fn run(
    manager: &kioku_memory::MemoryIndexManager,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status => {
            manager.sync(SyncRequest::reason("cli-status")).await?;
            println!("{}", serde_json::to_string_pretty(&manager.status())?);
        }
        Command::Index => {
            let progress = Arc::new(|update: SyncProgress| {
                eprintln!("[{}/{}] {}", update.completed, update.total, update.label);
            });
            manager
                .sync(SyncRequest::reason("cli-index").forced().with_progress(progress))
                .await?;
            let status = manager.status();
            println!("indexed {} files, {} chunks", status.files, status.chunks);
        }
        Command::Search {
            query,
            max_results,
            min_score,
        } => {
            let results = manager
                .search(
                    &query.join(" "),
                    SearchOptions {
                        max_results,
                        min_score,
                    },
                )
                .await?;
            if results.is_empty() {
                println!("no matches");
            }
            for result in results {
                println!(
                    "{:.3}  {}:{}-{}  [{}]",
                    result.score, result.path, result.start_line, result.end_line, result.source
                );
                println!("       {}", result.snippet);
            }
        }
        Command::Read { path, from, lines } => {
            let file = manager
                .read_file(ReadFileRequest::new(path).slice(from, lines))
                .await?;
            println!("{}", file.text);
        }
    }
    Ok(())
}
