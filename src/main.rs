use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use fssai_rag::application::use_cases::{BuildIndexRequest, QueryError};
use fssai_rag::infrastructure::{AppConfig, AppContainer, init_logging};
use fssai_rag::presentation::http::HttpServer;

#[derive(Parser)]
#[command(name = "fssai-rag")]
#[command(version, about = "Question answering over the FSSAI food additives regulations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk and embed the source document into a persisted index
    Ingest {
        /// Source PDF (overrides RAG_SOURCE_DOCUMENT)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Index directory (overrides RAG_INDEX_PATH)
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Answer one question against the persisted index
    Ask {
        /// The question to answer
        question: String,
    },
    /// Serve POST /answer over HTTP
    Serve,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::from_env()?;

    if let Commands::Ingest { source, index } = &cli.command {
        if let Some(source) = source {
            config.source_document = source.clone();
        }
        if let Some(index) = index {
            config.index_path = index.clone();
        }
    }

    let container = AppContainer::new(config)?;

    match cli.command {
        Commands::Ingest { .. } => {
            let source_path = container.config().source_document.clone();
            info!(source = %source_path.display(), "Starting ingestion");

            let response = container
                .build_index_use_case()?
                .execute(BuildIndexRequest { source_path })
                .await?;

            println!(
                "Index {} written to {}",
                response.index_id,
                response.index_location.display()
            );
            println!(
                "  {} table units, {} page units, {} segments ({} dimensions) in {} ms",
                response.table_units,
                response.page_units,
                response.segments_indexed,
                response.dimension,
                response.processing_time_ms
            );
        }
        Commands::Ask { question } => {
            let pipeline = container.open_query_pipeline()?;
            let timeout = container.config().server.request_timeout();

            let answer = tokio::time::timeout(timeout, pipeline.answer(&question))
                .await
                .map_err(|_| {
                    QueryError::GenerationService(format!(
                        "No answer within {} seconds",
                        timeout.as_secs()
                    ))
                })??;

            println!("{}", answer);
        }
        Commands::Serve => {
            let server = HttpServer::new(
                container.answer_handler()?,
                container.config().server.bind_address(),
            );
            server.run().await?;
        }
    }

    Ok(())
}
