//! newsvec CLI
//!
//! A memory-resident embedding and similarity search service.
//!
//! # Usage
//!
//! ```bash
//! # Start the server (hash fallback unless HF_API_KEY is set)
//! newsvec serve --port 5001
//!
//! # Embed text locally with the configured embedder
//! newsvec embed --text "Breaking News: Markets Rally"
//!
//! # Query a running server
//! newsvec query --server http://localhost:5001 --text "markets" -k 3
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use newsvec::server::{serve, AppState, EmbedResponse, ErrorResponse, QueryRequest, QueryResponse};
use newsvec::ServiceConfig;
use newsvec_core::IndexStats;
use newsvec_embed::Embedder;

#[derive(Parser)]
#[command(name = "newsvec")]
#[command(about = "Memory-resident text embedding and similarity search service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        config: ServiceConfig,
    },

    /// Embed texts with the configured embedder and print JSON
    Embed {
        /// Text to embed (repeatable)
        #[arg(short, long = "text", required = true)]
        texts: Vec<String>,

        #[command(flatten)]
        config: ServiceConfig,
    },

    /// Query a running server
    Query {
        /// Server URL
        #[arg(long, default_value = "http://localhost:5001")]
        server: String,

        /// Query text
        #[arg(short, long)]
        text: String,

        /// Number of results (server default when omitted)
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Display index statistics of a running server
    Stats {
        /// Server URL
        #[arg(long, default_value = "http://localhost:5001")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let addr = config.socket_addr()?;
            let state = AppState::from_config(&config);
            tracing::info!(
                "Index provider: {}, default k: {}, fallback dims: {}",
                state.index.provider_name(),
                state.default_k,
                config.fallback_dims
            );

            serve(Arc::new(state), addr).await?;
        }

        Commands::Embed { texts, config } => {
            let embedder = Embedder::new(&config.embedder_config());
            let embeddings = embedder.embed(&texts).await;

            let response = EmbedResponse {
                used_model: embeddings.method.used_model().to_string(),
                vectors: embeddings.vectors,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Query { server, text, k } => {
            let client = reqwest::Client::new();
            let url = format!("{}/query", server.trim_end_matches('/'));

            let request = QueryRequest {
                query: Some(text),
                k,
            };

            let response = client.post(&url).json(&request).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let error: ErrorResponse = response.json().await?;
                anyhow::bail!("{} ({})", error.error, status);
            }

            let result: QueryResponse = response.json().await?;
            println!("Model: {}", result.used_model);
            println!("Results:");
            for hit in result.hits {
                println!("  [{:.4}] {} ({})", hit.score, hit.id, hit.source);
                println!("      {}", hit.text);
            }
        }

        Commands::Stats { server } => {
            let client = reqwest::Client::new();
            let url = format!("{}/stats", server.trim_end_matches('/'));

            let response = client.get(&url).send().await?.error_for_status()?;
            let stats: IndexStats = response.json().await?;

            println!("Index at {}", server);
            println!("  Records: {}", stats.count);
            match stats.dim {
                Some(dim) => println!("  Dimensions: {}", dim),
                None => println!("  Dimensions: (not set)"),
            }
            println!("  Backend: {}", stats.backend);
            println!("  Epoch: {}", stats.epoch);
        }
    }

    Ok(())
}
