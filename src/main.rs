//! # Confluence Agent CLI (`cfa`)
//!
//! The `cfa` binary is the interface to the Confluence knowledge agent.
//! Without a subcommand it starts the interactive chat; the remaining
//! commands expose the underlying capabilities directly for scripting.
//!
//! ## Usage
//!
//! ```bash
//! cfa                          # interactive chat
//! cfa ask "how do we deploy?"  # one-shot question
//! cfa search "deploy runbook"  # multi-strategy search
//! cfa get 12345                # full document by content id
//! cfa summarize 12345          # model-written summary
//! cfa space PLAT               # list a space's content
//! cfa sources                  # connection health
//! ```
//!
//! Configuration comes from the environment (a `.env` file is honored):
//! `CONFLUENCE_BASE_URL`, `CONFLUENCE_USERNAME`, `CONFLUENCE_API_TOKEN`,
//! `OPENAI_API_KEY`, and optionally `OPENAI_MODEL`, `OPENAI_BASE_URL`,
//! `HTTP_TIMEOUT_SECS`, `LLM_MAX_RETRIES`.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use confluence_agent::agent::{self, Agent, Tool};
use confluence_agent::chat;
use confluence_agent::config::Config;
use confluence_agent::connector::ConfluenceClient;
use confluence_agent::llm::LlmClient;
use confluence_agent::render;
use confluence_agent::search;

/// Confluence Agent — a conversational knowledge agent for Confluence.
#[derive(Parser)]
#[command(
    name = "cfa",
    about = "A conversational knowledge agent for Confluence with cited answers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat (the default when no command is given).
    Chat,

    /// Ask a single question and print the agent's answer.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Search Confluence with the multi-strategy aggregator.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Match titles only (skips the multi-strategy aggregation).
        #[arg(long)]
        title_only: bool,
    },

    /// Retrieve a document by its content id.
    Get {
        /// Confluence content id.
        id: String,
    },

    /// List the content of a Confluence space.
    Space {
        /// Confluence space key (e.g. `PLAT`).
        key: String,

        /// Maximum number of pages to list.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Summarize a document by its content id.
    Summarize {
        /// Confluence content id.
        id: String,

        /// Maximum summary length in characters.
        #[arg(long, default_value_t = 500)]
        max_length: usize,
    },

    /// Show connection status for the configured services.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence_agent=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let confluence = Arc::new(ConfluenceClient::new(&config.confluence)?);
    let llm = Arc::new(LlmClient::new(&config.llm)?);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let agent = Agent::new(confluence.clone(), llm);
            chat::run_chat(&agent, &confluence).await?;
        }
        Commands::Ask { question } => {
            let agent = Agent::new(confluence, llm);
            let spinner = chat::thinking_spinner("Thinking");
            let answer = agent.ask(&question).await;
            spinner.finish_and_clear();
            println!("{}", answer?);
        }
        Commands::Search {
            query,
            limit,
            title_only,
        } => {
            let results = if title_only {
                let cql = format!(
                    "title ~ \"{}\"",
                    confluence_agent::connector::cql_quote(&query)
                );
                confluence.search_cql(&cql, limit as u32).await
            } else {
                search::search_content(&confluence, &query, limit).await
            };

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, result) in results.iter().enumerate() {
                println!("{}. {} / {}", i + 1, result.space, result.title);
                println!("    type: {}", result.content_type);
                println!("    url: {}", result.url);
                println!(
                    "    excerpt: \"{}\"",
                    render::excerpt_of(result, 200).replace('\n', " ")
                );
                println!("    id: {}", result.id);
                println!();
            }
        }
        Commands::Get { id } => match confluence.get_content_by_id(&id).await {
            Some(doc) => {
                println!("--- Document ---");
                println!("id:            {}", doc.id);
                println!("title:         {}", doc.title);
                println!("space:         {}", doc.space);
                println!("type:          {}", doc.content_type);
                println!("url:           {}", doc.url);
                println!("version:       {}", doc.version);
                println!("last modified: {}", doc.last_modified_display());
                println!();
                println!("--- Body ---");
                println!("{}", render::clean(&doc.body));
            }
            None => {
                eprintln!("Error: document not found: {}", id);
                std::process::exit(1);
            }
        },
        Commands::Space { key, limit } => {
            let results = confluence.space_content(&key, limit as u32).await;
            if results.is_empty() {
                println!("No content in space '{}' (or the space is not accessible).", key);
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. {} ({})", i + 1, result.title, result.content_type);
                println!("    url: {}", result.url);
                println!("    id: {}", result.id);
            }
        }
        Commands::Summarize { id, max_length } => {
            // Drive the summarize capability directly, the same path the
            // model takes.
            let registry = agent::ToolRegistry::with_builtins();
            let tool = registry
                .get("summarize_document")
                .expect("summarize_document is a builtin");
            let ctx = agent::ToolContext {
                confluence: confluence.clone(),
                llm,
            };
            let params = serde_json::json!({ "content_id": id, "max_length": max_length });
            let spinner = chat::thinking_spinner("Summarizing");
            let result = tool.execute(params, &ctx).await;
            spinner.finish_and_clear();
            match result {
                Ok(value) => println!("{}", value.as_str().unwrap_or_default()),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Sources => {
            let confluence_ok = confluence.test_connection().await;
            println!("{:<16} {:<40} HEALTHY", "SERVICE", "ENDPOINT");
            println!(
                "{:<16} {:<40} {}",
                "confluence",
                confluence.base_url(),
                confluence_ok
            );
            println!("{:<16} {:<40} {}", "model", llm.model(), "configured");
        }
    }

    Ok(())
}
