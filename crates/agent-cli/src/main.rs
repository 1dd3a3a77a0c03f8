//! Command-line interface for agent-rs

use agent_llm::LLMProvider;
use agent_llm::providers::{GeminiProvider, OpenAIProvider};
use agent_runtime::{ChatSession, ConsoleEventHandler, PaperReviewer, TextToSql, review_output_path};
use agent_stock::{CacheManager, StockConfig, YahooMarketData, register_stock_tools};
use agent_tools::{CurrentTimeTool, ToolRegistry};
use agent_utils::{Config, Node, TreeRenderer};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const STOCK_SYSTEM_PROMPT: &str = "You are a consultant who helps the user. \
Answer the user's questions appropriately, using the stock tools for market data.";

#[derive(Parser, Debug)]
#[command(name = "agent-cli")]
#[command(about = "LLM chat agents with tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Terminal chatbot with a current-time tool
    Chat,
    /// Streaming stock chat with market data tools
    Stock {
        /// Render each turn's new messages as a tree
        #[arg(long)]
        show_tree: bool,
    },
    /// Translate a question into SQL
    Sql {
        /// Natural-language request
        question: String,
    },
    /// Review a PDF paper, modeled on an example review
    Review {
        /// Paper to review
        #[arg(long)]
        paper: PathBuf,
        /// Example review to imitate
        #[arg(long)]
        example: PathBuf,
        /// Output markdown file (default: <paper>_review.md)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render a JSON document as a tree
    Tree {
        /// JSON file to render
        file: PathBuf,
        /// Disable colors
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    agent_utils::init_tracing_with_level(if cli.verbose { "debug" } else { "warn" });

    let config = Config::from_env();
    info!(environment = %config.environment, "Starting agent-cli");

    match cli.command {
        Commands::Chat => run_chat(&config).await,
        Commands::Stock { show_tree } => run_stock(&config, show_tree).await,
        Commands::Sql { question } => run_sql(&config, &question).await,
        Commands::Review {
            paper,
            example,
            output,
        } => run_review(&config, paper, example, output).await,
        Commands::Tree { file, plain } => run_tree(&file, plain),
    }
}

fn openai_provider() -> anyhow::Result<Arc<dyn LLMProvider>> {
    let provider = OpenAIProvider::from_env().context("Failed to configure the OpenAI provider")?;
    Ok(Arc::new(provider))
}

fn time_tool(config: &Config) -> anyhow::Result<Arc<CurrentTimeTool>> {
    let tool = CurrentTimeTool::with_default_timezone(&config.default_timezone)
        .with_context(|| format!("Invalid AGENT_TIMEZONE '{}'", config.default_timezone))?;
    Ok(Arc::new(tool))
}

async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(time_tool(config)?);

    let session = ChatSession::builder()
        .provider(openai_provider()?)
        .tool_registry(registry)
        .model(&config.chat_model)
        .build()?;

    chat_loop(session, false).await
}

async fn run_stock(config: &Config, show_tree: bool) -> anyhow::Result<()> {
    let stock_config = StockConfig::default();
    let market = YahooMarketData::new(stock_config.clone())
        .context("Failed to create the Yahoo Finance client")?;

    let registry = Arc::new(ToolRegistry::new());
    registry.register(time_tool(config)?);
    register_stock_tools(
        &registry,
        Arc::new(market),
        &CacheManager::from_config(&stock_config),
    );

    let session = ChatSession::builder()
        .provider(openai_provider()?)
        .tool_registry(registry)
        .model(&config.chat_model)
        .system_prompt(STOCK_SYSTEM_PROMPT)
        .build()?;

    chat_loop(session, show_tree).await
}

/// Read user lines until `exit`, `quit` or end of input
async fn chat_loop(mut session: ChatSession, show_tree: bool) -> anyhow::Result<()> {
    let handler = ConsoleEventHandler::new();
    let renderer = TreeRenderer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("User > ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let turn_start = session.history().len();
        print!("AI > ");
        io::stdout().flush()?;

        // Failures are already reported by the handler; the next line may succeed.
        if session.send(input, &handler).await.is_err() {
            continue;
        }

        if show_tree {
            let mut stdout = io::stdout().lock();
            for message in &session.history()[turn_start..] {
                renderer.write(&message.to_tree(), &mut stdout)?;
            }
        }
    }

    Ok(())
}

async fn run_sql(config: &Config, question: &str) -> anyhow::Result<()> {
    let text_to_sql = TextToSql::new(openai_provider()?, &config.chat_model)?;
    let sql = text_to_sql
        .generate(question)
        .await
        .context("Failed to generate SQL")?;
    println!("{sql}");
    Ok(())
}

async fn run_review(
    config: &Config,
    paper: PathBuf,
    example: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    anyhow::ensure!(paper.exists(), "Paper not found: {}", paper.display());
    anyhow::ensure!(example.exists(), "Example review not found: {}", example.display());

    let provider = GeminiProvider::from_env().context("Failed to configure the Gemini provider")?;
    let reviewer =
        PaperReviewer::new(provider, &config.review_model).with_language(&config.review_language);

    println!("Reviewing {} ...", paper.display());
    let review = reviewer
        .review(&paper, &example)
        .await
        .context("Failed to review the paper")?;

    let output = output.unwrap_or_else(|| review_output_path(&paper));
    tokio::fs::write(&output, &review)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{review}");
    println!("\nReview saved to {}", output.display());
    Ok(())
}

fn run_tree(file: &Path, plain: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let renderer = TreeRenderer::new().with_color(!plain);
    renderer.write(&Node::from(value), &mut io::stdout().lock())?;
    Ok(())
}
