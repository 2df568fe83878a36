//! # Tabula CLI
//!
//! HTTP gateway and command line for asking questions about one CSV table.
//!
//! ## Architecture
//!
//! ```text
//! main_entry
//!     │
//!     ├──> Config::load         flags > env (.env) > file, once
//!     ├──> AppContext           Arc<Table> + QueryExecutor + Synthesizer
//!     │
//!     ├──> serve    axum router: POST /query, GET /schema, GET /health
//!     ├──> ask      one question through the same pipeline
//!     ├──> preview  schema preview text
//!     └──> eval     expression straight into the executor
//! ```

use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tabula_expr::QueryExecutor;
use tabula_protocol::{serialize_json, QueryRequest};

mod config;
mod context;
mod gateway;
mod http_api;
mod listen;

pub use config::{Config, DataConfig, Overrides, ServerConfig};
pub use context::{load_table, schema_response, AppContext};
pub use gateway::GatewayError;
pub use http_api::router;
pub use listen::BindError;

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Ask questions about a CSV table in plain language", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// CSV file to load (overrides TABULA_DATA and the config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// TOML config file with [data], [server], [model] and [limits] sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the query gateway over HTTP (POST /query)
    Serve(ServeArgs),

    /// Answer one question and print the JSON response body
    Ask(AskArgs),

    /// Print the schema preview used to ground the model
    Preview(PreviewArgs),

    /// Evaluate an expression against the table without the model
    Eval(EvalArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on (default: 127.0.0.1:5000)
    #[arg(long)]
    bind: Option<String>,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,

    /// Origin allowed to call /query from a browser (default: http://localhost:5500)
    #[arg(long)]
    allow_origin: Option<String>,
}

#[derive(Args)]
struct AskArgs {
    /// The question, in plain language
    question: String,
}

#[derive(Args)]
struct PreviewArgs {
    /// Number of rows shown
    #[arg(long, short = 'n')]
    rows: Option<usize>,

    /// Print the /schema JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EvalArgs {
    /// Expression over `df`, e.g. "df['revenue'].sum()"
    expression: String,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    // Before the logger so RUST_LOG from .env applies. Existing variables win.
    let dotenv = dotenvy::dotenv();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match dotenv {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => log::warn!("Ignoring unreadable .env file: {err}"),
    }

    let mut overrides = Overrides {
        data: cli.data.clone(),
        ..Overrides::default()
    };
    match &cli.command {
        Commands::Serve(args) => {
            overrides.bind = args.bind.clone();
            overrides.public = args.public;
            overrides.allow_origin = args.allow_origin.clone();
        }
        Commands::Preview(args) => overrides.preview_rows = args.rows,
        Commands::Ask(_) | Commands::Eval(_) => {}
    }
    let config = Config::load(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Serve(_) => serve(config).await,
        Commands::Ask(args) => ask(config, &args.question).await,
        Commands::Preview(args) => preview(config, args.json),
        Commands::Eval(args) => eval(config, args.expression).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let addrs = listen::resolve(&config.server).await?;

    let ctx = Arc::new(AppContext::from_config(&config)?);
    let app = router(ctx, &config.server.allow_origin)?;

    let listener = listen::listen(&config.server, &addrs).await?;
    let local = listener
        .local_addr()
        .context("Listener has no local address")?;
    log::info!(
        "Serving query gateway on http://{local} (CORS origin {})",
        config.server.allow_origin
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ask(config: Config, question: &str) -> Result<()> {
    let ctx = AppContext::from_config(&config)?;
    let request = QueryRequest {
        query: Some(question.to_string()),
    };
    let outcome = match request.question() {
        Some(question) => gateway::answer(&ctx, question).await,
        None => Err(GatewayError::MissingQuery),
    };
    match outcome {
        Ok(response) => print_stdout(&serialize_json(&response)?),
        Err(err) => {
            print_stdout(&serialize_json(&err.envelope())?)?;
            std::process::exit(1);
        }
    }
}

fn preview(config: Config, json: bool) -> Result<()> {
    let table = load_table(&config)?;
    let preview = table.schema_preview(config.data.preview_rows);
    if json {
        return print_stdout(&serialize_json(&schema_response(&preview))?);
    }
    print_stdout(preview.text().trim_end())
}

async fn eval(config: Config, expression: String) -> Result<()> {
    let table = load_table(&config)?;
    let executor = QueryExecutor::new(table, config.limits);
    let outcome = tokio::task::spawn_blocking(move || executor.execute(&expression))
        .await
        .context("Evaluation task failed")?;
    match outcome {
        Ok(answer) => print_stdout(&serialize_json(answer.value())?),
        Err(err) => {
            let envelope = GatewayError::from(err).envelope();
            print_stdout(&serialize_json(&envelope)?)?;
            std::process::exit(1);
        }
    }
}
