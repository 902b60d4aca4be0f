//! fql: render, send and decode FQL queries from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show the wire request for a template
//! fql render 'Users.byId(${})' --arg '"42"'
//!
//! # Send it (secret from FAUNA_SECRET)
//! fql query 'Users.byId(${}) { name }' --arg '"42"'
//!
//! # Decode a saved response
//! fql decode response.json
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use fauna_fql::config::{self, ClientConfiguration};
use fauna_fql::prelude::*;
use tracing_subscriber::EnvFilter;

/// Marks a hole in a command-line template.
const HOLE: &str = "${}";

#[derive(Parser)]
#[command(name = "fql")]
#[command(version)]
#[command(about = "Render, send and decode FQL queries", long_about = None)]
#[command(after_help = "EXAMPLES:
    fql render 'Users.byId(${})' --arg '\"42\"'
    fql query 'Users.where(.age > ${})' --arg 30 --endpoint local
    fql decode response.json")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the wire request for a template
    Render {
        /// Template with ${} holes
        template: String,
        /// JSON value for each hole, in order
        #[arg(short, long)]
        arg: Vec<String>,
    },
    /// Send a template to the database
    Query {
        /// Template with ${} holes
        template: String,
        /// JSON value for each hole, in order
        #[arg(short, long)]
        arg: Vec<String>,
        /// Don't send, just show the request
        #[arg(long)]
        dry_run: bool,
        /// Endpoint name (cloud, preview, local) or URL
        #[arg(long, env = "FAUNA_ENDPOINT")]
        endpoint: Option<String>,
        /// Database secret
        #[arg(long, env = "FAUNA_SECRET", hide_env_values = true)]
        secret: Option<String>,
        /// Config file (defaults to the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Read at or after the latest committed transaction
        #[arg(long)]
        linearized: bool,
    },
    /// Decode tagged JSON from a file or stdin
    Decode {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Show the tag reference
    Tags,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Render { template, arg } => {
            let query = build_query(&template, &arg)?;
            print_request(&query.render(&QueryOptions::default())?)?;
        }
        Commands::Query {
            template,
            arg,
            dry_run,
            endpoint,
            secret,
            config: config_path,
            linearized,
        } => {
            let query = build_query(&template, &arg)?;
            let mut configuration = load_config(config_path.as_deref())?;
            if let Some(endpoint) = endpoint {
                configuration.endpoint = config::resolve_endpoint(&endpoint)?;
            }
            if let Some(secret) = secret {
                configuration.secret = Some(secret);
            }
            let mut overrides = QueryOptions::new();
            if linearized {
                overrides = overrides.linearized(true);
            }

            if dry_run {
                let request = query.render(&configuration.query.merge(&overrides))?;
                print_request(&request)?;
                println!();
                println!("{}", "No query sent.".yellow());
                return Ok(());
            }

            if cli.verbose {
                println!("{} {}", "Endpoint:".dimmed(), configuration.endpoint);
            }
            let client = Client::new(configuration)?;
            let result = client.query(&query, Some(&overrides)).await?;

            println!("{}", "Data:".green().bold());
            println!("{}", serde_json::to_string_pretty(&result.data.to_plain_json())?);
            if let Some(summary) = result.summary.filter(|s| !s.is_empty()) {
                println!();
                println!("{}", "Summary:".cyan());
                println!("{}", summary);
            }
            if let Some(stats) = result.stats {
                println!();
                println!(
                    "{} compute {} · read {} · write {} · {} ms",
                    "Stats:".dimmed(),
                    stats.compute_ops,
                    stats.read_ops,
                    stats.write_ops,
                    stats.query_time_ms
                );
            }
        }
        Commands::Decode { file } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let value = fauna_fql::decode(&input)?;
            println!("{}", serde_json::to_string_pretty(&value.to_plain_json())?);
        }
        Commands::Tags => show_tags(),
    }
    Ok(())
}

/// Split a template on `${}` and pair each hole with a JSON `--arg`.
fn build_query(template: &str, args: &[String]) -> anyhow::Result<Query> {
    let fragments: Vec<&str> = template.split(HOLE).collect();
    let interpolations = args
        .iter()
        .map(|raw| {
            serde_json::from_str::<serde_json::Value>(raw)
                .map(|json| Interpolation::Literal(Value::from(json)))
                .with_context(|| format!("--arg {} is not valid JSON", raw))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Query::new(fragments, interpolations)?)
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ClientConfiguration> {
    match path {
        Some(path) => Ok(ClientConfiguration::load(path)?),
        None => match config::default_config_path().filter(|p| p.exists()) {
            Some(path) => Ok(ClientConfiguration::load(path)?),
            None => Ok(ClientConfiguration::default()),
        },
    }
}

fn print_request(request: &QueryRequest) -> anyhow::Result<()> {
    println!("{}", "Request:".green().bold());
    println!("{}", serde_json::to_string_pretty(request)?);

    let headers = request.options.to_headers();
    if !headers.is_empty() {
        println!();
        println!("{}", "Headers:".cyan());
        for (name, value) in headers {
            println!("  {}: {}", name, value.yellow());
        }
    }
    Ok(())
}

fn show_tags() {
    println!("{}", "Tagged Type Reference".cyan().bold());
    println!();

    let tags = [
        ("@int", "32-bit integer", "{\"@int\": \"42\"}"),
        ("@long", "64-bit integer", "{\"@long\": \"2147483648\"}"),
        ("@double", "Floating point", "{\"@double\": \"1.5\"}"),
        ("@date", "Calendar date", "{\"@date\": \"2023-03-09\"}"),
        ("@time", "Instant", "{\"@time\": \"2023-03-09T00:00:00Z\"}"),
        ("@mod", "Module reference", "{\"@mod\": \"Users\"}"),
        ("@doc", "Document reference", "{\"@doc\": \"Users:123\"}"),
        ("@ref", "Reference descriptor", "{\"@ref\": {...}}"),
        ("@set", "Set descriptor", "{\"@set\": ...}"),
        ("@object", "Object with @ keys", "{\"@object\": {\"@k\": 1}}"),
    ];

    println!(
        "{:10} {:22} {}",
        "Tag".white().bold(),
        "Carries".white().bold(),
        "Example".white().bold()
    );
    println!("{}", "─".repeat(70).dimmed());

    for (tag, carries, example) in tags {
        println!("{:10} {:22} {}", tag.cyan().bold(), carries.yellow(), example.dimmed());
    }
}
