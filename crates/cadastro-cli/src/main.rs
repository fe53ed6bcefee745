use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadastro_core::{
    AppConfig, Candidate, FormStore, PersonLookup, SearchController, SearchMode, StaticLookup,
};
use cadastro_lookup::{PessoasSource, QueryFilter};

mod form;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cadastro",
    about = "Atualizar Cadastro de Pessoa — person-update form with remote search",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Search mode: eager, open or text. Overrides the config file.
    #[arg(long, global = true)]
    mode: Option<SearchMode>,

    /// Base URL of the people service (serves `/pessoas`).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Quiet period before a lookup, in milliseconds.
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    /// Search a local JSON file (`[{"id": 1, "nome": "..."}]`) instead of the service.
    #[arg(long, global = true)]
    people: Option<PathBuf>,

    /// Output in JSON format. Also enabled by setting CADASTRO_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in and submit the form interactively (default).
    Form,

    /// Run one debounced lookup and print the candidates.
    Search { query: String },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Write the default configuration to the config path.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("CADASTRO_JSON").as_deref() == Ok("1");

    let mut config = AppConfig::load().context("loading config")?;
    if let Some(mode) = cli.mode {
        config.search.mode = mode;
    }
    if let Some(base_url) = cli.base_url.clone() {
        config.lookup.base_url = base_url;
    }
    if let Some(ms) = cli.debounce_ms {
        config.search.debounce_ms = Some(ms);
    }

    init_tracing(&config.logging.level, cli.verbose);
    tracing::debug!(
        mode = ?config.search.mode,
        base_url = %config.lookup.base_url,
        offline = cli.people.is_some(),
        "config loaded"
    );

    match cli.command {
        None | Some(Commands::Form) => {
            let search = build_search(&config, cli.people.as_deref(), FormStore::new())?;
            form::run(&search, json_output).await?;
        }

        Some(Commands::Search { query }) => {
            let search = build_search(&config, cli.people.as_deref(), FormStore::new())?;
            search.on_open();
            search.on_text_change(query.clone());
            let snapshot = search.settled().await;
            let visible = form::visible_candidates(&snapshot, config.search.mode);

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": visible, "total": visible.len(), "query": query },
                }))?;
            } else if visible.is_empty() {
                println!("Nenhuma pessoa encontrada para \"{query}\".");
            } else {
                for candidate in &visible {
                    println!("{id:>6}  {nome}", id = candidate.id, nome = candidate.label);
                }
            }
        }

        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => {
                if json_output {
                    print_json(&serde_json::to_value(&config)?)?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
            ConfigAction::Init { force } => {
                let path = AppConfig::config_path();
                if path.exists() && !force {
                    eprintln!("{} already exists. Use --force to overwrite.", path.display());
                    std::process::exit(1);
                }
                AppConfig::default().save_to(&path)?;
                println!("Wrote {}", path.display());
            }
        },
    }

    Ok(())
}

fn init_tracing(level: &str, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_search(
    config: &AppConfig,
    people: Option<&std::path::Path>,
    store: FormStore,
) -> Result<SearchController> {
    let lookup: Arc<dyn PersonLookup> = match people {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let people: Vec<Candidate> = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?;
            Arc::new(StaticLookup::new(people))
        }
        None => {
            let filter = match config.search.mode {
                SearchMode::Eager => QueryFilter::Unfiltered,
                SearchMode::Open | SearchMode::Text => QueryFilter::ServerSide,
            };
            Arc::new(PessoasSource::from_config(config, filter)?)
        }
    };

    let search = SearchController::builder(lookup, store)
        .policy(config.search_policy())
        .lookup_timeout(config.search.lookup_timeout())
        .build()?;
    Ok(search)
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
