/// Version injected at compile time via APIM_SYNC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("APIM_SYNC_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use apim_sync::apim::{ApimClient, EnvSecretStore};
use apim_sync::config::Config;
use apim_sync::manifest::Manifest;
use apim_sync::reconciler::{
    ApiVersion, BackendKind, Deployment, Descriptor, Presence, ResourceReconciler,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Reconcile API versions against Azure API Management
#[derive(Parser, Debug)]
#[command(name = "apim-sync", version = VERSION, about, long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Azure subscription id
    #[arg(long)]
    subscription: Option<String>,

    /// Resource group of the APIM service
    #[arg(long)]
    resource_group: Option<String>,

    /// APIM service name
    #[arg(long)]
    service: Option<String>,

    /// Extra query parameter sent on every request (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_query_param)]
    query: Vec<(String, String)>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn parse_query_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Operate on a versioned API
    Version {
        #[arg(value_enum)]
        action: Action,
        #[arg(long)]
        product: String,
        #[arg(long)]
        deployment: String,
        #[arg(long = "version-name")]
        version_name: String,
        /// Backend kind the version forwards to
        #[arg(long, default_value = "realtime")]
        backend: BackendKind,
    },
    /// Operate on the origin version of a deployment
    Deployment {
        #[arg(value_enum)]
        action: Action,
        #[arg(long)]
        product: String,
        #[arg(long)]
        deployment: String,
    },
    /// Print the ARM path of an API version id
    Path { version_id: String },
    /// Upsert everything listed in a YAML manifest
    Apply {
        manifest: PathBuf,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    Exists,
    Probe,
    Create,
    Update,
    Delete,
    /// Print the record that would be sent, without calling APIM
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("apim-sync {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("apim-sync").join("apim-sync.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".apim-sync").join("apim-sync.log");
    }
    PathBuf::from("apim-sync.log")
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    config.apply_env();

    if let Some(v) = &args.subscription {
        config.subscription_id = Some(v.clone());
    }
    if let Some(v) = &args.resource_group {
        config.resource_group = Some(v.clone());
    }
    if let Some(v) = &args.service {
        config.service_name = Some(v.clone());
    }
    Ok(config)
}

fn build_reconciler(config: &Config, query: &[(String, String)]) -> Result<ResourceReconciler> {
    let settings = config.client_settings()?;
    let credentials = config.credentials(Arc::new(EnvSecretStore));
    let client = ApimClient::new(settings, credentials).context("Failed to create APIM client")?;
    let reconciler = query.iter().fold(
        ResourceReconciler::new(client, config.backend_registry()),
        |reconciler, (key, value)| reconciler.with_query_param(key, value),
    );
    Ok(reconciler)
}

async fn run_action(
    reconciler: &ResourceReconciler,
    action: Action,
    descriptor: &Descriptor,
) -> Result<()> {
    let id = descriptor.identity();
    match action {
        Action::Exists => println!("{}", reconciler.exists(descriptor).await?),
        Action::Probe => match reconciler.probe(descriptor).await? {
            Presence::Present => println!("present"),
            Presence::Absent => println!("absent"),
            Presence::Unknown(status) => println!("unknown ({})", status),
        },
        Action::Create => {
            reconciler.create(descriptor).await?;
            println!("created {}", id);
        }
        Action::Update => {
            reconciler.update(descriptor).await?;
            println!("updated {}", id);
        }
        Action::Delete => {
            reconciler.delete(descriptor).await?;
            println!("deleted {}", id);
        }
        Action::Show => {
            let record = reconciler.materialize(descriptor)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let config = load_config(&args)?;

    match &args.command {
        Command::Version {
            action,
            product,
            deployment,
            version_name,
            backend,
        } => {
            let reconciler = build_reconciler(&config, &args.query)?;
            let descriptor = Descriptor::versioned(
                ApiVersion::new(product, deployment, version_name),
                *backend,
            );
            run_action(&reconciler, *action, &descriptor).await?;
        }
        Command::Deployment {
            action,
            product,
            deployment,
        } => {
            let reconciler = build_reconciler(&config, &args.query)?;
            let descriptor = Descriptor::origin(Deployment::new(product, deployment));
            run_action(&reconciler, *action, &descriptor).await?;
        }
        Command::Path { version_id } => {
            let coordinates = config.coordinates()?;
            println!("{}", coordinates.api_path(version_id));
        }
        Command::Apply {
            manifest,
            concurrency,
        } => {
            let reconciler = build_reconciler(&config, &args.query)?;
            let manifest = Manifest::load(manifest)?;
            let report = reconciler
                .apply(&manifest.descriptors(), *concurrency)
                .await?;

            for id in &report.created {
                println!("created {}", id);
            }
            for id in &report.updated {
                println!("updated {}", id);
            }
            for (id, err) in &report.failed {
                eprintln!("failed  {}: {}", id, err);
            }
            if !report.is_success() {
                bail!("{} resource(s) failed to apply", report.failed.len());
            }
        }
    }

    Ok(())
}
