mod config;
mod serve;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use a2p_core::{RegistrationForm, Stage};
use a2p_provider::TwilioClient;
use a2p_storage::{MemoryStore, RegistrationStore, StorageError};
use a2p_workflow::{ActivityLog, Registrar, RegistrationOutcome};

use crate::config::A2pConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// A2P 10DLC registration service.
#[derive(Parser)]
#[command(name = "a2p", version, about = "A2P 10DLC registration service")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP registration and webhook server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// TOML configuration file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
        /// TLS certificate file (PEM); requires the `tls` feature
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// TLS private key file (PEM); requires the `tls` feature
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Run one registration from a form JSON file
    Register {
        /// Path to the registration form JSON
        form: PathBuf,
        /// Owner recorded on the registration
        #[arg(long, default_value = "cli")]
        user_id: String,
        /// TOML configuration file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a stored registration
    Show {
        /// Registration ID
        id: String,
        /// Registration snapshot file (defaults to A2P_DATA_FILE)
        #[arg(long)]
        data_file: Option<PathBuf>,
    },

    /// Load and validate the configuration without starting anything
    CheckConfig {
        /// TOML configuration file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Serve {
            port,
            config,
            tls_cert,
            tls_key,
        } => {
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "error: --tls-cert and --tls-key must both be provided",
                    cli.output,
                    cli.quiet,
                );
                process::exit(1);
            }
            let config = load_config(config.as_deref(), cli.output, cli.quiet);
            let rt = runtime(cli.output, cli.quiet);
            if let Err(e) = rt.block_on(serve::start_server(config, port, tls_cert, tls_key)) {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Register {
            form,
            user_id,
            config,
        } => {
            let config = load_config(config.as_deref(), cli.output, cli.quiet);
            cmd_register(&form, &user_id, config, cli.output, cli.quiet);
        }
        Commands::Show { id, data_file } => {
            cmd_show(&id, data_file, cli.output, cli.quiet);
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref(), cli.output, cli.quiet);
            cmd_check_config(&config, cli.output, cli.quiet);
        }
    }
}

/// Install the global `tracing` subscriber on stderr. `RUST_LOG` wins;
/// otherwise `info`, or `error` with `--quiet`.
fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to start async runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> A2pConfig {
    match A2pConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("configuration error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// The registration store: snapshot-backed when a data file is given.
pub(crate) fn open_store(
    data_file: Option<&Path>,
) -> Result<Arc<dyn RegistrationStore>, StorageError> {
    Ok(match data_file {
        Some(path) => Arc::new(MemoryStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    })
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_register(
    form_path: &Path,
    user_id: &str,
    config: A2pConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let form: RegistrationForm = match std::fs::read_to_string(form_path)
        .map_err(|e| format!("error reading file '{}': {}", form_path.display(), e))
        .and_then(|text| {
            serde_json::from_str(&text)
                .map_err(|e| format!("error parsing form in '{}': {}", form_path.display(), e))
        }) {
        Ok(form) => form,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    if config.data_file.is_none() && !quiet {
        eprintln!("warning: A2P_DATA_FILE is not set; the registration will not be kept");
    }
    let store = match open_store(config.data_file.as_deref()) {
        Ok(store) => store,
        Err(e) => {
            report_error(&format!("storage error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let hub = Arc::new(TwilioClient::new(config.credentials, config.endpoints));
    let registrar = Registrar::new(
        store,
        hub,
        config.base_url,
        Arc::new(ActivityLog::new(config.activity_capacity)),
    );

    let rt = runtime(output, quiet);
    match rt.block_on(registrar.register(user_id, form)) {
        Ok(outcome) => {
            print_outcome(&outcome, output);
            if !outcome.success {
                process::exit(1);
            }
        }
        Err(e) => {
            report_error(&format!("registration failed: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn print_outcome(outcome: &RegistrationOutcome, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Text => {
            println!("registration {}: {}", outcome.registration_id, outcome.message);
            if let Some(error) = &outcome.error {
                println!("  error: {}", error);
            }
            if let Some(sids) = &outcome.data {
                for (stage, sid) in sids.iter() {
                    println!("  {:<20} {}", stage.label(), sid);
                }
            }
        }
    }
}

fn cmd_show(id: &str, data_file: Option<PathBuf>, output: OutputFormat, quiet: bool) {
    let data_file = data_file.or_else(|| {
        std::env::var("A2P_DATA_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });
    let Some(data_file) = data_file else {
        report_error(
            "error: no data file; pass --data-file or set A2P_DATA_FILE",
            output,
            quiet,
        );
        process::exit(1);
    };

    let store = match MemoryStore::open(&data_file) {
        Ok(store) => store,
        Err(e) => {
            report_error(&format!("storage error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let rt = runtime(output, quiet);
    let registration = match rt.block_on(store.get_by_id(id)) {
        Ok(Some(registration)) => registration,
        Ok(None) => {
            report_error(
                &format!("error: no registration with id '{}'", id),
                output,
                quiet,
            );
            process::exit(1);
        }
        Err(e) => {
            report_error(&format!("storage error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&registration),
        OutputFormat::Text => {
            println!("registration {} ({})", registration.id, registration.status);
            println!("  owner:   {}", registration.user_id);
            println!("  company: {}", registration.form_data.legal_company_name);
            for stage in Stage::ALL {
                let sid = registration.sids.get(stage).unwrap_or("-");
                let state = registration
                    .steps
                    .get(&stage)
                    .map(|step| step.status.to_string())
                    .unwrap_or_else(|| "pending".to_string());
                println!("  {:<20} {:<12} {}", stage.label(), state, sid);
            }
        }
    }
}

fn cmd_check_config(config: &A2pConfig, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "valid": true,
            "accountSid": config.credentials.account_sid,
            "baseUrl": config.base_url,
            "apiKey": config.api_key.is_some(),
            "rateLimit": config.rate_limit,
            "activityCapacity": config.activity_capacity,
            "dataFile": config.data_file,
            "endpoints": {
                "trusthub": config.endpoints.trusthub,
                "messaging": config.endpoints.messaging,
                "api": config.endpoints.api,
            },
        })),
        OutputFormat::Text => {
            println!("configuration OK");
            println!("  account:   {}", config.credentials.account_sid);
            println!("  base url:  {}", config.base_url);
            println!(
                "  api key:   {}",
                if config.api_key.is_some() { "set" } else { "not set" }
            );
            println!("  rate:      {} requests/min per IP", config.rate_limit);
            match &config.data_file {
                Some(path) => println!("  data file: {}", path.display()),
                None => println!("  data file: (in memory)"),
            }
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("error: failed to serialize output: {}", e);
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
