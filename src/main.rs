use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "splitpack")]
#[command(about = "Install, verify and activate split packages")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages already present in the store (all when none named)
    Install {
        /// Split manifest (YAML)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Package names to install
        names: Vec<String>,
        /// Require a trusted signature even if config does not
        #[arg(long)]
        verify_signature: bool,
    },
    /// Show which installed packages a process would load, in order
    Plan {
        #[arg(short, long)]
        manifest: PathBuf,
        /// Process name or ":suffix" rule (main process when omitted)
        #[arg(short, long, default_value = "")]
        process: String,
        /// Packages the process has already loaded
        #[arg(short, long)]
        loaded: Vec<String>,
        /// Print activation records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget installed packages
    Uninstall {
        #[arg(short, long)]
        manifest: PathBuf,
        #[arg(required = true)]
        names: Vec<String>,
        /// Apply on the next install instead of now
        #[arg(long)]
        deferred: bool,
    },
    /// Delete superseded and orphaned package versions
    Sweep {
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Show install state of every declared package
    Status {
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Remove store roots of other app identities and stale scratch files
    Clean {
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Print content hashes for manifest authoring
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// blake3 or sha256 (defaults to checksum_algorithm from config)
        #[arg(short, long)]
        algorithm: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Install {
            manifest,
            names,
            verify_signature,
        } => cli::install::run(config, &manifest, names, verify_signature).await,
        Commands::Plan {
            manifest,
            process,
            loaded,
            json,
        } => cli::plan::run(config, &manifest, &process, loaded, json),
        Commands::Uninstall {
            manifest,
            names,
            deferred,
        } => cli::uninstall::run(config, &manifest, names, deferred),
        Commands::Sweep { manifest } => cli::sweep::run(config, &manifest),
        Commands::Status { manifest } => cli::status::run(config, &manifest),
        Commands::Clean { manifest } => cli::clean::run(config, &manifest),
        Commands::Hash { files, algorithm } => cli::hash::run(config, files, algorithm),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{}", splitpack::format_error_with_help(&e));
            ExitCode::FAILURE
        }
    }
}
