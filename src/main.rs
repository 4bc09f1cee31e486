//! rclone-ndk
//!
//! Cross-compiles rclone into `librclone.so` for each Android ABI.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rclone_ndk::commands::{
    BuildAllCommand, BuildCommand, CleanCommand, DoctorCommand, EnvCommand, FetchCommand,
};
use rclone_ndk::core::{BuildConfig, Error};
use rclone_ndk::toolchain::Abi;

#[derive(Parser)]
#[command(name = "rclone-ndk")]
#[command(about = "Build rclone as an Android shared library for every ABI")]
#[command(version)]
struct Cli {
    /// Project root holding local.properties and the output tree
    #[arg(long, global = true, default_value = ".", env = "RCLONE_NDK_PROJECT_DIR")]
    project_dir: PathBuf,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the pinned rclone module into the cache
    Fetch,
    /// Build the library for one ABI
    Build {
        /// armeabi-v7a, arm64-v8a, x86 or x86_64
        abi: Abi,
    },
    /// Build the library for every ABI
    #[command(name = "build-all")]
    BuildAll {
        /// Concurrent builds
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },
    /// Remove the dependency cache and every built library
    Clean,
    /// Print the build environment for one ABI
    Env {
        abi: Abi,
        #[arg(long)]
        json: bool,
    },
    /// Check SDK, NDK, compilers and Go
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let project_dir = std::env::current_dir()?.join(&cli.project_dir);
    let config = BuildConfig::load(&project_dir, cli.config.as_deref())?;
    debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Fetch => {
            FetchCommand.execute(&config).await?;
        }
        Commands::Build { abi } => {
            BuildCommand { abi }.execute(&config).await?;
        }
        Commands::BuildAll { jobs } => {
            let show_progress = !cli.quiet && std::io::stderr().is_terminal();
            BuildAllCommand { jobs, show_progress }.execute(&config).await?;
        }
        Commands::Clean => CleanCommand.execute(&config).await?,
        Commands::Env { abi, json } => {
            EnvCommand { abi, json }.execute(&config)?;
        }
        Commands::Doctor { json } => {
            DoctorCommand { json }.execute(&config).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        if let Some(hint) = e.downcast_ref::<Error>().and_then(Error::hint) {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_all() {
        let cli = Cli::parse_from(["rclone-ndk", "build-all", "--jobs", "4", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::BuildAll { jobs: 4 }));
    }

    #[test]
    fn test_parse_abi_aliases() {
        let cli = Cli::parse_from(["rclone-ndk", "build", "arm64"]);
        assert!(matches!(cli.command, Commands::Build { abi: Abi::Arm64V8a }));

        assert!(Cli::try_parse_from(["rclone-ndk", "build", "mips"]).is_err());
    }
}
