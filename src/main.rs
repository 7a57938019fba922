// src/main.rs
//! nix-patch - CLI entry point

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use nix_patch::commands;
use nix_patch::config::{Config, DEFAULT_EDITOR, DEFAULT_TIMEOUT};
use nix_patch::store::NixStore;
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "nix-patch")]
#[command(version)]
#[command(
    about = "Edit files in the Nix store and rewrite the dependent closure",
    long_about = "Edit a file inside the Nix store. The edit is imported as a new \
store path and every path that transitively depends on it is rewritten so the \
whole closure points at the edited content."
)]
struct Cli {
    /// Store path (or a file inside one) to edit
    path: Option<String>,

    /// Editor command to open the extracted file with
    #[arg(long, env = "EDITOR", default_value = DEFAULT_EDITOR)]
    editor: String,

    /// Wall-clock deadline for one run, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Preview changes without importing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Permit risky edits such as binary files
    #[arg(long)]
    force: bool,

    /// Override detected system type (nixos, home-manager, profile)
    #[arg(long = "system", value_name = "TYPE")]
    system_type: Option<String>,

    /// Path to a custom profile (with --system=profile)
    #[arg(long = "profile", value_name = "PATH")]
    profile_path: Option<String>,

    /// Custom activation command ({path} and {profile} are substituted)
    #[arg(long = "activate", value_name = "COMMAND")]
    activation_command: Option<String>,

    /// Root directory for the Nix store (e.g. ./foo for ./foo/nix/store)
    #[arg(long = "store", value_name = "ROOT")]
    store_root: Option<String>,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "nix-patch", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = cli.path else {
        eprintln!("error: exactly one path argument is required");
        eprintln!("Run 'nix-patch --help' for usage information");
        return ExitCode::from(2);
    };

    let mut cfg = Config {
        path,
        editor: cli.editor,
        timeout: Duration::from_secs(cli.timeout),
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        force: cli.force,
        system_type: cli.system_type.unwrap_or_default(),
        profile_path: cli.profile_path.unwrap_or_default(),
        activation_command: cli.activation_command.unwrap_or_default(),
        store_root: cli.store_root.unwrap_or_default(),
    };

    if let Err(e) = cfg.validate() {
        eprintln!("error: {}", e);
        return ExitCode::from(e.exit_code() as u8);
    }

    if !cfg.store_root.is_empty() && cfg!(target_os = "macos") {
        eprintln!("error: a custom --store is not supported on macOS");
        return ExitCode::from(2);
    }

    // Only trusted users may modify the store; everyone else still gets
    // the dry-run plan.
    let store = NixStore::new(&cfg.store_root);
    match store.is_trusted_user() {
        Ok(true) => {}
        Ok(false) => {
            if !cfg.dry_run {
                warn!("you are not a trusted user; only trusted users can modify the store");
                warn!("enabling dry-run mode (add yourself to trusted-users in nix.conf)");
                cfg.dry_run = true;
            }
        }
        Err(e) => {
            warn!("could not determine trusted user status: {}", e);
            warn!("defaulting to dry-run mode");
            cfg.dry_run = true;
        }
    }

    match commands::cmd_edit(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
