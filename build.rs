// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("nix-patch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Edit files in the Nix store and rewrite the dependent closure")
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("Store path (or a file inside one) to edit"),
        )
        .arg(
            Arg::new("editor")
                .long("editor")
                .value_name("COMMAND")
                .help("Editor command to open the extracted file with"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Wall-clock deadline for one run"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Preview changes without importing anything"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose logging"),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Permit risky edits such as binary files"),
        )
        .arg(
            Arg::new("system")
                .long("system")
                .value_name("TYPE")
                .help("Override detected system type (nixos, home-manager, profile)"),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PATH")
                .help("Path to a custom profile (with --system=profile)"),
        )
        .arg(
            Arg::new("activate")
                .long("activate")
                .value_name("COMMAND")
                .help("Custom activation command ({path} and {profile} are substituted)"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("ROOT")
                .help("Root directory for the Nix store (e.g. ./foo for ./foo/nix/store)"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    if let Err(e) = fs::write(man_dir.join("nix-patch.1"), buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
