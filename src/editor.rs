// src/editor.rs

//! External editor invocation
//!
//! The editor command may carry arguments ("vim -n", "sed -i s/a/b/"), so
//! it runs through `sh -c` with the terminal attached.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Open `path` in the configured editor and wait for it to exit.
pub fn open(editor_cmd: &str, path: &Path) -> Result<()> {
    if editor_cmd.is_empty() {
        return Err(Error::Config("empty editor command".to_string()));
    }

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{} {}", editor_cmd, shell_quote(path)))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| Error::Editor(format!("failed to run {}: {}", editor_cmd, e)))?;

    if !status.success() {
        return Err(Error::Editor(format!(
            "{} exited with {}",
            editor_cmd, status
        )));
    }
    Ok(())
}

/// Quote a path for the shell command line.
fn shell_quote(path: &Path) -> String {
    let raw = path.display().to_string();
    format!("'{}'", raw.replace('\'', r"'\''"))
}
