//! `generate` handlers: server configurations and firewall rules.
//!
//! With `--out-dir` the files are written and their paths listed;
//! otherwise the contents go to stdout (JSON / YAML as a name -> text map).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use vpnfleet_core::generate::{
    self, IP6TABLES_FILE, IPTABLES_FILE, firewall, render_lines, server_config,
};

use crate::cli::{GenerateArgs, GenerateCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

/// Generated files, keyed by file name in generation order.
type Files = Vec<(String, String)>;

fn server_config_files(cfg: &Config, global: &GlobalOpts) -> Result<Files, CliError> {
    let pools = config::require_pools(cfg, global)?;
    let node = config::node_settings(cfg, global)?;
    let configs = server_config::generate(&pools, &node)?;

    Ok(configs
        .iter()
        .map(|(key, lines)| (generate::server_config_file_name(key), render_lines(lines)))
        .collect())
}

fn firewall_files(cfg: &Config, global: &GlobalOpts) -> Result<Files, CliError> {
    let pools = config::require_pools(cfg, global)?;
    let rules = firewall::generate(&pools);
    Ok(vec![
        (IPTABLES_FILE.to_owned(), rules.v4),
        (IP6TABLES_FILE.to_owned(), rules.v6),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(cfg: &Config, args: GenerateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (files, out_dir) = match args.command {
        GenerateCommand::ServerConfig { out_dir } => (server_config_files(cfg, global)?, out_dir),
        GenerateCommand::Firewall { out_dir } => (firewall_files(cfg, global)?, out_dir),
    };

    match out_dir {
        Some(dir) => write_all(&dir, &files, global),
        None => print_all(&files, global),
    }
}

fn write_all(dir: &Path, files: &Files, global: &GlobalOpts) -> Result<(), CliError> {
    for (name, contents) in files {
        util::write_file(dir, name, contents)?;
    }
    let written: Vec<String> = files
        .iter()
        .map(|(name, _)| dir.join(name).display().to_string())
        .collect();

    let out = output::render_single(
        &global.output,
        &written,
        |paths| paths.join("\n"),
        |paths| paths.join("\n"),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_all(files: &Files, global: &GlobalOpts) -> Result<(), CliError> {
    let by_name: BTreeMap<&str, &str> = files
        .iter()
        .map(|(name, contents)| (name.as_str(), contents.as_str()))
        .collect();

    let out = output::render_single(
        &global.output,
        &by_name,
        |_| concatenated(files),
        |_| concatenated(files),
    )?;
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

/// Every file preceded by a `# ==> name <==` banner when there is more
/// than one.
fn concatenated(files: &Files) -> String {
    if let [(_, only)] = files.as_slice() {
        return only.clone();
    }
    let mut out = String::new();
    for (name, contents) in files {
        let _ = writeln!(out, "# ==> {name} <==");
        out.push_str(contents);
        out.push('\n');
    }
    out
}
