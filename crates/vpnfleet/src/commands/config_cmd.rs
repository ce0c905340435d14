//! Config subcommand handlers.

use serde::Serialize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// What `config validate` found.
#[derive(Debug, Serialize)]
struct ValidationSummary {
    path: String,
    pools: usize,
    instances: usize,
    servers: usize,
}

fn summarize(cfg: &Config, path: String) -> Result<ValidationSummary, CliError> {
    cfg.validate()?;
    let pools = cfg.pools()?;
    let servers = cfg.fleet_entries(&pools)?.len();
    Ok(ValidationSummary {
        path,
        instances: pools.iter().map(|p| p.instances.len()).sum(),
        pools: pools.len(),
        servers,
    })
}

/// `config show`: TOML for table and plain output, serde for the rest.
fn show(cfg: &Config, format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(cfg.to_toml()?),
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            output::render_single(format, cfg, |_| String::new(), |_| String::new())
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::resolved_path(global);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = show(&cfg, &global.output)?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Validate => {
            if !path.exists() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            let cfg = config::load(global)?;
            let summary = summarize(&cfg, path.display().to_string())?;
            tracing::info!(pools = summary.pools, servers = summary.servers, "configuration valid");

            let out = output::render_single(
                &global.output,
                &summary,
                |s| {
                    format!(
                        "{}: OK ({} pools, {} instances, {} servers)",
                        s.path, s.pools, s.instances, s.servers
                    )
                },
                |s| s.path.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
