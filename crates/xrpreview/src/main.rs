mod bindings;
mod cli;
mod paths;
mod run;

use std::path::Path;

use anyhow::{Context, Result};
use cli::{Command, ConfigAction};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Config(config_cmd)) => handle_config_command(config_cmd.action),
        None => run::run(cli.run),
    }
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    match action {
        ConfigAction::Where => run_config_where(&paths),
        ConfigAction::Check { config } => run_config_check(&paths, config.as_deref()),
    }
}

fn run_config_where(paths: &AppPaths) -> Result<()> {
    let file = paths.config_file();
    println!("Configuration:");
    println!("  dir:   {}", paths.config_dir().display());
    println!(
        "  file:  {} ({})",
        file.display(),
        if file.exists() { "present" } else { "missing" }
    );
    Ok(())
}

fn run_config_check(paths: &AppPaths, explicit: Option<&Path>) -> Result<()> {
    let (config, source) = run::load_config(explicit, paths)?;
    match source {
        Some(path) => println!("Configuration OK: {}", path.display()),
        None => println!(
            "No configuration at {}; using built-in defaults",
            paths.config_file().display()
        ),
    }
    let effective =
        serde_json::to_string_pretty(&config).context("failed to encode configuration")?;
    println!("{effective}");
    Ok(())
}
