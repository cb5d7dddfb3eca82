use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use xrsession::SessionMode;

#[derive(Parser, Debug)]
#[command(
    name = "xrpreview",
    author,
    version,
    about = "Replays an immersive session lifecycle against a simulated host",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Preview configuration file; defaults to `preview.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session mode to request (`inline`, `immersive-vr`, `immersive-ar`).
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<SessionMode>,

    /// Mode probed when the primary one is unsupported, or `none`.
    #[arg(long, value_name = "MODE|none", value_parser = parse_fallback)]
    pub fallback_mode: Option<FallbackArg>,

    /// Animation frames to deliver while the session is active.
    #[arg(long, value_name = "N", default_value_t = 90)]
    pub frames: u32,

    /// Optional FPS cap for the render loop (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Who ends the session once the frames have been delivered.
    #[arg(long, value_enum, default_value_t = EndBy::User)]
    pub end_by: EndBy,

    /// Simulate a platform that supports no session mode at all.
    #[arg(long)]
    pub unsupported: bool,

    /// Make the host reject the session request.
    #[arg(long)]
    pub reject_request: bool,

    /// Make the host refuse to mark the render context compatible.
    #[arg(long)]
    pub fail_compat: bool,

    /// Make the host refuse to attach the presentation layer.
    #[arg(long)]
    pub fail_layer: bool,

    /// Make the host reject the end-session request.
    #[arg(long)]
    pub reject_end: bool,

    /// Seed for the simulated frame-timing jitter.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Report format printed to stdout after the replay.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndBy {
    /// Press the trigger again.
    User,
    /// The platform terminates the session on its own.
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackArg {
    Disabled,
    Mode(SessionMode),
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the preview configuration.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration directory and file.
    Where,
    /// Parse and validate the configuration, then print the effective settings.
    Check {
        /// Configuration file to check instead of the default location.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_mode(value: &str) -> Result<SessionMode, String> {
    if value.trim().is_empty() {
        return Err("session mode must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_fallback(value: &str) -> Result<FallbackArg, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" | "off" | "disabled" => Ok(FallbackArg::Disabled),
        _ => parse_mode(value).map(FallbackArg::Mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_aliases() {
        assert_eq!(parse_mode("ar"), Ok(SessionMode::ImmersiveAr));
        assert_eq!(parse_mode(" Immersive-VR "), Ok(SessionMode::ImmersiveVr));
        assert!(parse_mode("").is_err());
        assert!(parse_mode("flat").is_err());
    }

    #[test]
    fn fallback_accepts_none() {
        assert_eq!(parse_fallback("none"), Ok(FallbackArg::Disabled));
        assert_eq!(
            parse_fallback("inline"),
            Ok(FallbackArg::Mode(SessionMode::Inline))
        );
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "xrpreview",
            "--frames",
            "12",
            "--end-by",
            "host",
            "--fail-layer",
            "--report",
            "json",
        ])
        .expect("parse flags");
        assert_eq!(cli.run.frames, 12);
        assert_eq!(cli.run.end_by, EndBy::Host);
        assert!(cli.run.fail_layer);
        assert_eq!(cli.run.report, ReportFormat::Json);
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_subcommand_parses() {
        let cli = Cli::try_parse_from(["xrpreview", "config", "where"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand {
                action: ConfigAction::Where
            }))
        ));
    }
}
