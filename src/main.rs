#![deny(unsafe_code)]
pub mod commands;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

use commands::command::Command;
use commands::protocol::Protocol;
use commands::run::Run;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use fusepipe_lib::config::LogLevel;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "fusepipe", styles = STYLES)]
struct Args {
    /// Log verbosity
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version)]
enum Subcommand {
    #[command(display_order = 1)]
    Run(Run),
    #[command(display_order = 2)]
    Protocol(Protocol),
}

fn main() -> Result<()> {
    // Capture the full command line before clap parsing, for the logs
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_filter()))
        .init();

    info!("Running fusepipe version {}", env!("CARGO_PKG_VERSION"));
    args.subcommand.execute(&command_line)
}
