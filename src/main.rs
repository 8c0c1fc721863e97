use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::WriteStyle;
use log::LevelFilter;

use crate::cmd::{Check, Info, Scan};

mod cmd;
mod util;

/// Command-line tool for identifying library functions in N64 ROM images.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enables debug logs.
    #[arg(long, short)]
    debug: bool,

    /// Forces colored output.
    #[arg(long, short)]
    force_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Scan(Scan),
    Info(Info),
    Check(Check),
}

impl Command {
    fn run(&self) -> Result<()> {
        match self {
            Command::Scan(scan) => scan.run(),
            Command::Info(info) => info.run(),
            Command::Check(check) => check.run(),
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    let level = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    let write_style = if args.force_color { WriteStyle::Always } else { WriteStyle::Auto };
    env_logger::builder().filter_level(level).write_style(write_style).init();

    args.command.run()
}
