//! # Command Line Interface
//!
//! Dispatch commands to `commands` module.

use env_logger;
#[cfg(windows)]
use colored;
use hlasmkit::commands;
mod cli;

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).unwrap();

    let main_cmd = cli::build_cli();
    let matches = main_cmd.get_matches();

    // Shell completions

    if let Some(cmd) = matches.subcommand_matches("completions") {
        return commands::completions::generate(cli::build_cli(),cmd);
    }

    // Analyze and print diagnostics

    if let Some(cmd) = matches.subcommand_matches("verify") {
        return commands::verify::verify(cmd);
    }

    // Analyze and dump the symbol table

    if let Some(cmd) = matches.subcommand_matches("symbols") {
        return commands::symbols::symbols(cmd);
    }

    // Time the analysis

    if let Some(cmd) = matches.subcommand_matches("bench") {
        return commands::bench::bench(cmd);
    }

    log::error!("unrecognized subcommand");
    Err(Box::new(commands::CommandError::InvalidCommand))
}
