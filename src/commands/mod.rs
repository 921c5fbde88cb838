//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.

pub mod verify;
pub mod symbols;
pub mod bench;
pub mod completions;

use clap::ArgMatches;
use crate::{Document,DYNERR};
use crate::analysis::Analyzer;
use crate::server::Analysis;

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("File not found")]
    FileNotFound,
    #[error("Source did not verify")]
    VerifyFailed
}

/// load the document named on the command line, or read stdin
pub fn document_from_matches(cmd: &ArgMatches) -> Result<Document,DYNERR> {
    match cmd.get_one::<String>("file") {
        Some(path) => Document::from_file_path(path),
        None => {
            let mut text = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(),&mut text)?;
            Ok(Document::untitled(text))
        }
    }
}

/// build an analyzer honoring the common command line options
pub fn analyzer_from_matches(cmd: &ArgMatches) -> Result<Analyzer,DYNERR> {
    let mut analyzer = Analyzer::new();
    let mut settings = serde_json::Map::new();
    if let Some(optable) = cmd.get_one::<String>("optable") {
        settings.insert("optable".to_string(),serde_json::Value::String(optable.clone()));
    }
    if let Ok(Some(sysparm)) = cmd.try_get_one::<String>("sysparm") {
        settings.insert("sysparm".to_string(),serde_json::Value::String(sysparm.clone()));
    }
    if !settings.is_empty() {
        analyzer.update_config(&serde_json::Value::Object(settings).to_string())?;
    }
    if let Some(dir) = cmd.get_one::<String>("workspace") {
        let full = std::fs::canonicalize(dir)?;
        match lsp_types::Url::from_file_path(&full) {
            Ok(uri) => analyzer.init_workspace(vec![uri])?,
            Err(_) => return Err(Box::new(CommandError::FileNotFound))
        }
    }
    Ok(analyzer)
}
