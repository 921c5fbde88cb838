//! `verify` subcommand: analyze and print diagnostics to the console.

use colored::*;
use lsp_types::DiagnosticSeverity;
use crate::STDRESULT;
use crate::server::Analysis;
use super::CommandError;

pub fn verify(cmd: &clap::ArgMatches) -> STDRESULT {
    let doc = super::document_from_matches(cmd)?;
    let mut analyzer = super::analyzer_from_matches(cmd)?;
    analyzer.analyze(&doc)?;
    for uri in analyzer.diagnosed_files() {
        let diags = match lsp_types::Url::parse(&uri) {
            Ok(parsed) => analyzer.get_diags(&crate::Document::new(parsed,String::new())),
            Err(_) => continue
        };
        for d in &diags {
            let code = match &d.code {
                Some(lsp_types::NumberOrString::String(s)) => s.clone(),
                Some(lsp_types::NumberOrString::Number(n)) => n.to_string(),
                None => String::new()
            };
            let sev = match d.severity {
                Some(DiagnosticSeverity::ERROR) => "error".red().bold(),
                Some(DiagnosticSeverity::WARNING) => "warning".yellow().bold(),
                Some(DiagnosticSeverity::INFORMATION) => "info".cyan(),
                _ => "hint".dimmed()
            };
            eprintln!("{} {} ({},{}): {} [{}]",sev,code,
                d.range.start.line+1,d.range.start.character+1,d.message,uri);
        }
    }
    let [err,warn,info] = analyzer.err_warn_info_counts();
    if err > 0 {
        eprintln!("\u{2717} {} ({} errors, {} warnings)","did not verify".red(),err,warn);
        return Err(Box::new(CommandError::VerifyFailed));
    }
    eprintln!("\u{2713} {} ({} warnings, {} notes)","Syntax OK".green(),warn,info);
    Ok(())
}
