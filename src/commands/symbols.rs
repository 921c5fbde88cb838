//! `symbols` subcommand: analyze and dump the symbol table as JSON.

use serde_json::json;
use crate::STDRESULT;
use crate::server::Analysis;

pub fn symbols(cmd: &clap::ArgMatches) -> STDRESULT {
    let doc = super::document_from_matches(cmd)?;
    let mut analyzer = super::analyzer_from_matches(cmd)?;
    analyzer.analyze(&doc)?;
    let tables = analyzer.get_symbols();

    let mut ords: Vec<serde_json::Value> = Vec::new();
    let mut names: Vec<&String> = tables.ords.keys().collect();
    names.sort();
    for name in names {
        let sym = &tables.ords[name];
        ords.push(json!({
            "name": sym.name,
            "value": sym.value,
            "type": sym.type_letter.map(|c| c.to_string()),
            "length": sym.length,
            "defs": sym.defs.len(),
            "refs": sym.refs.len()
        }));
    }
    let mut vars: Vec<serde_json::Value> = Vec::new();
    let mut names: Vec<&String> = tables.vars.keys().collect();
    names.sort();
    for name in names {
        let sym = &tables.vars[name];
        vars.push(json!({
            "name": format!("&{}",sym.name),
            "type": sym.type_letter.map(|c| format!("SET{}",c)),
            "global": sym.flags & crate::lsp::symbol_flags::GBL != 0
        }));
    }
    let mut macros: Vec<&String> = tables.macros.keys().collect();
    macros.sort();

    let report = json!({
        "document": tables.master_doc_uri,
        "ordinary": ords,
        "variables": vars,
        "macros": macros
    });
    println!("{}",serde_json::to_string_pretty(&report)?);
    Ok(())
}
