//! Checkpointed analysis results.
//!
//! Provides data to a language client while the analyzer runs in another
//! thread: the last good document, symbol tables, definitions, references,
//! document symbols and folding ranges.

use lsp_types as lsp;
use std::sync::Arc;
use crate::{Document,range_contains_pos};
use super::{Symbols,symbol_flags};

pub struct CheckpointManager {
    doc: Document,
    symbols: Arc<Symbols>
}

#[allow(deprecated)]
fn create_symbol(name: String, detail: Option<String>, kind: lsp::SymbolKind, rng: &lsp::Range) -> lsp::DocumentSymbol {
    lsp::DocumentSymbol {
        name,
        detail,
        kind,
        range: *rng,
        selection_range: *rng,
        tags: None,
        children: None,
        deprecated: None
    }
}

impl CheckpointManager {
    pub fn new(doc: Document) -> Self {
        Self { doc, symbols: Arc::new(Symbols::new()) }
    }
    pub fn update_doc(&mut self, doc: Document) {
        self.doc = doc;
    }
    pub fn update_symbols(&mut self, symbols: Symbols) {
        self.symbols = Arc::new(symbols);
    }
    pub fn shared_symbols(&self) -> Arc<Symbols> {
        Arc::clone(&self.symbols)
    }
    pub fn get_doc(&self) -> Document {
        self.doc.clone()
    }
    pub fn get_line(&self, row: usize) -> Option<String> {
        self.doc.text.lines().nth(row).map(|s| s.to_string())
    }

    /// definitions of the symbol under the selection
    pub fn get_defs(&self, sel: &lsp::Location) -> Vec<lsp::Location> {
        match self.symbols.occurrence_at(&sel.uri,&sel.range.start) {
            Some(occ) => match self.symbols.symbol_for(occ) {
                Some(sym) => sym.defs.clone(),
                None => Vec::new()
            },
            None => Vec::new()
        }
    }
    /// references, including the definitions
    pub fn get_refs(&self, sel: &lsp::Location) -> Vec<lsp::Location> {
        match self.symbols.occurrence_at(&sel.uri,&sel.range.start) {
            Some(occ) => match self.symbols.symbol_for(occ) {
                Some(sym) => {
                    let mut ans = sym.defs.clone();
                    ans.extend(sym.refs.iter().cloned());
                    ans
                },
                None => Vec::new()
            },
            None => Vec::new()
        }
    }
    /// every occurrence of the selected name, for rename
    pub fn get_renamables(&self, sel: &lsp::Location) -> Vec<lsp::Location> {
        let occ = match self.symbols.occurrence_at(&sel.uri,&sel.range.start) {
            Some(occ) => occ,
            None => return Vec::new()
        };
        self.symbols.occurrences.iter()
            .filter(|other| other.kind == occ.kind && other.name == occ.name)
            .map(|other| other.location.clone())
            .collect()
    }

    pub fn get_symbols(&self) -> Vec<lsp::DocumentSymbol> {
        let doc_uri = self.doc.uri.to_string();
        let mut ans = Vec::new();
        let mut ords: Vec<&super::Symbol> = self.symbols.ords.values().collect();
        ords.sort_by(|a,b| a.name.cmp(&b.name));
        for sym in ords {
            let def = match sym.defs.iter().find(|d| d.uri.to_string() == doc_uri) {
                Some(def) => def,
                None => continue
            };
            let kind = if sym.flags & symbol_flags::SECT != 0 {
                lsp::SymbolKind::NAMESPACE
            } else if sym.value.is_some() {
                lsp::SymbolKind::CONSTANT
            } else {
                lsp::SymbolKind::FIELD
            };
            let detail = sym.type_letter.map(|t| format!("type {}",t));
            ans.push(create_symbol(sym.name.clone(),detail,kind,&def.range));
        }
        let mut macros: Vec<&super::Symbol> = self.symbols.macros.values().collect();
        macros.sort_by(|a,b| a.name.cmp(&b.name));
        for sym in macros {
            if let Some(def) = sym.defs.iter().find(|d| d.uri.to_string() == doc_uri) {
                ans.push(create_symbol(sym.name.clone(),Some("macro".to_string()),
                    lsp::SymbolKind::MODULE,&def.range));
            }
        }
        let mut vars: Vec<&super::Symbol> = self.symbols.vars.values().collect();
        vars.sort_by(|a,b| a.name.cmp(&b.name));
        for sym in vars {
            if let Some(def) = sym.defs.iter().find(|d| d.uri.to_string() == doc_uri) {
                let detail = sym.type_letter.map(|t| format!("SET{}",t));
                ans.push(create_symbol(format!("&{}",sym.name),detail,
                    lsp::SymbolKind::VARIABLE,&def.range));
            }
        }
        ans
    }

    /// fold macro definitions
    pub fn get_folding_ranges(&self) -> Vec<lsp::FoldingRange> {
        let mut ans = Vec::new();
        let mut start: Option<u32> = None;
        for (row,line) in self.doc.text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let first = fields.next().unwrap_or("");
            let instr = if line.starts_with(first) && !line.starts_with(' ') {
                fields.next().unwrap_or("")
            } else {
                first
            };
            match instr.to_uppercase().as_str() {
                "MACRO" => start = Some(row as u32),
                "MEND" => {
                    if let Some(begin) = start.take() {
                        ans.push(lsp::FoldingRange {
                            start_line: begin,
                            end_line: row as u32,
                            kind: Some(lsp::FoldingRangeKind::Region),
                            ..lsp::FoldingRange::default()
                        });
                    }
                },
                _ => {}
            }
        }
        ans
    }

    /// does the selection sit on any known occurrence
    pub fn has_occurrence(&self, sel: &lsp::Location) -> bool {
        self.symbols.occurrences.iter().any(|occ| {
            occ.location.uri == sel.uri && range_contains_pos(&occ.location.range,&sel.range.start)
        })
    }
}
