//! # Language-client tables
//!
//! A side-channel observer of the processing pipeline collects everything the
//! language server answers from: symbol occurrences, macro information,
//! variable definitions and per-line hit counts.  The tables are plain data,
//! cheap to clone into a checkpoint while the next analysis runs.

use lsp_types as lsp;
use std::collections::HashMap;

pub mod analyzer;
pub mod checkpoint;
pub mod completions;
pub mod hovers;
pub mod semantic_tokens;

#[cfg(test)]
mod tests;

pub mod symbol_flags {
    /// ordinary symbol
    pub const ORD: u64 = 0x01;
    /// variable (SET) symbol
    pub const VAR: u64 = 0x02;
    /// sequence symbol
    pub const SEQ: u64 = 0x04;
    /// macro name
    pub const MAC: u64 = 0x08;
    /// global variable
    pub const GBL: u64 = 0x10;
    /// section name
    pub const SECT: u64 = 0x20;
    /// external symbol
    pub const EXT: u64 = 0x40;
    /// macro parameter
    pub const PARAM: u64 = 0x80;
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum OccurrenceKind {
    Ord,
    Var,
    Seq,
    Instr,
    CopyOp
}

#[derive(Clone)]
pub struct Occurrence {
    pub kind: OccurrenceKind,
    pub name: String,
    pub location: lsp::Location,
    /// instantiated from a model statement, kept apart to avoid over-counting
    pub from_model: bool
}

#[derive(Clone)]
pub struct Symbol {
    pub name: String,
    pub flags: u64,
    pub defs: Vec<lsp::Location>,
    pub refs: Vec<lsp::Location>,
    /// current value when absolute
    pub value: Option<i64>,
    /// one-letter type attribute for ordinary symbols, `A`/`B`/`C` for variables
    pub type_letter: Option<char>,
    pub length: Option<i64>,
    /// line(s) of code defining this symbol
    pub defining_code: Option<String>
}

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flags: 0,
            defs: Vec::new(),
            refs: Vec::new(),
            value: None,
            type_letter: None,
            length: None,
            defining_code: None
        }
    }
}

#[derive(Clone)]
pub struct MacroInfo {
    pub name: String,
    pub header_range: lsp::Range,
    pub header_uri: lsp::Url,
    pub params: Vec<String>,
    /// invocation count over the whole analysis
    pub calls: usize
}

#[derive(Clone,Default)]
pub struct HitEntry {
    pub count: usize,
    pub contains_statement: bool,
    pub macro_definition_line: bool
}

#[derive(Clone,Default)]
pub struct HitCounts {
    map: HashMap<(String,u32),HitEntry>
}

impl HitCounts {
    pub fn mark_statement(&mut self, uri: &lsp::Url, row: u32) {
        self.map.entry((uri.to_string(),row)).or_default().contains_statement = true;
    }
    pub fn mark_macro_line(&mut self, uri: &lsp::Url, row: u32) {
        self.map.entry((uri.to_string(),row)).or_default().macro_definition_line = true;
    }
    pub fn hit(&mut self, uri: &lsp::Url, row: u32) {
        let entry = self.map.entry((uri.to_string(),row)).or_default();
        entry.contains_statement = true;
        entry.count += 1;
    }
    pub fn get(&self, uri: &lsp::Url, row: u32) -> Option<&HitEntry> {
        self.map.get(&(uri.to_string(),row))
    }
    /// statement lines that were never reached, in deterministic order
    pub fn unvisited(&self) -> Vec<(String,u32)> {
        let mut ans: Vec<(String,u32)> = self.map.iter()
            .filter(|(_,e)| e.contains_statement && e.count == 0 && !e.macro_definition_line)
            .map(|((uri,row),_)| (uri.clone(),*row))
            .collect();
        ans.sort();
        ans
    }
}

/// everything collected for one analyzed document and its includes
#[derive(Clone)]
pub struct Symbols {
    pub ords: HashMap<String,Symbol>,
    pub vars: HashMap<String,Symbol>,
    pub seqs: HashMap<String,Symbol>,
    pub macros: HashMap<String,Symbol>,
    pub macro_info: HashMap<String,MacroInfo>,
    pub occurrences: Vec<Occurrence>,
    pub hits: HitCounts,
    /// uri of the document the analysis started from
    pub master_doc_uri: String
}

impl Symbols {
    pub fn new() -> Self {
        Self {
            ords: HashMap::new(),
            vars: HashMap::new(),
            seqs: HashMap::new(),
            macros: HashMap::new(),
            macro_info: HashMap::new(),
            occurrences: Vec::new(),
            hits: HitCounts::default(),
            master_doc_uri: String::new()
        }
    }
    /// the occurrence under a position, if any
    pub fn occurrence_at(&self, uri: &lsp::Url, pos: &lsp::Position) -> Option<&Occurrence> {
        self.occurrences.iter().find(|occ| {
            occ.location.uri == *uri && crate::range_contains_pos(&occ.location.range,pos)
        })
    }
    fn table_for(&self, kind: OccurrenceKind) -> &HashMap<String,Symbol> {
        match kind {
            OccurrenceKind::Ord => &self.ords,
            OccurrenceKind::Var => &self.vars,
            OccurrenceKind::Seq => &self.seqs,
            OccurrenceKind::Instr | OccurrenceKind::CopyOp => &self.macros
        }
    }
    pub fn symbol_for(&self, occ: &Occurrence) -> Option<&Symbol> {
        self.table_for(occ.kind).get(&occ.name)
    }
}
