//! The statement observer.
//!
//! Attached by the processing manager; sees every statement with its provider
//! and processing kind and fills the `Symbols` tables.  Model-statement
//! instantiations are tagged so the raw model form is not over-counted.

use lsp_types as lsp;
use crate::context::HlasmContext;
use crate::context::ordinary::symbol::SymbolValue;
use crate::parsing::{LabelField,Statement,split_operands};
use crate::processing::{ProcessingKind,ProviderKind};
use super::{Occurrence,OccurrenceKind,Symbol,Symbols,symbol_flags};

pub struct LspAnalyzer {
    pub symbols: Symbols
}

/// symbol-shaped tokens in an operand field, with their offsets
fn operand_tokens(txt: &str) -> Vec<(String,usize)> {
    let mut ans = Vec::new();
    let chars: Vec<char> = txt.chars().collect();
    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '\'' {
            in_string = true;
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || "$#@_&.".contains(c) {
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || "$#@_".contains(chars[j])) {
                j += 1;
            }
            ans.push((chars[start..j].iter().collect(),start));
            i = j;
        } else {
            i += 1;
        }
    }
    ans
}

impl LspAnalyzer {
    pub fn new() -> Self {
        Self { symbols: Symbols::new() }
    }

    /// mark every statement line of the source before processing starts, so
    /// unvisited lines can fade afterwards
    pub fn preindex(&mut self, lines: &[crate::parsing::SourceLine]) {
        for line in lines {
            let code = line.text.trim();
            if code.is_empty() || code.starts_with('*') || code.starts_with(".*") {
                continue;
            }
            self.symbols.hits.mark_statement(&line.uri,line.row);
        }
    }

    fn ord_entry(&mut self, name: &str) -> &mut Symbol {
        self.symbols.ords.entry(name.to_string())
            .or_insert_with(|| {
                let mut s = Symbol::new(name);
                s.flags |= symbol_flags::ORD;
                s
            })
    }
    fn var_entry(&mut self, name: &str) -> &mut Symbol {
        self.symbols.vars.entry(name.to_string())
            .or_insert_with(|| {
                let mut s = Symbol::new(name);
                s.flags |= symbol_flags::VAR;
                s
            })
    }
    fn seq_entry(&mut self, name: &str) -> &mut Symbol {
        self.symbols.seqs.entry(name.to_string())
            .or_insert_with(|| {
                let mut s = Symbol::new(name);
                s.flags |= symbol_flags::SEQ;
                s
            })
    }

    fn record(&mut self, kind: OccurrenceKind, name: &str, location: lsp::Location, from_model: bool) {
        self.symbols.occurrences.push(Occurrence {
            kind,
            name: name.to_string(),
            location,
            from_model
        });
    }

    /// observe one statement as it is consumed
    pub fn analyze(&mut self, ctx: &HlasmContext, stmt: &Statement,
        _prov: ProviderKind, proc: ProcessingKind)
    {
        if proc == ProcessingKind::Lookahead || stmt.is_comment() {
            return;
        }
        // every physical row of the logical line counts as reached
        for seg in &stmt.line.segments {
            self.symbols.hits.hit(stmt.uri(),seg.row);
        }
        if proc == ProcessingKind::MacroDef {
            for seg in &stmt.line.segments {
                self.symbols.hits.mark_macro_line(stmt.uri(),seg.row);
            }
            return;
        }
        let uri = stmt.uri().clone();
        let from_model = stmt.from_model;
        // label field
        match &stmt.label {
            LabelField::Ordinary(name) => {
                let loc = lsp::Location::new(uri.clone(),stmt.label_range);
                let upper = name.to_uppercase();
                self.ord_entry(&upper).defs.push(loc.clone());
                let entry = self.ord_entry(&upper);
                entry.defining_code = Some(stmt.line.text.trim_end().to_string());
                self.record(OccurrenceKind::Ord,&upper,loc,from_model);
            },
            LabelField::Sequence(name) => {
                let upper = name.trim_start_matches('.').to_uppercase();
                let loc = lsp::Location::new(uri.clone(),stmt.label_range);
                self.seq_entry(&upper).defs.push(loc.clone());
                self.record(OccurrenceKind::Seq,&upper,loc,from_model);
            },
            LabelField::Variable(name) => {
                let upper = name.trim_start_matches('&').to_uppercase();
                let loc = lsp::Location::new(uri.clone(),stmt.label_range);
                let entry = self.var_entry(&upper);
                entry.defs.push(loc.clone());
                let mnemonic = stmt.instr.text().to_uppercase();
                if let Some(t) = mnemonic.strip_prefix("SET").and_then(|t| t.chars().next()) {
                    entry.type_letter = Some(t);
                }
                if mnemonic.starts_with("GBL") {
                    entry.flags |= symbol_flags::GBL;
                }
                self.record(OccurrenceKind::Var,&upper,loc,from_model);
            },
            _ => {}
        }
        // instruction field
        let mnemonic = stmt.instr.text().to_uppercase();
        if !mnemonic.is_empty() {
            let loc = lsp::Location::new(uri.clone(),stmt.instr_range);
            self.record(OccurrenceKind::Instr,&mnemonic,loc.clone(),from_model);
            if let Some(entry) = self.symbols.macros.get_mut(&mnemonic) {
                entry.refs.push(loc);
                if let Some(info) = self.symbols.macro_info.get_mut(&mnemonic) {
                    info.calls += 1;
                }
            }
        }
        // operand field
        if mnemonic == "COPY" {
            let member = stmt.operands.trim().to_uppercase();
            if !member.is_empty() {
                let loc = lsp::Location::new(uri.clone(),stmt.operands_range);
                self.record(OccurrenceKind::CopyOp,&member,loc,from_model);
            }
        } else if !stmt.operands.is_empty() {
            for (token,offset) in operand_tokens(&stmt.operands) {
                let loc = lsp::Location::new(uri.clone(),
                    stmt.operand_range(offset,token.chars().count()));
                if let Some(var) = token.strip_prefix('&') {
                    if var.is_empty() {
                        continue;
                    }
                    let upper = var.to_uppercase();
                    self.var_entry(&upper).refs.push(loc.clone());
                    self.record(OccurrenceKind::Var,&upper,loc,from_model);
                } else if let Some(seq) = token.strip_prefix('.') {
                    if seq.is_empty() || !matches!(mnemonic.as_str(),"AIF"|"AGO") {
                        continue;
                    }
                    let upper = seq.to_uppercase();
                    self.seq_entry(&upper).refs.push(loc.clone());
                    self.record(OccurrenceKind::Seq,&upper,loc,from_model);
                } else if crate::context::ids::is_ordinary_symbol(&token) {
                    let upper = token.to_uppercase();
                    // only names the assembly knows or will know are interesting
                    let known = ctx.ids.get(&upper).is_some();
                    if known {
                        self.ord_entry(&upper).refs.push(loc.clone());
                        self.record(OccurrenceKind::Ord,&upper,loc,from_model);
                    }
                }
            }
        }
    }

    /// a macro definition finished capture
    pub fn collect_macro(&mut self, ctx: &HlasmContext, name: crate::context::ids::IdIndex) {
        if let Some(def) = ctx.get_macro(name,usize::MAX) {
            let name_txt = ctx.ids.resolve(name).to_string();
            let mut sym = Symbol::new(&name_txt);
            sym.flags |= symbol_flags::MAC;
            sym.defs.push(def.definition_location.clone());
            self.symbols.macros.insert(name_txt.clone(),sym);
            self.symbols.macro_info.insert(name_txt.clone(),super::MacroInfo {
                name: name_txt,
                header_range: def.definition_location.range,
                header_uri: def.definition_location.uri.clone(),
                params: def.params.iter().map(|p| {
                    let mut s = format!("&{}",ctx.ids.resolve(p.name));
                    if p.keyword {
                        s.push('=');
                        s.push_str(&p.default);
                    }
                    s
                }).collect(),
                calls: 0
            });
        }
    }

    /// fold assembly results into the tables at the end of the analysis
    pub fn finalize(&mut self, ctx: &HlasmContext) {
        for sym in ctx.ord.symbols_in_order() {
            let name = ctx.ids.resolve(sym.id).to_string();
            let entry = self.ord_entry(&name);
            entry.type_letter = Some(sym.attrs.t);
            entry.length = Some(sym.attrs.l as i64);
            if let SymbolValue::Absolute(v) = sym.value {
                entry.value = Some(v as i64);
            }
            if sym.attrs.t == 'J' {
                entry.flags |= symbol_flags::SECT;
            }
        }
        for (id,_) in ctx.ord.externals.iter() {
            let name = ctx.ids.resolve(*id).to_string();
            self.ord_entry(&name).flags |= symbol_flags::EXT;
        }
    }

    /// fade hints for statement lines conditional assembly never reached
    pub fn fade_messages(&self) -> Vec<(String,lsp::Diagnostic)> {
        self.symbols.hits.unvisited().into_iter().map(|(uri,row)| {
            let range = crate::lsp_range(row,0,80);
            (uri,crate::diagnostics::fade(range))
        }).collect()
    }
}
