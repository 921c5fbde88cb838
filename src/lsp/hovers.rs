//! Hover content.
//!
//! Ordinary symbols show their value, attributes and defining line; variable
//! symbols their SET type; macros their prototype; instructions their
//! handbook entry filtered by the active OPTABLE.

use lsp_types as lsp;
use std::sync::Arc;
use crate::handbook::{Optable,assembler::AssemblerHandbook,machine::MachineHandbook};
use super::{OccurrenceKind,Symbols,symbol_flags};

pub struct HoverProvider {
    symbols: Arc<Symbols>,
    op_book: MachineHandbook,
    asm_book: AssemblerHandbook,
    pub optable: Optable
}

fn markdown_hover(text: String, range: lsp::Range) -> lsp::Hover {
    lsp::Hover {
        contents: lsp::HoverContents::Markup(lsp::MarkupContent {
            kind: lsp::MarkupKind::Markdown,
            value: text
        }),
        range: Some(range)
    }
}

impl HoverProvider {
    pub fn new() -> Self {
        Self {
            symbols: Arc::new(Symbols::new()),
            op_book: MachineHandbook::new(),
            asm_book: AssemblerHandbook::new(),
            optable: Optable::Uni
        }
    }
    pub fn use_shared_symbols(&mut self, symbols: Arc<Symbols>) {
        self.symbols = symbols;
    }

    fn instruction_hover(&self, mnemonic: &str, range: lsp::Range) -> Option<lsp::Hover> {
        if let Some(op) = self.op_book.get(mnemonic,self.optable) {
            let mut text = format!("**{}** — {}\n\nformat {}",op.mnemonic,op.brief,op.format);
            if let Some(base) = &op.alias_of {
                text.push_str(&format!("\n\nextended mnemonic of `{}`",base));
            }
            return Some(markdown_hover(text,range));
        }
        if let Some(op) = self.asm_book.get(mnemonic) {
            let text = format!("**{}** — {}\n\n{}",op.mnemonic,op.brief,op.desc);
            return Some(markdown_hover(text,range));
        }
        None
    }

    /// hover for a position in the analyzed document set
    pub fn get(&self, uri: &lsp::Url, pos: &lsp::Position) -> Option<lsp::Hover> {
        let occ = self.symbols.occurrence_at(uri,pos)?;
        let range = occ.location.range;
        match occ.kind {
            OccurrenceKind::Instr => {
                if let Some(sym) = self.symbols.macros.get(&occ.name) {
                    let mut text = format!("**{}** — macro",sym.name);
                    if let Some(info) = self.symbols.macro_info.get(&occ.name) {
                        if !info.params.is_empty() {
                            text.push_str(&format!("\n\nparameters: `{}`",info.params.join(", ")));
                        }
                    }
                    return Some(markdown_hover(text,range));
                }
                self.instruction_hover(&occ.name,range)
            },
            OccurrenceKind::Ord => {
                let sym = self.symbols.ords.get(&occ.name)?;
                let mut text = format!("**{}**",sym.name);
                if sym.flags & symbol_flags::SECT != 0 {
                    text.push_str(" — section");
                } else if sym.flags & symbol_flags::EXT != 0 {
                    text.push_str(" — external");
                }
                if let Some(v) = sym.value {
                    let bytes = (v as i32).to_be_bytes();
                    text.push_str(&format!("\n\nvalue `{}` (X'{}')",v,hex::encode_upper(bytes)));
                }
                if let Some(t) = sym.type_letter {
                    text.push_str(&format!("\n\ntype `{}`",t));
                }
                if let Some(l) = sym.length {
                    text.push_str(&format!(", length `{}`",l));
                }
                if let Some(code) = &sym.defining_code {
                    text.push_str(&format!("\n```hlasm\n{}\n```",code));
                }
                Some(markdown_hover(text,range))
            },
            OccurrenceKind::Var => {
                let sym = self.symbols.vars.get(&occ.name)?;
                let mut text = format!("**&{}**",sym.name);
                match sym.type_letter {
                    Some(t) => text.push_str(&format!(" — SET{}",t)),
                    None => text.push_str(" — variable symbol")
                }
                if sym.flags & symbol_flags::GBL != 0 {
                    text.push_str(", global");
                }
                Some(markdown_hover(text,range))
            },
            OccurrenceKind::Seq => {
                let sym = self.symbols.seqs.get(&occ.name)?;
                Some(markdown_hover(format!("**.{}** — sequence symbol",sym.name),range))
            },
            OccurrenceKind::CopyOp => {
                Some(markdown_hover(format!("**{}** — copy member",occ.name),range))
            }
        }
    }
}
