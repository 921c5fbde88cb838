//! Macro-definition capture.
//!
//! Activated by `MACRO`.  The next statement is the prototype; body statements
//! are captured verbatim until the matching `MEND`, with a depth counter for
//! nested definitions.  Capture keeps only the lightweight label/instruction
//! parse; full parsing happens at each invocation after substitution.

use lsp_types as lsp;
use std::collections::HashMap;
use crate::context::HlasmContext;
use crate::context::ids::IdIndex;
use crate::context::macros::{CachedLine,MacroDefinition,MacroParam};
use crate::diagnostics::diag;
use crate::parsing::{LabelField,Statement,split_operands};

pub struct MacroDefProcessor {
    /// nesting depth, the initial MACRO is depth 1
    depth: usize,
    prototype: Option<Prototype>,
    body: Vec<CachedLine>,
    seq_symbols: HashMap<IdIndex,usize>,
    start_range: lsp::Range,
    start_uri: lsp::Url
}

struct Prototype {
    name: IdIndex,
    name_param: Option<IdIndex>,
    params: Vec<MacroParam>,
    location: lsp::Location
}

impl MacroDefProcessor {
    pub fn new(start_uri: lsp::Url, start_range: lsp::Range) -> Self {
        Self {
            depth: 1,
            prototype: None,
            body: Vec::new(),
            seq_symbols: HashMap::new(),
            start_range,
            start_uri
        }
    }

    fn capture_prototype(&mut self, ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
        let name = match &stmt.instr {
            crate::parsing::InstrField::Mnemonic(name) => name.clone(),
            _ => {
                diags.push(diag(stmt.instr_range,"E042","macro prototype expected"));
                "".to_string()
            }
        };
        if name.is_empty() {
            return;
        }
        let name_id = ctx.ids.intern(&name);
        let name_param = match &stmt.label {
            LabelField::Variable(v) => Some(ctx.ids.intern(v.trim_start_matches('&'))),
            LabelField::Empty => None,
            _ => {
                diags.push(diag(stmt.label_range,"E042","macro prototype label must be a variable symbol"));
                None
            }
        };
        let mut params = Vec::new();
        if !stmt.operands.is_empty() {
            for op in split_operands(&stmt.operands) {
                let txt = op.text.trim();
                if txt.is_empty() {
                    continue;
                }
                let (name_txt,keyword,default) = match txt.split_once('=') {
                    Some((n,d)) => (n,true,d.to_string()),
                    None => (txt,false,String::new())
                };
                if let Some(bare) = name_txt.strip_prefix('&') {
                    params.push(MacroParam {
                        name: ctx.ids.intern(bare),
                        keyword,
                        default
                    });
                } else {
                    diags.push(diag(stmt.operand_range(op.offset,txt.len()),"E042",
                        "macro parameter must be a variable symbol"));
                }
            }
        }
        self.prototype = Some(Prototype {
            name: name_id,
            name_param,
            params,
            location: lsp::Location::new(stmt.uri().clone(),stmt.instr_range)
        });
    }

    /// Consume one statement.  Returns `true` when the definition is complete
    /// and has been entered into the context.
    pub fn process(&mut self, ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) -> bool {
        if stmt.is_comment() {
            return false;
        }
        if self.prototype.is_none() {
            self.capture_prototype(ctx,stmt,diags);
            return false;
        }
        let mnemonic = stmt.instr.text().to_uppercase();
        match mnemonic.as_str() {
            "MACRO" => self.depth += 1,
            "MEND" => {
                self.depth -= 1;
                if self.depth == 0 {
                    self.finish(ctx);
                    return true;
                }
            },
            _ => {}
        }
        // sequence symbols at capture depth index the body for AGO/AIF
        if self.depth == 1 {
            if let LabelField::Sequence(name) = &stmt.label {
                let id = ctx.ids.intern(name.trim_start_matches('.'));
                if self.seq_symbols.insert(id,self.body.len()).is_some() {
                    diags.push(diag(stmt.label_range,"E045","sequence symbol already defined"));
                }
            }
        }
        self.body.push(CachedLine {
            text: stmt.line.text.clone(),
            uri: stmt.uri().clone(),
            row: stmt.row(),
            label_hint: match &stmt.label {
                LabelField::Empty => None,
                other => Some(other.text().to_string())
            },
            instr_hint: match stmt.instr.text() {
                "" => None,
                other => Some(other.to_string())
            }
        });
        false
    }

    fn finish(&mut self, ctx: &mut HlasmContext) {
        if let Some(proto) = self.prototype.take() {
            ctx.add_macro(MacroDefinition {
                name: proto.name,
                name_param: proto.name_param,
                params: proto.params,
                body: std::mem::take(&mut self.body),
                seq_symbols: std::mem::take(&mut self.seq_symbols),
                definition_location: proto.location,
                defined_gen: ctx.opcode_gen
            });
        }
    }

    /// `MEND` never arrived; report at the opening `MACRO`
    pub fn unterminated(&self) -> (lsp::Url,lsp::Diagnostic) {
        (self.start_uri.clone(),diag(self.start_range,"E046","macro definition missing MEND"))
    }
}
