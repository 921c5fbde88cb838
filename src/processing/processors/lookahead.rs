//! Lookahead processing.
//!
//! A one-shot forward scan started when the ordinary processor needs a
//! sequence symbol or a symbol attribute that is not defined yet.  The scan
//! has no side effects beyond recording sequence-symbol positions and the
//! attributes a definition would produce; afterwards the manager rewinds the
//! provider and ordinary processing resumes.

use crate::context::HlasmContext;
use crate::context::ids::IdIndex;
use crate::context::ordinary::symbol::SymbolAttributes;
use crate::parsing::{LabelField,Statement,split_operands};
use crate::semantics::data_def::parse_data_def;
use super::super::LookaheadTarget;

pub struct LookaheadProcessor {
    pub target: LookaheadTarget,
    /// provider position to rewind to when the scan ends
    pub resume_at: usize,
    /// depth of the provider stack when the scan began
    pub provider_depth: usize,
    pub found: bool
}

impl LookaheadProcessor {
    pub fn new(target: LookaheadTarget, resume_at: usize, provider_depth: usize) -> Self {
        Self { target, resume_at, provider_depth, found: false }
    }

    /// attributes a statement would give its label, without defining anything
    fn statement_attrs(ctx: &mut HlasmContext, stmt: &Statement) -> Option<SymbolAttributes> {
        let mnemonic = stmt.instr.text().to_uppercase();
        match mnemonic.as_str() {
            "DC" | "DS" => {
                let first = split_operands(&stmt.operands).into_iter().next()?;
                let dd = parse_data_def(&first.text,&mut ctx.ids).ok()?;
                let item_len = match crate::expressions::mach::expect_abs(&dd.item_length_expr(),&ctx.ord,None) {
                    Ok(v) => v,
                    Err(_) => 1
                };
                Some(dd.label_attrs(item_len))
            },
            "EQU" => {
                // the value cannot be known mid-scan, only the shape
                Some(SymbolAttributes::equ_default())
            },
            "CSECT" | "RSECT" | "DSECT" | "COM" | "START" => {
                Some(SymbolAttributes::with_type_length('J',1))
            },
            _ if ctx.machine_book.get(&mnemonic,ctx.optable).is_some() => {
                Some(SymbolAttributes::with_type_length('I',2))
            },
            _ => None
        }
    }

    /// Consume one lookahead-parsed statement; `true` ends the scan.
    pub fn process(&mut self, ctx: &mut HlasmContext, stmt: &Statement, position: usize,
        kind: crate::processing::ProviderKind) -> bool
    {
        match self.target {
            LookaheadTarget::SeqSymbol(wanted) => {
                // open-code sequence symbols index the open-code provider only
                if kind != crate::processing::ProviderKind::OpenCode {
                    return false;
                }
                if let LabelField::Sequence(name) = &stmt.label {
                    let id = ctx.ids.intern(name.trim_start_matches('.'));
                    ctx.scope_mut().seq_symbols.entry(id).or_insert(position);
                    if id == wanted {
                        self.found = true;
                        return true;
                    }
                }
            },
            LookaheadTarget::SymbolAttrs(wanted) => {
                if let LabelField::Ordinary(name) = &stmt.label {
                    let id = ctx.ids.intern(name);
                    if id == wanted {
                        if let Some(attrs) = Self::statement_attrs(ctx,stmt) {
                            ctx.lookahead_attrs.insert(id,attrs);
                            self.found = true;
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// the scan exhausted the scope; record the miss so it is not retried
    pub fn exhausted(&self, ctx: &mut HlasmContext) {
        if let LookaheadTarget::SymbolAttrs(wanted) = self.target {
            ctx.lookahead_attrs.insert(wanted,SymbolAttributes::undefined());
        }
    }
}

impl LookaheadTarget {
    pub fn symbol(&self) -> IdIndex {
        match self {
            Self::SeqSymbol(id) | Self::SymbolAttrs(id) => *id
        }
    }
}
