//! Machine instructions.
//!
//! No object code is produced, so processing means: operand count checking
//! against the handbook, literal registration, label definition and advancing
//! the location counter by the instruction length.

use lsp_types as lsp;
use crate::context::HlasmContext;
use crate::context::ordinary::address::HALFWORD;
use crate::context::ordinary::symbol::{SymbolAttributes,SymbolValue};
use crate::diagnostics::diag;
use crate::parsing::{LabelField,Statement,split_operands};

/// instruction length in bytes by format
pub fn format_length(format: &str) -> i32 {
    match format {
        "RR" | "I" => 2,
        "SS" | "SSE" | "RIL" | "RIE" | "RSY" | "RXY" | "SIY" | "SIL" | "VRX" | "VRR" | "RXE" => 6,
        _ => 4
    }
}

pub fn process(ctx: &mut HlasmContext, stmt: &Statement, mnemonic: &str, diags: &mut Vec<lsp::Diagnostic>) {
    let op = match ctx.machine_book.get(mnemonic,ctx.optable) {
        Some(op) => op.clone(),
        None => return
    };
    let ops = split_operands(&stmt.operands);
    let count = if stmt.operands.trim().is_empty() { 0 } else { ops.len() };
    if count < op.min_ops || count > op.max_ops {
        diags.push(diag(stmt.operands_range,"M010",
            &format!("{} expects {} to {} operands, found {}",op.mnemonic,op.min_ops,op.max_ops,count)));
    }
    // literals go to the pending pool
    for operand in &ops {
        let txt = operand.text.trim();
        if txt.starts_with('=') {
            let location = lsp::Location::new(stmt.uri().clone(),
                stmt.operand_range(operand.offset,txt.len()));
            ctx.ord.literals.register(txt,location);
        }
    }
    let length = format_length(&op.format);
    let location = lsp::Location::new(stmt.uri().clone(),stmt.instr_range);
    let placed = ctx.ord.reserve(&mut ctx.ids,length,HALFWORD,location);
    if let LabelField::Ordinary(name) = &stmt.label {
        let id = ctx.ids.intern(name);
        let label_loc = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
        let attrs = SymbolAttributes::with_type_length('I',length);
        ctx.ord.define_symbol(id,SymbolValue::Reloc(placed),attrs,label_loc,diags);
    }
}
