//! The ordinary processor.
//!
//! Default consumption mode: resolve the instruction field through the opcode
//! tables and dispatch to the conditional-assembly, assembler or machine
//! handlers, or build a macro invocation.

use lsp_types as lsp;
use crate::context::{HlasmContext,OpCode};
use crate::context::macros::MacroArguments;
use crate::diagnostics::diag;
use crate::expressions::ca::CaEvaluator;
use crate::parsing::{InstrField,Statement,split_operands};
use super::super::Request;
use super::{asm_ops,ca_ops,mach_ops};

/// conditional-assembly operations whose operands may need attribute lookahead
fn wants_attr_lookahead(mnemonic: &str) -> bool {
    matches!(mnemonic,"AIF" | "AGO" | "SETA" | "SETB" | "SETC" | "ACTR")
}

fn build_macro_args(ctx: &mut HlasmContext, stmt: &Statement, macro_id: crate::context::ids::IdIndex) -> MacroArguments {
    let def = ctx.get_macro(macro_id,ctx.opcode_gen);
    let mut args = MacroArguments::empty();
    args.name_field = stmt.label.text().to_string();
    if stmt.operands.trim().is_empty() {
        return args;
    }
    for op in split_operands(&stmt.operands) {
        let txt = op.text.trim();
        let keyword = txt.split_once('=').and_then(|(key,value)| {
            if !crate::context::ids::is_ordinary_symbol(key) {
                return None;
            }
            let def = def.as_ref()?;
            let id = ctx.ids.get(key)?;
            def.params.iter()
                .find(|p| p.keyword && p.name == id)
                .map(|p| (p.name,value.to_string()))
        });
        match keyword {
            Some((id,value)) => args.keyword.push((id,value)),
            None => args.positional.push(txt.to_string())
        }
    }
    args
}

pub fn process(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    if stmt.is_comment() {
        return Vec::new();
    }
    let mnemonic = match &stmt.instr {
        InstrField::Empty => {
            if !stmt.label.text().is_empty() {
                diags.push(diag(stmt.label_range,"S0001","statement has a label but no instruction"));
            }
            return Vec::new();
        },
        other => other.text().to_uppercase()
    };
    match ctx.resolve_opcode(&mnemonic,ctx.opcode_gen) {
        Some(OpCode::CondAsm(op)) => {
            if wants_attr_lookahead(&op) {
                let pending = CaEvaluator::new(ctx).pending_attr_lookups(&stmt.operands);
                if let Some(name) = pending.into_iter().next() {
                    let id = ctx.ids.intern(&name);
                    return vec![Request::LookaheadAttr(id)];
                }
            }
            ca_ops::process(ctx,stmt,&op,diags)
        },
        Some(OpCode::Assembler(op)) => asm_ops::process(ctx,stmt,&op,diags),
        Some(OpCode::Machine(op)) => {
            mach_ops::process(ctx,stmt,&op,diags);
            Vec::new()
        },
        Some(OpCode::Macro(id)) => {
            let args = build_macro_args(ctx,stmt,id);
            vec![Request::InvokeMacro(id,args,stmt.instr_range)]
        },
        Some(OpCode::Deleted) | None => {
            // the manager consults the macro library before giving up
            vec![Request::UnknownOpcode(mnemonic,stmt.instr_range)]
        }
    }
}
