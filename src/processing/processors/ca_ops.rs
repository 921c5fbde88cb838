//! Conditional-assembly operations.
//!
//! `SETx`, `GBLx`/`LCLx`, `AIF`/`AGO`/`ANOP`, `ACTR`, `MHELP` and the macro
//! terminators.  A `SETx` materializes its target element before the operand
//! is evaluated, which is observable through `N'` within the same statement.

use lsp_types as lsp;
use crate::context::HlasmContext;
use crate::context::ids::IdIndex;
use crate::context::variables::VarType;
use crate::diagnostics::diag;
use crate::expressions::ca::{CaEvaluator,scan_var_ref};
use crate::parsing::{LabelField,Statement,split_operands};
use super::super::Request;

/// Resolve the SETx target: the variable and an optional subscript.  The
/// variable is implicitly declared before the subscript is evaluated, so
/// `N'` of the target works within its own statement.
fn set_target(ctx: &mut HlasmContext, stmt: &Statement, typ: VarType, diags: &mut Vec<lsp::Diagnostic>)
    -> Option<(IdIndex,Option<usize>)>
{
    let raw = stmt.label.text();
    if !raw.starts_with('&') {
        diags.push(diag(stmt.label_range,"E010","SET requires a variable symbol label"));
        return None;
    }
    let chars: Vec<char> = raw.chars().collect();
    let (name,subscript,_) = match scan_var_ref(&chars,0) {
        Ok(parts) => parts,
        Err(e) => {
            diags.push(diag(stmt.label_range,e.code,&e.message));
            return None;
        }
    };
    // created set symbols carry references inside the name
    let name = if raw.starts_with("&(") {
        match CaEvaluator::new(ctx).substitute(&name) {
            Ok(resolved) => resolved,
            Err(e) => {
                diags.push(diag(stmt.label_range,e.code,&e.message));
                return None;
            }
        }
    } else {
        name
    };
    let id = ctx.ids.intern(&name);
    let location = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
    ctx.declare_implicit(id,typ,location);
    let sub = match subscript {
        Some(txt) => match CaEvaluator::new(ctx).eval_arith(&txt) {
            Ok(v) if v >= 1 => Some(v as usize),
            Ok(_) => {
                diags.push(diag(stmt.label_range,"CE007","subscript must be positive"));
                return None;
            },
            Err(e) => {
                diags.push(diag(stmt.label_range,e.code,&e.message));
                return None;
            }
        },
        None => None
    };
    Some((id,sub))
}

fn process_set(ctx: &mut HlasmContext, stmt: &Statement, typ: VarType, diags: &mut Vec<lsp::Diagnostic>) {
    let (id,sub) = match set_target(ctx,stmt,typ,diags) {
        Some(t) => t,
        None => return
    };
    // the target element exists before the operand is evaluated
    match ctx.var_lookup_mut(id) {
        Some(sym) => sym.reserve(sub),
        None => return
    }
    let operand = stmt.operands.trim().to_string();
    let value = {
        let eval = CaEvaluator::new(ctx);
        match typ {
            VarType::A => eval.eval_arith(&operand).map(SetResult::A),
            VarType::B => eval.eval_bool(&operand).map(SetResult::B),
            VarType::C => eval.eval_string(&operand).map(SetResult::C)
        }
    };
    let ok = match value {
        Ok(SetResult::A(v)) => ctx.var_lookup_mut(id).map(|s| s.set_a(sub,v)).unwrap_or(false),
        Ok(SetResult::B(v)) => ctx.var_lookup_mut(id).map(|s| s.set_b(sub,v)).unwrap_or(false),
        Ok(SetResult::C(v)) => ctx.var_lookup_mut(id).map(|s| s.set_c(sub,v)).unwrap_or(false),
        Err(e) => {
            diags.push(diag(stmt.operands_range,e.code,&e.message));
            return;
        }
    };
    if !ok {
        diags.push(diag(stmt.operands_range,"E013","SET type conflicts with the variable's declaration"));
    }
}

enum SetResult {
    A(i32),
    B(bool),
    C(String)
}

fn process_declare(ctx: &mut HlasmContext, stmt: &Statement, typ: VarType, global: bool, diags: &mut Vec<lsp::Diagnostic>) {
    for op in split_operands(&stmt.operands) {
        let txt = op.text.trim();
        if txt.is_empty() {
            continue;
        }
        let chars: Vec<char> = txt.chars().collect();
        if chars[0] != '&' {
            diags.push(diag(stmt.operand_range(op.offset,txt.len()),"E010","variable symbol expected"));
            continue;
        }
        let (name,dimension,_) = match scan_var_ref(&chars,0) {
            Ok(parts) => parts,
            Err(e) => {
                diags.push(diag(stmt.operand_range(op.offset,txt.len()),e.code,&e.message));
                continue;
            }
        };
        let scalar = dimension.is_none();
        let id = ctx.ids.intern(&name);
        let location = lsp::Location::new(stmt.uri().clone(),stmt.operand_range(op.offset,txt.len()));
        let ok = if global {
            ctx.declare_global(id,typ,scalar,location)
        } else {
            ctx.declare_local(id,typ,scalar,location)
        };
        if !ok {
            diags.push(diag(stmt.operand_range(op.offset,txt.len()),"E025",
                "variable symbol already declared with another type"));
        }
    }
}

/// parse a `.SEQ` target into an interned id
fn seq_target(ctx: &mut HlasmContext, txt: &str) -> Option<IdIndex> {
    let name = txt.trim().strip_prefix('.')?;
    if name.is_empty() {
        return None;
    }
    Some(ctx.ids.intern(name))
}

fn process_aif(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    // one or more (expr).SEQ clauses; the first true one branches
    for op in split_operands(&stmt.operands) {
        let txt = op.text.trim();
        if txt.is_empty() {
            continue;
        }
        if !txt.starts_with('(') {
            diags.push(diag(stmt.operand_range(op.offset,txt.len()),"CE001","AIF operand must be (expression).target"));
            return Vec::new();
        }
        let close = match matching_close(txt) {
            Some(i) => i,
            None => {
                diags.push(diag(stmt.operand_range(op.offset,txt.len()),"CE001","unbalanced AIF condition"));
                return Vec::new();
            }
        };
        let condition = &txt[1..close];
        let target_txt = &txt[close+1..];
        let taken = match CaEvaluator::new(ctx).eval_bool(condition) {
            Ok(v) => v,
            Err(e) => {
                diags.push(diag(stmt.operand_range(op.offset,txt.len()),e.code,&e.message));
                return Vec::new();
            }
        };
        if taken {
            match seq_target(ctx,target_txt) {
                Some(id) => return vec![Request::Branch(id,stmt.operand_range(op.offset,txt.len()))],
                None => {
                    diags.push(diag(stmt.operand_range(op.offset,txt.len()),"E047","sequence symbol expected"));
                    return Vec::new();
                }
            }
        }
    }
    Vec::new()
}

fn process_ago(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    let ops = split_operands(&stmt.operands);
    if ops.is_empty() || ops[0].text.trim().is_empty() {
        diags.push(diag(stmt.operands_range,"CE001","AGO needs a target"));
        return Vec::new();
    }
    let first = ops[0].text.trim().to_string();
    if first.starts_with('(') {
        // computed AGO: (expr).S1,.S2,...
        let close = match matching_close(&first) {
            Some(i) => i,
            None => {
                diags.push(diag(stmt.operands_range,"CE001","unbalanced AGO expression"));
                return Vec::new();
            }
        };
        let k = match CaEvaluator::new(ctx).eval_arith(&first[1..close]) {
            Ok(v) => v,
            Err(e) => {
                diags.push(diag(stmt.operands_range,e.code,&e.message));
                return Vec::new();
            }
        };
        let mut targets: Vec<String> = vec![first[close+1..].to_string()];
        targets.extend(ops.iter().skip(1).map(|o| o.text.trim().to_string()));
        if k >= 1 && (k as usize) <= targets.len() {
            match seq_target(ctx,&targets[k as usize - 1]) {
                Some(id) => return vec![Request::Branch(id,stmt.operands_range)],
                None => {
                    diags.push(diag(stmt.operands_range,"E047","sequence symbol expected"));
                }
            }
        }
        // out of range falls through to the next statement
        return Vec::new();
    }
    match seq_target(ctx,&first) {
        Some(id) => vec![Request::Branch(id,stmt.operands_range)],
        None => {
            diags.push(diag(stmt.operands_range,"E047","sequence symbol expected"));
            Vec::new()
        }
    }
}

fn matching_close(txt: &str) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    for (i,c) in txt.char_indices() {
        if in_string {
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            },
            _ => {}
        }
    }
    None
}

pub fn process(ctx: &mut HlasmContext, stmt: &Statement, mnemonic: &str, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    match mnemonic {
        "SETA" => process_set(ctx,stmt,VarType::A,diags),
        "SETB" => process_set(ctx,stmt,VarType::B,diags),
        "SETC" => process_set(ctx,stmt,VarType::C,diags),
        "GBLA" => process_declare(ctx,stmt,VarType::A,true,diags),
        "GBLB" => process_declare(ctx,stmt,VarType::B,true,diags),
        "GBLC" => process_declare(ctx,stmt,VarType::C,true,diags),
        "LCLA" => process_declare(ctx,stmt,VarType::A,false,diags),
        "LCLB" => process_declare(ctx,stmt,VarType::B,false,diags),
        "LCLC" => process_declare(ctx,stmt,VarType::C,false,diags),
        "AIF" => return process_aif(ctx,stmt,diags),
        "AGO" => return process_ago(ctx,stmt,diags),
        "ANOP" => {},
        "ACTR" => {
            let budget = CaEvaluator::new(ctx).eval_arith(stmt.operands.trim());
            match budget {
                Ok(v) => ctx.scope_mut().actr = v,
                Err(e) => diags.push(diag(stmt.operands_range,e.code,&e.message))
            }
        },
        "MHELP" => {
            let flags = CaEvaluator::new(ctx).eval_arith(stmt.operands.trim());
            match flags {
                Ok(v) => {
                    ctx.mhelp_flags = v as i64;
                    if v >= 256 {
                        ctx.sysndx_limit = Some((v / 256) as usize);
                    }
                },
                Err(e) => diags.push(diag(stmt.operands_range,e.code,&e.message))
            }
        },
        "MEXIT" => {
            if ctx.in_macro() {
                return vec![Request::FinishMacro];
            }
            diags.push(diag(stmt.instr_range,"E054","MEXIT outside of a macro"));
        },
        "MEND" => {
            if ctx.in_macro() {
                return vec![Request::FinishMacro];
            }
            diags.push(diag(stmt.instr_range,"E054","MEND outside of a macro definition"));
        },
        "MACRO" => return vec![Request::StartMacroDef],
        "AREAD" => {
            // no source records in language-server analysis, assign empty
            if let LabelField::Variable(_) = &stmt.label {
                process_set(ctx,&with_empty_operand(stmt),VarType::C,diags);
            }
        },
        _ => {}
    }
    Vec::new()
}

fn with_empty_operand(stmt: &Statement) -> Statement {
    let mut ans = stmt.clone();
    ans.operands = "''".to_string();
    ans
}
