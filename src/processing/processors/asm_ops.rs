//! Assembler directives.
//!
//! `EQU`, `DC`/`DS`, sections and location counters, `ORG`, `LTORG`, the
//! USING table, externals, `OPSYN`, `ICTL`, listing directives, `MNOTE`,
//! `COPY` and `END`.

use lsp_types as lsp;
use crate::context::HlasmContext;
use crate::context::ordinary::address::{Alignment,DOUBLEWORD,FULLWORD,NO_ALIGN};
use crate::context::ordinary::section::SectionKind;
use crate::context::ordinary::dependency::{Dependant,ResolveAction};
use crate::context::ordinary::symbol::{AttrKind,SymbolAttributes,SymbolValue};
use crate::context::ordinary::using::UsingEntry;
use crate::diagnostics::{diag,mnote};
use crate::expressions::Value;
use crate::expressions::mach::{MachExpr,expect_abs};
use crate::parsing::{Ictl,LabelField,Statement,split_operands};
use crate::semantics::data_def::{Nominal,parse_data_def};
use super::super::Request;

fn label_symbol(ctx: &mut HlasmContext, stmt: &Statement) -> Option<crate::context::ids::IdIndex> {
    match &stmt.label {
        LabelField::Ordinary(name) => Some(ctx.ids.intern(name)),
        _ => None
    }
}

/// define the label at the current location counter, the common case for
/// instructions and location-taking directives
fn define_location_label(ctx: &mut HlasmContext, stmt: &Statement, attrs: SymbolAttributes,
    placed: crate::context::ordinary::address::Address, diags: &mut Vec<lsp::Diagnostic>)
{
    if let Some(id) = label_symbol(ctx,stmt) {
        let location = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
        ctx.ord.define_symbol(id,SymbolValue::Reloc(placed),attrs,location,diags);
    }
}

fn process_equ(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let id = match label_symbol(ctx,stmt) {
        Some(id) => id,
        None => {
            diags.push(diag(stmt.label_range,"E042","EQU requires an ordinary symbol in the name field"));
            return;
        }
    };
    let ops = split_operands(&stmt.operands);
    if ops.is_empty() || ops[0].text.trim().is_empty() {
        diags.push(diag(stmt.operands_range,"E042","EQU needs a value operand"));
        return;
    }
    let mut exprs: Vec<Option<MachExpr>> = Vec::new();
    for op in ops.iter().take(5) {
        let txt = op.text.trim();
        if txt.is_empty() {
            exprs.push(None);
            continue;
        }
        match MachExpr::parse(txt,&mut ctx.ids) {
            Ok(expr) => exprs.push(Some(expr)),
            Err(e) => {
                diags.push(diag(stmt.operand_range(op.offset,txt.len()),e.code,&e.message));
                exprs.push(None);
            }
        }
    }
    let mut drain = exprs.into_iter();
    let value = match drain.next().flatten() {
        Some(expr) => expr,
        None => return
    };
    let action = ResolveAction::SymbolDef {
        expr: value,
        length: drain.next().flatten(),
        scale: drain.next().flatten(),
        type_attr: drain.next().flatten(),
        prog_attr: drain.next().flatten()
    };
    let unique = ctx.next_unique();
    let eval_ctx = ctx.ord.eval_ctx(ctx.opcode_gen,unique);
    let location = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
    ctx.ord.add_dependency(Dependant::Symbol(id),action,eval_ctx,location,diags);
}

fn natural_boundary(t: char) -> i32 {
    match t {
        'H' | 'Y' | 'S' => 2,
        'F' | 'E' | 'A' | 'V' => 4,
        'D' | 'L' => 8,
        _ => 1
    }
}

fn process_data(ctx: &mut HlasmContext, stmt: &Statement, define_values: bool, diags: &mut Vec<lsp::Diagnostic>) {
    let ops = split_operands(&stmt.operands);
    let mut first = true;
    for op in &ops {
        let txt = op.text.trim();
        if txt.is_empty() {
            diags.push(diag(stmt.operand_range(op.offset,1),"A204","missing data definition operand"));
            continue;
        }
        let range = stmt.operand_range(op.offset,txt.len());
        let dd = match parse_data_def(txt,&mut ctx.ids) {
            Ok(dd) => dd,
            Err(e) => {
                diags.push(diag(range,e.code,&e.message));
                continue;
            }
        };
        let align = dd.alignment();
        let location = lsp::Location::new(stmt.uri().clone(),range);
        let total_expr = dd.total_length_expr();
        let item_expr = dd.item_length_expr();
        let deps = total_expr.dependencies(&ctx.ord);
        let placed = if deps.is_empty() {
            let loctr = ctx.ord.current_address();
            let total = match expect_abs(&total_expr,&ctx.ord,loctr.as_ref()) {
                Ok(v) if v >= 0 => v,
                Ok(_) => {
                    diags.push(diag(range,"A201","negative data definition length"));
                    0
                },
                Err(e) => {
                    diags.push(diag(range,e.code,&e.message));
                    0
                }
            };
            let placed = ctx.ord.reserve(&mut ctx.ids,total,align,location.clone());
            // explicit lengths drop the implied alignment, warn when the
            // operand lands off its natural boundary
            let natural = natural_boundary(dd.type_char);
            if dd.length.is_some() && natural > 1 && placed.spaces.is_empty()
                && placed.offset % natural != 0 {
                diags.push(diag(range,"W011","operand is not aligned on its natural boundary"));
            }
            placed
        } else {
            let (placed,space) = ctx.ord.reserve_unknown(&mut ctx.ids,align,location.clone());
            let unique = ctx.next_unique();
            let eval_ctx = ctx.ord.eval_ctx(ctx.opcode_gen,unique);
            ctx.ord.add_dependency(Dependant::Space(space),
                ResolveAction::SpaceLength { expr: total_expr.clone() },eval_ctx,location.clone(),diags);
            placed
        };
        if first {
            if let Some(id) = label_symbol(ctx,stmt) {
                let item_deps = item_expr.dependencies(&ctx.ord);
                let label_loc = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
                if item_deps.is_empty() {
                    let item_len = expect_abs(&item_expr,&ctx.ord,None).unwrap_or(1).max(1);
                    let attrs = dd.label_attrs(item_len);
                    ctx.ord.define_symbol(id,SymbolValue::Reloc(placed.clone()),attrs,label_loc,diags);
                } else {
                    let attrs = dd.label_attrs(1);
                    ctx.ord.define_symbol(id,SymbolValue::Reloc(placed.clone()),attrs,label_loc.clone(),diags);
                    ctx.ord.mark_attr_pending(id,AttrKind::L);
                    let unique = ctx.next_unique();
                    let eval_ctx = ctx.ord.eval_ctx(ctx.opcode_gen,unique);
                    ctx.ord.add_dependency(Dependant::SymbolAttr(id,AttrKind::L),
                        ResolveAction::SymbolAttrOnly { expr: item_expr.clone() },eval_ctx,label_loc,diags);
                }
            }
            first = false;
        }
        // nominal expressions of address constants are checked for syntax;
        // value evaluation would need object code and is out of scope
        if define_values {
            if let Nominal::Exprs(items) = &dd.nominal {
                for item in items {
                    if item.is_empty() {
                        diags.push(diag(range,"A204","empty nominal expression"));
                        continue;
                    }
                    if let Err(e) = MachExpr::parse(item,&mut ctx.ids) {
                        diags.push(diag(range,e.code,&e.message));
                    }
                }
            }
        }
    }
}

fn process_section(ctx: &mut HlasmContext, stmt: &Statement, kind: SectionKind, diags: &mut Vec<lsp::Diagnostic>) {
    let name = match &stmt.label {
        LabelField::Ordinary(name) => ctx.ids.intern(name),
        LabelField::Empty => ctx.ids.intern(" PRIVATE"),
        _ => {
            diags.push(diag(stmt.label_range,"E042","section name must be an ordinary symbol"));
            return;
        }
    };
    let location = lsp::Location::new(stmt.uri().clone(),stmt.label_range);
    ctx.ord.ensure_section(name,kind,location,diags);
}

fn process_using(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let ops = split_operands(&stmt.operands);
    if ops.len() < 2 {
        diags.push(diag(stmt.operands_range,"M010","USING needs a base and at least one register"));
        return;
    }
    let base_txt = ops[0].text.trim();
    // the (base,end) form is accepted, coverage keeps the 4096 default
    let (base_txt,range_limit) = match base_txt.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => {
            let parts = split_operands(inner);
            (parts[0].text.trim().to_string(),4096)
        },
        None => (base_txt.to_string(),4096)
    };
    let loctr = ctx.ord.current_address();
    let base = match MachExpr::parse(&base_txt,&mut ctx.ids) {
        Ok(expr) => match expr.evaluate(&ctx.ord,loctr.as_ref()) {
            Ok(Value::Reloc(addr)) => addr,
            Ok(Value::Abs(n)) => crate::context::ordinary::address::Address::absolute(n),
            Err(e) => {
                diags.push(diag(stmt.operand_range(ops[0].offset,base_txt.len()),e.code,&e.message));
                return;
            }
        },
        Err(e) => {
            diags.push(diag(stmt.operand_range(ops[0].offset,base_txt.len()),e.code,&e.message));
            return;
        }
    };
    let mut regs = Vec::new();
    for op in ops.iter().skip(1) {
        let txt = op.text.trim();
        match MachExpr::parse(txt,&mut ctx.ids).and_then(|e| expect_abs(&e,&ctx.ord,loctr.as_ref())) {
            Ok(r) if (0..16).contains(&r) => regs.push(r as u8),
            Ok(_) => diags.push(diag(stmt.operand_range(op.offset,txt.len()),"M120","register must be 0 through 15")),
            Err(e) => diags.push(diag(stmt.operand_range(op.offset,txt.len()),e.code,&e.message))
        }
    }
    let label = match &stmt.label {
        LabelField::Ordinary(name) => Some(ctx.ids.intern(name)),
        _ => None
    };
    ctx.ord.usings.add(UsingEntry {
        label,
        base,
        regs,
        range: range_limit,
        location: lsp::Location::new(stmt.uri().clone(),stmt.instr_range)
    });
}

fn process_drop(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let ops = split_operands(&stmt.operands);
    if ops.is_empty() || ops.iter().all(|o| o.text.trim().is_empty()) {
        ctx.ord.usings.drop_all();
        return;
    }
    let loctr = ctx.ord.current_address();
    for op in &ops {
        let txt = op.text.trim();
        if txt.is_empty() {
            continue;
        }
        if let Some(id) = ctx.ids.get(txt) {
            if ctx.ord.usings.drop_label(id) {
                continue;
            }
        }
        let reg = MachExpr::parse(txt,&mut ctx.ids)
            .and_then(|e| expect_abs(&e,&ctx.ord,loctr.as_ref()));
        match reg {
            Ok(r) if (0..16).contains(&r) => {
                if !ctx.ord.usings.drop_reg(r as u8) {
                    diags.push(diag(stmt.operand_range(op.offset,txt.len()),"W010","register covered no USING"));
                }
            },
            Ok(_) => diags.push(diag(stmt.operand_range(op.offset,txt.len()),"M120","register must be 0 through 15")),
            Err(e) => diags.push(diag(stmt.operand_range(op.offset,txt.len()),e.code,&e.message))
        }
    }
}

/// assemble the pending literal pool, used by `LTORG` and the implicit pool at `END`
pub fn flush_literals(ctx: &mut HlasmContext, diags: &mut Vec<lsp::Diagnostic>) {
    let pool = ctx.ord.literals.flush();
    for literal in pool {
        let body = literal.text.trim_start_matches('=');
        match parse_data_def(body,&mut ctx.ids) {
            Ok(dd) => {
                let total_expr = dd.total_length_expr();
                match expect_abs(&total_expr,&ctx.ord,None) {
                    Ok(total) => {
                        ctx.ord.reserve(&mut ctx.ids,total.max(0),dd.alignment(),literal.location.clone());
                    },
                    Err(e) => diags.push(diag(literal.location.range,e.code,&e.message))
                }
            },
            Err(e) => diags.push(diag(literal.location.range,e.code,&e.message))
        }
    }
}

fn process_ltorg(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let placed = ctx.ord.reserve(&mut ctx.ids,0,DOUBLEWORD,
        lsp::Location::new(stmt.uri().clone(),stmt.instr_range));
    define_location_label(ctx,stmt,SymbolAttributes::with_type_length('U',1),placed,diags);
    flush_literals(ctx,diags);
}

fn process_org(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let txt = stmt.operands.trim();
    let location = lsp::Location::new(stmt.uri().clone(),stmt.operands_range);
    if txt.is_empty() {
        ctx.ord.org(None,location,diags);
        return;
    }
    let expr = match MachExpr::parse(txt,&mut ctx.ids) {
        Ok(expr) => expr,
        Err(e) => {
            diags.push(diag(stmt.operands_range,e.code,&e.message));
            return;
        }
    };
    let deps = expr.dependencies(&ctx.ord);
    if deps.is_empty() {
        let loctr = ctx.ord.current_address();
        match expr.evaluate(&ctx.ord,loctr.as_ref()) {
            Ok(Value::Reloc(addr)) => ctx.ord.org(Some(addr),location,diags),
            Ok(Value::Abs(_)) => diags.push(diag(stmt.operands_range,"E032","ORG target must be relocatable")),
            Err(e) => diags.push(diag(stmt.operands_range,e.code,&e.message))
        }
    } else {
        // target depends on forward information, move by an unknown amount
        let (_,space) = ctx.ord.reserve_unknown(&mut ctx.ids,NO_ALIGN,location.clone());
        let unique = ctx.next_unique();
        let eval_ctx = ctx.ord.eval_ctx(ctx.opcode_gen,unique);
        let delta = MachExpr::Sub(Box::new(expr),Box::new(MachExpr::Loctr));
        ctx.ord.add_dependency(Dependant::Space(space),
            ResolveAction::SpaceLength { expr: delta },eval_ctx,location,diags);
    }
}

fn process_externals(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    for op in split_operands(&stmt.operands) {
        let txt = op.text.trim();
        if txt.is_empty() {
            continue;
        }
        if !crate::context::ids::is_ordinary_symbol(txt) {
            diags.push(diag(stmt.operand_range(op.offset,txt.len()),"E042","external symbol expected"));
            continue;
        }
        let id = ctx.ids.intern(txt);
        let location = lsp::Location::new(stmt.uri().clone(),stmt.operand_range(op.offset,txt.len()));
        ctx.ord.add_external(id,location,diags);
    }
}

fn process_ictl(stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    let ops = split_operands(&stmt.operands);
    let mut nums = Vec::new();
    for op in &ops {
        match op.text.trim().parse::<usize>() {
            Ok(v) => nums.push(v),
            Err(_) => {
                diags.push(diag(stmt.operands_range,"A201","ICTL operands must be decimal"));
                return Vec::new();
            }
        }
    }
    let begin = nums.get(0).copied().unwrap_or(1);
    let end = nums.get(1).copied().unwrap_or(71);
    let cont = nums.get(2).copied().unwrap_or(16);
    match Ictl::checked(begin,end,cont) {
        Some(ictl) => vec![Request::SetIctl(ictl)],
        None => {
            diags.push(diag(stmt.operands_range,"A201","invalid ICTL operand values"));
            Vec::new()
        }
    }
}

fn process_mnote(ctx: &mut HlasmContext, stmt: &Statement, diags: &mut Vec<lsp::Diagnostic>) {
    let ops = split_operands(&stmt.operands);
    let (severity,message_idx) = match ops.first().map(|o| o.text.trim()) {
        Some("*") => (0,1),
        Some(txt) if txt.chars().all(|c| c.is_ascii_digit()) && !txt.is_empty() => {
            (txt.parse::<i64>().unwrap_or(0),1)
        },
        _ => (1,0)
    };
    let message = ops.get(message_idx)
        .map(|o| o.text.trim().trim_matches('\'').to_string())
        .unwrap_or_default();
    let substituted = match crate::expressions::ca::CaEvaluator::new(ctx).substitute(&message) {
        Ok(s) => s,
        Err(_) => message
    };
    diags.push(mnote(stmt.operands_range,severity,&substituted));
}

pub fn process(ctx: &mut HlasmContext, stmt: &Statement, mnemonic: &str, diags: &mut Vec<lsp::Diagnostic>) -> Vec<Request> {
    match mnemonic {
        "EQU" => process_equ(ctx,stmt,diags),
        "DC" => process_data(ctx,stmt,true,diags),
        "DS" => process_data(ctx,stmt,false,diags),
        "CSECT" => process_section(ctx,stmt,SectionKind::Executable,diags),
        "START" => {
            process_section(ctx,stmt,SectionKind::Executable,diags);
            let txt = stmt.operands.trim();
            if !txt.is_empty() {
                let location = lsp::Location::new(stmt.uri().clone(),stmt.operands_range);
                let origin = MachExpr::parse(txt,&mut ctx.ids)
                    .and_then(|e| expect_abs(&e,&ctx.ord,None));
                match origin {
                    Ok(v) if v >= 0 => {
                        ctx.ord.reserve(&mut ctx.ids,v,NO_ALIGN,location);
                    },
                    Ok(_) => diags.push(diag(stmt.operands_range,"A201","START value must not be negative")),
                    Err(e) => diags.push(diag(stmt.operands_range,e.code,&e.message))
                }
            }
        },
        "RSECT" => process_section(ctx,stmt,SectionKind::ReadOnly,diags),
        "DSECT" => process_section(ctx,stmt,SectionKind::Dummy,diags),
        "COM" => process_section(ctx,stmt,SectionKind::Common,diags),
        "LOCTR" => {
            match &stmt.label {
                LabelField::Ordinary(name) => {
                    let id = ctx.ids.intern(name);
                    if !ctx.ord.switch_loctr(id) {
                        diags.push(diag(stmt.instr_range,"E031","LOCTR outside of a section"));
                    }
                },
                _ => diags.push(diag(stmt.label_range,"E042","LOCTR requires a name"))
            }
        },
        "ORG" => process_org(ctx,stmt,diags),
        "LTORG" => process_ltorg(ctx,stmt,diags),
        "USING" => process_using(ctx,stmt,diags),
        "DROP" => process_drop(ctx,stmt,diags),
        "PUSH" => {
            if stmt.operands.to_uppercase().contains("USING") {
                ctx.ord.usings.push();
            }
        },
        "POP" => {
            if stmt.operands.to_uppercase().contains("USING") && !ctx.ord.usings.pop() {
                diags.push(diag(stmt.operands_range,"E031","POP USING without a matching PUSH"));
            }
        },
        "EXTRN" | "WXTRN" => process_externals(ctx,stmt,diags),
        "ENTRY" => {
            // occurrence only; linkage checking is out of scope
        },
        "OPSYN" => {
            let alias = match &stmt.label {
                LabelField::Ordinary(name) => name.clone(),
                _ => {
                    diags.push(diag(stmt.label_range,"E042","OPSYN requires a name"));
                    return Vec::new();
                }
            };
            let target = stmt.operands.trim();
            let target = if target.is_empty() { None } else { Some(target) };
            if !ctx.set_opsyn(&alias,target) {
                diags.push(diag(stmt.operands_range,"E057","undefined operation code"));
            }
        },
        "ICTL" => return process_ictl(stmt,diags),
        "ISEQ" | "TITLE" | "EJECT" | "SPACE" | "PRINT" | "PUNCH" | "REPRO" | "AMODE" | "RMODE" => {},
        "MNOTE" => process_mnote(ctx,stmt,diags),
        "CNOP" => {
            let ops = split_operands(&stmt.operands);
            let byte = ops.get(0).and_then(|o| o.text.trim().parse::<u32>().ok()).unwrap_or(0);
            let boundary = ops.get(1).and_then(|o| o.text.trim().parse::<u32>().ok()).unwrap_or(4);
            let location = lsp::Location::new(stmt.uri().clone(),stmt.instr_range);
            let placed = ctx.ord.reserve(&mut ctx.ids,0,Alignment { boundary, byte },location);
            define_location_label(ctx,stmt,SymbolAttributes::with_type_length('I',2),placed,diags);
        },
        "CCW" | "CCW0" | "CCW1" => {
            let location = lsp::Location::new(stmt.uri().clone(),stmt.instr_range);
            let placed = ctx.ord.reserve(&mut ctx.ids,8,DOUBLEWORD,location);
            define_location_label(ctx,stmt,SymbolAttributes::with_type_length('W',8),placed,diags);
        },
        "CXD" => {
            let location = lsp::Location::new(stmt.uri().clone(),stmt.instr_range);
            let placed = ctx.ord.reserve(&mut ctx.ids,4,FULLWORD,location);
            define_location_label(ctx,stmt,SymbolAttributes::with_type_length('A',4),placed,diags);
        },
        "DXD" => process_data(ctx,stmt,false,diags),
        "COPY" => {
            let member = stmt.operands.trim();
            if member.is_empty() || !crate::context::ids::is_ordinary_symbol(member) {
                diags.push(diag(stmt.operands_range,"E042","COPY needs a member name"));
                return Vec::new();
            }
            let id = ctx.ids.intern(member);
            return vec![Request::PushCopy(id,stmt.operands_range)];
        },
        "END" => return vec![Request::End],
        _ => {}
    }
    Vec::new()
}
