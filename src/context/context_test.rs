use lsp_types as lsp;
use super::*;
use super::macros::MacroParam;
use crate::handbook::Optable;

fn ctx() -> HlasmContext {
    HlasmContext::new(Optable::Uni,String::new(),String::new())
}

fn loc() -> lsp::Location {
    lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
}

fn sample_macro(ctx: &mut HlasmContext, name: &str) -> IdIndex {
    let id = ctx.ids.intern(name);
    let p1 = ctx.ids.intern("P1");
    let key = ctx.ids.intern("KEY");
    let def = MacroDefinition {
        name: id,
        name_param: None,
        params: vec![
            MacroParam { name: p1, keyword: false, default: String::new() },
            MacroParam { name: key, keyword: true, default: "DFLT".to_string() }
        ],
        body: Vec::new(),
        seq_symbols: std::collections::HashMap::new(),
        definition_location: loc(),
        defined_gen: 0
    };
    ctx.add_macro(def);
    id
}

#[test]
fn opcode_resolution_order() {
    let mut ctx = ctx();
    assert!(matches!(ctx.resolve_opcode("LR",0),Some(OpCode::Machine(_))));
    assert!(matches!(ctx.resolve_opcode("EQU",0),Some(OpCode::Assembler(_))));
    assert!(matches!(ctx.resolve_opcode("AIF",0),Some(OpCode::CondAsm(_))));
    assert!(ctx.resolve_opcode("NOSUCH",0).is_none());
    // a macro shadows the machine instruction of the same name
    let id = sample_macro(&mut ctx,"LR");
    assert!(matches!(ctx.resolve_opcode("LR",ctx.opcode_gen),Some(OpCode::Macro(found)) if found == id));
}

#[test]
fn opsyn_respects_generations() {
    let mut ctx = ctx();
    let before = ctx.opcode_gen;
    assert!(ctx.set_opsyn("LOAD",Some("LR")));
    let after = ctx.opcode_gen;
    // the binding is invisible to statements captured earlier
    assert!(ctx.resolve_opcode("LOAD",before).is_none());
    assert!(matches!(ctx.resolve_opcode("LOAD",after),Some(OpCode::Machine(m)) if m == "LR"));
    // deletion
    assert!(ctx.set_opsyn("LR",None));
    assert!(ctx.resolve_opcode("LR",ctx.opcode_gen).is_none());
    assert!(matches!(ctx.resolve_opcode("LR",after),Some(OpCode::Machine(_))));
}

#[test]
fn macro_scope_binds_arguments() {
    let mut ctx = ctx();
    let id = sample_macro(&mut ctx,"DOIT");
    let def = ctx.get_macro(id,ctx.opcode_gen).unwrap();
    let mut args = MacroArguments::empty();
    args.name_field = "HERE".to_string();
    args.positional.push("A1".to_string());
    args.keyword.push((ctx.ids.get("KEY").unwrap(),"OVR".to_string()));
    let sysndx = ctx.enter_macro(def.as_ref(),args).unwrap();
    assert_eq!(sysndx,1);
    assert!(ctx.in_macro());
    let p1 = ctx.ids.get("P1").unwrap();
    let key = ctx.ids.get("KEY").unwrap();
    assert_eq!(ctx.param_lookup(p1).map(|s| s.as_str()),Some("A1"));
    assert_eq!(ctx.param_lookup(key).map(|s| s.as_str()),Some("OVR"));
    assert_eq!(ctx.system_variable("SYSLIST",Some(0)).as_deref(),Some("HERE"));
    assert_eq!(ctx.system_variable("SYSLIST",Some(1)).as_deref(),Some("A1"));
    assert_eq!(ctx.system_variable("SYSNDX",None).as_deref(),Some("0001"));
    assert_eq!(ctx.system_variable("SYSNEST",None).as_deref(),Some("1"));
    ctx.leave_macro();
    assert!(!ctx.in_macro());
}

#[test]
fn keyword_default_applies() {
    let mut ctx = ctx();
    let id = sample_macro(&mut ctx,"DOIT");
    let def = ctx.get_macro(id,ctx.opcode_gen).unwrap();
    ctx.enter_macro(def.as_ref(),MacroArguments::empty()).unwrap();
    let key = ctx.ids.get("KEY").unwrap();
    assert_eq!(ctx.param_lookup(key).map(|s| s.as_str()),Some("DFLT"));
}

#[test]
fn sysndx_formatting() {
    assert_eq!(HlasmContext::sysndx_str(1),"0001");
    assert_eq!(HlasmContext::sysndx_str(9999),"9999");
    assert_eq!(HlasmContext::sysndx_str(12000),"12000");
}

#[test]
fn sysndx_ceiling() {
    let mut ctx = ctx();
    let id = sample_macro(&mut ctx,"DOIT");
    let def = ctx.get_macro(id,ctx.opcode_gen).unwrap();
    ctx.sysndx_limit = Some(1);
    assert!(ctx.enter_macro(def.as_ref(),MacroArguments::empty()).is_ok());
    ctx.leave_macro();
    assert!(ctx.enter_macro(def.as_ref(),MacroArguments::empty()).is_err());
}

#[test]
fn globals_link_across_scopes() {
    let mut ctx = ctx();
    let id = ctx.ids.intern("G");
    assert!(ctx.declare_global(id,VarType::A,true,loc()));
    ctx.var_lookup_mut(id).unwrap().set_a(None,7);
    let mac = sample_macro(&mut ctx,"DOIT");
    let def = ctx.get_macro(mac,ctx.opcode_gen).unwrap();
    ctx.enter_macro(def.as_ref(),MacroArguments::empty()).unwrap();
    // invisible until declared in this scope
    assert!(ctx.var_lookup(id).is_none());
    assert!(ctx.declare_global(id,VarType::A,true,loc()));
    assert_eq!(ctx.var_lookup(id).unwrap().get_a(None),Some(7));
    // and the type must agree
    assert!(!ctx.declare_global(id,VarType::C,true,loc()));
    ctx.leave_macro();
}

#[test]
fn local_variables_stay_local() {
    let mut ctx = ctx();
    let id = ctx.ids.intern("LCL");
    assert!(ctx.declare_local(id,VarType::B,true,loc()));
    ctx.var_lookup_mut(id).unwrap().set_b(None,true);
    let mac = sample_macro(&mut ctx,"DOIT");
    let def = ctx.get_macro(mac,ctx.opcode_gen).unwrap();
    ctx.enter_macro(def.as_ref(),MacroArguments::empty()).unwrap();
    assert!(ctx.var_lookup(id).is_none());
    ctx.leave_macro();
    assert_eq!(ctx.var_lookup(id).unwrap().get_b(None),Some(true));
}
