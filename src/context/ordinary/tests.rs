use lsp_types as lsp;
use super::*;
use super::dependency::{Dependant,ResolveAction};
use super::section::SectionKind;
use super::symbol::{AttrKind,SymbolAttributes,SymbolValue};
use crate::context::ids::IdStorage;
use crate::expressions::mach::MachExpr;

fn loc() -> lsp::Location {
    lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
}

fn equ(ord: &mut OrdinaryAssemblyContext, ids: &mut IdStorage, name: &str, expr: &str,
    diags: &mut Vec<lsp::Diagnostic>) -> bool
{
    let id = ids.intern(name);
    let expr = MachExpr::parse(expr,ids).expect("expression parses");
    let ctx = ord.eval_ctx(0,0);
    ord.add_dependency(Dependant::Symbol(id),ResolveAction::SymbolDef {
        expr, length: None, scale: None, type_attr: None, prog_attr: None
    },ctx,loc(),diags)
}

fn abs_value(ord: &OrdinaryAssemblyContext, ids: &IdStorage, name: &str) -> Option<i32> {
    let id = ids.get(name)?;
    match ord.symbol(id)?.value {
        SymbolValue::Absolute(v) => Some(v),
        _ => None
    }
}

#[test]
fn forward_reference_resolves() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    equ(&mut ord,&mut ids,"A","B+1",&mut diags);
    assert!(abs_value(&ord,&ids,"A").is_none());
    equ(&mut ord,&mut ids,"B","2",&mut diags);
    assert_eq!(abs_value(&ord,&ids,"A"),Some(3));
    assert_eq!(abs_value(&ord,&ids,"B"),Some(2));
    assert!(diags.is_empty(),"{:?}",diags);
    assert!(ord.deps.is_empty());
}

#[test]
fn chain_resolves_in_order() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    equ(&mut ord,&mut ids,"A","B+B",&mut diags);
    equ(&mut ord,&mut ids,"B","C*2",&mut diags);
    equ(&mut ord,&mut ids,"C","5",&mut diags);
    assert_eq!(abs_value(&ord,&ids,"C"),Some(5));
    assert_eq!(abs_value(&ord,&ids,"B"),Some(10));
    assert_eq!(abs_value(&ord,&ids,"A"),Some(20));
    assert!(diags.is_empty());
}

#[test]
fn cycle_breaks_with_default() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    equ(&mut ord,&mut ids,"A","B",&mut diags);
    let ok = equ(&mut ord,&mut ids,"B","A",&mut diags);
    assert!(!ok);
    assert_eq!(diags.iter().filter(|d| {
        matches!(&d.code,Some(lsp::NumberOrString::String(s)) if s == "E033")
    }).count(),1);
    // both symbols fall back to zero and nothing stays pending
    assert_eq!(abs_value(&ord,&ids,"A"),Some(0));
    assert_eq!(abs_value(&ord,&ids,"B"),Some(0));
    assert!(ord.deps.is_empty());
}

#[test]
fn symbols_assign_once() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let id = ids.intern("A");
    assert!(ord.define_symbol(id,SymbolValue::Absolute(1),SymbolAttributes::equ_default(),loc(),&mut diags));
    assert!(!ord.define_symbol(id,SymbolValue::Absolute(2),SymbolAttributes::equ_default(),loc(),&mut diags));
    assert_eq!(abs_value(&ord,&ids,"A"),Some(1));
    assert_eq!(diags.len(),1);
}

#[test]
fn equ_length_defaults_to_leading_term() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let base = ids.intern("BASE");
    ord.define_symbol(base,SymbolValue::Absolute(16),SymbolAttributes::with_type_length('C',10),loc(),&mut diags);
    equ(&mut ord,&mut ids,"ALIAS","BASE+2",&mut diags);
    let alias = ids.get("ALIAS").unwrap();
    assert_eq!(ord.symbol(alias).unwrap().attrs.l,10);
}

#[test]
fn section_reservation_and_difference() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let name = ids.intern("CODE");
    ord.ensure_section(name,SectionKind::Executable,loc(),&mut diags).unwrap();
    let a = ord.reserve(&mut ids,4,address::FULLWORD,loc());
    let b = ord.reserve(&mut ids,2,address::HALFWORD,loc());
    assert_eq!(a.offset,0);
    assert_eq!(b.offset,4);
    // rel - rel in the same location counter is absolute
    let diff = b.minus(&a);
    assert!(diff.bases.is_empty());
    assert_eq!(diff.offset,4);
    assert!(diags.is_empty());
}

#[test]
fn space_dependency_resolves_section_length() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let name = ids.intern("CODE");
    ord.ensure_section(name,SectionKind::Executable,loc(),&mut diags).unwrap();
    // a reservation of LEN bytes, LEN defined later
    let (placed,space) = ord.reserve_unknown(&mut ids,address::NO_ALIGN,loc());
    assert_eq!(placed.offset,0);
    let expr = MachExpr::parse("LEN",&mut ids).unwrap();
    let ctx = ord.eval_ctx(0,0);
    ord.add_dependency(Dependant::Space(space),ResolveAction::SpaceLength { expr },ctx,loc(),&mut diags);
    let after = ord.current_address().unwrap();
    assert!(!after.spaces.is_empty());
    equ(&mut ord,&mut ids,"LEN","6",&mut diags);
    let resolved = ord.current_address().unwrap();
    assert!(resolved.spaces.is_empty());
    assert_eq!(resolved.offset,6);
    assert!(diags.is_empty());
}

#[test]
fn pending_attribute_resolves() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let id = ids.intern("BUF");
    ord.define_symbol(id,SymbolValue::Absolute(0),SymbolAttributes::with_type_length('C',1),loc(),&mut diags);
    ord.mark_attr_pending(id,AttrKind::L);
    assert!(ord.attr_of(id,AttrKind::L).is_none());
    let expr = MachExpr::parse("LEN*2",&mut ids).unwrap();
    let ctx = ord.eval_ctx(0,0);
    ord.add_dependency(Dependant::SymbolAttr(id,AttrKind::L),
        ResolveAction::SymbolAttrOnly { expr },ctx,loc(),&mut diags);
    equ(&mut ord,&mut ids,"LEN","4",&mut diags);
    assert_eq!(ord.attr_of(id,AttrKind::L),Some(8));
    assert!(diags.is_empty());
}

#[test]
fn collect_postponed_defaults_and_reports() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    equ(&mut ord,&mut ids,"A","NEVER+1",&mut diags);
    ord.collect_postponed(&ids,&mut diags);
    assert_eq!(abs_value(&ord,&ids,"A"),Some(1));
    assert!(diags.iter().any(|d| {
        matches!(&d.code,Some(lsp::NumberOrString::String(s)) if s == "E010")
            && d.message.contains("NEVER")
    }));
    assert!(ord.deps.is_empty());
}

#[test]
fn externals_share_namespace() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let id = ids.intern("XSYM");
    ord.add_external(id,loc(),&mut diags);
    assert!(diags.is_empty());
    assert!(!ord.define_symbol(id,SymbolValue::Absolute(1),SymbolAttributes::equ_default(),loc(),&mut diags));
    ord.add_external(id,loc(),&mut diags);
    assert_eq!(diags.len(),2);
}

#[test]
fn org_moves_within_section() {
    let mut ord = OrdinaryAssemblyContext::new();
    let mut ids = IdStorage::new();
    let mut diags = Vec::new();
    let name = ids.intern("CODE");
    ord.ensure_section(name,SectionKind::Executable,loc(),&mut diags).unwrap();
    let start = ord.reserve(&mut ids,16,address::NO_ALIGN,loc());
    ord.org(Some(start.plus_offset(4)),loc(),&mut diags);
    assert_eq!(ord.current_address().unwrap().offset,4);
    // ORG with no operand returns to the high-water mark
    ord.org(None,loc(),&mut diags);
    assert_eq!(ord.current_address().unwrap().offset,16);
    assert!(diags.is_empty());
}
