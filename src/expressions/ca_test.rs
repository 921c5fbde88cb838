use lsp_types as lsp;
use super::ca::{CaEvaluator,CaValue};
use crate::context::HlasmContext;
use crate::context::variables::VarType;
use crate::context::ordinary::symbol::{SymbolAttributes,SymbolValue};
use crate::handbook::Optable;

fn ctx() -> HlasmContext {
    HlasmContext::new(Optable::Uni,"PARMVAL".to_string(),String::new())
}

fn loc() -> lsp::Location {
    lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
}

fn with_var(ctx: &mut HlasmContext, name: &str, val: CaValue) {
    let id = ctx.ids.intern(name);
    match val {
        CaValue::A(v) => {
            ctx.declare_local(id,VarType::A,true,loc());
            ctx.var_lookup_mut(id).unwrap().set_a(None,v);
        },
        CaValue::B(v) => {
            ctx.declare_local(id,VarType::B,true,loc());
            ctx.var_lookup_mut(id).unwrap().set_b(None,v);
        },
        CaValue::C(v) => {
            ctx.declare_local(id,VarType::C,true,loc());
            ctx.var_lookup_mut(id).unwrap().set_c(None,v);
        }
    }
}

#[test]
fn arithmetic_precedence() {
    let ctx = ctx();
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_arith("1+2*3").unwrap(),7);
    assert_eq!(eval.eval_arith("(1+2)*3").unwrap(),9);
    assert_eq!(eval.eval_arith("-2*3").unwrap(),-6);
    assert_eq!(eval.eval_arith("7/2").unwrap(),3);
    assert_eq!(eval.eval_arith("-7/2").unwrap(),-3);
    // division by zero yields zero
    assert_eq!(eval.eval_arith("5/0").unwrap(),0);
}

#[test]
fn two_complement_wrapping() {
    let ctx = ctx();
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_arith("2147483647+1").unwrap(),i32::MIN);
}

#[test]
fn variables_and_coercions() {
    let mut ctx = ctx();
    with_var(&mut ctx,"A",CaValue::A(5));
    with_var(&mut ctx,"B",CaValue::B(true));
    with_var(&mut ctx,"C",CaValue::C("12".to_string()));
    with_var(&mut ctx,"BAD",CaValue::C("XY".to_string()));
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_arith("&A+&B").unwrap(),6);
    assert_eq!(eval.eval_arith("&C*2").unwrap(),24);
    let err = eval.eval_arith("&BAD+1").unwrap_err();
    assert_eq!(err.code,"CE004");
}

#[test]
fn logical_operators() {
    let mut ctx = ctx();
    with_var(&mut ctx,"I",CaValue::A(3));
    let eval = CaEvaluator::new(&ctx);
    assert!(eval.eval_bool("(&I LT 5)").unwrap());
    assert!(!eval.eval_bool("(&I GE 5)").unwrap());
    assert!(eval.eval_bool("(&I EQ 3 AND 1)").unwrap());
    assert!(eval.eval_bool("(&I EQ 4 OR &I EQ 3)").unwrap());
    assert!(eval.eval_bool("(NOT (&I EQ 4))").unwrap());
    // in arithmetic context the same operators are bitwise
    assert_eq!(eval.eval_arith("6 AND 3").unwrap(),2);
    assert_eq!(eval.eval_arith("6 XOR 3").unwrap(),5);
    assert_eq!(eval.eval_arith("4 SLL 2").unwrap(),16);
    assert_eq!(eval.eval_arith("16 SRL 2").unwrap(),4);
}

#[test]
fn string_expressions() {
    let mut ctx = ctx();
    with_var(&mut ctx,"W",CaValue::C("WORLD".to_string()));
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_string("'HI &W'").unwrap(),"HI WORLD");
    assert_eq!(eval.eval_string("'AB'.'CD'").unwrap(),"ABCD");
    assert_eq!(eval.eval_string("'ABCDE'(2,3)").unwrap(),"BCD");
    assert_eq!(eval.eval_string("(3)'AB'").unwrap(),"ABABAB");
    assert_eq!(eval.eval_string("'IT''S'").unwrap(),"IT'S");
    // string comparison uses EBCDIC order, digits sort above letters
    assert!(eval.eval_bool("('1' GT 'A')").unwrap());
}

#[test]
fn builtins() {
    let ctx = ctx();
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_string("(UPPER 'abc')").unwrap(),"ABC");
    assert_eq!(eval.eval_string("(LOWER 'ABC')").unwrap(),"abc");
    assert_eq!(eval.eval_string("(BYTE 193)").unwrap(),"A");
    assert_eq!(eval.eval_string("(DOUBLE 'A''B')").unwrap(),"A''B");
    assert_eq!(eval.eval_arith("(DCLEN 'A''B')").unwrap(),3);
    assert_eq!(eval.eval_string("(DEQUOTE '''AB''')").unwrap(),"AB");
    assert_eq!(eval.eval_arith("(FIND 'ABCDE','DX')").unwrap(),4);
    assert_eq!(eval.eval_arith("(INDEX 'ABCDE','CD')").unwrap(),3);
    assert_eq!(eval.eval_arith("(INDEX 'ABCDE','XY')").unwrap(),0);
    assert!(eval.eval_bool("(ISBIN '0101')").unwrap());
    assert!(!eval.eval_bool("(ISBIN '012')").unwrap());
    assert!(eval.eval_bool("(ISHEX '1AFF')").unwrap());
    assert!(eval.eval_bool("(ISDEC '127')").unwrap());
    assert!(eval.eval_bool("(ISSYM 'GOOD1')").unwrap());
    assert!(!eval.eval_bool("(ISSYM '1BAD')").unwrap());
    assert_eq!(eval.eval_string("(SIGNED 0-5)").unwrap(),"-5");
}

#[test]
fn attribute_references() {
    let mut ctx = ctx();
    let id = ctx.ids.intern("BUF");
    ctx.ord.define_symbol(id,SymbolValue::Absolute(0),
        SymbolAttributes::with_type_length('C',10),loc(),&mut Vec::new());
    with_var(&mut ctx,"V",CaValue::C("BUF".to_string()));
    with_var(&mut ctx,"N",CaValue::C("123".to_string()));
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_arith("L'BUF").unwrap(),10);
    assert_eq!(eval.eval_string("T'BUF").unwrap(),"C");
    assert!(eval.eval_bool("(D'BUF)").unwrap());
    assert!(!eval.eval_bool("(D'NOPE)").unwrap());
    assert_eq!(eval.eval_arith("K'&N").unwrap(),3);
    assert_eq!(eval.eval_string("T'&N").unwrap(),"N");
    assert_eq!(eval.eval_string("T'&V").unwrap(),"U");
    // L' through the value of a variable symbol
    assert_eq!(eval.eval_arith("L'&V").unwrap(),10);
    assert_eq!(eval.eval_string("O'LR").unwrap(),"O");
    assert_eq!(eval.eval_string("O'BNZ").unwrap(),"E");
    assert_eq!(eval.eval_string("O'EQU").unwrap(),"A");
    assert_eq!(eval.eval_string("O'NOSUCH").unwrap(),"U");
}

#[test]
fn self_defining_terms_in_expressions() {
    let ctx = ctx();
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.eval_arith("X'FF'").unwrap(),255);
    assert_eq!(eval.eval_arith("B'101'+1").unwrap(),6);
    assert_eq!(eval.eval_arith("C'A'").unwrap(),193);
}

#[test]
fn substitution_forms() {
    let mut ctx = ctx();
    with_var(&mut ctx,"P",CaValue::C("PFX".to_string()));
    with_var(&mut ctx,"I",CaValue::A(2));
    with_var(&mut ctx,"PFX2",CaValue::C("GOT".to_string()));
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.substitute("&P.X").unwrap(),"PFXX");
    assert_eq!(eval.substitute("A&&B").unwrap(),"A&B");
    assert_eq!(eval.substitute("&P&I").unwrap(),"PFX2");
    // created set symbol: the name itself is assembled from values
    assert_eq!(eval.substitute("&(&P&I)").unwrap(),"GOT");
    assert_eq!(eval.substitute("&SYSPARM").unwrap(),"PARMVAL");
    assert!(eval.substitute("&UNDEF").is_err());
}

#[test]
fn subscripted_substitution() {
    let mut ctx = ctx();
    let id = ctx.ids.intern("ARR");
    ctx.declare_local(id,VarType::A,false,loc());
    ctx.var_lookup_mut(id).unwrap().set_a(Some(2),42);
    with_var(&mut ctx,"I",CaValue::A(2));
    let eval = CaEvaluator::new(&ctx);
    assert_eq!(eval.substitute("&ARR(2)").unwrap(),"42");
    assert_eq!(eval.substitute("&ARR(&I)").unwrap(),"42");
    assert_eq!(eval.eval_arith("&ARR(&I)+1").unwrap(),43);
    assert_eq!(eval.eval_arith("N'&ARR").unwrap(),2);
}
