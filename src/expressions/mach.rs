//! Machine expressions.
//!
//! Operands of `EQU`, `ORG`, `USING`, `DC` modifiers and machine instructions
//! are built from self-defining terms, ordinary symbols, the location counter
//! `*`, attribute references and literals, combined with `+ - * /` at HLASM
//! precedence.  Evaluation yields an absolute integer or a relocatable
//! address; relocatable multiplication or division that does not cancel is an
//! `E032` condition for the caller.

use super::{EvalError,Value,parse_self_defining};
use crate::context::ids::{IdIndex,IdStorage,is_ordinary_symbol};
use crate::context::ordinary::address::{Address,SpaceArena};
use crate::context::ordinary::symbol::{AttrKind,SymbolValue};

/// what the evaluator needs to know about the surrounding assembly
pub trait SymbolQuery {
    fn value_of(&self, id: IdIndex) -> Option<SymbolValue>;
    fn attr_of(&self, id: IdIndex, attr: AttrKind) -> Option<i32>;
    fn is_defined(&self, id: IdIndex) -> bool;
    fn arena(&self) -> &SpaceArena;
}

/// a forward reference discovered while collecting dependencies
#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum SymbolRef {
    Value(IdIndex),
    Attr(IdIndex,AttrKind)
}

#[derive(Clone,Debug)]
pub enum MachExpr {
    Num(i32),
    Sym(IdIndex),
    Loctr,
    Attr(AttrKind,IdIndex),
    /// literal operand text including the `=`
    Literal(String),
    Neg(Box<MachExpr>),
    Add(Box<MachExpr>,Box<MachExpr>),
    Sub(Box<MachExpr>,Box<MachExpr>),
    Mul(Box<MachExpr>,Box<MachExpr>),
    Div(Box<MachExpr>,Box<MachExpr>)
}

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    ids: &'a mut IdStorage
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }
    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
    fn symbol_like(&mut self) -> String {
        let mut ans = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || "$#@_".contains(c) {
                ans.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        ans
    }
    /// quoted string with doubled-quote escapes, opening quote already known
    fn quoted(&mut self) -> Result<String,EvalError> {
        let mut ans = String::new();
        self.pos += 1;
        loop {
            match self.bump() {
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        ans.push('\'');
                        self.pos += 1;
                    } else {
                        return Ok(ans);
                    }
                },
                Some(c) => ans.push(c),
                None => return Err(EvalError::new("S0003","unterminated string".to_string()))
            }
        }
    }
    fn literal(&mut self) -> Result<String,EvalError> {
        let mut ans = String::from("=");
        self.pos += 1;
        // duplication and type chars
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                ans.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match self.peek() {
            Some('\'') => {
                let inner = self.quoted()?;
                ans.push('\'');
                ans.push_str(&inner.replace('\'',"''"));
                ans.push('\'');
                Ok(ans)
            },
            Some('(') => {
                let mut depth = 0;
                while let Some(c) = self.bump() {
                    ans.push(c);
                    if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(ans);
                        }
                    }
                }
                Err(EvalError::new("S0003","unbalanced literal".to_string()))
            },
            _ => Err(EvalError::new("S0003","malformed literal".to_string()))
        }
    }

    fn expr(&mut self) -> Result<MachExpr,EvalError> {
        let mut lhs = self.term()?;
        loop {
            if self.eat('+') {
                let rhs = self.term()?;
                lhs = MachExpr::Add(Box::new(lhs),Box::new(rhs));
            } else if self.eat('-') {
                let rhs = self.term()?;
                lhs = MachExpr::Sub(Box::new(lhs),Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }
    fn term(&mut self) -> Result<MachExpr,EvalError> {
        let mut lhs = self.factor()?;
        loop {
            if self.eat('*') {
                let rhs = self.factor()?;
                lhs = MachExpr::Mul(Box::new(lhs),Box::new(rhs));
            } else if self.eat('/') {
                let rhs = self.factor()?;
                lhs = MachExpr::Div(Box::new(lhs),Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }
    fn factor(&mut self) -> Result<MachExpr,EvalError> {
        if self.eat('-') {
            return Ok(MachExpr::Neg(Box::new(self.factor()?)));
        }
        if self.eat('+') {
            return self.factor();
        }
        self.primary()
    }
    fn primary(&mut self) -> Result<MachExpr,EvalError> {
        match self.peek() {
            None => Err(EvalError::new("S0002","expression expected".to_string())),
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(')') {
                    return Err(EvalError::new("S0002","missing right parenthesis".to_string()));
                }
                Ok(inner)
            },
            Some('*') => {
                self.pos += 1;
                Ok(MachExpr::Loctr)
            },
            Some('=') => Ok(MachExpr::Literal(self.literal()?)),
            Some(c) if c.is_ascii_digit() => {
                let digits = self.symbol_like();
                match parse_self_defining(&digits) {
                    Some(v) => Ok(MachExpr::Num(v)),
                    None => Err(EvalError::new("S0002",format!("malformed number {}",digits)))
                }
            },
            Some(c) if c.is_ascii_alphabetic() || "$#@_".contains(c) => {
                // attribute reference or self-defining term or symbol
                if let Some('\'') = self.chars.get(self.pos+1).copied() {
                    let tag = c.to_ascii_uppercase();
                    if "XBC".contains(tag) {
                        self.pos += 1;
                        let inner = self.quoted()?;
                        let text = format!("{}'{}'",tag,inner.replace('\'',"''"));
                        return match parse_self_defining(&text) {
                            Some(v) => Ok(MachExpr::Num(v)),
                            None => Err(EvalError::new("S0002",format!("malformed term {}",text)))
                        };
                    }
                    if let Some(attr) = AttrKind::parse(tag) {
                        self.pos += 2;
                        let name = self.symbol_like();
                        if !is_ordinary_symbol(&name) {
                            return Err(EvalError::new("S0002","symbol expected after attribute".to_string()));
                        }
                        return Ok(MachExpr::Attr(attr,self.ids.intern(&name)));
                    }
                    return Err(EvalError::new("S0002",format!("unknown attribute {}",c)));
                }
                let name = self.symbol_like();
                if is_ordinary_symbol(&name) {
                    Ok(MachExpr::Sym(self.ids.intern(&name)))
                } else {
                    Err(EvalError::new("S0002",format!("malformed symbol {}",name)))
                }
            },
            Some(c) => Err(EvalError::new("S0002",format!("unexpected character {}",c)))
        }
    }
}

impl MachExpr {
    /// Parse a whole operand as an expression.  Trailing text is an error.
    pub fn parse(txt: &str, ids: &mut IdStorage) -> Result<MachExpr,EvalError> {
        let mut scanner = Scanner { chars: txt.trim().chars().collect(), pos: 0, ids };
        let ans = scanner.expr()?;
        if scanner.pos < scanner.chars.len() {
            return Err(EvalError::new("S0002",format!("unexpected text after expression: {}",
                scanner.chars[scanner.pos..].iter().collect::<String>())));
        }
        Ok(ans)
    }
    /// Parse a prefix of the text, returning the expression and the rest offset.
    pub fn parse_prefix(txt: &str, ids: &mut IdStorage) -> Result<(MachExpr,usize),EvalError> {
        let mut scanner = Scanner { chars: txt.chars().collect(), pos: 0, ids };
        let ans = scanner.expr()?;
        let consumed = scanner.pos;
        Ok((ans,consumed))
    }
    /// collect the symbols this expression still waits on
    pub fn dependencies<Q: SymbolQuery>(&self, query: &Q) -> Vec<SymbolRef> {
        let mut ans = Vec::new();
        self.walk_deps(query,&mut ans);
        ans
    }
    fn walk_deps<Q: SymbolQuery>(&self, query: &Q, acc: &mut Vec<SymbolRef>) {
        match self {
            Self::Sym(id) => {
                if !query.is_defined(*id) && !acc.contains(&SymbolRef::Value(*id)) {
                    acc.push(SymbolRef::Value(*id));
                }
            },
            Self::Attr(attr,id) => {
                if query.attr_of(*id,*attr).is_none() {
                    let dep = SymbolRef::Attr(*id,*attr);
                    if !acc.contains(&dep) {
                        acc.push(dep);
                    }
                }
            },
            Self::Neg(inner) => inner.walk_deps(query,acc),
            Self::Add(l,r) | Self::Sub(l,r) | Self::Mul(l,r) | Self::Div(l,r) => {
                l.walk_deps(query,acc);
                r.walk_deps(query,acc);
            },
            _ => {}
        }
    }
    pub fn evaluate<Q: SymbolQuery>(&self, query: &Q, loctr: Option<&Address>) -> Result<Value,EvalError> {
        match self {
            Self::Num(v) => Ok(Value::Abs(*v)),
            Self::Sym(id) => match query.value_of(*id) {
                Some(SymbolValue::Absolute(v)) => Ok(Value::Abs(v)),
                Some(SymbolValue::Reloc(addr)) => Ok(Value::Reloc(addr.normalize(query.arena()))),
                _ => Err(EvalError::new("E010","undefined symbol".to_string()))
            },
            Self::Loctr => match loctr {
                Some(addr) => Ok(Value::Reloc(addr.normalize(query.arena()))),
                None => Err(EvalError::new("E031","location counter not available".to_string()))
            },
            Self::Attr(attr,id) => match query.attr_of(*id,*attr) {
                Some(v) => Ok(Value::Abs(v)),
                None => Err(EvalError::new("E010","attribute of undefined symbol".to_string()))
            },
            Self::Literal(_) => Err(EvalError::new("E032","literal not allowed in this expression".to_string())),
            Self::Neg(inner) => match inner.evaluate(query,loctr)? {
                Value::Abs(v) => Ok(Value::Abs(v.wrapping_neg())),
                Value::Reloc(addr) => Ok(Value::Reloc(Address::absolute(0).minus(&addr)))
            },
            Self::Add(l,r) => {
                let lv = l.evaluate(query,loctr)?;
                let rv = r.evaluate(query,loctr)?;
                Ok(combine(lv,rv,false,query.arena()))
            },
            Self::Sub(l,r) => {
                let lv = l.evaluate(query,loctr)?;
                let rv = r.evaluate(query,loctr)?;
                Ok(combine(lv,rv,true,query.arena()))
            },
            Self::Mul(l,r) => {
                let lv = as_abs(l.evaluate(query,loctr)?,query.arena())?;
                let rv = as_abs(r.evaluate(query,loctr)?,query.arena())?;
                Ok(Value::Abs(lv.wrapping_mul(rv)))
            },
            Self::Div(l,r) => {
                let lv = as_abs(l.evaluate(query,loctr)?,query.arena())?;
                let rv = as_abs(r.evaluate(query,loctr)?,query.arena())?;
                // division by zero yields zero
                Ok(Value::Abs(if rv == 0 { 0 } else { lv.wrapping_div(rv) }))
            }
        }
    }
    /// the leftmost term, which supplies the implicit length attribute of EQU
    pub fn leading_term(&self) -> &MachExpr {
        match self {
            Self::Neg(inner) => inner.leading_term(),
            Self::Add(l,_) | Self::Sub(l,_) | Self::Mul(l,_) | Self::Div(l,_) => l.leading_term(),
            other => other
        }
    }
    /// does the expression reference the location counter
    pub fn uses_loctr(&self) -> bool {
        match self {
            Self::Loctr => true,
            Self::Neg(inner) => inner.uses_loctr(),
            Self::Add(l,r) | Self::Sub(l,r) | Self::Mul(l,r) | Self::Div(l,r) => l.uses_loctr() || r.uses_loctr(),
            _ => false
        }
    }
}

fn combine(lhs: Value, rhs: Value, subtract: bool, arena: &SpaceArena) -> Value {
    let to_addr = |v: Value| match v {
        Value::Abs(n) => Address::absolute(n),
        Value::Reloc(a) => a
    };
    let l = to_addr(lhs);
    let r = to_addr(rhs);
    let sum = if subtract { l.minus(&r) } else { l.plus(&r) };
    let norm = sum.normalize(arena);
    if norm.bases.is_empty() && norm.spaces.is_empty() {
        Value::Abs(norm.offset)
    } else {
        Value::Reloc(norm)
    }
}

fn as_abs(v: Value, arena: &SpaceArena) -> Result<i32,EvalError> {
    match v {
        Value::Abs(n) => Ok(n),
        Value::Reloc(addr) => {
            let norm = addr.normalize(arena);
            if norm.bases.is_empty() && norm.spaces.is_empty() {
                Ok(norm.offset)
            } else {
                Err(EvalError::new("E032","relocatable value in absolute context".to_string()))
            }
        }
    }
}

/// absolute result or the E032 error, used by most directive operands
pub fn expect_abs<Q: SymbolQuery>(expr: &MachExpr, query: &Q, loctr: Option<&Address>) -> Result<i32,EvalError> {
    as_abs(expr.evaluate(query,loctr)?,query.arena())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types as lsp;
    use crate::context::ids::IdStorage;
    use crate::context::ordinary::OrdinaryAssemblyContext;
    use crate::context::ordinary::address::SectionId;
    use crate::context::ordinary::section::SectionKind;
    use crate::context::ordinary::symbol::{SymbolAttributes,SymbolValue};

    fn loc() -> lsp::Location {
        lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
    }

    fn eval_abs(txt: &str, ord: &OrdinaryAssemblyContext, ids: &mut IdStorage) -> i32 {
        let expr = MachExpr::parse(txt,ids).expect(txt);
        expect_abs(&expr,ord,None).expect(txt)
    }

    #[test]
    fn precedence_and_terms() {
        let ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        assert_eq!(eval_abs("2+3*4",&ord,&mut ids),14);
        assert_eq!(eval_abs("(2+3)*4",&ord,&mut ids),20);
        assert_eq!(eval_abs("X'10'+B'1'",&ord,&mut ids),17);
        assert_eq!(eval_abs("C'A'-192",&ord,&mut ids),1);
        assert_eq!(eval_abs("-6/4",&ord,&mut ids),-1);
        assert_eq!(eval_abs("7/0",&ord,&mut ids),0);
    }

    #[test]
    fn round_trip_identity() {
        // e + 0 - 0 * 1 keeps the value of e
        let ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        for e in ["5","2*3+1","X'FF'/3"] {
            let v = eval_abs(e,&ord,&mut ids);
            assert_eq!(eval_abs(&format!("{}+0-0*1",e),&ord,&mut ids),v);
        }
    }

    #[test]
    fn symbols_and_attributes() {
        let mut ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        let id = ids.intern("BUF");
        ord.define_symbol(id,SymbolValue::Absolute(24),
            SymbolAttributes::with_type_length('C',10),loc(),&mut Vec::new());
        assert_eq!(eval_abs("BUF+1",&ord,&mut ids),25);
        assert_eq!(eval_abs("L'BUF*2",&ord,&mut ids),20);
        let expr = MachExpr::parse("MISSING",&mut ids).unwrap();
        assert_eq!(expr.evaluate(&ord,None).unwrap_err().code,"E010");
        assert_eq!(expr.dependencies(&ord),vec![SymbolRef::Value(ids.get("MISSING").unwrap())]);
    }

    #[test]
    fn relocatable_rules() {
        let mut ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        let name = ids.intern("CODE");
        ord.ensure_section(name,SectionKind::Executable,loc(),&mut Vec::new()).unwrap();
        let a = ids.intern("A");
        let b = ids.intern("B");
        ord.define_symbol(a,SymbolValue::Reloc(Address::in_section(SectionId(0),4)),
            SymbolAttributes::equ_default(),loc(),&mut Vec::new());
        ord.define_symbol(b,SymbolValue::Reloc(Address::in_section(SectionId(0),10)),
            SymbolAttributes::equ_default(),loc(),&mut Vec::new());
        // rel - rel in the same section is absolute
        assert_eq!(eval_abs("B-A",&ord,&mut ids),6);
        // rel + abs stays relocatable
        let expr = MachExpr::parse("A+2",&mut ids).unwrap();
        match expr.evaluate(&ord,None).unwrap() {
            Value::Reloc(addr) => assert_eq!(addr.offset,6),
            other => panic!("expected relocatable, got {:?}",other)
        }
        // rel * anything does not cancel
        let expr = MachExpr::parse("A*2",&mut ids).unwrap();
        assert_eq!(expect_abs(&expr,&ord,None).unwrap_err().code,"E032");
    }

    #[test]
    fn loctr_reference() {
        let mut ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        let name = ids.intern("CODE");
        ord.ensure_section(name,SectionKind::Executable,loc(),&mut Vec::new()).unwrap();
        ord.reserve(&mut ids,8,crate::context::ordinary::address::NO_ALIGN,loc());
        let expr = MachExpr::parse("*+2",&mut ids).unwrap();
        let here = ord.current_address();
        match expr.evaluate(&ord,here.as_ref()).unwrap() {
            Value::Reloc(addr) => assert_eq!(addr.offset,10),
            other => panic!("expected relocatable, got {:?}",other)
        }
        assert!(expr.uses_loctr());
    }

    #[test]
    fn literals_parse_but_do_not_evaluate() {
        let ord = OrdinaryAssemblyContext::new();
        let mut ids = IdStorage::new();
        let expr = MachExpr::parse("=F'5'",&mut ids).unwrap();
        assert!(matches!(&expr,MachExpr::Literal(txt) if txt == "=F'5'"));
        assert!(expr.evaluate(&ord,None).is_err());
        let expr = MachExpr::parse("=A(X+2)",&mut ids).unwrap();
        assert!(matches!(&expr,MachExpr::Literal(txt) if txt == "=A(X+2)"));
    }
}
