//! Conditional-assembly expressions.
//!
//! Values come in the three primitive types `A`, `B` and `C` with the HLASM
//! coercions: numbers and bits interchange freely, strings convert to numbers
//! only when they are self-defining terms (`CE004`/`CE017` otherwise).  The
//! evaluator also performs variable substitution in model statements, since
//! subscripts and created set symbols need expression evaluation themselves.

use super::{EvalError,ebcdic_val,parse_self_defining};
use crate::context::HlasmContext;
use crate::context::ordinary::symbol::AttrKind;
use crate::expressions::mach::SymbolQuery;

#[derive(Clone,PartialEq,Debug)]
pub enum CaValue {
    A(i32),
    B(bool),
    C(String)
}

impl CaValue {
    pub fn to_a(&self) -> Result<i32,EvalError> {
        match self {
            Self::A(v) => Ok(*v),
            Self::B(b) => Ok(*b as i32),
            Self::C(s) => match parse_self_defining(s) {
                Some(v) => Ok(v),
                None => Err(EvalError::new("CE004",format!("expected an arithmetic value, got '{}'",s)))
            }
        }
    }
    pub fn to_b(&self) -> Result<bool,EvalError> {
        match self {
            Self::A(v) => Ok(*v != 0),
            Self::B(b) => Ok(*b),
            Self::C(s) => match s.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                _ => Err(EvalError::new("CE017",format!("expected a binary value, got '{}'",s)))
            }
        }
    }
    pub fn to_c(&self) -> String {
        match self {
            Self::A(v) => v.abs().to_string(),
            Self::B(b) => if *b {"1".to_string()} else {"0".to_string()},
            Self::C(s) => s.clone()
        }
    }
}

/// reverse of the EBCDIC weights used by the BYTE built-in
fn byte_char(v: i32) -> char {
    let target = (v & 0xFF) as u8;
    for c in 0u8..=126 {
        if ebcdic_val(c as char) == target {
            return c as char;
        }
    }
    '.'
}

fn string_ord(s: &str) -> Vec<u8> {
    s.chars().map(ebcdic_val).collect()
}

const BUILTINS: [&str;16] = ["UPPER","LOWER","BYTE","DOUBLE","DCLEN","DCVAL","DEQUOTE","FIND","INDEX",
    "ISBIN","ISDEC","ISHEX","ISSYM","SIGNED","SYSATTRA","SYSATTRP"];

#[derive(Clone,PartialEq,Debug)]
enum Tok {
    Num(i32),
    Str(String),
    Var(String,Option<String>),
    AttrVar(char,String,Option<String>),
    AttrSym(char,String),
    Word(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash
}

pub struct CaEvaluator<'a> {
    pub ctx: &'a HlasmContext
}

impl<'a> CaEvaluator<'a> {
    pub fn new(ctx: &'a HlasmContext) -> Self {
        Self { ctx }
    }

    /// the value of a variable reference as a typed CA value
    fn var_value(&self, name: &str, subscript: Option<&str>) -> Result<CaValue,EvalError> {
        let sub = match subscript {
            Some(txt) => Some(self.eval_arith(txt)?.max(0) as usize),
            None => None
        };
        if let Some(v) = self.ctx.system_variable(name,sub) {
            return Ok(CaValue::C(v));
        }
        if let Some(id) = self.ctx.ids.get(name) {
            if let Some(param) = self.ctx.param_lookup(id) {
                return Ok(CaValue::C(param.clone()));
            }
            if let Some(sym) = self.ctx.var_lookup(id) {
                if let Some(v) = sym.get_a(sub) {
                    return Ok(CaValue::A(v));
                }
                if let Some(v) = sym.get_b(sub) {
                    return Ok(CaValue::B(v));
                }
                if let Some(v) = sym.get_c(sub) {
                    return Ok(CaValue::C(v));
                }
                // declared but never assigned reads as the type's default
                return Ok(match sym.var_type() {
                    crate::context::variables::VarType::A => CaValue::A(0),
                    crate::context::variables::VarType::B => CaValue::B(false),
                    crate::context::variables::VarType::C => CaValue::C(String::new())
                });
            }
        }
        Err(EvalError::new("E010",format!("undefined variable symbol &{}",name)))
    }

    /// substitute the value of a variable reference as text
    fn var_text(&self, name: &str, subscript: Option<&str>) -> Result<String,EvalError> {
        Ok(self.var_value(name,subscript)?.to_c())
    }

    /// Substitute variable references in model-statement text.  `&&` stands
    /// for one ampersand; `&(...)` builds a created set symbol name; a period
    /// after a reference is the concatenation dot and is consumed.
    pub fn substitute(&self, text: &str) -> Result<String,EvalError> {
        let chars: Vec<char> = text.chars().collect();
        let mut ans = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '&' {
                ans.push(chars[i]);
                i += 1;
                continue;
            }
            if chars.get(i+1) == Some(&'&') {
                ans.push('&');
                i += 2;
                continue;
            }
            let (name,after_name) = if chars.get(i+1) == Some(&'(') {
                // created set symbol: resolve the inner concatenation first
                let close = matching_paren(&chars,i+1)
                    .ok_or_else(|| EvalError::new("S0002","unbalanced created set symbol".to_string()))?;
                let inner: String = chars[i+2..close].iter().collect();
                (self.substitute(&inner)?,close+1)
            } else {
                let mut j = i+1;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || "$#@_".contains(chars[j])) {
                    j += 1;
                }
                (chars[i+1..j].iter().collect(),j)
            };
            if name.is_empty() {
                ans.push('&');
                i += 1;
                continue;
            }
            let (subscript,mut after) = if chars.get(after_name) == Some(&'(') {
                match matching_paren(&chars,after_name) {
                    Some(close) => (Some(chars[after_name+1..close].iter().collect::<String>()),close+1),
                    None => return Err(EvalError::new("S0002","unbalanced subscript".to_string()))
                }
            } else {
                (None,after_name)
            };
            let sub_sub = match &subscript {
                Some(txt) => Some(self.substitute(txt)?),
                None => None
            };
            ans.push_str(&self.var_text(&name,sub_sub.as_deref())?);
            // the concatenation dot after a reference is consumed
            if chars.get(after) == Some(&'.') {
                after += 1;
            }
            i = after;
        }
        Ok(ans)
    }

    pub fn eval_expr(&self, txt: &str, bool_ctx: bool) -> Result<CaValue,EvalError> {
        let toks = self.tokenize(txt)?;
        let mut parser = ExprParser { eval: self, toks, pos: 0, bool_ctx };
        let ans = parser.or_level()?;
        if parser.pos < parser.toks.len() {
            return Err(EvalError::new("CE001","unexpected text after expression".to_string()));
        }
        Ok(ans)
    }
    pub fn eval_arith(&self, txt: &str) -> Result<i32,EvalError> {
        self.eval_expr(txt,false)?.to_a()
    }
    pub fn eval_bool(&self, txt: &str) -> Result<bool,EvalError> {
        self.eval_expr(txt,true)?.to_b()
    }
    pub fn eval_string(&self, txt: &str) -> Result<String,EvalError> {
        Ok(self.eval_expr(txt,false)?.to_c())
    }

    /// Ordinary symbols whose attributes the expression needs but which are
    /// not defined yet and have no lookahead result.  Non-empty means the
    /// statement should trigger an attribute lookahead before evaluation.
    pub fn pending_attr_lookups(&self, txt: &str) -> Vec<String> {
        let toks = match self.tokenize(txt) {
            Ok(t) => t,
            Err(_) => return Vec::new()
        };
        let mut ans: Vec<String> = Vec::new();
        for t in toks {
            if let Tok::AttrSym(attr,name) = t {
                if !"LTSI".contains(attr) || !crate::context::ids::is_ordinary_symbol(&name) {
                    continue;
                }
                let known = match self.ctx.ids.get(&name) {
                    Some(id) => self.ctx.ord.is_defined(id) || self.ctx.lookahead_attrs.contains_key(&id),
                    None => false
                };
                if !known && !ans.contains(&name) {
                    ans.push(name);
                }
            }
        }
        ans
    }

    fn tokenize(&self, txt: &str) -> Result<Vec<Tok>,EvalError> {
        let chars: Vec<char> = txt.chars().collect();
        let mut toks = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' => { i += 1; },
                '(' => { toks.push(Tok::LParen); i += 1; },
                ')' => { toks.push(Tok::RParen); i += 1; },
                ',' => { toks.push(Tok::Comma); i += 1; },
                '.' => { toks.push(Tok::Dot); i += 1; },
                '+' => { toks.push(Tok::Plus); i += 1; },
                '-' => { toks.push(Tok::Minus); i += 1; },
                '*' => { toks.push(Tok::Star); i += 1; },
                '/' => { toks.push(Tok::Slash); i += 1; },
                '\'' => {
                    let (s,next) = self.string_literal(&chars,i)?;
                    toks.push(Tok::Str(s));
                    i = next;
                },
                '&' => {
                    let (name,subscript,next) = scan_var_ref(&chars,i)?;
                    toks.push(Tok::Var(name,subscript));
                    i = next;
                },
                _ if c.is_ascii_digit() => {
                    let mut j = i;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    let digits: String = chars[i..j].iter().collect();
                    match digits.parse::<i64>() {
                        Ok(v) if v <= u32::MAX as i64 => toks.push(Tok::Num(v as i32)),
                        _ => return Err(EvalError::new("CE007",format!("number out of range: {}",digits)))
                    }
                    i = j;
                },
                _ if c.is_ascii_alphabetic() || "$#@_".contains(c) => {
                    // self-defining term?
                    if chars.get(i+1) == Some(&'\'') && "XBCxbc".contains(c) {
                        let mut j = i+2;
                        let mut inner = String::new();
                        loop {
                            match chars.get(j) {
                                Some('\'') if chars.get(j+1) == Some(&'\'') => {
                                    inner.push('\'');
                                    j += 2;
                                },
                                Some('\'') => {
                                    j += 1;
                                    break;
                                },
                                Some(ch) => {
                                    inner.push(*ch);
                                    j += 1;
                                },
                                None => return Err(EvalError::new("S0003","unterminated term".to_string()))
                            }
                        }
                        let text = format!("{}'{}'",c,inner.replace('\'',"''"));
                        match parse_self_defining(&text) {
                            Some(v) => toks.push(Tok::Num(v)),
                            None => return Err(EvalError::new("CE004",format!("malformed term {}",text)))
                        }
                        i = j;
                        continue;
                    }
                    // attribute reference?
                    if chars.get(i+1) == Some(&'\'') && AttrKind::parse(c).is_some() {
                        let attr = c.to_ascii_uppercase();
                        if chars.get(i+2) == Some(&'&') {
                            let (name,subscript,next) = scan_var_ref(&chars,i+2)?;
                            toks.push(Tok::AttrVar(attr,name,subscript));
                            i = next;
                        } else {
                            let mut j = i+2;
                            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || "$#@_".contains(chars[j])) {
                                j += 1;
                            }
                            toks.push(Tok::AttrSym(attr,chars[i+2..j].iter().collect()));
                            i = j;
                        }
                    } else {
                        let mut j = i;
                        while j < chars.len() && (chars[j].is_ascii_alphanumeric() || "$#@_".contains(chars[j])) {
                            j += 1;
                        }
                        toks.push(Tok::Word(chars[i..j].iter().collect::<String>().to_uppercase()));
                        i = j;
                    }
                },
                _ => return Err(EvalError::new("CE001",format!("unexpected character {}",c)))
            }
        }
        Ok(toks)
    }

    /// quoted string with substitution of embedded variable references
    fn string_literal(&self, chars: &[char], start: usize) -> Result<(String,usize),EvalError> {
        let mut raw = String::new();
        let mut i = start+1;
        loop {
            match chars.get(i) {
                Some('\'') => {
                    if chars.get(i+1) == Some(&'\'') {
                        raw.push('\'');
                        i += 2;
                    } else {
                        i += 1;
                        break;
                    }
                },
                Some(c) => {
                    raw.push(*c);
                    i += 1;
                },
                None => return Err(EvalError::new("S0003","unterminated string".to_string()))
            }
        }
        Ok((self.substitute(&raw)?,i))
    }
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    for i in open..chars.len() {
        let c = chars[i];
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

/// scan `&NAME` or `&NAME(subscript)` or `&(created)` starting at the ampersand
pub fn scan_var_ref(chars: &[char], start: usize) -> Result<(String,Option<String>,usize),EvalError> {
    if chars.get(start+1) == Some(&'(') {
        let close = matching_paren(chars,start+1)
            .ok_or_else(|| EvalError::new("S0002","unbalanced created set symbol".to_string()))?;
        let name: String = chars[start+2..close].iter().collect();
        return finish_var_ref(chars,name,close+1);
    }
    let mut j = start+1;
    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || "$#@_".contains(chars[j])) {
        j += 1;
    }
    if j == start+1 {
        return Err(EvalError::new("S0002","variable symbol expected".to_string()));
    }
    let name: String = chars[start+1..j].iter().collect();
    finish_var_ref(chars,name,j)
}

fn finish_var_ref(chars: &[char], name: String, after: usize) -> Result<(String,Option<String>,usize),EvalError> {
    if chars.get(after) == Some(&'(') {
        let close = matching_paren(chars,after)
            .ok_or_else(|| EvalError::new("S0002","unbalanced subscript".to_string()))?;
        let subscript: String = chars[after+1..close].iter().collect();
        Ok((name,Some(subscript),close+1))
    } else {
        Ok((name,None,after))
    }
}

struct ExprParser<'a,'b> {
    eval: &'b CaEvaluator<'a>,
    toks: Vec<Tok>,
    pos: usize,
    bool_ctx: bool
}

impl<'a,'b> ExprParser<'a,'b> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }
    fn peek_word(&self) -> Option<&str> {
        match self.peek() {
            Some(Tok::Word(w)) => Some(w.as_str()),
            _ => None
        }
    }
    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn or_level(&mut self) -> Result<CaValue,EvalError> {
        let mut lhs = self.and_level()?;
        while matches!(self.peek_word(),Some("OR") | Some("XOR")) {
            let op = self.peek_word().map(|s| s.to_string()).expect("word");
            self.pos += 1;
            let negate = op == "OR" && self.peek_word() == Some("NOT") && { self.pos += 1; true };
            let rhs = self.and_level()?;
            lhs = self.logical(&op,lhs,if negate { self.invert(rhs)? } else { rhs })?;
        }
        Ok(lhs)
    }
    fn and_level(&mut self) -> Result<CaValue,EvalError> {
        let mut lhs = self.relation_level()?;
        while self.peek_word() == Some("AND") {
            self.pos += 1;
            let negate = self.peek_word() == Some("NOT") && { self.pos += 1; true };
            let rhs = self.relation_level()?;
            lhs = self.logical("AND",lhs,if negate { self.invert(rhs)? } else { rhs })?;
        }
        Ok(lhs)
    }
    fn relation_level(&mut self) -> Result<CaValue,EvalError> {
        let lhs = self.concat_level()?;
        let rel = match self.peek_word() {
            Some("EQ") | Some("NE") | Some("LT") | Some("GT") | Some("LE") | Some("GE") => {
                self.peek_word().map(|s| s.to_string()).expect("word")
            },
            _ => return Ok(lhs)
        };
        self.pos += 1;
        let rhs = self.concat_level()?;
        let ord = match (&lhs,&rhs) {
            (CaValue::C(l),CaValue::C(r)) => string_ord(l).cmp(&string_ord(r)),
            _ => lhs.to_a()?.cmp(&rhs.to_a()?)
        };
        let ans = match rel.as_str() {
            "EQ" => ord.is_eq(),
            "NE" => ord.is_ne(),
            "LT" => ord.is_lt(),
            "GT" => ord.is_gt(),
            "LE" => ord.is_le(),
            _ => ord.is_ge()
        };
        Ok(CaValue::B(ans))
    }
    /// string concatenation with `.`
    fn concat_level(&mut self) -> Result<CaValue,EvalError> {
        let mut lhs = self.add_level()?;
        while matches!(self.peek(),Some(Tok::Dot)) {
            self.pos += 1;
            let rhs = self.add_level()?;
            lhs = CaValue::C(format!("{}{}",lhs.to_c(),rhs.to_c()));
        }
        Ok(lhs)
    }
    fn add_level(&mut self) -> Result<CaValue,EvalError> {
        let mut lhs = self.mul_level()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.pos += 1;
                    let rhs = self.mul_level()?;
                    lhs = CaValue::A(lhs.to_a()?.wrapping_add(rhs.to_a()?));
                },
                Some(Tok::Minus) => {
                    self.pos += 1;
                    let rhs = self.mul_level()?;
                    lhs = CaValue::A(lhs.to_a()?.wrapping_sub(rhs.to_a()?));
                },
                _ => return Ok(lhs)
            }
        }
    }
    fn mul_level(&mut self) -> Result<CaValue,EvalError> {
        let mut lhs = self.unary_level()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    let rhs = self.unary_level()?;
                    lhs = CaValue::A(lhs.to_a()?.wrapping_mul(rhs.to_a()?));
                },
                Some(Tok::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary_level()?;
                    let d = rhs.to_a()?;
                    // division by zero yields zero
                    lhs = CaValue::A(if d == 0 {0} else {lhs.to_a()?.wrapping_div(d)});
                },
                Some(Tok::Word(w)) if matches!(w.as_str(),"SLA"|"SRA"|"SLL"|"SRL") => {
                    let op = w.clone();
                    self.pos += 1;
                    let rhs = self.unary_level()?;
                    let amount = (rhs.to_a())?.rem_euclid(64).min(63) as u32;
                    let v = lhs.to_a()?;
                    let shifted = match op.as_str() {
                        "SLA" => {
                            let kept = v & 0x8000_0000u32 as i32;
                            ((v << amount.min(31)) & 0x7FFF_FFFF) | kept
                        },
                        "SRA" => v >> amount.min(31),
                        "SLL" => ((v as u32) << amount.min(31)) as i32,
                        _ => ((v as u32) >> amount.min(31)) as i32
                    };
                    lhs = CaValue::A(shifted);
                },
                _ => return Ok(lhs)
            }
        }
    }
    fn unary_level(&mut self) -> Result<CaValue,EvalError> {
        match self.peek() {
            Some(Tok::Plus) => {
                self.pos += 1;
                self.unary_level()
            },
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(CaValue::A(self.unary_level()?.to_a()?.wrapping_neg()))
            },
            Some(Tok::Word(w)) if w == "NOT" => {
                self.pos += 1;
                let v = self.unary_level()?;
                self.invert(v)
            },
            _ => self.primary()
        }
    }
    fn invert(&self, v: CaValue) -> Result<CaValue,EvalError> {
        if self.bool_ctx {
            Ok(CaValue::B(!v.to_b()?))
        } else {
            Ok(CaValue::A(!v.to_a()?))
        }
    }
    fn logical(&self, op: &str, lhs: CaValue, rhs: CaValue) -> Result<CaValue,EvalError> {
        if self.bool_ctx {
            let l = lhs.to_b()?;
            let r = rhs.to_b()?;
            Ok(CaValue::B(match op {
                "AND" => l && r,
                "OR" => l || r,
                _ => l != r
            }))
        } else {
            let l = lhs.to_a()?;
            let r = rhs.to_a()?;
            Ok(CaValue::A(match op {
                "AND" => l & r,
                "OR" => l | r,
                _ => l ^ r
            }))
        }
    }

    fn primary(&mut self) -> Result<CaValue,EvalError> {
        match self.bump() {
            Some(Tok::Num(v)) => Ok(CaValue::A(v)),
            Some(Tok::Str(s)) => self.string_suffixes(CaValue::C(s)),
            Some(Tok::Var(name,subscript)) => {
                let v = self.eval.var_value(&name,subscript.as_deref())?;
                self.string_suffixes(v)
            },
            Some(Tok::AttrVar(attr,name,subscript)) => self.var_attribute(attr,&name,subscript.as_deref()),
            Some(Tok::AttrSym(attr,name)) => self.sym_attribute(attr,&name),
            Some(Tok::Word(w)) => {
                // self-defining term written as a word, e.g. X'1F' arrives as Str
                Err(EvalError::new("CE001",format!("unexpected term {}",w)))
            },
            Some(Tok::LParen) => self.paren_group(),
            _ => Err(EvalError::new("CE001","expression expected".to_string()))
        }
    }

    /// a parenthesized group: built-in call, duplication, or grouping
    fn paren_group(&mut self) -> Result<CaValue,EvalError> {
        if let Some(Tok::Word(w)) = self.peek() {
            if BUILTINS.contains(&w.as_str()) {
                let name = w.clone();
                self.pos += 1;
                let mut args = vec![self.or_level()?];
                while matches!(self.peek(),Some(Tok::Comma)) {
                    self.pos += 1;
                    args.push(self.or_level()?);
                }
                if !matches!(self.bump(),Some(Tok::RParen)) {
                    return Err(EvalError::new("CE001","missing right parenthesis".to_string()));
                }
                return self.builtin(&name,args);
            }
        }
        let inner = self.or_level()?;
        if !matches!(self.bump(),Some(Tok::RParen)) {
            return Err(EvalError::new("CE001","missing right parenthesis".to_string()));
        }
        // (n)'str' duplication
        if let Some(Tok::Str(s)) = self.peek() {
            let count = inner.to_a()?.max(0) as usize;
            let s = s.clone();
            self.pos += 1;
            let dup = s.repeat(count);
            return self.string_suffixes(CaValue::C(dup));
        }
        self.string_suffixes(inner)
    }

    /// substring selection `value'(start,len)` applied after a string-valued term
    fn string_suffixes(&mut self, v: CaValue) -> Result<CaValue,EvalError> {
        if !matches!(self.peek(),Some(Tok::LParen)) {
            return Ok(v);
        }
        // only strings take substrings; leave grouping to the caller otherwise
        let s = match &v {
            CaValue::C(s) => s.clone(),
            _ => return Ok(v)
        };
        self.pos += 1;
        let start = self.or_level()?.to_a()?;
        if !matches!(self.bump(),Some(Tok::Comma)) {
            return Err(EvalError::new("CE001","substring needs start and length".to_string()));
        }
        let len = self.or_level()?.to_a()?;
        if !matches!(self.bump(),Some(Tok::RParen)) {
            return Err(EvalError::new("CE001","missing right parenthesis".to_string()));
        }
        let chars: Vec<char> = s.chars().collect();
        let from = (start.max(1) as usize).saturating_sub(1);
        let take = len.max(0) as usize;
        let ans: String = chars.iter().skip(from).take(take).collect();
        self.string_suffixes(CaValue::C(ans))
    }

    fn var_attribute(&self, attr: char, name: &str, subscript: Option<&str>) -> Result<CaValue,EvalError> {
        match attr {
            'N' => {
                if name.eq_ignore_ascii_case("SYSLIST") {
                    return Ok(CaValue::A(self.eval.ctx.syslist_count()));
                }
                let id = self.eval.ctx.ids.get(name)
                    .ok_or_else(|| EvalError::new("E010",format!("undefined variable symbol &{}",name)))?;
                match self.eval.ctx.var_lookup(id) {
                    Some(sym) => Ok(CaValue::A(sym.count())),
                    None => Ok(CaValue::A(0))
                }
            },
            'K' => {
                let text = self.eval.var_text(name,subscript).unwrap_or_default();
                Ok(CaValue::A(text.chars().count() as i32))
            },
            'T' => {
                let text = match self.eval.var_text(name,subscript) {
                    Ok(t) => t,
                    Err(_) => return Ok(CaValue::C("U".to_string()))
                };
                let t = if text.is_empty() {
                    'O'
                } else if text.chars().all(|c| c.is_ascii_digit()) {
                    'N'
                } else {
                    'U'
                };
                Ok(CaValue::C(t.to_string()))
            },
            _ => {
                // the remaining attributes apply to the symbol the value names
                let text = self.eval.var_text(name,subscript)?;
                self.sym_attribute(attr,text.trim())
            }
        }
    }

    fn sym_attribute(&self, attr: char, name: &str) -> Result<CaValue,EvalError> {
        let ctx = self.eval.ctx;
        match attr {
            'O' => {
                let kind = match ctx.resolve_opcode(name,ctx.opcode_gen) {
                    Some(crate::context::OpCode::Machine(m)) => {
                        match ctx.machine_book.get(&m,ctx.optable).and_then(|op| op.alias_of.as_ref()) {
                            Some(_) => 'E',
                            None => 'O'
                        }
                    },
                    Some(crate::context::OpCode::Assembler(_)) | Some(crate::context::OpCode::CondAsm(_)) => 'A',
                    Some(crate::context::OpCode::Macro(_)) => 'M',
                    _ => 'U'
                };
                Ok(CaValue::C(kind.to_string()))
            },
            'D' => {
                let defined = ctx.ids.get(name).map(|id| ctx.ord.is_defined(id)).unwrap_or(false);
                Ok(CaValue::B(defined))
            },
            'T' => {
                let id = ctx.ids.get(name);
                let t = id.and_then(|id| ctx.ord.symbol(id))
                    .filter(|sym| sym.defined())
                    .map(|sym| sym.attrs.t)
                    .or_else(|| id.and_then(|id| ctx.lookahead_attrs.get(&id)).map(|a| a.t))
                    .unwrap_or('U');
                Ok(CaValue::C(t.to_string()))
            },
            'L' | 'S' | 'I' | 'P' => {
                let kind = AttrKind::parse(attr).expect("attribute letter");
                let id = ctx.ids.get(name)
                    .ok_or_else(|| EvalError::new("E010",format!("undefined symbol {}",name)))?;
                if let Some(v) = ctx.ord.attr_of(id,kind) {
                    return Ok(CaValue::A(v));
                }
                if let Some(attrs) = ctx.lookahead_attrs.get(&id) {
                    let v = match kind {
                        AttrKind::L => attrs.l,
                        AttrKind::S => attrs.s,
                        AttrKind::I => attrs.i,
                        _ => attrs.p
                    };
                    return Ok(CaValue::A(v));
                }
                Err(EvalError::new("E010",format!("attribute of undefined symbol {}",name)))
            },
            _ => Err(EvalError::new("CE001",format!("unknown attribute {}",attr)))
        }
    }

    fn builtin(&self, name: &str, args: Vec<CaValue>) -> Result<CaValue,EvalError> {
        let arg = |n: usize| -> Result<&CaValue,EvalError> {
            args.get(n).ok_or_else(|| EvalError::new("CE001",format!("{} needs more operands",name)))
        };
        match name {
            "UPPER" => Ok(CaValue::C(arg(0)?.to_c().to_uppercase())),
            "LOWER" => Ok(CaValue::C(arg(0)?.to_c().to_lowercase())),
            "BYTE" => Ok(CaValue::C(byte_char(arg(0)?.to_a()?).to_string())),
            "DOUBLE" => Ok(CaValue::C(arg(0)?.to_c().replace('\'',"''").replace('&',"&&"))),
            "DCLEN" => {
                let s = arg(0)?.to_c();
                Ok(CaValue::A(s.replace("''","'").replace("&&","&").chars().count() as i32))
            },
            "DCVAL" => Ok(CaValue::C(arg(0)?.to_c().replace("''","'").replace("&&","&"))),
            "DEQUOTE" => {
                let s = arg(0)?.to_c();
                let s = s.strip_prefix('\'').unwrap_or(&s);
                let s = s.strip_suffix('\'').unwrap_or(s);
                Ok(CaValue::C(s.to_string()))
            },
            "FIND" => {
                let hay = arg(0)?.to_c();
                let set = arg(1)?.to_c();
                let pos = hay.chars().position(|c| set.contains(c)).map(|p| p as i32 + 1).unwrap_or(0);
                Ok(CaValue::A(pos))
            },
            "INDEX" => {
                let hay = arg(0)?.to_c();
                let needle = arg(1)?.to_c();
                let pos = if needle.is_empty() {0} else {
                    hay.find(&needle).map(|p| p as i32 + 1).unwrap_or(0)
                };
                Ok(CaValue::A(pos))
            },
            "ISBIN" => {
                let s = arg(0)?.to_c();
                Ok(CaValue::B(!s.is_empty() && s.len() <= 32 && s.chars().all(|c| c=='0'||c=='1')))
            },
            "ISDEC" => {
                let s = arg(0)?.to_c();
                Ok(CaValue::B(!s.is_empty() && s.len() <= 10 && s.chars().all(|c| c.is_ascii_digit())
                    && s.parse::<i64>().map(|v| v <= u32::MAX as i64).unwrap_or(false)))
            },
            "ISHEX" => {
                let s = arg(0)?.to_c();
                Ok(CaValue::B(!s.is_empty() && s.len() <= 8 && s.chars().all(|c| c.is_ascii_hexdigit())))
            },
            "ISSYM" => {
                let s = arg(0)?.to_c();
                Ok(CaValue::B(crate::context::ids::is_ordinary_symbol(&s)))
            },
            "SIGNED" => Ok(CaValue::C(arg(0)?.to_a()?.to_string())),
            "SYSATTRA" => {
                let s = arg(0)?.to_c();
                let t = self.eval.ctx.ids.get(&s)
                    .and_then(|id| self.eval.ctx.ord.symbol(id))
                    .filter(|sym| sym.defined())
                    .map(|sym| sym.attrs.t.to_string())
                    .unwrap_or_default();
                Ok(CaValue::C(t))
            },
            "SYSATTRP" => {
                let s = arg(0)?.to_c();
                let p = self.eval.ctx.ids.get(&s)
                    .and_then(|id| self.eval.ctx.ord.symbol(id))
                    .filter(|sym| sym.defined())
                    .map(|sym| sym.attrs.p.to_string())
                    .unwrap_or_default();
                Ok(CaValue::C(p))
            },
            _ => Err(EvalError::new("CE001",format!("unknown function {}",name)))
        }
    }
}
