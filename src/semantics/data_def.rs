//! `DC`/`DS` operand analysis.
//!
//! An operand is `[dup]T[P(p)][L[.]len][S(s)][E(e)]['nominal'|(exprs)]`.
//! The engine computes item length, alignment and symbol attributes; nominal
//! values of address types keep their expression text so value checking can be
//! postponed without affecting lengths.  Expressions in the duplication and
//! length modifiers may reference forward symbols, in which case the caller
//! reserves a space and keys its resolution on the synthesized length
//! expression.

use crate::context::ids::IdStorage;
use crate::context::ordinary::address::{Alignment,DOUBLEWORD,FULLWORD,HALFWORD,NO_ALIGN};
use crate::context::ordinary::symbol::SymbolAttributes;
use crate::expressions::EvalError;
use crate::expressions::mach::MachExpr;

#[derive(Clone,Debug,PartialEq)]
pub enum Nominal {
    /// quoted nominal, quotes removed, doubled quotes collapsed
    Quoted(String),
    /// parenthesized expression list, raw operand texts
    Exprs(Vec<String>),
    Absent
}

#[derive(Clone)]
pub struct DataDefOperand {
    pub dup: Option<MachExpr>,
    pub type_char: char,
    pub prog_type: Option<MachExpr>,
    pub length: Option<MachExpr>,
    pub bit_length: bool,
    pub scale: Option<MachExpr>,
    pub exponent: Option<MachExpr>,
    pub nominal: Nominal
}

/// natural length and alignment per type; length `None` derives from the nominal
fn type_defaults(t: char) -> Option<(Option<i32>,Alignment)> {
    match t {
        'F' => Some((Some(4),FULLWORD)),
        'H' => Some((Some(2),HALFWORD)),
        'D' => Some((Some(8),DOUBLEWORD)),
        'E' => Some((Some(4),FULLWORD)),
        'L' => Some((Some(16),DOUBLEWORD)),
        'A' => Some((Some(4),FULLWORD)),
        'V' => Some((Some(4),FULLWORD)),
        'Y' => Some((Some(2),HALFWORD)),
        'S' => Some((Some(2),HALFWORD)),
        'C' | 'X' | 'B' | 'P' | 'Z' => Some((None,NO_ALIGN)),
        _ => None
    }
}

impl DataDefOperand {
    /// length in bytes of one nominal item when it determines the length
    fn nominal_item_length(&self) -> i32 {
        let text = match &self.nominal {
            Nominal::Quoted(s) => s,
            _ => return match self.type_char {
                'P' | 'Z' => 1,
                _ => type_defaults(self.type_char).and_then(|d| d.0).unwrap_or(1)
            }
        };
        // multiple values inside one quote each get their own storage
        let first = text.split(',').next().unwrap_or("");
        match self.type_char {
            'C' => first.chars().count().max(1) as i32,
            'X' => ((first.chars().count().max(1) + 1) / 2) as i32,
            'B' => ((first.chars().count().max(1) + 7) / 8) as i32,
            'P' => {
                let digits = first.chars().filter(|c| c.is_ascii_digit()).count().max(1);
                ((digits + 2) / 2) as i32
            },
            'Z' => first.chars().filter(|c| c.is_ascii_digit()).count().max(1) as i32,
            _ => type_defaults(self.type_char).and_then(|d| d.0).unwrap_or(1)
        }
    }
    /// how many items the nominal carries
    pub fn item_count(&self) -> i32 {
        match &self.nominal {
            Nominal::Quoted(s) if !matches!(self.type_char,'C'|'X'|'B') => {
                s.split(',').count().max(1) as i32
            },
            Nominal::Exprs(list) => list.len().max(1) as i32,
            _ => 1
        }
    }
    /// alignment honoring the rule that an explicit length removes it
    pub fn alignment(&self) -> Alignment {
        if self.length.is_some() {
            return NO_ALIGN;
        }
        type_defaults(self.type_char).map(|d| d.1).unwrap_or(NO_ALIGN)
    }
    /// item length expression in bytes; a plain number when nothing is deferred
    pub fn item_length_expr(&self) -> MachExpr {
        match &self.length {
            Some(expr) => {
                if self.bit_length {
                    // bits round up to bytes
                    MachExpr::Div(
                        Box::new(MachExpr::Add(Box::new(expr.clone()),Box::new(MachExpr::Num(7)))),
                        Box::new(MachExpr::Num(8)))
                } else {
                    expr.clone()
                }
            },
            None => MachExpr::Num(self.nominal_item_length())
        }
    }
    /// total byte length expression: dup * items * item_length
    pub fn total_length_expr(&self) -> MachExpr {
        let per_item = self.item_length_expr();
        let items = MachExpr::Mul(Box::new(MachExpr::Num(self.item_count())),Box::new(per_item));
        match &self.dup {
            Some(dup) => MachExpr::Mul(Box::new(dup.clone()),Box::new(items)),
            None => items
        }
    }
    /// symbol attributes for a label on this operand; the length attribute is
    /// the single-item length, not the total
    pub fn label_attrs(&self, item_len: i32) -> SymbolAttributes {
        let mut attrs = SymbolAttributes::with_type_length(self.type_char,item_len);
        attrs.s = 0;
        attrs
    }
}

fn scan_number_or_paren(chars: &[char], at: usize, ids: &mut IdStorage)
    -> Result<(Option<MachExpr>,usize),EvalError>
{
    match chars.get(at) {
        Some(c) if c.is_ascii_digit() => {
            let mut j = at;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            let digits: String = chars[at..j].iter().collect();
            match digits.parse::<i32>() {
                Ok(v) => Ok((Some(MachExpr::Num(v)),j)),
                Err(_) => Err(EvalError::new("A201",format!("modifier out of range: {}",digits)))
            }
        },
        Some('(') => {
            let mut depth = 0;
            let mut j = at;
            while j < chars.len() {
                match chars[j] {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            let inner: String = chars[at+1..j].iter().collect();
                            let expr = MachExpr::parse(&inner,ids)
                                .map_err(|e| EvalError::new("A201",e.message))?;
                            return Ok((Some(expr),j+1));
                        }
                    },
                    _ => {}
                }
                j += 1;
            }
            Err(EvalError::new("A201","unbalanced modifier expression".to_string()))
        },
        _ => Ok((None,at))
    }
}

/// parse one DC/DS operand
pub fn parse_data_def(txt: &str, ids: &mut IdStorage) -> Result<DataDefOperand,EvalError> {
    let chars: Vec<char> = txt.trim().chars().collect();
    if chars.is_empty() {
        return Err(EvalError::new("A204","empty data definition".to_string()));
    }
    let mut at = 0;
    // duplication factor
    let dup = if chars.get(0).map(|c| c.is_ascii_digit()).unwrap_or(false)
        || (chars.get(0) == Some(&'(')) {
        let (expr,next) = scan_number_or_paren(&chars,0,ids)?;
        at = next;
        expr
    } else {
        None
    };
    let type_char = match chars.get(at) {
        Some(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
        _ => return Err(EvalError::new("A204","missing data definition type".to_string()))
    };
    if type_defaults(type_char).is_none() {
        return Err(EvalError::new("A204",format!("unknown data definition type {}",type_char)));
    }
    at += 1;
    let mut ans = DataDefOperand {
        dup,
        type_char,
        prog_type: None,
        length: None,
        bit_length: false,
        scale: None,
        exponent: None,
        nominal: Nominal::Absent
    };
    // modifiers: program type, length, scale, exponent
    loop {
        match chars.get(at).map(|c| c.to_ascii_uppercase()) {
            Some('P') if matches!(chars.get(at+1),Some('(')) => {
                let (expr,next) = scan_number_or_paren(&chars,at+1,ids)?;
                if ans.prog_type.is_some() {
                    return Err(EvalError::new("A201","duplicate program type modifier".to_string()));
                }
                ans.prog_type = expr;
                at = next;
            },
            Some('L') => {
                if ans.length.is_some() {
                    return Err(EvalError::new("A201","duplicate length modifier".to_string()));
                }
                at += 1;
                if chars.get(at) == Some(&'.') {
                    ans.bit_length = true;
                    at += 1;
                }
                let (expr,next) = scan_number_or_paren(&chars,at,ids)?;
                match expr {
                    Some(expr) => ans.length = Some(expr),
                    None => return Err(EvalError::new("A201","length modifier needs a value".to_string()))
                }
                at = next;
            },
            Some('S') if matches!(chars.get(at+1),Some(c) if c.is_ascii_digit() || *c=='(' || *c=='-') => {
                if ans.scale.is_some() {
                    return Err(EvalError::new("A201","duplicate scale modifier".to_string()));
                }
                at += 1;
                let negative = chars.get(at) == Some(&'-');
                if negative {
                    at += 1;
                }
                let (expr,next) = scan_number_or_paren(&chars,at,ids)?;
                match expr {
                    Some(expr) => {
                        ans.scale = Some(if negative { MachExpr::Neg(Box::new(expr)) } else { expr });
                    },
                    None => return Err(EvalError::new("A201","scale modifier needs a value".to_string()))
                }
                at = next;
            },
            Some('E') if matches!(chars.get(at+1),Some(c) if c.is_ascii_digit() || *c=='(' || *c=='-') => {
                if ans.exponent.is_some() {
                    return Err(EvalError::new("A201","duplicate exponent modifier".to_string()));
                }
                at += 1;
                let negative = chars.get(at) == Some(&'-');
                if negative {
                    at += 1;
                }
                let (expr,next) = scan_number_or_paren(&chars,at,ids)?;
                match expr {
                    Some(expr) => {
                        ans.exponent = Some(if negative { MachExpr::Neg(Box::new(expr)) } else { expr });
                    },
                    None => return Err(EvalError::new("A201","exponent modifier needs a value".to_string()))
                }
                at = next;
            },
            _ => break
        }
    }
    // nominal value
    match chars.get(at) {
        None => {},
        Some('\'') => {
            let mut j = at+1;
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
                    Some(c) => {
                        inner.push(*c);
                        j += 1;
                    },
                    None => return Err(EvalError::new("A204","unterminated nominal value".to_string()))
                }
            }
            if j < chars.len() {
                return Err(EvalError::new("A204","unexpected text after nominal value".to_string()));
            }
            ans.nominal = Nominal::Quoted(inner);
        },
        Some('(') => {
            let mut depth = 0;
            let mut j = at;
            let mut item = String::new();
            let mut items = Vec::new();
            while j < chars.len() {
                let c = chars[j];
                match c {
                    '(' => {
                        if depth > 0 {
                            item.push(c);
                        }
                        depth += 1;
                    },
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            items.push(item.trim().to_string());
                            break;
                        }
                        item.push(c);
                    },
                    ',' if depth == 1 => {
                        items.push(item.trim().to_string());
                        item = String::new();
                    },
                    _ => item.push(c)
                }
                j += 1;
            }
            if depth != 0 {
                return Err(EvalError::new("A204","unbalanced nominal value".to_string()));
            }
            if j+1 < chars.len() {
                return Err(EvalError::new("A204","unexpected text after nominal value".to_string()));
            }
            ans.nominal = Nominal::Exprs(items);
        },
        Some(c) => return Err(EvalError::new("A204",format!("unexpected character {} in data definition",c)))
    }
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ordinary::OrdinaryAssemblyContext;

    fn parse(txt: &str) -> DataDefOperand {
        let mut ids = IdStorage::new();
        parse_data_def(txt,&mut ids).expect(txt)
    }

    fn total(txt: &str) -> i32 {
        let mut ids = IdStorage::new();
        let dd = parse_data_def(txt,&mut ids).expect(txt);
        let ord = OrdinaryAssemblyContext::new();
        crate::expressions::mach::expect_abs(&dd.total_length_expr(),&ord,None).expect(txt)
    }

    #[test]
    fn natural_lengths() {
        assert_eq!(total("F'1'"),4);
        assert_eq!(total("H'2'"),2);
        assert_eq!(total("D'0'"),8);
        assert_eq!(total("A(0)"),4);
        assert_eq!(total("Y(0)"),2);
    }

    #[test]
    fn derived_lengths() {
        assert_eq!(total("C'ABC'"),3);
        assert_eq!(total("X'FFF'"),2);
        assert_eq!(total("B'10101'"),1);
        assert_eq!(total("P'123'"),2);
        assert_eq!(total("Z'123'"),3);
    }

    #[test]
    fn duplication_and_length() {
        assert_eq!(total("3F'9'"),12);
        assert_eq!(total("CL10'AB'"),10);
        assert_eq!(total("2XL3'FF'"),6);
        assert_eq!(total("0F"),0);
    }

    #[test]
    fn bit_length_rounds_up() {
        assert_eq!(total("BL.3'101'"),1);
        assert_eq!(total("FL.20'1'"),3);
    }

    #[test]
    fn multiple_nominals() {
        assert_eq!(total("F'1,2,3'"),12);
        assert_eq!(total("A(1,2)"),8);
        let dd = parse("A(X,Y)");
        assert_eq!(dd.item_count(),2);
        assert_eq!(dd.nominal,Nominal::Exprs(vec!["X".to_string(),"Y".to_string()]));
    }

    #[test]
    fn alignment_rules() {
        assert_eq!(parse("F'1'").alignment().boundary,4);
        assert_eq!(parse("FL3'1'").alignment().boundary,1);
        assert_eq!(parse("C'AB'").alignment().boundary,1);
        assert_eq!(parse("D'0'").alignment().boundary,8);
    }

    #[test]
    fn modifier_errors() {
        let mut ids = IdStorage::new();
        assert!(parse_data_def("FL2L3'1'",&mut ids).is_err());
        assert!(parse_data_def("Q'1'",&mut ids).is_err());
        assert!(parse_data_def("F'1",&mut ids).is_err());
    }

    #[test]
    fn forward_length_builds_expression() {
        let mut ids = IdStorage::new();
        let dd = parse_data_def("CL(LEN)' '",&mut ids).expect("parse");
        let ord = OrdinaryAssemblyContext::new();
        assert_eq!(dd.total_length_expr().dependencies(&ord).len(),1);
    }
}
