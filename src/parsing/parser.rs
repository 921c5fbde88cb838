//! Statement field scanning.
//!
//! The parser splits a logical line into label, instruction, operand field and
//! remark, classifies labels, and splits operand fields on commas outside
//! quotes and parentheses.  The attribute apostrophe (`L'SYM`) is recognized
//! so it does not open a string.

use super::lexer::LogicalLine;
use super::statement::{InstrField,LabelField,Operand,Statement};

const ATTR_LETTERS: &str = "LKNTSIODP";

pub(crate) fn classify_label(txt: &str) -> LabelField {
    if txt.is_empty() {
        return LabelField::Empty;
    }
    if txt.starts_with('.') {
        return LabelField::Sequence(txt.to_string());
    }
    if txt.starts_with('&') {
        if txt[1..].chars().all(|c| c.is_ascii_alphanumeric() || "$#@_".contains(c)) {
            return LabelField::Variable(txt.to_string());
        }
        return LabelField::Model(txt.to_string());
    }
    if txt.contains('&') {
        return LabelField::Model(txt.to_string());
    }
    LabelField::Ordinary(txt.to_string())
}

/// Is the apostrophe at `idx` an attribute reference rather than a string
/// opener?  True when preceded by a lone attribute letter, e.g. `L'X`, and the
/// letter is not the tail of a longer name, and the quote is not immediately
/// followed by a delimiter (which would make it a one-character string).
fn is_attribute_quote(chars: &[char], idx: usize) -> bool {
    if idx == 0 {
        return false;
    }
    let prev = chars[idx-1].to_ascii_uppercase();
    if !ATTR_LETTERS.contains(prev) {
        return false;
    }
    if idx >= 2 {
        let before = chars[idx-2];
        if before.is_ascii_alphanumeric() || "$#@_".contains(before) || before == '\'' {
            return false;
        }
    }
    match chars.get(idx+1) {
        // C' ' style strings still open
        None => false,
        Some(c) => c.is_ascii_alphanumeric() || "$#@_&=*+-".contains(*c)
    }
}

/// scan the operand field, returning the byte length up to the remark gap
pub(crate) fn operand_field_len(txt: &str) -> usize {
    let chars: Vec<char> = txt.chars().collect();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                if chars.get(i+1) == Some(&'\'') {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
        } else {
            match c {
                '\'' => {
                    if !is_attribute_quote(&chars,i) {
                        in_string = true;
                    }
                },
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ' ' if depth == 0 => return i,
                _ => {}
            }
        }
        i += 1;
    }
    chars.len()
}

/// Split the operand field on top-level commas.  An empty field yields no
/// operands; consecutive commas yield empty (omitted) operands.
pub fn split_operands(txt: &str) -> Vec<Operand> {
    let mut ans = Vec::new();
    if txt.is_empty() {
        return ans;
    }
    let chars: Vec<char> = txt.chars().collect();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                if chars.get(i+1) == Some(&'\'') {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
        } else {
            match c {
                '\'' => {
                    if !is_attribute_quote(&chars,i) {
                        in_string = true;
                    }
                },
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    ans.push(Operand { text: chars[start..i].iter().collect(), offset: start });
                    start = i+1;
                },
                _ => {}
            }
        }
        i += 1;
    }
    ans.push(Operand { text: chars[start..].iter().collect(), offset: start });
    ans
}

pub struct StatementParser;

impl StatementParser {
    /// full field scan of a logical line
    pub fn parse(line: LogicalLine) -> Statement {
        Self::parse_impl(line,false)
    }
    /// lookahead scan: label and instruction only, operands left raw
    pub fn parse_lookahead(line: LogicalLine) -> Statement {
        Self::parse_impl(line,true)
    }
    fn parse_impl(line: LogicalLine, lookahead: bool) -> Statement {
        let text = line.text.clone();
        if line.is_comment() {
            return Statement {
                label: LabelField::Empty,
                label_range: line.map(0,0),
                instr: InstrField::Empty,
                instr_range: line.map(0,0),
                operands: String::new(),
                operands_range: line.map(0,0),
                operands_offset: 0,
                remark: None,
                remark_range: None,
                line,
                from_model: false
            };
        }
        // label field runs from column 0 to the first blank
        let label_end = text.find(' ').unwrap_or(text.len());
        let label_txt = &text[..label_end];
        let label = classify_label(label_txt);
        let label_range = line.map(0,label_end);

        let after_label = &text[label_end..];
        let instr_rel = after_label.len() - after_label.trim_start().len();
        let instr_start = label_end + instr_rel;
        let instr_end = match text[instr_start..].find(' ') {
            Some(n) => instr_start + n,
            None => text.len()
        };
        let instr_txt = &text[instr_start..instr_end];
        let instr = if instr_txt.is_empty() {
            InstrField::Empty
        } else if instr_txt.contains('&') {
            InstrField::Model(instr_txt.to_string())
        } else {
            InstrField::Mnemonic(instr_txt.to_string())
        };
        let instr_range = line.map(instr_start,instr_txt.len());

        let after_instr = &text[instr_end..];
        let op_rel = after_instr.len() - after_instr.trim_start().len();
        let op_start = instr_end + op_rel;
        let op_len = if lookahead {
            text.len().saturating_sub(op_start)
        } else {
            operand_field_len(&text[op_start..])
        };
        let operands = text[op_start..op_start+op_len].to_string();
        let operands_range = line.map(op_start,op_len);

        let rest = &text[op_start+op_len..];
        let remark_rel = rest.len() - rest.trim_start().len();
        let remark_start = op_start + op_len + remark_rel;
        let remark_txt = text[remark_start..].trim_end();
        let (remark,remark_range) = if remark_txt.is_empty() || lookahead {
            (None,None)
        } else {
            (Some(remark_txt.to_string()),Some(line.map(remark_start,remark_txt.len())))
        };

        Statement {
            label,
            label_range,
            instr,
            instr_range,
            operands,
            operands_range,
            operands_offset: op_start,
            remark,
            remark_range,
            line,
            from_model: false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::lexer::{LineFolder,SourceLine};
    use lsp_types as lsp;

    fn stmt(text: &str) -> Statement {
        let uri = lsp::Url::parse("untitled:t").unwrap();
        let lines = vec![SourceLine { text: text.to_string(), uri, row: 0 }];
        let folder = LineFolder::new();
        let (logical,_) = folder.fold_at(&lines,0);
        StatementParser::parse(logical)
    }

    #[test]
    fn four_fields() {
        let s = stmt("HERE     LR    1,2           load it");
        assert_eq!(s.label,LabelField::Ordinary("HERE".to_string()));
        assert_eq!(s.instr.text(),"LR");
        assert_eq!(s.operands,"1,2");
        assert_eq!(s.remark.as_deref(),Some("load it"));
    }

    #[test]
    fn label_classification() {
        assert_eq!(stmt(".LOOP    ANOP").label,LabelField::Sequence(".LOOP".to_string()));
        assert_eq!(stmt("&VAR     SETA  1").label,LabelField::Variable("&VAR".to_string()));
        assert_eq!(stmt("&PFX.X   DS    F").label,LabelField::Model("&PFX.X".to_string()));
    }

    #[test]
    fn blank_inside_string_is_not_remark() {
        let s = stmt("         DC    C'A B'        remark");
        assert_eq!(s.operands,"C'A B'");
        assert_eq!(s.remark.as_deref(),Some("remark"));
    }

    #[test]
    fn attribute_quote_does_not_open_string() {
        let s = stmt("         DC    A(L'X)");
        assert_eq!(s.operands,"A(L'X)");
        assert!(s.remark.is_none());
    }

    #[test]
    fn operand_split_respects_nesting() {
        let ops = split_operands("A,(B,C),C'X,Y',D");
        let texts: Vec<&str> = ops.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts,vec!["A","(B,C)","C'X,Y'","D"]);
        assert_eq!(ops[1].offset,2);
    }

    #[test]
    fn omitted_operands_preserved() {
        let ops = split_operands("A,,C");
        assert_eq!(ops.len(),3);
        assert_eq!(ops[1].text,"");
    }

    #[test]
    fn comment_statement() {
        let s = stmt("* a comment line");
        assert!(s.is_comment());
        assert_eq!(s.instr,InstrField::Empty);
    }
}
