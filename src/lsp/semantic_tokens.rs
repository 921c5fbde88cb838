//! Semantic highlighting.
//!
//! Tokens are produced by re-lexing the checkpointed document, so highlights
//! stay available while an analysis runs.  Scopes map one to one onto the
//! registered token types: label, instruction, remark, comment, seq_symbol,
//! var_symbol, operator_symbol, string, number, operand, data_def_type,
//! data_def_modifier, data_attr_type, self_def_type, ordinary_symbol.

use lsp_types as lsp;
use std::sync::Arc;
use crate::parsing::lexer::{LineFolder,SourceLine};
use crate::parsing::{LabelField,Statement,StatementParser};
use crate::server::SemanticTokensBuilder;
use super::Symbols;

pub struct SemanticTokensProvider {
    symbols: Arc<Symbols>
}

impl SemanticTokensProvider {
    pub fn new() -> Self {
        Self { symbols: Arc::new(Symbols::new()) }
    }
    pub fn use_shared_symbols(&mut self, symbols: Arc<Symbols>) {
        self.symbols = symbols;
    }

    fn operand_tokens(&self, stmt: &Statement, builder: &mut SemanticTokensBuilder) {
        let mnemonic = stmt.instr.text().to_uppercase();
        let data_def = matches!(mnemonic.as_str(),"DC"|"DS"|"DXD");
        let chars: Vec<char> = stmt.operands.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '\'' {
                // string, including the self-defining X'..' B'..' C'..' forms
                let tagged = i > 0 && "XBCxbc".contains(chars[i-1])
                    && (i < 2 || !chars[i-2].is_ascii_alphanumeric());
                let start = if tagged { i-1 } else { i };
                let mut j = i+1;
                while j < chars.len() {
                    if chars[j] == '\'' {
                        if chars.get(j+1) == Some(&'\'') {
                            j += 2;
                            continue;
                        }
                        break;
                    }
                    j += 1;
                }
                let scope = if tagged { "self_def_type" } else { "string" };
                builder.push(stmt.operand_range(start,j.min(chars.len())+1-start),scope);
                i = j+1;
                continue;
            }
            if c.is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                builder.push(stmt.operand_range(start,i-start),"number");
                continue;
            }
            if c == '&' {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || "$#@_".contains(chars[i])) {
                    i += 1;
                }
                builder.push(stmt.operand_range(start,i-start),"var_symbol");
                continue;
            }
            if c == '.' && chars.get(i+1).map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || "$#@_".contains(chars[i])) {
                    i += 1;
                }
                builder.push(stmt.operand_range(start,i-start),"seq_symbol");
                continue;
            }
            if c.is_ascii_alphabetic() || "$#@_".contains(c) {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || "$#@_".contains(chars[i])) {
                    i += 1;
                }
                // attribute reference letter
                if i == start+1 && chars.get(i) == Some(&'\'')
                    && "LKNTSIODPlkntsiodp".contains(chars[start]) {
                    builder.push(stmt.operand_range(start,2),"data_attr_type");
                    i += 1;
                    continue;
                }
                let token: String = chars[start..i].iter().collect();
                let scope = if data_def && start == 0 {
                    "data_def_type"
                } else if data_def && token.chars().all(|c| "LPSE".contains(c.to_ascii_uppercase())) {
                    "data_def_modifier"
                } else if self.symbols.ords.contains_key(&token.to_uppercase()) {
                    "ordinary_symbol"
                } else {
                    "operand"
                };
                builder.push(stmt.operand_range(start,i-start),scope);
                continue;
            }
            if "+-*/=,()".contains(c) {
                builder.push(stmt.operand_range(i,1),"operator_symbol");
            }
            i += 1;
        }
    }

    /// tokens for a whole document text
    pub fn get(&self, text: &str, uri: &lsp::Url) -> lsp::SemanticTokens {
        let lines: Vec<SourceLine> = text.lines().enumerate().map(|(row,line)| SourceLine {
            text: line.to_string(),
            uri: uri.clone(),
            row: row as u32
        }).collect();
        let folder = LineFolder::new();
        let mut builder = SemanticTokensBuilder::new();
        let mut at = 0;
        while at < lines.len() {
            let (logical,next) = folder.fold_at(&lines,at);
            at = next;
            if logical.is_comment() {
                for seg in &logical.segments {
                    builder.push(crate::lsp_range(seg.row,seg.col,seg.col+seg.len),"comment");
                }
                continue;
            }
            let stmt = StatementParser::parse(logical);
            match &stmt.label {
                LabelField::Empty => {},
                LabelField::Sequence(_) => builder.push(stmt.label_range,"seq_symbol"),
                LabelField::Variable(_) | LabelField::Model(_) => builder.push(stmt.label_range,"var_symbol"),
                LabelField::Ordinary(_) => builder.push(stmt.label_range,"label")
            }
            builder.push(stmt.instr_range,"instruction");
            self.operand_tokens(&stmt,&mut builder);
            if let Some(range) = stmt.remark_range {
                builder.push(range,"remark");
            }
        }
        builder.clone_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_statement_tokens() {
        let provider = SemanticTokensProvider::new();
        let uri = lsp::Url::parse("untitled:t").unwrap();
        let toks = provider.get("HERE     LR    1,2           load\n* comment\n",&uri);
        assert!(toks.data.len() >= 5);
        // first token is the label at line 0 column 0
        assert_eq!(toks.data[0].delta_line,0);
        assert_eq!(toks.data[0].delta_start,0);
    }
}
