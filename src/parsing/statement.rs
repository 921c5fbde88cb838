//! Semantic statements.
//!
//! A statement is the four fields of one logical line: label, instruction,
//! operands and remark.  Operands stay deferred (raw text) until a processor
//! knows the instruction format; conditional-assembly substitution can force a
//! reparse of the whole field.

use lsp_types as lsp;
use super::lexer::LogicalLine;

#[derive(Clone,PartialEq,Debug)]
pub enum LabelField {
    Empty,
    /// ordinary symbol candidate
    Ordinary(String),
    /// sequence symbol `.NAME`
    Sequence(String),
    /// variable symbol `&NAME`
    Variable(String),
    /// concatenation containing variable references, substituted before use
    Model(String)
}

impl LabelField {
    pub fn text(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Ordinary(s) | Self::Sequence(s) | Self::Variable(s) | Self::Model(s) => s
        }
    }
}

#[derive(Clone,PartialEq,Debug)]
pub enum InstrField {
    Empty,
    Mnemonic(String),
    /// instruction produced by variable substitution
    Model(String)
}

impl InstrField {
    pub fn text(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Mnemonic(s) | Self::Model(s) => s
        }
    }
}

#[derive(Clone)]
pub struct Statement {
    pub label: LabelField,
    pub label_range: lsp::Range,
    pub instr: InstrField,
    pub instr_range: lsp::Range,
    /// deferred operand field text
    pub operands: String,
    pub operands_range: lsp::Range,
    /// logical offset of the operand field, for splitting
    pub operands_offset: usize,
    pub remark: Option<String>,
    pub remark_range: Option<lsp::Range>,
    pub line: LogicalLine,
    /// the statement came from substituting a model statement
    pub from_model: bool
}

impl Statement {
    pub fn uri(&self) -> &lsp::Url {
        &self.line.uri
    }
    pub fn row(&self) -> u32 {
        self.line.row
    }
    pub fn location(&self) -> lsp::Location {
        lsp::Location::new(self.line.uri.clone(),self.instr_range)
    }
    pub fn whole_range(&self) -> lsp::Range {
        self.line.whole_range()
    }
    pub fn is_comment(&self) -> bool {
        self.line.is_comment()
    }
    /// range of a span within the operand field text
    pub fn operand_range(&self, offset: usize, len: usize) -> lsp::Range {
        self.line.map(self.operands_offset + offset,len)
    }
}

/// one split operand with its offset in the operand field
#[derive(Clone,Debug,PartialEq)]
pub struct Operand {
    pub text: String,
    pub offset: usize
}
