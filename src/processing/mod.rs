//! # Statement processing
//!
//! Providers deliver statements from open code, macro expansion or copy
//! members; processors consume them in one of four modes (ordinary assembly,
//! macro-definition capture, lookahead, copy capture); the manager schedules
//! the two stacks and carries out control transfers such as `AGO`, macro
//! invocation and `COPY`.

use lsp_types as lsp;
use crate::context::ids::IdIndex;
use crate::context::macros::MacroArguments;

pub mod preprocessor;
pub mod provider;
pub mod processors;
pub mod manager;

#[cfg(test)]
mod tests;

/// who produced the statement
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum ProviderKind {
    OpenCode,
    Macro,
    Copy
}

/// how the statement is being consumed
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum ProcessingKind {
    Ordinary,
    MacroDef,
    Lookahead,
    CopyDef
}

/// what a lookahead scan is searching for
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum LookaheadTarget {
    SeqSymbol(IdIndex),
    SymbolAttrs(IdIndex)
}

/// control transfers a processor asks of the manager
#[derive(Clone)]
pub enum Request {
    /// `MACRO` seen, switch to definition capture
    StartMacroDef,
    /// invoke a macro with bound arguments
    InvokeMacro(IdIndex,MacroArguments,lsp::Range),
    /// `COPY member`
    PushCopy(IdIndex,lsp::Range),
    /// `AGO`/`AIF` transfer to a sequence symbol
    Branch(IdIndex,lsp::Range),
    /// an attribute reference needs a forward definition
    LookaheadAttr(IdIndex),
    /// mnemonic resolved nowhere; the manager tries the macro library
    UnknownOpcode(String,lsp::Range),
    /// `MEND`/`MEXIT` during expansion
    FinishMacro,
    /// `ICTL` changed the input format
    SetIctl(crate::parsing::Ictl),
    /// `END` statement
    End
}
