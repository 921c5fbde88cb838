//! Statement processors.
//!
//! Four consumption modes: ordinary assembly, macro-definition capture,
//! lookahead, and copy capture.  The ordinary processor's instruction
//! handlers are split by instruction class: conditional assembly (`ca_ops`),
//! assembler directives (`asm_ops`) and machine instructions (`mach_ops`).

pub mod ordinary;
pub mod ca_ops;
pub mod asm_ops;
pub mod mach_ops;
pub mod macro_def;
pub mod lookahead;
pub mod copy_def;

use super::LookaheadTarget;

/// the processor stack variants
pub enum Processor {
    Ordinary,
    MacroDef(macro_def::MacroDefProcessor),
    Lookahead(lookahead::LookaheadProcessor)
}

impl Processor {
    pub fn kind(&self) -> super::ProcessingKind {
        match self {
            Self::Ordinary => super::ProcessingKind::Ordinary,
            Self::MacroDef(_) => super::ProcessingKind::MacroDef,
            Self::Lookahead(_) => super::ProcessingKind::Lookahead
        }
    }
    pub fn lookahead_target(&self) -> Option<LookaheadTarget> {
        match self {
            Self::Lookahead(p) => Some(p.target),
            _ => None
        }
    }
}
