//! Statement providers.
//!
//! Providers are stacked LIFO; the active provider is the topmost unfinished
//! one.  The open-code provider supports rewind, which lookahead and open-code
//! sequence-symbol branches rely on; macro and copy providers are indexed into
//! cached statement lists so branching inside them is an index assignment.

use std::sync::Arc;
use crate::context::copy::CopyMember;
use crate::context::macros::{CachedLine,MacroDefinition};
use crate::parsing::lexer::{LineFolder,LogicalLine,SourceLine,Segment};
use super::ProviderKind;

/// a unit of source delivered by a provider, before statement parsing
pub struct ProvidedLine {
    pub line: LogicalLine,
    pub kind: ProviderKind,
    /// index of the statement within its provider, for branch bookkeeping
    pub index: usize
}

fn cached_to_logical(cached: &CachedLine) -> LogicalLine {
    LogicalLine {
        text: cached.text.clone(),
        uri: cached.uri.clone(),
        row: cached.row,
        segments: vec![Segment {
            row: cached.row,
            col: 0,
            len: cached.text.chars().count() as u32,
            logical_offset: 0
        }],
        dangling_continuation: false
    }
}

pub struct OpenCodeProvider {
    lines: Vec<SourceLine>,
    pub folder: LineFolder,
    /// physical line index the next fold starts at
    pos: usize,
    /// physical index the current statement started at
    last_start: usize
}

impl OpenCodeProvider {
    pub fn new(lines: Vec<SourceLine>) -> Self {
        Self { lines, folder: LineFolder::new(), pos: 0, last_start: 0 }
    }
    pub fn finished(&self) -> bool {
        self.pos >= self.lines.len()
    }
    pub fn get_next(&mut self) -> Option<ProvidedLine> {
        if self.finished() {
            return None;
        }
        self.last_start = self.pos;
        let (line,next) = self.folder.fold_at(&self.lines,self.pos);
        self.pos = next;
        let index = self.last_start;
        Some(ProvidedLine { line, kind: ProviderKind::OpenCode, index })
    }
    /// physical index where the most recent statement began
    pub fn current_start(&self) -> usize {
        self.last_start
    }
    /// position the next delivery at a physical line index
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos.min(self.lines.len());
    }
    pub fn position(&self) -> usize {
        self.pos
    }
}

pub struct MacroProvider {
    pub def: Arc<MacroDefinition>,
    index: usize,
    finished: bool
}

impl MacroProvider {
    pub fn new(def: Arc<MacroDefinition>) -> Self {
        Self { def, index: 0, finished: false }
    }
    pub fn finished(&self) -> bool {
        self.finished || self.index >= self.def.body.len()
    }
    pub fn get_next(&mut self) -> Option<ProvidedLine> {
        if self.finished() {
            return None;
        }
        let cached = &self.def.body[self.index];
        let index = self.index;
        self.index += 1;
        Some(ProvidedLine { line: cached_to_logical(cached), kind: ProviderKind::Macro, index })
    }
    /// branch to a body statement index
    pub fn jump(&mut self, index: usize) {
        self.index = index;
    }
    /// `MEXIT`/`MEND` terminates the expansion
    pub fn terminate(&mut self) {
        self.finished = true;
    }
    pub fn position(&self) -> usize {
        self.index
    }
    pub fn rewind(&mut self, index: usize) {
        self.index = index;
        self.finished = false;
    }
}

pub struct CopyProvider {
    pub member: Arc<CopyMember>,
    index: usize
}

impl CopyProvider {
    pub fn new(member: Arc<CopyMember>) -> Self {
        Self { member, index: 0 }
    }
    pub fn finished(&self) -> bool {
        self.index >= self.member.lines.len()
    }
    pub fn get_next(&mut self) -> Option<ProvidedLine> {
        if self.finished() {
            return None;
        }
        let cached = &self.member.lines[self.index];
        let index = self.index;
        self.index += 1;
        Some(ProvidedLine { line: cached_to_logical(cached), kind: ProviderKind::Copy, index })
    }
    pub fn jump(&mut self, index: usize) {
        self.index = index;
    }
    pub fn position(&self) -> usize {
        self.index
    }
    pub fn rewind(&mut self, index: usize) {
        self.index = index;
    }
}

/// the provider stack variants
pub enum Provider {
    OpenCode(OpenCodeProvider),
    Macro(MacroProvider),
    Copy(CopyProvider)
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenCode(_) => ProviderKind::OpenCode,
            Self::Macro(_) => ProviderKind::Macro,
            Self::Copy(_) => ProviderKind::Copy
        }
    }
    pub fn finished(&self) -> bool {
        match self {
            Self::OpenCode(p) => p.finished(),
            Self::Macro(p) => p.finished(),
            Self::Copy(p) => p.finished()
        }
    }
    pub fn get_next(&mut self) -> Option<ProvidedLine> {
        match self {
            Self::OpenCode(p) => p.get_next(),
            Self::Macro(p) => p.get_next(),
            Self::Copy(p) => p.get_next()
        }
    }
    pub fn position(&self) -> usize {
        match self {
            Self::OpenCode(p) => p.position(),
            Self::Macro(p) => p.position(),
            Self::Copy(p) => p.position()
        }
    }
    pub fn rewind(&mut self, pos: usize) {
        match self {
            Self::OpenCode(p) => p.rewind(pos),
            Self::Macro(p) => p.rewind(pos),
            Self::Copy(p) => p.rewind(pos)
        }
    }
    /// index of the most recently delivered statement
    pub fn last_index(&self) -> usize {
        match self {
            Self::OpenCode(p) => p.current_start(),
            Self::Macro(p) => p.position().saturating_sub(1),
            Self::Copy(p) => p.position().saturating_sub(1)
        }
    }
}
