//! Copy members cached by the copy-definition processor.

use lsp_types as lsp;
use super::ids::IdIndex;
use super::macros::CachedLine;

#[derive(Clone)]
pub struct CopyMember {
    pub name: IdIndex,
    pub lines: Vec<CachedLine>,
    /// sequence symbol name to line index, gathered at capture
    pub seq_symbols: std::collections::HashMap<IdIndex,usize>,
    pub definition_location: lsp::Location
}
