//! Copy-member capture.
//!
//! On the first `COPY member` the resolved text is folded and captured once;
//! later inclusions reuse the cached statement list.  Capture records the
//! lightweight label/instruction parse and sequence-symbol positions.

use lsp_types as lsp;
use std::collections::HashMap;
use crate::context::HlasmContext;
use crate::context::copy::CopyMember;
use crate::context::ids::IdIndex;
use crate::context::macros::CachedLine;
use crate::parsing::lexer::{LineFolder,SourceLine};
use crate::parsing::{LabelField,StatementParser};

/// fold and capture a member's text; the caller caches the result
pub fn capture(ctx: &mut HlasmContext, name: IdIndex, uri: lsp::Url, text: &str) -> CopyMember {
    let lines: Vec<SourceLine> = text.lines().enumerate().map(|(row,line)| SourceLine {
        text: line.to_string(),
        uri: uri.clone(),
        row: row as u32
    }).collect();
    let folder = LineFolder::new();
    let mut body: Vec<CachedLine> = Vec::new();
    let mut seq_symbols: HashMap<IdIndex,usize> = HashMap::new();
    let mut at = 0;
    while at < lines.len() {
        let (logical,next) = folder.fold_at(&lines,at);
        at = next;
        let stmt = StatementParser::parse_lookahead(logical);
        if let LabelField::Sequence(name_txt) = &stmt.label {
            let id = ctx.ids.intern(name_txt.trim_start_matches('.'));
            seq_symbols.entry(id).or_insert(body.len());
        }
        body.push(CachedLine {
            text: stmt.line.text.clone(),
            uri: stmt.uri().clone(),
            row: stmt.row(),
            label_hint: match &stmt.label {
                LabelField::Empty => None,
                other => Some(other.text().to_string())
            },
            instr_hint: match stmt.instr.text() {
                "" => None,
                other => Some(other.to_string())
            }
        });
    }
    CopyMember {
        name,
        lines: body,
        seq_symbols,
        definition_location: lsp::Location::new(uri,lsp::Range::default())
    }
}
