use lsp_types as lsp;
use std::sync::Arc;
use crate::Document;
use crate::analysis::Analyzer;
use crate::server::Analysis;
use super::checkpoint::CheckpointManager;
use super::hovers::HoverProvider;
use super::{OccurrenceKind,Symbols};

const SOURCE: &str = "\
CODE     CSECT
WAGE     DS    F
RATE     EQU   15
         LR    1,2
         A     3,WAGE
";

fn analyzed() -> (Document,Symbols) {
    let doc = Document::untitled(SOURCE.to_string());
    let mut analyzer = Analyzer::new();
    analyzer.analyze(&doc).expect("analysis completes");
    let symbols = analyzer.get_symbols();
    (doc,symbols)
}

fn checkpoint() -> (Document,CheckpointManager) {
    let (doc,symbols) = analyzed();
    let mut chkpt = CheckpointManager::new(doc.clone());
    chkpt.update_symbols(symbols);
    (doc,chkpt)
}

fn sel(doc: &Document, line: u32, col: u32) -> lsp::Location {
    let pos = lsp::Position::new(line,col);
    lsp::Location::new(doc.uri.clone(),lsp::Range::new(pos,pos))
}

#[test]
fn occurrences_cover_defs_and_refs() {
    let (doc,symbols) = analyzed();
    let wage = symbols.ords.get("WAGE").expect("WAGE collected");
    assert_eq!(wage.defs.len(),1);
    assert_eq!(wage.refs.len(),1);
    assert_eq!(wage.type_letter,Some('F'));
    assert_eq!(wage.length,Some(4));
    let rate = symbols.ords.get("RATE").expect("RATE collected");
    assert_eq!(rate.value,Some(15));
    // the instruction occurrence on the LR line
    let occ = symbols.occurrence_at(&doc.uri,&lsp::Position::new(3,10)).expect("occurrence");
    assert_eq!(occ.kind,OccurrenceKind::Instr);
    assert_eq!(occ.name,"LR");
}

#[test]
fn definition_from_reference() {
    let (doc,chkpt) = checkpoint();
    // the WAGE reference in "A 3,WAGE" sits on line 4
    let col = SOURCE.lines().nth(4).unwrap().find("WAGE").unwrap() as u32;
    let defs = chkpt.get_defs(&sel(&doc,4,col));
    assert_eq!(defs.len(),1);
    assert_eq!(defs[0].range.start.line,1);
}

#[test]
fn references_include_definition() {
    let (doc,chkpt) = checkpoint();
    let refs = chkpt.get_refs(&sel(&doc,1,0));
    assert_eq!(refs.len(),2);
}

#[test]
fn renamables_cover_every_occurrence() {
    let (doc,chkpt) = checkpoint();
    let spots = chkpt.get_renamables(&sel(&doc,1,0));
    assert_eq!(spots.len(),2);
}

#[test]
fn document_symbols_list_section_and_labels() {
    let (_,chkpt) = checkpoint();
    let symbols = chkpt.get_symbols();
    let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"CODE"));
    assert!(names.contains(&"WAGE"));
    assert!(names.contains(&"RATE"));
    let code = symbols.iter().find(|s| s.name == "CODE").unwrap();
    assert_eq!(code.kind,lsp::SymbolKind::NAMESPACE);
}

#[test]
fn folding_brackets_macro_definitions() {
    let text = "\
         MACRO
         NOOP
         MEND
         NOOP
";
    let doc = Document::untitled(text.to_string());
    let chkpt = CheckpointManager::new(doc);
    let folds = chkpt.get_folding_ranges();
    assert_eq!(folds.len(),1);
    assert_eq!(folds[0].start_line,0);
    assert_eq!(folds[0].end_line,2);
}

#[test]
fn hover_shows_symbol_value() {
    let (doc,symbols) = analyzed();
    let mut hovers = HoverProvider::new();
    hovers.use_shared_symbols(Arc::new(symbols));
    let col = SOURCE.lines().nth(2).unwrap().find("RATE").unwrap() as u32;
    let hover = hovers.get(&doc.uri,&lsp::Position::new(2,col)).expect("hover");
    match hover.contents {
        lsp::HoverContents::Markup(markup) => {
            assert!(markup.value.contains("RATE"));
            assert!(markup.value.contains("15"));
        },
        _ => panic!("expected markdown hover")
    }
}

#[test]
fn hover_describes_instructions() {
    let (doc,symbols) = analyzed();
    let mut hovers = HoverProvider::new();
    hovers.use_shared_symbols(Arc::new(symbols));
    let hover = hovers.get(&doc.uri,&lsp::Position::new(3,10)).expect("hover");
    match hover.contents {
        lsp::HoverContents::Markup(markup) => {
            assert!(markup.value.contains("Load"));
            assert!(markup.value.contains("RR"));
        },
        _ => panic!("expected markdown hover")
    }
}
