//! Completions and opcode suggestions.
//!
//! Completion serves machine mnemonics under the active OPTABLE, assembler
//! directives, known macros, and variable or ordinary symbols when the typed
//! prefix selects them.  The `hlasm/opcode_suggestion` request uses a bounded
//! Levenshtein distance with alphabetical tiebreak.

use lsp_types as lsp;
use std::collections::HashSet;
use std::sync::Arc;
use crate::context::HlasmContext;
use super::Symbols;

/// Levenshtein distance, giving up beyond `bound`
pub fn bounded_levenshtein(a: &str, b: &str, bound: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > bound {
        return None;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize;b.len()+1];
    for i in 1..=a.len() {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=b.len() {
            let cost = if a[i-1] == b[j-1] {0} else {1};
            curr[j] = (prev[j]+1).min(curr[j-1]+1).min(prev[j-1]+cost);
            row_min = row_min.min(curr[j]);
        }
        if row_min > bound {
            return None;
        }
        std::mem::swap(&mut prev,&mut curr);
    }
    if prev[b.len()] <= bound {
        Some(prev[b.len()])
    } else {
        None
    }
}

/// closest operation codes to a misspelled mnemonic, distance at most 3,
/// closest first, ties alphabetical
pub fn opcode_suggestions(ctx: &HlasmContext, typed: &str, max: usize) -> Vec<String> {
    let typed = typed.to_uppercase();
    let mut scored: Vec<(usize,String)> = Vec::new();
    let mut seen = HashSet::new();
    for op in ctx.machine_book.mnemonics(ctx.optable) {
        if seen.insert(op.mnemonic.clone()) {
            if let Some(d) = bounded_levenshtein(&typed,&op.mnemonic,3) {
                scored.push((d,op.mnemonic.clone()));
            }
        }
    }
    for op in ctx.asm_book.directives() {
        if seen.insert(op.mnemonic.clone()) {
            if let Some(d) = bounded_levenshtein(&typed,&op.mnemonic,3) {
                scored.push((d,op.mnemonic.clone()));
            }
        }
    }
    for id in ctx.macro_names() {
        let name = ctx.ids.resolve(id).to_string();
        if seen.insert(name.clone()) {
            if let Some(d) = bounded_levenshtein(&typed,&name,3) {
                scored.push((d,name));
            }
        }
    }
    scored.sort();
    scored.into_iter().filter(|(d,_)| *d > 0).take(max).map(|(_,name)| name).collect()
}

/// suggestions over an arbitrary name list, used for missing library members
pub fn member_suggestions(candidates: &[String], typed: &str, max: usize) -> Vec<String> {
    let typed = typed.to_uppercase();
    let mut scored: Vec<(usize,String)> = candidates.iter()
        .filter_map(|c| bounded_levenshtein(&typed,&c.to_uppercase(),3).map(|d| (d,c.clone())))
        .collect();
    scored.sort();
    scored.into_iter().filter(|(d,_)| *d > 0).take(max).map(|(_,name)| name).collect()
}

pub struct CompletionProvider {
    symbols: Arc<Symbols>,
    machine_items: Vec<lsp::CompletionItem>,
    directive_items: Vec<lsp::CompletionItem>
}

fn item(label: &str, kind: lsp::CompletionItemKind, detail: Option<String>) -> lsp::CompletionItem {
    lsp::CompletionItem {
        label: label.to_string(),
        kind: Some(kind),
        detail,
        ..lsp::CompletionItem::default()
    }
}

impl CompletionProvider {
    pub fn new(ctx: &HlasmContext) -> Self {
        let mut machine_items: Vec<lsp::CompletionItem> = ctx.machine_book.mnemonics(ctx.optable)
            .iter()
            .map(|op| item(&op.mnemonic,lsp::CompletionItemKind::FUNCTION,Some(op.brief.clone())))
            .collect();
        machine_items.sort_by(|a,b| a.label.cmp(&b.label));
        let mut directive_items: Vec<lsp::CompletionItem> = ctx.asm_book.directives()
            .iter()
            .map(|op| item(&op.mnemonic,lsp::CompletionItemKind::KEYWORD,Some(op.brief.clone())))
            .collect();
        directive_items.sort_by(|a,b| a.label.cmp(&b.label));
        Self {
            symbols: Arc::new(Symbols::new()),
            machine_items,
            directive_items
        }
    }
    pub fn use_shared_symbols(&mut self, symbols: Arc<Symbols>) {
        self.symbols = symbols;
    }
    /// completions for a position in a line of text
    pub fn get(&self, line: &str, pos: &lsp::Position) -> Vec<lsp::CompletionItem> {
        let col = (pos.character as usize).min(line.chars().count());
        let prefix: String = line.chars().take(col).collect();
        let word_start = prefix.rfind(|c: char| !(c.is_ascii_alphanumeric() || "$#@_&.".contains(c)))
            .map(|i| i+1)
            .unwrap_or(0);
        let word = &prefix[word_start..];
        if word.starts_with('&') {
            // variable symbols
            let mut ans: Vec<lsp::CompletionItem> = self.symbols.vars.values()
                .map(|sym| {
                    let detail = sym.type_letter.map(|t| format!("SET{}",t));
                    item(&format!("&{}",sym.name),lsp::CompletionItemKind::VARIABLE,detail)
                })
                .collect();
            ans.sort_by(|a,b| a.label.cmp(&b.label));
            return ans;
        }
        if word.starts_with('.') {
            let mut ans: Vec<lsp::CompletionItem> = self.symbols.seqs.values()
                .map(|sym| item(&format!(".{}",sym.name),lsp::CompletionItemKind::REFERENCE,None))
                .collect();
            ans.sort_by(|a,b| a.label.cmp(&b.label));
            return ans;
        }
        // zero or one tokens before the word means label or instruction field
        let tokens_before = prefix[..word_start].split_whitespace().count();
        let mut ans = Vec::new();
        if tokens_before <= 1 {
            ans.extend(self.machine_items.iter().cloned());
            ans.extend(self.directive_items.iter().cloned());
            let mut macro_items: Vec<lsp::CompletionItem> = self.symbols.macros.values()
                .map(|sym| item(&sym.name,lsp::CompletionItemKind::MODULE,Some("macro".to_string())))
                .collect();
            macro_items.sort_by(|a,b| a.label.cmp(&b.label));
            ans.extend(macro_items);
        } else {
            let mut ord_items: Vec<lsp::CompletionItem> = self.symbols.ords.values()
                .map(|sym| {
                    let detail = sym.type_letter.map(|t| format!("type {}",t));
                    item(&sym.name,lsp::CompletionItemKind::CONSTANT,detail)
                })
                .collect();
            ord_items.sort_by(|a,b| a.label.cmp(&b.label));
            ans.extend(ord_items);
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handbook::Optable;

    #[test]
    fn distance_bounds() {
        assert_eq!(bounded_levenshtein("LHIXXX","LHI",3),Some(3));
        assert_eq!(bounded_levenshtein("LR","LR",3),Some(0));
        assert_eq!(bounded_levenshtein("ABCDEFG","XY",3),None);
    }

    #[test]
    fn suggestion_for_misspelled_mnemonic() {
        let ctx = HlasmContext::new(Optable::Z15,String::new(),String::new());
        let got = opcode_suggestions(&ctx,"LHIXXX",3);
        assert!(got.contains(&"LHI".to_string()),"got {:?}",got);
    }

    #[test]
    fn ties_break_alphabetically() {
        let candidates = vec!["BETA".to_string(),"AETA".to_string()];
        let got = member_suggestions(&candidates,"ZETA",2);
        assert_eq!(got,vec!["AETA".to_string(),"BETA".to_string()]);
    }
}
