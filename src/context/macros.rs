//! Macro definitions and their cached statement lists.

use lsp_types as lsp;
use super::ids::IdIndex;

/// A captured logical line.  The text is the whole line with continuations
/// already folded; `row` is the first physical row at the origin.  The label
/// and instruction hints come from the lightweight capture parse and are all
/// the lookahead and sequence-symbol machinery needs.
#[derive(Clone)]
pub struct CachedLine {
    pub text: String,
    pub uri: lsp::Url,
    pub row: u32,
    pub label_hint: Option<String>,
    pub instr_hint: Option<String>
}

#[derive(Clone)]
pub struct MacroParam {
    pub name: IdIndex,
    pub keyword: bool,
    /// default value for keyword parameters, empty otherwise
    pub default: String
}

/// A macro definition captured between `MACRO` and `MEND`.
#[derive(Clone)]
pub struct MacroDefinition {
    pub name: IdIndex,
    /// the `&LABEL` of the prototype, receives the name-field value
    pub name_param: Option<IdIndex>,
    pub params: Vec<MacroParam>,
    pub body: Vec<CachedLine>,
    /// sequence symbol name to body statement index
    pub seq_symbols: std::collections::HashMap<IdIndex,usize>,
    pub definition_location: lsp::Location,
    /// opcode generation at definition, used when postponed statements look the macro up
    pub defined_gen: usize
}

impl MacroDefinition {
    /// find a parameter by name
    pub fn param(&self, name: IdIndex) -> Option<&MacroParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Arguments of one macro call, already matched against the prototype.
#[derive(Clone)]
pub struct MacroArguments {
    /// name-field value, also `&SYSLIST(0)`
    pub name_field: String,
    /// positional arguments in order
    pub positional: Vec<String>,
    /// keyword arguments that were explicitly supplied
    pub keyword: Vec<(IdIndex,String)>
}

impl MacroArguments {
    pub fn empty() -> Self {
        Self { name_field: String::new(), positional: Vec::new(), keyword: Vec::new() }
    }
}
