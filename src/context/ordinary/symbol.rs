//! Ordinary symbols and their attributes.

use lsp_types as lsp;
use super::super::ids::IdIndex;
use super::address::Address;

/// attribute kinds that can be referenced as `X'SYM`
#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum AttrKind {
    /// length
    L,
    /// type, one letter
    T,
    /// scale
    S,
    /// integer
    I,
    /// program type
    P,
    /// defined
    D,
    /// count, derived from the name text
    K,
    /// number, derived
    N,
    /// operation code, derived
    O
}

impl AttrKind {
    pub fn parse(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'L' => Some(Self::L),
            'T' => Some(Self::T),
            'S' => Some(Self::S),
            'I' => Some(Self::I),
            'P' => Some(Self::P),
            'D' => Some(Self::D),
            'K' => Some(Self::K),
            'N' => Some(Self::N),
            'O' => Some(Self::O),
            _ => None
        }
    }
}

#[derive(Clone,PartialEq,Debug)]
pub enum SymbolValue {
    Absolute(i32),
    Reloc(Address),
    Undefined
}

#[derive(Clone,Copy,PartialEq,Debug)]
pub struct SymbolAttributes {
    pub t: char,
    pub l: i32,
    pub s: i32,
    pub i: i32,
    pub p: i32
}

impl SymbolAttributes {
    /// attributes of a symbol that never got a proper definition
    pub fn undefined() -> Self {
        Self { t: 'U', l: 1, s: 0, i: 0, p: 0 }
    }
    /// attributes for an EQU without explicit modifiers
    pub fn equ_default() -> Self {
        Self { t: 'U', l: 1, s: 0, i: 0, p: 0 }
    }
    pub fn with_type_length(t: char, l: i32) -> Self {
        Self { t, l, s: 0, i: 0, p: 0 }
    }
}

#[derive(Clone)]
pub struct OrdinarySymbol {
    pub id: IdIndex,
    pub value: SymbolValue,
    pub attrs: SymbolAttributes,
    pub location: lsp::Location
}

impl OrdinarySymbol {
    pub fn kind_letter(&self) -> char {
        self.attrs.t
    }
    pub fn defined(&self) -> bool {
        !matches!(self.value,SymbolValue::Undefined)
    }
}
