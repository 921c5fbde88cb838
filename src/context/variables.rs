//! Variable (SET) symbols and code scopes.
//!
//! A scope is created for open code and for every macro invocation.  `GBLx`
//! declarations link a scope-local name to the global store.  Values come in the
//! three primitive types of conditional assembly: `A` (32-bit signed), `B` (bit)
//! and `C` (character, up to 4064).

use std::collections::{HashMap,HashSet};
use lsp_types as lsp;
use super::ids::IdIndex;

/// branch budget of a fresh scope
pub const ACTR_DEFAULT: i32 = 4096;
/// longest SETC value
pub const SETC_MAX: usize = 4064;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum VarType {
    A,
    B,
    C
}

impl VarType {
    pub fn letter(&self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C'
        }
    }
}

#[derive(Clone,Debug)]
pub enum SetData {
    A(Vec<i32>),
    B(Vec<bool>),
    C(Vec<String>)
}

/// A SET symbol, scalar or subscripted.  Subscripts are 1-based; a scalar
/// stores its value in the single slot of the vector.
#[derive(Clone)]
pub struct SetSymbol {
    pub name: IdIndex,
    pub global: bool,
    pub scalar: bool,
    pub data: SetData,
    pub location: lsp::Location
}

impl SetSymbol {
    pub fn new(name: IdIndex, typ: VarType, global: bool, scalar: bool, location: lsp::Location) -> Self {
        let data = match typ {
            VarType::A => SetData::A(Vec::new()),
            VarType::B => SetData::B(Vec::new()),
            VarType::C => SetData::C(Vec::new())
        };
        Self { name, global, scalar, data, location }
    }
    pub fn var_type(&self) -> VarType {
        match &self.data {
            SetData::A(_) => VarType::A,
            SetData::B(_) => VarType::B,
            SetData::C(_) => VarType::C
        }
    }
    /// the N' attribute: highest subscript touched, 0 for scalars
    pub fn count(&self) -> i32 {
        if self.scalar {
            return 0;
        }
        match &self.data {
            SetData::A(v) => v.len() as i32,
            SetData::B(v) => v.len() as i32,
            SetData::C(v) => v.len() as i32
        }
    }
    fn slot(&self, subscript: Option<usize>) -> usize {
        match subscript {
            Some(n) if n >= 1 => n-1,
            _ => 0
        }
    }
    /// Extend the array so the subscript exists.  HLASM materializes the
    /// element as soon as the target subscript is computed, which is
    /// observable through N' in the same statement.
    pub fn reserve(&mut self, subscript: Option<usize>) {
        if subscript.is_some() {
            self.scalar = false;
        }
        let slot = self.slot(subscript);
        match &mut self.data {
            SetData::A(v) => while v.len() <= slot { v.push(0) },
            SetData::B(v) => while v.len() <= slot { v.push(false) },
            SetData::C(v) => while v.len() <= slot { v.push(String::new()) }
        }
    }
    pub fn set_a(&mut self, subscript: Option<usize>, val: i32) -> bool {
        self.reserve(subscript);
        let slot = self.slot(subscript);
        match &mut self.data {
            SetData::A(v) => { v[slot] = val; true },
            _ => false
        }
    }
    pub fn set_b(&mut self, subscript: Option<usize>, val: bool) -> bool {
        self.reserve(subscript);
        let slot = self.slot(subscript);
        match &mut self.data {
            SetData::B(v) => { v[slot] = val; true },
            _ => false
        }
    }
    pub fn set_c(&mut self, subscript: Option<usize>, val: String) -> bool {
        self.reserve(subscript);
        let slot = self.slot(subscript);
        let mut val = val;
        if val.len() > SETC_MAX {
            val.truncate(SETC_MAX);
        }
        match &mut self.data {
            SetData::C(v) => { v[slot] = val; true },
            _ => false
        }
    }
    pub fn get_a(&self, subscript: Option<usize>) -> Option<i32> {
        let slot = self.slot(subscript);
        match &self.data {
            SetData::A(v) => v.get(slot).copied(),
            _ => None
        }
    }
    pub fn get_b(&self, subscript: Option<usize>) -> Option<bool> {
        let slot = self.slot(subscript);
        match &self.data {
            SetData::B(v) => v.get(slot).copied(),
            _ => None
        }
    }
    pub fn get_c(&self, subscript: Option<usize>) -> Option<String> {
        let slot = self.slot(subscript);
        match &self.data {
            SetData::C(v) => v.get(slot).cloned(),
            _ => None
        }
    }
    /// value as a character string, usable for any type
    pub fn display(&self, subscript: Option<usize>) -> String {
        let slot = self.slot(subscript);
        match &self.data {
            SetData::A(v) => v.get(slot).map(|n| n.to_string()).unwrap_or_default(),
            SetData::B(v) => v.get(slot).map(|b| if *b {"1".to_string()} else {"0".to_string()}).unwrap_or_default(),
            SetData::C(v) => v.get(slot).cloned().unwrap_or_default()
        }
    }
}

/// One level of the variable scope stack.  The bottom scope is open code,
/// every macro invocation pushes another.
pub struct CodeScope {
    /// local SET symbols
    pub vars: HashMap<IdIndex,SetSymbol>,
    /// names linked to the global store by GBLx
    pub global_refs: HashSet<IdIndex>,
    /// macro parameters by name, raw argument text
    pub params: HashMap<IdIndex,String>,
    /// positional arguments, slot 0 is the name-field value
    pub syslist: Vec<String>,
    /// sequence symbol positions within the scope's statement stream
    pub seq_symbols: HashMap<IdIndex,usize>,
    /// remaining AGO/AIF branch budget
    pub actr: i32,
    pub is_macro: bool,
    pub macro_name: Option<IdIndex>,
    /// captured &SYSNDX value of this invocation
    pub sysndx: usize,
    pub sysect: String,
    pub sysloc: String,
    pub sysstyp: String,
    pub sysnest: usize
}

impl CodeScope {
    pub fn open_code() -> Self {
        Self {
            vars: HashMap::new(),
            global_refs: HashSet::new(),
            params: HashMap::new(),
            syslist: Vec::new(),
            seq_symbols: HashMap::new(),
            actr: ACTR_DEFAULT,
            is_macro: false,
            macro_name: None,
            sysndx: 0,
            sysect: String::new(),
            sysloc: String::new(),
            sysstyp: String::new(),
            sysnest: 0
        }
    }
    pub fn for_macro(name: IdIndex, sysndx: usize, nest: usize) -> Self {
        let mut ans = Self::open_code();
        ans.is_macro = true;
        ans.macro_name = Some(name);
        ans.sysndx = sysndx;
        ans.sysnest = nest;
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ids::IdStorage;

    fn loc() -> lsp::Location {
        lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(), lsp::Range::default())
    }

    #[test]
    fn scalar_set_and_get() {
        let mut ids = IdStorage::new();
        let mut sym = SetSymbol::new(ids.intern("&A"),VarType::A,false,true,loc());
        assert!(sym.set_a(None,5));
        assert_eq!(sym.get_a(None),Some(5));
        assert_eq!(sym.count(),0);
    }

    #[test]
    fn subscript_reservation_grows_count() {
        let mut ids = IdStorage::new();
        let mut sym = SetSymbol::new(ids.intern("&V"),VarType::A,false,true,loc());
        sym.reserve(Some(3));
        assert_eq!(sym.count(),3);
        assert_eq!(sym.get_a(Some(2)),Some(0));
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut ids = IdStorage::new();
        let mut sym = SetSymbol::new(ids.intern("&B"),VarType::B,false,true,loc());
        assert!(!sym.set_a(None,1));
        assert!(sym.set_b(None,true));
    }

    #[test]
    fn setc_truncates() {
        let mut ids = IdStorage::new();
        let mut sym = SetSymbol::new(ids.intern("&C"),VarType::C,false,true,loc());
        sym.set_c(None,"X".repeat(5000));
        assert_eq!(sym.get_c(None).unwrap().len(),SETC_MAX);
    }
}
