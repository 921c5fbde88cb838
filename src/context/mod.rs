//! # HLASM context
//!
//! The mutable global state of one analysis: interned ids, the ordinary
//! assembly context, the variable scope stack, macro and copy member tables,
//! opcode resolution with `OPSYN` generations, the `SYSNDX` counter and the
//! processing stack.  One context lives exactly as long as one analysis.

use std::collections::HashMap;
use std::sync::Arc;
use lsp_types as lsp;

pub mod ids;
pub mod variables;
pub mod macros;
pub mod copy;
pub mod source;
pub mod ordinary;

use ids::{IdIndex,IdStorage};
use macros::{MacroArguments,MacroDefinition};
use copy::CopyMember;
use source::ProcessingStackTree;
use variables::{CodeScope,SetSymbol,VarType};
use crate::handbook::{Optable,assembler::AssemblerHandbook,machine::MachineHandbook};

/// the resolution of an instruction-field mnemonic
#[derive(Clone,PartialEq,Debug)]
pub enum OpCode {
    Machine(String),
    Assembler(String),
    CondAsm(String),
    Macro(IdIndex),
    Deleted
}

pub struct HlasmContext {
    pub ids: IdStorage,
    pub ord: ordinary::OrdinaryAssemblyContext,
    /// scope stack, bottom is open code
    scopes: Vec<CodeScope>,
    pub globals: HashMap<IdIndex,SetSymbol>,
    /// macro definitions versioned by the opcode generation that created them
    macros: HashMap<IdIndex,Vec<(usize,Arc<MacroDefinition>)>>,
    pub copy_members: HashMap<IdIndex,Arc<CopyMember>>,
    /// OPSYN bindings, `None` deletes the operation
    opsyn: HashMap<IdIndex,Vec<(usize,Option<OpCode>)>>,
    pub opcode_gen: usize,
    sysndx: usize,
    /// ceiling installed by `MHELP 256`; exceeding it is E072
    pub sysndx_limit: Option<usize>,
    pub mhelp_flags: i64,
    pub stack: ProcessingStackTree,
    pub machine_book: MachineHandbook,
    pub asm_book: AssemblerHandbook,
    pub optable: Optable,
    pub sysparm: String,
    pub system_id: String,
    /// attributes gathered by lookahead for symbols defined later in the scope
    pub lookahead_attrs: HashMap<IdIndex,ordinary::symbol::SymbolAttributes>,
    unique_counter: usize
}

impl HlasmContext {
    pub fn new(optable: Optable, sysparm: String, system_id: String) -> Self {
        Self {
            ids: IdStorage::new(),
            ord: ordinary::OrdinaryAssemblyContext::new(),
            scopes: vec![CodeScope::open_code()],
            globals: HashMap::new(),
            macros: HashMap::new(),
            copy_members: HashMap::new(),
            opsyn: HashMap::new(),
            opcode_gen: 0,
            sysndx: 0,
            sysndx_limit: None,
            mhelp_flags: 0,
            stack: ProcessingStackTree::new(),
            machine_book: MachineHandbook::new(),
            asm_book: AssemblerHandbook::new(),
            optable,
            sysparm,
            system_id,
            lookahead_attrs: HashMap::new(),
            unique_counter: 0
        }
    }

    pub fn scope(&self) -> &CodeScope {
        self.scopes.last().expect("scope stack never empty")
    }
    pub fn scope_mut(&mut self) -> &mut CodeScope {
        self.scopes.last_mut().expect("scope stack never empty")
    }
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }
    pub fn in_macro(&self) -> bool {
        self.scope().is_macro
    }

    pub fn next_unique(&mut self) -> usize {
        self.unique_counter += 1;
        self.unique_counter
    }

    /// Format a SYSNDX value.  Four digits zero padded; values past 9999
    /// print unpadded, which only happens once MHELP raised the ceiling.
    pub fn sysndx_str(n: usize) -> String {
        if n <= 9999 {
            format!("{:04}",n)
        } else {
            format!("{}",n)
        }
    }

    /// resolve a mnemonic as of an opcode generation
    pub fn resolve_opcode(&self, name: &str, gen: usize) -> Option<OpCode> {
        if let Some(id) = self.ids.get(name) {
            if let Some(bindings) = self.opsyn.get(&id) {
                if let Some((_,binding)) = bindings.iter().rev().find(|(g,_)| *g <= gen) {
                    return match binding {
                        Some(op) => Some(op.clone()),
                        None => None
                    };
                }
            }
            if let Some(defs) = self.macros.get(&id) {
                if defs.iter().any(|(g,_)| *g <= gen) {
                    return Some(OpCode::Macro(id));
                }
            }
        }
        if self.machine_book.get(name,self.optable).is_some() {
            return Some(OpCode::Machine(name.to_uppercase()));
        }
        if let Some(op) = self.asm_book.get(name) {
            if op.ca {
                return Some(OpCode::CondAsm(op.mnemonic.clone()));
            }
            return Some(OpCode::Assembler(op.mnemonic.clone()));
        }
        None
    }

    /// `alias OPSYN target`; a missing target deletes the alias.  The binding
    /// snapshots the target's current meaning and becomes visible only to
    /// statements with a newer opcode generation.
    pub fn set_opsyn(&mut self, alias: &str, target: Option<&str>) -> bool {
        let resolved = match target {
            Some(name) => match self.resolve_opcode(name,self.opcode_gen) {
                Some(op) => Some(op),
                None => return false
            },
            None => None
        };
        let alias_id = self.ids.intern(alias);
        self.opcode_gen += 1;
        self.opsyn.entry(alias_id).or_default().push((self.opcode_gen,resolved));
        true
    }

    pub fn add_macro(&mut self, def: MacroDefinition) {
        self.opcode_gen += 1;
        let name = def.name;
        self.macros.entry(name).or_default().push((self.opcode_gen,Arc::new(def)));
    }
    /// latest macro definition visible at the generation
    pub fn get_macro(&self, name: IdIndex, gen: usize) -> Option<Arc<MacroDefinition>> {
        self.macros.get(&name)?.iter().rev()
            .find(|(g,_)| *g <= gen)
            .map(|(_,def)| Arc::clone(def))
    }
    pub fn macro_names(&self) -> Vec<IdIndex> {
        self.macros.keys().copied().collect()
    }

    pub fn add_copy_member(&mut self, member: CopyMember) -> Arc<CopyMember> {
        let arc = Arc::new(member);
        self.copy_members.insert(arc.name,Arc::clone(&arc));
        arc
    }
    pub fn get_copy_member(&self, name: IdIndex) -> Option<Arc<CopyMember>> {
        self.copy_members.get(&name).map(Arc::clone)
    }

    /// Enter a macro scope, binding arguments against the prototype.
    /// Fails with the new SYSNDX value exceeding the MHELP ceiling.
    pub fn enter_macro(&mut self, def: &MacroDefinition, args: MacroArguments) -> Result<usize,usize> {
        self.sysndx += 1;
        if let Some(limit) = self.sysndx_limit {
            if self.sysndx > limit {
                return Err(self.sysndx);
            }
        }
        let nest = self.scopes.iter().filter(|s| s.is_macro).count() + 1;
        let mut scope = CodeScope::for_macro(def.name,self.sysndx,nest);
        let mut positional = args.positional.iter();
        for param in &def.params {
            let value = if param.keyword {
                match args.keyword.iter().find(|(id,_)| *id == param.name) {
                    Some((_,v)) => v.clone(),
                    None => param.default.clone()
                }
            } else {
                positional.next().cloned().unwrap_or_default()
            };
            scope.params.insert(param.name,value);
        }
        if let Some(name_param) = def.name_param {
            scope.params.insert(name_param,args.name_field.clone());
        }
        scope.syslist = std::iter::once(args.name_field)
            .chain(args.positional.into_iter())
            .collect();
        scope.seq_symbols = def.seq_symbols.clone();
        if let Some(section) = self.ord.active_section() {
            scope.sysect = self.ids.resolve(section.name).trim().to_string();
            scope.sysloc = self.ids.resolve(section.active().name).trim().to_string();
            scope.sysstyp = match section.kind {
                ordinary::section::SectionKind::Executable => "CSECT".to_string(),
                ordinary::section::SectionKind::ReadOnly => "RSECT".to_string(),
                ordinary::section::SectionKind::Dummy => "DSECT".to_string(),
                ordinary::section::SectionKind::Common => "COM".to_string()
            };
        }
        self.scopes.push(scope);
        Ok(self.sysndx)
    }
    pub fn leave_macro(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// look up a SET symbol honoring GBLx links, innermost scope only
    pub fn var_lookup(&self, id: IdIndex) -> Option<&SetSymbol> {
        let scope = self.scope();
        if scope.global_refs.contains(&id) {
            return self.globals.get(&id);
        }
        scope.vars.get(&id)
    }
    pub fn var_lookup_mut(&mut self, id: IdIndex) -> Option<&mut SetSymbol> {
        let global = self.scope().global_refs.contains(&id);
        if global {
            return self.globals.get_mut(&id);
        }
        self.scope_mut().vars.get_mut(&id)
    }
    /// declare a local SET symbol, false when the type clashes (E025)
    pub fn declare_local(&mut self, id: IdIndex, typ: VarType, scalar: bool, location: lsp::Location) -> bool {
        let scope = self.scope_mut();
        if let Some(existing) = scope.vars.get(&id) {
            return existing.var_type() == typ;
        }
        scope.vars.insert(id,SetSymbol::new(id,typ,false,scalar,location));
        true
    }
    /// declare or link a global SET symbol, false when the type clashes (E025)
    pub fn declare_global(&mut self, id: IdIndex, typ: VarType, scalar: bool, location: lsp::Location) -> bool {
        if let Some(existing) = self.globals.get(&id) {
            if existing.var_type() != typ {
                return false;
            }
        } else {
            self.globals.insert(id,SetSymbol::new(id,typ,true,scalar,location));
        }
        self.scope_mut().global_refs.insert(id);
        true
    }
    /// Implicit declaration when a SETx targets an undeclared name.
    pub fn declare_implicit(&mut self, id: IdIndex, typ: VarType, location: lsp::Location) {
        let scope = self.scope_mut();
        if !scope.global_refs.contains(&id) && !scope.vars.contains_key(&id) {
            scope.vars.insert(id,SetSymbol::new(id,typ,false,true,location));
        }
    }
    /// macro parameter text, if the name is a parameter of the current scope
    pub fn param_lookup(&self, id: IdIndex) -> Option<&String> {
        self.scope().params.get(&id)
    }

    /// read a system variable as text
    pub fn system_variable(&self, name: &str, subscript: Option<usize>) -> Option<String> {
        let scope = self.scope();
        match name.to_uppercase().as_str() {
            "SYSNDX" => Some(Self::sysndx_str(scope.sysndx)),
            "SYSECT" => Some(scope.sysect.clone()),
            "SYSLOC" => Some(scope.sysloc.clone()),
            "SYSSTYP" => Some(scope.sysstyp.clone()),
            "SYSNEST" => Some(scope.sysnest.to_string()),
            "SYSPARM" => Some(self.sysparm.clone()),
            "SYSTEM_ID" => Some(self.system_id.clone()),
            "SYSLIST" => {
                let n = subscript.unwrap_or(0);
                Some(scope.syslist.get(n).cloned().unwrap_or_default())
            },
            "SYSMAC" => {
                // SYSMAC(0) is the current macro, higher subscripts walk out
                let n = subscript.unwrap_or(0);
                let macro_scopes: Vec<&CodeScope> = self.scopes.iter().rev().filter(|s| s.is_macro).collect();
                match macro_scopes.get(n) {
                    Some(s) => s.macro_name.map(|id| self.ids.resolve(id).to_string()),
                    None => Some("OPEN CODE".to_string())
                }
            },
            _ => None
        }
    }
    /// number attribute of &SYSLIST
    pub fn syslist_count(&self) -> i32 {
        (self.scope().syslist.len().max(1) - 1) as i32
    }
}

#[cfg(test)]
mod context_test;
