//! # Ordinary assembly context
//!
//! Sections, location counters, ordinary symbols, the USING table and the
//! literal pool, plus the forward-reference resolution engine driving the
//! dependency tables.  Mutation of symbols and spaces happens only here, so
//! the invariants hold: a symbol is assigned at most once and a space resolves
//! at most once.

use std::collections::{HashMap,HashSet,VecDeque};
use lsp_types as lsp;
use super::ids::{IdIndex,IdStorage};
use crate::diagnostics::diag;
use crate::expressions::mach::{MachExpr,SymbolQuery,SymbolRef,expect_abs};
use crate::expressions::Value;

pub mod address;
pub mod symbol;
pub mod section;
pub mod dependency;
pub mod literals;
pub mod using;

#[cfg(test)]
mod tests;

use address::{Address,Alignment,SectionId,SpaceArena,SpaceId};
use dependency::{Dependant,DependencyRecord,EvalCtx,ResolveAction,SymbolDependencyTables};
use section::{Section,SectionKind};
use symbol::{AttrKind,OrdinarySymbol,SymbolAttributes,SymbolValue};

/// translate an EQU type-attribute value (an EBCDIC weight) back to its letter
fn type_char_from(v: i32) -> char {
    let byte = (v & 0xFF) as u8;
    match byte {
        0xC1..=0xC9 => (b'A' + byte - 0xC1) as char,
        0xD1..=0xD9 => (b'J' + byte - 0xD1) as char,
        0xE2..=0xE9 => (b'S' + byte - 0xE2) as char,
        0xF0..=0xF9 => (b'0' + byte - 0xF0) as char,
        _ => 'U'
    }
}

pub struct OrdinaryAssemblyContext {
    symbols: HashMap<IdIndex,OrdinarySymbol>,
    symbol_order: Vec<IdIndex>,
    pub sections: Vec<Section>,
    pub externals: HashMap<IdIndex,lsp::Location>,
    active_section: Option<SectionId>,
    pub spaces: SpaceArena,
    pub deps: SymbolDependencyTables,
    pub usings: using::UsingTable,
    pub literals: literals::LiteralPool,
    /// attributes of defined symbols still awaiting resolution
    pending_attrs: HashSet<(IdIndex,AttrKind)>
}

impl SymbolQuery for OrdinaryAssemblyContext {
    fn value_of(&self, id: IdIndex) -> Option<SymbolValue> {
        if let Some(sym) = self.symbols.get(&id) {
            return Some(sym.value.clone());
        }
        if self.externals.contains_key(&id) {
            return Some(SymbolValue::Reloc(Address::external(id)));
        }
        None
    }
    fn attr_of(&self, id: IdIndex, attr: AttrKind) -> Option<i32> {
        if attr == AttrKind::D {
            return Some(self.is_defined(id) as i32);
        }
        if self.pending_attrs.contains(&(id,attr)) {
            return None;
        }
        let sym = self.symbols.get(&id)?;
        if !sym.defined() {
            return None;
        }
        match attr {
            AttrKind::L => Some(sym.attrs.l),
            AttrKind::S => Some(sym.attrs.s),
            AttrKind::I => Some(sym.attrs.i),
            AttrKind::P => Some(sym.attrs.p),
            AttrKind::T => Some(sym.attrs.t as i32),
            _ => None
        }
    }
    fn is_defined(&self, id: IdIndex) -> bool {
        match self.symbols.get(&id) {
            Some(sym) => sym.defined(),
            None => self.externals.contains_key(&id)
        }
    }
    fn arena(&self) -> &SpaceArena {
        &self.spaces
    }
}

impl OrdinaryAssemblyContext {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            symbol_order: Vec::new(),
            sections: Vec::new(),
            externals: HashMap::new(),
            active_section: None,
            spaces: SpaceArena::new(),
            deps: SymbolDependencyTables::new(),
            usings: using::UsingTable::new(),
            literals: literals::LiteralPool::new(),
            pending_attrs: HashSet::new()
        }
    }

    pub fn symbol(&self, id: IdIndex) -> Option<&OrdinarySymbol> {
        self.symbols.get(&id)
    }
    /// symbols in definition order
    pub fn symbols_in_order(&self) -> Vec<&OrdinarySymbol> {
        self.symbol_order.iter().filter_map(|id| self.symbols.get(id)).collect()
    }
    pub fn active_section(&self) -> Option<&Section> {
        self.active_section.map(|id| &self.sections[id.0 as usize])
    }
    /// the current location counter address, if a section is active
    pub fn current_address(&self) -> Option<Address> {
        self.active_section().map(|s| s.active().current.normalize(&self.spaces))
    }
    /// capture the evaluation context for a dependency added now
    pub fn eval_ctx(&self, opcode_gen: usize, unique_id: usize) -> EvalCtx {
        EvalCtx {
            loctr: self.current_address(),
            literal_gen: self.literals.generation(),
            unique_id,
            opcode_gen,
            active_using: self.usings.state_id()
        }
    }

    /// Start or resume a section.  Section names share a namespace with
    /// externals and ordinary symbols; a clash is `E031`.
    pub fn ensure_section(&mut self, name: IdIndex, kind: SectionKind,
        location: lsp::Location, diags: &mut Vec<lsp::Diagnostic>) -> Option<SectionId>
    {
        if let Some(existing) = self.sections.iter().find(|s| s.name == name) {
            if existing.kind == kind {
                let id = existing.id;
                self.active_section = Some(id);
                return Some(id);
            }
            diags.push(diag(location.range,"E031","symbol already names an incompatible section"));
            return None;
        }
        if self.externals.contains_key(&name) || self.symbols.contains_key(&name) {
            diags.push(diag(location.range,"E031","section name clashes with an existing symbol"));
            return None;
        }
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(Section::new(name,kind,id,location.clone()));
        self.active_section = Some(id);
        // the section name becomes an ordinary symbol addressing its start
        let attrs = SymbolAttributes::with_type_length('J',1);
        self.define_symbol(name,SymbolValue::Reloc(Address::in_section(id,0)),attrs,location,diags);
        Some(id)
    }
    /// the unnamed section statements fall into before any CSECT
    pub fn ensure_private_section(&mut self, ids: &mut IdStorage, location: lsp::Location) {
        if self.active_section.is_none() {
            let name = ids.intern(" PRIVATE");
            if let Some(existing) = self.sections.iter().find(|s| s.name == name) {
                self.active_section = Some(existing.id);
                return;
            }
            let id = SectionId(self.sections.len() as u32);
            self.sections.push(Section::new(name,SectionKind::Executable,id,location));
            self.active_section = Some(id);
        }
    }
    pub fn switch_loctr(&mut self, name: IdIndex) -> bool {
        let arena = &mut self.spaces;
        match self.active_section {
            Some(id) => {
                self.sections[id.0 as usize].switch_loctr(name,arena);
                true
            },
            None => false
        }
    }
    /// declare EXTRN/WXTRN, duplicates against sections and symbols are `E031`
    pub fn add_external(&mut self, name: IdIndex, location: lsp::Location, diags: &mut Vec<lsp::Diagnostic>) {
        if self.sections.iter().any(|s| s.name == name) || self.symbols.contains_key(&name) {
            diags.push(diag(location.range,"E031","external name clashes with an existing symbol"));
            return;
        }
        if self.externals.insert(name,location.clone()).is_some() {
            diags.push(diag(location.range,"E031","duplicate external declaration"));
        }
    }

    /// Define an ordinary symbol.  A second assignment is `E043` and the
    /// original definition stays in force.
    pub fn define_symbol(&mut self, id: IdIndex, value: SymbolValue, attrs: SymbolAttributes,
        location: lsp::Location, diags: &mut Vec<lsp::Diagnostic>) -> bool
    {
        if let Some(existing) = self.symbols.get(&id) {
            if existing.defined() {
                diags.push(diag(location.range,"E043","symbol already defined"));
                return false;
            }
        }
        if self.externals.contains_key(&id) {
            diags.push(diag(location.range,"E031","symbol already declared external"));
            return false;
        }
        if !self.symbols.contains_key(&id) {
            self.symbol_order.push(id);
        }
        self.symbols.insert(id,OrdinarySymbol { id, value, attrs, location });
        self.notify_defined(Dependant::Symbol(id),diags);
        true
    }
    /// mark one attribute of a symbol as pending until a dependency resolves it
    pub fn mark_attr_pending(&mut self, id: IdIndex, attr: AttrKind) {
        self.pending_attrs.insert((id,attr));
    }
    fn set_symbol_attr(&mut self, id: IdIndex, attr: AttrKind, v: i32) {
        if let Some(sym) = self.symbols.get_mut(&id) {
            match attr {
                AttrKind::L => sym.attrs.l = v,
                AttrKind::S => sym.attrs.s = v,
                AttrKind::I => sym.attrs.i = v,
                AttrKind::P => sym.attrs.p = v,
                AttrKind::T => sym.attrs.t = type_char_from(v),
                _ => {}
            }
        }
        self.pending_attrs.remove(&(id,attr));
    }

    /// advance the active location counter, creating the private section on demand
    pub fn reserve(&mut self, ids: &mut IdStorage, length: i32, align: Alignment,
        location: lsp::Location) -> Address
    {
        self.ensure_private_section(ids,location);
        let id = self.active_section.expect("section exists");
        let section = &mut self.sections[id.0 as usize];
        section.reserve(length,align,&mut self.spaces)
    }
    /// advance by an unknown length, the caller registers the space dependency
    pub fn reserve_unknown(&mut self, ids: &mut IdStorage, align: Alignment,
        location: lsp::Location) -> (Address,SpaceId)
    {
        self.ensure_private_section(ids,location);
        let id = self.active_section.expect("section exists");
        let section = &mut self.sections[id.0 as usize];
        section.reserve_unknown(align,&mut self.spaces)
    }
    /// `ORG target` or `ORG` to the section maximum
    pub fn org(&mut self, target: Option<Address>, location: lsp::Location, diags: &mut Vec<lsp::Diagnostic>) {
        let active = match self.active_section {
            Some(id) => id,
            None => {
                diags.push(diag(location.range,"E031","ORG outside of a section"));
                return;
            }
        };
        let arena = &self.spaces;
        let section = &mut self.sections[active.0 as usize];
        match target {
            Some(addr) => {
                let norm = addr.normalize(arena);
                let ok = norm.bases.len() == 1 && norm.bases[0] == (address::Base::Section(active),1);
                if !ok {
                    diags.push(diag(location.range,"E032","ORG target must be in the active section"));
                    return;
                }
                let loctr = section.active_mut();
                loctr.current = norm;
                if loctr.current.spaces.is_empty() && loctr.current.offset > loctr.max_offset {
                    loctr.max_offset = loctr.current.offset;
                }
            },
            None => {
                let max = section.active().max_offset;
                let loctr = section.active_mut();
                loctr.current = Address::in_section(active,max);
            }
        }
    }

    /// Register a deferred resolution.  Returns `false` when the dependency
    /// would close a cycle; the target is then defaulted and `E033`/`E053`
    /// raised at the record's location.
    pub fn add_dependency(&mut self, target: Dependant, action: ResolveAction,
        ctx: EvalCtx, location: lsp::Location, diags: &mut Vec<lsp::Diagnostic>) -> bool
    {
        let pending = self.action_pending(&action);
        let record = DependencyRecord { target, action, pending: pending.clone(), ctx, location: location.clone() };
        if pending.is_empty() {
            self.resolve_record(record,diags);
            return true;
        }
        if self.deps.introduces_cycle(&target,&pending) {
            let code = match target {
                Dependant::Space(_) => "E053",
                _ => "E033"
            };
            diags.push(diag(location.range,code,"cyclic symbol definition"));
            self.default_resolve(target,diags);
            return false;
        }
        self.deps.insert(record);
        true
    }

    fn action_pending(&self, action: &ResolveAction) -> Vec<Dependant> {
        let mut refs: Vec<SymbolRef> = Vec::new();
        let mut push_expr = |expr: &MachExpr, refs: &mut Vec<SymbolRef>| {
            for r in expr.dependencies(self) {
                if !refs.contains(&r) {
                    refs.push(r);
                }
            }
        };
        match action {
            ResolveAction::SymbolDef { expr, length, scale, type_attr, prog_attr } => {
                push_expr(expr,&mut refs);
                for opt in [length,scale,type_attr,prog_attr].into_iter().flatten() {
                    push_expr(opt,&mut refs);
                }
            },
            ResolveAction::SpaceLength { expr } => push_expr(expr,&mut refs),
            ResolveAction::SymbolAttrOnly { expr } => push_expr(expr,&mut refs)
        }
        refs.into_iter().map(|r| match r {
            SymbolRef::Value(id) => Dependant::Symbol(id),
            SymbolRef::Attr(id,attr) => Dependant::SymbolAttr(id,attr)
        }).collect()
    }

    fn dependant_satisfied(&self, dep: &Dependant) -> bool {
        match dep {
            Dependant::Symbol(id) => self.is_defined(*id),
            Dependant::SymbolAttr(id,attr) => self.attr_of(*id,*attr).is_some(),
            Dependant::Space(id) => self.spaces.is_resolved(*id)
        }
    }

    /// Sweep the tables after new state became known, resolving every record
    /// whose dependency set emptied, to fixpoint in BFS order.
    pub fn notify_defined(&mut self, first: Dependant, diags: &mut Vec<lsp::Diagnostic>) {
        let mut queue = VecDeque::from([first]);
        while let Some(defined) = queue.pop_front() {
            let released = self.deps.take_waiting(&defined);
            for idx in released {
                let still: Vec<Dependant> = match self.deps.get_record(idx) {
                    Some(rec) => rec.pending.iter().filter(|d| !self.dependant_satisfied(d)).cloned().collect(),
                    None => continue
                };
                if still.is_empty() {
                    if let Some(rec) = self.deps.take_record(idx) {
                        let target = rec.target;
                        self.resolve_record(rec,diags);
                        queue.push_back(target);
                    }
                } else {
                    self.deps.requeue(idx,still);
                }
            }
        }
    }

    /// evaluate a record and emit its target, diagnostics anchored at the source
    fn resolve_record(&mut self, rec: DependencyRecord, diags: &mut Vec<lsp::Diagnostic>) {
        let loctr = rec.ctx.loctr.clone();
        match rec.action {
            ResolveAction::SymbolDef { expr, length, scale, type_attr, prog_attr } => {
                let id = match rec.target {
                    Dependant::Symbol(id) => id,
                    _ => return
                };
                let value = match expr.evaluate(self,loctr.as_ref()) {
                    Ok(Value::Abs(v)) => SymbolValue::Absolute(v),
                    Ok(Value::Reloc(addr)) => SymbolValue::Reloc(addr),
                    Err(e) => {
                        diags.push(diag(rec.location.range,e.code,&e.message));
                        SymbolValue::Absolute(0)
                    }
                };
                let mut attrs = SymbolAttributes::equ_default();
                attrs.l = match &length {
                    Some(expr) => self.eval_attr_operand(expr,loctr.as_ref(),&rec.location,diags).unwrap_or(1),
                    None => self.implicit_length(&expr)
                };
                if let Some(expr) = &scale {
                    attrs.s = self.eval_attr_operand(expr,loctr.as_ref(),&rec.location,diags).unwrap_or(0);
                }
                if let Some(expr) = &type_attr {
                    if let Some(v) = self.eval_attr_operand(expr,loctr.as_ref(),&rec.location,diags) {
                        attrs.t = type_char_from(v);
                    }
                }
                if let Some(expr) = &prog_attr {
                    attrs.p = self.eval_attr_operand(expr,loctr.as_ref(),&rec.location,diags).unwrap_or(0);
                }
                self.define_symbol(id,value,attrs,rec.location,diags);
            },
            ResolveAction::SpaceLength { expr } => {
                let space = match rec.target {
                    Dependant::Space(id) => id,
                    _ => return
                };
                match expect_abs(&expr,self,loctr.as_ref()) {
                    Ok(v) => {
                        self.spaces.resolve_length(space,v);
                    },
                    Err(e) => {
                        diags.push(diag(rec.location.range,e.code,&e.message));
                        self.spaces.resolve_length(space,1);
                    }
                }
                self.notify_defined(Dependant::Space(space),diags);
            },
            ResolveAction::SymbolAttrOnly { expr } => {
                let (id,attr) = match rec.target {
                    Dependant::SymbolAttr(id,attr) => (id,attr),
                    _ => return
                };
                match expect_abs(&expr,self,loctr.as_ref()) {
                    Ok(v) => self.set_symbol_attr(id,attr,v),
                    Err(e) => {
                        diags.push(diag(rec.location.range,e.code,&e.message));
                        self.set_symbol_attr(id,attr,1);
                    }
                }
                self.notify_defined(Dependant::SymbolAttr(id,attr),diags);
            }
        }
    }

    fn eval_attr_operand(&self, expr: &MachExpr, loctr: Option<&Address>,
        location: &lsp::Location, diags: &mut Vec<lsp::Diagnostic>) -> Option<i32>
    {
        match expect_abs(expr,self,loctr) {
            Ok(v) => Some(v),
            Err(e) => {
                diags.push(diag(location.range,e.code,&e.message));
                None
            }
        }
    }

    /// default length attribute: the length of the leftmost term
    fn implicit_length(&self, expr: &MachExpr) -> i32 {
        match expr.leading_term() {
            MachExpr::Sym(id) => self.attr_of(*id,AttrKind::L).unwrap_or(1),
            _ => 1
        }
    }

    /// break a cycle or fill an end-of-analysis default: value 0, length 1,
    /// scale 0; spaces resolve to length 1
    pub fn default_resolve(&mut self, target: Dependant, diags: &mut Vec<lsp::Diagnostic>) {
        match target {
            Dependant::Symbol(id) => {
                if !self.is_defined(id) {
                    let loc = self.symbols.get(&id).map(|s| s.location.clone())
                        .unwrap_or_else(|| lsp::Location::new(lsp::Url::parse("untitled:Untitled-1").expect("url parsing failed"),lsp::Range::default()));
                    if !self.symbols.contains_key(&id) {
                        self.symbol_order.push(id);
                    }
                    self.symbols.insert(id,OrdinarySymbol {
                        id,
                        value: SymbolValue::Absolute(0),
                        attrs: SymbolAttributes::undefined(),
                        location: loc
                    });
                }
                self.notify_defined(Dependant::Symbol(id),diags);
            },
            Dependant::SymbolAttr(id,attr) => {
                self.set_symbol_attr(id,attr,if attr == AttrKind::L {1} else {0});
                self.notify_defined(Dependant::SymbolAttr(id,attr),diags);
            },
            Dependant::Space(id) => {
                self.spaces.resolve_length(id,1);
                self.notify_defined(Dependant::Space(id),diags);
            }
        }
    }

    /// detect and break strongly connected space graphs
    pub fn check_loctr_cycle(&mut self, diags: &mut Vec<lsp::Diagnostic>) {
        for target in self.deps.space_targets() {
            let pending = match self.deps.record_for(&target) {
                Some(rec) => rec.pending.clone(),
                None => continue
            };
            if self.deps.introduces_cycle(&target,&pending) {
                if let Some(rec) = self.deps.record_for(&target).cloned() {
                    diags.push(diag(rec.location.range,"E053","cyclic location counter dependency"));
                }
                self.default_resolve(target,diags);
            }
        }
    }

    /// Finalize at the end of analysis.  References with no hope of a
    /// definition report `E010` and take default values; the statements that
    /// waited on them then evaluate normally, so a postponed `EQU NEVER+1`
    /// still yields a value.
    pub fn collect_postponed(&mut self, ids: &IdStorage, diags: &mut Vec<lsp::Diagnostic>) {
        self.check_loctr_cycle(diags);
        loop {
            let snapshot = self.deps.records_snapshot();
            if snapshot.is_empty() {
                break;
            }
            let mut progressed = false;
            for rec in &snapshot {
                let unresolvable: Vec<Dependant> = rec.pending.iter()
                    .filter(|d| !self.dependant_satisfied(d) && self.deps.record_for(d).is_none())
                    .cloned()
                    .collect();
                if unresolvable.is_empty() {
                    continue;
                }
                let missing: Vec<String> = unresolvable.iter()
                    .filter_map(|d| match d {
                        Dependant::Symbol(id) | Dependant::SymbolAttr(id,_) => Some(ids.resolve(*id).to_string()),
                        _ => None
                    })
                    .collect();
                if !missing.is_empty() {
                    diags.push(diag(rec.location.range,"E010",
                        &format!("undefined symbol {}",missing.join(", "))));
                }
                for dep in unresolvable {
                    self.default_resolve(dep,diags);
                }
                progressed = true;
                break;
            }
            if !progressed {
                // only mutually waiting records remain
                let remaining = self.deps.drain_remaining();
                for rec in remaining {
                    self.default_resolve(rec.target,diags);
                }
                break;
            }
        }
    }
}
