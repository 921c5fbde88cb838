//! Forward-reference bookkeeping.
//!
//! A deferred computation is keyed by a dependant: a symbol, a symbol
//! attribute, or a space.  Records keep the expression to re-evaluate and the
//! evaluation context captured when the dependency was added; resolution
//! happens in `OrdinaryAssemblyContext` so symbol and space mutation stay in
//! one place.  Insertion order is preserved so end-of-analysis sweeps emit
//! diagnostics deterministically.

use std::collections::HashMap;
use lsp_types as lsp;
use super::super::ids::IdIndex;
use super::address::{Address,SpaceId};
use super::symbol::AttrKind;
use crate::expressions::mach::MachExpr;

#[derive(Clone,Copy,PartialEq,Eq,Hash,Debug)]
pub enum Dependant {
    Symbol(IdIndex),
    SymbolAttr(IdIndex,AttrKind),
    Space(SpaceId)
}

impl Dependant {
    /// do two dependants refer to overlapping state, e.g. a symbol and its attribute
    pub fn overlaps(&self, other: &Dependant) -> bool {
        if self == other {
            return true;
        }
        match (self,other) {
            (Self::Symbol(a),Self::SymbolAttr(b,_)) => a == b,
            (Self::SymbolAttr(a,_),Self::Symbol(b)) => a == b,
            _ => false
        }
    }
}

/// evaluation context captured at the time a dependency is added
#[derive(Clone)]
pub struct EvalCtx {
    pub loctr: Option<Address>,
    pub literal_gen: usize,
    pub unique_id: usize,
    pub opcode_gen: usize,
    pub active_using: usize
}

impl EvalCtx {
    pub fn empty() -> Self {
        Self { loctr: None, literal_gen: 0, unique_id: 0, opcode_gen: 0, active_using: 0 }
    }
}

/// what to do once the pending references are satisfied
#[derive(Clone)]
pub enum ResolveAction {
    /// define the target symbol from an EQU-style expression
    SymbolDef {
        expr: MachExpr,
        length: Option<MachExpr>,
        scale: Option<MachExpr>,
        type_attr: Option<MachExpr>,
        prog_attr: Option<MachExpr>
    },
    /// resolve the target space to a byte length
    SpaceLength { expr: MachExpr },
    /// resolve one pending attribute of an already defined symbol
    SymbolAttrOnly { expr: MachExpr }
}

#[derive(Clone)]
pub struct DependencyRecord {
    pub target: Dependant,
    pub action: ResolveAction,
    pub pending: Vec<Dependant>,
    pub ctx: EvalCtx,
    pub location: lsp::Location
}

pub struct SymbolDependencyTables {
    records: Vec<Option<DependencyRecord>>,
    index: HashMap<Dependant,usize>,
    /// dependency to the indices of records waiting on it
    waiting: HashMap<Dependant,Vec<usize>>
}

impl SymbolDependencyTables {
    pub fn new() -> Self {
        Self { records: Vec::new(), index: HashMap::new(), waiting: HashMap::new() }
    }
    pub fn is_empty(&self) -> bool {
        self.records.iter().all(|r| r.is_none())
    }
    pub fn contains(&self, target: &Dependant) -> bool {
        self.index.contains_key(target)
    }
    pub fn insert(&mut self, record: DependencyRecord) {
        let idx = self.records.len();
        self.index.insert(record.target,idx);
        for dep in &record.pending {
            self.waiting.entry(*dep).or_default().push(idx);
        }
        self.records.push(Some(record));
    }
    /// the record that would define the given dependant, if any
    pub fn record_for(&self, dep: &Dependant) -> Option<&DependencyRecord> {
        if let Some(idx) = self.index.get(dep) {
            return self.records[*idx].as_ref();
        }
        // a symbol attribute is also satisfied by the symbol's own record
        if let Dependant::SymbolAttr(id,_) = dep {
            if let Some(idx) = self.index.get(&Dependant::Symbol(*id)) {
                return self.records[*idx].as_ref();
            }
        }
        None
    }
    /// would a record with this target and these pending references close a cycle
    pub fn introduces_cycle(&self, target: &Dependant, pending: &[Dependant]) -> bool {
        let mut stack: Vec<Dependant> = pending.to_vec();
        let mut visited: Vec<Dependant> = Vec::new();
        while let Some(dep) = stack.pop() {
            if dep.overlaps(target) {
                return true;
            }
            if visited.contains(&dep) {
                continue;
            }
            visited.push(dep);
            if let Some(rec) = self.record_for(&dep) {
                stack.extend(rec.pending.iter().cloned());
            }
        }
        false
    }
    /// record indices that were waiting on the dependant
    pub fn take_waiting(&mut self, dep: &Dependant) -> Vec<usize> {
        let mut ans = self.waiting.remove(dep).unwrap_or_default();
        // a defined symbol also releases records waiting on its attributes
        if let Dependant::Symbol(id) = dep {
            let attr_keys: Vec<Dependant> = self.waiting.keys()
                .filter(|k| matches!(k,Dependant::SymbolAttr(a,_) if a == id))
                .cloned().collect();
            for key in attr_keys {
                if let Some(more) = self.waiting.remove(&key) {
                    ans.extend(more);
                }
            }
        }
        ans.sort_unstable();
        ans.dedup();
        ans
    }
    /// re-register a record's remaining pending set
    pub fn requeue(&mut self, idx: usize, still_pending: Vec<Dependant>) {
        if let Some(rec) = self.records[idx].as_mut() {
            rec.pending = still_pending.clone();
        }
        for dep in still_pending {
            let entry = self.waiting.entry(dep).or_default();
            if !entry.contains(&idx) {
                entry.push(idx);
            }
        }
    }
    pub fn take_record(&mut self, idx: usize) -> Option<DependencyRecord> {
        let rec = self.records[idx].take();
        if let Some(rec) = &rec {
            self.index.remove(&rec.target);
        }
        rec
    }
    pub fn get_record(&self, idx: usize) -> Option<&DependencyRecord> {
        self.records.get(idx).and_then(|r| r.as_ref())
    }
    /// clones of the remaining records in insertion order
    pub fn records_snapshot(&self) -> Vec<DependencyRecord> {
        self.records.iter().flatten().cloned().collect()
    }
    /// drain every remaining record in insertion order
    pub fn drain_remaining(&mut self) -> Vec<DependencyRecord> {
        let mut ans = Vec::new();
        for slot in self.records.iter_mut() {
            if let Some(rec) = slot.take() {
                self.index.remove(&rec.target);
                ans.push(rec);
            }
        }
        self.waiting.clear();
        ans
    }
    /// targets of records that resolve spaces, used by location-counter cycle checks
    pub fn space_targets(&self) -> Vec<Dependant> {
        self.records.iter().flatten()
            .filter(|r| matches!(r.target,Dependant::Space(_)))
            .map(|r| r.target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ids::IdStorage;

    fn loc() -> lsp::Location {
        lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
    }

    fn record(target: Dependant, pending: Vec<Dependant>) -> DependencyRecord {
        DependencyRecord {
            target,
            action: ResolveAction::SymbolDef {
                expr: MachExpr::Num(0),
                length: None, scale: None, type_attr: None, prog_attr: None
            },
            pending,
            ctx: EvalCtx::empty(),
            location: loc()
        }
    }

    #[test]
    fn detects_direct_cycle() {
        let mut ids = IdStorage::new();
        let a = Dependant::Symbol(ids.intern("A"));
        let b = Dependant::Symbol(ids.intern("B"));
        let mut tables = SymbolDependencyTables::new();
        tables.insert(record(a,vec![b]));
        assert!(tables.introduces_cycle(&b,&[a]));
        assert!(!tables.introduces_cycle(&b,&[Dependant::Symbol(ids.intern("C"))]));
    }

    #[test]
    fn detects_cycle_through_attribute() {
        let mut ids = IdStorage::new();
        let a = ids.intern("A");
        let b = ids.intern("B");
        let mut tables = SymbolDependencyTables::new();
        tables.insert(record(Dependant::Symbol(a),vec![Dependant::SymbolAttr(b,AttrKind::L)]));
        assert!(tables.introduces_cycle(&Dependant::Symbol(b),&[Dependant::Symbol(a)]));
    }

    #[test]
    fn waiting_released_by_symbol_definition() {
        let mut ids = IdStorage::new();
        let a = Dependant::Symbol(ids.intern("A"));
        let b = ids.intern("B");
        let mut tables = SymbolDependencyTables::new();
        tables.insert(record(a,vec![Dependant::SymbolAttr(b,AttrKind::L)]));
        let released = tables.take_waiting(&Dependant::Symbol(b));
        assert_eq!(released.len(),1);
    }
}
