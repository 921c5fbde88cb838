//! The USING table.
//!
//! An ordered stack of active registrations.  `PUSH USING` and `POP USING`
//! save and restore the whole table; labeled USINGs are dropped by label.
//! Since no code is generated the table serves diagnostics and hover.

use lsp_types as lsp;
use super::super::ids::IdIndex;
use super::address::Address;

#[derive(Clone)]
pub struct UsingEntry {
    pub label: Option<IdIndex>,
    pub base: Address,
    pub regs: Vec<u8>,
    /// covered byte range, 4096 per base register unless limited
    pub range: i32,
    pub location: lsp::Location
}

pub struct UsingTable {
    active: Vec<UsingEntry>,
    stack: Vec<Vec<UsingEntry>>
}

impl UsingTable {
    pub fn new() -> Self {
        Self { active: Vec::new(), stack: Vec::new() }
    }
    pub fn add(&mut self, entry: UsingEntry) {
        // a labeled USING with the same label replaces the earlier one
        if let Some(label) = entry.label {
            self.active.retain(|u| u.label != Some(label));
        }
        self.active.push(entry);
    }
    /// drop by register, returns false when the register covered nothing
    pub fn drop_reg(&mut self, reg: u8) -> bool {
        let mut hit = false;
        for entry in self.active.iter_mut() {
            if entry.label.is_none() {
                let before = entry.regs.len();
                entry.regs.retain(|r| *r != reg);
                hit = hit || entry.regs.len() != before;
            }
        }
        self.active.retain(|u| u.label.is_some() || !u.regs.is_empty());
        hit
    }
    pub fn drop_label(&mut self, label: IdIndex) -> bool {
        let before = self.active.len();
        self.active.retain(|u| u.label != Some(label));
        self.active.len() != before
    }
    pub fn drop_all(&mut self) {
        self.active.clear();
    }
    pub fn push(&mut self) {
        self.stack.push(self.active.clone());
    }
    /// returns false on an unmatched POP
    pub fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some(saved) => {
                self.active = saved;
                true
            },
            None => false
        }
    }
    pub fn entries(&self) -> &[UsingEntry] {
        &self.active
    }
    /// depth used to tag dependency evaluation contexts
    pub fn state_id(&self) -> usize {
        self.active.len() + self.stack.len() * 256
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ordinary::address::SectionId;

    fn loc() -> lsp::Location {
        lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
    }

    fn entry(regs: Vec<u8>) -> UsingEntry {
        UsingEntry { label: None, base: Address::in_section(SectionId(0),0), regs, range: 4096, location: loc() }
    }

    #[test]
    fn drop_removes_register() {
        let mut table = UsingTable::new();
        table.add(entry(vec![12,13]));
        assert!(table.drop_reg(12));
        assert!(!table.drop_reg(12));
        assert_eq!(table.entries()[0].regs,vec![13]);
    }

    #[test]
    fn push_pop_restores() {
        let mut table = UsingTable::new();
        table.add(entry(vec![12]));
        table.push();
        table.drop_all();
        assert!(table.entries().is_empty());
        assert!(table.pop());
        assert_eq!(table.entries().len(),1);
        assert!(!table.pop());
    }
}
