//! Sections and location counters.

use lsp_types as lsp;
use super::super::ids::IdIndex;
use super::address::{Address,Alignment,SectionId,SpaceArena,SpaceId,SpaceKind};

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum SectionKind {
    Executable,
    ReadOnly,
    Dummy,
    Common
}

/// A location counter within a section.  The current address carries the
/// section base plus any spaces created by statements with unknown lengths.
pub struct LocationCounter {
    pub name: IdIndex,
    pub current: Address,
    /// highest known offset reached in this counter
    pub max_offset: i32,
    /// the LOCTR_BEGIN space distinguishing this counter, none for the first
    pub begin_space: Option<SpaceId>
}

pub struct Section {
    pub name: IdIndex,
    pub kind: SectionKind,
    pub id: SectionId,
    pub location: lsp::Location,
    pub loctrs: Vec<LocationCounter>,
    pub active_loctr: usize
}

impl Section {
    pub fn new(name: IdIndex, kind: SectionKind, id: SectionId, location: lsp::Location) -> Self {
        let first = LocationCounter {
            name,
            current: Address::in_section(id,0),
            max_offset: 0,
            begin_space: None
        };
        Self { name, kind, id, location, loctrs: vec![first], active_loctr: 0 }
    }
    pub fn active(&self) -> &LocationCounter {
        &self.loctrs[self.active_loctr]
    }
    pub fn active_mut(&mut self) -> &mut LocationCounter {
        &mut self.loctrs[self.active_loctr]
    }
    /// switch to the named counter, creating it at the section's current end.
    /// A fresh counter begins behind every earlier counter, which is modeled
    /// by a LOCTR_BEGIN space.
    pub fn switch_loctr(&mut self, name: IdIndex, arena: &mut SpaceArena) {
        if let Some(idx) = self.loctrs.iter().position(|l| l.name == name) {
            self.active_loctr = idx;
            return;
        }
        let begin = arena.create(SpaceKind::LoctrBegin,super::address::NO_ALIGN,self.id);
        let mut current = Address::in_section(self.id,0);
        current.spaces.push((begin,1));
        self.loctrs.push(LocationCounter { name, current, max_offset: 0, begin_space: Some(begin) });
        self.active_loctr = self.loctrs.len()-1;
    }
    /// advance the active counter by a known length, honoring alignment
    pub fn reserve(&mut self, length: i32, align: Alignment, arena: &mut SpaceArena) -> Address {
        let id = self.id;
        let loctr = self.active_mut();
        let norm = loctr.current.normalize(arena);
        if norm.spaces.is_empty() {
            let boundary = align.boundary.max(1) as i32;
            let pad = (align.byte as i32 - norm.offset).rem_euclid(boundary);
            loctr.current = norm.plus_offset(pad);
        } else if align.boundary > 1 {
            let sp = arena.create(SpaceKind::Alignment,align,id);
            loctr.current = norm;
            loctr.current.spaces.push((sp,1));
            loctr.current = loctr.current.normalize(arena);
        } else {
            loctr.current = norm;
        }
        let placed = loctr.current.clone();
        loctr.current = loctr.current.plus_offset(length);
        if loctr.current.spaces.is_empty() && loctr.current.offset > loctr.max_offset {
            loctr.max_offset = loctr.current.offset;
        }
        placed
    }
    /// advance by an unknown length, returning the created space
    pub fn reserve_unknown(&mut self, align: Alignment, arena: &mut SpaceArena) -> (Address,SpaceId) {
        let placed = self.reserve(0,align,arena);
        let sp = arena.create(SpaceKind::Ordinary,align,self.id);
        let loctr = self.active_mut();
        loctr.current.spaces.push((sp,1));
        loctr.current = loctr.current.normalize(arena);
        (placed,sp)
    }
}
