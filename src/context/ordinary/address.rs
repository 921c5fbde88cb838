//! Relocatable addresses and spaces.
//!
//! An address is an offset plus signed combinations of bases (sections or
//! external symbols) and spaces (statically unknown lengths).  Spaces live in
//! an arena owned by the ordinary assembly context; addresses refer to them by
//! id, so an address captured by a dependency stays valid however the
//! originating location counter moves afterwards.

use super::super::ids::IdIndex;

#[derive(Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
pub struct SectionId(pub u32);

#[derive(Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
pub struct SpaceId(pub u32);

#[derive(Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
pub enum Base {
    Section(SectionId),
    External(IdIndex)
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum SpaceKind {
    Ordinary,
    LoctrBegin,
    LoctrUnknown,
    LoctrSet,
    LoctrMax,
    Alignment
}

/// alignment requirement: `boundary` bytes (power of two), then `byte` offset
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct Alignment {
    pub boundary: u32,
    pub byte: u32
}

pub const NO_ALIGN: Alignment = Alignment { boundary: 1, byte: 0 };
pub const HALFWORD: Alignment = Alignment { boundary: 2, byte: 0 };
pub const FULLWORD: Alignment = Alignment { boundary: 4, byte: 0 };
pub const DOUBLEWORD: Alignment = Alignment { boundary: 8, byte: 0 };

pub struct Space {
    pub kind: SpaceKind,
    pub align: Alignment,
    pub owner: SectionId,
    pub resolved: bool,
    /// valid when resolved to a constant
    pub length: i32,
    /// valid when resolved to other spaces
    pub resolved_ptrs: Vec<(SpaceId,i32)>
}

pub struct SpaceArena {
    spaces: Vec<Space>
}

impl SpaceArena {
    pub fn new() -> Self {
        Self { spaces: Vec::new() }
    }
    pub fn create(&mut self, kind: SpaceKind, align: Alignment, owner: SectionId) -> SpaceId {
        self.spaces.push(Space { kind, align, owner, resolved: false, length: 0, resolved_ptrs: Vec::new() });
        SpaceId(self.spaces.len() as u32 - 1)
    }
    pub fn get(&self, id: SpaceId) -> &Space {
        &self.spaces[id.0 as usize]
    }
    pub fn is_resolved(&self, id: SpaceId) -> bool {
        self.spaces[id.0 as usize].resolved
    }
    /// Resolve to a constant length.  A space resolves at most once; later
    /// attempts are ignored so the false-to-true transition is preserved.
    pub fn resolve_length(&mut self, id: SpaceId, length: i32) -> bool {
        let space = &mut self.spaces[id.0 as usize];
        if space.resolved {
            return false;
        }
        space.resolved = true;
        space.length = length.max(0);
        true
    }
    /// resolve to a combination of other spaces plus a constant
    pub fn resolve_ptrs(&mut self, id: SpaceId, length: i32, ptrs: Vec<(SpaceId,i32)>) -> bool {
        let space = &mut self.spaces[id.0 as usize];
        if space.resolved {
            return false;
        }
        space.resolved = true;
        space.length = length.max(0);
        space.resolved_ptrs = ptrs;
        true
    }
    pub fn len(&self) -> usize {
        self.spaces.len()
    }
}

#[derive(Clone,PartialEq,Eq,Debug)]
pub struct Address {
    pub offset: i32,
    pub bases: Vec<(Base,i32)>,
    pub spaces: Vec<(SpaceId,i32)>
}

fn merge<K: Ord + Copy>(lhs: &[(K,i32)], rhs: &[(K,i32)], rhs_factor: i32) -> Vec<(K,i32)> {
    let mut ans: Vec<(K,i32)> = Vec::with_capacity(lhs.len()+rhs.len());
    let mut li = 0;
    let mut ri = 0;
    while li < lhs.len() || ri < rhs.len() {
        let take_left = match (lhs.get(li),rhs.get(ri)) {
            (Some(l),Some(r)) => l.0 <= r.0,
            (Some(_),None) => true,
            _ => false
        };
        let (key,count) = if take_left && ri < rhs.len() && lhs[li].0 == rhs[ri].0 {
            let pair = (lhs[li].0, lhs[li].1 + rhs[ri].1 * rhs_factor);
            li += 1;
            ri += 1;
            pair
        } else if take_left {
            let pair = lhs[li];
            li += 1;
            pair
        } else {
            let pair = (rhs[ri].0, rhs[ri].1 * rhs_factor);
            ri += 1;
            pair
        };
        if count != 0 {
            ans.push((key,count));
        }
    }
    ans
}

impl Address {
    pub fn absolute(offset: i32) -> Self {
        Self { offset, bases: Vec::new(), spaces: Vec::new() }
    }
    pub fn in_section(section: SectionId, offset: i32) -> Self {
        Self { offset, bases: vec![(Base::Section(section),1)], spaces: Vec::new() }
    }
    pub fn external(sym: IdIndex) -> Self {
        Self { offset: 0, bases: vec![(Base::External(sym),1)], spaces: Vec::new() }
    }
    /// canonical sum: bases and spaces are kept sorted, zero coefficients dropped
    pub fn plus(&self, other: &Address) -> Address {
        Address {
            offset: self.offset.wrapping_add(other.offset),
            bases: merge(&self.bases,&other.bases,1),
            spaces: merge(&self.spaces,&other.spaces,1)
        }
    }
    pub fn minus(&self, other: &Address) -> Address {
        Address {
            offset: self.offset.wrapping_sub(other.offset),
            bases: merge(&self.bases,&other.bases,-1),
            spaces: merge(&self.spaces,&other.spaces,-1)
        }
    }
    pub fn plus_offset(&self, off: i32) -> Address {
        let mut ans = self.clone();
        ans.offset = ans.offset.wrapping_add(off);
        ans
    }
    /// substitute resolved spaces, repeating until only unresolved ones remain
    pub fn normalize(&self, arena: &SpaceArena) -> Address {
        let mut ans = self.clone();
        loop {
            let mut changed = false;
            let mut offset = ans.offset;
            let mut spaces: Vec<(SpaceId,i32)> = Vec::new();
            for (id,count) in &ans.spaces {
                let space = arena.get(*id);
                if space.resolved {
                    changed = true;
                    offset = offset.wrapping_add(space.length * count);
                    if !space.resolved_ptrs.is_empty() {
                        spaces = merge(&spaces,&space.resolved_ptrs,*count);
                    }
                } else {
                    spaces = merge(&spaces,&[(*id,*count)],1);
                }
            }
            ans.offset = offset;
            ans.spaces = spaces;
            if !changed {
                return ans;
            }
        }
    }
    pub fn is_absolute(&self, arena: &SpaceArena) -> bool {
        let norm = self.normalize(arena);
        norm.bases.is_empty() && norm.spaces.is_empty()
    }
    /// one base with coefficient one
    pub fn is_simple(&self) -> bool {
        self.bases.len() == 1 && self.bases[0].1 == 1
    }
    pub fn unresolved_spaces(&self, arena: &SpaceArena) -> Vec<SpaceId> {
        self.normalize(arena).spaces.iter().map(|(id,_)| *id).collect()
    }
    fn first_loctr_begin(&self, arena: &SpaceArena) -> Option<SpaceId> {
        self.spaces.iter()
            .find(|(id,_)| arena.get(*id).kind == SpaceKind::LoctrBegin)
            .map(|(id,_)| *id)
    }
    /// same single base and coinciding first LOCTR_BEGIN space (or neither)
    pub fn in_same_loctr(&self, other: &Address, arena: &SpaceArena) -> bool {
        let a = self.normalize(arena);
        let b = other.normalize(arena);
        if !a.is_simple() || !b.is_simple() || a.bases[0].0 != b.bases[0].0 {
            return false;
        }
        a.first_loctr_begin(arena) == b.first_loctr_begin(arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocatable_difference_cancels_base() {
        let sect = SectionId(0);
        let a = Address::in_section(sect,8);
        let b = Address::in_section(sect,2);
        let diff = a.minus(&b);
        assert!(diff.bases.is_empty());
        assert_eq!(diff.offset,6);
    }

    #[test]
    fn zero_coefficients_dropped() {
        let a = Address::in_section(SectionId(0),0);
        let b = Address::in_section(SectionId(1),0);
        let sum = a.plus(&b).minus(&a).minus(&b);
        assert!(sum.bases.is_empty());
        assert_eq!(sum.offset,0);
    }

    #[test]
    fn space_resolution_substitutes() {
        let mut arena = SpaceArena::new();
        let owner = SectionId(0);
        let sp = arena.create(SpaceKind::Ordinary,NO_ALIGN,owner);
        let mut addr = Address::in_section(owner,4);
        addr.spaces.push((sp,2));
        assert!(!addr.is_absolute(&arena));
        arena.resolve_length(sp,3);
        let norm = addr.normalize(&arena);
        assert_eq!(norm.offset,10);
        assert!(norm.spaces.is_empty());
    }

    #[test]
    fn space_resolves_only_once() {
        let mut arena = SpaceArena::new();
        let sp = arena.create(SpaceKind::Ordinary,NO_ALIGN,SectionId(0));
        assert!(arena.resolve_length(sp,5));
        assert!(!arena.resolve_length(sp,7));
        assert_eq!(arena.get(sp).length,5);
    }

    #[test]
    fn loctr_identity_tracks_loctr_begin() {
        let mut arena = SpaceArena::new();
        let sect = SectionId(0);
        let begin = arena.create(SpaceKind::LoctrBegin,NO_ALIGN,sect);
        let a = Address::in_section(sect,0);
        let mut b = Address::in_section(sect,0);
        b.spaces.push((begin,1));
        assert!(a.in_same_loctr(&a,&arena));
        assert!(!a.in_same_loctr(&b,&arena));
        assert!(b.in_same_loctr(&b.plus_offset(8),&arena));
    }
}
