//! # Instruction handbook
//!
//! Embedded tables describing machine instructions and assembler/conditional-assembly
//! directives.  The machine table is filtered by the active `OPTABLE` so that, e.g.,
//! `LGR` is flagged on a 370-level target.  The tables also carry documentation
//! strings consumed by hovers and completions.

use std::fmt;

pub mod machine;
pub mod assembler;

/// Instruction-set architecture levels accepted by the `OPTABLE` option.
/// `ZSn` spellings are aliases of the corresponding `Zn` levels.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Optable {
    Dos,
    S370,
    Xa,
    Esa,
    Zop,
    Yop,
    Z9,
    Z10,
    Z11,
    Z12,
    Z13,
    Z14,
    Z15,
    Uni
}

impl Optable {
    pub fn parse(txt: &str) -> Option<Self> {
        match txt.to_uppercase().as_str() {
            "DOS" => Some(Self::Dos),
            "370" => Some(Self::S370),
            "XA" => Some(Self::Xa),
            "ESA" => Some(Self::Esa),
            "ZOP" | "ZS1" => Some(Self::Zop),
            "YOP" | "ZS2" => Some(Self::Yop),
            "Z9" | "ZS3" => Some(Self::Z9),
            "Z10" | "ZS4" => Some(Self::Z10),
            "Z11" | "ZS5" => Some(Self::Z11),
            "Z12" | "ZS6" => Some(Self::Z12),
            "Z13" | "ZS7" => Some(Self::Z13),
            "Z14" | "ZS8" => Some(Self::Z14),
            "Z15" | "ZS9" => Some(Self::Z15),
            "UNI" => Some(Self::Uni),
            _ => None
        }
    }
    fn rank(&self) -> u8 {
        match self {
            Self::Dos => 1,
            Self::S370 => 1,
            Self::Xa => 2,
            Self::Esa => 3,
            Self::Zop => 4,
            Self::Yop => 5,
            Self::Z9 => 6,
            Self::Z10 => 7,
            Self::Z11 => 8,
            Self::Z12 => 9,
            Self::Z13 => 10,
            Self::Z14 => 11,
            Self::Z15 => 12,
            Self::Uni => 13
        }
    }
    /// is an instruction introduced at `since` visible under this table
    pub fn includes(&self, since: Optable) -> bool {
        match self {
            Self::Uni => true,
            Self::Dos => since == Self::S370,
            _ => since.rank() <= self.rank()
        }
    }
}

impl fmt::Display for Optable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dos => write!(f,"DOS"),
            Self::S370 => write!(f,"370"),
            Self::Xa => write!(f,"XA"),
            Self::Esa => write!(f,"ESA"),
            Self::Zop => write!(f,"ZOP"),
            Self::Yop => write!(f,"YOP"),
            Self::Z9 => write!(f,"Z9"),
            Self::Z10 => write!(f,"Z10"),
            Self::Z11 => write!(f,"Z11"),
            Self::Z12 => write!(f,"Z12"),
            Self::Z13 => write!(f,"Z13"),
            Self::Z14 => write!(f,"Z14"),
            Self::Z15 => write!(f,"Z15"),
            Self::Uni => write!(f,"UNI")
        }
    }
}
