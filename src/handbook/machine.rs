//! Machine instruction handbook.
//!
//! The table is embedded as JSON.  Entries record the format, the introducing
//! architecture level, operand count bounds, and a brief used by hover and
//! completion providers.  Extended (mask) mnemonics reference their underlying
//! instruction through `alias_of`.

use std::collections::HashMap;
use super::Optable;

const JSON_STR: &str = include_str!("machine_ops.json");

#[derive(Clone)]
pub struct MachineOp {
    pub mnemonic: String,
    pub brief: String,
    /// instruction format, e.g. `RR`, `RX`, `RIL`
    pub format: String,
    pub since: Optable,
    pub min_ops: usize,
    pub max_ops: usize,
    /// for extended mnemonics, the underlying machine instruction
    pub alias_of: Option<String>,
    /// for extended branch mnemonics, the substituted mask value
    pub mask: Option<i64>
}

pub struct MachineHandbook {
    ops: HashMap<String,MachineOp>
}

impl MachineHandbook {
    pub fn new() -> Self {
        let mut ops = HashMap::new();
        let root = serde_json::from_str::<serde_json::Value>(JSON_STR).expect("malformed machine handbook");
        let list = root.as_array().expect("malformed machine handbook");
        for entry in list {
            let mnemonic = entry["mnemonic"].as_str().expect("missing mnemonic").to_string();
            let brief = entry["brief"].as_str().unwrap_or("").to_string();
            let format = entry["format"].as_str().unwrap_or("RR").to_string();
            let since = match entry["since"].as_str() {
                Some(s) => Optable::parse(s).expect("bad architecture level"),
                None => Optable::S370
            };
            let (min_ops,max_ops) = match entry["ops"].as_array() {
                Some(pair) if pair.len()==2 => (
                    pair[0].as_u64().unwrap_or(0) as usize,
                    pair[1].as_u64().unwrap_or(0) as usize
                ),
                _ => (2,2)
            };
            let alias_of = entry["alias_of"].as_str().map(|s| s.to_string());
            let mask = entry["mask"].as_i64();
            ops.insert(mnemonic.clone(), MachineOp {
                mnemonic, brief, format, since, min_ops, max_ops, alias_of, mask
            });
        }
        Self { ops }
    }
    /// look up a mnemonic subject to the active OPTABLE
    pub fn get(&self, mnemonic: &str, optable: Optable) -> Option<&MachineOp> {
        match self.ops.get(&mnemonic.to_uppercase()) {
            Some(op) if optable.includes(op.since) => Some(op),
            _ => None
        }
    }
    /// look up ignoring the OPTABLE, used by opcode suggestions
    pub fn get_any(&self, mnemonic: &str) -> Option<&MachineOp> {
        self.ops.get(&mnemonic.to_uppercase())
    }
    pub fn contains(&self, mnemonic: &str, optable: Optable) -> bool {
        self.get(mnemonic,optable).is_some()
    }
    /// all mnemonics visible under the OPTABLE, unsorted
    pub fn mnemonics(&self, optable: Optable) -> Vec<&MachineOp> {
        self.ops.values().filter(|op| optable.includes(op.since)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses() {
        let book = MachineHandbook::new();
        assert!(book.contains("LR",Optable::S370));
        assert!(book.contains("lr",Optable::Uni));
    }

    #[test]
    fn optable_filters() {
        let book = MachineHandbook::new();
        assert!(book.contains("LGR",Optable::Zop));
        assert!(!book.contains("LGR",Optable::Esa));
        assert!(!book.contains("LARL",Optable::S370));
        assert!(book.contains("LARL",Optable::Uni));
    }

    #[test]
    fn extended_mnemonics() {
        let book = MachineHandbook::new();
        let bnz = book.get("BNZ",Optable::S370).unwrap();
        assert_eq!(bnz.alias_of.as_deref(),Some("BC"));
        assert_eq!(bnz.mask,Some(7));
        assert_eq!(bnz.min_ops,1);
    }
}
