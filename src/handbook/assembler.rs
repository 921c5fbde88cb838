//! Assembler and conditional-assembly directive handbook.

use std::collections::HashMap;

const JSON_STR: &str = include_str!("assembler_ops.json");

#[derive(Clone)]
pub struct AssemblerOp {
    pub mnemonic: String,
    pub brief: String,
    pub desc: String,
    /// grouping used by completions, e.g. `section`, `data`, `conditional`
    pub category: String,
    /// conditional-assembly operation, processed even in skipped branches
    pub ca: bool
}

pub struct AssemblerHandbook {
    ops: HashMap<String,AssemblerOp>
}

impl AssemblerHandbook {
    pub fn new() -> Self {
        let mut ops = HashMap::new();
        let root = serde_json::from_str::<serde_json::Value>(JSON_STR).expect("malformed assembler handbook");
        let list = root.as_array().expect("malformed assembler handbook");
        for entry in list {
            let mnemonic = entry["mnemonic"].as_str().expect("missing mnemonic").to_string();
            let brief = entry["brief"].as_str().unwrap_or("").to_string();
            let desc = entry["desc"].as_str().unwrap_or("").to_string();
            let category = entry["category"].as_str().unwrap_or("misc").to_string();
            let ca = entry["ca"].as_bool().unwrap_or(false);
            ops.insert(mnemonic.clone(), AssemblerOp { mnemonic, brief, desc, category, ca });
        }
        Self { ops }
    }
    pub fn get(&self, mnemonic: &str) -> Option<&AssemblerOp> {
        self.ops.get(&mnemonic.to_uppercase())
    }
    pub fn contains(&self, mnemonic: &str) -> bool {
        self.ops.contains_key(&mnemonic.to_uppercase())
    }
    pub fn is_ca(&self, mnemonic: &str) -> bool {
        match self.get(mnemonic) {
            Some(op) => op.ca,
            None => false
        }
    }
    pub fn directives(&self) -> Vec<&AssemblerOp> {
        self.ops.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses() {
        let book = AssemblerHandbook::new();
        assert!(book.contains("EQU"));
        assert!(book.contains("csect"));
        assert!(book.is_ca("AIF"));
        assert!(!book.is_ca("DC"));
    }
}
