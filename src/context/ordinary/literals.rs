//! The literal pool.
//!
//! References like `=F'5'` accumulate until a `LTORG` or the implicit pool at
//! `END` assigns them storage.  A generation counter keeps pools apart; the
//! same literal text referenced in two generations produces two pool entries.

use std::collections::HashMap;
use lsp_types as lsp;

#[derive(Clone)]
pub struct Literal {
    /// operand text including the leading `=`
    pub text: String,
    pub generation: usize,
    /// first reference
    pub location: lsp::Location
}

pub struct LiteralPool {
    pending: Vec<Literal>,
    seen: HashMap<(usize,String),usize>,
    generation: usize
}

impl LiteralPool {
    pub fn new() -> Self {
        Self { pending: Vec::new(), seen: HashMap::new(), generation: 0 }
    }
    pub fn generation(&self) -> usize {
        self.generation
    }
    /// register a reference, deduplicated per generation
    pub fn register(&mut self, text: &str, location: lsp::Location) {
        let key = (self.generation,text.to_string());
        if self.seen.contains_key(&key) {
            return;
        }
        self.seen.insert(key,self.pending.len());
        self.pending.push(Literal {
            text: text.to_string(),
            generation: self.generation,
            location
        });
    }
    /// take the pending pool and start the next generation
    pub fn flush(&mut self) -> Vec<Literal> {
        self.generation += 1;
        std::mem::take(&mut self.pending)
    }
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> lsp::Location {
        lsp::Location::new(lsp::Url::parse("untitled:t").unwrap(),lsp::Range::default())
    }

    #[test]
    fn dedup_within_generation_only() {
        let mut pool = LiteralPool::new();
        pool.register("=F'5'",loc());
        pool.register("=F'5'",loc());
        assert_eq!(pool.pending_count(),1);
        let first = pool.flush();
        assert_eq!(first.len(),1);
        pool.register("=F'5'",loc());
        assert_eq!(pool.pending_count(),1);
        assert_eq!(pool.flush()[0].generation,1);
    }
}
