//! # Statement semantics
//!
//! Operand-level analysis shared by the statement processors, currently the
//! `DC`/`DS` data-definition engine.

pub mod data_def;
