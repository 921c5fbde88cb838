//! # Parsing
//!
//! Logical-line folding and statement field scanning.  The exported surface is
//! three entry points: the statement parser, the operand splitter used when a
//! processor knows the instruction format, and the lookahead parser that only
//! recognizes label and instruction so forward scans stay cheap.

pub mod lexer;
pub mod statement;
pub mod parser;

pub use lexer::{Ictl,LineFolder,LogicalLine,SourceLine};
pub use parser::{split_operands,StatementParser};
pub use statement::{InstrField,LabelField,Operand,Statement};
