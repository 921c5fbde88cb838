//! # Generics and helpers for the language servers
//!
//! The `Analysis` trait is implemented by the analyzer and consumed by the
//! LSP server and the CLI `verify` subcommand.  Also here: the semantic token
//! legend and delta builder, diagnostics helpers, and server argument
//! parsing with logger setup.

use std::io::Write;
use std::str::FromStr;
use lsp_types as lsp;
use crate::{Document,STDRESULT};

/// semantic token types registered with the client, one per highlighting scope
pub const TOKEN_TYPES: [&str;17] = ["label","instruction","remark","ignored","comment","continuation",
    "seq_symbol","var_symbol","operator_symbol","string","number","operand","data_def_type",
    "data_def_modifier","data_attr_type","self_def_type","ordinary_symbol"];

// JSON-RPC error codes; are they defined somewhere else?
// -32768 through -32000 are reserved
pub mod rpc_error {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_PARAMS: i32 = -32602;
}

/// This trait serves either an ordinary LSP client or the `verify`
/// subcommand, whether run from the console or in a subprocess.  For the LSP
/// wrap the implementation in `Arc<Mutex<>>` so analysis can run in a
/// parallel thread.
pub trait Analysis {
    /// Load workspace configuration from the given folders.
    fn init_workspace(&mut self, _folders: Vec<lsp::Url>) -> STDRESULT {
        Ok(())
    }
    /// Analyze a document, filling diagnostics and symbol tables.
    fn analyze(&mut self, doc: &Document) -> STDRESULT;
    /// Parse a JSON settings string to update the configuration.
    fn update_config(&mut self, json: &str) -> STDRESULT;
    /// Diagnostics for the given document from the last analysis.
    fn get_diags(&self, doc: &Document) -> Vec<lsp::Diagnostic>;
    /// URI strings of every file the last analysis produced diagnostics for.
    fn diagnosed_files(&self) -> Vec<String>;
    fn err_warn_info_counts(&self) -> [usize;3];
    /// If console start interactive entry, otherwise empty input pipe into string.
    fn read_stdin(&self) -> String;
}

pub struct SemanticTokensBuilder {
    last_pos: lsp::Position,
    tokens: Vec<lsp::SemanticToken>
}

impl SemanticTokensBuilder {
    pub fn new() -> Self {
        Self {
            last_pos: lsp::Position::new(0,0),
            tokens: Vec::new()
        }
    }
    pub fn reset(&mut self) {
        self.tokens = Vec::new();
        self.last_pos = lsp::Position::new(0,0);
    }
    fn type_code(typ: &str) -> Option<u32> {
        TOKEN_TYPES.iter().position(|t| *t == typ).map(|i| i as u32)
    }
    pub fn push(&mut self, rng: lsp::Range, typ: &str) {
        let code = match Self::type_code(typ) {
            Some(code) => code,
            None => return
        };
        if rng.start.line < self.last_pos.line {
            return;
        }
        if rng.start.line == self.last_pos.line && rng.start.character < self.last_pos.character {
            return;
        }
        if rng.end.character <= rng.start.character {
            return;
        }
        self.tokens.push(lsp::SemanticToken {
            delta_line: rng.start.line - self.last_pos.line,
            delta_start: match rng.start.line == self.last_pos.line {
                true => rng.start.character - self.last_pos.character,
                false => rng.start.character
            },
            length: rng.end.character - rng.start.character,
            token_type: code,
            token_modifiers_bitset: 0
        });
        self.last_pos = rng.start;
    }
    pub fn clone_result(&self) -> lsp::SemanticTokens {
        lsp::SemanticTokens {
            result_id: None,
            data: self.tokens.clone()
        }
    }
}

pub fn basic_diag(range: lsp::Range, mess: &str, severity: lsp::DiagnosticSeverity) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range,
        severity: Some(severity),
        code: None,
        code_description: None,
        source: None,
        message: mess.to_string(),
        related_information: None,
        tags: None,
        data: None
    }
}

fn setup_env_logger(filt: log::LevelFilter, path: &str) {
    if filt == log::LevelFilter::Off {
        return;
    }
    let logging_file = Box::new(std::fs::File::create(path).expect("failed to create log file"));
    env_logger::Builder::new().format(|buf,record| {
        writeln!(buf,"{}:{} [{}] - {}",record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        )
    })
    .filter(Some("hlasmkit"),filt)
    .target(env_logger::Target::Pipe(logging_file))
    .init();
}

/// Parse a server's command line arguments.
/// Sets up logging based on the arguments, panics if log level or log file are invalid.
/// Returns the `--suppress-tokens` status in `parse_args().0[0]`.
pub fn parse_args() -> (Vec<bool>,Vec<String>) {
    let mut log_level = log::LevelFilter::Off;
    let mut log_file = "hlasmkit_log.txt".to_string();
    let mut suppress_tokens = false;

    let mut args = std::env::args().into_iter();
    args.next();
    while let Some(val) = args.next() {
        if &val == "--log-level" {
            if let Some(val) = args.next() {
                log_level = log::LevelFilter::from_str(&val).expect("invalid logging filter");
            }
        } else if &val == "--log-file" {
            if let Some(val) = args.next() {
                log_file = val;
            }
        } else if &val == "--suppress-tokens" {
            // tokens will only be sent to client upon request
            suppress_tokens = true;
        }
    }
    setup_env_logger(log_level,&log_file);
    (vec![suppress_tokens],vec![])
}
