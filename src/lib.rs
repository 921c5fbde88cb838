//! # `hlasmkit` main library
//!
//! This library analyzes IBM High Level Assembler (HLASM) source, with emphasis on
//! the needs of editors and debuggers.  Analysis can go as deep as conditional-assembly
//! evaluation and forward-reference resolution, or as shallow as per-line highlights.
//!
//! ## Architecture
//!
//! The analysis engine is a pipeline of statement providers feeding a stack of
//! statement processors, coordinated by a processing manager:
//! * `parsing` turns line-folded logical lines into semantic statements
//! * `processing` drives macro expansion, conditional assembly, copy inclusion and lookahead
//! * `context` owns the mutable assembly state: symbols, sections, variable scopes, macros
//! * `context::ordinary::dependency` resolves forward references and breaks cycles
//! * `expressions` evaluates machine and conditional-assembly expressions
//! * `semantics` computes `DC/DS` lengths, alignments and nominal values
//!
//! Results are consumed three ways:
//! * `lsp` gathers occurrences, symbol tables and hit counts for a language client
//! * `debugging` exposes a macro-level step debugger over the same pipeline
//! * `commands` runs the engine from the command line (`verify`, `symbols`, `bench`)
//!
//! The LSP server compiles to a separate executable with entry point in
//! `src/bin/server-hlasm`, likewise the DAP server in `src/bin/debugger-hlasm`.
//!
//! ## Sources
//!
//! A source file is *open code*, a *macro* library member, or a *copy* member.
//! Members are located through processor groups (`.hlasmplugin/proc_grps.json`),
//! and programs are bound to processor groups by glob patterns
//! (`.hlasmplugin/pgm_conf.json`).  Preprocessor output is addressed by
//! virtual-file URIs of the form `hlasm://<id>/<path>`.

pub mod handbook;
pub mod context;
pub mod parsing;
pub mod expressions;
pub mod semantics;
pub mod processing;
pub mod lsp;
pub mod workspace;
pub mod debugging;
pub mod diagnostics;
pub mod server;
pub mod analysis;
pub mod commands;

use lsp_types as lsptyp;
use thiserror::Error;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// limit on statements processed in one analysis, exceeding raises E077
pub const STMT_LIMIT: usize = 10_000_000;

#[derive(Error,Debug)]
pub enum Error {
    #[error("Syntax error")]
    Syntax,
    #[error("analysis was cancelled")]
    Cancelled,
    #[error("statement limit exceeded")]
    StatementLimit,
    #[error("library member not found")]
    MemberNotFound,
    #[error("bad configuration")]
    Config,
    #[error("out of range")]
    Range,
}

/// A client document, either from disk or from the client's editor.
/// The text is expected to be line-delimited by LF or CRLF.
#[derive(Clone)]
pub struct Document {
    pub uri: lsptyp::Url,
    pub version: Option<i32>,
    pub text: String
}

impl Document {
    pub fn new(uri: lsptyp::Url, text: String) -> Self {
        Self { uri, version: None, text }
    }
    pub fn from_file_path(path: &str) -> Result<Self,DYNERR> {
        let text = std::fs::read_to_string(path)?;
        let full = std::fs::canonicalize(path)?;
        match lsptyp::Url::from_file_path(&full) {
            Ok(uri) => Ok(Self { uri, version: None, text }),
            Err(_) => Err(Box::new(Error::Config))
        }
    }
    /// Document for text with no backing file, e.g. piped stdin.
    pub fn untitled(text: String) -> Self {
        let uri = lsptyp::Url::parse("untitled:Untitled-1").expect("url parsing failed");
        Self { uri, version: None, text }
    }
}

/// did the range `[r1,r2)` contain the position
pub fn range_contains_pos(rng: &lsptyp::Range, pos: &lsptyp::Position) -> bool {
    if pos.line < rng.start.line || pos.line > rng.end.line {
        return false;
    }
    if pos.line == rng.start.line && pos.character < rng.start.character {
        return false;
    }
    if pos.line == rng.end.line && pos.character >= rng.end.character {
        return false;
    }
    true
}

/// range on a single row from column `beg` to column `end`
pub fn lsp_range(row: u32, beg: u32, end: u32) -> lsptyp::Range {
    lsptyp::Range::new(lsptyp::Position::new(row,beg),lsptyp::Position::new(row,end))
}

/// Clients are not consistent about escapes and case in a URI.
/// Normalize by round-tripping through a file path whenever possible.
pub fn normalize_client_uri(uri: lsptyp::Url) -> lsptyp::Url {
    if let Ok(path) = uri.to_file_path() {
        if let Ok(norm) = lsptyp::Url::from_file_path(&path) {
            return norm;
        }
    }
    uri
}

pub fn normalize_client_uri_str(uri_str: &str) -> Result<lsptyp::Url,DYNERR> {
    match lsptyp::Url::parse(uri_str) {
        Ok(uri) => Ok(normalize_client_uri(uri)),
        Err(e) => Err(Box::new(e))
    }
}

pub fn pathbuf_from_uri(uri: &lsptyp::Url) -> Result<std::path::PathBuf,DYNERR> {
    match uri.to_file_path() {
        Ok(ans) => Ok(ans),
        Err(_) => Err(Box::new(Error::Config))
    }
}

/// Update a boolean setting from a JSON object if the key is present
pub fn update_json_bool(obj: &serde_json::Value, key: &str, setting: &mut bool) {
    if let Some(val) = obj.get(key) {
        if let Some(b) = val.as_bool() {
            *setting = b;
        }
    }
}

pub fn update_json_i64(obj: &serde_json::Value, key: &str, setting: &mut i64) {
    if let Some(val) = obj.get(key) {
        if let Some(n) = val.as_i64() {
            *setting = n;
        }
    }
}

pub fn update_json_f64(obj: &serde_json::Value, key: &str, setting: &mut f64) {
    if let Some(val) = obj.get(key) {
        if let Some(n) = val.as_f64() {
            *setting = n;
        }
    }
}

pub fn update_json_string(obj: &serde_json::Value, key: &str, setting: &mut String) {
    if let Some(val) = obj.get(key) {
        if let Some(s) = val.as_str() {
            *setting = s.to_string();
        }
    }
}

pub fn update_json_severity(obj: &serde_json::Value, key: &str, setting: &mut Option<lsptyp::DiagnosticSeverity>) {
    if let Some(val) = obj.get(key) {
        *setting = match val.as_str() {
            Some("error") => Some(lsptyp::DiagnosticSeverity::ERROR),
            Some("warn") | Some("warning") => Some(lsptyp::DiagnosticSeverity::WARNING),
            Some("info") => Some(lsptyp::DiagnosticSeverity::INFORMATION),
            Some("hint") => Some(lsptyp::DiagnosticSeverity::HINT),
            Some("ignore") => None,
            _ => *setting
        };
    }
}
