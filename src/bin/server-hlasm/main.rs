
//! This is the HLASM language server.
//! Cargo will compile this to a standalone executable.
//!
//! The hlasmkit library crate provides the analysis.
//! The server activity is all in this file and its submodules.

use lsp_types as lsp;
use lsp::{notification::Notification, request::Request};
use lsp_server;
use serde_json;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc,Mutex};
use hlasmkit::analysis::Analyzer;
use hlasmkit::lsp::checkpoint::CheckpointManager;
use hlasmkit::lsp::completions::CompletionProvider;
use hlasmkit::lsp::hovers::HoverProvider;
use hlasmkit::lsp::semantic_tokens::SemanticTokensProvider;
use hlasmkit::server::{Analysis,TOKEN_TYPES};

mod notification;
mod request;
mod response;

// JSON-RPC error codes; are they defined somewhere else?
// -32768 through -32000 are reserved
mod rpc_error {
    pub const PARSE_ERROR: i32 = -32700;
}

struct AnalysisResult {
    uri: lsp::Url,
    version: Option<i32>,
    /// diagnostics per file uri, the analyzed document first
    diagnostics: Vec<(String,Vec<lsp::Diagnostic>)>,
    symbols: hlasmkit::lsp::Symbols
}

/// Send log messages to the client.
fn logger(connection: &lsp_server::Connection, message: &str) {
    let note = lsp_server::Notification::new(
        lsp::notification::LogMessage::METHOD.to_string(),
        lsp::LogMessageParams {
            typ: lsp::MessageType::LOG,
            message: message.to_string()
        }
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => {}, // nowhere to send log, what can we do about it?
        Ok(()) => {}
    }
}

/// request the root configuration item
fn request_configuration(connection: &lsp_server::Connection) -> Result<(),Box<dyn Error>> {
    let req = lsp_server::Request::new(
        lsp_server::RequestId::from("hlasmkit-pull-config".to_string()),
        lsp::request::WorkspaceConfiguration::METHOD.to_string(),
        lsp::ConfigurationParams { items: vec![
            lsp::ConfigurationItem {
                scope_uri: None,
                section: Some("hlasmkit".to_string())
            }
        ]}
    );
    match connection.sender.send(req.into()) {
        Ok(()) => Ok(()),
        Err(e) => Err(Box::new(e))
    }
}

fn launch_analysis_thread(analyzer: Arc<Mutex<Analyzer>>, doc: hlasmkit::Document)
    -> std::thread::JoinHandle<Option<AnalysisResult>>
{
    std::thread::spawn(move || {
        match analyzer.lock() {
            Ok(mut analyzer) => {
                match analyzer.analyze(&doc) {
                    Ok(()) => {
                        let mut diagnostics = Vec::new();
                        for uri in analyzer.diagnosed_files() {
                            if let Ok(parsed) = lsp::Url::parse(&uri) {
                                let diags = analyzer.get_diags(&hlasmkit::Document::new(parsed,String::new()));
                                diagnostics.push((uri,diags));
                            }
                        }
                        // files analyzed clean still need their stale squiggles cleared
                        if !diagnostics.iter().any(|(uri,_)| *uri == doc.uri.to_string()) {
                            diagnostics.insert(0,(doc.uri.to_string(),Vec::new()));
                        }
                        Some(AnalysisResult {
                            uri: doc.uri.clone(),
                            version: doc.version,
                            diagnostics,
                            symbols: analyzer.get_symbols()
                        })
                    },
                    Err(_) => None
                }
            }
            Err(_) => None
        }
    })
}

/// Diagnostics are never requested by the client.
/// This server pushes them up after an analysis pass, which in turn is
/// triggered by document changes.
pub fn push_diagnostics(connection: &lsp_server::Connection, uri: lsp::Url,
    version: Option<i32>, diagnostics: Vec<lsp::Diagnostic>)
{
    let note = lsp_server::Notification::new(
        "textDocument/publishDiagnostics".to_string(),
        lsp::PublishDiagnosticsParams {
            uri,
            diagnostics,
            version
        }
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => logger(connection,"could not push diagnostics"),
        Ok(()) => {}
    }
}

struct Tools {
    thread_handles: VecDeque<std::thread::JoinHandle<Option<AnalysisResult>>>,
    doc_chkpts: HashMap<String,CheckpointManager>,
    analyzer: Arc<Mutex<Analyzer>>,
    hover_provider: HoverProvider,
    completion_provider: CompletionProvider,
    highlighter: SemanticTokensProvider,
    /// set when the client sent `exit` without `shutdown`
    dirty_exit: bool
}

impl Tools {
    pub fn new() -> Self {
        let seed_ctx = hlasmkit::context::HlasmContext::new(
            hlasmkit::handbook::Optable::Uni,String::new(),String::new());
        Self {
            thread_handles: VecDeque::new(),
            doc_chkpts: HashMap::new(),
            analyzer: Arc::new(Mutex::new(Analyzer::new())),
            hover_provider: HoverProvider::new(),
            completion_provider: CompletionProvider::new(&seed_ctx),
            highlighter: SemanticTokensProvider::new(),
            dirty_exit: false
        }
    }
}

fn main() -> Result<(), Box<dyn Error + Sync + Send>> {
    let (bools,_) = hlasmkit::server::parse_args();
    let suppress_tokens = bools[0];

    let mut tools = Tools::new();
    let (connection, io_threads) = lsp_server::Connection::stdio();

    logger(&connection,"start initializing connection");
    let (id,params) = connection.initialize_start()?;
    let params: lsp::InitializeParams = serde_json::from_value(params)?;

    let result = lsp::InitializeResult {
        capabilities: lsp::ServerCapabilities {
            text_document_sync: Some(lsp::TextDocumentSyncCapability::Options(
                lsp::TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(lsp::TextDocumentSyncKind::FULL),
                    will_save: None,
                    will_save_wait_until: None,
                    save: Some(lsp::TextDocumentSyncSaveOptions::SaveOptions(
                        lsp::SaveOptions {
                            include_text: Some(true)
                        }
                    ))
                }
            )),
            definition_provider: Some(lsp::OneOf::Left(true)),
            declaration_provider: Some(lsp::DeclarationCapability::Simple(true)),
            references_provider: Some(lsp::OneOf::Left(true)),
            hover_provider: Some(lsp::HoverProviderCapability::Simple(true)),
            completion_provider: Some(lsp::CompletionOptions {
                resolve_provider: Some(false),
                trigger_characters: Some(["&",".","'","="].iter().map(|trig| trig.to_string()).collect()),
                ..lsp::CompletionOptions::default()
            }),
            document_symbol_provider: Some(lsp::OneOf::Left(true)),
            rename_provider: Some(lsp::OneOf::Left(true)),
            folding_range_provider: Some(lsp::FoldingRangeProviderCapability::Simple(true)),
            semantic_tokens_provider: match suppress_tokens {
                true => None,
                false => Some(lsp::SemanticTokensServerCapabilities::SemanticTokensOptions(lsp::SemanticTokensOptions {
                    work_done_progress_options: lsp::WorkDoneProgressOptions {
                        work_done_progress: None
                    },
                    legend: lsp::SemanticTokensLegend {
                        token_types: TOKEN_TYPES.into_iter().map(lsp::SemanticTokenType::new).collect(),
                        token_modifiers: vec![]
                    },
                    range: None,
                    full: Some(lsp::SemanticTokensFullOptions::Bool(true))
                }))
            },
            ..lsp::ServerCapabilities::default()
        },
        server_info: Some(lsp::ServerInfo {
            name: "hlasmkit".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string())
        })
    };
    connection.initialize_finish(id, serde_json::to_value(result)?)?;
    logger(&connection,"connection initialized");

    // registrations
    let mut registrations: Vec<lsp::Registration> = Vec::new();
    if let Some(workspace) = params.capabilities.workspace {
        if let Some(config) = workspace.configuration {
            if config {
                registrations.push(lsp::Registration {
                    id: "pull-config".to_string(),
                    method: lsp::notification::DidChangeConfiguration::METHOD.to_string(),
                    register_options: None
                });
            }
        }
    }
    let req = lsp_server::Request::new(
        lsp_server::RequestId::from("hlasmkit-reg-config".to_string()),
        lsp::request::RegisterCapability::METHOD.to_string(),
        lsp::RegistrationParams { registrations });
    if let Err(_) = connection.sender.send(req.into()) {
        logger(&connection,"Could not register change configuration capability");
    }

    // Starting configuration
    match request_configuration(&connection) {
        Ok(()) => {},
        Err(_) => logger(&connection,"could not request starting configuration")
    }

    // Initial workspace scan picks up .hlasmplugin configuration
    if let Some(folders) = params.workspace_folders {
        let source_dirs = folders.iter().map(|f| f.uri.clone()).collect::<Vec<lsp::Url>>();
        if let Ok(mut mutex) = tools.analyzer.lock() {
            match mutex.init_workspace(source_dirs) {
                Ok(()) => {},
                Err(e) => logger(&connection,&format!("initial workspace scan failed: {}",e))
            }
        }
    }

    // Main loop
    loop {

        // Gather data from analysis threads
        if let Some(oldest) = tools.thread_handles.front() {
            if oldest.is_finished() {
                let done = tools.thread_handles.pop_front().expect("thread queue integrity");
                if let Ok(Some(result)) = done.join() {
                    if let Some(chkpt) = tools.doc_chkpts.get_mut(&result.uri.to_string()) {
                        chkpt.update_symbols(result.symbols);
                        tools.hover_provider.use_shared_symbols(chkpt.shared_symbols());
                        tools.completion_provider.use_shared_symbols(chkpt.shared_symbols());
                        tools.highlighter.use_shared_symbols(chkpt.shared_symbols());
                    }
                    for (uri,diags) in result.diagnostics {
                        if let Ok(parsed) = lsp::Url::parse(&uri) {
                            let version = if uri == result.uri.to_string() { result.version } else { None };
                            push_diagnostics(&connection,parsed,version,diags);
                        }
                    }
                }
            }
        }

        // Handle messages from the client
        match connection.receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(msg) => match msg {
                lsp_server::Message::Notification(note) => {
                    notification::handle_notification(&connection,note,&mut tools);
                    if tools.dirty_exit {
                        // exit arrived without a prior shutdown
                        std::process::exit(1);
                    }
                }
                lsp_server::Message::Request(req) => {
                    if request::handle_request(&connection, req, &mut tools) {
                        break;
                    }
                },
                lsp_server::Message::Response(resp) => {
                    response::handle_response(&connection, resp, &mut tools);
                }
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {},
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // transport dropped without the shutdown handshake
                std::process::exit(2);
            }
        }
    }

    io_threads.join()?;
    Ok(())
}
