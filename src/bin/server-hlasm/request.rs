//! Provide our response to incoming requests

use lsp_types as lsp;
use lsp::request::Request;
use lsp_server::{Connection,RequestId};
use serde_json;
use hlasmkit::normalize_client_uri;
use hlasmkit::lsp::completions::opcode_suggestions;
use hlasmkit::processing::preprocessor::VirtualFiles;
use super::logger;
use super::rpc_error::PARSE_ERROR;

fn def_response(req_id: RequestId, meth: &str) -> lsp_server::Response {
    let mess = req_id.to_string();
    lsp_server::Response::new_err(req_id,PARSE_ERROR,format!("request {} ({}) not understood",mess,meth))
}

fn ok_or_err<T: serde::Serialize>(req_id: RequestId, result: T) -> lsp_server::Response {
    match serde_json::to_value(result) {
        Ok(value) => lsp_server::Response::new_ok(req_id,value),
        Err(_) => lsp_server::Response::new_err(req_id,PARSE_ERROR,"response failed while serializing".to_string())
    }
}

/// returns true if there was a shutdown request
pub fn handle_request(
    connection: &Connection,
    req: lsp_server::Request,
    tools: &mut super::Tools) -> bool {

    let mut resp = def_response(req.id.clone(),&req.method);

    match req.method.as_str() {
        lsp::request::GotoDefinition::METHOD | lsp::request::GotoDeclaration::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::GotoDefinitionParams>(req.params) {
                let uri = normalize_client_uri(params.text_document_position_params.text_document.uri);
                let pos = params.text_document_position_params.position;
                let sel = lsp::Location::new(uri.clone(),lsp::Range::new(pos,pos));
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    resp = ok_or_err(req.id,chkpt.get_defs(&sel));
                }
            }
        },
        lsp::request::References::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::ReferenceParams>(req.params) {
                let uri = normalize_client_uri(params.text_document_position.text_document.uri);
                let pos = params.text_document_position.position;
                let sel = lsp::Location::new(uri.clone(),lsp::Range::new(pos,pos));
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    resp = ok_or_err(req.id,chkpt.get_refs(&sel));
                }
            }
        },
        lsp::request::Rename::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::RenameParams>(req.params) {
                let uri = normalize_client_uri(params.text_document_position.text_document.uri);
                let pos = params.text_document_position.position;
                let sel = lsp::Location::new(uri.clone(),lsp::Range::new(pos,pos));
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    let mut changes: std::collections::HashMap<lsp::Url,Vec<lsp::TextEdit>> = std::collections::HashMap::new();
                    for loc in chkpt.get_renamables(&sel) {
                        let new_edit = lsp::TextEdit::new(loc.range,params.new_name.clone());
                        changes.entry(loc.uri).or_default().push(new_edit);
                    }
                    resp = ok_or_err(req.id,lsp::WorkspaceEdit::new(changes));
                }
            }
        },
        lsp::request::DocumentSymbolRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DocumentSymbolParams>(req.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    resp = ok_or_err(req.id,chkpt.get_symbols());
                }
            }
        },
        lsp::request::FoldingRangeRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::FoldingRangeParams>(req.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    resp = ok_or_err(req.id,chkpt.get_folding_ranges());
                }
            }
        },
        lsp::request::HoverRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::HoverParams>(req.params) {
                let uri = normalize_client_uri(params.text_document_position_params.text_document.uri);
                let pos = params.text_document_position_params.position;
                resp = match tools.hover_provider.get(&uri,&pos) {
                    Some(hover) => ok_or_err(req.id,hover),
                    None => lsp_server::Response::new_ok(req.id,serde_json::Value::Null)
                };
            }
        },
        lsp::request::Completion::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::CompletionParams>(req.params) {
                let uri = normalize_client_uri(params.text_document_position.text_document.uri);
                let pos = params.text_document_position.position;
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    if let Some(line) = chkpt.get_line(pos.line as usize) {
                        let list = tools.completion_provider.get(&line,&pos);
                        resp = ok_or_err(req.id,lsp::CompletionResponse::Array(list));
                    }
                }
            }
        },
        lsp::request::SemanticTokensFullRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::SemanticTokensParams>(req.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                if let Some(chkpt) = tools.doc_chkpts.get(&uri.to_string()) {
                    let doc = chkpt.get_doc();
                    let toks = tools.highlighter.get(&doc.text,&uri);
                    resp = ok_or_err(req.id,lsp::SemanticTokensResult::Tokens(toks));
                }
            }
        },

        "hlasm/opcode_suggestion" => {
            if let Some(opcode) = req.params.get("opcode").and_then(|v| v.as_str()) {
                let ctx = hlasmkit::context::HlasmContext::new(
                    hlasmkit::handbook::Optable::Uni,String::new(),String::new());
                let suggestions = opcode_suggestions(&ctx,opcode,3);
                resp = ok_or_err(req.id,suggestions);
            }
        },
        "hlasm/toggle_non_critical_configuration_diagnostics" => {
            if let Ok(mut mutex) = tools.analyzer.lock() {
                mutex.suppress_config_diags = !mutex.suppress_config_diags;
                resp = ok_or_err(req.id,mutex.suppress_config_diags);
            }
        },
        "hlasm/virtual_file_content" => {
            if let Some(id) = req.params.get("id").and_then(|v| v.as_u64()) {
                if let Ok(mutex) = tools.analyzer.lock() {
                    resp = match mutex.get_virtual_file(id as usize) {
                        Some(text) => ok_or_err(req.id,text),
                        None => lsp_server::Response::new_err(req.id,PARSE_ERROR,"no such virtual file".to_string())
                    };
                }
            } else if let Some(raw) = req.params.get("uri").and_then(|v| v.as_str()) {
                let parsed = lsp::Url::parse(raw).ok().and_then(|uri| VirtualFiles::id_from_uri(&uri));
                if let (Some(id),Ok(mutex)) = (parsed,tools.analyzer.lock()) {
                    resp = match mutex.get_virtual_file(id) {
                        Some(text) => ok_or_err(req.id,text),
                        None => lsp_server::Response::new_err(req.id,PARSE_ERROR,"no such virtual file".to_string())
                    };
                }
            }
        },

        lsp::request::Shutdown::METHOD => {
            logger(&connection,"shutdown request");
            resp = lsp_server::Response::new_ok(req.id.clone(),());
            connection.sender.send(resp.into()).expect("failed to respond to shutdown request");
            match connection.receiver.recv_timeout(std::time::Duration::from_secs(30)) {
                Ok(_) | Err(_) => {}
            }
            return true;
        },

        which_method => {
            logger(&connection,&format!("request {} not handled",which_method));
        }
    }
    if let Err(_) = connection.sender.send(resp.into()) {
        logger(&connection,"could not send response");
    }
    false
}
