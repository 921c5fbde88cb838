//! Handle responses to requests this server sent to the client

use lsp_server;
use hlasmkit::server::Analysis;
use super::logger;

pub fn handle_response(
    connection: &lsp_server::Connection,
    resp: lsp_server::Response,
    tools: &mut super::Tools) {

    let id = resp.id.to_string();
    if id.contains("pull-config") {
        if let Some(result) = resp.result {
            if let Some(ary) = result.as_array() {
                // this loop exits in the first iteration, we only requested 1 item
                for item in ary {
                    let json_config = item.to_string();
                    if let Ok(mut mutex) = tools.analyzer.lock() {
                        match mutex.update_config(&json_config) {
                            Ok(()) => logger(&connection,"configuration updated"),
                            Err(e) => logger(&connection,&format!("configuration rejected: {}",e))
                        }
                    }
                    break;
                }
            }
        }
    } else if id.contains("reg-config") {
        logger(&connection,"configuration capability registered");
    } else {
        logger(&connection,&format!("unhandled response {}",id));
    }
}
