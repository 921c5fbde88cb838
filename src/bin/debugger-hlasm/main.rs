
//! This is the HLASM debug adapter.
//! Cargo will compile this to a standalone executable.
//!
//! The adapter translates DAP requests into debugger-core commands and
//! debugger events into DAP events.  There is a single thread of execution,
//! reported as thread 1; stack frames reflect the processing stack.

use serde_json::{Value,json};
use std::sync::mpsc;
use hlasmkit::debugging::{DebugEvent,DebugFrame,DebugSession,DebugVariable,StepMode,client_line};
use hlasmkit::handbook::Optable;

mod protocol;

use protocol::Seq;

struct Adapter {
    seq: Seq,
    session: Option<DebugSession>,
    lines_start_at_1: bool,
    frames: Vec<DebugFrame>,
    variables: Vec<DebugVariable>,
    terminated: bool
}

impl Adapter {
    fn new() -> Self {
        Self {
            seq: Seq::new(),
            session: None,
            lines_start_at_1: true,
            frames: Vec::new(),
            variables: Vec::new(),
            terminated: false
        }
    }

    fn send(&mut self, value: Value) {
        protocol::write_message(&mut std::io::stdout().lock(),&value);
    }

    fn stack_frames_body(&self) -> Value {
        let frames: Vec<Value> = self.frames.iter().enumerate().rev().map(|(i,f)| {
            json!({
                "id": i+1,
                "name": f.name,
                "source": { "path": f.uri.strip_prefix("file://").unwrap_or(&f.uri) },
                "line": client_line(f.line,self.lines_start_at_1),
                "column": if self.lines_start_at_1 {1} else {0}
            })
        }).collect();
        json!({ "stackFrames": frames, "totalFrames": frames.len() })
    }

    fn variables_body(&self) -> Value {
        let variables: Vec<Value> = self.variables.iter().map(|v| {
            json!({
                "name": v.name,
                "type": v.var_type,
                "value": v.value,
                "variablesReference": 0
            })
        }).collect();
        json!({ "variables": variables })
    }

    fn pump_events(&mut self) {
        let events: Vec<DebugEvent> = match &self.session {
            Some(session) => session.events.try_iter().collect(),
            None => return
        };
        for event in events {
            match event {
                DebugEvent::Stopped { reason, frames, variables } => {
                    self.frames = frames;
                    self.variables = variables;
                    let ev = self.seq.event("stopped",json!({
                        "reason": reason,
                        "threadId": 1,
                        "allThreadsStopped": true
                    }));
                    self.send(ev);
                },
                DebugEvent::Exited => {
                    let ev = self.seq.event("terminated",json!({}));
                    self.send(ev);
                    let ev = self.seq.event("exited",json!({"exitCode": 0}));
                    self.send(ev);
                    self.terminated = true;
                }
            }
        }
    }

    /// handle one request; `true` ends the adapter
    fn handle(&mut self, req: Value) -> bool {
        let command = req.get("command").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let args = req.get("arguments").cloned().unwrap_or_else(|| json!({}));
        match command.as_str() {
            "initialize" => {
                if let Some(v) = args.get("linesStartAt1").and_then(|v| v.as_bool()) {
                    self.lines_start_at_1 = v;
                }
                let resp = self.seq.response(&req,true,json!({
                    "supportsConfigurationDoneRequest": true,
                    "supportsStepBack": false,
                    "supportsSetVariable": false
                }));
                self.send(resp);
                let ev = self.seq.event("initialized",json!({}));
                self.send(ev);
            },
            "launch" => {
                let program = args.get("program").and_then(|v| v.as_str()).unwrap_or("");
                match hlasmkit::Document::from_file_path(program) {
                    Ok(doc) => {
                        self.session = Some(DebugSession::launch(doc,Optable::Uni));
                        let resp = self.seq.response(&req,true,json!({}));
                        self.send(resp);
                    },
                    Err(e) => {
                        let resp = self.seq.response(&req,false,json!({"error": {"format": e.to_string()}}));
                        self.send(resp);
                    }
                }
            },
            "setBreakpoints" => {
                let path = args.get("source").and_then(|s| s.get("path")).and_then(|v| v.as_str()).unwrap_or("");
                let lines: Vec<u32> = args.get("breakpoints").and_then(|v| v.as_array())
                    .map(|bps| bps.iter()
                        .filter_map(|bp| bp.get("line").and_then(|v| v.as_u64()))
                        .map(|l| if self.lines_start_at_1 {(l as u32).saturating_sub(1)} else {l as u32})
                        .collect())
                    .unwrap_or_default();
                let verified: Vec<Value> = lines.iter().map(|l| json!({
                    "verified": true,
                    "line": client_line(*l,self.lines_start_at_1)
                })).collect();
                if let Some(session) = &self.session {
                    if let Ok(full) = std::fs::canonicalize(path) {
                        if let Ok(uri) = lsp_types::Url::from_file_path(&full) {
                            session.controller.set_breakpoints(uri.as_str(),lines);
                        }
                    }
                }
                let resp = self.seq.response(&req,true,json!({"breakpoints": verified}));
                self.send(resp);
            },
            "setExceptionBreakpoints" | "configurationDone" => {
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
            },
            "threads" => {
                let resp = self.seq.response(&req,true,json!({
                    "threads": [ {"id": 1, "name": "analysis"} ]
                }));
                self.send(resp);
            },
            "stackTrace" => {
                let body = self.stack_frames_body();
                let resp = self.seq.response(&req,true,body);
                self.send(resp);
            },
            "scopes" => {
                let resp = self.seq.response(&req,true,json!({
                    "scopes": [ {"name": "Set Symbols", "variablesReference": 1, "expensive": false} ]
                }));
                self.send(resp);
            },
            "variables" => {
                let body = self.variables_body();
                let resp = self.seq.response(&req,true,body);
                self.send(resp);
            },
            "continue" => {
                if let Some(session) = &self.session {
                    session.controller.resume_with(StepMode::Run);
                }
                let resp = self.seq.response(&req,true,json!({"allThreadsContinued": true}));
                self.send(resp);
            },
            "next" => {
                let depth = self.frames.len();
                if let Some(session) = &self.session {
                    session.controller.resume_with(StepMode::StepOver(depth));
                }
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
            },
            "stepIn" => {
                if let Some(session) = &self.session {
                    session.controller.resume_with(StepMode::StepIn);
                }
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
            },
            "stepOut" => {
                let depth = self.frames.len();
                if let Some(session) = &self.session {
                    session.controller.resume_with(StepMode::StepOut(depth));
                }
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
            },
            "pause" => {
                if let Some(session) = &self.session {
                    session.controller.pause();
                }
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
            },
            "disconnect" => {
                if let Some(mut session) = self.session.take() {
                    session.disconnect();
                }
                let resp = self.seq.response(&req,true,json!({}));
                self.send(resp);
                return true;
            },
            _ => {
                let resp = self.seq.response(&req,false,json!({
                    "error": {"format": format!("unsupported request {}",command)}
                }));
                self.send(resp);
            }
        }
        false
    }
}

fn main() {
    let _ = hlasmkit::server::parse_args();
    let mut adapter = Adapter::new();

    // the reader thread feeds requests so events can be pumped while idle
    let (tx,rx) = mpsc::channel::<Value>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut reader = stdin.lock();
        while let Some(msg) = protocol::read_message(&mut reader) {
            if tx.send(msg).is_err() {
                break;
            }
        }
    });

    loop {
        adapter.pump_events();
        match rx.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(req) => {
                if adapter.handle(req) {
                    break;
                }
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {},
            Err(mpsc::RecvTimeoutError::Disconnected) => break
        }
        if adapter.terminated && adapter.session.is_none() {
            break;
        }
    }
}
