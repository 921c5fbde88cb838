//! # Macro-level step debugger
//!
//! The debugger rides the analysis pipeline: a listener sees every statement
//! with the processing stack and the active SET symbols, decides whether to
//! stop (breakpoint, step boundary, pause), and blocks the analysis thread
//! until the adapter releases it.  There is exactly one thread of execution,
//! reported to the client as thread 1.

use std::collections::{HashMap,HashSet};
use std::sync::{Arc,Condvar,Mutex,mpsc};
use crate::context::HlasmContext;
use crate::context::variables::SetData;
use crate::parsing::Statement;

/// observer installed into the processing manager
pub trait DebugListener {
    /// called before each ordinary statement; `false` cancels the analysis
    fn on_statement(&mut self, ctx: &HlasmContext, stmt: &Statement) -> bool;
}

#[derive(Clone,Copy,PartialEq,Debug)]
pub enum StepMode {
    /// run to the next breakpoint
    Run,
    /// stop at the next statement at or above the given stack depth
    StepOver(usize),
    /// stop at the very next statement
    StepIn,
    /// stop once the stack gets shallower than the given depth
    StepOut(usize),
    /// stop at the next statement regardless
    Pause
}

#[derive(Clone)]
pub struct DebugFrame {
    pub name: String,
    pub uri: String,
    /// zero-based, the adapter applies client numbering
    pub line: u32
}

#[derive(Clone)]
pub struct DebugVariable {
    pub name: String,
    /// `A_TYPE`, `B_TYPE` or `C_TYPE`
    pub var_type: String,
    pub value: String
}

#[derive(Clone)]
pub enum DebugEvent {
    Stopped {
        reason: String,
        frames: Vec<DebugFrame>,
        variables: Vec<DebugVariable>
    },
    Exited
}

struct ControlState {
    mode: StepMode,
    /// breakpoints per uri string, zero-based lines
    breakpoints: HashMap<String,HashSet<u32>>,
    terminated: bool,
    /// analysis waits while true
    suspended: bool
}

/// shared between the adapter thread and the analysis thread
pub struct DebugController {
    state: Mutex<ControlState>,
    resume: Condvar
}

impl DebugController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                mode: StepMode::StepIn,
                breakpoints: HashMap::new(),
                terminated: false,
                suspended: false
            }),
            resume: Condvar::new()
        }
    }
    pub fn set_breakpoints(&self, uri: &str, lines: Vec<u32>) {
        let mut state = self.state.lock().expect("debug state poisoned");
        state.breakpoints.insert(uri.to_string(),lines.into_iter().collect());
    }
    /// release the analysis with a new stepping mode
    pub fn resume_with(&self, mode: StepMode) {
        let mut state = self.state.lock().expect("debug state poisoned");
        state.mode = mode;
        state.suspended = false;
        self.resume.notify_all();
    }
    pub fn pause(&self) {
        let mut state = self.state.lock().expect("debug state poisoned");
        state.mode = StepMode::Pause;
    }
    pub fn terminate(&self) {
        let mut state = self.state.lock().expect("debug state poisoned");
        state.terminated = true;
        state.suspended = false;
        self.resume.notify_all();
    }
}

/// the listener handed to the processing manager
pub struct SessionListener {
    controller: Arc<DebugController>,
    events: mpsc::Sender<DebugEvent>
}

impl SessionListener {
    pub fn new(controller: Arc<DebugController>, events: mpsc::Sender<DebugEvent>) -> Self {
        Self { controller, events }
    }

    fn frames(ctx: &HlasmContext) -> Vec<DebugFrame> {
        ctx.stack.frames(None).iter().map(|f| DebugFrame {
            name: match f.member {
                Some(id) => ctx.ids.resolve(id).to_string(),
                None => "OPEN CODE".to_string()
            },
            uri: f.uri.to_string(),
            line: f.pos.line
        }).collect()
    }

    fn variables(ctx: &HlasmContext) -> Vec<DebugVariable> {
        let scope = ctx.scope();
        let mut ans: Vec<DebugVariable> = scope.vars.values().map(|sym| {
            let var_type = match sym.data {
                SetData::A(_) => "A_TYPE",
                SetData::B(_) => "B_TYPE",
                SetData::C(_) => "C_TYPE"
            };
            DebugVariable {
                name: format!("&{}",ctx.ids.resolve(sym.name)),
                var_type: var_type.to_string(),
                value: if sym.scalar {
                    sym.display(None)
                } else {
                    let n = sym.count();
                    (1..=n).map(|i| sym.display(Some(i as usize)))
                        .collect::<Vec<String>>().join(",")
                }
            }
        }).collect();
        ans.sort_by(|a,b| a.name.cmp(&b.name));
        ans
    }

    fn should_stop(&self, ctx: &HlasmContext, stmt: &Statement) -> Option<String> {
        let state = self.controller.state.lock().expect("debug state poisoned");
        let depth = ctx.stack.depth();
        match state.mode {
            StepMode::Pause => return Some("pause".to_string()),
            StepMode::StepIn => return Some("step".to_string()),
            StepMode::StepOver(limit) if depth <= limit => return Some("step".to_string()),
            StepMode::StepOut(limit) if depth < limit => return Some("step".to_string()),
            _ => {}
        }
        if let Some(lines) = state.breakpoints.get(stmt.uri().as_str()) {
            if lines.contains(&stmt.row()) {
                return Some("breakpoint".to_string());
            }
        }
        None
    }
}

impl DebugListener for SessionListener {
    fn on_statement(&mut self, ctx: &HlasmContext, stmt: &Statement) -> bool {
        if self.controller.state.lock().expect("debug state poisoned").terminated {
            return false;
        }
        let reason = match self.should_stop(ctx,stmt) {
            Some(reason) => reason,
            None => return true
        };
        let event = DebugEvent::Stopped {
            reason,
            frames: Self::frames(ctx),
            variables: Self::variables(ctx)
        };
        if self.events.send(event).is_err() {
            return false;
        }
        // block until the adapter resumes or terminates the session
        let mut state = self.controller.state.lock().expect("debug state poisoned");
        state.suspended = true;
        while state.suspended && !state.terminated {
            state = self.controller.resume.wait(state).expect("debug state poisoned");
        }
        !state.terminated
    }
}

/// handles for one debug session; the analysis runs on its own thread
pub struct DebugSession {
    pub controller: Arc<DebugController>,
    pub events: mpsc::Receiver<DebugEvent>,
    handle: Option<std::thread::JoinHandle<()>>
}

impl DebugSession {
    /// launch an analysis of the document under debugger control
    pub fn launch(doc: crate::Document, optable: crate::handbook::Optable) -> Self {
        let controller = Arc::new(DebugController::new());
        let (tx,rx) = mpsc::channel();
        let thread_controller = Arc::clone(&controller);
        let thread_tx = tx.clone();
        let handle = std::thread::spawn(move || {
            let mut listener = SessionListener::new(thread_controller,thread_tx.clone());
            let mut analyzer = crate::analysis::Analyzer::with_optable(optable);
            let _ = analyzer.analyze_with_debugger(&doc,&mut listener);
            let _ = thread_tx.send(DebugEvent::Exited);
        });
        Self { controller, events: rx, handle: Some(handle) }
    }
    pub fn disconnect(&mut self) {
        self.controller.terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
    /// step granularity helpers used by the adapter
    pub fn step_modes(depth: usize) -> (StepMode,StepMode,StepMode) {
        (StepMode::StepOver(depth),StepMode::StepIn,StepMode::StepOut(depth))
    }
}

/// map a zero-based position to client numbering per the DAP capabilities
pub fn client_line(line: u32, lines_start_at_1: bool) -> u32 {
    if lines_start_at_1 { line + 1 } else { line }
}

pub fn client_column(column: u32, columns_start_at_1: bool) -> u32 {
    if columns_start_at_1 { column + 1 } else { column }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_breakpoints() {
        let c = DebugController::new();
        c.set_breakpoints("file:///a",vec![3,7]);
        let state = c.state.lock().unwrap();
        assert!(state.breakpoints.get("file:///a").unwrap().contains(&3));
    }

    #[test]
    fn client_numbering() {
        assert_eq!(client_line(0,true),1);
        assert_eq!(client_line(0,false),0);
        assert_eq!(client_column(4,true),5);
    }

    fn drain_to_exit(session: &DebugSession) {
        loop {
            match session.events.recv_timeout(std::time::Duration::from_secs(5)).expect("event") {
                DebugEvent::Exited => break,
                DebugEvent::Stopped { .. } => session.controller.resume_with(StepMode::Run)
            }
        }
    }

    #[test]
    fn session_stops_on_entry_and_exits() {
        let doc = crate::Document::untitled("A        EQU   1\nB        EQU   2\n".to_string());
        let mut session = DebugSession::launch(doc,crate::handbook::Optable::Uni);
        match session.events.recv_timeout(std::time::Duration::from_secs(5)).expect("event") {
            DebugEvent::Stopped { reason, frames, .. } => {
                assert_eq!(reason,"step");
                assert_eq!(frames.len(),1);
                assert_eq!(frames[0].name,"OPEN CODE");
                assert_eq!(frames[0].line,0);
            },
            _ => panic!("expected the entry stop")
        }
        session.controller.resume_with(StepMode::Run);
        drain_to_exit(&session);
        session.disconnect();
    }

    #[test]
    fn breakpoint_exposes_set_symbols() {
        let doc = crate::Document::untitled("\
&I       SETA  5
&J       SETA  6
X        EQU   1
".to_string());
        let uri = doc.uri.to_string();
        let mut session = DebugSession::launch(doc,crate::handbook::Optable::Uni);
        // entry stop first, then run to the breakpoint
        match session.events.recv_timeout(std::time::Duration::from_secs(5)).expect("event") {
            DebugEvent::Stopped { .. } => {},
            _ => panic!("expected the entry stop")
        }
        session.controller.set_breakpoints(&uri,vec![2]);
        session.controller.resume_with(StepMode::Run);
        match session.events.recv_timeout(std::time::Duration::from_secs(5)).expect("event") {
            DebugEvent::Stopped { reason, frames, variables } => {
                assert_eq!(reason,"breakpoint");
                assert_eq!(frames[0].line,2);
                let i = variables.iter().find(|v| v.name == "&I").expect("&I visible");
                assert_eq!(i.var_type,"A_TYPE");
                assert_eq!(i.value,"5");
                assert!(variables.iter().any(|v| v.name == "&J" && v.value == "6"));
            },
            _ => panic!("expected the breakpoint stop")
        }
        session.controller.resume_with(StepMode::Run);
        drain_to_exit(&session);
        session.disconnect();
    }
}
