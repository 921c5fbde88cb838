//! The processing manager.
//!
//! Owns the provider and processor stacks, dispatches statements, and carries
//! out the control transfers: `AGO`/`AIF` branches with the ACTR budget,
//! macro invocation with SYSNDX accounting, `COPY` inclusion with recursion
//! detection, lookahead starts and rewinds, and the statement count limit.

use lsp_types as lsp;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool,Ordering};
use crate::context::HlasmContext;
use crate::context::ids::IdIndex;
use crate::context::source::{FrameKind,ProcessingFrame};
use crate::debugging::DebugListener;
use crate::diagnostics::{attach_stack,diag};
use crate::expressions::ca::CaEvaluator;
use crate::lsp::analyzer::LspAnalyzer;
use crate::lsp::completions::{member_suggestions,opcode_suggestions};
use crate::parsing::{InstrField,LabelField,LineFolder,SourceLine,Statement,StatementParser};
use crate::parsing::parser::{classify_label,operand_field_len};
use crate::workspace::libraries::ParseLibProvider;
use crate::{Error,STMT_LIMIT};
use super::processors::{Processor,copy_def,lookahead::LookaheadProcessor,macro_def::MacroDefProcessor,ordinary};
use super::provider::{Provider,OpenCodeProvider,MacroProvider,CopyProvider,ProvidedLine};
use super::{LookaheadTarget,ProcessingKind,Request};

pub struct ProcessingManager<'a> {
    providers: Vec<Provider>,
    processors: Vec<Processor>,
    lib: &'a mut dyn ParseLibProvider,
    cancel: Option<Arc<AtomicBool>>,
    pub diagnostic_set: HashMap<String,Vec<lsp::Diagnostic>>,
    /// sequence symbols that a lookahead failed to find
    failed_seq: Vec<IdIndex>,
    stmt_count: usize,
    ended: bool,
    open_uri: lsp::Url
}

impl<'a> ProcessingManager<'a> {
    pub fn new(lib: &'a mut dyn ParseLibProvider, cancel: Option<Arc<AtomicBool>>, open_uri: lsp::Url) -> Self {
        Self {
            providers: Vec::new(),
            processors: vec![Processor::Ordinary],
            lib,
            cancel,
            diagnostic_set: HashMap::new(),
            failed_seq: Vec::new(),
            stmt_count: 0,
            ended: false,
            open_uri
        }
    }

    fn place_diags(&mut self, ctx: &HlasmContext, uri: &lsp::Url, diags: Vec<lsp::Diagnostic>) {
        if diags.is_empty() {
            return;
        }
        let frames = ctx.stack.frames(None);
        let related: Vec<(lsp::Location,String)> = if frames.len() > 1 {
            frames[..frames.len()-1].iter().map(|f| {
                let what = match (f.kind,f.member) {
                    (FrameKind::Macro,Some(id)) => format!("while expanding macro {}",ctx.ids.resolve(id)),
                    (FrameKind::Copy,Some(id)) => format!("while including copy member {}",ctx.ids.resolve(id)),
                    _ => "in open code".to_string()
                };
                (lsp::Location::new(f.uri.clone(),lsp::Range::new(f.pos,f.pos)),what)
            }).collect()
        } else {
            Vec::new()
        };
        let entry = self.diagnostic_set.entry(uri.to_string()).or_default();
        for d in diags {
            if related.is_empty() {
                entry.push(d);
            } else {
                entry.push(attach_stack(d,related.clone()));
            }
        }
    }

    fn pop_provider(&mut self, ctx: &mut HlasmContext) {
        if let Some(popped) = self.providers.pop() {
            match popped {
                Provider::Macro(_) => {
                    ctx.leave_macro();
                    ctx.stack.pop();
                },
                Provider::Copy(_) => {
                    ctx.stack.pop();
                },
                Provider::OpenCode(_) => {}
            }
        }
    }

    fn finish_macro(&mut self, ctx: &mut HlasmContext) {
        while let Some(top) = self.providers.last() {
            let was_macro = matches!(top,Provider::Macro(_));
            if matches!(top,Provider::OpenCode(_)) {
                break;
            }
            self.providers.pop();
            ctx.stack.pop();
            if was_macro {
                ctx.leave_macro();
                break;
            }
        }
    }

    fn finish_lookahead(&mut self, ctx: &mut HlasmContext, found: bool) {
        let la = match self.processors.pop() {
            Some(Processor::Lookahead(la)) => la,
            Some(other) => {
                self.processors.push(other);
                return;
            },
            None => return
        };
        if !found {
            la.exhausted(ctx);
            if let LookaheadTarget::SeqSymbol(id) = la.target {
                if !self.failed_seq.contains(&id) {
                    self.failed_seq.push(id);
                }
            }
        }
        if self.providers.len() == la.provider_depth {
            if let Some(top) = self.providers.last_mut() {
                top.rewind(la.resume_at);
            }
        }
    }

    /// substitute the label and operand fields of a model statement and
    /// resolve a substituted instruction field
    fn substitute_statement(&mut self, ctx: &mut HlasmContext, mut stmt: Statement,
        diags: &mut Vec<lsp::Diagnostic>) -> Statement
    {
        if let InstrField::Model(raw) = stmt.instr.clone() {
            match CaEvaluator::new(ctx).substitute(&raw) {
                Ok(sub) => {
                    stmt.instr = InstrField::Mnemonic(sub);
                    stmt.from_model = true;
                },
                Err(e) => diags.push(diag(stmt.instr_range,e.code,&e.message))
            }
        }
        let mnemonic = stmt.instr.text().to_uppercase();
        let is_ca = matches!(ctx.resolve_opcode(&mnemonic,ctx.opcode_gen),
            Some(crate::context::OpCode::CondAsm(_)));
        if is_ca {
            return stmt;
        }
        match &stmt.label {
            LabelField::Variable(raw) | LabelField::Model(raw) => {
                let raw = raw.clone();
                match CaEvaluator::new(ctx).substitute(&raw) {
                    Ok(sub) => {
                        stmt.label = classify_label(&sub);
                        stmt.from_model = true;
                    },
                    Err(e) => diags.push(diag(stmt.label_range,e.code,&e.message))
                }
            },
            _ => {}
        }
        if stmt.operands.contains('&') {
            let raw = stmt.operands.clone();
            match CaEvaluator::new(ctx).substitute(&raw) {
                Ok(sub) => {
                    // substitution may have produced new remark gaps
                    let len = operand_field_len(&sub);
                    stmt.operands = sub[..len].to_string();
                    stmt.from_model = true;
                },
                Err(e) => diags.push(diag(stmt.operands_range,e.code,&e.message))
            }
        }
        stmt
    }

    /// decrement the ACTR budget for a taken branch; `false` aborts the scope
    fn spend_actr(&mut self, ctx: &mut HlasmContext, range: lsp::Range,
        diags: &mut Vec<lsp::Diagnostic>) -> bool
    {
        let scope = ctx.scope_mut();
        scope.actr -= 1;
        if scope.actr < 0 {
            diags.push(diag(range,"E056","ACTR branch budget exhausted"));
            if ctx.in_macro() {
                self.finish_macro(ctx);
            } else {
                self.ended = true;
            }
            return false;
        }
        true
    }

    fn do_branch(&mut self, ctx: &mut HlasmContext, id: IdIndex, range: lsp::Range,
        diags: &mut Vec<lsp::Diagnostic>)
    {
        // a target local to the copy member being included wins
        if !ctx.in_macro() {
            let copy_target = match self.providers.last() {
                Some(Provider::Copy(p)) => p.member.seq_symbols.get(&id).copied(),
                _ => None
            };
            if let Some(index) = copy_target {
                if !self.spend_actr(ctx,range,diags) {
                    return;
                }
                if let Some(Provider::Copy(p)) = self.providers.last_mut() {
                    p.jump(index);
                }
                return;
            }
        }
        let target = ctx.scope().seq_symbols.get(&id).copied();
        match target {
            Some(index) => {
                if !self.spend_actr(ctx,range,diags) {
                    return;
                }
                if ctx.in_macro() {
                    // branch targets live in the macro body
                    while let Some(top) = self.providers.last() {
                        if matches!(top,Provider::Macro(_)) {
                            break;
                        }
                        self.providers.pop();
                        ctx.stack.pop();
                    }
                    if let Some(Provider::Macro(p)) = self.providers.last_mut() {
                        p.jump(index);
                    }
                } else {
                    // open-code targets index the open-code provider
                    while self.providers.len() > 1 {
                        self.pop_provider(ctx);
                    }
                    if let Some(top) = self.providers.last_mut() {
                        top.rewind(index);
                    }
                }
            },
            None => {
                if ctx.in_macro() || self.failed_seq.contains(&id) {
                    diags.push(diag(range,"E047","undefined sequence symbol"));
                    return;
                }
                // forward target in open code, scan for it
                let resume_at = self.providers.last().map(|p| p.last_index()).unwrap_or(0);
                self.processors.push(Processor::Lookahead(LookaheadProcessor::new(
                    LookaheadTarget::SeqSymbol(id),resume_at,self.providers.len())));
            }
        }
    }

    /// Parse a library member expected to hold a macro definition.  Returns
    /// `true` when a definition was captured into the context.
    fn define_library_macro(&mut self, ctx: &mut HlasmContext, uri: &lsp::Url, text: &str) -> bool {
        let lines: Vec<SourceLine> = text.lines().enumerate().map(|(row,line)| SourceLine {
            text: line.to_string(),
            uri: uri.clone(),
            row: row as u32
        }).collect();
        let folder = LineFolder::new();
        let mut capture: Option<MacroDefProcessor> = None;
        let mut diags = Vec::new();
        let mut at = 0;
        while at < lines.len() {
            let (logical,next) = folder.fold_at(&lines,at);
            at = next;
            if logical.is_comment() || logical.text.trim().is_empty() {
                continue;
            }
            let stmt = StatementParser::parse(logical);
            match &mut capture {
                None => {
                    if stmt.instr.text().eq_ignore_ascii_case("MACRO") {
                        capture = Some(MacroDefProcessor::new(uri.clone(),stmt.instr_range));
                    } else {
                        // not a macro member after all
                        return false;
                    }
                },
                Some(mdp) => {
                    if mdp.process(ctx,&stmt,&mut diags) {
                        self.diagnostic_set.entry(uri.to_string()).or_default().append(&mut diags);
                        return true;
                    }
                }
            }
        }
        if !diags.is_empty() {
            self.diagnostic_set.entry(uri.to_string()).or_default().append(&mut diags);
        }
        false
    }

    fn handle_request(&mut self, ctx: &mut HlasmContext, req: Request, stmt: &Statement) {
        let mut diags = Vec::new();
        match req {
            Request::StartMacroDef => {
                self.processors.push(Processor::MacroDef(
                    MacroDefProcessor::new(stmt.uri().clone(),stmt.instr_range)));
            },
            Request::InvokeMacro(id,args,range) => {
                let def = match ctx.get_macro(id,ctx.opcode_gen) {
                    Some(def) => def,
                    None => return
                };
                match ctx.enter_macro(def.as_ref(),args) {
                    Ok(_) => {
                        ctx.stack.push(ProcessingFrame {
                            pos: def.definition_location.range.start,
                            uri: def.definition_location.uri.clone(),
                            member: Some(id),
                            kind: FrameKind::Macro
                        });
                        self.providers.push(Provider::Macro(MacroProvider::new(def)));
                    },
                    Err(n) => {
                        diags.push(diag(range,"E072",
                            &format!("SYSNDX limit exceeded at call {}",n)));
                    }
                }
            },
            Request::PushCopy(id,range) => {
                let recursive = self.providers.iter().any(|p| {
                    matches!(p,Provider::Copy(c) if c.member.name == id)
                });
                if recursive {
                    diags.push(diag(range,"E062","recursive COPY"));
                } else if let Some(member) = ctx.get_copy_member(id) {
                    ctx.stack.push(ProcessingFrame {
                        pos: lsp::Position::new(0,0),
                        uri: member.definition_location.uri.clone(),
                        member: Some(id),
                        kind: FrameKind::Copy
                    });
                    self.providers.push(Provider::Copy(CopyProvider::new(member)));
                } else {
                    let name = ctx.ids.resolve(id).to_string();
                    match self.lib.load_member(&name) {
                        Some((uri,text)) => {
                            let member = copy_def::capture(ctx,id,uri,&text);
                            let member = ctx.add_copy_member(member);
                            ctx.stack.push(ProcessingFrame {
                                pos: lsp::Position::new(0,0),
                                uri: member.definition_location.uri.clone(),
                                member: Some(id),
                                kind: FrameKind::Copy
                            });
                            self.providers.push(Provider::Copy(CopyProvider::new(member)));
                        },
                        None => {
                            let candidates = self.lib.member_candidates();
                            let close = member_suggestions(&candidates,&name,3);
                            let message = if close.is_empty() {
                                format!("library member {} not found",name)
                            } else {
                                format!("library member {} not found, did you mean {}?",name,close.join(", "))
                            };
                            diags.push(diag(range,"E049",&message));
                        }
                    }
                }
            },
            Request::Branch(id,range) => self.do_branch(ctx,id,range,&mut diags),
            Request::UnknownOpcode(mnemonic,range) => {
                if let Some((uri,text)) = self.lib.load_member(&mnemonic) {
                    if self.define_library_macro(ctx,&uri,&text) {
                        // the member defined the macro; dispatch the call again
                        self.place_diags(ctx,stmt.uri(),diags);
                        let mut redo = Vec::new();
                        for req in ordinary::process(ctx,stmt,&mut redo) {
                            self.handle_request(ctx,req,stmt);
                        }
                        self.place_diags(ctx,stmt.uri(),redo);
                        return;
                    }
                }
                let mut close = opcode_suggestions(ctx,&mnemonic,3);
                if close.is_empty() {
                    let candidates = self.lib.member_candidates();
                    close = member_suggestions(&candidates,&mnemonic,3);
                }
                let message = if close.is_empty() {
                    format!("unknown operation code {}",mnemonic)
                } else {
                    format!("unknown operation code {}, did you mean {}?",mnemonic,close.join(", "))
                };
                diags.push(diag(range,"E049",&message));
            },
            Request::LookaheadAttr(id) => {
                let resume_at = self.providers.last().map(|p| p.last_index()).unwrap_or(0);
                self.processors.push(Processor::Lookahead(LookaheadProcessor::new(
                    LookaheadTarget::SymbolAttrs(id),resume_at,self.providers.len())));
            },
            Request::SetIctl(ictl) => {
                if let Some(Provider::OpenCode(p)) = self.providers.first_mut() {
                    p.folder.ictl = ictl;
                }
            },
            Request::FinishMacro => self.finish_macro(ctx),
            Request::End => self.ended = true
        }
        self.place_diags(ctx,stmt.uri(),diags);
    }

    fn process_ordinary(&mut self, ctx: &mut HlasmContext, analyzer: &mut LspAnalyzer,
        debug: &mut Option<&mut dyn DebugListener>, provided: ProvidedLine) -> Result<(),Error>
    {
        let mut diags = Vec::new();
        let stmt = StatementParser::parse(provided.line);
        if stmt.line.dangling_continuation {
            diags.push(diag(stmt.whole_range(),"S0004","continued statement has no continuation line"));
        }
        if let Some(listener) = debug {
            if !listener.on_statement(ctx,&stmt) {
                return Err(Error::Cancelled);
            }
        }
        // open-code sequence symbols register as they are encountered
        if !ctx.in_macro() && provided.kind == super::ProviderKind::OpenCode {
            if let LabelField::Sequence(name) = &stmt.label {
                let id = ctx.ids.intern(name.trim_start_matches('.'));
                ctx.scope_mut().seq_symbols.entry(id).or_insert(provided.index);
            }
        }
        let stmt = self.substitute_statement(ctx,stmt,&mut diags);
        analyzer.analyze(ctx,&stmt,provided.kind,ProcessingKind::Ordinary);
        let requests = ordinary::process(ctx,&stmt,&mut diags);
        self.place_diags(ctx,stmt.uri(),diags);
        for req in requests {
            self.handle_request(ctx,req,&stmt);
        }
        Ok(())
    }

    /// the processing loop; diagnostics land in `diagnostic_set`
    pub fn run(&mut self, ctx: &mut HlasmContext, lines: Vec<SourceLine>,
        analyzer: &mut LspAnalyzer, mut debug: Option<&mut dyn DebugListener>) -> Result<(),Error>
    {
        analyzer.preindex(&lines);
        analyzer.symbols.master_doc_uri = self.open_uri.to_string();
        ctx.stack.push(ProcessingFrame {
            pos: lsp::Position::new(0,0),
            uri: self.open_uri.clone(),
            member: None,
            kind: FrameKind::OpenCode
        });
        self.providers.push(Provider::OpenCode(OpenCodeProvider::new(lines)));
        loop {
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::Relaxed) {
                    return Err(Error::Cancelled);
                }
            }
            if self.ended {
                break;
            }
            // a lookahead ends when its provider is exhausted or popped
            if let Some(Processor::Lookahead(la)) = self.processors.last() {
                let boundary = self.providers.len() < la.provider_depth
                    || (self.providers.len() == la.provider_depth
                        && self.providers.last().map(|p| p.finished()).unwrap_or(true));
                if boundary {
                    self.finish_lookahead(ctx,false);
                    continue;
                }
            }
            match self.providers.last().map(|p| p.finished()) {
                Some(true) => {
                    if self.providers.len() == 1 {
                        break;
                    }
                    self.pop_provider(ctx);
                    continue;
                },
                Some(false) => {},
                None => break
            }
            let provided = match self.providers.last_mut().and_then(|p| p.get_next()) {
                Some(p) => p,
                None => continue
            };
            self.stmt_count += 1;
            if self.stmt_count > STMT_LIMIT {
                let d = diag(crate::lsp_range(0,0,1),"E077","statement count limit exceeded");
                self.diagnostic_set.entry(self.open_uri.to_string()).or_default().push(d);
                break;
            }
            ctx.stack.advance(lsp::Position::new(provided.line.row,0));
            match self.processors.last_mut() {
                Some(Processor::Lookahead(_)) => {
                    let stmt = StatementParser::parse_lookahead(provided.line);
                    let found = match self.processors.last_mut() {
                        Some(Processor::Lookahead(la)) => la.process(ctx,&stmt,provided.index,provided.kind),
                        _ => false
                    };
                    if found {
                        self.finish_lookahead(ctx,true);
                    }
                },
                Some(Processor::MacroDef(_)) => {
                    let mut diags = Vec::new();
                    let stmt = StatementParser::parse(provided.line);
                    analyzer.analyze(ctx,&stmt,provided.kind,ProcessingKind::MacroDef);
                    let done = match self.processors.last_mut() {
                        Some(Processor::MacroDef(mdp)) => mdp.process(ctx,&stmt,&mut diags),
                        _ => false
                    };
                    self.place_diags(ctx,stmt.uri(),diags);
                    if done {
                        self.processors.pop();
                        // the definition just entered the tables
                        if let Some(id) = ctx.macro_names().into_iter()
                            .max_by_key(|id| ctx.get_macro(*id,usize::MAX)
                                .map(|d| d.defined_gen).unwrap_or(0)) {
                            analyzer.collect_macro(ctx,id);
                        }
                    }
                },
                _ => {
                    self.process_ordinary(ctx,analyzer,&mut debug,provided)?;
                }
            }
        }
        self.finalize(ctx,analyzer);
        Ok(())
    }

    fn finalize(&mut self, ctx: &mut HlasmContext, analyzer: &mut LspAnalyzer) {
        if let Some(Processor::MacroDef(mdp)) = self.processors.last() {
            let (uri,d) = mdp.unterminated();
            self.diagnostic_set.entry(uri.to_string()).or_default().push(d);
            self.processors.pop();
        }
        let mut diags = Vec::new();
        // the implicit literal pool at END
        if ctx.ord.literals.pending_count() > 0 {
            super::processors::asm_ops::flush_literals(ctx,&mut diags);
        }
        ctx.ord.collect_postponed(&ctx.ids,&mut diags);
        let open_uri = self.open_uri.clone();
        self.place_diags(ctx,&open_uri,diags);
        analyzer.finalize(ctx);
        for (uri,d) in analyzer.fade_messages() {
            self.diagnostic_set.entry(uri).or_default().push(d);
        }
    }
}
