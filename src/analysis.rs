//! # Analysis facade
//!
//! One `Analyzer` value runs one document at a time through the full
//! pipeline: processor-group resolution, the preprocessor chain, the
//! processing manager, and the end-of-analysis sweeps.  Used by the CLI, the
//! LSP server (on worker threads) and the debugger.

use lsp_types as lsp;
use std::collections::HashMap;
use std::io::Read;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::{DYNERR,Document,STDRESULT};
use crate::context::HlasmContext;
use crate::debugging::DebugListener;
use crate::diagnostics::{diag,suppressed};
use crate::handbook::Optable;
use crate::lsp::Symbols;
use crate::lsp::analyzer::LspAnalyzer;
use crate::parsing::SourceLine;
use crate::processing::manager::ProcessingManager;
use crate::processing::preprocessor::{CicsPreprocessor,Db2Preprocessor,EndevorPreprocessor,Preprocessor,PreprocessorKind,VirtualFiles};
use crate::server::Analysis;
use crate::workspace::{AsmOptions,BridgeConfig,ProcessorGroup,WorkspaceConfig,parse_bridge_json,parse_pgm_conf,parse_proc_grps};
use crate::workspace::libraries::{LocalLibProvider,NullLibProvider,ParseLibProvider};

/// diagnostics kept per file when the implicit processor group is in use
const SUP_LIMIT: usize = 10;

pub struct Analyzer {
    config: WorkspaceConfig,
    bridge: Option<BridgeConfig>,
    workspace_folders: Vec<lsp::Url>,
    /// options used when no processor group configures them
    fallback_options: AsmOptions,
    diagnostic_set: HashMap<String,Vec<lsp::Diagnostic>>,
    symbols: Symbols,
    virtual_files: VirtualFiles,
    cancel: Option<Arc<AtomicBool>>,
    /// `hlasm/toggle_non_critical_configuration_diagnostics`
    pub suppress_config_diags: bool
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            config: WorkspaceConfig::empty(),
            bridge: None,
            workspace_folders: Vec::new(),
            fallback_options: AsmOptions::new(),
            diagnostic_set: HashMap::new(),
            symbols: Symbols::new(),
            virtual_files: VirtualFiles::new(),
            cancel: None,
            suppress_config_diags: false
        }
    }
    pub fn with_optable(optable: Optable) -> Self {
        let mut ans = Self::new();
        ans.fallback_options.optable = optable;
        ans
    }
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }
    pub fn get_symbols(&self) -> Symbols {
        self.symbols.clone()
    }
    pub fn get_virtual_file(&self, id: usize) -> Option<String> {
        self.virtual_files.get(id).map(|s| s.to_string())
    }

    fn group_for_doc(&self, doc: &Document) -> (ProcessorGroup,bool) {
        let path = doc.uri.to_file_path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| doc.uri.path().to_string());
        match self.config.group_for(&path,self.bridge.as_ref()) {
            Some(group) => {
                let mut group = group.clone();
                if let Some(overrides) = self.config.overrides_for(&path) {
                    group.asm_options = overrides.clone();
                }
                (group,false)
            },
            None => {
                let mut group = ProcessorGroup::implicit();
                group.asm_options = self.fallback_options.clone();
                (group,true)
            }
        }
    }

    fn build_lib_provider(&self, doc: &Document, group: &ProcessorGroup) -> Box<dyn ParseLibProvider> {
        if group.libs.is_empty() {
            return Box::new(NullLibProvider);
        }
        let mut dirs = Vec::new();
        let doc_dir = doc.uri.to_file_path().ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()));
        for lib in &group.libs {
            let path = std::path::PathBuf::from(&lib.path);
            if path.is_absolute() {
                dirs.push(path);
                continue;
            }
            // relative paths resolve against workspace folders, then the document
            let mut found = false;
            for folder in &self.workspace_folders {
                if let Ok(base) = folder.to_file_path() {
                    let candidate = base.join(&lib.path);
                    if candidate.is_dir() {
                        dirs.push(candidate);
                        found = true;
                        break;
                    }
                }
            }
            if !found {
                if let Some(base) = &doc_dir {
                    dirs.push(base.join(&lib.path));
                } else if !lib.optional {
                    log::warn!("library path {} cannot be resolved",lib.path);
                }
            }
        }
        Box::new(LocalLibProvider::new(dirs))
    }

    fn preprocess(&mut self, doc: &Document, group: &ProcessorGroup,
        lib: &mut dyn ParseLibProvider) -> Vec<SourceLine>
    {
        let mut lines: Vec<SourceLine> = doc.text.lines().enumerate().map(|(row,text)| SourceLine {
            text: text.to_string(),
            uri: doc.uri.clone(),
            row: row as u32
        }).collect();
        for kind in &group.preprocessors {
            lines = match kind {
                PreprocessorKind::Db2 => Db2Preprocessor::new().process(lines,&mut self.virtual_files),
                PreprocessorKind::Cics { prolog, epilog } => {
                    let mut pp = CicsPreprocessor::new(*prolog,*epilog);
                    pp.process(lines,&mut self.virtual_files)
                },
                PreprocessorKind::Endevor => {
                    let mut pp = EndevorPreprocessor {
                        lookup: Box::new(|member| lib.load_member(member).map(|(_,text)| text))
                    };
                    pp.process(lines,&mut self.virtual_files)
                }
            };
        }
        lines
    }

    fn run_pipeline(&mut self, doc: &Document, debug: Option<&mut dyn DebugListener>) -> STDRESULT {
        self.diagnostic_set = HashMap::new();
        self.symbols = Symbols::new();
        self.virtual_files = VirtualFiles::new();
        let (group,implicit) = self.group_for_doc(doc);
        let mut lib = self.build_lib_provider(doc,&group);
        let lines = self.preprocess(doc,&group,lib.as_mut());
        let options = group.asm_options.clone();
        let cancel = self.cancel.clone();
        let uri = doc.uri.clone();
        let notes: Vec<(String,String)> = self.config.notes.iter()
            .map(|n| (n.code.clone(),n.message.clone()))
            .collect();

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = HlasmContext::new(options.optable,options.sysparm.clone(),options.system_id.clone());
            let mut lsp_analyzer = LspAnalyzer::new();
            let mut manager = ProcessingManager::new(lib.as_mut(),cancel,uri.clone());
            let result = manager.run(&mut ctx,lines,&mut lsp_analyzer,debug);
            (result,manager.diagnostic_set,lsp_analyzer.symbols)
        }));
        match outcome {
            Ok((result,diagnostic_set,symbols)) => {
                self.diagnostic_set = diagnostic_set;
                self.symbols = symbols;
                if let Err(e) = result {
                    if matches!(e,crate::Error::Cancelled) {
                        return Err(Box::new(e));
                    }
                }
            },
            Err(_) => {
                log::error!("analysis of {} crashed",doc.uri);
                self.diagnostic_set.insert(doc.uri.to_string(),
                    vec![diag(crate::lsp_range(0,0,1),"CRASH","analysis crashed, results were discarded")]);
                return Ok(());
            }
        }
        // configuration notes attach to the analyzed document
        if !self.suppress_config_diags {
            let entry = self.diagnostic_set.entry(doc.uri.to_string()).or_default();
            for (code,message) in notes {
                entry.push(diag(crate::lsp_range(0,0,1),&code,&message));
            }
        }
        // without a processor group, diagnostics beyond a limit are suppressed
        if implicit {
            for diags in self.diagnostic_set.values_mut() {
                if diags.len() > SUP_LIMIT {
                    diags.truncate(SUP_LIMIT);
                    diags.push(suppressed(crate::lsp_range(0,0,1)));
                }
            }
        }
        Ok(())
    }

    pub fn analyze_with_debugger(&mut self, doc: &Document, listener: &mut dyn DebugListener) -> STDRESULT {
        self.run_pipeline(doc,Some(listener))
    }
}

impl Analysis for Analyzer {
    fn init_workspace(&mut self, folders: Vec<lsp::Url>) -> STDRESULT {
        self.workspace_folders = folders;
        for folder in self.workspace_folders.clone() {
            let base = match folder.to_file_path() {
                Ok(base) => base,
                Err(_) => continue
            };
            let grps = base.join(".hlasmplugin").join("proc_grps.json");
            if let Ok(text) = std::fs::read_to_string(&grps) {
                self.config = parse_proc_grps(&text);
            }
            let pgms = base.join(".hlasmplugin").join("pgm_conf.json");
            if let Ok(text) = std::fs::read_to_string(&pgms) {
                parse_pgm_conf(&mut self.config,&text);
            }
            let bridge = base.join(".bridge.json");
            if let Ok(text) = std::fs::read_to_string(&bridge) {
                self.bridge = Some(parse_bridge_json(&text,&mut self.config.notes));
            }
        }
        Ok(())
    }
    fn analyze(&mut self, doc: &Document) -> STDRESULT {
        self.run_pipeline(doc,None)
    }
    fn update_config(&mut self, json: &str) -> STDRESULT {
        let root: serde_json::Value = serde_json::from_str(json)?;
        if let Some(val) = root.get("optable").and_then(|v| v.as_str()) {
            match Optable::parse(val) {
                Some(parsed) => self.fallback_options.optable = parsed,
                None => return Err(Box::new(crate::Error::Config) as DYNERR)
            }
        }
        if let Some(val) = root.get("sysparm").and_then(|v| v.as_str()) {
            self.fallback_options.sysparm = val.chars().take(crate::workspace::SYSPARM_MAX).collect();
        }
        crate::update_json_bool(&root,"suppressConfigDiagnostics",&mut self.suppress_config_diags);
        Ok(())
    }
    fn get_diags(&self, doc: &Document) -> Vec<lsp::Diagnostic> {
        match self.diagnostic_set.get(&doc.uri.to_string()) {
            Some(diags) => diags.clone(),
            None => Vec::new()
        }
    }
    fn diagnosed_files(&self) -> Vec<String> {
        let mut ans: Vec<String> = self.diagnostic_set.keys().cloned().collect();
        ans.sort();
        ans
    }
    fn err_warn_info_counts(&self) -> [usize;3] {
        let mut err = 0;
        let mut warn = 0;
        let mut info = 0;
        for diags in self.diagnostic_set.values() {
            for item in diags {
                match item.severity {
                    Some(lsp::DiagnosticSeverity::ERROR) => err += 1,
                    Some(lsp::DiagnosticSeverity::WARNING) => warn += 1,
                    Some(lsp::DiagnosticSeverity::INFORMATION) => info += 1,
                    _ => {}
                }
            }
        }
        [err,warn,info]
    }
    fn read_stdin(&self) -> String {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("reading source from console, end with ^D");
        }
        let mut program = String::new();
        std::io::stdin().read_to_string(&mut program).expect("failed to read stdin");
        program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_untitled(text: &str) -> (Analyzer,Document) {
        let doc = Document::untitled(text.to_string());
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&doc).expect("analysis completes");
        (analyzer,doc)
    }

    #[test]
    fn clean_source_has_no_diags() {
        let (analyzer,doc) = analyze_untitled("A        EQU   1\nB        EQU   A+1\n");
        assert!(analyzer.get_diags(&doc).is_empty());
        assert_eq!(analyzer.err_warn_info_counts(),[0,0,0]);
        assert!(analyzer.get_symbols().ords.contains_key("A"));
    }

    #[test]
    fn implicit_group_suppresses_past_limit() {
        // no processor group matches an untitled document, so the implicit
        // group caps the diagnostics and appends the SUP notice
        let mut source = String::new();
        for i in 0..SUP_LIMIT+5 {
            source.push_str(&format!("         BOGUSOP{}\n",i));
        }
        let (analyzer,doc) = analyze_untitled(&source);
        let diags = analyzer.get_diags(&doc);
        assert_eq!(diags.len(),SUP_LIMIT+1);
        let last = diags.last().unwrap();
        assert!(matches!(&last.code,Some(lsp::NumberOrString::String(s)) if s == "SUP"));
    }

    #[test]
    fn reanalysis_is_idempotent() {
        let doc = Document::untitled("A        EQU   B\nB        EQU   A\n".to_string());
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&doc).expect("first run");
        let first: Vec<String> = analyzer.get_diags(&doc).iter().map(|d| format!("{:?}",d.code)).collect();
        analyzer.analyze(&doc).expect("second run");
        let second: Vec<String> = analyzer.get_diags(&doc).iter().map(|d| format!("{:?}",d.code)).collect();
        assert_eq!(first,second);
        assert!(!first.is_empty());
    }

    #[test]
    fn update_config_changes_optable() {
        let mut analyzer = Analyzer::new();
        analyzer.update_config(r#"{"optable":"370"}"#).expect("valid config");
        let doc = Document::untitled("         LGR   1,2\n".to_string());
        analyzer.analyze(&doc).expect("analysis completes");
        assert!(analyzer.get_diags(&doc).iter().any(|d| {
            matches!(&d.code,Some(lsp::NumberOrString::String(s)) if s == "E049")
        }));
        assert!(analyzer.update_config(r#"{"optable":"NOPE"}"#).is_err());
    }
}
