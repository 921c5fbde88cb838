//! # Workspace configuration
//!
//! `.hlasmplugin/proc_grps.json` defines processor groups (libraries,
//! assembler options, preprocessors); `.hlasmplugin/pgm_conf.json` binds
//! programs to groups by glob pattern with per-program option overrides; a
//! `.bridge.json` supplies an alternate mapping when no `pgm_conf` entry
//! matches.  Parsing uses explicit JSON walkers so partial or slightly wrong
//! files still yield a usable configuration plus diagnostics.

use globset::{Glob,GlobMatcher};
use std::collections::HashMap;
use crate::handbook::Optable;
use crate::processing::preprocessor::PreprocessorKind;
use crate::update_json_bool;

pub mod libraries;

pub const SYSPARM_MAX: usize = 255;

#[derive(Clone)]
pub struct AsmOptions {
    pub sysparm: String,
    pub profile: String,
    pub optable: Optable,
    pub system_id: String,
    pub goff: bool,
    pub rent: bool
}

impl AsmOptions {
    pub fn new() -> Self {
        Self {
            sysparm: String::new(),
            profile: String::new(),
            optable: Optable::Uni,
            system_id: String::new(),
            goff: false,
            rent: false
        }
    }
}

#[derive(Clone)]
pub struct Library {
    pub path: String,
    pub optional: bool
}

#[derive(Clone)]
pub struct ProcessorGroup {
    pub name: String,
    pub libs: Vec<Library>,
    pub asm_options: AsmOptions,
    pub preprocessors: Vec<PreprocessorKind>
}

impl ProcessorGroup {
    pub fn implicit() -> Self {
        Self {
            name: String::new(),
            libs: Vec::new(),
            asm_options: AsmOptions::new(),
            preprocessors: Vec::new()
        }
    }
}

pub struct PgmBinding {
    pub pattern: GlobMatcher,
    pub group: String,
    pub overrides: Option<AsmOptions>
}

/// configuration diagnostics are plain pairs so callers can place them
pub struct ConfigNote {
    pub code: String,
    pub message: String
}

pub struct WorkspaceConfig {
    pub groups: HashMap<String,ProcessorGroup>,
    pub bindings: Vec<PgmBinding>,
    pub notes: Vec<ConfigNote>
}

fn note(notes: &mut Vec<ConfigNote>, code: &str, message: String) {
    notes.push(ConfigNote { code: code.to_string(), message });
}

fn parse_asm_options(obj: &serde_json::Value, base: AsmOptions, notes: &mut Vec<ConfigNote>) -> AsmOptions {
    let mut ans = base;
    if let Some(val) = obj.get("SYSPARM").and_then(|v| v.as_str()) {
        if val.len() > SYSPARM_MAX {
            note(notes,"W010",format!("SYSPARM longer than {} characters was truncated",SYSPARM_MAX));
            ans.sysparm = val[..SYSPARM_MAX].to_string();
        } else {
            ans.sysparm = val.to_string();
        }
    }
    if let Some(val) = obj.get("PROFILE").and_then(|v| v.as_str()) {
        ans.profile = val.to_string();
    }
    if let Some(val) = obj.get("OPTABLE").and_then(|v| v.as_str()) {
        match Optable::parse(val) {
            Some(parsed) => ans.optable = parsed,
            None => note(notes,"W010",format!("unrecognized OPTABLE {}",val))
        }
    }
    if let Some(val) = obj.get("SYSTEM_ID").and_then(|v| v.as_str()) {
        ans.system_id = val.to_string();
    }
    update_json_bool(obj,"GOFF",&mut ans.goff);
    update_json_bool(obj,"XOBJECT",&mut ans.goff);
    update_json_bool(obj,"RENT",&mut ans.rent);
    ans
}

/// parse `proc_grps.json` text
pub fn parse_proc_grps(json: &str) -> WorkspaceConfig {
    let mut groups = HashMap::new();
    let mut notes = Vec::new();
    let root: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            note(&mut notes,"L0001",format!("proc_grps.json does not parse: {}",e));
            return WorkspaceConfig { groups, bindings: Vec::new(), notes };
        }
    };
    let list = match root.get("pgroups").and_then(|v| v.as_array()) {
        Some(list) => list,
        None => {
            note(&mut notes,"L0001","proc_grps.json has no pgroups array".to_string());
            return WorkspaceConfig { groups, bindings: Vec::new(), notes };
        }
    };
    for entry in list {
        let name = match entry.get("name").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => {
                note(&mut notes,"L0002","processor group without a name was skipped".to_string());
                continue;
            }
        };
        let mut libs = Vec::new();
        if let Some(lib_list) = entry.get("libs").and_then(|v| v.as_array()) {
            for lib in lib_list {
                match lib {
                    serde_json::Value::String(path) => libs.push(Library { path: path.clone(), optional: false }),
                    serde_json::Value::Object(_) => {
                        let path = lib.get("path").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        let mut optional = false;
                        update_json_bool(lib,"optional",&mut optional);
                        if path.is_empty() {
                            note(&mut notes,"L0002",format!("library without a path in group {}",name));
                        } else {
                            libs.push(Library { path, optional });
                        }
                    },
                    _ => note(&mut notes,"L0002",format!("unusable library entry in group {}",name))
                }
            }
        }
        let asm_options = match entry.get("asm_options") {
            Some(obj) => parse_asm_options(obj,AsmOptions::new(),&mut notes),
            None => AsmOptions::new()
        };
        let mut preprocessors = Vec::new();
        if let Some(pp) = entry.get("preprocessor") {
            collect_preprocessors(pp,&mut preprocessors,&mut notes);
        }
        groups.insert(name.clone(),ProcessorGroup { name, libs, asm_options, preprocessors });
    }
    WorkspaceConfig { groups, bindings: Vec::new(), notes }
}

fn collect_preprocessors(val: &serde_json::Value, ans: &mut Vec<PreprocessorKind>, notes: &mut Vec<ConfigNote>) {
    match val {
        serde_json::Value::String(name) => {
            match PreprocessorKind::parse(name) {
                Some(kind) => ans.push(kind),
                None => note(notes,"L0002",format!("unknown preprocessor {}",name))
            }
        },
        serde_json::Value::Object(_) => {
            if let Some(name) = val.get("name").and_then(|v| v.as_str()) {
                match PreprocessorKind::parse(name) {
                    Some(mut kind) => {
                        if let PreprocessorKind::Cics { prolog, epilog } = &mut kind {
                            if let Some(opts) = val.get("options").and_then(|v| v.as_array()) {
                                let texts: Vec<String> = opts.iter()
                                    .filter_map(|v| v.as_str().map(|s| s.to_uppercase()))
                                    .collect();
                                *prolog = !texts.contains(&"NOPROLOG".to_string());
                                *epilog = !texts.contains(&"NOEPILOG".to_string());
                            }
                        }
                        ans.push(kind);
                    },
                    None => note(notes,"L0002",format!("unknown preprocessor {}",name))
                }
            }
        },
        serde_json::Value::Array(list) => {
            for item in list {
                collect_preprocessors(item,ans,notes);
            }
        },
        _ => {}
    }
}

/// parse `pgm_conf.json` and fold the bindings into the configuration
pub fn parse_pgm_conf(config: &mut WorkspaceConfig, json: &str) {
    let root: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            note(&mut config.notes,"L0001",format!("pgm_conf.json does not parse: {}",e));
            return;
        }
    };
    let list = match root.get("pgms").and_then(|v| v.as_array()) {
        Some(list) => list,
        None => {
            note(&mut config.notes,"L0001","pgm_conf.json has no pgms array".to_string());
            return;
        }
    };
    for entry in list {
        let program = entry.get("program").and_then(|v| v.as_str()).unwrap_or("");
        let group = entry.get("pgroup").and_then(|v| v.as_str()).unwrap_or("");
        if program.is_empty() || group.is_empty() {
            note(&mut config.notes,"L0002","pgm_conf entry needs program and pgroup".to_string());
            continue;
        }
        let pattern = match Glob::new(program) {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                note(&mut config.notes,"L0002",format!("bad program pattern {}: {}",program,e));
                continue;
            }
        };
        let overrides = entry.get("asm_options")
            .map(|obj| parse_asm_options(obj,AsmOptions::new(),&mut config.notes));
        config.bindings.push(PgmBinding { pattern, group: group.to_string(), overrides });
    }
}

/// `.bridge.json` supplies `elements` and a default group, consulted only
/// when no pgm_conf binding matched
pub struct BridgeConfig {
    pub elements: HashMap<String,String>,
    pub default_group: Option<String>
}

pub fn parse_bridge_json(json: &str, notes: &mut Vec<ConfigNote>) -> BridgeConfig {
    let mut ans = BridgeConfig { elements: HashMap::new(), default_group: None };
    let root: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            note(notes,"B4G001",format!(".bridge.json does not parse: {}",e));
            return ans;
        }
    };
    if let Some(map) = root.get("elements").and_then(|v| v.as_object()) {
        for (element,value) in map {
            if let Some(group) = value.get("processorGroup").and_then(|v| v.as_str()) {
                ans.elements.insert(element.to_uppercase(),group.to_string());
            }
        }
    }
    ans.default_group = root.get("defaultProcessorGroup")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    ans
}

impl WorkspaceConfig {
    pub fn empty() -> Self {
        Self { groups: HashMap::new(), bindings: Vec::new(), notes: Vec::new() }
    }
    /// The group a program belongs to.  `None` means no binding matched and
    /// the caller should use the implicit group and the `SUP` notice.
    pub fn group_for(&self, program_path: &str, bridge: Option<&BridgeConfig>) -> Option<&ProcessorGroup> {
        for binding in &self.bindings {
            if binding.pattern.is_match(program_path) {
                return self.groups.get(&binding.group);
            }
        }
        if let Some(bridge) = bridge {
            let element = std::path::Path::new(program_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_uppercase())
                .unwrap_or_default();
            if let Some(group) = bridge.elements.get(&element) {
                return self.groups.get(group);
            }
            if let Some(group) = &bridge.default_group {
                return self.groups.get(group);
            }
        }
        None
    }
    /// per-program option overrides from the first matching binding
    pub fn overrides_for(&self, program_path: &str) -> Option<&AsmOptions> {
        self.bindings.iter()
            .find(|b| b.pattern.is_match(program_path))
            .and_then(|b| b.overrides.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_GRPS: &str = r#"{
        "pgroups": [
            {
                "name": "GROUP1",
                "libs": ["libs/",{"path":"more/","optional":true}],
                "asm_options": {"SYSPARM":"DEBUG","OPTABLE":"Z15"},
                "preprocessor": ["DB2",{"name":"CICS","options":["NOPROLOG"]}]
            }
        ]
    }"#;

    #[test]
    fn proc_grps_parses() {
        let config = parse_proc_grps(PROC_GRPS);
        let group = config.groups.get("GROUP1").expect("group");
        assert_eq!(group.libs.len(),2);
        assert!(group.libs[1].optional);
        assert_eq!(group.asm_options.sysparm,"DEBUG");
        assert_eq!(group.asm_options.optable,Optable::Z15);
        assert_eq!(group.preprocessors.len(),2);
        assert_eq!(group.preprocessors[1],PreprocessorKind::Cics { prolog: false, epilog: true });
        assert!(config.notes.is_empty());
    }

    #[test]
    fn pgm_conf_binds_by_glob() {
        let mut config = parse_proc_grps(PROC_GRPS);
        parse_pgm_conf(&mut config,r#"{
            "pgms": [ {"program": "source/*.hlasm", "pgroup": "GROUP1"} ]
        }"#);
        assert!(config.group_for("source/payroll.hlasm",None).is_some());
        assert!(config.group_for("elsewhere/payroll.hlasm",None).is_none());
    }

    #[test]
    fn bridge_applies_after_pgm_conf() {
        let config = parse_proc_grps(PROC_GRPS);
        let mut notes = Vec::new();
        let bridge = parse_bridge_json(r#"{
            "elements": {"PAYROLL": {"processorGroup": "GROUP1"}},
            "defaultProcessorGroup": "GROUP1"
        }"#,&mut notes);
        assert!(config.group_for("any/payroll.hlasm",Some(&bridge)).is_some());
        assert!(notes.is_empty());
    }

    #[test]
    fn sysparm_limit_enforced() {
        let json = format!(r#"{{"pgroups":[{{"name":"G","asm_options":{{"SYSPARM":"{}"}}}}]}}"#,
            "X".repeat(300));
        let config = parse_proc_grps(&json);
        assert_eq!(config.groups.get("G").unwrap().asm_options.sysparm.len(),SYSPARM_MAX);
        assert_eq!(config.notes.len(),1);
    }

    #[test]
    fn broken_json_reports_note() {
        let config = parse_proc_grps("{not json");
        assert!(config.groups.is_empty());
        assert_eq!(config.notes[0].code,"L0001");
    }
}
