//! Preprocessor chain.
//!
//! Zero or more source-to-source transforms run over the physical line stream
//! before lexing.  Generated lines carry a virtual-file URI `hlasm://<id>/...`
//! so diagnostics and hover can address them apart from the real source.
//! Implemented transforms: DB2 (`EXEC SQL`), CICS (`EXEC CICS`), and ENDEVOR
//! (`-INC member`).

use lsp_types as lsp;
use std::collections::HashMap;
use crate::parsing::lexer::SourceLine;

/// preprocessor kinds accepted in processor-group configuration
#[derive(Clone,PartialEq,Debug)]
pub enum PreprocessorKind {
    Db2,
    Cics { prolog: bool, epilog: bool },
    Endevor
}

impl PreprocessorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "DB2" => Some(Self::Db2),
            "CICS" => Some(Self::Cics { prolog: true, epilog: true }),
            "ENDEVOR" => Some(Self::Endevor),
            _ => None
        }
    }
}

/// generated content registry for one analysis
pub struct VirtualFiles {
    next_id: usize,
    files: HashMap<usize,(String,String)>
}

impl VirtualFiles {
    pub fn new() -> Self {
        Self { next_id: 0, files: HashMap::new() }
    }
    /// register generated text, returning its `hlasm://` URI
    pub fn add(&mut self, path: &str, text: String) -> lsp::Url {
        let id = self.next_id;
        self.next_id += 1;
        self.files.insert(id,(path.to_string(),text));
        lsp::Url::parse(&format!("hlasm://{}/{}",id,path)).expect("virtual uri")
    }
    pub fn get(&self, id: usize) -> Option<&str> {
        self.files.get(&id).map(|(_,text)| text.as_str())
    }
    /// parse the numeric id out of a `hlasm://` URI
    pub fn id_from_uri(uri: &lsp::Url) -> Option<usize> {
        if uri.scheme() != "hlasm" {
            return None;
        }
        uri.host_str()?.parse().ok()
    }
}

/// a line-stream filter
pub trait Preprocessor {
    fn name(&self) -> &'static str;
    fn process(&mut self, lines: Vec<SourceLine>, vf: &mut VirtualFiles) -> Vec<SourceLine>;
}

fn generated_lines(vf: &mut VirtualFiles, path: &str, text: &str) -> Vec<SourceLine> {
    let uri = vf.add(path,text.to_string());
    text.lines().enumerate().map(|(row,line)| SourceLine {
        text: line.to_string(),
        uri: uri.clone(),
        row: row as u32
    }).collect()
}

/// matcher for `EXEC <word>`, with or without a label field
fn exec_regex(word: &str) -> regex::Regex {
    regex::Regex::new(&format!(r"(?i)^(\S+\s+)?EXEC\s+{}(\s|$)",word)).expect("bad regex")
}

/// DB2: `EXEC SQL ...` statements are commented out and replaced by a call
/// stub; `EXEC SQL INCLUDE SQLCA` injects the communication area layout.
pub struct Db2Preprocessor {
    exec_re: regex::Regex
}

impl Db2Preprocessor {
    pub fn new() -> Self {
        Self { exec_re: exec_regex("SQL") }
    }
}

const SQLCA: &str = "\
SQLCA    DS    0F
SQLCAID  DS    CL8
SQLCABC  DS    F
SQLCODE  DS    F
SQLERRM  DS    H,CL70
SQLERRP  DS    CL8
SQLERRD  DS    6F
SQLWARN  DS    CL8
SQLSTATE DS    CL5
";

impl Preprocessor for Db2Preprocessor {
    fn name(&self) -> &'static str {
        "DB2"
    }
    fn process(&mut self, lines: Vec<SourceLine>, vf: &mut VirtualFiles) -> Vec<SourceLine> {
        let mut ans = Vec::with_capacity(lines.len());
        for line in lines {
            if self.exec_re.is_match(&line.text) {
                let upper = line.text.to_uppercase();
                ans.push(SourceLine { text: format!("*{}",&line.text[..line.text.len().min(70)]), ..line.clone() });
                if upper.contains("INCLUDE SQLCA") {
                    ans.append(&mut generated_lines(vf,"db2/sqlca.hlasm",SQLCA));
                } else {
                    ans.append(&mut generated_lines(vf,"db2/stub.hlasm","         DS    0H\n"));
                }
            } else {
                ans.push(line);
            }
        }
        ans
    }
}

/// CICS: `EXEC CICS ...` statements are replaced by the command-level call
/// stub; prolog/epilog inject the standard DFH working storage around the
/// program when enabled.
pub struct CicsPreprocessor {
    pub prolog: bool,
    pub epilog: bool,
    exec_re: regex::Regex
}

impl CicsPreprocessor {
    pub fn new(prolog: bool, epilog: bool) -> Self {
        Self { prolog, epilog, exec_re: exec_regex("CICS") }
    }
}

const DFH_PROLOG: &str = "\
DFHEISTG DSECT
DFHEIBLK DS    CL88
";

impl Preprocessor for CicsPreprocessor {
    fn name(&self) -> &'static str {
        "CICS"
    }
    fn process(&mut self, lines: Vec<SourceLine>, vf: &mut VirtualFiles) -> Vec<SourceLine> {
        let mut ans = Vec::with_capacity(lines.len());
        if self.prolog {
            ans.append(&mut generated_lines(vf,"cics/prolog.hlasm",DFH_PROLOG));
        }
        for line in lines {
            if self.exec_re.is_match(&line.text) {
                ans.push(SourceLine { text: format!("*{}",&line.text[..line.text.len().min(70)]), ..line.clone() });
                ans.append(&mut generated_lines(vf,"cics/stub.hlasm","         DS    0H\n"));
            } else {
                ans.push(line);
            }
        }
        if self.epilog {
            ans.append(&mut generated_lines(vf,"cics/epilog.hlasm","         DS    0H\n"));
        }
        ans
    }
}

/// ENDEVOR: `-INC member` includes library members inline.  Resolution happens
/// through the closure supplied by the workspace, keeping this filter free of
/// file access.
pub struct EndevorPreprocessor<'a> {
    pub lookup: Box<dyn FnMut(&str) -> Option<String> + 'a>
}

impl<'a> Preprocessor for EndevorPreprocessor<'a> {
    fn name(&self) -> &'static str {
        "ENDEVOR"
    }
    fn process(&mut self, lines: Vec<SourceLine>, vf: &mut VirtualFiles) -> Vec<SourceLine> {
        let mut ans = Vec::with_capacity(lines.len());
        for line in lines {
            let trimmed = line.text.trim();
            if let Some(member) = trimmed.strip_prefix("-INC ").or_else(|| trimmed.strip_prefix("++INCLUDE ")) {
                let member = member.trim();
                match (self.lookup)(member) {
                    Some(text) => {
                        ans.append(&mut generated_lines(vf,&format!("endevor/{}.hlasm",member.to_lowercase()),&text));
                    },
                    None => {
                        // leave the unresolved include visible to diagnostics
                        ans.push(line);
                    }
                }
            } else {
                ans.push(line);
            }
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(lines: &[&str]) -> Vec<SourceLine> {
        let uri = lsp::Url::parse("file:///prog.hlasm").unwrap();
        lines.iter().enumerate().map(|(row,text)| SourceLine {
            text: text.to_string(), uri: uri.clone(), row: row as u32
        }).collect()
    }

    #[test]
    fn db2_include_sqlca() {
        let mut vf = VirtualFiles::new();
        let mut pp = Db2Preprocessor::new();
        let out = pp.process(src(&["         EXEC SQL INCLUDE SQLCA"]),&mut vf);
        assert!(out[0].text.starts_with('*'));
        assert!(out.iter().any(|l| l.text.starts_with("SQLCODE")));
        assert!(out.iter().any(|l| l.uri.scheme() == "hlasm"));
    }

    #[test]
    fn cics_stub_and_prolog() {
        let mut vf = VirtualFiles::new();
        let mut pp = CicsPreprocessor::new(true,false);
        let out = pp.process(src(&["         EXEC CICS RETURN"]),&mut vf);
        assert!(out.iter().any(|l| l.text.starts_with("DFHEISTG")));
        assert!(out.iter().any(|l| l.text.starts_with('*')));
    }

    #[test]
    fn endevor_includes() {
        let mut vf = VirtualFiles::new();
        let mut pp = EndevorPreprocessor {
            lookup: Box::new(|m| if m == "PAYROLL" { Some("WAGE     DS    F\n".to_string()) } else { None })
        };
        let out = pp.process(src(&["-INC PAYROLL"]),&mut vf);
        assert_eq!(out.len(),1);
        assert!(out[0].text.starts_with("WAGE"));
    }

    #[test]
    fn virtual_uri_roundtrip() {
        let mut vf = VirtualFiles::new();
        let uri = vf.add("db2/stub.hlasm","X".to_string());
        let id = VirtualFiles::id_from_uri(&uri).unwrap();
        assert_eq!(vf.get(id),Some("X"));
    }
}
