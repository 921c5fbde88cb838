//! Library resolution.
//!
//! Macro and copy members are located by iterating a processor group's
//! libraries in order; the first library that has the member wins.  Loaded
//! text is cached per analysis so repeated `COPY` of one member reads the
//! disk once.

use lsp_types as lsp;
use std::collections::HashMap;
use std::path::PathBuf;
use crate::DYNERR;

/// what the processing manager needs from the outside world
pub trait ParseLibProvider {
    /// locate and read a member; `None` when no library has it
    fn load_member(&mut self, name: &str) -> Option<(lsp::Url,String)>;
    /// member names available, for suggestions on a miss
    fn member_candidates(&mut self) -> Vec<String>;
}

/// resolver with no libraries at all, used for stdin and tests
pub struct NullLibProvider;

impl ParseLibProvider for NullLibProvider {
    fn load_member(&mut self, _name: &str) -> Option<(lsp::Url,String)> {
        None
    }
    fn member_candidates(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// serves members from local directories, case-insensitively by file stem
pub struct LocalLibProvider {
    dirs: Vec<PathBuf>,
    /// member name to resolved content, misses cached too
    cache: HashMap<String,Option<(lsp::Url,String)>>,
    listing: Option<Vec<(String,PathBuf)>>
}

impl LocalLibProvider {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs, cache: HashMap::new(), listing: None }
    }
    pub fn from_uri_list(uris: &[String]) -> Result<Self,DYNERR> {
        let mut dirs = Vec::new();
        for raw in uris {
            if let Ok(uri) = lsp::Url::parse(raw) {
                if let Ok(path) = uri.to_file_path() {
                    dirs.push(path);
                    continue;
                }
            }
            dirs.push(PathBuf::from(raw));
        }
        Ok(Self::new(dirs))
    }
    /// directory scan, done once and memoized
    fn listing(&mut self) -> &Vec<(String,PathBuf)> {
        if self.listing.is_none() {
            let mut ans = Vec::new();
            for dir in &self.dirs {
                let entries = match std::fs::read_dir(dir) {
                    Ok(entries) => entries,
                    Err(e) => {
                        log::warn!("cannot list library {}: {}",dir.display(),e);
                        continue;
                    }
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ans.push((stem.to_uppercase(),path.clone()));
                    }
                }
            }
            self.listing = Some(ans);
        }
        self.listing.as_ref().expect("listing memoized")
    }
}

impl ParseLibProvider for LocalLibProvider {
    fn load_member(&mut self, name: &str) -> Option<(lsp::Url,String)> {
        let key = name.to_uppercase();
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let path = self.listing().iter()
            .find(|(stem,_)| *stem == key)
            .map(|(_,path)| path.clone());
        let resolved = path.and_then(|path| {
            let text = std::fs::read_to_string(&path).ok()?;
            let uri = lsp::Url::from_file_path(&path).ok()?;
            Some((uri,text))
        });
        self.cache.insert(key,resolved.clone());
        resolved
    }
    fn member_candidates(&mut self) -> Vec<String> {
        let mut ans: Vec<String> = self.listing().iter().map(|(stem,_)| stem.clone()).collect();
        ans.sort();
        ans.dedup();
        ans
    }
}

/// serves members from memory, used by tests and the debugger
pub struct MapLibProvider {
    members: HashMap<String,String>
}

impl MapLibProvider {
    pub fn new(members: HashMap<String,String>) -> Self {
        let members = members.into_iter().map(|(k,v)| (k.to_uppercase(),v)).collect();
        Self { members }
    }
}

impl ParseLibProvider for MapLibProvider {
    fn load_member(&mut self, name: &str) -> Option<(lsp::Url,String)> {
        let key = name.to_uppercase();
        let text = self.members.get(&key)?.clone();
        let uri = lsp::Url::parse(&format!("hlasm-lib:///{}",key.to_lowercase())).ok()?;
        Some((uri,text))
    }
    fn member_candidates(&mut self) -> Vec<String> {
        let mut ans: Vec<String> = self.members.keys().cloned().collect();
        ans.sort();
        ans
    }
}
