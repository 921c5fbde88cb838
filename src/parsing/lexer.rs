//! Logical-line folding.
//!
//! HLASM code occupies columns 1-71; a non-blank column 72 continues the
//! statement on the next line starting at the continue column (default 16).
//! Columns 73-80 are the sequence field.  `ICTL` can change the begin and end
//! columns.  A logical line glues the code segments of its physical lines and
//! remembers where each segment came from so ranges can be mapped back.

use lsp_types as lsp;

/// input format control, 1-based columns as in the ICTL operands
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Ictl {
    pub begin: usize,
    pub end: usize,
    pub continue_col: usize
}

impl Ictl {
    pub fn default_format() -> Self {
        Self { begin: 1, end: 71, continue_col: 16 }
    }
    /// validate ICTL operand values per the assembler rules
    pub fn checked(begin: usize, end: usize, continue_col: usize) -> Option<Self> {
        if !(1..=40).contains(&begin) {
            return None;
        }
        if !(41..=80).contains(&end) || end < begin + 5 {
            return None;
        }
        if continue_col != 0 && (!(2..=40).contains(&continue_col) || continue_col <= begin) {
            return None;
        }
        Some(Self { begin, end, continue_col })
    }
}

/// one physical line as delivered by the preprocessor chain
#[derive(Clone)]
pub struct SourceLine {
    pub text: String,
    pub uri: lsp::Url,
    pub row: u32
}

/// a code segment of a logical line: where it sits physically and logically
#[derive(Clone,Copy,Debug)]
pub struct Segment {
    pub row: u32,
    /// zero-based column of the first code character on the physical row
    pub col: u32,
    pub len: u32,
    /// offset of this segment within the folded text
    pub logical_offset: usize
}

#[derive(Clone)]
pub struct LogicalLine {
    /// folded code text
    pub text: String,
    pub uri: lsp::Url,
    /// first physical row
    pub row: u32,
    pub segments: Vec<Segment>,
    /// column 72 was non-blank on the last physical line
    pub dangling_continuation: bool
}

impl LogicalLine {
    /// map a span of the folded text to a client range; spans crossing a
    /// segment boundary are clipped to the segment they start in
    pub fn map(&self, logical_offset: usize, len: usize) -> lsp::Range {
        for seg in self.segments.iter().rev() {
            if logical_offset >= seg.logical_offset {
                let within = (logical_offset - seg.logical_offset) as u32;
                let start = seg.col + within.min(seg.len);
                let end = seg.col + ((within as usize + len).min(seg.len as usize)) as u32;
                return lsp::Range::new(
                    lsp::Position::new(seg.row,start),
                    lsp::Position::new(seg.row,end.max(start))
                );
            }
        }
        lsp::Range::new(lsp::Position::new(self.row,0),lsp::Position::new(self.row,0))
    }
    pub fn whole_range(&self) -> lsp::Range {
        let last = self.segments.last();
        lsp::Range::new(
            lsp::Position::new(self.row,0),
            match last {
                Some(seg) => lsp::Position::new(seg.row,seg.col+seg.len),
                None => lsp::Position::new(self.row,0)
            }
        )
    }
    pub fn is_comment(&self) -> bool {
        self.text.starts_with('*') || self.text.starts_with(".*")
    }
}

/// Folds physical lines into logical lines under the active ICTL.
pub struct LineFolder {
    pub ictl: Ictl
}

impl LineFolder {
    pub fn new() -> Self {
        Self { ictl: Ictl::default_format() }
    }
    fn code_span<'a>(&self, line: &'a str, first: bool) -> (usize,&'a str,bool) {
        let begin = if first {
            self.ictl.begin - 1
        } else {
            self.ictl.continue_col.max(1) - 1
        };
        let count = line.chars().count();
        let end = self.ictl.end.min(count);
        let continued = self.ictl.continue_col != 0
            && count > self.ictl.end
            && line.chars().nth(self.ictl.end) != Some(' ');
        if begin >= end {
            return (begin,"",continued);
        }
        let byte_begin = line.char_indices().nth(begin).map(|(i,_)| i).unwrap_or(line.len());
        let byte_end = line.char_indices().nth(end).map(|(i,_)| i).unwrap_or(line.len());
        (begin,&line[byte_begin..byte_end],continued)
    }
    /// Fold the logical line starting at `idx`; returns the line and the index
    /// after its last physical row.
    pub fn fold_at(&self, lines: &[SourceLine], idx: usize) -> (LogicalLine,usize) {
        let first = &lines[idx];
        let (col,code,mut continued) = self.code_span(&first.text,true);
        let mut ans = LogicalLine {
            text: String::new(),
            uri: first.uri.clone(),
            row: first.row,
            segments: Vec::new(),
            dangling_continuation: false
        };
        // comment lines never continue
        if code.trim_start().starts_with('*') || code.trim_start().starts_with(".*") {
            continued = false;
        }
        ans.segments.push(Segment { row: first.row, col: col as u32, len: code.trim_end().chars().count() as u32, logical_offset: 0 });
        ans.text.push_str(code.trim_end());
        let mut next = idx + 1;
        while continued {
            if next >= lines.len() {
                ans.dangling_continuation = true;
                break;
            }
            let phys = &lines[next];
            let (col,code,more) = self.code_span(&phys.text,false);
            ans.segments.push(Segment {
                row: phys.row,
                col: col as u32,
                len: code.trim_end().chars().count() as u32,
                logical_offset: ans.text.len()
            });
            ans.text.push_str(code.trim_end());
            continued = more;
            next += 1;
        }
        (ans,next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(lines: &[&str]) -> Vec<SourceLine> {
        let uri = lsp::Url::parse("untitled:t").unwrap();
        lines.iter().enumerate().map(|(row,text)| SourceLine {
            text: text.to_string(), uri: uri.clone(), row: row as u32
        }).collect()
    }

    #[test]
    fn plain_line() {
        let folder = LineFolder::new();
        let lines = src(&["LBL      LR    1,2           a remark"]);
        let (logical,next) = folder.fold_at(&lines,0);
        assert_eq!(next,1);
        assert!(logical.text.starts_with("LBL"));
        assert!(!logical.dangling_continuation);
    }

    #[test]
    fn continuation_folds() {
        let folder = LineFolder::new();
        let mut first = format!("{:<71}","LBL      MVC   A,");
        first.push('X');
        let second = format!("{:<15}{}","","B");
        let lines = src(&[&first,&second]);
        let (logical,next) = folder.fold_at(&lines,0);
        assert_eq!(next,2);
        assert!(logical.text.contains("MVC"));
        assert!(logical.text.ends_with("B"));
        assert_eq!(logical.segments.len(),2);
        assert_eq!(logical.segments[1].col,15);
    }

    #[test]
    fn dangling_continuation_flagged() {
        let folder = LineFolder::new();
        let mut only = format!("{:<71}","LBL      MVC   A,");
        only.push('X');
        let lines = src(&[&only]);
        let (logical,_) = folder.fold_at(&lines,0);
        assert!(logical.dangling_continuation);
    }

    #[test]
    fn sequence_field_ignored() {
        let folder = LineFolder::new();
        let line = format!("{:<71} SEQ00010","         LR    1,2");
        let lines = src(&[&line]);
        let (logical,_) = folder.fold_at(&lines,0);
        assert!(!logical.text.contains("SEQ00010"));
    }

    #[test]
    fn ictl_validation() {
        assert!(Ictl::checked(1,71,16).is_some());
        assert!(Ictl::checked(25,71,16).is_none());
        assert!(Ictl::checked(1,40,16).is_none());
        assert!(Ictl::checked(1,71,0).is_some());
    }
}
