//! Processing stack frames.
//!
//! Frames identify a point inside macro or copy expansion.  Stacks share
//! common prefixes through a tree of nodes with parent links; a whole stack is
//! identified by the index of its top node.

use lsp_types as lsp;
use super::ids::IdIndex;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum FrameKind {
    OpenCode,
    Macro,
    Copy
}

#[derive(Clone)]
pub struct ProcessingFrame {
    pub pos: lsp::Position,
    pub uri: lsp::Url,
    pub member: Option<IdIndex>,
    pub kind: FrameKind
}

struct FrameNode {
    parent: Option<usize>,
    frame: ProcessingFrame
}

/// identifies one full stack inside the frame tree
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct StackHandle(usize);

pub struct ProcessingStackTree {
    nodes: Vec<FrameNode>,
    top: Option<usize>
}

impl ProcessingStackTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), top: None }
    }
    pub fn push(&mut self, frame: ProcessingFrame) {
        self.nodes.push(FrameNode { parent: self.top, frame });
        self.top = Some(self.nodes.len()-1);
    }
    pub fn pop(&mut self) {
        if let Some(idx) = self.top {
            self.top = self.nodes[idx].parent;
        }
    }
    /// update the position of the current top frame, pushing a sibling node
    /// so earlier handles stay valid
    pub fn advance(&mut self, pos: lsp::Position) {
        if let Some(idx) = self.top {
            let mut frame = self.nodes[idx].frame.clone();
            let parent = self.nodes[idx].parent;
            frame.pos = pos;
            self.nodes.push(FrameNode { parent, frame });
            self.top = Some(self.nodes.len()-1);
        }
    }
    pub fn handle(&self) -> Option<StackHandle> {
        self.top.map(StackHandle)
    }
    pub fn depth(&self) -> usize {
        let mut ans = 0;
        let mut at = self.top;
        while let Some(idx) = at {
            ans += 1;
            at = self.nodes[idx].parent;
        }
        ans
    }
    /// materialize a stack outermost-first
    pub fn frames(&self, handle: Option<StackHandle>) -> Vec<ProcessingFrame> {
        let mut ans = Vec::new();
        let mut at = match handle {
            Some(StackHandle(idx)) => Some(idx),
            None => self.top
        };
        while let Some(idx) = at {
            ans.push(self.nodes[idx].frame.clone());
            at = self.nodes[idx].parent;
        }
        ans.reverse();
        ans
    }
    pub fn top_frame(&self) -> Option<&ProcessingFrame> {
        self.top.map(|idx| &self.nodes[idx].frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(uri: &str, line: u32, kind: FrameKind) -> ProcessingFrame {
        ProcessingFrame {
            pos: lsp::Position::new(line,0),
            uri: lsp::Url::parse(&format!("file:///{}",uri)).unwrap(),
            member: None,
            kind
        }
    }

    #[test]
    fn stacks_share_prefixes() {
        let mut tree = ProcessingStackTree::new();
        tree.push(frame("a",0,FrameKind::OpenCode));
        tree.push(frame("m",1,FrameKind::Macro));
        let inner = tree.handle();
        tree.pop();
        tree.push(frame("c",2,FrameKind::Copy));
        let frames = tree.frames(inner);
        assert_eq!(frames.len(),2);
        assert_eq!(frames[1].kind,FrameKind::Macro);
        assert_eq!(tree.frames(None).len(),2);
        assert_eq!(tree.frames(None)[1].kind,FrameKind::Copy);
    }

    #[test]
    fn advance_keeps_old_handles() {
        let mut tree = ProcessingStackTree::new();
        tree.push(frame("a",0,FrameKind::OpenCode));
        let before = tree.handle();
        tree.advance(lsp::Position::new(5,0));
        assert_eq!(tree.frames(before)[0].pos.line,0);
        assert_eq!(tree.frames(None)[0].pos.line,5);
    }
}
