use lsp_types as lsp;
use std::collections::HashMap;
use crate::context::HlasmContext;
use crate::context::ordinary::symbol::SymbolValue;
use crate::handbook::Optable;
use crate::lsp::analyzer::LspAnalyzer;
use crate::parsing::SourceLine;
use crate::workspace::libraries::MapLibProvider;
use super::manager::ProcessingManager;

struct Run {
    ctx: HlasmContext,
    diags: HashMap<String,Vec<lsp::Diagnostic>>,
    symbols: crate::lsp::Symbols,
    uri: lsp::Url
}

fn analyze_with_members(text: &str, members: &[(&str,&str)]) -> Run {
    let uri = lsp::Url::parse("untitled:test").unwrap();
    let lines: Vec<SourceLine> = text.lines().enumerate().map(|(row,line)| SourceLine {
        text: line.to_string(),
        uri: uri.clone(),
        row: row as u32
    }).collect();
    let mut ctx = HlasmContext::new(Optable::Uni,String::new(),String::new());
    let mut lib = MapLibProvider::new(members.iter()
        .map(|(k,v)| (k.to_string(),v.to_string()))
        .collect());
    let mut analyzer = LspAnalyzer::new();
    let mut manager = ProcessingManager::new(&mut lib,None,uri.clone());
    manager.run(&mut ctx,lines,&mut analyzer,None).expect("analysis completes");
    Run {
        ctx,
        diags: manager.diagnostic_set,
        symbols: analyzer.symbols,
        uri
    }
}

fn analyze(text: &str) -> Run {
    analyze_with_members(text,&[])
}

impl Run {
    fn abs(&self, name: &str) -> Option<i32> {
        let id = self.ctx.ids.get(name)?;
        match self.ctx.ord.symbol(id)?.value {
            SymbolValue::Absolute(v) => Some(v),
            _ => None
        }
    }
    fn reloc_offset(&self, name: &str) -> Option<i32> {
        let id = self.ctx.ids.get(name)?;
        match &self.ctx.ord.symbol(id)?.value {
            SymbolValue::Reloc(addr) => Some(addr.normalize(&self.ctx.ord.spaces).offset),
            _ => None
        }
    }
    fn var_a(&self, name: &str, subscript: Option<usize>) -> Option<i32> {
        let id = self.ctx.ids.get(name)?;
        self.ctx.var_lookup(id)?.get_a(subscript)
    }
    fn all_codes(&self) -> Vec<String> {
        let mut ans = Vec::new();
        for diags in self.diags.values() {
            for d in diags {
                if let Some(lsp::NumberOrString::String(code)) = &d.code {
                    ans.push(code.clone());
                }
            }
        }
        ans.sort();
        ans
    }
    fn codes_without_fades(&self) -> Vec<String> {
        self.all_codes().into_iter().filter(|c| c != "F_IN001").collect()
    }
}

#[test]
fn forward_reference_resolution() {
    let run = analyze("\
A        EQU   B+1
B        EQU   2
");
    assert_eq!(run.abs("A"),Some(3));
    assert_eq!(run.abs("B"),Some(2));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn self_referential_set() {
    let run = analyze("&VAR(N'&VAR+1) SETA N'&VAR+1\n");
    assert_eq!(run.var_a("VAR",Some(1)),Some(2));
    let id = run.ctx.ids.get("VAR").unwrap();
    assert_eq!(run.ctx.var_lookup(id).unwrap().count(),1);
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn dependency_cycle() {
    let run = analyze("\
A        EQU   B
B        EQU   A
");
    let codes = run.all_codes();
    assert_eq!(codes.iter().filter(|c| *c == "E033").count(),1,"{:?}",codes);
    assert_eq!(run.abs("A"),Some(0));
    assert_eq!(run.abs("B"),Some(0));
}

#[test]
fn actr_exhaustion_terminates() {
    let run = analyze("\
.L       ANOP
         LR    1,1
         AGO   .L
");
    assert!(run.all_codes().contains(&"E056".to_string()),"{:?}",run.all_codes());
}

#[test]
fn lookahead_attribute() {
    let run = analyze("\
&A       SETA  L'L1
L1       DS    CL10
X        EQU   &A
");
    assert_eq!(run.var_a("A",None),Some(10));
    assert_eq!(run.abs("X"),Some(10));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn data_def_attribute_forward_in_dc() {
    let run = analyze("\
L1       DS    CL10
         DC    A(L'L1)
");
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
    let id = run.ctx.ids.get("L1").unwrap();
    assert_eq!(run.ctx.ord.symbol(id).unwrap().attrs.l,10);
}

#[test]
fn opcode_suggestion_on_unknown() {
    let run = analyze("         LHIXXX 1,2\n");
    let diags: Vec<&lsp::Diagnostic> = run.diags.values().flatten().collect();
    let e049 = diags.iter().find(|d| {
        matches!(&d.code,Some(lsp::NumberOrString::String(s)) if s == "E049")
    }).expect("E049 reported");
    assert!(e049.message.contains("LHI"),"{}",e049.message);
}

#[test]
fn sequence_branching_and_fade() {
    let run = analyze("\
         AGO   .SKIP
Y        EQU   1
.SKIP    ANOP
Z        EQU   2
");
    assert_eq!(run.abs("Z"),Some(2));
    assert!(run.ctx.ids.get("Y").and_then(|id| run.ctx.ord.symbol(id)).is_none());
    // the skipped statement fades
    assert!(run.all_codes().contains(&"F_IN001".to_string()),"{:?}",run.all_codes());
}

#[test]
fn conditional_loop_counts() {
    let run = analyze("\
&I       SETA  0
.LOOP    ANOP
&I       SETA  &I+1
         AIF   (&I LT 3).LOOP
X        EQU   &I
");
    assert_eq!(run.abs("X"),Some(3));
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn macro_definition_and_call() {
    let run = analyze("\
         MACRO
&L       GREET &WHO,&PFX=HI
&L       DC    C'&PFX &WHO'
         MEND
TAG      GREET WORLD
");
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
    let id = run.ctx.ids.get("TAG").expect("TAG interned");
    let sym = run.ctx.ord.symbol(id).expect("TAG defined");
    assert_eq!(sym.attrs.t,'C');
    assert_eq!(sym.attrs.l,8);
    assert!(run.symbols.macros.contains_key("GREET"));
    assert_eq!(run.symbols.macro_info.get("GREET").unwrap().calls,1);
}

#[test]
fn macro_sysndx_and_mexit() {
    let run = analyze("\
         MACRO
         COUNT
&N       SETC  '&SYSNDX'
         MEXIT
         DC    F'0'
         MEND
         COUNT
         COUNT
");
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
    // the statement after MEXIT never assembles
    assert_eq!(run.ctx.ord.sections.len(),0);
}

#[test]
fn keyword_and_positional_arguments() {
    let run = analyze("\
         MACRO
         STORE &A,&B=4
X&SYSNDX EQU   &A+&B
         MEND
         STORE 1
         STORE 2,B=10
");
    assert_eq!(run.abs("X0001"),Some(5));
    assert_eq!(run.abs("X0002"),Some(12));
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn copy_member_inclusion() {
    let run = analyze_with_members(
        "         COPY  LAYOUT\nX        EQU   FLD+1\n",
        &[("LAYOUT","FLD      EQU   7\n")]);
    assert_eq!(run.abs("FLD"),Some(7));
    assert_eq!(run.abs("X"),Some(8));
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn missing_copy_member_suggests() {
    let run = analyze_with_members(
        "         COPY  LAYOTU\n",
        &[("LAYOUT","FLD      EQU   7\n")]);
    let diags: Vec<&lsp::Diagnostic> = run.diags.values().flatten().collect();
    let e049 = diags.iter().find(|d| {
        matches!(&d.code,Some(lsp::NumberOrString::String(s)) if s == "E049")
    }).expect("E049 reported");
    assert!(e049.message.contains("LAYOUT"),"{}",e049.message);
}

#[test]
fn recursive_copy_detected() {
    let run = analyze_with_members(
        "         COPY  SELF\n",
        &[("SELF","         COPY  SELF\n")]);
    assert!(run.all_codes().contains(&"E062".to_string()),"{:?}",run.all_codes());
}

#[test]
fn library_macro_loads_on_first_call() {
    let run = analyze_with_members(
        "         SETUP 9\n",
        &[("SETUP","         MACRO\n         SETUP &V\nINIT     EQU   &V\n         MEND\n")]);
    assert_eq!(run.abs("INIT"),Some(9));
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn unknown_opcode_without_library() {
    let run = analyze("         NOSUCHOP\n");
    assert!(run.all_codes().contains(&"E049".to_string()));
}

#[test]
fn section_layout_and_alignment() {
    let run = analyze("\
CODE     CSECT
A        DS    F
B        DS    H
C        DS    D
D        DS    X
");
    assert_eq!(run.reloc_offset("A"),Some(0));
    assert_eq!(run.reloc_offset("B"),Some(4));
    assert_eq!(run.reloc_offset("C"),Some(8));
    assert_eq!(run.reloc_offset("D"),Some(16));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn forward_length_space_resolves() {
    let run = analyze("\
CODE     CSECT
A        DS    CL(LEN)
B        DS    X
LEN      EQU   6
");
    assert_eq!(run.reloc_offset("A"),Some(0));
    assert_eq!(run.reloc_offset("B"),Some(6));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn org_moves_location_counter() {
    let run = analyze("\
CODE     CSECT
A        DS    XL16
         ORG   A+4
B        DS    X
");
    assert_eq!(run.reloc_offset("B"),Some(4));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn duplicate_symbol_diagnosed() {
    let run = analyze("\
A        EQU   1
A        EQU   2
");
    assert!(run.all_codes().contains(&"E043".to_string()));
    assert_eq!(run.abs("A"),Some(1));
}

#[test]
fn mnote_severities() {
    let run = analyze("\
         MNOTE 8,'SEVERE PROBLEM'
         MNOTE 4,'JUST A WARNING'
         MNOTE *,'A COMMENT'
");
    let diags: Vec<&lsp::Diagnostic> = run.diags.values().flatten().collect();
    let severe = diags.iter().find(|d| d.message.contains("SEVERE")).unwrap();
    assert_eq!(severe.severity,Some(lsp::DiagnosticSeverity::ERROR));
    let warn = diags.iter().find(|d| d.message.contains("WARNING")).unwrap();
    assert_eq!(warn.severity,Some(lsp::DiagnosticSeverity::WARNING));
    let info = diags.iter().find(|d| d.message.contains("COMMENT")).unwrap();
    assert_eq!(info.severity,Some(lsp::DiagnosticSeverity::INFORMATION));
}

#[test]
fn mhelp_sysndx_ceiling() {
    let run = analyze("\
         MACRO
         NOOP
         MEND
         MHELP 512
         NOOP
         NOOP
         NOOP
");
    assert!(run.all_codes().contains(&"E072".to_string()),"{:?}",run.all_codes());
}

#[test]
fn opsyn_renames_and_deletes() {
    let run = analyze("\
LOAD     OPSYN LR
         LOAD  1,2
LR       OPSYN
X        EQU   1
");
    assert!(run.codes_without_fades().is_empty(),"{:?}",run.all_codes());
    assert_eq!(run.abs("X"),Some(1));
}

#[test]
fn literals_pool_at_ltorg() {
    let run = analyze("\
CODE     CSECT
         L     1,=F'5'
         L     2,=F'5'
POOL     LTORG
END1     DS    X
");
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
    // the instruction bytes are 8, the pool adds one deduplicated fullword
    assert_eq!(run.reloc_offset("POOL"),Some(8));
    assert_eq!(run.reloc_offset("END1"),Some(12));
}

#[test]
fn statement_after_end_ignored() {
    let run = analyze("\
A        EQU   1
         END
B        EQU   2
");
    assert_eq!(run.abs("A"),Some(1));
    assert!(run.ctx.ids.get("B").and_then(|id| run.ctx.ord.symbol(id)).is_none());
}

#[test]
fn idempotent_diagnostics() {
    let src = "\
A        EQU   B
B        EQU   A
C        EQU   NEVER+1
         LHIXXX 1
";
    let first = analyze(src).all_codes();
    let second = analyze(src).all_codes();
    assert_eq!(first,second);
    assert!(!first.is_empty());
}

#[test]
fn using_and_drop_flow() {
    let run = analyze("\
CODE     CSECT
         USING CODE,12
         DROP  12
         DROP  12
");
    assert!(run.all_codes().contains(&"W010".to_string()),"{:?}",run.all_codes());
}

#[test]
fn ictl_changes_continue_column() {
    let mut first = format!("{:<71}","A        EQU   1+");
    first.push('X');
    let source = format!("         ICTL  1,71,2\n{}\n 2\nB        EQU   A\n",first);
    let run = analyze(&source);
    assert_eq!(run.abs("A"),Some(3));
    assert_eq!(run.abs("B"),Some(3));
    assert!(run.all_codes().is_empty(),"{:?}",run.all_codes());
}

#[test]
fn dangling_continuation_diagnosed() {
    let mut only = format!("{:<71}","A        EQU   1+");
    only.push('X');
    let run = analyze(&format!("{}\n",only));
    assert!(run.all_codes().contains(&"S0004".to_string()),"{:?}",run.all_codes());
}

// randomized checks in the manner of a straightforward reference interpreter

fn lcg(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *seed >> 33
}

#[test]
fn random_equ_chains_match_interpreter() {
    let mut seed = 0xDEADBEEFu64;
    for _ in 0..10 {
        let n = 4 + (lcg(&mut seed) % 5) as usize;
        let mut source = String::new();
        let mut expected: Vec<i64> = Vec::new();
        // S0 is a constant, each later symbol adds a constant to the next one
        let mut consts: Vec<i64> = Vec::new();
        for i in 0..n {
            consts.push((lcg(&mut seed) % 100) as i64);
            if i+1 < n {
                source.push_str(&format!("S{}       EQU   S{}+{}\n",i,i+1,consts[i]));
            } else {
                source.push_str(&format!("S{}       EQU   {}\n",i,consts[i]));
            }
        }
        let mut acc = 0i64;
        for i in (0..n).rev() {
            acc = if i+1 < n { acc + consts[i] } else { consts[i] };
            expected.push(acc);
        }
        expected.reverse();
        let run = analyze(&source);
        assert!(run.all_codes().is_empty(),"{:?}\n{}",run.all_codes(),source);
        for i in 0..n {
            assert_eq!(run.abs(&format!("S{}",i)),Some(expected[i] as i32),"{}",source);
        }
    }
}

#[test]
fn random_data_defs_accumulate_lengths() {
    let mut seed = 0x1234u64;
    let types: [(&str,i32,i32);4] = [("F",4,4),("H",2,2),("X",1,1),("D",8,8)];
    for _ in 0..10 {
        let n = 3 + (lcg(&mut seed) % 4) as usize;
        let mut source = String::from("CODE     CSECT\n");
        let mut offset = 0i32;
        let mut last = 0i32;
        for i in 0..n {
            let (t,len,align) = types[(lcg(&mut seed) % 4) as usize];
            let dup = 1 + (lcg(&mut seed) % 3) as i32;
            source.push_str(&format!("R{}       DS    {}{}\n",i,dup,t));
            offset = (offset + align - 1) / align * align;
            last = offset;
            offset += dup * len;
        }
        source.push_str("FIN      DS    X\n");
        let run = analyze(&source);
        assert!(run.all_codes().is_empty(),"{:?}\n{}",run.all_codes(),source);
        assert_eq!(run.reloc_offset("FIN"),Some(offset),"{}",source);
        let _ = last;
    }
}

#[test]
fn random_seta_matches_reference() {
    let mut seed = 0x77u64;
    for _ in 0..20 {
        let a = (lcg(&mut seed) % 1000) as i32 - 500;
        let b = (lcg(&mut seed) % 1000) as i32 - 500;
        let c = (lcg(&mut seed) % 100) as i32 + 1;
        let source = format!("\
&A       SETA  {}
&B       SETA  {}
&R       SETA  (&A+&B)*{}
X        EQU   &R
",a,b,c);
        let run = analyze(&source);
        // substitution writes SETA values in unsigned decimal form
        let expected = (a.wrapping_add(b)).wrapping_mul(c).abs();
        assert_eq!(run.abs("X"),Some(expected),"{}",source);
    }
}
