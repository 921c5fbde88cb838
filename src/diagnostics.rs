//! Diagnostic constructors shared by the analysis engine.
//!
//! Codes follow the taxonomy of the HLASM tooling this engine is compatible with:
//! `S*` parser syntax, `E0xx` assembly semantics, `W0xx` assembly warnings,
//! `A2xx` data-definition attributes, `M0xx` machine operand checks,
//! `CE0xx` conditional-assembly expressions, `L0xxx` library loading,
//! `B4Gxxx` bridge configuration, `MNOTE` user output, `F_IN001` fade hints,
//! `SUP` suppression notice.  Codes are kept verbatim so existing clients
//! recognize them.

use lsp_types as lsp;

pub const SOURCE: &str = "hlasm";

/// severity by code prefix, used when the caller does not override
fn default_severity(code: &str) -> lsp::DiagnosticSeverity {
    if code.starts_with('W') {
        lsp::DiagnosticSeverity::WARNING
    } else if code.starts_with("F_") || code == "SUP" {
        lsp::DiagnosticSeverity::HINT
    } else if code.starts_with('L') {
        lsp::DiagnosticSeverity::WARNING
    } else {
        lsp::DiagnosticSeverity::ERROR
    }
}

pub fn diag(range: lsp::Range, code: &str, message: &str) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range,
        severity: Some(default_severity(code)),
        code: Some(lsp::NumberOrString::String(code.to_string())),
        code_description: None,
        source: Some(SOURCE.to_string()),
        message: message.to_string(),
        related_information: None,
        tags: None,
        data: None
    }
}

pub fn diag_with_severity(range: lsp::Range, code: &str, message: &str, severity: lsp::DiagnosticSeverity) -> lsp::Diagnostic {
    let mut ans = diag(range,code,message);
    ans.severity = Some(severity);
    ans
}

/// attach the macro/copy call chain as related information
pub fn attach_stack(mut d: lsp::Diagnostic, stack: Vec<(lsp::Location,String)>) -> lsp::Diagnostic {
    if !stack.is_empty() {
        d.related_information = Some(stack.into_iter().map(|(location,message)| {
            lsp::DiagnosticRelatedInformation { location, message }
        }).collect());
    }
    d
}

/// fade hint for statements skipped by conditional assembly
pub fn fade(range: lsp::Range) -> lsp::Diagnostic {
    let mut ans = diag(range,"F_IN001","inactive statement");
    ans.tags = Some(vec![lsp::DiagnosticTag::UNNECESSARY]);
    ans
}

/// notice that diagnostics beyond a limit were suppressed for an implicit processor group
pub fn suppressed(range: lsp::Range) -> lsp::Diagnostic {
    diag(range,"SUP","diagnostics suppressed, processor group not found")
}

/// `MNOTE` severity 0-8 maps onto info/warning/error
pub fn mnote(range: lsp::Range, level: i64, message: &str) -> lsp::Diagnostic {
    let severity = match level {
        l if l >= 8 => lsp::DiagnosticSeverity::ERROR,
        l if l >= 4 => lsp::DiagnosticSeverity::WARNING,
        _ => lsp::DiagnosticSeverity::INFORMATION
    };
    diag_with_severity(range,"MNOTE",message,severity)
}
