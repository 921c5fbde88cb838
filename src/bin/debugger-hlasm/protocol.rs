//! DAP wire format: JSON bodies behind Content-Length headers, the same
//! framing the LSP uses, with `seq`/`type` message envelopes.

use serde_json::{Value,json};
use std::io::{BufRead,Read,Write};

/// read one message, `None` on a closed or unusable stream
pub fn read_message<R: BufRead>(reader: &mut R) -> Option<Value> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("Content-Length:") {
            content_length = rest.trim().parse().ok();
        }
    }
    let len = content_length?;
    let mut body = vec![0u8;len];
    reader.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}

pub fn write_message<W: Write>(writer: &mut W, value: &Value) {
    let body = value.to_string();
    let _ = write!(writer,"Content-Length: {}\r\n\r\n{}",body.len(),body);
    let _ = writer.flush();
}

pub struct Seq {
    next: i64
}

impl Seq {
    pub fn new() -> Self {
        Self { next: 1 }
    }
    pub fn take(&mut self) -> i64 {
        let n = self.next;
        self.next += 1;
        n
    }
    pub fn response(&mut self, request: &Value, success: bool, body: Value) -> Value {
        json!({
            "seq": self.take(),
            "type": "response",
            "request_seq": request.get("seq").and_then(|v| v.as_i64()).unwrap_or(0),
            "command": request.get("command").and_then(|v| v.as_str()).unwrap_or(""),
            "success": success,
            "body": body
        })
    }
    pub fn event(&mut self, name: &str, body: Value) -> Value {
        json!({
            "seq": self.take(),
            "type": "event",
            "event": name,
            "body": body
        })
    }
}
