//! Deterministic request fingerprints for duplicate detection.
//!
//! A request is normalised into a canonical text document (sorted keys,
//! collapsed whitespace, lower-cased tokens, integral floats as integers,
//! `null` parameters dropped) and hashed with SHA-256. The first 128 bits
//! of the digest, hex encoded, form the fingerprint.
//!
//! Output paths and command strings never reach the digest.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::provider::GenerationRequest;

/// Digest width in bytes.
const FINGERPRINT_BYTES: usize = 16;

/// A 128-bit hex-encoded request digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of a generation request.
pub fn fingerprint(request: &GenerationRequest) -> Fingerprint {
    let document = canonical_document(request);

    let digest = Sha256::digest(document.as_bytes());
    let hex = digest[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();

    Fingerprint(hex)
}

/// The normalised text that is hashed.
pub fn canonical_document(request: &GenerationRequest) -> String {
    let mut out = String::new();
    out.push_str("content_type=");
    out.push_str(request.content_type.as_str());
    out.push_str("\nprovider=");
    write_json_string(&normalize_token(&request.provider), &mut out);
    out.push_str("\nprompt=");
    write_json_string(&normalize_text(&request.prompt), &mut out);
    out.push_str("\nstyle=");
    match request.style.as_deref().map(normalize_text) {
        Some(style) if !style.is_empty() => write_json_string(&style, &mut out),
        _ => out.push_str("null"),
    }
    out.push_str("\nparams=");
    let params: Vec<(String, &Value)> = request
        .params
        .iter()
        .map(|(k, v)| (normalize_token(k), v))
        .collect();
    write_object(params, &mut out);
    out
}

/// Trims and collapses internal whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalises an identifier-like token: trimmed and lower-cased.
pub fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_json_string(&normalize_text(s), out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let entries = map.iter().map(|(k, v)| (normalize_token(k), v)).collect();
            write_object(entries, out);
        }
    }
}

fn write_object(mut entries: Vec<(String, &Value)>, out: &mut String) {
    entries.retain(|(_, v)| !v.is_null());
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    out.push('{');
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_json_string(key, out);
        out.push(':');
        write_value(value, out);
    }
    out.push('}');
}

fn write_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            out.push_str(&(f as i64).to_string());
        } else {
            out.push_str(&f.to_string());
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    // Serialising a &str to JSON cannot fail.
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}
