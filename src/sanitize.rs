//! Console hygiene for model output and error detail.

use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_PREVIEW_LEN: usize = 4000;

pub fn preview_len() -> usize {
    std::env::var("PENCIL_PREVIEW_LEN")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PREVIEW_LEN)
}

pub fn allow_raw_output() -> bool {
    std::env::var("PENCIL_ALLOW_RAW_OUTPUT")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Removes ANSI CSI sequences so model text cannot drive the terminal.
pub fn strip_ansi(input: &str) -> String {
    static CSI_RE: OnceLock<Regex> = OnceLock::new();
    let re = CSI_RE.get_or_init(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("csi regex"));
    re.replace_all(input, "").into_owned()
}

pub fn sanitize_for_console(input: &str) -> String {
    if allow_raw_output() {
        return input.to_string();
    }
    redact_secrets(&strip_ansi(input))
}

pub fn sanitize_preview_for_console(input: &str) -> String {
    truncate_chars(&sanitize_for_console(input), preview_len())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{head}... [truncated {} chars]", total - max_chars)
}

/// Masks API keys and bearer tokens that providers sometimes echo back in error bodies.
pub fn redact_secrets(input: &str) -> String {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    static BEARER_RE: OnceLock<Regex> = OnceLock::new();
    static KV_RE: OnceLock<Regex> = OnceLock::new();

    let key_re = KEY_RE
        .get_or_init(|| Regex::new(r"\bsk-(?:ant-)?[A-Za-z0-9_\-]{10,}").expect("key regex"));
    let bearer_re = BEARER_RE
        .get_or_init(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._\-]{8,}").expect("bearer regex"));
    let kv_re = KV_RE.get_or_init(|| {
        Regex::new(r#"(?i)(api[_-]?key|x-api-key|authorization)(["']?)\s*([:=])\s*(["']?)([^\s"',}]+)"#)
            .expect("kv regex")
    });

    let s = key_re.replace_all(input, "sk-[REDACTED]");
    let s = bearer_re.replace_all(&s, "Bearer [REDACTED]");
    kv_re.replace_all(&s, "$1$2$3$4[REDACTED]").into_owned()
}
