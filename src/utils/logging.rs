//! Structured stderr logging with field redaction
//!
//! Field values are redacted according to their key name:
//! - secrets (private keys, WIF, tokens) are replaced entirely
//! - addresses and public keys keep a short prefix/suffix
//! - digests, hashes and signatures are shortened

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// How a field value is rewritten before it reaches the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    None,
    Secret,
    Identifier,
    Digest,
}

const SECRET_MARKERS: [&str; 6] = ["private", "secret", "wif", "token", "seed", "nonce"];
const IDENTIFIER_MARKERS: [&str; 5] = ["address", "pubkey", "public", "xpub", "recipient"];
const DIGEST_MARKERS: [&str; 4] = ["digest", "hash", "signature", "script"];

impl Redaction {
    /// Pick a policy from the field name
    pub fn for_key(key: &str) -> Self {
        let key = key.to_ascii_lowercase();
        if SECRET_MARKERS.iter().any(|m| key.contains(m)) {
            Redaction::Secret
        } else if IDENTIFIER_MARKERS.iter().any(|m| key.contains(m)) {
            Redaction::Identifier
        } else if DIGEST_MARKERS.iter().any(|m| key.contains(m)) {
            Redaction::Digest
        } else {
            Redaction::None
        }
    }

    pub fn apply(self, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            return "[EMPTY]".to_string();
        }
        match self {
            Redaction::None => value.to_string(),
            Redaction::Secret => format!("[REDACTED:{}chars]", value.len()),
            Redaction::Identifier => elide(value, 6, 4),
            Redaction::Digest => elide(value, 10, 6),
        }
    }
}

/// Keep `head` leading and `tail` trailing characters
fn elide(value: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= head + tail + 3 {
        return value.to_string();
    }
    let prefix: String = chars[..head].iter().collect();
    let suffix: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Attach a field, redacted by key name
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let rendered = Redaction::for_key(key).apply(&value.to_string());
        self.fields.push((key, rendered));
        self
    }

    pub fn render(&self) -> String {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let mut line = format!("[{}] {} [{}] {}", timestamp, self.level, self.module, self.message);
        if !self.fields.is_empty() {
            line.push_str(" |");
            for (k, v) in &self.fields {
                line.push_str(&format!(" {}={}", k, v));
            }
        }
        line
    }

    pub fn log(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }
        eprintln!("{}", self.render());
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::$level,
            $module,
            $msg,
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($t:tt)*) => { $crate::__log_at!(Debug, $($t)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($t:tt)*) => { $crate::__log_at!(Info, $($t)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($t:tt)*) => { $crate::__log_at!(Warn, $($t)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($t:tt)*) => { $crate::__log_at!(Error, $($t)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_by_key() {
        assert_eq!(Redaction::for_key("private_key"), Redaction::Secret);
        assert_eq!(Redaction::for_key("WIF"), Redaction::Secret);
        assert_eq!(Redaction::for_key("api_token"), Redaction::Secret);
        assert_eq!(Redaction::for_key("address"), Redaction::Identifier);
        assert_eq!(Redaction::for_key("pubkey"), Redaction::Identifier);
        assert_eq!(Redaction::for_key("digest"), Redaction::Digest);
        assert_eq!(Redaction::for_key("inputs"), Redaction::None);
    }

    #[test]
    fn test_secret_never_leaks() {
        let out = Redaction::Secret.apply("BoL2jnJfnDt38my5NXpC7huZAifcwYo4tFUWrAHuqw1xZfd3Fpka");
        assert_eq!(out, "[REDACTED:52chars]");
        assert_eq!(Redaction::Secret.apply(""), "[EMPTY]");
    }

    #[test]
    fn test_identifier_elided() {
        let out = Redaction::Identifier.apply("De2gwq9GvNgvKgHCYRMKnPqss3pzWGSHiH");
        assert_eq!(out, "De2gwq...SHiH");
        assert_eq!(Redaction::Identifier.apply("short"), "short");
    }

    #[test]
    fn test_entry_fields() {
        let entry = LogEntry::new(LogLevel::Info, "test", "signed")
            .field("inputs", 2)
            .field("private_key", "0000000000000000000000000000000000000000000000000000000000000001")
            .field("address", "BuXLV5AAVmUtVtasLMzxSBeqQVBfw4DtqD");

        assert_eq!(entry.fields[0], ("inputs", "2".to_string()));
        assert!(entry.fields[1].1.contains("REDACTED"));
        assert_eq!(entry.fields[2].1, "BuXLV5...DtqD");

        let line = entry.render();
        assert!(line.contains("INFO [test] signed | inputs=2"));
        assert!(!line.contains("0000000000000001"));
    }
}
