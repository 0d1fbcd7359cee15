//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One authentication decision, written when `log.audit` is on. Carries no
/// raw timings, only their count.
#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub ts: String,
    pub user_id: &'a str,
    pub genuine: bool,
    pub score: f64,
    pub expected_vector_length: usize,
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber: level from RUST_LOG or `default_level`.
    /// Later calls are no-ops.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let result = if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };
        if result.is_err() {
            tracing::debug!("subscriber already installed");
        }
    }

    /// Emit a single NDJSON line without going through tracing.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_record_is_one_line() {
        let rec = AuditRecord {
            ts: "2026-01-01T00:00:00Z".into(),
            user_id: "alice",
            genuine: false,
            score: -0.04,
            expected_vector_length: 12,
            features: 10,
            model_id: None,
        };
        let mut out = Vec::new();
        StructuredLogger::emit_json(&rec, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(v["user_id"], "alice");
        assert_eq!(v["genuine"], false);
        assert!(v.get("model_id").is_none());
    }

    #[test]
    fn init_twice_is_harmless() {
        StructuredLogger::init(false, "warn");
        StructuredLogger::init(true, "warn");
    }
}
