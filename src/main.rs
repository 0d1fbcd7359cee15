//! keystroke-auth entrypoint: one-shot train / authenticate / info / health
//! commands, or an NDJSON request loop on stdin (`serve`).

use clap::{Parser, Subcommand};
use keystroke_auth::{
    config::{AuthConfig, Profile},
    error::AuthError,
    events::{AuthResponse, KeystrokeRequest},
    logging::{AuditRecord, StructuredLogger},
    service::AuthService,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEV_SECRET: &[u8] = b"dev-key-change-in-production";

#[derive(Parser)]
#[command(name = "keystroke-auth", version, about = "Keystroke dynamics authentication")]
struct Cli {
    /// JSON config file (default: $KEYSTROKE_CONFIG_PATH or keystroke.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a typing sample to a user's corpus; trains once enough exist
    Train {
        /// Request JSON file, or - for stdin
        request: PathBuf,
    },
    /// Score a typing sample against the user's model
    Authenticate {
        /// Request JSON file, or - for stdin
        request: PathBuf,
    },
    /// Corpus and model status for a user
    Info { user_id: String },
    /// Liveness probe
    Health,
    /// Read one JSON request per stdin line, write one JSON response per line
    Serve,
}

/// One line of the `serve` protocol.
#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    Train(KeystrokeRequest),
    Authenticate(KeystrokeRequest),
    Info {
        #[serde(alias = "userId")]
        user_id: String,
    },
    Health,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

fn load_config(path: Option<PathBuf>) -> AuthConfig {
    let path = path
        .or_else(|| std::env::var("KEYSTROKE_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("keystroke.json"));
    let mut config = if path.exists() {
        AuthConfig::load(&path)
    } else {
        AuthConfig::for_profile(Profile::from_env())
    };
    config.apply_env_overrides();
    config
}

fn read_request(path: &Path) -> Result<KeystrokeRequest, AuthError> {
    let raw = if path.as_os_str() == "-" {
        let mut s = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut s)
            .map_err(|e| AuthError::Validation(format!("cannot read stdin: {e}")))?;
        s
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| AuthError::Validation(format!("cannot read {}: {e}", path.display())))?
    };
    serde_json::from_str(&raw).map_err(|e| AuthError::Validation(format!("Invalid keystroke data format: {e}")))
}

fn authenticate(service: &AuthService, req: &KeystrokeRequest) -> Result<serde_json::Value, AuthError> {
    let (verdict, scored) = service.authenticate_detailed(req)?;
    if service.config().log.audit {
        let record = AuditRecord {
            ts: chrono::Utc::now().to_rfc3339(),
            user_id: &req.user_id,
            genuine: verdict.genuine,
            score: verdict.score,
            expected_vector_length: scored.model.expected_vector_length(),
            features: scored.features.len(),
            model_id: Some(scored.model.metadata.model_id.to_string()),
        };
        if let Err(e) = StructuredLogger::emit_json(&record, &mut std::io::stderr()) {
            warn!(error = %e, "audit write failed");
        }
    }
    let response = AuthResponse {
        genuine: verdict.genuine,
        score: verdict.score,
        user_id: req.user_id.clone(),
        reason: verdict.reason().map(str::to_string),
    };
    serde_json::to_value(response).map_err(|e| AuthError::Persistence(e.into()))
}

fn dispatch(service: &AuthService, op: Op) -> Result<serde_json::Value, AuthError> {
    let value = match op {
        Op::Train(req) => serde_json::to_value(service.train(&req)?),
        Op::Authenticate(req) => return authenticate(service, &req),
        Op::Info { user_id } => serde_json::to_value(service.user_info(&user_id)?),
        Op::Health => serde_json::to_value(service.health()),
    };
    value.map_err(|e| AuthError::Persistence(e.into()))
}

fn error_json(e: &AuthError) -> serde_json::Value {
    let body = ErrorBody {
        error: e.to_string(),
        code: e.code(),
    };
    serde_json::to_value(body).unwrap_or_default()
}

/// Response for one raw `serve` line; `None` for blank lines.
fn respond(service: &AuthService, raw: &[u8]) -> Option<serde_json::Value> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => return Some(error_json(&AuthError::Validation(format!("Request must be UTF-8: {e}")))),
    };
    if line.is_empty() {
        return None;
    }
    Some(match serde_json::from_str::<Op>(line) {
        Ok(op) => dispatch(service, op).unwrap_or_else(|e| error_json(&e)),
        Err(e) => error_json(&AuthError::Validation(format!("Request must be valid JSON: {e}"))),
    })
}

fn serve(service: &AuthService) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("serving NDJSON requests on stdin");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for raw in stdin.lock().split(b'\n') {
        let Some(response) = respond(service, &raw?) else {
            continue;
        };
        StructuredLogger::emit_json(&response, &mut stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = load_config(cli.config);
    StructuredLogger::init(config.log.json, &config.log.level);

    let secret = match std::env::var("KEYSTROKE_AUTH_SECRET") {
        Ok(s) if !s.is_empty() => s.into_bytes(),
        _ => {
            warn!("KEYSTROKE_AUTH_SECRET unset; using development secret");
            DEV_SECRET.to_vec()
        }
    };
    info!(data_dir = ?config.data_dir, min_samples = config.training.min_samples, "keystroke-auth starting");
    let service = AuthService::open(config, &secret)?;

    let result = match cli.command {
        Command::Serve => return serve(&service),
        Command::Train { request } => read_request(&request).and_then(|r| dispatch(&service, Op::Train(r))),
        Command::Authenticate { request } => {
            read_request(&request).and_then(|r| dispatch(&service, Op::Authenticate(r)))
        }
        Command::Info { user_id } => dispatch(&service, Op::Info { user_id }),
        Command::Health => dispatch(&service, Op::Health),
    };

    let mut stdout = std::io::stdout().lock();
    match result {
        Ok(value) => StructuredLogger::emit_json(&value, &mut stdout)?,
        Err(e) => {
            StructuredLogger::emit_json(&error_json(&e), &mut stdout)?;
            std::process::exit(1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystroke_auth::model::IsolationForestParams;
    use keystroke_auth::storage::SecureStore;
    use std::sync::Arc;

    fn service() -> AuthService {
        let config = AuthConfig::default();
        let params = IsolationForestParams::from(&config.training);
        let store = Arc::new(SecureStore::open_in_memory(b"test").unwrap());
        AuthService::with_store(config, store, params)
    }

    #[test]
    fn invalid_utf8_line_is_answered_and_loop_continues() {
        let s = service();
        let bad = respond(&s, b"{\"op\": \"health\xff\"}").unwrap();
        assert_eq!(bad["code"], "validation_error");
        let ok = respond(&s, br#"{"op": "health"}"#).unwrap();
        assert_eq!(ok["status"], "healthy");
    }

    #[test]
    fn blank_and_malformed_lines() {
        let s = service();
        assert!(respond(&s, b"  \r").is_none());
        assert_eq!(respond(&s, b"not json").unwrap()["code"], "validation_error");
        let missing = respond(&s, br#"{"op": "info", "userId": "nobody"}"#).unwrap();
        assert_eq!(missing["hasTrainedModel"], false);
    }
}
