//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Returns every problem found,
//! not just the first.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServerConfig, TlsConfig};

/// Ten years; keeps token expiry arithmetic in range.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("observability.log_level: unknown level {0:?}")]
    UnknownLogLevel(String),

    #[error("listener.tls: {0}")]
    Tls(String),
}

/// Check a parsed config. Pure apart from reading TLS files.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_body_bytes",
        });
    }
    if let Some(tls) = &config.listener.tls {
        if let Err(e) = check_tls(tls) {
            errors.push(e);
        }
    }

    if config.routes.file.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "routes.file" });
    }
    if config.templates.root.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "templates.root",
        });
    }
    if config.templates.default_content_type.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "templates.default_content_type",
        });
    }

    if config.auth.secret.is_empty() {
        errors.push(ValidationError::Empty { field: "auth.secret" });
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "auth.token_ttl_secs",
        });
    } else if config.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
        errors.push(ValidationError::TooLarge {
            field: "auth.token_ttl_secs",
            max: MAX_TOKEN_TTL_SECS,
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The cert file must hold at least one certificate and the key file a
/// private key.
fn check_tls(tls: &TlsConfig) -> Result<(), ValidationError> {
    let cert_file = File::open(&tls.cert_path)
        .map_err(|e| ValidationError::Tls(format!("{}: {e}", tls.cert_path)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ValidationError::Tls(format!("{}: {e}", tls.cert_path)))?;
    if certs.is_empty() {
        return Err(ValidationError::Tls(format!(
            "{}: no certificates found",
            tls.cert_path
        )));
    }

    let key_file = File::open(&tls.key_path)
        .map_err(|e| ValidationError::Tls(format!("{}: {e}", tls.key_path)))?;
    match rustls_pemfile::private_key(&mut BufReader::new(key_file)) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ValidationError::Tls(format!(
            "{}: no private key found",
            tls.key_path
        ))),
        Err(e) => Err(ValidationError::Tls(format!("{}: {e}", tls.key_path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nope".into();
        config.auth.secret.clear();
        config.timeouts.request_secs = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Empty { field: "auth.secret" }));
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
    }

    #[test]
    fn test_missing_tls_files() {
        let mut config = ServerConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Tls(_)));
    }

    #[test]
    fn test_tls_file_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "not a pem").unwrap();

        let mut config = ServerConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: cert.display().to_string(),
            key_path: cert.display().to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("no certificates"));
    }
}
