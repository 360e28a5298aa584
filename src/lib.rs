//! This crate implements server-side Digest Auth as specified by IETF RFC 2617,
//! as a guard placed in front of protected resources. It issues `WWW-Authenticate`
//! challenges, verifies the hashed challenge-response a client submits in its
//! `Authorization` header (the plain, `qop=auth` and `qop=auth-int` variants),
//! and rotates the server nonce on a fixed schedule to bound the window in
//! which a captured response can be replayed. The password itself never
//! travels on the wire.
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```
//! use std::sync::Arc;
//! use digest_guard::{DigestAuthenticator, GuardConfig, NonceManager, Outcome};
//!
//! let config = GuardConfig::default();
//! let nonces = Arc::new(NonceManager::new().unwrap());
//! let guard = DigestAuthenticator::from_config(&config, Arc::clone(&nonces));
//!
//! // A request arriving without credentials is challenged.
//! let request = http::Request::builder()
//!     .method("GET")
//!     .uri("/digest")
//!     .body(Vec::<u8>::new())
//!     .unwrap();
//!
//! let outcome = guard.authenticate(&request);
//! assert!(matches!(outcome, Outcome::ChallengeIssued(_)));
//!
//! let response = outcome.into_response().unwrap();
//! assert_eq!(response.status(), 401);
//! assert!(response.headers().contains_key("www-authenticate"));
//! ```
//!
//! In a deployment the nonce rotation runs as a background task until the
//! shutdown signal fires:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use digest_guard::{GuardConfig, NonceManager};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = GuardConfig::default();
//! let nonces = Arc::new(NonceManager::new().unwrap());
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! nonces.start(config.nonce_rotation, shutdown_rx);
//! # drop(shutdown_tx);
//! # }
//! ```

mod authenticator;
mod config;
mod enums;
mod error;
mod header;
mod nonce;
mod utils;

pub use crate::error::{Error, Result};

pub use crate::authenticator::{
    Credential, CredentialStore, DigestAuthenticator, MemoryCredentialStore, Outcome,
    StaticCredentials,
};
pub use crate::config::GuardConfig;
pub use crate::header::{parse_header_map, AuthorizationHeader, WwwAuthenticateHeader};
pub use crate::nonce::{Nonce, NonceManager};

pub use crate::enums::*;

/// Parse an `Authorization` header value.
/// It's just a convenience method to call [`AuthorizationHeader::parse()`](struct.AuthorizationHeader.html#method.parse).
pub fn parse(authorization: &str) -> Result<AuthorizationHeader> {
    AuthorizationHeader::parse(authorization)
}

#[test]
fn test_challenge_verify_flow() {
    use chrono::Utc;
    use std::sync::Arc;

    let nonces = Arc::new(NonceManager::new().unwrap());
    nonces.publish(Nonce {
        value: "abc123".to_string(),
        issued_at: Utc::now(),
    });
    let guard = DigestAuthenticator::from_config(&GuardConfig::default(), Arc::clone(&nonces));

    // challenge carries the current nonce and the realm-bound opaque
    let challenge = guard.challenge();
    assert_eq!(
        challenge.to_string(),
        r#"Digest realm="example.com",qop="auth",nonce="abc123",opaque="6a0f4f109a09d64bd71b4508a8966a43""#
    );

    // a reply signed with the advertised nonce is accepted
    let authorization = r#"Digest username="usm", realm="example.com", nonce="abc123", uri="/digest", response="0c74346a74e116d74bb0104576cc79c9""#;
    let parsed = crate::parse(authorization).unwrap();
    assert_eq!(parsed.nonce.as_deref(), Some("abc123"));

    let request = http::Request::builder()
        .method("GET")
        .uri("/digest")
        .header(http::header::AUTHORIZATION, authorization)
        .body(Vec::<u8>::new())
        .unwrap();

    assert_eq!(guard.authenticate(&request), Outcome::Allow);
}
