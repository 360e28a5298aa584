use crate::config::GuardConfig;
use crate::enums::{Algorithm, Qop};
use crate::error::Error;
use crate::header::{AuthorizationHeader, WwwAuthenticateHeader};
use crate::nonce::NonceManager;
use crate::utils::constant_time_eq;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, info};

const SCHEME_MISMATCH: &str = "Only the Digest authorization scheme is supported";

/// The protected identity that digest responses are verified against.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub username: String,
    pub realm: String,
    pub password: String,
}

/// Credential lookup capability.
///
/// Parameterizes the authenticator over where credentials live instead of
/// embedding a username/password pair in it.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, username: &str) -> Option<Credential>;
}

/// A single fixed credential. The submitted username is not consulted; the
/// one configured credential is always the comparison target.
pub struct StaticCredentials(pub Credential);

impl CredentialStore for StaticCredentials {
    fn lookup(&self, _username: &str) -> Option<Credential> {
        Some(self.0.clone())
    }
}

/// In-memory multi-user store, selecting by username.
#[derive(Default)]
pub struct MemoryCredentialStore {
    creds: Vec<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(creds: Vec<Credential>) -> Self {
        Self { creds }
    }

    pub fn add(&mut self, cred: Credential) {
        self.creds.push(cred);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup(&self, username: &str) -> Option<Credential> {
        self.creds.iter().find(|c| c.username == username).cloned()
    }
}

/// Result of gating one request.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Proof verified; let the request through.
    Allow,
    /// No usable credentials were supplied; a fresh challenge was issued.
    ChallengeIssued(WwwAuthenticateHeader),
    /// Credentials were supplied but not accepted.
    Rejected {
        /// Fresh challenge for the client to restart the handshake with.
        /// Absent on scheme mismatch.
        challenge: Option<WwwAuthenticateHeader>,
        message: Option<&'static str>,
    },
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allow)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Allow => StatusCode::OK,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Render the outbound HTTP surface for this outcome: the status code,
    /// the `WWW-Authenticate` header on challenge-bearing outcomes, and a
    /// plain-text body on scheme mismatch.
    pub fn into_response(self) -> std::result::Result<Response<String>, http::Error> {
        let mut builder = Response::builder().status(self.status());
        let mut body = String::new();

        match self {
            Outcome::Allow => {}
            Outcome::ChallengeIssued(challenge) => {
                builder = builder.header(WWW_AUTHENTICATE, challenge.to_string());
            }
            Outcome::Rejected { challenge, message } => {
                if let Some(challenge) = challenge {
                    builder = builder.header(WWW_AUTHENTICATE, challenge.to_string());
                }
                if let Some(message) = message {
                    body = message.to_string();
                }
            }
        }

        builder.body(body)
    }
}

/// Gates each request: verifies a digest proof or issues a challenge.
pub struct DigestAuthenticator<S> {
    realm: String,
    qop: Option<Qop>,
    algorithm: Algorithm,
    store: S,
    nonces: Arc<NonceManager>,
}

impl DigestAuthenticator<StaticCredentials> {
    /// Wire a guard from a static configuration: one fixed credential and a
    /// shared nonce manager.
    pub fn from_config(config: &GuardConfig, nonces: Arc<NonceManager>) -> Self {
        Self::new(&config.realm, StaticCredentials(config.credential()), nonces)
            .with_qop(config.qop)
    }
}

impl<S: CredentialStore> DigestAuthenticator<S> {
    pub fn new(realm: &str, store: S, nonces: Arc<NonceManager>) -> Self {
        Self {
            realm: realm.to_string(),
            qop: Some(Qop::AUTH),
            algorithm: Algorithm::default(),
            store,
            nonces,
        }
    }

    /// Quality of protection advertised in challenges; `None` omits the qop
    /// clause entirely.
    pub fn with_qop(mut self, qop: Option<Qop>) -> Self {
        self.qop = qop;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// A fresh challenge built around the current server nonce.
    pub fn challenge(&self) -> WwwAuthenticateHeader {
        WwwAuthenticateHeader::new(
            &self.realm,
            self.qop,
            &self.nonces.current().value,
            self.algorithm,
        )
    }

    /// Gate one request.
    ///
    /// An absent or blank `Authorization` header produces a challenge; a
    /// non-Digest scheme is rejected without one; anything else is verified
    /// against the current nonce and the stored credential. Nothing from the
    /// submitted header outlives this call.
    pub fn authenticate<B: AsRef<[u8]>>(&self, request: &Request<B>) -> Outcome {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if header.trim().is_empty() {
            info!(realm = %self.realm, "no credentials supplied, issuing digest challenge");
            return Outcome::ChallengeIssued(self.challenge());
        }

        let parsed = match AuthorizationHeader::parse(header) {
            Ok(parsed) => parsed,
            Err(Error::UnsupportedScheme(scheme)) => {
                debug!(scheme = %scheme, "rejecting non-digest authorization scheme");
                return Outcome::Rejected {
                    challenge: None,
                    message: Some(SCHEME_MISMATCH),
                };
            }
            Err(err) => {
                debug!(error = %err, "malformed authorization header");
                return Outcome::Rejected {
                    challenge: Some(self.challenge()),
                    message: None,
                };
            }
        };

        let username = parsed.username.as_deref().unwrap_or("");
        let credential = match self.store.lookup(username) {
            Some(credential) => credential,
            None => {
                debug!("no credential for submitted username");
                return Outcome::Rejected {
                    challenge: Some(self.challenge()),
                    message: None,
                };
            }
        };

        let expected = self.expected_response(
            &credential,
            request.method().as_str(),
            &parsed,
            request.body().as_ref(),
        );

        if constant_time_eq(expected.as_bytes(), parsed.response.as_bytes()) {
            Outcome::Allow
        } else {
            debug!("digest response mismatch");
            Outcome::Rejected {
                challenge: Some(self.challenge()),
                message: None,
            }
        }
    }

    /// The RFC 2617 hash chain for the current nonce and stored credential.
    /// Field order and the literal `:` separators are load-bearing.
    fn expected_response(
        &self,
        credential: &Credential,
        method: &str,
        header: &AuthorizationHeader,
        body: &[u8],
    ) -> String {
        let h = self.algorithm;

        let ha1 = h.hash_str(&format!(
            "{}:{}:{}",
            credential.username, credential.realm, credential.password
        ));

        let ha2 = match header.qop {
            Some(Qop::AUTH_INT) => {
                let body_hash = h.hash(body);
                h.hash_str(&format!("{}:{}:{}", method, header.uri, body_hash))
            }
            _ => h.hash_str(&format!("{}:{}", method, header.uri)),
        };

        let nonce = self.nonces.current();

        match &header.qop {
            None => h.hash_str(&format!("{}:{}:{}", ha1, nonce.value, ha2)),
            Some(qop) => {
                // nc and cnonce are guaranteed present when qop is (parse invariant)
                let nc = header.nc.as_deref().unwrap_or("");
                let cnonce = header.cnonce.as_deref().unwrap_or("");
                h.hash_str(&format!(
                    "{}:{}:{}:{}:{}:{}",
                    ha1, nonce.value, nc, cnonce, qop, ha2
                ))
            }
        }
    }
}
