use crate::authenticator::Credential;
use crate::enums::Qop;
use std::time::Duration;

/// Static guard configuration.
///
/// The defaults match the reference deployment: a single `usm` /
/// `example.com` credential, `qop=auth`, and a two minute nonce rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub username: String,
    pub password: String,
    pub realm: String,
    /// Advertised quality of protection; `None` leaves the qop clause out of
    /// challenges entirely.
    pub qop: Option<Qop>,
    /// How often the server nonce is replaced.
    pub nonce_rotation: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            username: "usm".to_string(),
            password: "password".to_string(),
            realm: "example.com".to_string(),
            qop: Some(Qop::AUTH),
            nonce_rotation: Duration::from_secs(120),
        }
    }
}

impl GuardConfig {
    /// The configured identity as a credential triple.
    pub fn credential(&self) -> Credential {
        Credential {
            username: self.username.clone(),
            realm: self.realm.clone(),
            password: self.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();

        assert_eq!(config.username, "usm");
        assert_eq!(config.password, "password");
        assert_eq!(config.realm, "example.com");
        assert_eq!(config.qop, Some(Qop::AUTH));
        assert_eq!(config.nonce_rotation, Duration::from_secs(120));
    }

    #[test]
    fn test_credential_triple() {
        let credential = GuardConfig::default().credential();

        assert_eq!(credential.username, "usm");
        assert_eq!(credential.realm, "example.com");
        assert_eq!(credential.password, "password");
    }
}
