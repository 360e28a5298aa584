use crate::enums::{Algorithm, Qop};
use crate::error::{Error, Result};
use crate::utils::QuoteForDigest;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Split a header value into its `key="value"` fields.
///
/// The scheme token (everything up to the first space) is discarded, the
/// remainder is split on `,`. Segments without a `=` are ignored; quotes are
/// stripped from values; when a key repeats, the last occurrence wins.
pub fn parse_header_map(input: &str) -> HashMap<String, String> {
    let fields = match input.find(' ') {
        Some(idx) => &input[idx + 1..],
        None => input,
    };

    let mut parsed = HashMap::new();
    for segment in fields.trim().split(',') {
        if let Some(idx) = segment.find('=') {
            let key = segment[..idx].trim();
            let value = segment[idx + 1..].replace('"', "");
            parsed.insert(key.to_string(), value.trim().to_string());
        }
    }
    parsed
}

/// Client `Authorization` header parsed into its digest fields.
///
/// Ephemeral: parsed fresh for every request, dropped when the
/// authentication attempt completes.
#[derive(Debug, PartialEq)]
pub struct AuthorizationHeader {
    /// Username the client claims; selects the stored credential
    pub username: Option<String>,
    /// Realm echoed by the client
    pub realm: Option<String>,
    /// Server nonce the client signed against
    pub nonce: Option<String>,
    /// Requested URI as the client signed it (not the request line)
    pub uri: String,
    /// Digest algorithm variant
    pub qop: Option<Qop>,
    /// Nonce use count, kept verbatim as it participates in the hash chain
    pub nc: Option<String>,
    /// Client nonce
    pub cnonce: Option<String>,
    /// The submitted proof hash
    pub response: String,
    /// Server opaque string echoed back unmodified
    pub opaque: Option<String>,
}

impl AuthorizationHeader {
    /// Construct from the `Authorization` header string.
    ///
    /// # Errors
    /// If the scheme is not `Digest`, if `uri` or `response` is missing,
    /// if a given `qop` value is unknown, or if `qop` is present without
    /// `nc` and `cnonce`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !input.starts_with("Digest") {
            let scheme = input.split_whitespace().next().unwrap_or("");
            return Err(Error::UnsupportedScheme(scheme.to_string()));
        }

        let mut kv = parse_header_map(input);

        let qop = match kv.remove("qop") {
            Some(q) => Some(Qop::from_str(&q)?),
            None => None,
        };
        let nc = kv.remove("nc");
        let cnonce = kv.remove("cnonce");
        if qop.is_some() && (nc.is_none() || cnonce.is_none()) {
            return Err(Error::MissingRequired("nc/cnonce", input.to_string()));
        }

        Ok(Self {
            username: kv.remove("username"),
            realm: kv.remove("realm"),
            nonce: kv.remove("nonce"),
            uri: match kv.remove("uri") {
                Some(v) => v,
                None => return Err(Error::MissingRequired("uri", input.to_string())),
            },
            qop,
            nc,
            cnonce,
            response: match kv.remove("response") {
                Some(v) => v,
                None => return Err(Error::MissingRequired("response", input.to_string())),
            },
            opaque: kv.remove("opaque"),
        })
    }
}

impl FromStr for AuthorizationHeader {
    type Err = Error;

    /// Parse HTTP header
    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

/// `WWW-Authenticate` challenge sent with every 401.
#[derive(Debug, PartialEq, Clone)]
pub struct WwwAuthenticateHeader {
    /// Authorization realm
    pub realm: String,
    /// Advertised quality of protection; omitted from the header when None
    pub qop: Option<Qop>,
    /// Current server nonce
    pub nonce: String,
    /// Digest of realm + nonce; binds a later response to the pair that
    /// issued it without separate server state
    pub opaque: String,
}

impl WwwAuthenticateHeader {
    /// Build a challenge around the given server nonce.
    pub fn new(realm: &str, qop: Option<Qop>, nonce: &str, algorithm: Algorithm) -> Self {
        Self {
            realm: realm.to_string(),
            qop,
            nonce: nonce.to_string(),
            opaque: algorithm.hash_str(&format!("{}{}", realm, nonce)),
        }
    }
}

impl Display for WwwAuthenticateHeader {
    /// Format to the form sent on the wire
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Digest ")?;

        f.write_fmt(format_args!("realm=\"{}\",", self.realm.quote_for_digest()))?;

        if let Some(qop) = &self.qop {
            f.write_fmt(format_args!("qop=\"{}\",", qop))?;
        }

        f.write_fmt(format_args!("nonce=\"{}\",", self.nonce.quote_for_digest()))?;

        f.write_fmt(format_args!(
            "opaque=\"{}\"",
            self.opaque.quote_for_digest()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Algorithm, Qop};
    use crate::error::Error;

    #[test]
    fn test_parse_header_map() {
        {
            let src = r#"Digest username="usm", realm="example.com", nonce="abc123", uri="/digest", qop=auth, nc=00000001, cnonce="0a4f113b", response="6629fae49393a05397450978507c4ef1""#;

            let map = parse_header_map(src);

            assert_eq!(map.get("username").unwrap(), "usm");
            assert_eq!(map.get("realm").unwrap(), "example.com");
            assert_eq!(map.get("nonce").unwrap(), "abc123");
            assert_eq!(map.get("uri").unwrap(), "/digest");
            assert_eq!(map.get("qop").unwrap(), "auth");
            assert_eq!(map.get("nc").unwrap(), "00000001");
            assert_eq!(map.get("cnonce").unwrap(), "0a4f113b");
            assert_eq!(
                map.get("response").unwrap(),
                "6629fae49393a05397450978507c4ef1"
            );
        }

        {
            // segments without = are ignored
            let src = r#"Digest realm="example.com", gzip, nonce="abc123""#;
            let map = parse_header_map(src);
            assert_eq!(map.len(), 2);
            assert_eq!(map.get("realm").unwrap(), "example.com");
            assert_eq!(map.get("nonce").unwrap(), "abc123");
        }

        {
            // last duplicate wins
            let src = r#"Digest nonce="first", nonce="second""#;
            let map = parse_header_map(src);
            assert_eq!(map.get("nonce").unwrap(), "second");
        }

        {
            // unquoted values
            let src = "Digest qop=auth, nc=00000001";
            let map = parse_header_map(src);
            assert_eq!(map.get("qop").unwrap(), "auth");
            assert_eq!(map.get("nc").unwrap(), "00000001");
        }

        {
            let map = parse_header_map("");
            assert!(map.is_empty());
        }
    }

    #[test]
    fn test_authorization_parse() {
        let src = r#"Digest username="Mufasa", realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", uri="/dir/index.html", qop=auth, nc=00000001, cnonce="0a4f113b", response="6629fae49393a05397450978507c4ef1", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

        let parsed = AuthorizationHeader::parse(src).unwrap();

        assert_eq!(
            parsed,
            AuthorizationHeader {
                username: Some("Mufasa".to_string()),
                realm: Some("testrealm@host.com".to_string()),
                nonce: Some("dcd98b7102dd2f0e8b11d0f600bfb0c093".to_string()),
                uri: "/dir/index.html".to_string(),
                qop: Some(Qop::AUTH),
                nc: Some("00000001".to_string()),
                cnonce: Some("0a4f113b".to_string()),
                response: "6629fae49393a05397450978507c4ef1".to_string(),
                opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".to_string()),
            }
        );
    }

    #[test]
    fn test_authorization_parse_minimal() {
        // legacy RFC 2069 style: no qop, nc or cnonce
        let src = r#"Digest username="usm", realm="example.com", nonce="abc123", uri="/digest", response="0c74346a74e116d74bb0104576cc79c9""#;

        let parsed = AuthorizationHeader::parse(src).unwrap();
        assert_eq!(parsed.qop, None);
        assert_eq!(parsed.nc, None);
        assert_eq!(parsed.cnonce, None);
        assert_eq!(parsed.uri, "/digest");
    }

    #[test]
    fn test_authorization_parse_rejects_other_schemes() {
        let err = AuthorizationHeader::parse("Basic dXNtOnBhc3N3b3Jk").unwrap_err();
        assert_eq!(err, Error::UnsupportedScheme("Basic".to_string()));
    }

    #[test]
    fn test_authorization_parse_requires_uri_and_response() {
        let missing_uri = r#"Digest username="usm", response="abc""#;
        assert!(matches!(
            AuthorizationHeader::parse(missing_uri),
            Err(Error::MissingRequired("uri", _))
        ));

        let missing_response = r#"Digest username="usm", uri="/digest""#;
        assert!(matches!(
            AuthorizationHeader::parse(missing_response),
            Err(Error::MissingRequired("response", _))
        ));
    }

    #[test]
    fn test_authorization_parse_rejects_bad_qop() {
        let src = r#"Digest uri="/digest", qop=bogus, nc=00000001, cnonce="x", response="abc""#;
        assert_eq!(
            AuthorizationHeader::parse(src).unwrap_err(),
            Error::BadQop("bogus".to_string())
        );
    }

    #[test]
    fn test_authorization_parse_qop_requires_nc_and_cnonce() {
        let src = r#"Digest uri="/digest", qop=auth, response="abc""#;
        assert!(matches!(
            AuthorizationHeader::parse(src),
            Err(Error::MissingRequired("nc/cnonce", _))
        ));
    }

    #[test]
    fn test_challenge_render() {
        let challenge =
            WwwAuthenticateHeader::new("example.com", Some(Qop::AUTH), "abc123", Algorithm::MD5);

        assert_eq!(
            challenge.to_string(),
            r#"Digest realm="example.com",qop="auth",nonce="abc123",opaque="6a0f4f109a09d64bd71b4508a8966a43""#
        );
    }

    #[test]
    fn test_challenge_render_without_qop() {
        let challenge = WwwAuthenticateHeader::new("example.com", None, "abc123", Algorithm::MD5);

        let rendered = challenge.to_string();
        assert!(!rendered.contains("qop="));
        assert!(rendered.contains(r#"nonce="abc123""#));
    }

    #[test]
    fn test_challenge_roundtrip() {
        let challenge =
            WwwAuthenticateHeader::new("example.com", Some(Qop::AUTH), "abc123", Algorithm::MD5);

        let map = parse_header_map(&challenge.to_string());

        assert_eq!(map.get("realm").unwrap(), &challenge.realm);
        assert_eq!(map.get("qop").unwrap(), "auth");
        assert_eq!(map.get("nonce").unwrap(), &challenge.nonce);
        assert_eq!(map.get("opaque").unwrap(), &challenge.opaque);
    }

    #[test]
    fn test_opaque_is_deterministic() {
        let a = WwwAuthenticateHeader::new("example.com", None, "abc123", Algorithm::MD5);
        let b = WwwAuthenticateHeader::new("example.com", None, "abc123", Algorithm::MD5);
        let c = WwwAuthenticateHeader::new("example.com", None, "def456", Algorithm::MD5);

        assert_eq!(a.opaque, b.opaque);
        assert_ne!(a.opaque, c.opaque);
    }
}
