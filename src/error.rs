use std::fmt::{self, Display, Formatter};
use std::result;

#[derive(Debug, PartialEq)]
pub enum Error {
    UnsupportedScheme(String),
    MissingRequired(&'static str, String),
    BadQop(String),
    UnknownAlgorithm(String),
    NonceGeneration(String),
}

pub type Result<T> = result::Result<T, Error>;

use Error::*;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedScheme(ctx) => write!(f, "Unsupported authorization scheme: {}", ctx),
            MissingRequired(what, ctx) => write!(f, "Missing \"{}\" in header: {}", what, ctx),
            BadQop(ctx) => write!(f, "Bad Qop option: {}", ctx),
            UnknownAlgorithm(ctx) => write!(f, "Unknown algorithm: {}", ctx),
            NonceGeneration(ctx) => write!(f, "Nonce generation failed: {}", ctx),
        }
    }
}

impl std::error::Error for Error {}
