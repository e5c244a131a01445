use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Digest `algorithm` parameter (spec.md §3: `algorithm ∈ {MD5, MD5-sess}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Md5
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        })
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "md5-sess" => Ok(Algorithm::Md5Sess),
            other => Err(Error::InvalidAuthParam(format!("unsupported digest algorithm: {other}"))),
        }
    }
}

/// Digest `qop` option (spec.md §3, §4.6: `qop ∈ {auth, auth-int}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Qop {
    Auth,
    AuthInt,
}

impl fmt::Display for Qop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        })
    }
}

impl FromStr for Qop {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" => Ok(Qop::Auth),
            "auth-int" => Ok(Qop::AuthInt),
            other => Err(Error::InvalidAuthParam(format!("unsupported qop: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_roundtrips() {
        assert_eq!("MD5-sess".parse::<Algorithm>().unwrap(), Algorithm::Md5Sess);
        assert_eq!(Algorithm::Md5Sess.to_string(), "MD5-sess");
    }

    #[test]
    fn qop_roundtrips() {
        assert_eq!("auth-int".parse::<Qop>().unwrap(), Qop::AuthInt);
        assert_eq!(Qop::Auth.to_string(), "auth");
    }
}
