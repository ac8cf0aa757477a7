//! HTTP credentials for the collaboration-only parts of the archive.
//!
//! Read from a one-line `username:password` file (by default
//! `$HOME/.desi_http_user`), or from `DESI_USER`/`DESI_PASSWD` when both are
//! set in the environment.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const CREDENTIALS_FILE_NAME: &str = ".desi_http_user";
pub const USER_ENV: &str = "DESI_USER";
pub const PASSWORD_ENV: &str = "DESI_PASSWD";

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error(
        "no DESI credentials found at {}; put them in that file as a single line 'username:password'",
        .0.display()
    )]
    Missing(PathBuf),

    #[error("credentials file {} must contain a single line 'username:password'", .0.display())]
    Malformed(PathBuf),

    #[error("cannot locate the home directory for the default credentials file")]
    NoHome,

    #[error("reading credentials file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// `$HOME/.desi_http_user`.
    pub fn default_path() -> Result<PathBuf, CredentialsError> {
        std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(|h| PathBuf::from(h).join(CREDENTIALS_FILE_NAME))
            .ok_or(CredentialsError::NoHome)
    }

    /// Parses `username:password`; the password may itself contain `:`.
    pub fn parse(content: &str) -> Option<Self> {
        let line = content.trim_end();
        let (user, password) = line.split_once(':')?;
        if user.is_empty() || line.contains('\n') {
            return None;
        }
        Some(Self {
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialsError::Missing(path.to_path_buf()))
            }
            Err(source) => {
                return Err(CredentialsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let creds =
            Self::parse(&content).ok_or_else(|| CredentialsError::Malformed(path.to_path_buf()))?;
        tracing::debug!(user = %creds.user, path = %path.display(), "loaded DESI credentials");
        Ok(creds)
    }

    /// Environment variables win when both are set; otherwise the file at
    /// `path` (or the default location) is read.
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self, CredentialsError> {
        if let (Ok(user), Ok(password)) = (std::env::var(USER_ENV), std::env::var(PASSWORD_ENV)) {
            if !user.is_empty() {
                tracing::debug!(%user, "using DESI credentials from the environment");
                return Ok(Self { user, password });
            }
        }
        match path {
            Some(p) => Self::load(p),
            None => Self::load(&Self::default_path()?),
        }
    }
}
