use std::{io, path::PathBuf};

use thiserror::Error;

/// Problems resolving the list of profiles to process. Always fatal for the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profiles configuration file not found: {}", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to read profiles configuration file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("section [{section}] not found in {}", .path.display())]
    MissingSection { path: PathBuf, section: String },

    #[error("key `{key}` not found in section [{section}] of {}", .path.display())]
    MissingKey { path: PathBuf, section: String, key: String },

    #[error("malformed profiles configuration {}:{line}: {reason}", .path.display())]
    Malformed { path: PathBuf, line: usize, reason: String },

    #[error("no profiles declared in {source_name}")]
    EmptyProfileList { source_name: String },

    #[error("unable to determine home directory; pass --profiles-config explicitly")]
    NoHomeDirectory,
}

/// Errors that abort the whole run before or while setting it up.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("profile configuration error")]
    Configuration(#[from] ConfigError),

    #[error("failed to prepare report {location}")]
    Prepare {
        location: String,
        #[source]
        source: io::Error,
    },
}

/// Failures returned by the cloud API seam, already classified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("no credentials available: {0}")]
    NoCredentials(String),

    #[error("{code}: {message}")]
    Auth { code: String, message: String },

    #[error("endpoint unreachable: {0}")]
    Connectivity(String),

    #[error("{}{}", .code.as_deref().map(|c| format!("{c}: ")).unwrap_or_default(), .message)]
    Service { code: Option<String>, message: String },
}

/// Failures scoped to a single profile. The run records them and moves on.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid or expired credentials for profile '{profile}': {reason}")]
    Credential { profile: String, reason: String },

    #[error("could not connect to AWS endpoint for profile '{profile}': {reason}")]
    Connectivity { profile: String, reason: String },

    #[error("failed to retrieve account identity for profile '{profile}': {reason}")]
    IdentityResolution { profile: String, reason: String },

    #[error("unexpected service error for profile '{profile}': {reason}")]
    UnexpectedService { profile: String, reason: String },

    #[error("failed to write report row for profile '{profile}': {source}")]
    Report {
        profile: String,
        #[source]
        source: io::Error,
    },
}

impl ProfileError {
    pub fn from_api(profile: &str, err: ApiError) -> Self {
        let profile = profile.to_string();
        let reason = err.to_string();
        match err {
            ApiError::NoCredentials(_) | ApiError::Auth { .. } => {
                ProfileError::Credential { profile, reason }
            }
            ApiError::Connectivity(_) => ProfileError::Connectivity { profile, reason },
            ApiError::Service { .. } => ProfileError::UnexpectedService { profile, reason },
        }
    }

    pub fn profile(&self) -> &str {
        match self {
            ProfileError::Credential { profile, .. }
            | ProfileError::Connectivity { profile, .. }
            | ProfileError::IdentityResolution { profile, .. }
            | ProfileError::UnexpectedService { profile, .. }
            | ProfileError::Report { profile, .. } => profile,
        }
    }

    /// Errors nobody anticipated; these are always reported at error level.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, ProfileError::UnexpectedService { .. } | ProfileError::Report { .. })
    }
}
