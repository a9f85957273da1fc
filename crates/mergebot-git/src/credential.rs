//! Workspace-scoped credentials.
//!
//! Tokens are handed to git through the credential helper protocol
//! (`git credential approve`) and stored by the `store` helper in a file
//! inside the workspace's `.git` directory. The helper is configured in
//! the workspace's local config only, so nothing outlives the workspace.

use std::fmt;

use serde::Deserialize;

/// An opaque token that never prints itself.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token. Callers must not log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// A token bound to one remote of one workspace.
#[derive(Debug, Clone)]
pub struct Credential {
    pub remote: String,
    pub username: String,
    pub token: Secret,
}

impl Credential {
    pub fn new(remote: impl Into<String>, username: impl Into<String>, token: Secret) -> Self {
        Self {
            remote: remote.into(),
            username: username.into(),
            token,
        }
    }
}

/// Where a credential applies: `host/owner/repo` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialTarget {
    pub protocol: String,
    pub host: String,
    pub path: String,
}

impl CredentialTarget {
    /// Parse `host/path`, e.g. `github.com/owner/repo`. The path must be
    /// spelled exactly as in the remote URL because `useHttpPath` matching
    /// is literal.
    pub fn parse(protocol: &str, host_path: &str) -> Option<Self> {
        let trimmed = host_path.trim_matches('/');
        let (host, path) = trimmed.split_once('/')?;
        if host.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// The `git credential` input describing this target and `credential`.
    pub(crate) fn helper_input(&self, credential: &Credential) -> String {
        format!(
            "protocol={}\nhost={}\npath={}\nusername={}\npassword={}\n\n",
            self.protocol,
            self.host,
            self.path,
            credential.username,
            credential.token.expose()
        )
    }
}
