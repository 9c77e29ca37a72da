//! SSH credentials for fetching templates and template branches over git.

use std::path::{Path, PathBuf};

use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks};

/// Give up after this many credential callbacks for one operation; libgit2
/// keeps asking for as long as the server rejects what it is given.
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Optional SSH key material. With no private key configured, the SSH agent
/// is used; user/password authentication goes through git's credential helper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshCredentials {
    pub public_key: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
}

impl SshCredentials {
    /// Agent / credential-helper only.
    pub fn agent() -> Self {
        Self::default()
    }

    /// Explicit key pair. `~/` prefixes are expanded against the home directory.
    pub fn key_pair(
        private_key: impl AsRef<Path>,
        public_key: Option<&Path>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            private_key: Some(expand_home(private_key.as_ref())),
            public_key: public_key.map(expand_home),
            passphrase,
        }
    }

    /// Callbacks answering libgit2 credential requests with this key material.
    pub fn remote_callbacks(&self, config: Option<git2::Config>) -> RemoteCallbacks<'static> {
        let creds = self.clone();
        let mut attempts = 0usize;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_AUTH_ATTEMPTS {
                return Err(git2::Error::from_str(&format!(
                    "authentication failed for {url} after {MAX_AUTH_ATTEMPTS} attempts"
                )));
            }
            let user = username_from_url.unwrap_or("git");
            if allowed.contains(CredentialType::SSH_KEY) {
                if let Some(private_key) = creds.private_key.as_deref() {
                    return Cred::ssh_key(
                        user,
                        creds.public_key.as_deref(),
                        private_key,
                        creds.passphrase.as_deref(),
                    );
                }
                return Cred::ssh_key_from_agent(user);
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(cfg) = config.as_ref() {
                    if let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            if allowed.contains(CredentialType::USERNAME) {
                return Cred::username(user);
            }
            Cred::default()
        });
        callbacks
    }

    /// [`FetchOptions`] wired to [`SshCredentials::remote_callbacks`].
    pub fn fetch_options(&self, config: Option<git2::Config>) -> FetchOptions<'static> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.remote_callbacks(config));
        options
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
