use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no identifier given; pass one or set SKEETBOY_IDENTIFIER")]
    NoIdentifier,
    #[error("no app password; set SKEETBOY_APP_PASSWORD or type it when prompted")]
    NoPassword,
}

/// Handle/email plus app password for `createSession`.
#[derive(Clone)]
pub struct LoginCredentials {
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Return candidate .env paths in priority order.
fn env_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/skeetboy/.env"));
    }
    paths.push(PathBuf::from(".env"));
    paths
}

/// Load .env files without overriding variables already in the environment.
pub fn load_env_files() {
    for path in env_file_paths() {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve login credentials from explicit values, then the environment.
///
/// `prompt` is only called when no password was passed or found in the environment.
pub fn resolve_login(
    identifier: Option<String>,
    password: Option<String>,
    prompt: impl FnOnce() -> Option<String>,
) -> Result<LoginCredentials, CredentialError> {
    let identifier = identifier
        .filter(|v| !v.is_empty())
        .or_else(|| env_var("SKEETBOY_IDENTIFIER"))
        .ok_or(CredentialError::NoIdentifier)?;

    let password = password
        .filter(|v| !v.is_empty())
        .or_else(|| env_var("SKEETBOY_APP_PASSWORD"))
        .or_else(prompt)
        .filter(|v| !v.is_empty())
        .ok_or(CredentialError::NoPassword)?;

    Ok(LoginCredentials {
        identifier,
        password,
    })
}
