// src/sheets/auth.rs
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use yup_oauth2::{
    authenticator::DefaultAuthenticator, ApplicationSecret, InstalledFlowAuthenticator,
    InstalledFlowReturnMethod,
};

use super::TokenSource;

/// If modifying this scope, delete the saved token file.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Read an OAuth client secret (`installed` or `web` section) as downloaded from the cloud console.
pub async fn load_client_secret(path: impl AsRef<Path>) -> Result<ApplicationSecret> {
    let path = path.as_ref();
    yup_oauth2::read_application_secret(path)
        .await
        .with_context(|| format!("unable to read client secret file {}", path.display()))
}

/// Installed-app OAuth flow with an on-disk token cache.
///
/// The first run prints a consent link and reads the authorization code from stdin; later
/// runs reuse and refresh the cached token.
pub struct Authenticator {
    inner: DefaultAuthenticator,
}

impl Authenticator {
    pub async fn new(secret: ApplicationSecret, token_path: impl AsRef<Path>) -> Result<Self> {
        let token_path = token_path.as_ref();
        info!(path = %token_path.display(), "using token cache");
        if let Some(dir) = token_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating token directory {}", dir.display()))?;
        }
        let inner =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::Interactive)
                .persist_tokens_to_disk(token_path)
                .build()
                .await
                .context("while initializing OAuth client")?;
        Ok(Self { inner })
    }
}

impl TokenSource for Authenticator {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .inner
            .token(&[SPREADSHEETS_SCOPE])
            .await
            .context("while getting token")?;
        debug!(expires = ?token.expiration_time(), "access token ready");
        token
            .token()
            .map(str::to_string)
            .context("authorization server returned no access token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const INSTALLED: &str = r#"{"installed":{"client_id":"id.apps.googleusercontent.com","project_id":"covid","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","client_secret":"s3cret","redirect_uris":["urn:ietf:wg:oauth:2.0:oob","http://localhost"]}}"#;

    #[tokio::test]
    async fn reads_installed_secret() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(INSTALLED.as_bytes())?;
        let secret = load_client_secret(tmp.path()).await?;
        assert_eq!(secret.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secret.client_secret, "s3cret");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");
        Ok(())
    }

    #[tokio::test]
    async fn reads_web_secret() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(
            br#"{"web":{"client_id":"a","client_secret":"b","auth_uri":"https://x/auth","token_uri":"https://x/token","redirect_uris":["http://localhost"]}}"#,
        )?;
        let secret = load_client_secret(tmp.path()).await?;
        assert_eq!(secret.client_id, "a");
        Ok(())
    }

    #[tokio::test]
    async fn missing_secret_names_the_path() {
        let err = load_client_secret("/nonexistent/credentials.json")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/credentials.json"));
    }
}
