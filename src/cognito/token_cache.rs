use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

use super::CognitoTokens;

/// Where user pool tokens are kept between sign-ins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenCache {
    /// Tokens live only as long as the session
    #[default]
    Memory,
    /// Tokens are written to a JSON file and read back by the next run
    File(PathBuf),
}

impl TokenCache {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Memory, Self::File)
    }

    /// Load previously cached tokens. A missing or empty file holds none.
    pub async fn load(&self) -> Result<Option<CognitoTokens>> {
        let Self::File(path) = self else {
            return Ok(None);
        };

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read token cache: {}", path.display()))?;

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let tokens = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token cache: {}", path.display()))?;
        debug!("Loaded cached Cognito tokens from {}", path.display());
        Ok(Some(tokens))
    }

    pub async fn store(&self, tokens: &CognitoTokens) -> Result<()> {
        let Self::File(path) = self else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string(tokens)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write token cache: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(path).await?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o600);
            fs::set_permissions(path, permissions).await?;
        }

        info!("Caching Cognito tokens to {}", path.display());
        Ok(())
    }
}
