use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{env, path::PathBuf};
use tracing::info;

use crate::{
    cognito::{
        CognitoApi, Credentials,
        client::SdkCognitoApi,
        session::{CognitoSession, SessionOptions},
    },
    config::{self, CognitoConfig, ConfigError},
    constants::{ENV_AUTH_TYPE, ENV_DEFAULT_REGION, ENV_ROLE_ARN},
};

/// Where the configuration for a session comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSource {
    /// Named profile in the Cognito credentials file
    Profile {
        name: String,
        credentials_file: PathBuf,
    },
    /// Configuration object passed on the command line
    Config(Map<String, Value>),
    /// Environment only
    Defaults,
}

/// Anything that can hand out AWS credentials
#[async_trait]
pub trait CredentialSource: Send {
    async fn credentials(&mut self) -> Result<Credentials>;
}

/// Builds sessions from a configuration source
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: CredentialSource;

    async fn open(&self, source: SessionSource) -> Result<Self::Session>;
}

#[async_trait]
impl<A: CognitoApi> CredentialSource for CognitoSession<A> {
    async fn credentials(&mut self) -> Result<Credentials> {
        CognitoSession::credentials(self).await
    }
}

/// Sessions talking to Cognito through the AWS SDK
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkSessionFactory;

#[async_trait]
impl SessionFactory for SdkSessionFactory {
    type Session = CognitoSession<SdkCognitoApi>;

    async fn open(&self, source: SessionSource) -> Result<Self::Session> {
        let config = resolve_config(source)?;
        let options = session_options(&config, |name| env::var(name).ok())?;
        info!(
            "Using Cognito user pool {} in {} ({})",
            config.user_pool_id,
            options.region,
            options.auth_type.as_str()
        );

        let api = SdkCognitoApi::new(&options.region);
        CognitoSession::open(api, config, options).await
    }
}

/// Turn a session source into a complete configuration. An empty JSON
/// object falls back to the environment, like no configuration at all.
pub fn resolve_config(source: SessionSource) -> Result<CognitoConfig> {
    let config = match source {
        SessionSource::Profile {
            name,
            credentials_file,
        } => {
            info!(
                "Loading Cognito profile '{}' from {}",
                name,
                credentials_file.display()
            );
            Some(config::load_profile(&credentials_file, &name)?)
        }
        SessionSource::Config(map) => match CognitoConfig::from_map(&map)? {
            Some(config) => Some(config),
            None => CognitoConfig::from_env()?,
        },
        SessionSource::Defaults => CognitoConfig::from_env()?,
    };

    config.ok_or_else(|| ConfigError::NotConfigured.into())
}

pub fn session_options(
    config: &CognitoConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SessionOptions> {
    Ok(SessionOptions {
        region: config.resolve_region(lookup(ENV_DEFAULT_REGION))?,
        auth_type: config.resolve_auth_type(lookup(ENV_AUTH_TYPE))?,
        custom_role_arn: lookup(ENV_ROLE_ARN).filter(|arn| !arn.is_empty()),
    })
}
