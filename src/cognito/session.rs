use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{
    AppClient, AuthenticationResult, CognitoApi, CognitoTokens, Credentials, srp::SrpSession,
    token_cache::TokenCache,
};
use crate::config::{AuthType, CognitoConfig};

/// Per-session settings resolved from the configuration and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub region: String,
    pub auth_type: AuthType,
    pub custom_role_arn: Option<String>,
}

/// Signed-in context against one user pool and identity pool
pub struct CognitoSession<A> {
    api: A,
    config: CognitoConfig,
    options: SessionOptions,
    cache: TokenCache,
    tokens: Option<CognitoTokens>,
}

impl<A: CognitoApi> CognitoSession<A> {
    /// Create a session, picking up tokens from the configured cache
    pub async fn open(api: A, config: CognitoConfig, options: SessionOptions) -> Result<Self> {
        let cache = TokenCache::from_path(config.token_cache.clone());
        let tokens = cache.load().await?;

        Ok(Self {
            api,
            config,
            options,
            cache,
            tokens,
        })
    }

    pub fn tokens(&self) -> Option<&CognitoTokens> {
        self.tokens.as_ref()
    }

    /// Key of the identity pool `Logins` map for this user pool
    pub fn login_provider(&self) -> String {
        format!(
            "cognito-idp.{}.amazonaws.com/{}",
            self.options.region, self.config.user_pool_id
        )
    }

    /// Sign in to the user pool, preferring the refresh token when one is
    /// known. A rejected refresh token falls back to a full sign-in.
    pub async fn login(&mut self) -> Result<&CognitoTokens> {
        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|tokens| tokens.refresh_token.clone());

        let result = match refresh_token {
            Some(refresh_token) => {
                debug!("Refreshing Cognito tokens");
                match self.api.refresh_auth(self.app_client(), &refresh_token).await {
                    Ok(result) => result,
                    Err(e) => {
                        info!("Token refresh failed, signing in again: {e:#}");
                        self.tokens = None;
                        self.authenticate().await?
                    }
                }
            }
            None => self.authenticate().await?,
        };

        let tokens = CognitoTokens::from_auth_result(result, Utc::now());
        self.cache.store(&tokens).await?;
        Ok(self.tokens.insert(tokens))
    }

    /// Exchange the id token for temporary AWS credentials
    pub async fn credentials(&mut self) -> Result<Credentials> {
        let cached = self
            .tokens
            .as_ref()
            .filter(|tokens| tokens.is_valid_at(Utc::now()))
            .cloned();
        let tokens = match cached {
            Some(tokens) => tokens,
            None => self.login().await?.clone(),
        };

        let logins = HashMap::from([(self.login_provider(), tokens.id_token.clone())]);

        let identity_id = self
            .api
            .get_id(&self.config.identity_pool_id, &logins)
            .await?;
        debug!("Cognito identity: {}", identity_id);

        let creds = self
            .api
            .get_credentials_for_identity(
                &identity_id,
                &logins,
                self.options.custom_role_arn.as_deref(),
            )
            .await?;

        // Whichever of the id token and the AWS credentials expires first
        let expiration = creds
            .expiration
            .map_or(tokens.token_expires, |e| e.min(tokens.token_expires));

        info!("Obtained AWS credentials for identity {}", identity_id);
        Ok(Credentials {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_key,
            session_token: creds.session_token,
            expiration: Some(expiration),
        })
    }

    async fn authenticate(&self) -> Result<AuthenticationResult> {
        let client = self.app_client();
        match self.options.auth_type {
            AuthType::UserPassword => {
                info!("Signing in to Cognito with USER_PASSWORD_AUTH");
                self.api
                    .password_auth(client, &self.config.username, &self.config.password)
                    .await
            }
            AuthType::UserSrp => {
                info!("Signing in to Cognito with USER_SRP_AUTH");
                let srp = SrpSession::new(&self.config.user_pool_id)?;
                let challenge = self
                    .api
                    .start_srp_auth(client, &self.config.username, &srp.srp_a())
                    .await?;
                let responses =
                    srp.process_challenge(&self.config.password, &challenge.parameters, Utc::now())?;
                self.api
                    .respond_password_verifier(client, responses, challenge.session)
                    .await
            }
        }
    }

    fn app_client(&self) -> AppClient<'_> {
        AppClient {
            client_id: &self.config.app_id,
            metadata: &self.config.metadata,
        }
    }
}
