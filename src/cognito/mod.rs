use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::TOKEN_EXPIRY_MARGIN_SECS;

pub mod client;
pub mod session;
pub mod srp;
pub mod token_cache;

/// AWS temporary credentials, serialized with the field names used by
/// `credential_process` and the AWS APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

/// Tokens issued by the user pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitoTokens {
    pub id_token: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_expires: DateTime<Utc>,
}

impl CognitoTokens {
    pub fn from_auth_result(result: AuthenticationResult, now: DateTime<Utc>) -> Self {
        Self {
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            token_expires: now + Duration::seconds(result.expires_in),
        }
    }

    /// Whether the id token can still be exchanged at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expires - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > now
    }
}

/// Successful outcome of a user pool sign-in or refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// `PASSWORD_VERIFIER` challenge returned by the start of an SRP sign-in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SrpChallenge {
    pub parameters: HashMap<String, String>,
    pub session: Option<String>,
}

/// Credentials handed out by the identity pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCredentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// User pool app client a sign-in is made against
#[derive(Debug, Clone, Copy)]
pub struct AppClient<'a> {
    pub client_id: &'a str,
    pub metadata: &'a HashMap<String, String>,
}

/// Remote Cognito operations used by a session
#[async_trait]
pub trait CognitoApi: Send + Sync {
    /// `InitiateAuth` with `USER_PASSWORD_AUTH`
    async fn password_auth(
        &self,
        client: AppClient<'_>,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult>;

    /// `InitiateAuth` with `USER_SRP_AUTH`
    async fn start_srp_auth(
        &self,
        client: AppClient<'_>,
        username: &str,
        srp_a: &str,
    ) -> Result<SrpChallenge>;

    /// `RespondToAuthChallenge` for `PASSWORD_VERIFIER`
    async fn respond_password_verifier(
        &self,
        client: AppClient<'_>,
        responses: HashMap<String, String>,
        session: Option<String>,
    ) -> Result<AuthenticationResult>;

    /// `InitiateAuth` with `REFRESH_TOKEN_AUTH`
    async fn refresh_auth(
        &self,
        client: AppClient<'_>,
        refresh_token: &str,
    ) -> Result<AuthenticationResult>;

    async fn get_id(
        &self,
        identity_pool_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<String>;

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &HashMap<String, String>,
        custom_role_arn: Option<&str>,
    ) -> Result<IdentityCredentials>;
}
