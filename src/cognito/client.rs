use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentity::{Client as IdentityClient, config::Config as IdentityConfig};
use aws_sdk_cognitoidentityprovider::{
    Client as IdpClient,
    config::Config as IdpConfig,
    types::{AuthFlowType, AuthenticationResultType, ChallengeNameType},
};
use aws_smithy_types::DateTime;
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

use super::{AppClient, AuthenticationResult, CognitoApi, IdentityCredentials, SrpChallenge};

/// Cognito user pool and identity pool clients from the AWS SDK
#[derive(Debug, Clone)]
pub struct SdkCognitoApi {
    idp: IdpClient,
    identity: IdentityClient,
}

impl SdkCognitoApi {
    pub fn new(region: &str) -> Self {
        debug!("Creating Cognito clients in region {}", region);
        let region = Region::new(region.to_string());

        // No credentials provider: every call made here is unauthenticated
        let idp_config = IdpConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region.clone())
            .build();
        let identity_config = IdentityConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .build();

        Self {
            idp: IdpClient::from_conf(idp_config),
            identity: IdentityClient::from_conf(identity_config),
        }
    }
}

#[async_trait]
impl CognitoApi for SdkCognitoApi {
    async fn password_auth(
        &self,
        client: AppClient<'_>,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult> {
        let response = self
            .idp
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(client.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .set_client_metadata(client_metadata(client))
            .send()
            .await
            .context("Cognito USER_PASSWORD_AUTH sign-in failed")?;

        match response.authentication_result() {
            Some(result) => convert_auth_result(result, None),
            None => anyhow::bail!(
                "Cognito answered the password sign-in with challenge {:?}",
                response.challenge_name()
            ),
        }
    }

    async fn start_srp_auth(
        &self,
        client: AppClient<'_>,
        username: &str,
        srp_a: &str,
    ) -> Result<SrpChallenge> {
        let response = self
            .idp
            .initiate_auth()
            .auth_flow(AuthFlowType::UserSrpAuth)
            .client_id(client.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("SRP_A", srp_a)
            .set_client_metadata(client_metadata(client))
            .send()
            .await
            .context("Cognito USER_SRP_AUTH sign-in failed")?;

        if response.challenge_name() != Some(&ChallengeNameType::PasswordVerifier) {
            anyhow::bail!(
                "Expected a PASSWORD_VERIFIER challenge, Cognito sent {:?}",
                response.challenge_name()
            );
        }

        Ok(SrpChallenge {
            parameters: response.challenge_parameters().cloned().unwrap_or_default(),
            session: response.session().map(str::to_string),
        })
    }

    async fn respond_password_verifier(
        &self,
        client: AppClient<'_>,
        responses: HashMap<String, String>,
        session: Option<String>,
    ) -> Result<AuthenticationResult> {
        let response = self
            .idp
            .respond_to_auth_challenge()
            .client_id(client.client_id)
            .challenge_name(ChallengeNameType::PasswordVerifier)
            .set_challenge_responses(Some(responses))
            .set_session(session)
            .set_client_metadata(client_metadata(client))
            .send()
            .await
            .context("Cognito rejected the PASSWORD_VERIFIER response")?;

        match response.authentication_result() {
            Some(result) => convert_auth_result(result, None),
            None => anyhow::bail!(
                "Cognito answered the password verifier with challenge {:?}",
                response.challenge_name()
            ),
        }
    }

    async fn refresh_auth(
        &self,
        client: AppClient<'_>,
        refresh_token: &str,
    ) -> Result<AuthenticationResult> {
        let response = self
            .idp
            .initiate_auth()
            .auth_flow(AuthFlowType::RefreshTokenAuth)
            .client_id(client.client_id)
            .auth_parameters("REFRESH_TOKEN", refresh_token)
            .set_client_metadata(client_metadata(client))
            .send()
            .await
            .context("Cognito REFRESH_TOKEN_AUTH failed")?;

        let result = response
            .authentication_result()
            .context("Cognito returned no tokens for the refresh request")?;

        // Refreshing does not rotate the refresh token
        convert_auth_result(result, Some(refresh_token))
    }

    async fn get_id(
        &self,
        identity_pool_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<String> {
        let response = self
            .identity
            .get_id()
            .identity_pool_id(identity_pool_id)
            .set_logins(Some(logins.clone()))
            .send()
            .await
            .context("Failed to get Cognito identity id")?;

        response
            .identity_id()
            .map(str::to_string)
            .context("Cognito returned no identity id")
    }

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &HashMap<String, String>,
        custom_role_arn: Option<&str>,
    ) -> Result<IdentityCredentials> {
        let response = self
            .identity
            .get_credentials_for_identity()
            .identity_id(identity_id)
            .set_logins(Some(logins.clone()))
            .set_custom_role_arn(custom_role_arn.map(str::to_string))
            .send()
            .await
            .context("Failed to get credentials for Cognito identity")?;

        let creds = response
            .credentials()
            .context("Cognito identity returned no credentials")?;

        Ok(IdentityCredentials {
            access_key_id: creds
                .access_key_id()
                .context("AccessKeyId missing from identity credentials")?
                .to_string(),
            secret_key: creds
                .secret_key()
                .context("SecretKey missing from identity credentials")?
                .to_string(),
            session_token: creds
                .session_token()
                .context("SessionToken missing from identity credentials")?
                .to_string(),
            expiration: creds.expiration().and_then(to_chrono),
        })
    }
}

fn client_metadata(client: AppClient<'_>) -> Option<HashMap<String, String>> {
    (!client.metadata.is_empty()).then(|| client.metadata.clone())
}

fn convert_auth_result(
    result: &AuthenticationResultType,
    refresh_token: Option<&str>,
) -> Result<AuthenticationResult> {
    Ok(AuthenticationResult {
        id_token: result
            .id_token()
            .context("IdToken missing from authentication result")?
            .to_string(),
        access_token: result
            .access_token()
            .context("AccessToken missing from authentication result")?
            .to_string(),
        refresh_token: result.refresh_token().or(refresh_token).map(str::to_string),
        expires_in: i64::from(result.expires_in()),
    })
}

fn to_chrono(value: &DateTime) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_auth_result_keeps_refresh_token() {
        let result = AuthenticationResultType::builder()
            .id_token("id")
            .access_token("access")
            .expires_in(3600)
            .build();

        let converted = convert_auth_result(&result, Some("refresh")).unwrap();
        assert_eq!(converted.id_token, "id");
        assert_eq!(converted.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(converted.expires_in, 3600);
    }

    #[test]
    fn test_convert_auth_result_requires_id_token() {
        let result = AuthenticationResultType::builder()
            .access_token("access")
            .build();

        let err = convert_auth_result(&result, None).unwrap_err();
        assert!(err.to_string().contains("IdToken"));
    }

    #[test]
    fn test_to_chrono() {
        let value = DateTime::from_secs(1_800_000_000);
        let converted = to_chrono(&value).unwrap();
        assert_eq!(converted.timestamp(), 1_800_000_000);
    }

    #[test]
    fn test_client_metadata_empty_is_omitted() {
        let empty = HashMap::new();
        let client = AppClient {
            client_id: "client",
            metadata: &empty,
        };
        assert_eq!(client_metadata(client), None);

        let metadata = HashMap::from([("k".to_string(), "v".to_string())]);
        let client = AppClient {
            client_id: "client",
            metadata: &metadata,
        };
        assert_eq!(client_metadata(client), Some(metadata.clone()));
    }
}
