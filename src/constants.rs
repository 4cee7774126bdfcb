use std::path::PathBuf;

use dirs;

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// Cognito credentials file name, stored next to the AWS credentials file
pub const COGNITO_CREDENTIALS_FILE_NAME: &str = "cognito_credentials";

/// Environment variables holding a complete Cognito configuration
pub const ENV_APP_ID: &str = "COGNITO_APP_ID";
pub const ENV_PASSWORD: &str = "COGNITO_PASSWORD";
pub const ENV_USERNAME: &str = "COGNITO_USERNAME";
pub const ENV_USER_POOL_ID: &str = "COGNITO_USER_POOL_ID";
pub const ENV_IDENTITY_POOL_ID: &str = "COGNITO_IDENTITY_POOL_ID";

/// Optional JSON object forwarded to Cognito as client metadata
pub const ENV_METADATA: &str = "COGNITO_METADATA";

/// Overrides the default user pool authentication flow
pub const ENV_AUTH_TYPE: &str = "COGNITO_AUTH_TYPE";

/// Region fallback when the configuration carries none
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Role requested from the identity pool instead of its default role
pub const ENV_ROLE_ARN: &str = "AWS_ROLE_ARN";

/// Cached id tokens this close to expiry are treated as expired
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Get the default Cognito credentials file path
/// Always returns: ~/.aws/cognito_credentials
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(AWS_CONFIG_DIR_NAME)
            .join(COGNITO_CREDENTIALS_FILE_NAME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_credentials_path() {
        let Some(path) = default_credentials_path() else {
            return;
        };
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            path.to_string_lossy(),
            format!("{}/.aws/cognito_credentials", home.display())
        );
    }
}
