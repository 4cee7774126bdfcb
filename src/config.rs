use crate::constants::{
    ENV_APP_ID, ENV_IDENTITY_POOL_ID, ENV_METADATA, ENV_PASSWORD, ENV_USER_POOL_ID, ENV_USERNAME,
};
use anyhow::{Context, Result};
use ini::{Ini, ParseOption, Properties};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    env, fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

/// Keys every Cognito configuration must provide
const REQUIRED_KEYS: [&str; 5] = [
    "app_id",
    "password",
    "username",
    "user_pool_id",
    "identity_pool_id",
];

/// Environment variable backing each required key
const ENV_KEYS: [(&str, &str); 5] = [
    ("app_id", ENV_APP_ID),
    ("password", ENV_PASSWORD),
    ("username", ENV_USERNAME),
    ("user_pool_id", ENV_USER_POOL_ID),
    ("identity_pool_id", ENV_IDENTITY_POOL_ID),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--cognito-profile and --cognito-config cannot be used together")]
    ConflictingSources,
    #[error("Cognito configuration from {origin} is missing: {}", missing.join(", "))]
    MissingKeys {
        origin: &'static str,
        missing: Vec<String>,
    },
    #[error("Cognito configuration key '{key}' must be a string")]
    NotAString { key: String },
    #[error("Cognito metadata must be a JSON object")]
    InvalidMetadata,
    #[error("Unknown auth type '{0}', expected user_srp or user_password")]
    UnknownAuthType(String),
    #[error("Could not determine the AWS region; set 'region' or AWS_DEFAULT_REGION")]
    MissingRegion,
    #[error(
        "No Cognito configuration found. Use --cognito-profile, --cognito-config or the COGNITO_* environment variables"
    )]
    NotConfigured,
}

/// User pool authentication flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthType {
    #[default]
    UserSrp,
    UserPassword,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserSrp => "user_srp",
            Self::UserPassword => "user_password",
        }
    }
}

impl FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_srp" => Ok(Self::UserSrp),
            "user_password" => Ok(Self::UserPassword),
            other => Err(ConfigError::UnknownAuthType(other.to_string())),
        }
    }
}

/// Everything needed to sign in to a user pool and exchange the id token
/// with an identity pool.
#[derive(Clone, PartialEq, Eq)]
pub struct CognitoConfig {
    pub app_id: String,
    pub username: String,
    pub password: String,
    pub user_pool_id: String,
    pub identity_pool_id: String,
    pub region: Option<String>,
    pub auth_type: Option<AuthType>,
    /// Forwarded to Cognito as `ClientMetadata`
    pub metadata: HashMap<String, String>,
    /// File used to keep user pool tokens between runs
    pub token_cache: Option<PathBuf>,
}

impl fmt::Debug for CognitoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoConfig")
            .field("app_id", &self.app_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_pool_id", &self.user_pool_id)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("region", &self.region)
            .field("auth_type", &self.auth_type)
            .field("metadata", &self.metadata)
            .field("token_cache", &self.token_cache)
            .finish()
    }
}

impl CognitoConfig {
    /// Build from a parsed JSON object. An empty object means "not configured".
    pub fn from_map(map: &Map<String, Value>) -> Result<Option<Self>, ConfigError> {
        if map.is_empty() {
            return Ok(None);
        }

        let metadata = match map.get("metadata") {
            None | Some(Value::Null) => HashMap::new(),
            Some(Value::Object(object)) => metadata_from_object(object),
            Some(_) => return Err(ConfigError::InvalidMetadata),
        };

        let lookup = |key: &str| match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::NotAString {
                key: key.to_string(),
            }),
        };

        Self::build("JSON config", lookup, metadata).map(Some)
    }

    /// Build from the `COGNITO_*` environment variables, which must be set
    /// all together or not at all.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let missing: Vec<String> = ENV_KEYS
            .iter()
            .filter(|(_, var)| lookup(*var).is_none())
            .map(|(_, var)| (*var).to_string())
            .collect();

        if missing.len() == ENV_KEYS.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys {
                origin: "environment",
                missing,
            }
            .into());
        }

        let metadata = match lookup(ENV_METADATA) {
            Some(raw) => {
                parse_metadata(&raw).with_context(|| format!("Failed to parse {ENV_METADATA}"))?
            }
            None => HashMap::new(),
        };

        let config = Self::build(
            "environment",
            |key| {
                Ok(ENV_KEYS
                    .iter()
                    .find(|(name, _)| *name == key)
                    .and_then(|(_, var)| lookup(*var)))
            },
            metadata,
        )?;

        Ok(Some(config))
    }

    fn from_ini_section(section: &Properties) -> Result<Self> {
        let metadata = section
            .get("metadata")
            .map(parse_metadata)
            .transpose()
            .context("Failed to parse profile metadata")?
            .unwrap_or_default();

        let config = Self::build(
            "profile",
            |key| Ok(section.get(key).map(str::to_string)),
            metadata,
        )?;
        Ok(config)
    }

    fn build<F>(
        origin: &'static str,
        lookup: F,
        metadata: HashMap<String, String>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<Option<String>, ConfigError>,
    {
        let mut values = HashMap::new();
        let mut missing = Vec::new();
        for key in REQUIRED_KEYS {
            match lookup(key)? {
                Some(value) => {
                    values.insert(key, value);
                }
                None => missing.push(key.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys { origin, missing });
        }

        Ok(Self {
            app_id: values.remove("app_id").unwrap_or_default(),
            username: values.remove("username").unwrap_or_default(),
            password: values.remove("password").unwrap_or_default(),
            user_pool_id: values.remove("user_pool_id").unwrap_or_default(),
            identity_pool_id: values.remove("identity_pool_id").unwrap_or_default(),
            region: lookup("region")?,
            auth_type: lookup("auth_type")?.map(|s| s.parse()).transpose()?,
            metadata,
            token_cache: lookup("token_cache")?.map(PathBuf::from),
        })
    }

    /// Region from the configuration, then `default_region`, then the
    /// `<region>_<id>` prefix of the user pool id.
    pub fn resolve_region(&self, default_region: Option<String>) -> Result<String, ConfigError> {
        self.region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| default_region.filter(|r| !r.is_empty()))
            .or_else(|| {
                self.user_pool_id
                    .split_once('_')
                    .map(|(region, _)| region.to_string())
                    .filter(|r| !r.is_empty())
            })
            .ok_or(ConfigError::MissingRegion)
    }

    pub fn resolve_auth_type(&self, env_value: Option<String>) -> Result<AuthType, ConfigError> {
        match (self.auth_type, env_value) {
            (Some(auth_type), _) => Ok(auth_type),
            (None, Some(raw)) => raw.parse(),
            (None, None) => Ok(AuthType::default()),
        }
    }
}

/// Load a named profile from the Cognito credentials file. Sections are
/// looked up as `[name]` first, then `[profile name]`.
pub fn load_profile(path: &Path, profile: &str) -> Result<CognitoConfig> {
    // Passwords and metadata JSON are taken verbatim
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_file_opt(path, options)
        .with_context(|| format!("Failed to load Cognito credentials file: {}", path.display()))?;

    let section = ini
        .section(Some(profile))
        .or_else(|| ini.section(Some(format!("profile {profile}"))))
        .with_context(|| format!("Profile '{profile}' not found in {}", path.display()))?;

    CognitoConfig::from_ini_section(section)
        .with_context(|| format!("Invalid Cognito profile '{profile}'"))
}

fn parse_metadata(raw: &str) -> Result<HashMap<String, String>> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(object) => Ok(metadata_from_object(&object)),
        _ => Err(ConfigError::InvalidMetadata.into()),
    }
}

fn metadata_from_object(object: &Map<String, Value>) -> HashMap<String, String> {
    object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
