use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde_json::{Map, Value};
use std::{io, path::PathBuf};

use crate::{
    commands,
    config::ConfigError,
    constants,
    session::{SdkSessionFactory, SessionFactory, SessionSource},
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "cognito-assume-role",
    version,
    about = "Get temporary AWS credentials through a Cognito session",
    long_about = "Signs in to a Cognito user pool, exchanges the tokens for AWS credentials \
                  through the identity pool and prints them as JSON on stdout."
)]
pub struct Cli {
    #[arg(
        short = 'p',
        long = "cognito-profile",
        conflicts_with = "cognito_config",
        help = "Profile in the Cognito credentials file"
    )]
    pub cognito_profile: Option<String>,

    #[arg(
        short = 'f',
        long = "cognito-credentials_file",
        visible_alias = "cognito-credentials-file",
        help = "Cognito credentials file [default: ~/.aws/cognito_credentials]"
    )]
    pub cognito_credentials_file: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "cognito-config",
        help = "Cognito configuration as a JSON object"
    )]
    pub cognito_config: Option<String>,

    #[arg(short = 'v', long, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,
}

impl Cli {
    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.cognito_credentials_file {
            Some(path) => Ok(path.clone()),
            None => constants::default_credentials_path()
                .context("Could not determine home directory for the Cognito credentials file"),
        }
    }

    /// Work out which configuration the session is built from
    pub fn session_source(&self) -> Result<SessionSource> {
        match (&self.cognito_profile, &self.cognito_config) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingSources.into()),
            (Some(name), None) => Ok(SessionSource::Profile {
                name: name.clone(),
                credentials_file: self.credentials_file()?,
            }),
            (None, Some(json)) => {
                let map: Map<String, Value> = serde_json::from_str(json)
                    .context("Failed to parse --cognito-config as a JSON object")?;
                Ok(SessionSource::Config(map))
            }
            (None, None) => Ok(SessionSource::Defaults),
        }
    }

    pub async fn execute(self) -> Result<()> {
        self.execute_with(&SdkSessionFactory, &mut io::stdout().lock())
            .await
    }

    pub async fn execute_with<F, W>(self, factory: &F, out: &mut W) -> Result<()>
    where
        F: SessionFactory,
        W: io::Write,
    {
        let source = self.session_source()?;
        commands::print_credentials(factory, source, out).await
    }
}
