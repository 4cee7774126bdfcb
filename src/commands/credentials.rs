use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;

use crate::session::{CredentialSource, SessionFactory, SessionSource};

/// Obtain AWS credentials for `source` and write them to `out` as a single
/// line of JSON. Nothing is written unless every step succeeds.
pub async fn print_credentials<F, W>(factory: &F, source: SessionSource, out: &mut W) -> Result<()>
where
    F: SessionFactory,
    W: Write,
{
    debug!("Opening Cognito session from {}", source_kind(&source));
    let mut session = factory
        .open(source)
        .await
        .context("Failed to create Cognito session")?;

    let credentials = session
        .credentials()
        .await
        .context("Failed to obtain AWS credentials")?;

    let json = serde_json::to_string(&credentials)?;
    writeln!(out, "{json}")?;
    out.flush()?;

    Ok(())
}

fn source_kind(source: &SessionSource) -> &'static str {
    match source {
        SessionSource::Profile { .. } => "profile",
        SessionSource::Config(_) => "config",
        SessionSource::Defaults => "environment",
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::cognito::Credentials;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Session factory that hands out fixed credentials and remembers what
    /// it was asked to open
    #[derive(Default)]
    pub(crate) struct FakeFactory {
        pub(crate) opened: Mutex<Vec<SessionSource>>,
        pub(crate) fail_open: bool,
        pub(crate) fail_credentials: bool,
    }

    pub(crate) struct FakeSession {
        fail: bool,
    }

    pub(crate) fn fixed_credentials() -> Credentials {
        Credentials {
            access_key_id: "X".to_string(),
            secret_access_key: "Y".to_string(),
            session_token: "Z".to_string(),
            expiration: None,
        }
    }

    #[async_trait]
    impl CredentialSource for FakeSession {
        async fn credentials(&mut self) -> Result<Credentials> {
            if self.fail {
                anyhow::bail!("NotAuthorizedException: Incorrect username or password");
            }
            Ok(fixed_credentials())
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        type Session = FakeSession;

        async fn open(&self, source: SessionSource) -> Result<FakeSession> {
            self.opened.lock().unwrap().push(source);
            if self.fail_open {
                anyhow::bail!("No Cognito configuration found");
            }
            Ok(FakeSession {
                fail: self.fail_credentials,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeFactory;
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_prints_single_json_line() {
        let factory = FakeFactory::default();
        let mut out = Vec::new();

        print_credentials(&factory, SessionSource::Defaults, &mut out)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"AccessKeyId\":\"X\",\"SecretAccessKey\":\"Y\",\"SessionToken\":\"Z\"}\n"
        );
        assert_eq!(
            *factory.opened.lock().unwrap(),
            vec![SessionSource::Defaults]
        );
    }

    #[tokio::test]
    async fn test_config_map_is_passed_through() {
        let factory = FakeFactory::default();
        let map = json!({"a": 1}).as_object().unwrap().clone();
        let mut out = Vec::new();

        print_credentials(&factory, SessionSource::Config(map.clone()), &mut out)
            .await
            .unwrap();

        assert_eq!(
            *factory.opened.lock().unwrap(),
            vec![SessionSource::Config(map)]
        );
    }

    #[tokio::test]
    async fn test_profile_source_is_passed_through() {
        let factory = FakeFactory::default();
        let source = SessionSource::Profile {
            name: "dev".to_string(),
            credentials_file: PathBuf::from("/tmp/cognito_credentials"),
        };
        let mut out = Vec::new();

        print_credentials(&factory, source.clone(), &mut out)
            .await
            .unwrap();

        assert_eq!(*factory.opened.lock().unwrap(), vec![source]);
    }

    #[tokio::test]
    async fn test_open_failure_writes_nothing() {
        let factory = FakeFactory {
            fail_open: true,
            ..Default::default()
        };
        let mut out = Vec::new();

        let err = print_credentials(&factory, SessionSource::Defaults, &mut out)
            .await
            .unwrap_err();

        assert!(out.is_empty());
        assert_eq!(err.to_string(), "Failed to create Cognito session");
        assert!(format!("{err:#}").contains("No Cognito configuration found"));
    }

    #[tokio::test]
    async fn test_credentials_failure_writes_nothing() {
        let factory = FakeFactory {
            fail_credentials: true,
            ..Default::default()
        };
        let mut out = Vec::new();

        let err = print_credentials(&factory, SessionSource::Defaults, &mut out)
            .await
            .unwrap_err();

        assert!(out.is_empty());
        assert!(format!("{err:#}").contains("NotAuthorizedException"));
    }
}
