//! AWS credential resolution.
//!
//! Credentials are looked up from an AWS cli profile and handed to each
//! external command through its own environment. The stagely process
//! environment is never modified.

use crate::cli::OutputManager;
use crate::config::{AWS_PROFILE, ConfigStore};
use crate::error::{CredentialError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use crate::prompt::{self, Prompter};
use std::fmt;

/// Retries granted to the initial `configure` prompt
pub const CONFIGURE_RETRIES: u32 = 2;

/// Access key pair for one AWS cli profile
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// AWS access key id
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Environment handed to every collaborator command in a workflow
#[derive(Debug, Clone)]
pub struct SessionEnv {
    credentials: AwsCredentials,
    state_store: Option<String>,
}

impl SessionEnv {
    /// Session carrying only credentials
    pub fn new(credentials: AwsCredentials) -> Self {
        Self {
            credentials,
            state_store: None,
        }
    }

    /// Add the kops state-store bucket
    pub fn with_state_store(mut self, bucket: impl Into<String>) -> Self {
        self.state_store = Some(bucket.into());
        self
    }

    /// `s3://` URL of the state store, when one is set
    pub fn state_store_url(&self) -> Option<String> {
        self.state_store.as_ref().map(|bucket| format!("s3://{bucket}"))
    }

    /// Attach the session environment to `command`
    pub fn apply(&self, command: CommandSpec) -> CommandSpec {
        let command = command
            .env("AWS_ACCESS_KEY_ID", &self.credentials.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &self.credentials.secret_access_key);

        match self.state_store_url() {
            Some(url) => command.env("KOPS_STATE_STORE", url),
            None => command,
        }
    }
}

/// Resolves credentials, re-prompting for a profile on failure
pub struct CredentialManager<'a, R, P> {
    runner: &'a R,
    prompter: &'a P,
    store: &'a ConfigStore,
    output: &'a OutputManager,
}

impl<'a, R: ProcessRunner, P: Prompter> CredentialManager<'a, R, P> {
    /// Create a credential manager
    pub fn new(
        runner: &'a R,
        prompter: &'a P,
        store: &'a ConfigStore,
        output: &'a OutputManager,
    ) -> Self {
        Self {
            runner,
            prompter,
            store,
            output,
        }
    }

    /// Prompt for a profile until one resolves or `retries` runs out.
    ///
    /// The profile that resolved is saved as `awsProfile`.
    pub async fn configure(&self, retries: u32) -> Result<AwsCredentials> {
        let mut remaining = retries;

        loop {
            let profile = prompt::ask_profile(self.prompter)?;

            if let Some(credentials) = self.lookup(&profile).await? {
                self.store.write(AWS_PROFILE, &profile)?;
                return Ok(credentials);
            }

            if remaining == 0 {
                return Err(CredentialError::ResolutionFailed { profile }.into());
            }
            remaining -= 1;

            let _ = self.output.warn(&format!(
                "AWS cli profile '{profile}' could not be resolved, try another ({} attempt(s) left)",
                remaining + 1
            ));
        }
    }

    /// Resolve `profile`; on failure fall back to `configure(retries - 1)`
    /// when retries remain.
    pub async fn expose(&self, profile: &str, retries: u32) -> Result<AwsCredentials> {
        if let Some(credentials) = self.lookup(profile).await? {
            return Ok(credentials);
        }

        if retries == 0 {
            return Err(CredentialError::ResolutionFailed {
                profile: profile.to_string(),
            }
            .into());
        }

        let _ = self.output.warn(&format!(
            "AWS cli profile '{profile}' could not be resolved"
        ));
        self.configure(retries - 1).await
    }

    async fn lookup(&self, profile: &str) -> Result<Option<AwsCredentials>> {
        let Some(access_key_id) = self.get_value("aws_access_key_id", profile).await? else {
            return Ok(None);
        };
        let Some(secret_access_key) = self.get_value("aws_secret_access_key", profile).await?
        else {
            return Ok(None);
        };

        log::debug!("Resolved credentials for profile '{}'", profile);
        Ok(Some(AwsCredentials {
            access_key_id,
            secret_access_key,
        }))
    }

    async fn get_value(&self, key: &str, profile: &str) -> Result<Option<String>> {
        let command = CommandSpec::new("aws")
            .args(["configure", "get", key, "--profile", profile])
            .silent();
        let result = self.runner.run(&command).await?;

        let value = result.stdout.trim();
        if !result.clean() || value.is_empty() {
            log::warn!(
                "`aws configure get {}` failed for profile '{}': {}",
                key,
                profile,
                result.output().trim()
            );
            return Ok(None);
        }

        Ok(Some(value.to_string()))
    }
}
