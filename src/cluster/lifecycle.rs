//! Create, delete and deploy to the staging cluster.
//!
//! Each workflow reads the config file, resolves credentials into a
//! `SessionEnv`, then drives aws, kops and kubectl in a fixed order.

use super::{
    BOOTSTRAP_MANIFESTS, ClusterDescriptor, ClusterSettings, INSTANCE_TYPE, MASTER_COUNT,
    NODE_COUNT, PollOutcome, parse_available_zones, wait_until_ready,
};
use crate::cli::OutputManager;
use crate::config::{AWS_PROFILE, CLUSTER_NAME, CLUSTER_STATE_STORE, ConfigRecord, ConfigStore};
use crate::credentials::{AwsCredentials, CONFIGURE_RETRIES, CredentialManager, SessionEnv};
use crate::error::{CommandError, ConfigError, Result};
use crate::process::{CommandSpec, ProcessRunner, Step, run_steps};
use crate::prompt::{self, Prompter};
use tokio_util::sync::CancellationToken;

const CLEAR_STORE_SCRIPT: &str = include_str!("clear-store.sh");

const SSE_CONFIGURATION: &str =
    r#"{"Rules":[{"ApplyServerSideEncryptionByDefault":{"SSEAlgorithm":"AES256"}}]}"#;

const INGRESS_HOSTNAME_JSONPATH: &str = "jsonpath={.status.loadBalancer.ingress[0].hostname}";

/// Runs the cluster workflows against one config file
pub struct ClusterController<'a, R, P> {
    runner: &'a R,
    prompter: &'a P,
    store: &'a ConfigStore,
    output: &'a OutputManager,
    settings: ClusterSettings,
    cancel: CancellationToken,
}

impl<'a, R: ProcessRunner, P: Prompter> ClusterController<'a, R, P> {
    /// Create a controller with default poll settings
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
            settings: ClusterSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `settings` for the readiness poll
    pub fn with_settings(mut self, settings: ClusterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Stop the readiness poll when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn credentials(&self) -> CredentialManager<'_, R, P> {
        CredentialManager::new(self.runner, self.prompter, self.store, self.output)
    }

    /// Prompt for an AWS cli profile and save it
    pub async fn configure(&self, retries: u32) -> Result<AwsCredentials> {
        let _ = self.output.section("Configure AWS profile");
        self.credentials().configure(retries).await
    }

    /// Load the config file. When it is missing, run `configure` first if
    /// `create_if_missing`, otherwise fail with `ConfigError::Missing`.
    pub async fn read_config(&self, create_if_missing: bool) -> Result<ConfigRecord> {
        if let Some(record) = self.store.load()? {
            return Ok(record);
        }

        if !create_if_missing {
            return Err(ConfigError::Missing {
                path: self.store.path().to_path_buf(),
            }
            .into());
        }

        self.configure(CONFIGURE_RETRIES).await?;
        self.store.require()
    }

    async fn open_session(&self, record: &ConfigRecord) -> Result<SessionEnv> {
        let profile = record.require(AWS_PROFILE)?;
        let credentials = self.credentials().expose(profile, 0).await?;
        Ok(SessionEnv::new(credentials))
    }

    /// Available zones in `region`; any failure yields an empty list
    pub async fn query_zones(&self, env: &SessionEnv, region: &str) -> Vec<String> {
        let command = env.apply(
            CommandSpec::new("aws")
                .args(["ec2", "describe-availability-zones", "--region", region])
                .silent(),
        );

        let result = match self.runner.run(&command).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Zone lookup for {} could not run: {}", region, e);
                return Vec::new();
            }
        };

        if !result.clean() {
            log::warn!(
                "Zone lookup for {} failed: {}",
                region,
                result.output().trim()
            );
            return Vec::new();
        }

        parse_available_zones(&result.stdout).unwrap_or_else(|e| {
            log::warn!("Unreadable zone lookup response for {}: {}", region, e);
            Vec::new()
        })
    }

    /// Interactive cluster creation, bootstrap included
    pub async fn create_cluster(&self) -> Result<i32> {
        let record = self.read_config(true).await?;
        let session = self.open_session(&record).await?;

        let _ = self.output.section("Create your Kubernetes Cluster");
        let answers = prompt::ask_cluster(self.prompter)?;
        let available = self.query_zones(&session, &answers.region).await;
        let zones = prompt::ask_zones(self.prompter, &available)?;

        let cluster = ClusterDescriptor::new(
            answers.name,
            answers.hosted_zone,
            answers.region,
            zones,
        );
        let cluster_name = cluster.cluster_name();
        let state_store = cluster.state_store_name();

        self.store.write(CLUSTER_NAME, &cluster_name)?;
        self.store.write(CLUSTER_STATE_STORE, &state_store)?;

        let env = session.with_state_store(&state_store);

        let buckets = run_steps(self.runner, state_store_steps(&env, &cluster), self.output).await?;
        if !buckets.all_succeeded() {
            let _ = self.output.warn(&format!(
                "State store setup incomplete ({}); continuing with cluster creation",
                buckets.failed_labels().join(", ")
            ));
        }

        let provision =
            run_steps(self.runner, provision_steps(&env, &cluster), self.output).await?;
        if let Some(failed) = provision.failed.into_iter().next() {
            self.output
                .error(&format!("{} failed for {cluster_name}", failed.label));
            let hint = if provision.succeeded.is_empty() {
                format!("State store bucket s3://{state_store} was left in place")
            } else {
                format!(
                    "The cluster definition is saved in s3://{state_store}; retry with `kops update cluster --name {cluster_name} --yes` or remove it with `stagely delete cluster`"
                )
            };
            let _ = self.output.indent(&hint);
            return Err(failed.into_error().into());
        }

        let _ = self
            .output
            .section("Waiting for cluster to start. This may take a minute.");
        let outcome = wait_until_ready(
            self.runner,
            &env,
            &cluster_name,
            &self.settings,
            &self.cancel,
            self.output,
        )
        .await?;

        match outcome {
            PollOutcome::Ready { .. } => {}
            PollOutcome::TimedOut { waited, .. } => {
                return Err(CommandError::NotReady {
                    cluster: cluster_name,
                    reason: format!("timed out after {}s", waited.as_secs()),
                }
                .into());
            }
            PollOutcome::Cancelled { .. } => {
                return Err(CommandError::NotReady {
                    cluster: cluster_name,
                    reason: "cancelled".to_string(),
                }
                .into());
            }
        }

        let bootstrap = run_steps(self.runner, bootstrap_steps(&env), self.output).await?;

        let mut ready = format!("Cluster {} ready.", cluster.short_name());
        if let Some(hostname) = self.ingress_hostname(&env).await {
            ready.push_str(&format!(" Load balancer: {hostname}"));
        }

        if bootstrap.all_succeeded() {
            let _ = self.output.success(&format!("DONE {ready}"));
            Ok(0)
        } else {
            let _ = self.output.warn(&ready);
            self.output.error(&format!(
                "Some bootstrap manifests failed to apply: {}",
                bootstrap.failed_labels().join(", ")
            ));
            Ok(1)
        }
    }

    async fn ingress_hostname(&self, env: &SessionEnv) -> Option<String> {
        let command = env.apply(
            CommandSpec::new("kubectl")
                .args([
                    "get",
                    "service",
                    "nginx-ingress",
                    "--namespace",
                    "nginx-ingress",
                    "--output",
                    INGRESS_HOSTNAME_JSONPATH,
                ])
                .silent(),
        );

        match self.runner.run(&command).await {
            Ok(result) if result.success() && !result.stdout.trim().is_empty() => {
                Some(result.stdout.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Could not read ingress load balancer: {}", e);
                None
            }
        }
    }

    /// Delete the cluster and its state-store bucket
    pub async fn delete_cluster(&self) -> Result<i32> {
        let record = self.read_config(false).await?;
        let cluster_name = record.require(CLUSTER_NAME)?.to_string();
        let state_store = record.require(CLUSTER_STATE_STORE)?.to_string();
        let env = self
            .open_session(&record)
            .await?
            .with_state_store(&state_store);

        let _ = self.output.section(&format!("Deleting Cluster {cluster_name}"));
        let delete = env.apply(
            CommandSpec::new("kops").args(["delete", "cluster", cluster_name.as_str(), "--yes"]),
        );
        let result = self.runner.run(&delete).await?;

        if !result.success() {
            self.output
                .error("Problem deleting some of your cluster resources.");
            let _ = self.output.indent(&format!(
                "Some resources may remain; re-run `stagely delete cluster` or remove them in the AWS console (kops exit code {})",
                result.code
            ));
            return Ok(1);
        }

        let _ = self.output.println("Finalizing clean up...");
        let cleanup = run_steps(self.runner, cleanup_steps(&env, &state_store), self.output).await?;
        if !cleanup.all_succeeded() {
            let _ = self.output.warn(&format!(
                "State store s3://{state_store} may need to be removed manually"
            ));
        }

        let _ = self.output.success("DONE Cluster deleted successfully");
        Ok(0)
    }

    /// Apply `file` to the cluster
    pub async fn deploy(&self, file: &str) -> Result<i32> {
        let record = self.read_config(false).await?;
        let cluster_name = record.require(CLUSTER_NAME)?.to_string();
        let state_store = record.require(CLUSTER_STATE_STORE)?.to_string();
        let env = self
            .open_session(&record)
            .await?
            .with_state_store(&state_store);

        let _ = self.output.section(&format!("Deploying {file}"));
        let apply = env.apply(CommandSpec::new("kubectl").args(["apply", "-f", file]));
        let result = self.runner.run(&apply).await?;

        if result.success() {
            let _ = self.output.success(&format!(
                "DONE Successfully deployed {file} into {cluster_name}"
            ));
            Ok(0)
        } else {
            self.output
                .error(&format!("Unable to deploy {file} into {cluster_name}"));
            let detail = result.output().trim();
            if !detail.is_empty() {
                let _ = self.output.indent(detail);
            }
            Ok(1)
        }
    }
}

/// Bucket creation, versioning, encryption; failures reported, never fatal
fn state_store_steps(env: &SessionEnv, cluster: &ClusterDescriptor) -> Vec<Step> {
    let bucket = cluster.state_store_name();

    let mut create = CommandSpec::new("aws").args([
        "s3api",
        "create-bucket",
        "--bucket",
        bucket.as_str(),
        "--region",
        cluster.region.as_str(),
    ]);
    // us-east-1 rejects an explicit location constraint, every other region requires one
    if cluster.region != "us-east-1" {
        create = create.args([
            "--create-bucket-configuration".to_string(),
            format!("LocationConstraint={}", cluster.region),
        ]);
    }

    vec![
        Step::continue_on_failure("Create state store bucket", env.apply(create)),
        Step::continue_on_failure(
            "Enable state store versioning",
            env.apply(CommandSpec::new("aws").args([
                "s3api",
                "put-bucket-versioning",
                "--bucket",
                bucket.as_str(),
                "--versioning-configuration",
                "Status=Enabled",
            ])),
        ),
        Step::continue_on_failure(
            "Enable state store encryption",
            env.apply(CommandSpec::new("aws").args([
                "s3api",
                "put-bucket-encryption",
                "--bucket",
                bucket.as_str(),
                "--server-side-encryption-configuration",
                SSE_CONFIGURATION,
            ])),
        ),
    ]
}

/// `kops create cluster` then `kops update cluster --yes`; update only runs after a
/// successful create
fn provision_steps(env: &SessionEnv, cluster: &ClusterDescriptor) -> Vec<Step> {
    let cluster_name = cluster.cluster_name();

    let create = CommandSpec::new("kops").args([
        "create".to_string(),
        "cluster".to_string(),
        "--zones".to_string(),
        cluster.zones.join(","),
        "--master-count".to_string(),
        MASTER_COUNT.to_string(),
        format!("--master-size={INSTANCE_TYPE}"),
        "--node-count".to_string(),
        NODE_COUNT.to_string(),
        format!("--node-size={INSTANCE_TYPE}"),
        cluster_name.clone(),
    ]);
    let update = CommandSpec::new("kops").args([
        "update",
        "cluster",
        "--name",
        cluster_name.as_str(),
        "--yes",
    ]);

    vec![
        Step::abort_on_failure("Cluster creation", env.apply(create)),
        Step::abort_on_failure("Cluster update", env.apply(update)),
    ]
}

/// Dashboard and ingress controller, in dependency order
fn bootstrap_steps(env: &SessionEnv) -> Vec<Step> {
    BOOTSTRAP_MANIFESTS
        .iter()
        .map(|manifest| {
            let step = Step::continue_on_failure(
                format!("Apply {}", manifest.label),
                env.apply(CommandSpec::new("kubectl").args(["apply", "-f", manifest.url])),
            );
            match manifest.section {
                Some(section) => step.with_banner(section),
                None => step,
            }
        })
        .collect()
}

/// Empty the versioned bucket, then remove it
fn cleanup_steps(env: &SessionEnv, state_store: &str) -> Vec<Step> {
    vec![
        Step::continue_on_failure(
            "Clear state store",
            env.apply(
                CommandSpec::new("sh")
                    .args(["-c", CLEAR_STORE_SCRIPT, "clear-store", state_store])
                    .silent(),
            ),
        ),
        Step::continue_on_failure(
            "Remove state store bucket",
            env.apply(
                CommandSpec::new("aws")
                    .args(["s3", "rb", format!("s3://{state_store}").as_str(), "--force"])
                    .silent(),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagelyError;
    use crate::process::ProcessResult;
    use crate::testing::{ScriptedPrompter, ScriptedRunner};
    use std::time::Duration;
    use tempfile::TempDir;

    const ZONES_JSON: &str = r#"{"AvailabilityZones":[
        {"State":"available","ZoneName":"us-east-1a"},
        {"State":"available","ZoneName":"us-east-1b"}
    ]}"#;

    fn happy(cmd: &CommandSpec) -> ProcessResult {
        let line = cmd.to_string();
        if line.starts_with("aws configure get aws_access_key_id") {
            ScriptedRunner::ok("AKIAEXAMPLE\n")
        } else if line.starts_with("aws configure get") {
            ScriptedRunner::ok("secret\n")
        } else if line.starts_with("aws ec2 describe-availability-zones") {
            ScriptedRunner::ok(ZONES_JSON)
        } else if line.starts_with("kubectl get service") {
            ScriptedRunner::ok("a1b2.elb.amazonaws.com\n")
        } else {
            ScriptedRunner::ok("")
        }
    }

    fn fast() -> ClusterSettings {
        ClusterSettings {
            poll_interval: Duration::from_millis(1),
            ready_timeout: Duration::from_millis(50),
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: ConfigStore,
        output: OutputManager,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("Failed to create temp dir");
            let store = ConfigStore::new(dir.path().join("stagely.config"));
            Self {
                _dir: dir,
                store,
                output: OutputManager::new(true),
            }
        }

        fn configured() -> Self {
            let fixture = Self::new();
            fixture.store.write(AWS_PROFILE, "default").unwrap();
            fixture
        }

        fn with_cluster() -> Self {
            let fixture = Self::configured();
            fixture
                .store
                .write(CLUSTER_NAME, "demo.k8s.local")
                .unwrap();
            fixture
                .store
                .write(CLUSTER_STATE_STORE, "demo-state-store")
                .unwrap();
            fixture
        }

        fn controller<'a>(
            &'a self,
            runner: &'a ScriptedRunner,
            prompter: &'a ScriptedPrompter,
        ) -> ClusterController<'a, ScriptedRunner, ScriptedPrompter> {
            ClusterController::new(runner, prompter, &self.store, &self.output)
                .with_settings(fast())
        }
    }

    fn lines_from(runner: &ScriptedRunner, prefix: &str) -> Vec<String> {
        runner
            .command_lines()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    #[tokio::test]
    async fn test_create_cluster_full_flow() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::new([None, None, None]);

        let code = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();
        assert_eq!(code, 0);

        let record = fixture.store.require().unwrap();
        assert_eq!(record.get(CLUSTER_NAME), Some("mycluster.k8s.local"));
        assert_eq!(record.get(CLUSTER_STATE_STORE), Some("mycluster-state-store"));
        assert_eq!(record.get(AWS_PROFILE), Some("default"));

        let lines = runner.command_lines();
        let aws_s3: Vec<&String> = lines.iter().filter(|l| l.starts_with("aws s3api")).collect();
        assert_eq!(aws_s3.len(), 3);
        assert!(aws_s3[0].starts_with(
            "aws s3api create-bucket --bucket mycluster-state-store --region us-east-1"
        ));
        assert!(!aws_s3[0].contains("LocationConstraint"));
        assert!(aws_s3[1].contains("put-bucket-versioning"));
        assert!(aws_s3[2].contains("put-bucket-encryption"));

        assert_eq!(
            lines_from(&runner, "kops"),
            vec![
                "kops create cluster --zones us-east-1a --master-count 1 --master-size=t3.micro --node-count 2 --node-size=t3.micro mycluster.k8s.local",
                "kops update cluster --name mycluster.k8s.local --yes",
                "kops validate cluster --name mycluster.k8s.local",
            ]
        );

        let applies = lines_from(&runner, "kubectl apply");
        assert_eq!(applies.len(), BOOTSTRAP_MANIFESTS.len());
        assert!(applies[0].contains("dashboard"));

        assert_eq!(
            lines_from(&runner, "kubectl get"),
            vec![
                "kubectl get service nginx-ingress --namespace nginx-ingress --output jsonpath={.status.loadBalancer.ingress[0].hostname}"
            ]
        );

        let position = |prefix: &str| lines.iter().position(|l| l.starts_with(prefix)).unwrap();
        assert!(position("aws s3api create-bucket") < position("kops create cluster"));
        assert!(position("kops validate cluster") < position("kubectl apply"));
        assert!(
            lines.iter().rposition(|l| l.starts_with("kubectl apply")).unwrap()
                < position("kubectl get service")
        );

        for call in runner.calls().iter().filter(|c| c.program() == "kops") {
            assert_eq!(
                call.get_env("KOPS_STATE_STORE"),
                Some("s3://mycluster-state-store")
            );
            assert_eq!(call.get_env("AWS_ACCESS_KEY_ID"), Some("AKIAEXAMPLE"));
        }
    }

    #[tokio::test]
    async fn test_create_cluster_runs_configure_when_config_missing() {
        let fixture = Fixture::new();
        let runner = ScriptedRunner::new(happy);
        let prompter =
            ScriptedPrompter::new([Some("staging"), Some("demo"), Some("example.com"), None]);

        let code = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();
        assert_eq!(code, 0);

        let record = fixture.store.require().unwrap();
        assert_eq!(record.get(AWS_PROFILE), Some("staging"));
        assert_eq!(record.get(CLUSTER_NAME), Some("demo.example.com"));
        assert_eq!(record.get(CLUSTER_STATE_STORE), Some("demo-state-store"));
        assert_eq!(prompter.questions()[0], "Enter the AWS cli profile you want to use.");
    }

    #[tokio::test]
    async fn test_zone_lookup_failure_offers_empty_list() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("aws ec2 describe-availability-zones") {
                ScriptedRunner::fail(255, "An error occurred (AuthFailure)")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();

        let offered = prompter.offered();
        assert_eq!(offered.len(), 1);
        assert!(offered[0].0.is_empty());
        assert!(offered[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_zone_lookup_with_stderr_noise_is_empty() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("aws ec2") {
                ProcessResult {
                    code: 0,
                    stdout: ZONES_JSON.to_string(),
                    stderr: "deprecation warning".to_string(),
                }
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::default();
        let controller = fixture.controller(&runner, &prompter);
        let env = SessionEnv::new(AwsCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "shh".to_string(),
        });

        assert!(controller.query_zones(&env, "us-east-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_selected_zones_and_region_reach_kops_and_bucket() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::new([Some("demo"), None, Some("eu-west-1")])
            .with_selection(&["eu-west-1a", "eu-west-1b"]);

        fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();

        let create_bucket = lines_from(&runner, "aws s3api create-bucket");
        assert!(create_bucket[0].ends_with(
            "--region eu-west-1 --create-bucket-configuration LocationConstraint=eu-west-1"
        ));
        let kops_create = lines_from(&runner, "kops create cluster");
        assert!(kops_create[0].contains("--zones eu-west-1a,eu-west-1b"));
    }

    #[tokio::test]
    async fn test_create_failure_stops_before_polling() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("kops create cluster") {
                ScriptedRunner::fail(1, "cluster already exists")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        let err = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagelyError::Command(CommandError::Failed { code: 1, .. })
        ));
        assert_eq!(runner.count_prefix("aws s3api"), 3);
        assert_eq!(runner.count_prefix("kops update"), 0);
        assert_eq!(runner.count_prefix("kops validate"), 0);
        assert_eq!(runner.count_prefix("kubectl"), 0);
    }

    #[tokio::test]
    async fn test_update_failure_stops_before_polling() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("kops update cluster") {
                ScriptedRunner::fail(1, "error building complete spec")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        let err = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap_err();

        match err {
            StagelyError::Command(CommandError::Failed { command, .. }) => {
                assert_eq!(command, "kops update cluster --name mycluster.k8s.local --yes");
            }
            other => panic!("expected update failure, got {other:?}"),
        }
        assert_eq!(runner.count_prefix("kops create cluster"), 1);
        assert_eq!(runner.count_prefix("kops validate"), 0);
        assert_eq!(runner.count_prefix("kubectl"), 0);
    }

    #[tokio::test]
    async fn test_bucket_failure_does_not_stop_creation() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("aws s3api create-bucket") {
                ScriptedRunner::fail(254, "BucketAlreadyOwnedByYou")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        let code = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(runner.count_prefix("aws s3api put-bucket"), 2);
        assert_eq!(runner.count_prefix("kops create cluster"), 1);
    }

    #[tokio::test]
    async fn test_never_ready_cluster_times_out() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("kops validate") {
                ScriptedRunner::fail(2, "machines not ready")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        let err = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagelyError::Command(CommandError::NotReady { .. })
        ));
        assert!(runner.count_prefix("kops validate") >= 1);
        assert_eq!(runner.count_prefix("kubectl"), 0);
    }

    #[tokio::test]
    async fn test_failed_manifest_is_reported_but_rest_applied() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().contains("rbac.yaml") {
                ScriptedRunner::fail(1, "forbidden")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::new([None, None, None]);

        let code = fixture
            .controller(&runner, &prompter)
            .create_cluster()
            .await
            .unwrap();

        assert_eq!(code, 1);
        assert_eq!(
            runner.count_prefix("kubectl apply"),
            BOOTSTRAP_MANIFESTS.len()
        );
    }

    #[tokio::test]
    async fn test_delete_without_config_is_config_missing() {
        let fixture = Fixture::new();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::default();

        let err = fixture
            .controller(&runner, &prompter)
            .delete_cluster()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagelyError::Config(ConfigError::Missing { .. })
        ));
        assert!(runner.calls().is_empty());
        assert!(prompter.questions().is_empty());
        assert!(!fixture.store.exists());
    }

    #[tokio::test]
    async fn test_delete_cluster_cleans_up_state_store() {
        let fixture = Fixture::with_cluster();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::default();

        let code = fixture
            .controller(&runner, &prompter)
            .delete_cluster()
            .await
            .unwrap();

        assert_eq!(code, 0);
        let calls = runner.calls();
        let tail: Vec<&CommandSpec> = calls.iter().skip(2).collect();
        assert_eq!(tail.len(), 3);
        assert_eq!(
            tail[0].to_string(),
            "kops delete cluster demo.k8s.local --yes"
        );
        assert_eq!(tail[1].program(), "sh");
        assert_eq!(
            tail[1].get_args()[2..],
            ["clear-store".to_string(), "demo-state-store".to_string()]
        );
        assert!(tail[1].is_silent());
        assert_eq!(
            tail[2].to_string(),
            "aws s3 rb s3://demo-state-store --force"
        );
        assert_eq!(
            tail[0].get_env("KOPS_STATE_STORE"),
            Some("s3://demo-state-store")
        );
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_bucket() {
        let fixture = Fixture::with_cluster();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.program() == "kops" {
                ScriptedRunner::fail(1, "error deleting resources")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::default();

        let code = fixture
            .controller(&runner, &prompter)
            .delete_cluster()
            .await
            .unwrap();

        assert_eq!(code, 1);
        assert_eq!(runner.count_prefix("aws s3 rb"), 0);
        assert_eq!(runner.count_prefix("sh"), 0);
    }

    #[tokio::test]
    async fn test_deploy_without_config_is_config_missing() {
        let fixture = Fixture::new();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::default();

        let err = fixture
            .controller(&runner, &prompter)
            .deploy("app.yaml")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagelyError::Config(ConfigError::Missing { .. })
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_without_cluster_is_key_missing() {
        let fixture = Fixture::configured();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::default();

        let err = fixture
            .controller(&runner, &prompter)
            .deploy("app.yaml")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagelyError::Config(ConfigError::KeyMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_deploy_applies_file() {
        let fixture = Fixture::with_cluster();
        let runner = ScriptedRunner::new(happy);
        let prompter = ScriptedPrompter::default();

        let code = fixture
            .controller(&runner, &prompter)
            .deploy("app.yaml")
            .await
            .unwrap();

        assert_eq!(code, 0);
        let calls = runner.calls();
        let apply = calls.last().unwrap();
        assert_eq!(apply.to_string(), "kubectl apply -f app.yaml");
        assert!(!apply.is_silent());
        assert_eq!(apply.get_env("AWS_SECRET_ACCESS_KEY"), Some("secret"));
    }

    #[tokio::test]
    async fn test_deploy_failure_exit_code() {
        let fixture = Fixture::with_cluster();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.program() == "kubectl" {
                ScriptedRunner::fail(1, "error: the path \"app.yaml\" does not exist")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::default();

        let code = fixture
            .controller(&runner, &prompter)
            .deploy("app.yaml")
            .await
            .unwrap();

        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_deploy_with_unknown_profile_fails_without_prompting() {
        let fixture = Fixture::with_cluster();
        let runner = ScriptedRunner::new(|cmd| {
            if cmd.to_string().starts_with("aws configure get") {
                ScriptedRunner::fail(255, "The config profile (default) could not be found")
            } else {
                happy(cmd)
            }
        });
        let prompter = ScriptedPrompter::default();

        let err = fixture
            .controller(&runner, &prompter)
            .deploy("app.yaml")
            .await
            .unwrap_err();

        assert!(matches!(err, StagelyError::Credentials(_)));
        assert!(prompter.questions().is_empty());
        assert_eq!(runner.count_prefix("kubectl"), 0);
    }
}
