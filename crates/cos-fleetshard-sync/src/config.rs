use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, SyncError};

const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_EDIT_ATTEMPTS: u32 = 5;

/// Settings of the synchronization client, loaded once at process start
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    pub cluster_id: String,

    pub connectors_namespace: String,

    pub operators_namespace: String,

    /// how often watches drop their stream and re-list everything
    #[serde(with = "humantime_serde", default = "default_resync_interval")]
    pub resync_interval: Duration,

    #[serde(with = "humantime_serde", default = "default_watch_retry_delay")]
    pub watch_retry_delay: Duration,

    /// bound on read-modify-write retries when a write conflicts
    #[serde(default = "default_max_edit_attempts")]
    pub max_edit_attempts: u32,
}

fn default_resync_interval() -> Duration {
    DEFAULT_RESYNC_INTERVAL
}

fn default_watch_retry_delay() -> Duration {
    DEFAULT_WATCH_RETRY_DELAY
}

fn default_max_edit_attempts() -> u32 {
    DEFAULT_MAX_EDIT_ATTEMPTS
}

impl SyncConfig {
    pub fn new(
        cluster_id: impl Into<String>,
        connectors_namespace: impl Into<String>,
        operators_namespace: impl Into<String>,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            connectors_namespace: connectors_namespace.into(),
            operators_namespace: operators_namespace.into(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            watch_retry_delay: DEFAULT_WATCH_RETRY_DELAY,
            max_edit_attempts: DEFAULT_MAX_EDIT_ATTEMPTS,
        }
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_watch_retry_delay(mut self, delay: Duration) -> Self {
        self.watch_retry_delay = delay;
        self
    }

    pub fn with_max_edit_attempts(mut self, attempts: u32) -> Self {
        self.max_edit_attempts = attempts;
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        debug!(?path_ref, "loading sync config");
        let contents = read_to_string(path_ref)?;
        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(config: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(SyncError::InvalidArgument(
                "cluster id must not be empty".to_owned(),
            ));
        }
        if self.connectors_namespace.trim().is_empty() {
            return Err(SyncError::InvalidArgument(
                "connectors namespace must not be empty".to_owned(),
            ));
        }
        if self.operators_namespace.trim().is_empty() {
            return Err(SyncError::InvalidArgument(
                "operators namespace must not be empty".to_owned(),
            ));
        }
        if self.resync_interval.is_zero() {
            return Err(SyncError::InvalidArgument(
                "resync interval must be greater than zero".to_owned(),
            ));
        }
        if self.watch_retry_delay.is_zero() {
            return Err(SyncError::InvalidArgument(
                "watch retry delay must be greater than zero".to_owned(),
            ));
        }
        if self.max_edit_attempts == 0 {
            return Err(SyncError::InvalidArgument(
                "max edit attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = SyncConfig::from_str(
            r#"
cluster-id: c1
connectors-namespace: connectors
operators-namespace: operators
"#,
        )
        .expect("parse");

        assert_eq!(config, SyncConfig::new("c1", "connectors", "operators"));
        assert_eq!(config.resync_interval, Duration::from_secs(3600));
        assert_eq!(config.watch_retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_edit_attempts, 5);
    }

    #[test]
    fn test_humantime_durations() {
        let config = SyncConfig::from_str(
            r#"
cluster-id: c1
connectors-namespace: connectors
operators-namespace: operators
resync-interval: 10m
watch-retry-delay: 250ms
max-edit-attempts: 3
"#,
        )
        .expect("parse");

        assert_eq!(config.resync_interval, Duration::from_secs(600));
        assert_eq!(config.watch_retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_edit_attempts, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = SyncConfig::from_str(
            r#"
cluster-id: ""
connectors-namespace: connectors
operators-namespace: operators
"#,
        )
        .expect_err("empty cluster id");
        assert!(matches!(err, SyncError::InvalidArgument(_)));

        let err = SyncConfig::from_str("cluster-id: c1").expect_err("missing namespaces");
        assert!(matches!(err, SyncError::ConfigParse(_)));

        let err = SyncConfig::new("c1", "connectors", "operators")
            .with_max_edit_attempts(0)
            .validate()
            .expect_err("zero attempts");
        assert!(matches!(err, SyncError::InvalidArgument(_)));

        // a zero delay would spin the watch loop against a failing store
        let err = SyncConfig::from_str(
            r#"
cluster-id: c1
connectors-namespace: connectors
operators-namespace: operators
watch-retry-delay: 0s
"#,
        )
        .expect_err("zero retry delay");
        assert!(matches!(err, SyncError::InvalidArgument(msg) if msg.contains("retry delay")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "cluster-id: c2\nconnectors-namespace: cos\noperators-namespace: cos-operators\nresync-interval: 30s"
        )
        .expect("write");

        let config = SyncConfig::from_file(file.path()).expect("load");
        assert_eq!(config.cluster_id, "c2");
        assert_eq!(config.connectors_namespace, "cos");
        assert_eq!(config.operators_namespace, "cos-operators");
        assert_eq!(config.resync_interval, Duration::from_secs(30));

        let err = SyncConfig::from_file(file.path().with_extension("missing"))
            .expect_err("missing file");
        assert!(matches!(err, SyncError::ConfigIo(_)));
    }
}
