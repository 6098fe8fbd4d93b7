//! Configuration for the mixed benchmark.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `MB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration
//! structures. For example:
//!
//! - `MB__CONCURRENCY=64` sets the number of workers
//! - `MB__STORAGE__BUCKET=bench` sets the bucket name
//! - `MB__DISTRIBUTION__DELETE=5` sets the `DELETE` weight
//!
//! The same configuration in YAML:
//!
//! ```yaml
//! concurrency: 64
//! storage:
//!   type: s3compatible
//!   endpoint: http://localhost:9000
//!   bucket: bench
//! distribution:
//!   delete: 5
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use mixbench_engine::backend::S3CompatibleConfig;
use mixbench_engine::{ConfigError, MixedConfig, Sampling, SizeDistribution, Weights};
use secrecy::{CloneableSecret, ExposeSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "MB__";

/// Newtype around `String` that protects against accidental logging of credentials. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// The storage backend to benchmark.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// S3-compatible storage (type `"s3compatible"`).
    ///
    /// Credentials that are not configured are picked up from the standard AWS environment
    /// variables and profiles.
    S3Compatible {
        /// Endpoint URL, for example `http://localhost:9000` for MinIO. `None` targets AWS.
        endpoint: Option<String>,
        /// Region name used for request signing.
        region: String,
        /// Name of the bucket. It must exist before the benchmark starts.
        bucket: String,
        /// Use path-style addressing, required by most self-hosted services.
        path_style: bool,
        /// Access key ID.
        access_key: Option<String>,
        /// Secret access key.
        secret_key: Option<SecretBox<ConfigSecret>>,
        /// Session token for temporary credentials.
        session_token: Option<SecretBox<ConfigSecret>>,
        /// Timeout of a single request.
        #[serde(default, with = "humantime_serde")]
        request_timeout: Option<Duration>,
    },

    /// An in-process store (type `"memory"`), useful to measure the overhead of the benchmark
    /// itself.
    Memory {},
}

impl Storage {
    /// Returns the connection settings for S3-compatible storage.
    pub fn s3_config(&self) -> Option<S3CompatibleConfig> {
        let Storage::S3Compatible {
            endpoint,
            region,
            bucket,
            path_style,
            access_key,
            secret_key,
            session_token,
            request_timeout,
        } = self
        else {
            return None;
        };

        Some(S3CompatibleConfig {
            bucket: bucket.clone(),
            region: region.clone(),
            endpoint: endpoint.clone(),
            path_style: *path_style,
            request_timeout: *request_timeout,
            access_key: access_key.clone(),
            secret_key: secret_key.as_ref().map(|s| s.expose_secret().as_str().to_owned()),
            session_token: session_token
                .as_ref()
                .map(|s| s.expose_secret().as_str().to_owned()),
        })
    }
}

/// Runtime configuration for the Tokio async runtime.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads.
    ///
    /// Defaults to the number of CPU cores on the host machine.
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty printing on a terminal, simplified output otherwise.
    Auto,
    /// Multi-line, colored output.
    Pretty,
    /// Compact single-line output.
    Simplified,
    /// One JSON object per line.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum level of emitted logs. Overridden by a plain level in `RUST_LOG`.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Output format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Top-level benchmark configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The storage backend.
    pub storage: Storage,

    /// Prefix of all object names. A random prefix is chosen per run if unset.
    pub prefix: Option<String>,

    /// Number of objects uploaded before the mix starts.
    ///
    /// The assignment sequence has `2 * objects` slots unless `operations` is set.
    pub objects: usize,

    /// Explicit number of operation slots.
    pub operations: Option<usize>,

    /// Size of each uploaded object, or the median size if `object_size_p99` is set.
    pub object_size: ByteSize,

    /// 99th percentile of object sizes, turning sizes into a *LogNormal* distribution.
    pub object_size_p99: Option<ByteSize>,

    /// Relative weights of `GET`, `STAT`, `PUT` and `DELETE` operations.
    pub distribution: Weights,

    /// How slots are drawn from the weights.
    pub sampling: Sampling,

    /// Number of concurrent workers.
    pub concurrency: usize,

    /// Maximum duration of the mixed phase. Unbounded if unset.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,

    /// How long workers may take to finish in-flight operations after the run is stopped.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,

    /// Seed for all random decisions. Random if unset.
    pub seed: Option<u64>,

    /// Delete all remaining objects after the run.
    pub cleanup: bool,

    /// Async runtime settings.
    pub runtime: Runtime,

    /// Logging settings.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: Storage::S3Compatible {
                endpoint: Some("http://127.0.0.1:9000".into()),
                region: "us-east-1".into(),
                bucket: "mixbench-bucket".into(),
                path_style: true,
                access_key: None,
                secret_key: None,
                session_token: None,
                request_timeout: None,
            },
            prefix: None,
            objects: 2500,
            operations: None,
            object_size: ByteSize::mib(10),
            object_size_p99: None,
            distribution: Weights::default(),
            sampling: Sampling::default(),
            concurrency: 20,
            duration: Some(Duration::from_secs(5 * 60)),
            grace_period: Duration::from_secs(30),
            seed: None,
            cleanup: true,
            runtime: Runtime::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Number of slots in the assignment sequence.
    pub fn slots(&self) -> Result<usize> {
        match self.operations {
            Some(operations) => Ok(operations),
            None => self.objects.checked_mul(2).with_context(|| {
                format!("{} objects exceed the maximum number of slots", self.objects)
            }),
        }
    }

    /// The distribution of uploaded object sizes.
    pub fn sizes(&self) -> Result<SizeDistribution, ConfigError> {
        match self.object_size_p99 {
            Some(p99) => SizeDistribution::log_normal(self.object_size.as_u64(), p99.as_u64()),
            None => Ok(SizeDistribution::Fixed(self.object_size.as_u64())),
        }
    }

    /// Settings for the benchmark driver.
    pub fn mixed(&self) -> MixedConfig {
        MixedConfig {
            create_objects: self.objects,
            concurrency: self.concurrency,
            duration: self.duration,
            grace_period: self.grace_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_mixed_command() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.objects, 2500);
            assert_eq!(config.slots().unwrap(), 5000);
            assert_eq!(config.object_size, ByteSize::mib(10));
            assert_eq!(config.distribution, Weights::default());
            assert_eq!(config.sampling, Sampling::Sampled);
            assert_eq!(config.concurrency, 20);
            assert!(config.cleanup);

            Ok(())
        });
    }

    #[test]
    fn slot_count_overflow_is_an_error() {
        let config = Config {
            objects: usize::MAX,
            ..Config::default()
        };
        assert!(config.slots().is_err());

        let config = Config {
            objects: usize::MAX,
            operations: Some(10),
            ..Config::default()
        };
        assert_eq!(config.slots().unwrap(), 10);
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MB__STORAGE__TYPE", "s3compatible");
            jail.set_env("MB__STORAGE__ENDPOINT", "http://localhost:8333");
            jail.set_env("MB__STORAGE__BUCKET", "whatever");
            jail.set_env("MB__STORAGE__SECRET_KEY", "hunter2");
            jail.set_env("MB__DISTRIBUTION__DELETE", "5");
            jail.set_env("MB__CONCURRENCY", "64");
            jail.set_env("MB__DURATION", "30s");
            jail.set_env("MB__SEED", "1234");

            let config = Config::load(None).unwrap();

            let s3 = config.storage.s3_config().unwrap();
            assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:8333"));
            assert_eq!(s3.bucket, "whatever");
            assert_eq!(s3.secret_key.as_deref(), Some("hunter2"));
            assert!(!format!("{config:?}").contains("hunter2"));

            assert_eq!(config.distribution.delete, 5.0);
            assert_eq!(config.distribution.put, 15.0);
            assert_eq!(config.concurrency, 64);
            assert_eq!(config.duration, Some(Duration::from_secs(30)));
            assert_eq!(config.seed, Some(1234));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                type: memory
            objects: 10
            operations: 20
            object_size: 4 KiB
            object_size_p99: 1 MiB
            distribution:
                get: 45
                stat: 30
                put: 15
                delete: 10
            sampling: exact
            concurrency: 4
            grace_period: 5s
            cleanup: false
            logging:
                level: debug
                format: json
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert!(matches!(dbg!(&config).storage, Storage::Memory {}));
            assert_eq!(config.slots().unwrap(), 20);
            assert_eq!(config.object_size, ByteSize::kib(4));
            assert!(matches!(config.sizes(), Ok(SizeDistribution::LogNormal(_))));
            assert_eq!(config.sampling, Sampling::Exact);
            assert_eq!(config.grace_period, Duration::from_secs(5));
            assert!(!config.cleanup);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            let mixed = config.mixed();
            assert_eq!(mixed.create_objects, 10);
            assert_eq!(mixed.concurrency, 4);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                type: s3compatible
                endpoint: http://localhost:9000
                bucket: whatever
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("MB__STORAGE__ENDPOINT", "http://localhost:9001");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            let s3 = config.storage.s3_config().unwrap();
            assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9001"));
            assert_eq!(s3.bucket, "whatever");
            assert_eq!(s3.region, "us-east-1");

            Ok(())
        });
    }
}
