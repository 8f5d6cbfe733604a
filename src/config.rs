//! Process configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `APP_ID` | required |
//! | `PRIVATE_KEY_PATH` | required |
//! | `WEBHOOK_SECRET` | required |
//! | `LISTEN_ADDR` | `0.0.0.0:3000` |
//! | `SCHEDULER_INTERVAL_MS` | `300000` |
//! | `SCHEDULER_DELAY` | `true` |
//! | `UPDATE_BRANCH` | `add-docker-lock` |
//! | `LOCKFILE_NAME` | `docker-lock.json` |
//! | `GENERATOR_PROGRAM` | `bash` |
//! | `GENERATOR_SCRIPT` | `./docker-lock.sh` |
//! | `GENERATOR_OUTPUT` | `indicator` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::generator::OutputMode;
use crate::reconcile::{DEFAULT_ARTIFACT_FILENAME, DEFAULT_WORKING_BRANCH, ReconcilerConfig};
use crate::scheduler::{DEFAULT_INTERVAL_MS, ScheduleConfig};
use crate::webhooks::WebhookSecret;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GENERATOR_PROGRAM: &str = "bash";
const DEFAULT_GENERATOR_SCRIPT: &str = "./docker-lock.sh";

/// Configuration errors. Each names the offending variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_id: u64,
    pub private_key_path: PathBuf,
    pub webhook_secret: WebhookSecret,
    pub listen_addr: SocketAddr,
    pub schedule: ScheduleConfig,
    pub reconciler: ReconcilerConfig,
    pub generator_program: String,
    pub generator_script: String,
    pub generator_output: OutputMode,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let app_id = parse("APP_ID", required("APP_ID")?)?;
        let private_key_path = PathBuf::from(required("PRIVATE_KEY_PATH")?);
        let webhook_secret = WebhookSecret::new(required("WEBHOOK_SECRET")?);

        let listen_addr = parse(
            "LISTEN_ADDR",
            get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        )?;

        let interval_ms: u64 = match get("SCHEDULER_INTERVAL_MS") {
            Some(raw) => parse("SCHEDULER_INTERVAL_MS", raw)?,
            None => DEFAULT_INTERVAL_MS,
        };
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "SCHEDULER_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let jitter = match get("SCHEDULER_DELAY") {
            Some(raw) => parse_bool("SCHEDULER_DELAY", raw)?,
            None => true,
        };

        let generator_output = match get("GENERATOR_OUTPUT") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "GENERATOR_OUTPUT",
                value: raw.clone(),
                reason,
            })?,
            None => OutputMode::default(),
        };

        Ok(Config {
            app_id,
            private_key_path,
            webhook_secret,
            listen_addr,
            schedule: ScheduleConfig::new()
                .with_interval(Duration::from_millis(interval_ms))
                .with_jitter(jitter),
            reconciler: ReconcilerConfig {
                working_branch: get("UPDATE_BRANCH")
                    .unwrap_or_else(|| DEFAULT_WORKING_BRANCH.to_string()),
                artifact_filename: get("LOCKFILE_NAME")
                    .unwrap_or_else(|| DEFAULT_ARTIFACT_FILENAME.to_string()),
            },
            generator_program: get("GENERATOR_PROGRAM")
                .unwrap_or_else(|| DEFAULT_GENERATOR_PROGRAM.to_string()),
            generator_script: get("GENERATOR_SCRIPT")
                .unwrap_or_else(|| DEFAULT_GENERATOR_SCRIPT.to_string()),
            generator_output,
        })
    }
}

fn parse<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}

fn parse_bool(var: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}
