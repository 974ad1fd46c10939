use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use crate::timing::DEFAULT_CADENCE_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Prod => "prod",
        }
    }
}

const DEV_FRONTEND_URL: &str = "http://localhost:5173/";
const DEFAULT_INGESTION_TIMEOUT_SECS: u64 = 15;
const DEV_INGESTION_TIMEOUT_SECS: u64 = 30;

fn non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("value cannot be empty".into())
    } else {
        Ok(value.to_string())
    }
}

/// Agent configuration. Every option can also be supplied through the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "studylink", version, about = "Local study-session companion agent")]
pub struct Config {
    #[arg(long, env = "BACKEND_HOST", value_parser = non_empty)]
    pub backend_host: String,

    #[arg(long, env = "BACKEND_PORT")]
    pub backend_port: u16,

    #[arg(long, env = "PATH_PREFIX", default_value = "")]
    pub path_prefix: String,

    #[arg(long = "env", env = "ENV", value_enum, ignore_case = true)]
    pub environment: Environment,

    #[arg(long, env = "FRONTEND_URL", value_parser = non_empty)]
    pub frontend_url: String,

    #[arg(long, env = "SQLITE_DB_PATH", default_value = "studylink.sqlite3")]
    pub sqlite_db_path: PathBuf,

    #[arg(long, env = "SCREENSHOT_DIR")]
    pub screenshot_dir: Option<PathBuf>,

    /// Base URL of the local personal-analytics sensor.
    #[arg(long, env = "PA_URL", default_value = "http://localhost:57827")]
    pub pa_url: String,

    #[arg(long, env = "LISTEN_PORT", default_value_t = 8001)]
    pub listen_port: u16,

    /// Defaults to on in prod and off elsewhere.
    #[arg(long, env = "HEALTH_CHECK")]
    pub health_check: Option<bool>,

    #[arg(long, env = "CADENCE_SECS", default_value_t = DEFAULT_CADENCE_SECS)]
    pub cadence_secs: u64,
}

impl Config {
    pub fn base_url(&self) -> String {
        let scheme = if self.backend_port == 443 { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}{}",
            self.backend_host,
            self.backend_port,
            self.path_prefix.trim_end_matches('/')
        )
    }

    pub fn ingestion_timeout(&self) -> Duration {
        match self.environment {
            Environment::Dev => Duration::from_secs(DEV_INGESTION_TIMEOUT_SECS),
            Environment::Test | Environment::Prod => {
                Duration::from_secs(DEFAULT_INGESTION_TIMEOUT_SECS)
            }
        }
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        match (&self.screenshot_dir, self.environment) {
            (Some(dir), _) => dir.clone(),
            (None, Environment::Dev) => PathBuf::from("screenshots-dev"),
            (None, _) => PathBuf::from("screenshots"),
        }
    }

    /// Page the participant is sent back to once homework is over. The
    /// test environment never navigates.
    pub fn browser_return_url(&self) -> Option<String> {
        let frontend = match self.environment {
            Environment::Dev => DEV_FRONTEND_URL,
            Environment::Prod => self.frontend_url.as_str(),
            Environment::Test => return None,
        };
        Some(format!("{frontend}?autoclose=true"))
    }

    pub fn health_check_enabled(&self) -> bool {
        self.health_check
            .unwrap_or(self.environment == Environment::Prod)
    }
}
