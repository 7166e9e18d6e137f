//! Environment-driven configuration (§4.7).
//!
//! `dotenvy::dotenv()` loads a local `.env` if present, then each setting
//! is read with `env::var(..).ok()` and `.and_then(|v| v.parse().ok())`,
//! falling back to a hard default rather than panicking on a malformed
//! value.

use std::time::Duration;

use faas_common::Strategy;

use crate::scheduler::SchedulerSettings;

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Settings for `faas-bin serve` (production, real clock + Docker
/// runtime).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub strategy: Strategy,
    pub default_limit: usize,
    pub warm_time: Duration,
    pub janitor_sleep: Duration,
    pub worker_image: String,
    pub api_host: String,
    pub api_port: u16,
}

impl SchedulerConfig {
    /// Reads `FAAS_STRATEGY`, `FAAS_DEFAULT_LIMIT`, `FAAS_WARM_TIME_SECS`,
    /// `FAAS_JANITOR_SLEEP_SECS`, `FAAS_WORKER_IMAGE`, `FAAS_API_HOST`,
    /// `FAAS_API_PORT`, loading a `.env` file first if one exists.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let strategy = std::env::var("FAAS_STRATEGY")
            .ok()
            .and_then(|v| v.parse::<Strategy>().ok())
            .unwrap_or(Strategy::Lcs);

        Self {
            strategy,
            default_limit: env_parsed("FAAS_DEFAULT_LIMIT", 5usize),
            warm_time: Duration::from_secs(env_parsed("FAAS_WARM_TIME_SECS", 20u64)),
            janitor_sleep: Duration::from_secs(env_parsed("FAAS_JANITOR_SLEEP_SECS", 5u64)),
            worker_image: std::env::var("FAAS_WORKER_IMAGE")
                .unwrap_or_else(|_| "faas-function:latest".to_string()),
            api_host: std::env::var("FAAS_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env_parsed("FAAS_API_PORT", 8080u16),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            default_limit: self.default_limit,
            worker_image: self.worker_image.clone(),
            health_probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

/// Settings for `faas-bin simulate`, matching
/// `original_source/lcs_sim.py`'s module-level constants.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub warm_time: i64,
    pub execution_time: i64,
    pub simulation_end_time: i64,
    pub limit: usize,
}

impl SimulationConfig {
    /// Reads `FAAS_SIM_WARM_TIME`, `FAAS_SIM_EXECUTION_TIME`,
    /// `FAAS_SIM_END_TIME`, `FAAS_SIM_LIMIT`, defaulting to the canonical
    /// fixture (`WARM_TIME=10, EXECUTION_TIME=2, SIMULATION_END_TIME=25`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            warm_time: env_parsed("FAAS_SIM_WARM_TIME", 10i64),
            execution_time: env_parsed("FAAS_SIM_EXECUTION_TIME", 2i64),
            simulation_end_time: env_parsed("FAAS_SIM_END_TIME", 25i64),
            limit: env_parsed("FAAS_SIM_LIMIT", 10usize),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            warm_time: 10,
            execution_time: 2,
            simulation_end_time: 25,
            limit: 10,
        }
    }
}
