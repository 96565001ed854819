//! Runtime configuration, loaded from the environment with fallbacks.
//!
//! No CLI surface (per the external interfaces section) — everything is an
//! env var, read once at startup the way the teacher's `main.rs` builds its
//! config: `dotenv::dotenv()` first, then a flat list of `env::var(...)
//! .ok().and_then(...).unwrap_or(default)` chains.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub sweep_min_count: u64,
    pub sweep_min_premium: f64,
    pub sweep_min_z: f64,
    pub z_min_baseline_n: usize,
    pub spike_min_size: u64,
    pub spike_min_premium: f64,
    pub spike_min_z: f64,
    pub size_min_z: f64,
    pub min_agg_ratio: f64,
    pub min_coverage: f64,
    pub far_dated_min_dte: i64,
    pub zero_dte_max_atm_pct: f64,
    pub zero_dte_min_size: u64,
    pub zero_dte_min_premium: f64,
    pub ladder_min_strikes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sweep_min_count: 3,
            sweep_min_premium: 50_000.0,
            sweep_min_z: 2.0,
            z_min_baseline_n: 5,
            spike_min_size: 500,
            spike_min_premium: 25_000.0,
            spike_min_z: 2.5,
            size_min_z: 2.5,
            min_agg_ratio: 0.6,
            min_coverage: 0.5,
            far_dated_min_dte: 60,
            zero_dte_max_atm_pct: 0.01,
            zero_dte_min_size: 200,
            zero_dte_min_premium: 10_000.0,
            ladder_min_strikes: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cluster_window_ms: i64,
    pub option_nbbo_max_age_ms: i64,
    pub equity_quote_max_age_ms: i64,
    pub rolling_window_size: usize,
    pub rolling_ttl: Duration,
    pub recent_legs_capacity: usize,
    pub dark: crate::dark::DarkConfig,
    pub classifiers: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cluster_window_ms: 2_000,
            option_nbbo_max_age_ms: 1_500,
            equity_quote_max_age_ms: 1_500,
            rolling_window_size: 50,
            rolling_ttl: Duration::from_secs(24 * 3600),
            recent_legs_capacity: 20,
            dark: crate::dark::DarkConfig::default(),
            classifiers: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from the environment, falling back to the
    /// defaults above for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cluster_window_ms: env_or("ISLANDFLOW_CLUSTER_WINDOW_MS", defaults.cluster_window_ms),
            option_nbbo_max_age_ms: env_or("ISLANDFLOW_OPTION_NBBO_MAX_AGE_MS", defaults.option_nbbo_max_age_ms),
            equity_quote_max_age_ms: env_or("ISLANDFLOW_EQUITY_QUOTE_MAX_AGE_MS", defaults.equity_quote_max_age_ms),
            rolling_window_size: env_or("ISLANDFLOW_ROLLING_WINDOW_SIZE", defaults.rolling_window_size),
            rolling_ttl: Duration::from_secs(env_or("ISLANDFLOW_ROLLING_TTL_SECS", defaults.rolling_ttl.as_secs())),
            recent_legs_capacity: env_or("ISLANDFLOW_RECENT_LEGS_CAPACITY", defaults.recent_legs_capacity),
            dark: crate::dark::DarkConfig {
                min_block_size: env_or("ISLANDFLOW_DARK_MIN_BLOCK_SIZE", defaults.dark.min_block_size),
                min_print_size: env_or("ISLANDFLOW_DARK_MIN_PRINT_SIZE", defaults.dark.min_print_size),
                window_ms: env_or("ISLANDFLOW_DARK_WINDOW_MS", defaults.dark.window_ms),
                min_count: env_or("ISLANDFLOW_DARK_MIN_COUNT", defaults.dark.min_count),
                min_size: env_or("ISLANDFLOW_DARK_MIN_SIZE", defaults.dark.min_size),
                cooldown_ms: env_or("ISLANDFLOW_DARK_COOLDOWN_MS", defaults.dark.cooldown_ms),
                max_spread_pct: env_or("ISLANDFLOW_DARK_MAX_SPREAD_PCT", defaults.dark.max_spread_pct),
                max_evidence: env_or("ISLANDFLOW_DARK_MAX_EVIDENCE", defaults.dark.max_evidence),
            },
            classifiers: ClassifierConfig {
                sweep_min_count: env_or("ISLANDFLOW_SWEEP_MIN_COUNT", defaults.classifiers.sweep_min_count),
                sweep_min_premium: env_or("ISLANDFLOW_SWEEP_MIN_PREMIUM", defaults.classifiers.sweep_min_premium),
                sweep_min_z: env_or("ISLANDFLOW_SWEEP_MIN_Z", defaults.classifiers.sweep_min_z),
                z_min_baseline_n: env_or("ISLANDFLOW_Z_MIN_BASELINE_N", defaults.classifiers.z_min_baseline_n),
                spike_min_size: env_or("ISLANDFLOW_SPIKE_MIN_SIZE", defaults.classifiers.spike_min_size),
                spike_min_premium: env_or("ISLANDFLOW_SPIKE_MIN_PREMIUM", defaults.classifiers.spike_min_premium),
                spike_min_z: env_or("ISLANDFLOW_SPIKE_MIN_Z", defaults.classifiers.spike_min_z),
                size_min_z: env_or("ISLANDFLOW_SIZE_MIN_Z", defaults.classifiers.size_min_z),
                min_agg_ratio: env_or("ISLANDFLOW_MIN_AGG_RATIO", defaults.classifiers.min_agg_ratio),
                min_coverage: env_or("ISLANDFLOW_MIN_COVERAGE", defaults.classifiers.min_coverage),
                far_dated_min_dte: env_or("ISLANDFLOW_FAR_DATED_MIN_DTE", defaults.classifiers.far_dated_min_dte),
                zero_dte_max_atm_pct: env_or("ISLANDFLOW_ZERO_DTE_MAX_ATM_PCT", defaults.classifiers.zero_dte_max_atm_pct),
                zero_dte_min_size: env_or("ISLANDFLOW_ZERO_DTE_MIN_SIZE", defaults.classifiers.zero_dte_min_size),
                zero_dte_min_premium: env_or("ISLANDFLOW_ZERO_DTE_MIN_PREMIUM", defaults.classifiers.zero_dte_min_premium),
                ladder_min_strikes: env_or("ISLANDFLOW_LADDER_MIN_STRIKES", defaults.classifiers.ladder_min_strikes),
            },
        }
    }

    pub fn database_path() -> String {
        std::env::var("ISLANDFLOW_DB_PATH").unwrap_or_else(|_| "islandflow.sqlite3".to_string())
    }
}
