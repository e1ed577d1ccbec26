use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub scoring: ScoringConfig,
    pub pipeline: PipelineConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request and retry configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe name configuration
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub research: String,
    pub insights: String,
}

/// Fit level cutoffs and signal promotion policy.
///
/// A report is "excellent" with `excellent_high_matches` high-importance
/// matches or a score of at least `excellent_score`; "good" likewise with
/// `good_high_matches` / `good_score`; "fair" with one high-importance match
/// or `fair_score`; anything else is "poor".
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub excellent_score: f64,
    pub good_score: f64,
    pub fair_score: f64,
    pub excellent_high_matches: usize,
    pub good_high_matches: usize,
    /// Importance at or above which a signal counts as high-importance.
    pub high_importance: u8,
    /// Promote POTENTIALLY/LIKELY MATCHES verdicts to matched signals.
    pub include_potential: bool,
}

/// Per-run pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Time budget for one capability call; each retry gets a fresh budget.
    pub step_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Environment {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/prospects.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS").unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_retries: parse_var("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay_ms: parse_var("RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
        };

        let pipes = PipeConfig {
            research: env::var("PIPE_RESEARCH")
                .unwrap_or_else(|_| "prospect-research-v1".to_string()),
            insights: env::var("PIPE_INSIGHTS")
                .unwrap_or_else(|_| "prospect-insights-v1".to_string()),
        };

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            excellent_score: parse_var("FIT_EXCELLENT_SCORE").unwrap_or(defaults.excellent_score),
            good_score: parse_var("FIT_GOOD_SCORE").unwrap_or(defaults.good_score),
            fair_score: parse_var("FIT_FAIR_SCORE").unwrap_or(defaults.fair_score),
            include_potential: parse_var("INCLUDE_POTENTIAL_MATCHES")
                .unwrap_or(defaults.include_potential),
            ..defaults
        };
        scoring.validate()?;

        let pipeline = PipelineConfig {
            step_timeout_ms: parse_var("STEP_TIMEOUT_MS")
                .unwrap_or(PipelineConfig::default().step_timeout_ms),
        };

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            scoring,
            pipeline,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl ScoringConfig {
    /// Reject cutoffs that are out of range or not descending.
    pub fn validate(&self) -> Result<(), AppError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_range(self.excellent_score) && in_range(self.good_score) && in_range(self.fair_score))
        {
            return Err(AppError::Environment {
                message: "fit score cutoffs must be within [0, 1]".to_string(),
            });
        }
        if !(self.excellent_score >= self.good_score && self.good_score >= self.fair_score) {
            return Err(AppError::Environment {
                message: "fit score cutoffs must satisfy excellent >= good >= fair".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            excellent_score: 0.85,
            good_score: 0.6,
            fair_score: 0.3,
            excellent_high_matches: 3,
            good_high_matches: 2,
            high_importance: 5,
            include_potential: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 180_000,
        }
    }
}
