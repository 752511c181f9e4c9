//! Pipeline configuration.
//!
//! Values come from an optional `vacancy-scribe.toml`, then from the process
//! environment (after loading `.env` with `dotenvy`). Environment variables
//! always win over the file.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ScribeError;
use crate::state_machine::RetryPolicy;

const DEFAULT_PATH: &str = "vacancy-scribe.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ScribeConfig {
    /// Search endpoint of the job board, e.g. `https://api.hh.ru/vacancies`.
    #[serde(default)]
    pub job_api_url: String,
    #[serde(default)]
    pub job_api_key: String,

    /// Chat completions endpoint used for enrichment.
    #[serde(default)]
    pub llm_api_url: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Search terms polled by `fetch`.
    #[serde(default = "default_queries")]
    pub queries: Vec<String>,
    /// Experience filters sent with every search.
    #[serde(default = "default_experience")]
    pub experience: Vec<String>,
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_call_deadline_secs")]
    pub call_deadline_secs: u64,
    /// Back-off for a 429 without a usable `retry-after`. Unset means retry
    /// immediately.
    #[serde(default)]
    pub malformed_retry_after_secs: Option<u64>,
    /// Per-request bound for enrichment calls. Job board requests use a
    /// fixed 5 s bound.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_queries() -> Vec<String> {
    [
        "ML Engineer",
        "Data science",
        "Data Scientist",
        "Дата сайентист",
        "Датасайентист",
        "ML",
        "Machine Learning Engineer",
        "ML-инженер",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_experience() -> Vec<String> {
    vec!["noExperience".to_string(), "between1And3".to_string()]
}

fn default_per_page() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_call_deadline_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    20
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            job_api_url: String::new(),
            job_api_key: String::new(),
            llm_api_url: String::new(),
            llm_api_key: String::new(),
            model: String::new(),
            system_prompt: String::new(),
            database_url: String::new(),
            max_connections: default_max_connections(),
            queries: default_queries(),
            experience: default_experience(),
            per_page: default_per_page(),
            max_attempts: default_max_attempts(),
            call_deadline_secs: default_call_deadline_secs(),
            malformed_retry_after_secs: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl ScribeConfig {
    /// Load from `path` (or `vacancy-scribe.toml` when absent) and apply
    /// environment overrides. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ScribeError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_PATH).exists() => Self::from_file(Path::new(DEFAULT_PATH))?,
            None => Self::default(),
        };

        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ScribeError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Override fields from `lookup`; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 7] = [
            ("JOB_API_URL", &mut self.job_api_url),
            ("JOB_API_KEY", &mut self.job_api_key),
            ("LLM_API_URL", &mut self.llm_api_url),
            ("LLM_API_KEY", &mut self.llm_api_key),
            ("DATABASE_URL", &mut self.database_url),
            ("MODEL", &mut self.model),
            ("SYSTEM_PROMPT", &mut self.system_prompt),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    /// Settings `fetch` cannot run without.
    pub fn validate_fetch(&self) -> Result<(), ScribeError> {
        require(&[
            ("JOB_API_URL", &self.job_api_url),
            ("JOB_API_KEY", &self.job_api_key),
            ("DATABASE_URL", &self.database_url),
        ])?;
        if self.per_page == 0 {
            return Err(ScribeError::Config("per_page must be positive".into()));
        }
        Ok(())
    }

    /// Settings `process` cannot run without.
    pub fn validate_process(&self) -> Result<(), ScribeError> {
        require(&[
            ("LLM_API_URL", &self.llm_api_url),
            ("LLM_API_KEY", &self.llm_api_key),
            ("MODEL", &self.model),
            ("DATABASE_URL", &self.database_url),
        ])
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            deadline: Duration::from_secs(self.call_deadline_secs),
            malformed_retry_after: self.malformed_retry_after_secs.map(Duration::from_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn require(fields: &[(&str, &String)]) -> Result<(), ScribeError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((key, _)) => Err(ScribeError::Config(format!("{key} must be set"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = ScribeConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.call_deadline_secs, 30);
        assert_eq!(config.http_timeout_secs, 20);
        assert_eq!(config.per_page, 100);
        assert_eq!(config.queries.len(), 8);
        assert_eq!(config.experience, vec!["noExperience", "between1And3"]);
        assert!(config.malformed_retry_after_secs.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            llm_api_url = "https://llm.example.test/v1/chat/completions"
            model = "deepseek-r1-distill-llama-70b"
            max_attempts = 5
            malformed_retry_after_secs = 2
            queries = ["Rust developer"]
        "#;
        let config: ScribeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model, "deepseek-r1-distill-llama-70b");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.queries, vec!["Rust developer"]);
        assert_eq!(config.call_deadline_secs, 30);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.malformed_retry_after, Some(Duration::from_secs(2)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: ScribeConfig = toml::from_str(r#"model = "from-file""#).unwrap();
        let env: HashMap<&str, &str> = [
            ("MODEL", "from-env"),
            ("LLM_API_KEY", "secret"),
            ("JOB_API_URL", ""),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model, "from-env");
        assert_eq!(config.llm_api_key, "secret");
        assert!(config.job_api_url.is_empty());
    }

    #[test]
    fn validation_names_missing_variable() {
        let mut config = ScribeConfig::default();
        config.llm_api_url = "https://llm.example.test".into();
        config.llm_api_key = "k".into();

        let err = config.validate_process().unwrap_err();
        assert_eq!(err.to_string(), "Config error: MODEL must be set");

        config.model = "m".into();
        config.database_url = "postgres://localhost/jobs".into();
        assert!(config.validate_process().is_ok());
        assert!(config.validate_fetch().is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "per_page = 50").unwrap();
        writeln!(file, "call_deadline_secs = 10").unwrap();

        let config = ScribeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.per_page, 50);
        assert_eq!(config.retry_policy().deadline, Duration::from_secs(10));
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let path = Path::new("/nonexistent/vacancy-scribe.toml");
        let err = ScribeConfig::load(Some(path)).unwrap_err();
        assert!(matches!(err, ScribeError::Io(_)));
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "per_page = \"many\"").unwrap();
        let err = ScribeConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ScribeError::Toml(_)));
    }
}
