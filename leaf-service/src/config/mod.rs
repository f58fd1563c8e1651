use crate::services::providers::groq::{GroqConfig, GROQ_API_BASE};
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MODEL_PATH: &str = "artifacts/leaf_classifier.onnx";
const DEFAULT_CLASS_NAMES_PATH: &str = "artifacts/class_names.json";
const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
/// 10 MiB
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// One year.
pub const MAX_SESSION_INACTIVITY_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct LeafConfig {
    pub common: core_config::Config,
    pub classifier: ClassifierSettings,
    pub assistant: AssistantSettings,
    pub web: WebSettings,
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub model_path: PathBuf,
    pub class_names_path: PathBuf,
    /// Side of the square model input, in pixels.
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AssistantSettings {
    pub fn groq_config(&self) -> GroqConfig {
        GroqConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSettings {
    /// Side of the square preview shown after upload.
    pub display_size: u32,
    pub max_upload_bytes: usize,
    pub static_dir: PathBuf,
    /// Idle time before a session expires, at most
    /// [`MAX_SESSION_INACTIVITY_HOURS`].
    pub session_inactivity_hours: i64,
    /// Sessions held in memory before the soonest-expiring is evicted.
    pub session_capacity: usize,
    pub secure_cookies: bool,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            display_size: 300,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            static_dir: PathBuf::from("static"),
            session_inactivity_hours: 24,
            session_capacity: 500,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObservabilitySettings {
    pub otlp_endpoint: Option<String>,
}

impl LeafConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_source(common, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `ENVIRONMENT=prod` makes the model
    /// artifact paths mandatory.
    pub fn from_source<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        let env = Env { lookup, is_prod };

        let web_defaults = WebSettings::default();

        Ok(LeafConfig {
            common,
            classifier: ClassifierSettings {
                model_path: env.required("LEAF_MODEL_PATH", DEFAULT_MODEL_PATH)?.into(),
                class_names_path: env
                    .required("LEAF_CLASS_NAMES_PATH", DEFAULT_CLASS_NAMES_PATH)?
                    .into(),
                input_size: env.positive("LEAF_INPUT_SIZE", 224)?,
            },
            assistant: AssistantSettings {
                api_key: env
                    .optional("GROQ_API_KEY")
                    .filter(|k| !k.trim().is_empty())
                    .map(Secret::new),
                model: env.or("GROQ_MODEL", DEFAULT_GROQ_MODEL),
                base_url: env.or("GROQ_API_BASE", GROQ_API_BASE),
                timeout: Duration::from_secs(env.positive("GROQ_TIMEOUT_SECS", 120)?),
            },
            web: WebSettings {
                display_size: env.positive("LEAF_DISPLAY_SIZE", web_defaults.display_size)?,
                max_upload_bytes: env
                    .positive("LEAF_MAX_UPLOAD_BYTES", web_defaults.max_upload_bytes)?,
                static_dir: env.or("LEAF_STATIC_DIR", "static").into(),
                session_inactivity_hours: env.bounded(
                    "LEAF_SESSION_INACTIVITY_HOURS",
                    web_defaults.session_inactivity_hours,
                    MAX_SESSION_INACTIVITY_HOURS,
                )?,
                session_capacity: env
                    .positive("LEAF_SESSION_CAPACITY", web_defaults.session_capacity)?,
                secure_cookies: env.parsed("LEAF_SECURE_COOKIES", false)?,
            },
            observability: ObservabilitySettings {
                otlp_endpoint: env.optional("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            },
        })
    }
}

struct Env<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Falls back to `default` outside production only.
    fn required(&self, key: &str, default: &str) -> Result<String, AppError> {
        match self.optional(key) {
            Some(val) => Ok(val),
            None if self.is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => Ok(default.to_string()),
        }
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.trim().parse().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
            }),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr + PartialOrd + Default + Copy,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(key, default)?;
        if value <= T::default() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} must be greater than zero",
                key
            )));
        }
        Ok(value)
    }

    fn bounded<T>(&self, key: &str, default: T, max: T) -> Result<T, AppError>
    where
        T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let value = self.positive(key, default)?;
        if value > max {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "{} must be at most {}",
                key,
                max
            )));
        }
        Ok(value)
    }
}
