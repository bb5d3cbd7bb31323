//! Configuration types for the advisor chat.
//!
//! This module provides CLI argument parsing via `arrrg`, an optional YAML configuration
//! file, and the resolved [`AdvisorConfig`].  Precedence is flags, then file, then defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{GenerationConfig, Model};

/// Persona and scope applied to every request.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are the DIU Student Portal Smart Advisor. \
Your goal is to help students with academic inquiries, study tips, explaining complex topics \
from their courses, and providing general university guidance. \
Be encouraging, professional, and concise. \
If asked about specific student data (grades, fees), remind them you are a general assistant \
but can explain how to calculate CGPA or how payment systems typically work.";

/// First message shown in a new session.
pub const DEFAULT_GREETING: &str = "Hello! I'm your DIU Smart Advisor. How can I help you with \
your studies, courses, or university life today?";

/// Appended as a separate model message when a reply cannot be delivered.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "I'm having trouble connecting to the university \
network right now. Please try again later.";

const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the advisor-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct AdvisorArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gemini-2.5-flash)", "MODEL")]
    pub model: Option<String>,

    /// Replacement system instruction.
    #[arrrg(optional, "System instruction for the advisor", "PROMPT")]
    pub system: Option<String>,

    /// Alternative API root.
    #[arrrg(optional, "API base URL", "URL")]
    pub base_url: Option<String>,

    /// Maximum tokens per reply.
    #[arrrg(optional, "Max output tokens per reply", "TOKENS")]
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature, 0.0 to 2.0.
    #[arrrg(optional, "Sampling temperature 0.0-2.0", "TEMP")]
    pub temperature: Option<String>,

    /// Seconds to wait for each streamed fragment; 0 disables the limit.
    #[arrrg(optional, "Seconds to wait for each fragment (0 = no limit)", "SECS")]
    pub timeout_secs: Option<u32>,

    /// YAML file with defaults for the options above.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Start without the greeting message.
    #[arrrg(flag, "Do not show the opening greeting")]
    pub no_greeting: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// On-disk configuration.  Every field is optional and overrides the built-in default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdvisorFile {
    model: Option<String>,
    system_instruction: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    max_output_tokens: Option<u32>,
    /// An empty string disables the greeting.
    greeting: Option<String>,
    fallback_message: Option<String>,
    fragment_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    use_color: Option<bool>,
}

/// Resolved configuration for an advisor session.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    /// The model to stream replies from.
    pub model: Model,

    /// Persona and scope instruction sent with every request.
    pub system_instruction: Option<String>,

    /// API root; `None` uses the public endpoint.
    pub base_url: Option<String>,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional top-p nucleus sampling value.
    pub top_p: Option<f32>,

    /// Optional top-k sampling limit.
    pub top_k: Option<u32>,

    /// Optional cap on reply length.
    pub max_output_tokens: Option<u32>,

    /// Opening model message, if any.
    pub greeting: Option<String>,

    /// Text of the model message appended when a reply fails.
    pub fallback_message: String,

    /// Longest wait for the stream to open or for its next fragment.
    pub fragment_timeout: Option<Duration>,

    /// Timeout for connection setup and non-streaming calls.
    pub request_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl AdvisorConfig {
    /// Creates a new AdvisorConfig with default values.
    ///
    /// Defaults:
    /// - Model: gemini-2.5-flash
    /// - System instruction: the DIU advisor persona
    /// - Greeting: enabled
    /// - Fragment timeout: 60 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: Model::default(),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            base_url: None,
            temperature: None,
            top_p: None,
            top_k: None,
            max_output_tokens: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            fragment_timeout: Some(DEFAULT_FRAGMENT_TIMEOUT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_color: true,
        }
    }

    /// Resolve command-line arguments, reading `--config` first when given.
    pub fn from_args(args: AdvisorArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::new(),
        };
        if let Some(model) = args.model {
            config.model = parse_model(&model);
        }
        if let Some(system) = args.system {
            config.system_instruction = Some(system);
        }
        if let Some(base_url) = args.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(max_output_tokens) = args.max_output_tokens {
            config.max_output_tokens = Some(max_output_tokens);
        }
        if let Some(temperature) = args.temperature {
            config.temperature = Some(parse_temperature(&temperature)?);
        }
        if let Some(secs) = args.timeout_secs {
            config.fragment_timeout = seconds(secs as u64);
        }
        if args.no_greeting {
            config.greeting = None;
        }
        if args.no_color {
            config.use_color = false;
        }
        Ok(config)
    }

    /// Load a configuration from a YAML file on top of the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| Error::io(format!("failed to open {}", path.display()), err))?;
        let parsed: AdvisorFile = serde_yaml::from_reader(BufReader::new(file))?;
        Self::new().apply(parsed)
    }

    /// Parse a YAML configuration on top of the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let parsed: AdvisorFile = serde_yaml::from_str(yaml)?;
        Self::new().apply(parsed)
    }

    fn apply(mut self, file: AdvisorFile) -> Result<Self> {
        if let Some(model) = file.model {
            self.model = parse_model(&model);
        }
        if let Some(system_instruction) = file.system_instruction {
            self.system_instruction = Some(system_instruction);
        }
        if let Some(base_url) = file.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(temperature) = file.temperature {
            self.temperature = Some(check_range("temperature", temperature, 0.0, 2.0)?);
        }
        if let Some(top_p) = file.top_p {
            self.top_p = Some(check_range("top_p", top_p, 0.0, 1.0)?);
        }
        self.top_k = file.top_k.or(self.top_k);
        self.max_output_tokens = file.max_output_tokens.or(self.max_output_tokens);
        if let Some(greeting) = file.greeting {
            self.greeting = if greeting.trim().is_empty() {
                None
            } else {
                Some(greeting)
            };
        }
        if let Some(fallback_message) = file.fallback_message {
            self.fallback_message = fallback_message;
        }
        if let Some(secs) = file.fragment_timeout_secs {
            self.fragment_timeout = seconds(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(use_color) = file.use_color {
            self.use_color = use_color;
        }
        Ok(self)
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the system instruction.
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum output tokens.
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Sets or removes the greeting.
    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    /// Sets the fragment timeout.
    pub fn with_fragment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fragment_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sampling controls for the request body.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_model(s: &str) -> Model {
    s.parse::<Model>()
        .unwrap_or_else(|_| Model::Custom(s.to_string()))
}

fn seconds(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

fn parse_temperature(value: &str) -> Result<f32> {
    let parsed: f32 = value.trim().parse().map_err(|_| {
        Error::validation(
            format!("temperature must be a number, got {value:?}"),
            Some("temperature".to_string()),
        )
    })?;
    check_range("temperature", parsed, 0.0, 2.0)
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<f32> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(Error::validation(
            format!("{name} expects a value between {min} and {max}"),
            Some(name.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn default_config() {
        let config = AdvisorConfig::new();
        assert_eq!(config.model, Model::Known(KnownModel::Gemini25Flash));
        assert!(
            config
                .system_instruction
                .as_deref()
                .unwrap()
                .contains("CGPA")
        );
        assert_eq!(config.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert_eq!(config.fallback_message, DEFAULT_FALLBACK_MESSAGE);
        assert_eq!(config.fragment_timeout, Some(Duration::from_secs(60)));
        assert!(config.use_color);
        assert!(config.generation_config().is_empty());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = AdvisorConfig::from_args(AdvisorArgs::default()).unwrap();
        assert_eq!(config, AdvisorConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = AdvisorArgs {
            model: Some("gemini-2.5-pro".to_string()),
            system: Some("Only discuss physics.".to_string()),
            max_output_tokens: Some(256),
            temperature: Some("0.4".to_string()),
            timeout_secs: Some(0),
            no_greeting: true,
            no_color: true,
            ..AdvisorArgs::default()
        };
        let config = AdvisorConfig::from_args(args).unwrap();
        assert_eq!(config.model, Model::Known(KnownModel::Gemini25Pro));
        assert_eq!(config.system_instruction.as_deref(), Some("Only discuss physics."));
        assert_eq!(config.max_output_tokens, Some(256));
        assert_eq!(config.temperature, Some(0.4));
        assert_eq!(config.fragment_timeout, None);
        assert!(config.greeting.is_none());
        assert!(!config.use_color);
    }

    #[test]
    fn bad_temperature() {
        let args = AdvisorArgs {
            temperature: Some("hot".to_string()),
            ..AdvisorArgs::default()
        };
        assert!(AdvisorConfig::from_args(args).unwrap_err().is_validation());

        let args = AdvisorArgs {
            temperature: Some("3.5".to_string()),
            ..AdvisorArgs::default()
        };
        assert!(AdvisorConfig::from_args(args).unwrap_err().is_validation());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config = AdvisorConfig::from_yaml_str(
            "model: gemini-2.0-flash\n\
             top_p: 0.9\n\
             greeting: \"\"\n\
             fallback_message: Try again soon.\n\
             fragment_timeout_secs: 15\n",
        )
        .unwrap();
        assert_eq!(config.model, Model::Known(KnownModel::Gemini20Flash));
        assert_eq!(config.top_p, Some(0.9));
        assert!(config.greeting.is_none());
        assert_eq!(config.fallback_message, "Try again soon.");
        assert_eq!(config.fragment_timeout, Some(Duration::from_secs(15)));
        assert_eq!(
            config.system_instruction.as_deref(),
            Some(DEFAULT_SYSTEM_INSTRUCTION)
        );
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        let err = AdvisorConfig::from_yaml_str("modle: gemini-2.5-pro\n").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn yaml_rejects_out_of_range() {
        let err = AdvisorConfig::from_yaml_str("top_p: 1.5\n").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: gemini-2.0-flash").unwrap();
        writeln!(file, "max_output_tokens: 100").unwrap();

        let args = AdvisorArgs {
            config: Some(file.path().display().to_string()),
            model: Some("gemini-2.5-flash-lite".to_string()),
            ..AdvisorArgs::default()
        };
        let config = AdvisorConfig::from_args(args).unwrap();
        assert_eq!(config.model, Model::Known(KnownModel::Gemini25FlashLite));
        assert_eq!(config.max_output_tokens, Some(100));
    }

    #[test]
    fn missing_file() {
        let err = AdvisorConfig::from_yaml_file("/nonexistent/advisor.yaml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
