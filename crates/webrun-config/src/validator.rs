//! Configuration validation.

use crate::schema::RunnerConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &RunnerConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_ai(config, &mut result);
        Self::validate_run(config, &mut result);

        result
    }

    fn validate_browser(config: &RunnerConfig, result: &mut ValidationResult) {
        if config.browser.response_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "browser.response_timeout_ms",
                "response_timeout_ms must be greater than 0",
            ));
        }

        if let Some(ref script) = config.browser.bridge_script_path {
            if !script.exists() {
                result.add_error(ValidationError::new(
                    "browser.bridge_script_path",
                    format!("Bridge script does not exist: {:?}", script),
                ));
            }
        }

        if let Some(ref dir) = config.browser.bridge_workdir {
            if !dir.is_dir() {
                result.add_warning(ValidationWarning::new(
                    "browser.bridge_workdir",
                    format!("Bridge working directory does not exist: {:?}", dir),
                ));
            }
        }
    }

    fn validate_ai(config: &RunnerConfig, result: &mut ValidationResult) {
        if config.ai.api_key.as_deref().map_or(true, str::is_empty) {
            result.add_warning(ValidationWarning::new(
                "ai.api_key",
                "API key is not set, AI actions will fail",
            ));
        }

        if let Some(ref url) = config.ai.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "ai.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
        }

        if config.ai.action_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "ai.action_timeout_ms",
                "action_timeout_ms must be greater than 0",
            ));
        }
    }

    fn validate_run(config: &RunnerConfig, result: &mut ValidationResult) {
        if config.run.settle_delay_ms > 60_000 {
            result.add_warning(ValidationWarning::new(
                "run.settle_delay_ms",
                "settle_delay_ms is over a minute, every step will be slow",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
