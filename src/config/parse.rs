use super::types::*;
use crate::config::expand_env_vars;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(&yaml_string);

    // Check for unexpanded environment variables
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string).map_err(|e| {
        // Wrap error with file context
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    // Remove duplicates and sort
    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let var_list = unexpanded_vars.join(", ");
    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=value\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            var_list
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_warehouse(&config.warehouse, &mut errors);

    if config.fetch.attempts == 0 {
        errors.push("fetch.attempts must be at least 1".to_string());
    }

    if config.auth.token_env.is_empty() {
        errors.push("auth.token_env cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.bucket.is_empty() {
        errors.push("source.bucket cannot be empty".to_string());
    }
    if source.prefix.is_empty() {
        errors.push("source.prefix cannot be empty".to_string());
    }
    if !source.endpoint.starts_with("http") {
        errors.push(format!(
            "source.endpoint must be an http(s) URL, got '{}'",
            source.endpoint
        ));
    }
}

fn validate_warehouse(warehouse: &WarehouseConfig, errors: &mut Vec<String>) {
    if warehouse.project.is_empty() {
        errors.push("warehouse.project cannot be empty".to_string());
    }
    if warehouse.dataset.is_empty() {
        errors.push("warehouse.dataset cannot be empty".to_string());
    }
    if warehouse.table.is_empty() {
        errors.push("warehouse.table cannot be empty".to_string());
    }
    if !warehouse.endpoint.starts_with("http") {
        errors.push(format!(
            "warehouse.endpoint must be an http(s) URL, got '{}'",
            warehouse.endpoint
        ));
    }
}
