use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use brokenlink_scanner::config::load_config;
///
/// let config = load_config(Path::new("scanner.toml")).unwrap();
/// println!("Budget: {}", config.scanner.max_findings);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Builds the default configuration with environment overrides applied
pub fn default_config() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies deployment overrides
///
/// | Variable | Effect |
/// |----------|--------|
/// | `SCAN_USER_AGENT` | replaces the declared crawler identity |
/// | `BROWSER_USER_AGENT` | replaces the rendered-session identity |
/// | `BROWSER_HEADLESS` / `PUPPETEER_HEADLESS` | `false` shows the browser window |
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(agent) = lookup("SCAN_USER_AGENT").filter(|v| !v.trim().is_empty()) {
        config.user_agent.user_agent_override = Some(agent.trim().to_string());
    }

    if let Some(agent) = lookup("BROWSER_USER_AGENT").filter(|v| !v.trim().is_empty()) {
        config.user_agent.browser_user_agent = agent.trim().to_string();
    }

    if let Some(flag) = lookup("BROWSER_HEADLESS").or_else(|| lookup("PUPPETEER_HEADLESS")) {
        config.browser.headless = !flag.trim().eq_ignore_ascii_case("false");
    }
}
