//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Engine and logging sections are extracted into typed structs with defaults,
//! so a missing file or key never prevents a run.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::Error;

/// SIRGAS 2000 geographic.
pub const CANONICAL_EPSG: u32 = 4674;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Builds a config from an inline TOML document. Used by tests and embedders.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(toml)) };
        config.engine()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn engine(&self) -> anyhow::Result<EngineConfig> {
        self.section("engine")
    }

    pub fn logging(&self) -> anyhow::Result<LoggingConfig> {
        self.section("logging")
    }

    fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let engine = self.engine()?;
        engine.validate()?;
        match env {
            "prod" | "production" => {
                if engine.target_epsg != CANONICAL_EPSG {
                    anyhow::bail!(Error::InvalidConfig(format!(
                        "production output must use EPSG:{CANONICAL_EPSG}, got EPSG:{}",
                        engine.target_epsg
                    )));
                }
            }
            "dev" | "development" => {}
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub target_epsg: u32,
    pub include_styles: bool,
    pub max_warnings: usize,
    pub default_receipt: String,
    pub output_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_epsg: CANONICAL_EPSG,
            include_styles: true,
            max_warnings: 20,
            default_receipt: "CAR_Processado".to_string(),
            output_prefix: "CAR_Processado_".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.default_receipt.trim().is_empty() {
            return Err(Error::InvalidConfig("engine.default_receipt must not be empty".into()));
        }
        if self.default_receipt.contains(['/', '\\']) || self.output_prefix.contains(['/', '\\']) {
            return Err(Error::InvalidConfig("receipt and prefix must not contain path separators".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Console }
    }
}

/// Expands `${VAR}`/`$VAR` and a leading `~` in a command-line path.
/// Unset variables leave the text as given.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_env = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_env).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let config = Config::from_toml_str("").expect("config");
        assert_eq!(config.engine().expect("engine"), EngineConfig::default());
        assert_eq!(config.logging().expect("logging").format, LogFormat::Console);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml_str("[engine]\ninclude_styles = false\n[logging]\nformat = \"json\"\n").expect("config");
        let engine = config.engine().expect("engine");
        assert!(!engine.include_styles);
        assert_eq!(engine.target_epsg, CANONICAL_EPSG);
        assert_eq!(config.logging().expect("logging").format, LogFormat::Json);
    }

    #[test]
    fn empty_receipt_is_rejected() {
        assert!(Config::from_toml_str("[engine]\ndefault_receipt = \"  \"\n").is_err());
    }

    #[test]
    fn input_paths_expand_home_and_variables() {
        let home = env::var("HOME").expect("HOME");
        assert_eq!(expand_path("~/car.zip"), Path::new(&home).join("car.zip"));
        assert_eq!(expand_path("${HOME}/out"), Path::new(&home).join("out"));
        assert_eq!(expand_path("$CADASTRO_SURELY_UNSET/x"), PathBuf::from("$CADASTRO_SURELY_UNSET/x"));
    }
}
