//! Bridge configuration
//!
//! A [`Config`] is built with chained setters or parsed from an option string
//! of `key=value` pairs separated by `;` or whitespace:
//!
//! - `warn_unclosed=true`
//! - `close_on_drop=false`
//! - `scratch_pool_size=16`
//! - `limitation_fallback=true`
//! - `default_schema=HR`

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default number of idle scratch cells kept for reuse
pub const DEFAULT_SCRATCH_POOL_SIZE: usize = 16;

/// Configuration for a [`TypeCatalog`](crate::TypeCatalog) and everything
/// created through it.
///
/// # Examples
///
/// ```rust
/// use oracle_dbobject::Config;
///
/// let config = Config::new()
///     .warn_unclosed(true)
///     .scratch_pool_size(4)
///     .default_schema("HR");
/// assert_eq!(config.scratch_pool_size, 4);
/// ```
///
/// ```rust
/// use oracle_dbobject::Config;
///
/// let config: Config = "close_on_drop=true; limitation_fallback=false".parse().unwrap();
/// assert!(config.close_on_drop);
/// assert!(!config.limitation_fallback);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log a warning when an object is dropped without being closed
    pub warn_unclosed: bool,
    /// Run the full close cascade when an unclosed object is dropped
    pub close_on_drop: bool,
    /// Maximum number of idle scratch cells kept in the pool
    pub scratch_pool_size: usize,
    /// Retry ORA-21602 attribute writes through an anonymous block
    pub limitation_fallback: bool,
    /// Schema assumed for unqualified type names when probing the catalog cache
    pub default_schema: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warn_unclosed: cfg!(debug_assertions),
            close_on_drop: false,
            scratch_pool_size: DEFAULT_SCRATCH_POOL_SIZE,
            limitation_fallback: true,
            default_schema: None,
        }
    }
}

impl Config {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the unclosed-object warning
    pub fn warn_unclosed(mut self, enabled: bool) -> Self {
        self.warn_unclosed = enabled;
        self
    }

    /// Enable or disable closing from `Drop`
    pub fn close_on_drop(mut self, enabled: bool) -> Self {
        self.close_on_drop = enabled;
        self
    }

    /// Set the scratch pool size (0 disables pooling)
    pub fn scratch_pool_size(mut self, size: usize) -> Self {
        self.scratch_pool_size = size;
        self
    }

    /// Enable or disable the ORA-21602 fallback
    pub fn limitation_fallback(mut self, enabled: bool) -> Self {
        self.limitation_fallback = enabled;
        self
    }

    /// Set the default schema
    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    /// Qualify `name` with the default schema when it has no schema part
    pub fn qualify(&self, name: &str) -> String {
        match &self.default_schema {
            Some(schema) if !name.contains('.') => format!("{}.{}", schema, name),
            _ => name.to_string(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::conversion(format!(
            "invalid boolean for {}: {:?}",
            key, value
        ))),
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Config::default();
        for pair in s
            .split(|c: char| c == ';' || c.is_whitespace())
            .filter(|p| !p.is_empty())
        {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::conversion(format!("expected key=value, got {:?}", pair))
            })?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "warn_unclosed" => config.warn_unclosed = parse_bool(&key, value)?,
                "close_on_drop" => config.close_on_drop = parse_bool(&key, value)?,
                "limitation_fallback" => config.limitation_fallback = parse_bool(&key, value)?,
                "scratch_pool_size" => {
                    config.scratch_pool_size = value.parse().map_err(|_| {
                        Error::conversion(format!("invalid scratch_pool_size: {:?}", value))
                    })?
                }
                "default_schema" => {
                    config.default_schema = (!value.is_empty()).then(|| value.to_string())
                }
                _ => {
                    return Err(Error::conversion(format!("unknown option {:?}", key)));
                }
            }
        }
        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "warn_unclosed={};close_on_drop={};scratch_pool_size={};limitation_fallback={}",
            self.warn_unclosed, self.close_on_drop, self.scratch_pool_size, self.limitation_fallback
        )?;
        if let Some(schema) = &self.default_schema {
            write!(f, ";default_schema={}", schema)?;
        }
        Ok(())
    }
}
