//! Mapper configuration files.
//!
//! A YAML document selects the options of the built-in converters and how
//! unconfigured shapes are treated. Every key is optional:
//!
//! ```yaml
//! conversions:
//!   date_formats: ["%d.%m.%Y"]
//!   true_tokens: ["1", "Y"]
//!   false_tokens: ["0", "N"]
//!   list_delimiter: ";"
//! unconfigured: fail
//! ```

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::convert::ConversionSettings;

/// What mapping a shape that was never configured yields.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnconfiguredPolicy {
    /// A `Default` instance, without touching the row.
    #[default]
    DefaultInstance,
    /// A [`MapError::NotConfigured`](crate::error::MapError::NotConfigured) error.
    Fail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapperConfig {
    pub conversions: ConversionSettings,
    pub unconfigured: UnconfiguredPolicy,
}

impl MapperConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).with_context(|| format!("Parsing config YAML {path:?}"))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("Parsing config YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing config YAML")
    }
}
