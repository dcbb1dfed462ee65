use std::env::VarError;

use anyhow::Context;
use custom_resource::Error;
use serde::Deserialize;

pub const PARAMETER_PREFIX_VAR: &str = "ParameterPrefix";

pub struct Config {
    pub parameter_prefix: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_var(std::env::var(PARAMETER_PREFIX_VAR))
    }

    pub fn from_var(var: Result<String, VarError>) -> anyhow::Result<Self> {
        let parameter_prefix = var
            .ok()
            .filter(|prefix| !prefix.is_empty())
            .with_context(|| format!("{PARAMETER_PREFIX_VAR} must be set"))?;

        Ok(Self { parameter_prefix })
    }
}

/// One String parameter found under the configured prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

// Parameter value, e.g.
// {"Name": "austin-test", "Source": "https://idp/metadata.xml",
//  "Destination": "austin-test", "AppendEntityId": "3"}
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntryValue {
    #[serde(default)]
    name: Option<String>,
    source: String,
    destination: String,
    #[serde(default)]
    append_entity_id: Option<String>,
}

/// A SAML identity provider to keep in sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncEntry {
    /// Parameter name the entry was read from.
    pub name: String,
    pub label: Option<String>,
    pub source_url: String,
    /// IAM SAML provider name.
    pub destination: String,
    /// Appended to the source entity ID, for IdPs that cannot serve several
    /// service providers under one entity ID.
    pub entity_id_suffix: Option<String>,
}

impl SyncEntry {
    pub fn from_parameter(parameter: &Parameter) -> Result<Self, Error> {
        let value: EntryValue = serde_json::from_str(&parameter.value).map_err(|e| {
            Error::InvalidInput(format!("parameter {}: {e}", parameter.name))
        })?;

        Ok(Self {
            name: parameter.name.clone(),
            label: value.name,
            source_url: value.source,
            destination: value.destination,
            entity_id_suffix: value.append_entity_id,
        })
    }
}

impl std::fmt::Display for SyncEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({label})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
