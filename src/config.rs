//! Static configuration: feature flags and per-type value mapping tables.
//!
//! The configuration is validated as soon as it is loaded so that a malformed
//! table aborts the run before any issue is processed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::catalog::{self, ResourceTypeMapping};
use crate::error::{Result, TrackportError};

/// Markup dialect used by source text fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum TextFormatting {
    #[default]
    None,
    Textile,
    Markdown,
}

impl TextFormatting {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Features {
    #[serde(default)]
    pub allow_group_assignment: bool,
    #[serde(default)]
    pub text_formatting: TextFormatting,
    /// Store and return target values as `(id, name)` pairs so the history
    /// can reference target internal IDs.
    #[serde(default)]
    pub history_metadata: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A value of the target system: its identifying name, plus its internal ID
/// when history metadata is exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetValue {
    pub id: Option<u64>,
    pub name: String,
}

impl TargetValue {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn keyed(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    /// Parse the compound `{ID}:{name}` form typed at a prompt.
    pub fn parse_keyed(input: &str) -> Option<Self> {
        let (id, name) = input.trim().split_once(':')?;
        let id = id.trim().parse().ok()?;
        let name = name.trim();
        if name.is_empty() || name.contains(':') {
            return None;
        }
        Some(Self::keyed(id, name))
    }
}

impl fmt::Display for TargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One static value mapping table: flat, or nested by source project identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticTable {
    Flat(BTreeMap<String, TargetValue>),
    ByProject(BTreeMap<String, BTreeMap<String, TargetValue>>),
}

impl StaticTable {
    fn values(&self) -> Box<dyn Iterator<Item = &TargetValue> + '_> {
        match self {
            Self::Flat(table) => Box::new(table.values()),
            Self::ByProject(tables) => Box::new(tables.values().flat_map(|t| t.values())),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(table) => table.is_empty(),
            Self::ByProject(tables) => tables.is_empty(),
        }
    }

    /// Number of mapped source values, across all projects.
    pub fn len(&self) -> usize {
        self.values().count()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    source: SourceSettings,
    #[serde(default)]
    features: Features,
    #[serde(default)]
    mappings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct MappingConfig {
    pub source: SourceSettings,
    pub features: Features,
    tables: HashMap<ResourceTypeMapping, StaticTable>,
}

impl MappingConfig {
    pub fn new(features: Features) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let parsed: RawConfig = if raw.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(raw)?
        };

        let mut config = Self {
            source: parsed.source,
            features: parsed.features,
            tables: HashMap::new(),
        };
        for (name, table) in parsed.mappings {
            let mapping = catalog::all_mappings()
                .iter()
                .copied()
                .find(|m| m.table_name() == name)
                .ok_or_else(|| {
                    TrackportError::InvalidConfig(format!("unknown mapping table '{name}'"))
                })?;
            config.insert_table(mapping, table_from_yaml(&name, table)?)?;
        }
        Ok(config)
    }

    /// Install a table, checking its shape against the catalog and the
    /// active feature flags.
    pub fn insert_table(&mut self, mapping: ResourceTypeMapping, table: StaticTable) -> Result<()> {
        let name = mapping.table_name();
        match (&table, mapping.is_project_scoped()) {
            (StaticTable::Flat(_), true) if !table.is_empty() => {
                return Err(TrackportError::InvalidConfig(format!(
                    "mapping table '{name}' must be nested by project identifier"
                )));
            }
            (StaticTable::ByProject(_), false) => {
                return Err(TrackportError::InvalidConfig(format!(
                    "mapping table '{name}' must map source values directly"
                )));
            }
            _ => {}
        }

        if self.features.history_metadata {
            if let Some(bad) = table.values().find(|v| v.id.is_none()) {
                return Err(TrackportError::InvalidConfig(format!(
                    "history metadata is enabled, so every value in '{name}' must use the \
                     [ID, identifying_name] form (found '{}')",
                    bad.name
                )));
            }
        }

        self.tables.insert(mapping, table);
        Ok(())
    }

    /// Statically configured target value for a source identifying value.
    /// Per-project tables are only consulted with a project identifier.
    pub fn static_value(
        &self,
        mapping: ResourceTypeMapping,
        source_value: &str,
        project_identifier: Option<&str>,
    ) -> Option<&TargetValue> {
        let found = match (self.tables.get(&mapping)?, project_identifier) {
            (StaticTable::Flat(table), _) => table.get(source_value),
            (StaticTable::ByProject(tables), Some(project)) => {
                tables.get(project)?.get(source_value)
            }
            (StaticTable::ByProject(_), None) => None,
        };
        found.filter(|value| !value.name.is_empty())
    }

    pub fn table(&self, mapping: ResourceTypeMapping) -> Option<&StaticTable> {
        self.tables.get(&mapping)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

fn table_from_yaml(table: &str, raw: Value) -> Result<StaticTable> {
    let entries = match raw {
        Value::Null => return Ok(StaticTable::Flat(BTreeMap::new())),
        Value::Mapping(entries) => entries,
        other => {
            return Err(TrackportError::InvalidConfig(format!(
                "mapping table '{table}' must be a mapping, found {}",
                describe(&other)
            )));
        }
    };
    let nested = entries.values().any(Value::is_mapping);

    let mut flat = BTreeMap::new();
    let mut by_project = BTreeMap::new();
    for (key, value) in entries {
        let key = scalar_key(table, &key)?;
        match value {
            Value::Mapping(values) if nested => {
                let mut project = BTreeMap::new();
                for (value_key, value) in values {
                    let value_key = scalar_key(table, &value_key)?;
                    let target = target_value(table, &format!("{key}/{value_key}"), &value)?;
                    project.insert(value_key, target);
                }
                by_project.insert(key, project);
            }
            value if !nested => {
                flat.insert(key.clone(), target_value(table, &key, &value)?);
            }
            _ => {
                return Err(TrackportError::InvalidConfig(format!(
                    "mapping table '{table}' mixes project sections with plain values ('{key}')"
                )));
            }
        }
    }
    Ok(if nested {
        StaticTable::ByProject(by_project)
    } else {
        StaticTable::Flat(flat)
    })
}

fn scalar_key(table: &str, key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(TrackportError::InvalidConfig(format!(
            "mapping table '{table}' has a {} key",
            describe(other)
        ))),
    }
}

/// A target value is a name or an `[ID, name]` pair.
fn target_value(table: &str, key: &str, value: &Value) -> Result<TargetValue> {
    match value {
        Value::String(name) => return Ok(TargetValue::named(name.as_str())),
        Value::Null => return Ok(TargetValue::named("")),
        Value::Sequence(pair) => {
            if let [Value::Number(id), Value::String(name)] = pair.as_slice()
                && let Some(id) = id.as_u64()
            {
                return Ok(TargetValue::keyed(id, name.as_str()));
            }
        }
        _ => {}
    }
    Err(TrackportError::InvalidConfig(format!(
        "mapping table '{table}': value of '{key}' must be a name or an [ID, name] pair, \
         found {}",
        describe(value)
    )))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "nothing".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("'{s}'"),
        Value::Sequence(items) => format!("a list of {} items", items.len()),
        Value::Mapping(_) => "a mapping".into(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}
