//! Maps source resource instances to their target values.
//!
//! Lookups go static configuration first, then the answers given earlier in
//! this run, then the operator. Every operator answer is remembered for the
//! rest of the run under its (project, source value, type mapping) key and is
//! never replaced.

use std::collections::HashMap;

use colored::Colorize;

use crate::catalog::{self, ResourceTypeMapping, SourceType};
use crate::config::{MappingConfig, TargetValue};
use crate::error::{Result, TrackportError};
use crate::model::{Project, SourceResource};
use crate::prompt::Prompter;

const MISSING_MAPPINGS_BANNER: &str = "Resource value mappings definition";
const PROMPT_ARROW: &str = " -> ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DynamicKey {
    project: Option<u64>,
    value: String,
    mapping: ResourceTypeMapping,
}

pub struct Resolver<P> {
    config: MappingConfig,
    prompter: P,
    dynamic: HashMap<DynamicKey, TargetValue>,
    banner_shown: bool,
}

impl<P: Prompter> Resolver<P> {
    pub fn new(config: MappingConfig, prompter: P) -> Self {
        Self {
            config,
            prompter,
            dynamic: HashMap::new(),
            banner_shown: false,
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Whether target values carry internal IDs.
    pub fn history_metadata(&self) -> bool {
        self.config.features.history_metadata
    }

    /// Number of mappings the operator supplied so far.
    #[cfg(test)]
    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }

    /// Target value for `resource`. `source_type` is inferred from the
    /// resource shape unless given; enumerations always need it.
    pub fn resolve(
        &mut self,
        resource: &dyn SourceResource,
        source_type: Option<SourceType>,
        scope: Option<&Project>,
    ) -> Result<TargetValue> {
        self.resolve_with_type(resource, source_type, scope)
            .map(|(value, _)| value)
    }

    /// Like [`Resolver::resolve`], also returning which target type the value
    /// belongs to.
    pub fn resolve_with_type(
        &mut self,
        resource: &dyn SourceResource,
        source_type: Option<SourceType>,
        scope: Option<&Project>,
    ) -> Result<(TargetValue, ResourceTypeMapping)> {
        let source_type = match source_type {
            Some(source_type) => source_type,
            None => catalog::infer_source_type(resource.shape())
                .ok_or_else(|| TrackportError::UnresolvableType(resource.shape().to_string()))?,
        };
        let mappings = catalog::target_mappings(source_type);
        if mappings.is_empty() {
            return Err(TrackportError::UnresolvableType(source_type.to_string()));
        }

        let field = source_type.identifying_field();
        let source_value = resource
            .attribute(field.key)
            .ok_or_else(|| TrackportError::MissingIdentifyingValue {
                resource: source_type.humanized().to_lowercase(),
                id: resource.id(),
                field: field.key,
            })?
            .to_string();

        let project_identifier = scope.map(|p| p.identifier.as_str());
        for &mapping in &mappings {
            if let Some(value) = self
                .config
                .static_value(mapping, &source_value, project_identifier)
            {
                return Ok((value.clone(), mapping));
            }
        }

        let project = scope.map(|p| p.id);
        for &mapping in &mappings {
            let key = DynamicKey {
                project,
                value: source_value.clone(),
                mapping,
            };
            if let Some(value) = self.dynamic.get(&key) {
                return Ok((value.clone(), mapping));
            }
        }

        self.ask_mapping(source_type, &mappings, source_value, scope)
    }

    fn ask_mapping(
        &mut self,
        source_type: SourceType,
        mappings: &[ResourceTypeMapping],
        source_value: String,
        scope: Option<&Project>,
    ) -> Result<(TargetValue, ResourceTypeMapping)> {
        let humanized = source_type.humanized();
        if !self.prompter.is_interactive() {
            let mut what = format!("{} '{source_value}'", humanized.to_lowercase());
            if let Some(project) = scope {
                what.push_str(&format!(" in project '{}'", project.identifier));
            }
            return Err(TrackportError::MappingUnresolved(what));
        }

        if !self.banner_shown {
            let rule = "-".repeat(MISSING_MAPPINGS_BANNER.len());
            self.prompter.say("")?;
            self.prompter.say(&rule)?;
            self.prompter.say(&MISSING_MAPPINGS_BANNER.bold().to_string())?;
            self.prompter.say(&rule)?;
            self.banner_shown = true;
        }

        let mapping = if mappings.len() > 1 {
            self.prompter.say(&format!(
                "Missing value mapping for {humanized} '{source_value}'."
            ))?;
            let targets: Vec<String> = mappings
                .iter()
                .map(|m| m.target.humanized().to_string())
                .collect();
            let choice = self.prompter.select(
                &format!(
                    "A {} can be mapped with one of these target resource types",
                    humanized.to_lowercase()
                ),
                &targets,
            )?;
            mappings[choice]
        } else {
            mappings[0]
        };

        let keyed = self.history_metadata();
        let fields = catalog::field_mapping(mapping);
        let question = format!(
            "[{humanized} {}{PROMPT_ARROW}{} {}{}] {source_value}",
            fields.source.name.to_uppercase(),
            mapping.target.humanized(),
            if keyed { "ID:" } else { "" },
            fields.target.name.to_uppercase(),
        );
        let value = self.prompter.input(&question, keyed)?;

        tracing::debug!(
            mapping = %mapping,
            source = %source_value,
            target = %value,
            "recorded operator mapping"
        );
        let key = DynamicKey {
            project: scope.map(|p| p.id),
            value: source_value,
            mapping,
        };
        let stored = self.dynamic.entry(key).or_insert(value);
        Ok((stored.clone(), mapping))
    }

    #[cfg(test)]
    fn remember(
        &mut self,
        mapping: ResourceTypeMapping,
        source_value: &str,
        project: Option<u64>,
        value: TargetValue,
    ) {
        self.dynamic.insert(
            DynamicKey {
                project,
                value: source_value.to_string(),
                mapping,
            },
            value,
        );
    }
}
