//! Widget kind registry and startup instantiation
//!
//! Each kind registers the settings keys it understands and a constructor. Building the
//! dashboard walks the enabled entries in declaration order, resolves their rectangles
//! against the grid and produces exactly one `WidgetInstance` per enabled entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::{Widget, WidgetInstance};
use crate::config::{Config, ConfigError, ConfigWarning, WidgetConfig};
use crate::grid;
use crate::providers::{cmdrunner, hibp, textfile};

type Constructor =
    Box<dyn Fn(&WidgetConfig) -> Result<Box<dyn Widget>, ConfigError> + Send + Sync>;

/// A registered widget kind
pub struct WidgetKind {
    pub name: &'static str,
    /// Settings keys the kind understands; anything else produces a warning
    pub known_keys: &'static [&'static str],
    build: Constructor,
}

impl WidgetKind {
    pub fn new<F>(name: &'static str, known_keys: &'static [&'static str], build: F) -> Self
    where
        F: Fn(&WidgetConfig) -> Result<Box<dyn Widget>, ConfigError> + Send + Sync + 'static,
    {
        Self {
            name,
            known_keys,
            build: Box::new(build),
        }
    }
}

#[derive(Default)]
pub struct WidgetRegistry {
    kinds: HashMap<&'static str, WidgetKind>,
}

impl WidgetRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(hibp::kind());
        registry.register(textfile::kind());
        registry.register(cmdrunner::kind());
        registry
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: WidgetKind) {
        self.kinds.insert(kind.name, kind);
    }

    pub fn kind_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Construct the widget for one entry, reporting settings keys the kind ignores
    pub fn build(
        &self,
        config: &WidgetConfig,
    ) -> Result<(Box<dyn Widget>, Vec<ConfigWarning>), ConfigError> {
        let kind = self
            .kinds
            .get(config.kind.as_str())
            .ok_or_else(|| ConfigError::UnknownKind {
                widget: config.name.clone(),
                kind: config.kind.clone(),
            })?;

        let warnings = config
            .settings
            .keys()
            .filter(|key| !kind.known_keys.contains(&key.as_str()))
            .map(|key| ConfigWarning::UnknownKey {
                widget: config.name.clone(),
                key: key.clone(),
            })
            .collect();

        let widget = (kind.build)(config)?;
        Ok((widget, warnings))
    }
}

/// Deserialize a widget entry's kind-specific settings into a typed struct
pub fn parse_settings<T: DeserializeOwned>(config: &WidgetConfig) -> Result<T, ConfigError> {
    toml::Value::Table(config.settings.clone())
        .try_into::<T>()
        .map_err(|source| ConfigError::InvalidSettings {
            widget: config.name.clone(),
            source,
        })
}

/// The running widget set plus everything worth telling the user about it
#[derive(Debug)]
pub struct WidgetSet {
    pub instances: Vec<Arc<WidgetInstance>>,
    pub warnings: Vec<ConfigWarning>,
}

/// Turn a loaded configuration into widget instances
///
/// Fails on unknown kinds, invalid settings and out-of-bounds rectangles. Overlaps,
/// unknown keys and clamped intervals are returned as warnings.
pub fn instantiate(config: &Config, registry: &WidgetRegistry) -> Result<WidgetSet, ConfigError> {
    let (entries, mut warnings) = config.widget_configs()?;
    let enabled: Vec<WidgetConfig> = entries.into_iter().filter(|entry| entry.enabled).collect();

    let resolution = grid::resolve(
        &config.grid,
        enabled.iter().map(|entry| (entry.name.as_str(), entry.position)),
    )?;
    warnings.extend(resolution.warnings.into_iter().map(ConfigWarning::Grid));

    let mut instances = Vec::with_capacity(enabled.len());
    for (index, (entry, rect)) in enabled.into_iter().zip(resolution.rects).enumerate() {
        let (widget, kind_warnings) = registry.build(&entry)?;
        warnings.extend(kind_warnings);
        info!("CONFIG: widget '{}' ({}) at {:?}", entry.name, entry.kind, rect);
        instances.push(Arc::new(WidgetInstance::new(index, entry, rect, widget)));
    }

    for warning in &warnings {
        warn!("CONFIG: {}", warning);
    }

    Ok(WidgetSet {
        instances,
        warnings,
    })
}
