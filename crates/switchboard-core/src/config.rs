// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Generator configuration.
//!
//! **DDD Context:** Configuration
//!
//! Every convention the generator recognizes (name suffixes, marker
//! attributes, façade methods, runtime library types) is a field here, so a
//! host can retarget the generator at a differently named runtime library
//! without touching the analysis passes. Configuration is read from the
//! `[generator]` table of `switchboard.toml`:
//!
//! ```toml
//! [generator]
//! generated_namespace = "Acme.Mediator.Generated"
//!
//! [generator.conventions]
//! handler_suffixes = ["Handler"]
//!
//! [generator.severity]
//! SWB0001 = "error"
//! ```

use crate::diagnostics::{DiagnosticId, Severity};
use camino::{Utf8Path, Utf8PathBuf};
use ecow::EcoString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// File name looked up by [`find_config`].
pub const CONFIG_FILE_NAME: &str = "switchboard.toml";

/// Complete generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Root namespace for all generated types.
    pub generated_namespace: EcoString,
    /// Emit call-site interceptors. When off, only wrappers, publishers and
    /// the registry are generated.
    pub interceptors: bool,
    /// Emit the `InterceptsLocationAttribute` declaration alongside interceptors.
    pub intercepts_location_polyfill: bool,
    /// Emit the handler registry consumed by the façade.
    pub registry: bool,
    pub conventions: Conventions,
    pub markers: MarkerNames,
    pub facade: FacadeNames,
    pub runtime: RuntimeNames,
    /// Per-diagnostic severity overrides.
    pub severity: BTreeMap<DiagnosticId, Severity>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generated_namespace: "Switchboard.Generated".into(),
            interceptors: true,
            intercepts_location_polyfill: true,
            registry: true,
            conventions: Conventions::default(),
            markers: MarkerNames::default(),
            facade: FacadeNames::default(),
            runtime: RuntimeNames::default(),
            severity: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    /// Effective severity for a diagnostic id.
    #[must_use]
    pub fn severity_for(&self, id: DiagnosticId) -> Severity {
        self.severity
            .get(&id)
            .copied()
            .unwrap_or_else(|| id.default_severity())
    }
}

/// Naming conventions for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Conventions {
    pub handler_suffixes: Vec<EcoString>,
    pub handler_methods: Vec<EcoString>,
    pub middleware_suffixes: Vec<EcoString>,
    /// Types resolved by the dependency source that are never the message.
    pub infrastructure_types: Vec<EcoString>,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            handler_suffixes: names(&["Handler", "Consumer"]),
            handler_methods: names(&[
                "Handle",
                "HandleAsync",
                "Handles",
                "HandlesAsync",
                "Consume",
                "ConsumeAsync",
            ]),
            middleware_suffixes: names(&["Middleware"]),
            infrastructure_types: names(&[
                "System.IServiceProvider",
                "Switchboard.IMediator",
                "Microsoft.Extensions.Logging.ILogger",
                "Microsoft.Extensions.Logging.ILoggerFactory",
            ]),
        }
    }
}

/// Marker attribute and interface names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerNames {
    pub handler_attribute: EcoString,
    pub handler_interface: EcoString,
    /// Supports named arguments `Order` and `ExplicitOnly`.
    pub middleware_attribute: EcoString,
    pub ignore_attribute: EcoString,
    /// Takes the rank as its first positional argument.
    pub order_attribute: EcoString,
    /// Takes `params Type[]` naming the required middleware.
    pub use_middleware_attribute: EcoString,
    /// Assembly-level: scan this referenced assembly for handlers and middleware.
    pub module_attribute: EcoString,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            handler_attribute: "Switchboard.HandlerAttribute".into(),
            handler_interface: "Switchboard.IHandler".into(),
            middleware_attribute: "Switchboard.MiddlewareAttribute".into(),
            ignore_attribute: "Switchboard.IgnoreAttribute".into(),
            order_attribute: "Switchboard.OrderAttribute".into(),
            use_middleware_attribute: "Switchboard.UseMiddlewareAttribute".into(),
            module_attribute: "Switchboard.SwitchboardModuleAttribute".into(),
        }
    }
}

/// The dispatch façade and dependency source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeNames {
    pub mediator_interface: EcoString,
    pub invoke_methods: Vec<EcoString>,
    pub publish_methods: Vec<EcoString>,
    /// Property of the façade exposing the dependency source.
    pub service_provider_property: EcoString,
    pub service_provider_type: EcoString,
    /// Static class declaring `GetRequiredService<T>(IServiceProvider)`.
    pub required_service_extensions: EcoString,
}

impl Default for FacadeNames {
    fn default() -> Self {
        Self {
            mediator_interface: "Switchboard.IMediator".into(),
            invoke_methods: names(&["Invoke", "InvokeAsync"]),
            publish_methods: names(&["Publish", "PublishAsync"]),
            service_provider_property: "ServiceProvider".into(),
            service_provider_type: "System.IServiceProvider".into(),
            required_service_extensions:
                "Microsoft.Extensions.DependencyInjection.ServiceProviderServiceExtensions".into(),
        }
    }
}

/// Types of the runtime library the generated code targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeNames {
    /// Outcome type, plain and generic (`Result`, `Result<T>`).
    pub result: EcoString,
    /// Short-circuit marker with `IsShortCircuited` and `Value`.
    pub handler_result: EcoString,
    /// `next` delegate passed to around hooks.
    pub execution_delegate: EcoString,
    /// Declares the static `Value` placeholder returned for void handlers.
    pub unit: EcoString,
    pub handler_registration: EcoString,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            result: "Switchboard.Result".into(),
            handler_result: "Switchboard.HandlerResult".into(),
            execution_delegate: "Switchboard.HandlerExecutionDelegate".into(),
            unit: "Switchboard.Unit".into(),
            handler_registration: "Switchboard.HandlerRegistration".into(),
        }
    }
}

fn names(values: &[&str]) -> Vec<EcoString> {
    values.iter().map(|v| EcoString::from(*v)).collect()
}

/// Errors from reading `switchboard.toml`.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to read configuration '{path}'")]
    #[diagnostic(code(switchboard::config::read))]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration '{path}'")]
    #[diagnostic(
        code(switchboard::config::parse),
        help("severity keys must be diagnostic ids such as SWB0001")
    )]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    generator: GeneratorConfig,
}

/// Parses a configuration file.
///
/// A file without a `[generator]` table yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or is not valid.
pub fn load_config(path: &Utf8Path) -> Result<GeneratorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Parses configuration text.
///
/// # Errors
///
/// Returns the TOML error if the text is malformed.
pub fn parse_config(content: &str) -> Result<GeneratorConfig, toml::de::Error> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(file.generator)
}

/// Looks for `switchboard.toml` in `project_root`.
///
/// Returns `None` when no file exists.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be loaded.
pub fn find_config(project_root: &Utf8Path) -> Result<Option<GeneratorConfig>, ConfigError> {
    let path = project_root.join(CONFIG_FILE_NAME);
    let exists = path.try_exists().map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    if exists {
        load_config(&path).map(Some)
    } else {
        Ok(None)
    }
}
