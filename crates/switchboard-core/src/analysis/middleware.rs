// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Middleware model builder.
//!
//! **DDD Context:** Analysis
//!
//! A middleware type contributes lifecycle hooks found by method name:
//!
//! | Hook     | Methods                      |
//! |----------|------------------------------|
//! | Before   | `Before`, `BeforeAsync`      |
//! | After    | `After`, `AfterAsync`        |
//! | Finally  | `Finally`, `FinallyAsync`    |
//! | Around   | `Execute`, `ExecuteAsync`    |
//!
//! An Around hook subsumes the others; a type declaring one is recorded
//! with the Around hook only. The first hook's message parameter decides
//! which messages the middleware applies to.

use super::{AnalysisContext, classifier, handlers::HandlerRecord, type_hierarchy::TypeHierarchy, type_shape::TypeShape};
use crate::cache::{IncrementalCache, MemoTable};
use crate::cancellation::{CancellationToken, Cancelled};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::symbols::{AttributeValue, MethodSymbol, Origin, SourceLocation, TypeRef, TypeSymbol, well_known};
use ecow::{EcoString, eco_format};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// A lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    Before,
    After,
    Finally,
    Around,
}

impl HookKind {
    /// Hook kind for a method name, if it names one.
    #[must_use]
    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            "Before" | "BeforeAsync" => Some(HookKind::Before),
            "After" | "AfterAsync" => Some(HookKind::After),
            "Finally" | "FinallyAsync" => Some(HookKind::Finally),
            "Execute" | "ExecuteAsync" => Some(HookKind::Around),
            _ => None,
        }
    }
}

/// What a hook parameter receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookParameterRole {
    Message,
    CancellationToken,
    /// The handler's response (After and Finally).
    Result,
    /// The exception that escaped the handler, if any (Finally).
    Exception,
    /// The value returned by this middleware's Before hook.
    BeforeState,
    /// The rest of the pipeline (Around).
    Next,
    Dependency { optional: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookParameter {
    pub name: EcoString,
    pub ty: TypeRef,
    pub role: HookParameterRole,
}

/// One implemented lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookMethod {
    pub kind: HookKind,
    pub method_name: EcoString,
    pub parameters: Vec<HookParameter>,
    pub return_shape: TypeShape,
    pub is_async: bool,
    pub is_static: bool,
}

impl HookMethod {
    /// A Before hook returning the short-circuit marker may skip the handler.
    #[must_use]
    pub fn can_short_circuit(&self) -> bool {
        self.kind == HookKind::Before && self.return_shape.is_untyped_handler_result
    }

    /// Value a Before hook hands to After/Finally, if any.
    #[must_use]
    pub fn state_type(&self) -> Option<TypeRef> {
        if self.kind != HookKind::Before || self.can_short_circuit() {
            return None;
        }
        self.return_shape.value_type()
    }

    #[must_use]
    pub fn parameter(&self, role: HookParameterRole) -> Option<&HookParameter> {
        self.parameters.iter().find(|p| p.role == role)
    }
}

/// Which messages a middleware applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Applicability {
    /// `object` or no message parameter.
    Everything,
    /// A concrete type (and its subtypes) or a capability interface.
    Type {
        type_ref: TypeRef,
        key: EcoString,
        is_interface: bool,
    },
    /// A hook type parameter; messages must satisfy every constraint.
    Constrained { constraints: Vec<TypeRef> },
}

impl Applicability {
    #[must_use]
    pub fn applies_to(&self, message: &TypeRef, hierarchy: &TypeHierarchy<'_>) -> bool {
        match self {
            Applicability::Everything => true,
            Applicability::Type { type_ref, .. } => hierarchy.is_assignable(message, type_ref),
            Applicability::Constrained { constraints } => hierarchy.satisfies(message, constraints),
        }
    }
}

/// One discovered middleware type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MiddlewareRecord {
    pub middleware_type: EcoString,
    pub origin: Origin,
    pub applicability: Applicability,
    /// Lower ranks run Before hooks earlier and After/Finally hooks later.
    pub rank: i64,
    /// The rank came from a marker rather than the default.
    pub explicit_rank: bool,
    pub declaration_index: usize,
    pub hooks: Vec<HookMethod>,
    /// Applied only to handlers that name it explicitly.
    pub explicit_only: bool,
    pub is_static: bool,
    pub is_public: bool,
    pub location: Option<SourceLocation>,
}

impl MiddlewareRecord {
    #[must_use]
    pub fn hook(&self, kind: HookKind) -> Option<&HookMethod> {
        self.hooks.iter().find(|h| h.kind == kind)
    }

    #[must_use]
    pub fn is_around(&self) -> bool {
        self.hook(HookKind::Around).is_some()
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.hooks.iter().any(|h| h.is_async)
    }

    #[must_use]
    pub fn applies_to(&self, message: &TypeRef, hierarchy: &TypeHierarchy<'_>) -> bool {
        self.applicability.applies_to(message, hierarchy)
    }

    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(&self.middleware_type)
    }

    /// Instance hooks need the middleware resolved from the dependency source.
    #[must_use]
    pub fn needs_instance(&self) -> bool {
        self.hooks.iter().any(|h| !h.is_static)
    }
}

/// Middleware found in one type; `None` when the type declares no hooks.
pub type TypeMiddleware = Option<MiddlewareRecord>;

/// Result of scanning every assembly, sorted by `(rank, declaration_index)`.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareDiscovery {
    pub middleware: Vec<MiddlewareRecord>,
}

impl MiddlewareDiscovery {
    #[must_use]
    pub fn find(&self, ty: &TypeRef) -> Option<&MiddlewareRecord> {
        let key = ty.key();
        self.middleware.iter().find(|m| m.middleware_type == key)
    }
}

/// Scans for middleware by convention, marker, or explicit reference from
/// a handler (`explicit`).
///
/// # Errors
///
/// Returns [`Cancelled`] if `cancel` fires.
#[instrument(skip_all, fields(explicit = explicit.len()))]
pub fn discover_middleware(
    ctx: &AnalysisContext<'_>,
    cache: &mut IncrementalCache,
    explicit: &[TypeRef],
    cancel: &CancellationToken,
) -> Result<MiddlewareDiscovery, Cancelled> {
    let fingerprint = ctx.table.hierarchy_fingerprint();
    let referenced: HashSet<EcoString> = explicit.iter().map(TypeRef::key).collect();
    let mut discovery = MiddlewareDiscovery::default();

    for (assembly, origin) in ctx.scanned_assemblies() {
        for ty in &assembly.types {
            cancel.check()?;
            if !origin.is_local() && !ty.accessibility.is_public() {
                continue;
            }
            let explicitly_named = referenced.contains(&TypeRef::named(&ty.name).key());
            if !classifier::is_middleware_candidate(ty, ctx.config) && !explicitly_named {
                continue;
            }
            let shapes = &mut cache.shapes;
            let found = cache
                .middleware
                .get_or_insert_with((fingerprint, origin.clone(), ty.clone()), |_| {
                    middleware_for_type(ctx, shapes, ty, &origin)
                });
            match found {
                Some(mut record) => {
                    record.declaration_index = discovery.middleware.len();
                    debug!(middleware = %record.middleware_type, rank = record.rank, "Discovered middleware");
                    discovery.middleware.push(record);
                }
                None => debug!(ty = %ty.name, "Middleware candidate declares no hooks; skipped"),
            }
        }
    }

    discovery
        .middleware
        .sort_by_key(|m| (m.rank, m.declaration_index));
    info!(count = discovery.middleware.len(), "Middleware discovery complete");
    Ok(discovery)
}

/// Builds the record for one type, or `None` when it has no hooks.
pub(crate) fn middleware_for_type(
    ctx: &AnalysisContext<'_>,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    ty: &TypeSymbol,
    origin: &Origin,
) -> TypeMiddleware {
    let config = ctx.config;
    let hook_methods: Vec<(HookKind, &MethodSymbol)> = ty
        .methods
        .iter()
        .filter(|m| m.accessibility.is_assembly_visible())
        .filter(|m| origin.is_local() || m.accessibility.is_public())
        .filter(|m| !classifier::is_ignored(&m.attributes, config))
        .filter(|m| !m.return_type.contains_error() && !m.parameters.iter().any(|p| p.ty.contains_error()))
        .filter_map(|m| HookKind::from_method_name(&m.name).map(|kind| (kind, m)))
        .collect();

    let (_, first) = *hook_methods.first()?;
    let around = hook_methods.iter().find(|(kind, _)| *kind == HookKind::Around);
    let selected: Vec<(HookKind, &MethodSymbol)> = match around {
        Some(around) => vec![*around],
        None => {
            let mut seen = HashSet::new();
            hook_methods
                .iter()
                .filter(|(kind, _)| seen.insert(*kind))
                .copied()
                .collect()
        }
    };

    let state = selected
        .iter()
        .find(|(kind, _)| *kind == HookKind::Before)
        .map(|(_, m)| classifier::classify_return(m, shapes, config))
        .filter(|shape| !shape.is_untyped_handler_result)
        .and_then(|shape| shape.value_type());

    let hooks: Vec<HookMethod> = selected
        .iter()
        .map(|(kind, method)| {
            let return_shape = classifier::classify_return(method, shapes, config);
            HookMethod {
                kind: *kind,
                method_name: method.name.clone(),
                parameters: hook_parameters(*kind, method, state.as_ref(), config),
                is_async: return_shape.is_async_wrapper,
                return_shape,
                is_static: ty.is_static || method.is_static,
            }
        })
        .collect();

    let applicability = applicability_of(ctx, around.map_or(first, |(_, m)| *m));
    let (rank, explicit_rank) = rank_of(ty, config);
    let explicit_only = ty
        .attribute(&config.markers.middleware_attribute)
        .and_then(|a| a.named("ExplicitOnly"))
        .and_then(AttributeValue::as_bool)
        .unwrap_or(false);

    Some(MiddlewareRecord {
        middleware_type: TypeRef::named(&ty.name).key(),
        origin: origin.clone(),
        applicability,
        rank,
        explicit_rank,
        declaration_index: 0,
        is_static: hooks.iter().all(|h| h.is_static),
        is_public: ty.accessibility.is_public()
            && selected.iter().all(|(_, m)| m.accessibility.is_public()),
        hooks,
        explicit_only,
        location: ty.location.clone(),
    })
}

fn applicability_of(ctx: &AnalysisContext<'_>, method: &MethodSymbol) -> Applicability {
    let Some(parameter) = method
        .parameters
        .iter()
        .find(|p| is_hook_message_candidate(&p.ty, ctx.config))
    else {
        return Applicability::Everything;
    };
    let ty = parameter.ty.canonical().non_nullable().clone();
    match &ty {
        _ if ty.is_object() => Applicability::Everything,
        TypeRef::TypeParameter { name, constraints } => {
            let mut all = constraints.clone();
            if let Some(declared) = method.type_parameters.iter().find(|p| p.name == *name) {
                for constraint in declared.constraints.iter().map(TypeRef::canonical) {
                    if !all.contains(&constraint) {
                        all.push(constraint);
                    }
                }
            }
            if all.is_empty() {
                Applicability::Everything
            } else {
                Applicability::Constrained { constraints: all }
            }
        }
        _ => Applicability::Type {
            key: ty.key(),
            is_interface: ctx.hierarchy.is_interface(&ty),
            type_ref: ty,
        },
    }
}

fn is_hook_message_candidate(ty: &TypeRef, config: &GeneratorConfig) -> bool {
    !ty.contains_error()
        && !classifier::is_cancellation_token(ty)
        && !classifier::is_infrastructure(ty, config)
        && !ty.non_nullable().is_named(&config.runtime.execution_delegate)
        && !ty.non_nullable().is_named(well_known::EXCEPTION)
}

fn hook_parameters(
    kind: HookKind,
    method: &MethodSymbol,
    state: Option<&TypeRef>,
    config: &GeneratorConfig,
) -> Vec<HookParameter> {
    let message_index = method
        .parameters
        .iter()
        .position(|p| is_hook_message_candidate(&p.ty, config));
    let state_key = state.map(TypeRef::key);

    method
        .parameters
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let ty = p.ty.canonical();
            let returns_value = matches!(kind, HookKind::After | HookKind::Finally);
            let role = if Some(index) == message_index {
                HookParameterRole::Message
            } else if classifier::is_cancellation_token(&ty) {
                HookParameterRole::CancellationToken
            } else if ty.non_nullable().is_named(&config.runtime.execution_delegate) {
                HookParameterRole::Next
            } else if kind == HookKind::Finally && ty.non_nullable().is_named(well_known::EXCEPTION) {
                HookParameterRole::Exception
            } else if returns_value && state_key.as_ref().is_some_and(|k| *k == ty.key()) {
                HookParameterRole::BeforeState
            } else if returns_value && (p.name == "result" || p.name == "response" || ty.is_object()) {
                HookParameterRole::Result
            } else {
                HookParameterRole::Dependency {
                    optional: ty.is_nullable() || p.default_value.is_some(),
                }
            };
            HookParameter {
                name: p.name.clone(),
                ty,
                role,
            }
        })
        .collect()
}

fn rank_of(ty: &TypeSymbol, config: &GeneratorConfig) -> (i64, bool) {
    if let Some(rank) = ty
        .attribute(&config.markers.middleware_attribute)
        .and_then(|a| a.named("Order"))
        .and_then(AttributeValue::as_int)
    {
        return (rank, true);
    }
    if let Some(rank) = ty
        .attribute(&config.markers.order_attribute)
        .and_then(|a| a.arguments.first())
        .and_then(AttributeValue::as_int)
    {
        return (rank, true);
    }
    (0, false)
}

/// Local middleware whose applicability no discovered concrete handler
/// message satisfies.
///
/// Opt-in-only middleware and middleware applying to everything are never
/// dead; neither is anything when no concrete handler exists yet.
#[must_use]
pub fn dead_middleware(
    middleware: &[MiddlewareRecord],
    handlers: &[HandlerRecord],
    hierarchy: &TypeHierarchy<'_>,
) -> Vec<Diagnostic> {
    let messages: Vec<&TypeRef> = handlers
        .iter()
        .filter(|h| h.message.kind == super::MessageKind::Exact)
        .map(|h| &h.message.type_ref)
        .collect();
    if messages.is_empty() {
        return Vec::new();
    }

    middleware
        .iter()
        .filter(|m| m.origin.is_local() && !m.explicit_only)
        .filter(|m| m.applicability != Applicability::Everything)
        .filter(|m| !messages.iter().any(|message| m.applies_to(message, hierarchy)))
        .map(|m| {
            let filter = match &m.applicability {
                Applicability::Type { key, .. } => key.clone(),
                Applicability::Constrained { constraints } => {
                    let keys: Vec<EcoString> = constraints.iter().map(TypeRef::key).collect();
                    keys.join(" + ").into()
                }
                Applicability::Everything => EcoString::new(),
            };
            Diagnostic::new(
                DiagnosticId::DeadMiddleware,
                eco_format!(
                    "Middleware '{}' applies to '{}', which no handled message satisfies",
                    m.middleware_type,
                    filter
                ),
                m.location.clone(),
            )
            .with_hint("remove the middleware or widen its message parameter")
        })
        .collect()
}
