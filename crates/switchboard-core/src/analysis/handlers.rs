// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Handler model builder.
//!
//! **DDD Context:** Analysis
//!
//! Produces one [`HandlerRecord`] per discovered (handler type, message
//! type, method) triple. Discovery order is referenced module assemblies in
//! reference order, then the local assembly, with types and methods in
//! declaration order; `declaration_index` records that order and is the
//! tie-breaker everywhere downstream.

use super::{AnalysisContext, classifier, shape_of, type_shape::TypeShape};
use crate::cache::{IncrementalCache, MemoTable};
use crate::cancellation::{CancellationToken, Cancelled};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::symbols::{
    AttributeData, MethodSymbol, Origin, SourceLocation, TypeRef, TypeSymbol,
};
use ecow::{EcoString, eco_format};
use tracing::{debug, info, instrument};

/// How a handler's message parameter binds to message types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A concrete (closed) message type.
    Exact,
    /// A constructed generic over method type parameters (`Envelope<T>`).
    OpenGeneric { definition: EcoString },
    /// A bare method type parameter (`T where T : ICommand`).
    TypeParameter { constraints: Vec<TypeRef> },
}

/// The message type a handler accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageBinding {
    /// Canonical, non-nullable parameter type.
    pub type_ref: TypeRef,
    pub key: EcoString,
    pub kind: MessageKind,
}

/// A method-level generic parameter of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParameter {
    pub name: EcoString,
    pub constraints: Vec<TypeRef>,
}

/// What a handler parameter receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterRole {
    Message,
    CancellationToken,
    /// The dependency source itself.
    ServiceProvider,
    /// Resolved from the dependency source; optional ones may be absent.
    Dependency { optional: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordParameter {
    pub name: EcoString,
    pub ty: TypeRef,
    pub shape: TypeShape,
    pub role: ParameterRole,
}

/// One discovered handler method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerRecord {
    /// Canonical name of the declaring type.
    pub handler_type: EcoString,
    pub origin: Origin,
    pub message: MessageBinding,
    /// Base types then interfaces of an exact message type.
    pub message_chain: Vec<TypeRef>,
    pub method_name: EcoString,
    pub generic_parameters: Vec<GenericParameter>,
    pub parameters: Vec<RecordParameter>,
    pub return_shape: TypeShape,
    pub is_async: bool,
    pub is_static: bool,
    pub has_no_injected_dependencies: bool,
    /// Middleware the handler requires, from the explicit-middleware marker.
    pub explicit_middleware: Vec<TypeRef>,
    pub declaration_index: usize,
    /// Handler type, method and every signature type are public.
    pub is_public: bool,
    pub location: Option<SourceLocation>,
}

/// Identity of a handler within one dispatch kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId {
    pub handler_type: EcoString,
    pub method_name: EcoString,
}

impl HandlerRecord {
    #[must_use]
    pub fn id(&self) -> HandlerId {
        HandlerId {
            handler_type: self.handler_type.clone(),
            method_name: self.method_name.clone(),
        }
    }

    #[must_use]
    pub fn handler_type_ref(&self) -> TypeRef {
        TypeRef::named(&self.handler_type)
    }

    #[must_use]
    pub fn is_cascading(&self) -> bool {
        self.return_shape.is_tuple_return
    }

    /// What the caller receives: the primary tuple element, or the awaited
    /// return type; `None` for void handlers.
    #[must_use]
    pub fn response_type(&self) -> Option<&TypeRef> {
        self.return_shape.primary_response()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &RecordParameter> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.role, ParameterRole::Dependency { .. }))
    }

    /// `Type.Method` for messages.
    #[must_use]
    pub fn display_name(&self) -> EcoString {
        eco_format!("{}.{}", self.handler_type, self.method_name)
    }
}

/// Handlers and diagnostics found in one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHandlers {
    pub handlers: Vec<HandlerRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of scanning every assembly.
#[derive(Debug, Clone, Default)]
pub struct HandlerDiscovery {
    pub handlers: Vec<HandlerRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans local types and referenced module assemblies for handlers.
///
/// # Errors
///
/// Returns [`Cancelled`] if `cancel` fires; no partial result is returned.
#[instrument(skip_all, fields(assembly = %ctx.table.compilation().assembly.name))]
pub fn discover_handlers(
    ctx: &AnalysisContext<'_>,
    cache: &mut IncrementalCache,
    cancel: &CancellationToken,
) -> Result<HandlerDiscovery, Cancelled> {
    let fingerprint = ctx.table.hierarchy_fingerprint();
    let mut discovery = HandlerDiscovery::default();

    for (assembly, origin) in ctx.scanned_assemblies() {
        for ty in &assembly.types {
            cancel.check()?;
            if !origin.is_local() && !ty.accessibility.is_public() {
                continue;
            }
            let shapes = &mut cache.shapes;
            let found = cache
                .handlers
                .get_or_insert_with((fingerprint, origin.clone(), ty.clone()), |_| {
                    handlers_for_type(ctx, shapes, ty, &origin)
                });
            for mut record in found.handlers {
                record.declaration_index = discovery.handlers.len();
                debug!(handler = %record.display_name(), message = %record.message.key, "Discovered handler");
                discovery.handlers.push(record);
            }
            discovery.diagnostics.extend(found.diagnostics);
        }
    }

    info!(count = discovery.handlers.len(), "Handler discovery complete");
    Ok(discovery)
}

/// Builds the records for one type, validating tuple shapes and same-type
/// overloads.
pub(crate) fn handlers_for_type(
    ctx: &AnalysisContext<'_>,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    ty: &TypeSymbol,
    origin: &Origin,
) -> TypeHandlers {
    let config = ctx.config;
    let mut out = TypeHandlers::default();
    let mut valid: Vec<HandlerRecord> = Vec::new();

    for method in &ty.methods {
        if !classifier::is_handler_candidate(ty, method, config) {
            continue;
        }
        if !origin.is_local() && !method.accessibility.is_public() {
            continue;
        }
        let Some(record) = build_record(ctx, shapes, ty, method, origin) else {
            debug!(method = %method.name, "Handler candidate has no message parameter; skipped");
            continue;
        };

        let duplicates = record.return_shape.duplicate_tuple_elements();
        if !duplicates.is_empty() {
            out.diagnostics.push(
                Diagnostic::new(
                    DiagnosticId::DuplicateTupleElement,
                    eco_format!(
                        "Handler '{}' returns a tuple with more than one element of type '{}'",
                        record.display_name(),
                        duplicates.join("', '")
                    ),
                    record.location.clone(),
                )
                .with_hint("cascaded messages are dispatched by type; give each element a distinct type"),
            );
            continue;
        }
        if record.return_shape.tuple_primary_is_async {
            out.diagnostics.push(
                Diagnostic::new(
                    DiagnosticId::AsyncTupleElement,
                    eco_format!(
                        "Handler '{}' returns a tuple whose first element is awaitable",
                        record.display_name()
                    ),
                    record.location.clone(),
                )
                .with_hint("make the handler async and return the tuple from the awaited result"),
            );
            continue;
        }
        valid.push(record);
    }

    for record in &valid {
        let rivals: Vec<&HandlerRecord> = valid
            .iter()
            .filter(|other| other.message.key == record.message.key)
            .collect();
        if rivals.len() == 1 {
            out.handlers.push(record.clone());
            continue;
        }
        let names: Vec<EcoString> = rivals.iter().map(|r| r.method_name.clone()).collect();
        out.diagnostics.push(
            Diagnostic::new(
                DiagnosticId::DuplicateHandlerMethod,
                eco_format!(
                    "Handler type '{}' has more than one method handling '{}': {}",
                    record.handler_type,
                    record.message.key,
                    names.join(", ")
                ),
                record.location.clone(),
            )
            .with_related(
                rivals
                    .iter()
                    .filter(|r| !std::ptr::eq(**r, record))
                    .filter_map(|r| r.location.clone()),
            ),
        );
    }

    out
}

fn build_record(
    ctx: &AnalysisContext<'_>,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    ty: &TypeSymbol,
    method: &MethodSymbol,
    origin: &Origin,
) -> Option<HandlerRecord> {
    let config = ctx.config;
    let message_index = method
        .parameters
        .iter()
        .position(|p| classifier::is_message_parameter(p, config))?;
    let message_ty = method.parameters[message_index]
        .ty
        .canonical()
        .non_nullable()
        .clone();

    let generic_parameters: Vec<GenericParameter> = method
        .type_parameters
        .iter()
        .map(|p| GenericParameter {
            name: p.name.clone(),
            constraints: p.constraints.iter().map(TypeRef::canonical).collect(),
        })
        .collect();

    let kind = match &message_ty {
        TypeRef::TypeParameter { name, constraints } => {
            let mut all = constraints.clone();
            if let Some(declared) = generic_parameters.iter().find(|p| p.name == *name) {
                for constraint in &declared.constraints {
                    if !all.contains(constraint) {
                        all.push(constraint.clone());
                    }
                }
            }
            MessageKind::TypeParameter { constraints: all }
        }
        ty_ref if ty_ref.contains_type_parameter() => MessageKind::OpenGeneric {
            definition: ty_ref.definition_name()?,
        },
        _ => MessageKind::Exact,
    };

    let parameters: Vec<RecordParameter> = method
        .parameters
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let role = if index == message_index {
                ParameterRole::Message
            } else if classifier::is_cancellation_token(&p.ty) {
                ParameterRole::CancellationToken
            } else if classifier::is_service_provider(&p.ty, config) {
                ParameterRole::ServiceProvider
            } else {
                ParameterRole::Dependency {
                    optional: p.ty.is_nullable() || p.default_value.is_some(),
                }
            };
            RecordParameter {
                name: p.name.clone(),
                ty: p.ty.canonical(),
                shape: shape_of(shapes, &p.ty, config),
                role,
            }
        })
        .collect();

    let return_shape = classifier::classify_return(method, shapes, config);
    let message_chain = match kind {
        MessageKind::Exact => ctx.hierarchy.message_chain(&message_ty),
        _ => Vec::new(),
    };
    let is_public = ty.accessibility.is_public()
        && method.accessibility.is_public()
        && ctx.table.is_public(&message_ty)
        && ctx.table.is_public(&method.return_type);

    let mut explicit_middleware = explicit_middleware_from(&ty.attributes, config);
    for extra in explicit_middleware_from(&method.attributes, config) {
        if !explicit_middleware.iter().any(|m| m.key() == extra.key()) {
            explicit_middleware.push(extra);
        }
    }

    Some(HandlerRecord {
        handler_type: TypeRef::named(&ty.name).key(),
        origin: origin.clone(),
        message: MessageBinding {
            key: message_ty.key(),
            type_ref: message_ty,
            kind,
        },
        message_chain,
        method_name: method.name.clone(),
        generic_parameters,
        has_no_injected_dependencies: !parameters
            .iter()
            .any(|p| matches!(p.role, ParameterRole::Dependency { .. })),
        parameters,
        is_async: return_shape.is_async_wrapper,
        return_shape,
        is_static: method.is_static,
        explicit_middleware,
        declaration_index: 0,
        is_public,
        location: method.location.clone().or_else(|| ty.location.clone()),
    })
}

/// Middleware types named by explicit-middleware markers, in order.
pub(crate) fn explicit_middleware_from(
    attributes: &[AttributeData],
    config: &GeneratorConfig,
) -> Vec<TypeRef> {
    let mut types: Vec<TypeRef> = Vec::new();
    for attribute in attributes
        .iter()
        .filter(|a| a.is(&config.markers.use_middleware_attribute))
    {
        for ty in attribute.type_arguments() {
            let ty = ty.canonical();
            if !types.iter().any(|t| t.key() == ty.key()) {
                types.push(ty);
            }
        }
    }
    types
}
