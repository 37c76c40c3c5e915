// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Call-site resolver.
//!
//! **DDD Context:** Analysis
//!
//! Turns invocation expressions against the façade's invoke and publish
//! methods into [`CallSiteRecord`]s. Everything here is derived from the
//! invocation's own syntax node plus the symbol table, so a record only
//! changes when that expression (or a type it names) changes.

use super::{AnalysisContext, classifier, shape_of, type_shape::TypeShape};
use crate::cache::MemoTable;
use crate::cancellation::{CancellationToken, Cancelled};
use crate::symbols::{
    InterceptableLocation, InvocationSyntax, LocationFingerprint, ParameterSymbol, SourceLocation,
    TypeRef,
};
use ecow::EcoString;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Single-target or broadcast dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DispatchKind {
    Invoke,
    Publish,
}

/// What the caller expects back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// No response (`void`, non-generic task, or a publish).
    None,
    /// A boxed `object?`.
    Untyped,
    /// A specific response type the caller ignores. The façade method still
    /// declares it, so the interceptor must return something of that type.
    Discarded(TypeShape),
    /// A specific response type.
    Typed(TypeShape),
}

impl ResponseKind {
    #[must_use]
    pub fn typed(&self) -> Option<&TypeShape> {
        match self {
            ResponseKind::Typed(shape) => Some(shape),
            _ => None,
        }
    }
}

/// The invoked façade method, as the interceptor must mirror it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokedSignature {
    pub receiver_type: TypeRef,
    pub containing_type: EcoString,
    pub method_name: EcoString,
    pub type_arguments: Vec<TypeRef>,
    pub parameters: Vec<ParameterSymbol>,
    pub return_type: TypeRef,
    pub is_extension: bool,
    /// Index of the parameter carrying the message.
    pub message_parameter: usize,
}

/// One resolved call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteRecord {
    pub fingerprint: LocationFingerprint,
    pub location: SourceLocation,
    pub interceptable: Option<InterceptableLocation>,
    /// Static type of the message argument.
    pub message_type: TypeRef,
    pub message_key: EcoString,
    /// The static type is an interface or abstract class.
    pub is_open: bool,
    pub response: ResponseKind,
    pub kind: DispatchKind,
    /// The façade method returns an awaitable.
    pub is_async_call: bool,
    pub is_awaited: bool,
    pub signature: InvokedSignature,
}

/// Resolves every façade invocation, in syntax order, one record per
/// fingerprint.
///
/// # Errors
///
/// Returns [`Cancelled`] if `cancel` fires.
#[instrument(skip_all, fields(invocations = ctx.table.compilation().invocations.len()))]
pub fn resolve_call_sites(
    ctx: &AnalysisContext<'_>,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    cancel: &CancellationToken,
) -> Result<Vec<CallSiteRecord>, Cancelled> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for invocation in &ctx.table.compilation().invocations {
        cancel.check()?;
        let Some(record) = resolve_call_site(ctx, shapes, invocation) else {
            continue;
        };
        if seen.insert(record.fingerprint.clone()) {
            records.push(record);
        }
    }
    info!(count = records.len(), "Call-site resolution complete");
    Ok(records)
}

/// Resolves one invocation, or `None` when it is not an interceptable
/// façade call.
#[must_use]
pub fn resolve_call_site(
    ctx: &AnalysisContext<'_>,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    invocation: &InvocationSyntax,
) -> Option<CallSiteRecord> {
    let facade = &ctx.config.facade;
    let method = &invocation.method;

    let kind = if facade.invoke_methods.contains(&method.name) {
        DispatchKind::Invoke
    } else if facade.publish_methods.contains(&method.name) {
        DispatchKind::Publish
    } else {
        return None;
    };
    let mediator = TypeRef::named(&facade.mediator_interface);
    if invocation.receiver_type.contains_error()
        || !ctx.hierarchy.is_assignable(&invocation.receiver_type, &mediator)
    {
        return None;
    }

    let skip = usize::from(method.is_extension);
    let message_parameter = method
        .parameters
        .iter()
        .enumerate()
        .skip(skip)
        .find(|(_, p)| !classifier::is_cancellation_token(&p.ty))
        .map(|(index, _)| index)?;
    let parameter_name = &method.parameters[message_parameter].name;

    let Some(message_type) = invocation
        .arguments
        .iter()
        .find(|a| a.parameter == *parameter_name)
        .and_then(|a| a.static_type.as_ref())
        .map(|ty| ty.canonical().non_nullable().clone())
    else {
        debug!(location = %invocation.location, "Message argument has no static type; skipped");
        return None;
    };
    if message_type.is_object()
        || message_type.contains_error()
        || message_type.contains_type_parameter()
    {
        debug!(location = %invocation.location, message = %message_type, "Message type is not statically known; skipped");
        return None;
    }

    let return_shape = shape_of(shapes, &method.return_type, ctx.config);
    let response = match kind {
        DispatchKind::Publish => ResponseKind::None,
        DispatchKind::Invoke => match return_shape.value_type() {
            None => ResponseKind::None,
            Some(_) if return_shape.is_object => ResponseKind::Untyped,
            Some(value) if !invocation.result_used => {
                ResponseKind::Discarded(shape_of(shapes, &value, ctx.config))
            }
            Some(value) => ResponseKind::Typed(shape_of(shapes, &value, ctx.config)),
        },
    };

    Some(CallSiteRecord {
        fingerprint: invocation.location.fingerprint(),
        location: invocation.location.clone(),
        interceptable: invocation.interceptable.clone(),
        message_key: message_type.key(),
        is_open: ctx.table.is_abstraction(&message_type),
        message_type,
        response,
        kind,
        is_async_call: return_shape.is_async_wrapper,
        is_awaited: invocation.is_awaited,
        signature: InvokedSignature {
            receiver_type: invocation.receiver_type.canonical(),
            containing_type: method.containing_type.clone(),
            method_name: method.name.clone(),
            type_arguments: method.type_arguments.iter().map(TypeRef::canonical).collect(),
            parameters: method.parameters.clone(),
            return_type: method.return_type.canonical(),
            is_extension: method.is_extension,
            message_parameter,
        },
    })
}
