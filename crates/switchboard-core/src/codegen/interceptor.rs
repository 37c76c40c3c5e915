// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Call-site interceptor emission.
//!
//! **DDD Context:** Code Generation
//!
//! For each source file with resolvable call sites, one file-local static
//! class holds an interceptor per site. An interceptor mirrors the exact
//! signature of the façade method it replaces, reads the dependency source
//! off the receiver, and forwards to a wrapper's typed entry or to a
//! publisher. Whatever cannot be forwarded faithfully is reported and left
//! to the façade's runtime path.

use super::csharp::{
    awaited, file_prologue, generated_code_attribute, render_name, render_type, string_literal,
};
use super::document::{Document, block, line, lines, text};
use super::handler_wrapper::WrapperRef;
use super::names::{hint_name, interceptor_method_name};
use super::{EmitNames, EntryPoint, GeneratedSource, members};
use crate::analysis::call_sites::{CallSiteRecord, DispatchKind, ResponseKind};
use crate::analysis::classifier;
use crate::analysis::type_shape::TypeShape;
use crate::analysis::type_hierarchy::TypeHierarchy;
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::docvec;
use crate::symbols::TypeRef;
use ecow::{EcoString, eco_format};
use tracing::{debug, instrument};

/// How an interceptor turns the wrapper's response into what the caller
/// declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseConversion {
    /// The caller expects nothing.
    Discard,
    /// The caller expects `object?`.
    Boxed,
    /// Same type, or implicitly convertible.
    Direct,
    /// The caller ignores a response the handler cannot supply; the
    /// interceptor runs the handler and returns the declared type's default.
    DefaultValue,
    /// A non-primary element of a cascading handler's tuple.
    TupleElement { field_name: EcoString, element_type: TypeRef },
}

/// What an interceptor forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InterceptTarget {
    Invoke {
        wrapper: WrapperRef,
        conversion: ResponseConversion,
    },
    Publish {
        /// `global::`-rooted publisher class.
        publisher: EcoString,
        has_sync_entry: bool,
    },
}

/// One interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterceptorPlan {
    pub site: CallSiteRecord,
    pub target: InterceptTarget,
}

/// Everything one interceptor file depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterceptorFilePlan {
    pub namespace: EcoString,
    pub class_name: EcoString,
    /// Interceptors in source order.
    pub interceptors: Vec<InterceptorPlan>,
    pub names: EmitNames,
}

/// Decides how the invoke site `site` forwards to `wrapper`.
///
/// # Errors
///
/// Returns a response-mismatch diagnostic when the caller's declared
/// response cannot be produced from the handler's, and a sync-over-async
/// diagnostic when a synchronous call would need to block on an
/// asynchronous pipeline.
pub fn plan_invoke(
    site: &CallSiteRecord,
    wrapper: &WrapperRef,
    hierarchy: &TypeHierarchy<'_>,
) -> Result<InterceptTarget, Diagnostic> {
    let conversion = match &site.response {
        ResponseKind::None => ResponseConversion::Discard,
        ResponseKind::Untyped => ResponseConversion::Boxed,
        ResponseKind::Typed(shape) => typed_conversion(site, wrapper, shape, hierarchy)?,
        ResponseKind::Discarded(shape) => {
            typed_conversion(site, wrapper, shape, hierarchy).unwrap_or(ResponseConversion::DefaultValue)
        }
    };

    let needs_await = wrapper.is_async || matches!(conversion, ResponseConversion::TupleElement { .. });
    if needs_await && !site.is_async_call {
        return Err(Diagnostic::new(
            DiagnosticId::SyncOverAsync,
            eco_format!(
                "Synchronous '{}' call reaches asynchronous handler '{}'",
                site.signature.method_name,
                wrapper.handler_display
            ),
            Some(site.location.clone()),
        )
        .with_hint("await the asynchronous overload instead"));
    }
    Ok(InterceptTarget::Invoke {
        wrapper: wrapper.clone(),
        conversion,
    })
}

/// How a handler response reaches a caller that declared `wanted`.
fn typed_conversion(
    site: &CallSiteRecord,
    wrapper: &WrapperRef,
    wanted: &TypeShape,
    hierarchy: &TypeHierarchy<'_>,
) -> Result<ResponseConversion, Diagnostic> {
    let Some(response) = &wrapper.response else {
        return Err(Diagnostic::new(
            DiagnosticId::ResponseMismatch,
            eco_format!(
                "Handler '{}' returns no value, but the call expects '{}'",
                wrapper.handler_display,
                wanted.display_name
            ),
            Some(site.location.clone()),
        ));
    };
    let target = &wanted.unwrapped_type;
    // `T?` of a value type has no implicit conversion to `T`.
    let narrows = response.is_nullable() && response.is_value_type() && !wanted.is_nullable;
    if !narrows
        && (response.key() == target.key() || hierarchy.is_assignable(response.non_nullable(), target))
    {
        return Ok(ResponseConversion::Direct);
    }
    if let Some(conversion) = tuple_element(wrapper, target) {
        return Ok(conversion);
    }
    Err(Diagnostic::new(
        DiagnosticId::ResponseMismatch,
        eco_format!(
            "Handler '{}' returns '{}', which is not '{}'",
            wrapper.handler_display,
            response,
            wanted.display_name
        ),
        Some(site.location.clone()),
    )
    .with_hint("the call falls back to runtime dispatch"))
}

/// Decides how the publish site `site` forwards to a publisher.
///
/// # Errors
///
/// Returns a sync-over-async diagnostic when the site is synchronous and
/// some target is not.
pub fn plan_publish(
    site: &CallSiteRecord,
    publisher: EcoString,
    has_sync_entry: bool,
) -> Result<InterceptTarget, Diagnostic> {
    if !site.is_async_call && !has_sync_entry {
        return Err(Diagnostic::new(
            DiagnosticId::SyncOverAsync,
            eco_format!(
                "Synchronous '{}' call reaches asynchronous handlers of '{}'",
                site.signature.method_name,
                site.message_key
            ),
            Some(site.location.clone()),
        ));
    }
    Ok(InterceptTarget::Publish {
        publisher,
        has_sync_entry,
    })
}

fn tuple_element(wrapper: &WrapperRef, wanted: &TypeRef) -> Option<ResponseConversion> {
    let Some(TypeRef::Tuple { elements }) = &wrapper.tuple else {
        return None;
    };
    let key = wanted.key();
    elements
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, e)| e.ty.key() == key)
        .map(|(index, e)| ResponseConversion::TupleElement {
            field_name: eco_format!("Item{}", index + 1),
            element_type: e.ty.non_nullable().clone(),
        })
}

/// Renders the interceptor class for one source file.
#[instrument(skip_all, fields(class = %plan.class_name, sites = plan.interceptors.len()))]
#[must_use]
pub fn render(plan: &InterceptorFilePlan) -> GeneratedSource {
    let methods: Vec<Document<'static>> = plan
        .interceptors
        .iter()
        .map(|interceptor| interceptor_method(plan, interceptor))
        .collect();
    let class = block(
        eco_format!("file static class {}", plan.class_name),
        members(methods),
    );
    let doc = docvec![
        file_prologue(),
        line(),
        block(
            eco_format!("namespace {}", plan.namespace),
            lines(vec![text(generated_code_attribute()), class]),
        ),
        line(),
    ];
    GeneratedSource::new(hint_name(&plan.class_name), doc.to_pretty_string())
}

/// `[InterceptsLocation]` in the host-encoded form when available,
/// path/line/column otherwise.
fn location_attribute(site: &CallSiteRecord) -> EcoString {
    match &site.interceptable {
        Some(location) => eco_format!(
            "[global::System.Runtime.CompilerServices.InterceptsLocation({}, {})]",
            location.version,
            string_literal(&location.data)
        ),
        None => eco_format!(
            "[global::System.Runtime.CompilerServices.InterceptsLocation({}, {}, {})]",
            string_literal(site.location.path.as_str()),
            site.location.line,
            site.location.column
        ),
    }
}

fn interceptor_method(plan: &InterceptorFilePlan, interceptor: &InterceptorPlan) -> Document<'static> {
    let site = &interceptor.site;
    let signature = &site.signature;

    let mut parameters = Vec::new();
    let receiver = if signature.is_extension {
        signature
            .parameters
            .first()
            .map_or_else(|| EcoString::from("mediator"), |p| p.name.clone())
    } else {
        parameters.push(eco_format!("this {} mediator", render_name(&signature.containing_type)));
        "mediator".into()
    };
    for (index, parameter) in signature.parameters.iter().enumerate() {
        let this = if signature.is_extension && index == 0 { "this " } else { "" };
        let default = parameter
            .default_value
            .as_ref()
            .map(|value| eco_format!(" = {value}"))
            .unwrap_or_default();
        parameters.push(eco_format!(
            "{this}{} {}{default}",
            render_type(&parameter.ty),
            parameter.name
        ));
    }

    let message = signature
        .parameters
        .get(signature.message_parameter)
        .map_or_else(|| EcoString::from("message"), |p| p.name.clone());
    let token = signature
        .parameters
        .iter()
        .find(|p| classifier::is_cancellation_token(&p.ty))
        .map_or_else(|| EcoString::from("default"), |p| p.name.clone());
    let arguments = CallArguments {
        provider: eco_format!("{receiver}.{}", plan.names.service_provider_property),
        message: eco_format!("({}){message}", render_type(&site.message_type)),
        token,
    };

    let body = match &interceptor.target {
        InterceptTarget::Invoke { wrapper, conversion } => {
            invoke_body(plan, wrapper, conversion, &arguments)
        }
        InterceptTarget::Publish { publisher, .. } => {
            if site.is_async_call {
                vec![text(eco_format!(
                    "{};",
                    awaited(&eco_format!("{publisher}.PublishAsync({})", arguments.joined()))
                ))]
            } else {
                vec![text(eco_format!("{publisher}.Publish({});", arguments.joined()))]
            }
        }
    };
    debug!(site = %site.location, method = %signature.method_name, "Rendering interceptor");

    let modifier = if site.is_async_call { "async " } else { "" };
    let header = eco_format!(
        "public static {modifier}{} {}({})",
        render_type(&signature.return_type),
        interceptor_method_name(&signature.method_name, &site.fingerprint),
        parameters.join(", ")
    );
    docvec![location_attribute(site), line(), block(header, lines(body))]
}

/// The three arguments every wrapper and publisher entry takes.
struct CallArguments {
    provider: EcoString,
    message: EcoString,
    token: EcoString,
}

impl CallArguments {
    fn joined(&self) -> EcoString {
        eco_format!("{}, {}, {}", self.provider, self.message, self.token)
    }
}

fn invoke_body(
    plan: &InterceptorFilePlan,
    wrapper: &WrapperRef,
    conversion: &ResponseConversion,
    arguments: &CallArguments,
) -> Vec<Document<'static>> {
    let call = {
        let call = eco_format!("{}({})", wrapper.method_path(EntryPoint::Typed), arguments.joined());
        if wrapper.is_async { awaited(&call) } else { call }
    };
    match conversion {
        ResponseConversion::Discard => vec![text(eco_format!("{call};"))],
        ResponseConversion::DefaultValue => vec![
            text(eco_format!("{call};")),
            Document::Str("return default!;"),
        ],
        ResponseConversion::Boxed if wrapper.response.is_none() => vec![
            text(eco_format!("{call};")),
            text(eco_format!("return {}.Value;", render_name(&plan.names.runtime.unit))),
        ],
        ResponseConversion::Boxed | ResponseConversion::Direct => vec![text(eco_format!("return {call};"))],
        ResponseConversion::TupleElement {
            field_name,
            element_type,
        } => vec![
            text(eco_format!(
                "var tuple = {};",
                awaited(&eco_format!("{}.HandleTupleAsync({})", wrapper.class_path, arguments.joined()))
            )),
            text(eco_format!(
                "{};",
                awaited(&eco_format!(
                    "{}.CascadeAsync({}, tuple, {})",
                    wrapper.class_path,
                    arguments.provider,
                    arguments.token
                ))
            )),
            text(eco_format!("return ({})tuple.{field_name}!;", render_type(element_type))),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::call_sites::InvokedSignature;
    use crate::config::{GeneratorConfig, RuntimeNames};
    use crate::symbols::{
        InterceptableLocation, ParameterSymbol, SourceLocation, Span, SymbolTable, TupleElementRef,
    };
    use crate::test_helpers::{class, compilation_with};

    fn site(response: ResponseKind, is_async_call: bool) -> CallSiteRecord {
        let location = SourceLocation::new("src/Orders/Program.cs", Span::new(120, 160), 12, 23);
        let return_type = match (&response, is_async_call) {
            (ResponseKind::Typed(shape), true) => TypeRef::generic_value(
                "System.Threading.Tasks.ValueTask",
                shape.value_type().into_iter().collect(),
            ),
            (ResponseKind::Typed(shape), false) => shape.value_type().unwrap_or_else(TypeRef::void),
            (_, true) => TypeRef::value("System.Threading.Tasks.ValueTask"),
            (_, false) => TypeRef::void(),
        };
        let mut token = ParameterSymbol::new("cancellationToken", TypeRef::value("System.Threading.CancellationToken"));
        token.default_value = Some("default".into());
        CallSiteRecord {
            fingerprint: location.fingerprint(),
            interceptable: None,
            message_type: TypeRef::named("Demo.GetOrder"),
            message_key: "Demo.GetOrder".into(),
            is_open: false,
            response,
            kind: DispatchKind::Invoke,
            is_async_call,
            is_awaited: is_async_call,
            signature: InvokedSignature {
                receiver_type: TypeRef::named("Switchboard.IMediator"),
                containing_type: "Switchboard.IMediator".into(),
                method_name: if is_async_call { "InvokeAsync".into() } else { "Invoke".into() },
                type_arguments: vec![],
                parameters: vec![ParameterSymbol::new("message", TypeRef::object()), token],
                return_type,
                is_extension: false,
                message_parameter: 0,
            },
            location,
        }
    }

    fn shape(ty: &TypeRef) -> TypeShape {
        TypeShape::resolve(ty, &RuntimeNames::default())
    }

    fn typed(name: &str) -> ResponseKind {
        ResponseKind::Typed(shape(&TypeRef::named(name)))
    }

    fn int() -> TypeRef {
        TypeRef::value("System.Int32")
    }

    fn wrapper(response: Option<TypeRef>, is_async: bool) -> WrapperRef {
        WrapperRef {
            class_path: "global::Switchboard.Generated.Demo.GetOrderHandler_GetOrder_Handler".into(),
            message_type: TypeRef::named("Demo.GetOrder"),
            is_async,
            response,
            tuple: None,
            handler_display: "Demo.GetOrderHandler.HandleAsync".into(),
        }
    }

    fn file(interceptors: Vec<InterceptorPlan>) -> InterceptorFilePlan {
        InterceptorFilePlan {
            namespace: "Switchboard.Generated.Demo".into(),
            class_name: "Program_0a1b2c3d_Interceptors".into(),
            interceptors,
            names: EmitNames::from_config(&GeneratorConfig::default()),
        }
    }

    fn hierarchy_check(check: impl FnOnce(&TypeHierarchy<'_>)) {
        let compilation = compilation_with(vec![class("Demo.GetOrder"), class("Demo.Order"), class("Demo.OrderCreated")]);
        let table = SymbolTable::build(&compilation);
        check(&TypeHierarchy::new(&table));
    }

    #[test]
    fn typed_invoke_forwards_to_the_typed_entry() {
        hierarchy_check(|hierarchy| {
            let site = site(typed("Demo.Order"), true);
            let target = plan_invoke(&site, &wrapper(Some(TypeRef::named("Demo.Order")), true), hierarchy).unwrap();
            let text = render(&file(vec![InterceptorPlan { site: site.clone(), target }])).text;

            assert!(text.contains("file static class Program_0a1b2c3d_Interceptors"));
            assert!(text.contains(
                "[global::System.Runtime.CompilerServices.InterceptsLocation(\"src/Orders/Program.cs\", 12, 23)]"
            ));
            assert!(text.contains(&format!(
                "public static async global::System.Threading.Tasks.ValueTask<global::Demo.Order> InterceptInvokeAsync_{}(this global::Switchboard.IMediator mediator, object message, global::System.Threading.CancellationToken cancellationToken = default)",
                site.fingerprint
            )));
            assert!(text.contains(
                "return await global::Switchboard.Generated.Demo.GetOrderHandler_GetOrder_Handler.HandleAsync(mediator.ServiceProvider, (global::Demo.GetOrder)message, cancellationToken).ConfigureAwait(false);"
            ));
        });
    }

    #[test]
    fn host_location_token_is_preferred() {
        let mut site = site(ResponseKind::None, true);
        site.interceptable = Some(InterceptableLocation { version: 1, data: "AbCd==".into() });
        assert_eq!(
            location_attribute(&site),
            "[global::System.Runtime.CompilerServices.InterceptsLocation(1, \"AbCd==\")]"
        );
    }

    #[test]
    fn void_handler_behind_untyped_call_returns_unit() {
        hierarchy_check(|hierarchy| {
            let site = site(ResponseKind::Untyped, true);
            let target = plan_invoke(&site, &wrapper(None, true), hierarchy).unwrap();
            let text = render(&file(vec![InterceptorPlan { site, target }])).text;
            assert!(text.contains("return global::Switchboard.Unit.Value;"));
        });
    }

    #[test]
    fn mismatched_response_is_reported() {
        hierarchy_check(|hierarchy| {
            let site = site(typed("Demo.OrderCreated"), true);
            let error = plan_invoke(&site, &wrapper(Some(TypeRef::named("Demo.Order")), true), hierarchy).unwrap_err();
            assert_eq!(error.id, DiagnosticId::ResponseMismatch);

            let error = plan_invoke(&site, &wrapper(None, true), hierarchy).unwrap_err();
            assert_eq!(error.id, DiagnosticId::ResponseMismatch);
        });
    }

    #[test]
    fn discarded_response_of_a_void_handler_returns_default() {
        hierarchy_check(|hierarchy| {
            let mut site = site(typed("Demo.Order"), true);
            site.response = ResponseKind::Discarded(shape(&TypeRef::named("Demo.Order")));
            let target = plan_invoke(&site, &wrapper(None, true), hierarchy).unwrap();
            let text = render(&file(vec![InterceptorPlan { site, target }])).text;

            assert!(text.contains("public static async global::System.Threading.Tasks.ValueTask<global::Demo.Order> InterceptInvokeAsync_"));
            assert!(text.contains(
                "await global::Switchboard.Generated.Demo.GetOrderHandler_GetOrder_Handler.HandleAsync(mediator.ServiceProvider, (global::Demo.GetOrder)message, cancellationToken).ConfigureAwait(false);"
            ));
            assert!(text.contains("return default!;"));
            assert!(!text.contains("Unit.Value"));
        });
    }

    #[test]
    fn discarded_response_of_a_matching_handler_is_returned() {
        hierarchy_check(|hierarchy| {
            let mut site = site(typed("Demo.Order"), true);
            site.response = ResponseKind::Discarded(shape(&TypeRef::named("Demo.Order")));
            let target = plan_invoke(&site, &wrapper(Some(TypeRef::named("Demo.Order")), true), hierarchy).unwrap();
            assert!(matches!(
                target,
                InterceptTarget::Invoke { conversion: ResponseConversion::Direct, .. }
            ));
        });
    }

    #[test]
    fn nullable_value_response_does_not_satisfy_a_non_nullable_call() {
        hierarchy_check(|hierarchy| {
            let mut site = site(ResponseKind::Typed(shape(&int())), true);
            let error = plan_invoke(&site, &wrapper(Some(int().nullable()), true), hierarchy).unwrap_err();
            assert_eq!(error.id, DiagnosticId::ResponseMismatch);
            assert!(error.message.contains("System.Int32"));

            site.response = ResponseKind::Discarded(shape(&int()));
            let target = plan_invoke(&site, &wrapper(Some(int().nullable()), true), hierarchy).unwrap();
            assert!(matches!(
                target,
                InterceptTarget::Invoke { conversion: ResponseConversion::DefaultValue, .. }
            ));
        });
    }

    #[test]
    fn value_response_widens_to_a_nullable_call() {
        hierarchy_check(|hierarchy| {
            let site = site(ResponseKind::Typed(shape(&int().nullable())), true);
            let target = plan_invoke(&site, &wrapper(Some(int()), true), hierarchy).unwrap();
            let InterceptTarget::Invoke { conversion, .. } = &target else {
                panic!("expected an invoke target");
            };
            assert_eq!(*conversion, ResponseConversion::Direct);
            let text = render(&file(vec![InterceptorPlan { site, target }])).text;
            assert!(text.contains("ValueTask<global::System.Int32?> InterceptInvokeAsync_"));
            assert!(text.contains("return await global::Switchboard.Generated.Demo.GetOrderHandler_GetOrder_Handler.HandleAsync("));
        });
    }

    #[test]
    fn tuple_elements_can_be_requested() {
        hierarchy_check(|hierarchy| {
            let site = site(typed("Demo.OrderCreated"), true);
            let mut cascading = wrapper(Some(TypeRef::named("Demo.Order")), true);
            cascading.tuple = Some(TypeRef::tuple(vec![
                TupleElementRef::new(None, TypeRef::named("Demo.Order")),
                TupleElementRef::new(None, TypeRef::named("Demo.OrderCreated").nullable()),
            ]));
            let target = plan_invoke(&site, &cascading, hierarchy).unwrap();
            let InterceptTarget::Invoke { conversion, .. } = &target else {
                panic!("expected an invoke target");
            };
            assert_eq!(
                *conversion,
                ResponseConversion::TupleElement {
                    field_name: "Item2".into(),
                    element_type: TypeRef::named("Demo.OrderCreated"),
                }
            );
            let text = render(&file(vec![InterceptorPlan { site, target }])).text;
            assert!(text.contains("HandleTupleAsync(mediator.ServiceProvider, (global::Demo.GetOrder)message, cancellationToken)"));
            assert!(text.contains("CascadeAsync(mediator.ServiceProvider, tuple, cancellationToken)"));
            assert!(text.contains("return (global::Demo.OrderCreated)tuple.Item2!;"));
        });
    }

    #[test]
    fn sync_call_to_async_pipeline_is_reported() {
        hierarchy_check(|hierarchy| {
            let site = site(typed("Demo.Order"), false);
            let error = plan_invoke(&site, &wrapper(Some(TypeRef::named("Demo.Order")), true), hierarchy).unwrap_err();
            assert_eq!(error.id, DiagnosticId::SyncOverAsync);

            let ok = plan_invoke(&site, &wrapper(Some(TypeRef::named("Demo.Order")), false), hierarchy).unwrap();
            let text = render(&file(vec![InterceptorPlan { site, target: ok }])).text;
            assert!(text.contains("public static global::Demo.Order InterceptInvoke_"));
            assert!(text.contains("return global::Switchboard.Generated.Demo.GetOrderHandler_GetOrder_Handler.Handle(mediator.ServiceProvider, (global::Demo.GetOrder)message, cancellationToken);"));
        });
    }

    #[test]
    fn publish_sites_forward_to_the_publisher() {
        let mut publish = site(ResponseKind::None, true);
        publish.kind = DispatchKind::Publish;
        publish.signature.method_name = "PublishAsync".into();
        let target = plan_publish(&publish, "global::Switchboard.Generated.Demo.GetOrder_Publisher".into(), false).unwrap();
        let text = render(&file(vec![InterceptorPlan { site: publish.clone(), target }])).text;
        assert!(text.contains("await global::Switchboard.Generated.Demo.GetOrder_Publisher.PublishAsync(mediator.ServiceProvider, (global::Demo.GetOrder)message, cancellationToken).ConfigureAwait(false);"));

        publish.is_async_call = false;
        let error = plan_publish(&publish, "global::X".into(), false).unwrap_err();
        assert_eq!(error.id, DiagnosticId::SyncOverAsync);
    }
}
