// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Broadcast publisher emission.
//!
//! **DDD Context:** Code Generation
//!
//! A publisher invokes every handler of one message type through its
//! wrapper, one after another. A failing handler does not stop the rest;
//! failures are collected and rethrown together once every handler has
//! run. A publisher with no compile-time targets forwards to the façade so
//! handlers registered at run time still see the message.

use super::csharp::{
    awaited, file_prologue, generated_code_attribute, render_name, render_type, required_service,
    string_literal,
};
use super::document::{Document, block, line, lines, text};
use super::handler_wrapper::WrapperRef;
use super::names::hint_name;
use super::{EmitNames, EntryPoint, GeneratedSource, members};
use crate::docvec;
use crate::symbols::{TypeRef, well_known};
use ecow::{EcoString, eco_format};
use tracing::instrument;

/// Everything one publisher file depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublisherPlan {
    pub namespace: EcoString,
    pub class_name: EcoString,
    pub message_type: TypeRef,
    /// Wrappers to invoke, in dispatch order.
    pub targets: Vec<WrapperRef>,
    pub names: EmitNames,
}

impl PublisherPlan {
    /// A synchronous `Publish` is offered when no target needs awaiting.
    #[must_use]
    pub fn has_sync_entry(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(|t| !t.is_async)
    }

    /// `global::`-rooted publisher class.
    #[must_use]
    pub fn class_path(&self) -> EcoString {
        eco_format!("global::{}.{}", self.namespace, self.class_name)
    }
}

/// Renders the publisher class for `plan`.
#[instrument(skip_all, fields(class = %plan.class_name, targets = plan.targets.len()))]
#[must_use]
pub fn render(plan: &PublisherPlan) -> GeneratedSource {
    let mut body = vec![docvec![
        "public const string MessageTypeKey = ",
        string_literal(&plan.message_type.key()),
        ";"
    ]];
    if plan.targets.is_empty() {
        body.push(forwarding_entry(plan));
    } else if plan.has_sync_entry() {
        body.push(sync_entry(plan));
        body.push(async_over_sync_entry(plan));
    } else {
        body.push(async_entry(plan));
    }

    let class = block(
        eco_format!("internal static class {}", plan.class_name),
        members(body),
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

fn parameters(plan: &PublisherPlan) -> EcoString {
    eco_format!(
        "{} serviceProvider, {} message, global::System.Threading.CancellationToken cancellationToken = default",
        render_name(&plan.names.service_provider_type),
        render_type(&plan.message_type)
    )
}

fn exception_list() -> EcoString {
    eco_format!("global::{}<global::{}>", well_known::LIST, well_known::EXCEPTION)
}

/// Runs `calls` one by one, collecting exceptions, then rethrows them together.
fn collect_failures(calls: Vec<EcoString>) -> Vec<Document<'static>> {
    let list = exception_list();
    let mut body = vec![text(eco_format!("{list}? exceptions = null;"))];
    for call in calls {
        body.push(block("try", lines(vec![text(eco_format!("{call};"))])));
        body.push(block(
            eco_format!("catch (global::{} ex)", well_known::EXCEPTION),
            lines(vec![text(eco_format!("(exceptions ??= new {list}()).Add(ex);"))]),
        ));
    }
    body.push(block(
        "if (exceptions is not null)",
        lines(vec![text(eco_format!(
            "throw new global::{}(exceptions);",
            well_known::AGGREGATE_EXCEPTION
        ))]),
    ));
    body
}

fn target_call(target: &WrapperRef) -> EcoString {
    let call = eco_format!(
        "{}(serviceProvider, message, cancellationToken)",
        target.method_path(EntryPoint::Typed)
    );
    if target.is_async { awaited(&call) } else { call }
}

fn async_entry(plan: &PublisherPlan) -> Document<'static> {
    let calls = plan.targets.iter().map(target_call).collect();
    block(
        eco_format!(
            "public static async global::System.Threading.Tasks.ValueTask PublishAsync({})",
            parameters(plan)
        ),
        lines(collect_failures(calls)),
    )
}

fn sync_entry(plan: &PublisherPlan) -> Document<'static> {
    let calls = plan.targets.iter().map(target_call).collect();
    block(
        eco_format!("public static void Publish({})", parameters(plan)),
        lines(collect_failures(calls)),
    )
}

fn async_over_sync_entry(plan: &PublisherPlan) -> Document<'static> {
    block(
        eco_format!(
            "public static global::System.Threading.Tasks.ValueTask PublishAsync({})",
            parameters(plan)
        ),
        lines(vec![
            text("Publish(serviceProvider, message, cancellationToken);"),
            text("return default;"),
        ]),
    )
}

/// Hands the message to the façade's runtime path.
fn forwarding_entry(plan: &PublisherPlan) -> Document<'static> {
    let mediator = required_service(
        &plan.names,
        &TypeRef::named(&plan.names.mediator_interface),
        "serviceProvider",
    );
    block(
        eco_format!(
            "public static async global::System.Threading.Tasks.ValueTask PublishAsync({})",
            parameters(plan)
        ),
        lines(vec![text(eco_format!(
            "await {mediator}.{}(message, cancellationToken).ConfigureAwait(false);",
            plan.names.publish_async_method
        ))]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn target(class: &str, is_async: bool) -> WrapperRef {
        WrapperRef {
            class_path: eco_format!("global::Switchboard.Generated.Demo.{class}"),
            message_type: TypeRef::named("Demo.OrderCreated"),
            is_async,
            response: None,
            tuple: None,
            handler_display: eco_format!("Demo.{class}.Handle"),
        }
    }

    fn plan(targets: Vec<WrapperRef>) -> PublisherPlan {
        PublisherPlan {
            namespace: "Switchboard.Generated.Demo".into(),
            class_name: "OrderCreated_Publisher".into(),
            message_type: TypeRef::named("Demo.OrderCreated"),
            targets,
            names: EmitNames::from_config(&GeneratorConfig::default()),
        }
    }

    #[test]
    fn every_handler_runs_and_failures_aggregate() {
        let source = render(&plan(vec![
            target("EmailHandler_OrderCreated_Handler", true),
            target("AuditHandler_OrderCreated_Handler", false),
        ]));
        let text = &source.text;
        assert_eq!(source.hint_name, "OrderCreated_Publisher.g.cs");
        assert!(text.contains("public static async global::System.Threading.Tasks.ValueTask PublishAsync("));
        let email = text
            .find("await global::Switchboard.Generated.Demo.EmailHandler_OrderCreated_Handler.HandleAsync(serviceProvider, message, cancellationToken).ConfigureAwait(false);")
            .unwrap();
        let audit = text
            .find("global::Switchboard.Generated.Demo.AuditHandler_OrderCreated_Handler.Handle(serviceProvider, message, cancellationToken);")
            .unwrap();
        assert!(email < audit);
        assert_eq!(text.matches("catch (global::System.Exception ex)").count(), 2);
        assert!(text.contains("throw new global::System.AggregateException(exceptions);"));
        assert!(!text.contains("public static void Publish("));
    }

    #[test]
    fn all_sync_targets_add_a_sync_entry() {
        let plan = plan(vec![target("AuditHandler_OrderCreated_Handler", false)]);
        assert!(plan.has_sync_entry());
        let text = render(&plan).text;
        assert!(text.contains("public static void Publish("));
        assert!(text.contains("Publish(serviceProvider, message, cancellationToken);\n"));
    }

    #[test]
    fn no_targets_forward_to_the_facade() {
        let plan = plan(vec![]);
        assert!(!plan.has_sync_entry());
        let text = render(&plan).text;
        assert!(text.contains(
            "await global::Microsoft.Extensions.DependencyInjection.ServiceProviderServiceExtensions.GetRequiredService<global::Switchboard.IMediator>(serviceProvider).PublishAsync(message, cancellationToken).ConfigureAwait(false);"
        ));
    }
}
