// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! End-to-end generation tests.
//!
//! Compilations are written the way a build host hands them over: as JSON
//! symbol snapshots. Larger scenarios live in `tests/fixtures/`; small ones
//! are built inline with `serde_json::json!`.

use camino::Utf8PathBuf;
use serde_json::{Value, json};
use std::fs;
use switchboard_core::{
    CancellationToken, Compilation, DiagnosticId, GeneratedSource, Generator, GeneratorConfig,
    GeneratorOutput, find_config, generate,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Routes generator logs to the test output; `RUST_LOG=switchboard_core=debug`
/// shows discovery decisions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> Compilation {
    init_tracing();
    let path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let json = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture '{name}' at {path}: {e}"));
    Compilation::from_json(&json).unwrap_or_else(|e| panic!("Fixture '{name}' is invalid: {e}"))
}

fn run(compilation: &Compilation) -> GeneratorOutput {
    generate(compilation, &GeneratorConfig::default(), &CancellationToken::new()).unwrap()
}

fn interceptors(output: &GeneratorOutput) -> &GeneratedSource {
    output
        .sources
        .iter()
        .find(|s| s.hint_name.ends_with("_Interceptors.g.cs"))
        .expect("an interceptor file")
}

/// Generated text with indentation removed, for matching whole blocks.
fn unindented(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

fn ids(output: &GeneratorOutput) -> Vec<DiagnosticId> {
    output.diagnostics.iter().map(|d| d.id).collect()
}

// ============================================================================
// JSON builders
// ============================================================================

fn named(name: &str) -> Value {
    json!({ "kind": "named", "name": name })
}

fn void() -> Value {
    named("System.Void")
}

fn method(name: &str, message: &str, return_type: Value) -> Value {
    json!({
        "name": name,
        "parameters": [{ "name": "message", "ty": named(message) }],
        "return_type": return_type,
    })
}

fn invoke(message: &str, start: u32) -> Value {
    json!({
        "location": { "path": "src/Program.cs", "span": { "start": start, "end": start + 30 }, "line": 5, "column": 9 },
        "receiver_type": named("Switchboard.IMediator"),
        "method": {
            "containing_type": "Switchboard.IMediator",
            "name": "InvokeAsync",
            "parameters": [
                { "name": "message", "ty": named("System.Object") },
                {
                    "name": "cancellationToken",
                    "ty": { "kind": "named", "name": "System.Threading.CancellationToken", "value_type": true },
                    "default_value": "default"
                }
            ],
            "return_type": { "kind": "named", "name": "System.Threading.Tasks.ValueTask", "value_type": true }
        },
        "arguments": [{ "parameter": "message", "static_type": named(message) }],
        "is_awaited": true
    })
}

/// `InvokeAsync<response>(message)`.
fn invoke_expecting(message: &str, response: &Value, start: u32) -> Value {
    let mut call = invoke(message, start);
    call["method"]["type_arguments"] = json!([response]);
    call["method"]["return_type"] = json!({
        "kind": "named",
        "name": "System.Threading.Tasks.ValueTask",
        "args": [response],
        "value_type": true
    });
    call
}

fn task_of(value: &Value) -> Value {
    json!({ "kind": "named", "name": "System.Threading.Tasks.Task", "args": [value] })
}

fn int() -> Value {
    json!({ "kind": "named", "name": "int" })
}

fn nullable(inner: &Value) -> Value {
    json!({ "kind": "nullable", "inner": inner })
}

fn compilation(value: &Value) -> Compilation {
    init_tracing();
    serde_json::from_value(value.clone()).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn single_handler_call_is_intercepted() {
    let output = run(&fixture("single_handler.json"));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let wrapper = output.source("PingHandler_Ping_Handler.g.cs").unwrap();
    assert!(wrapper.text.starts_with("// <auto-generated/>"));
    assert!(wrapper.text.contains("public const string MessageTypeKey = \"Demo.Ping\";"));

    let text = &interceptors(&output).text;
    assert!(text.contains("[global::System.Runtime.CompilerServices.InterceptsLocation(1, \"AAAAAHgAAAA=\")]"));
    assert!(text.contains("PingHandler_Ping_Handler.HandleAsync(mediator.ServiceProvider, (global::Demo.Ping)message, cancellationToken).ConfigureAwait(false);"));
    assert!(text.contains("global::System.Threading.CancellationToken cancellationToken = default"));

    assert!(output.source("InterceptsLocationAttribute.g.cs").is_some());
    let registry = output.source("SwitchboardHandlerRegistry.g.cs").unwrap();
    assert!(registry.text.contains("\"Demo.Ping\", typeof(global::Demo.Ping)"));
}

#[test]
fn rerunning_is_byte_identical() {
    let compilation = fixture("single_handler.json");
    let mut generator = Generator::new(GeneratorConfig::default());
    let token = CancellationToken::new();
    let first = generator.run(&compilation, &token).unwrap();
    let second = generator.run(&compilation, &token).unwrap();
    assert_eq!(first, second);
    assert_eq!(generator.cache_stats().sources.misses, 0);

    let fresh = run(&compilation);
    assert_eq!(first, fresh);
}

#[test]
fn json_snapshot_survives_a_round_trip() {
    let compilation = fixture("cascade.json");
    let reparsed = Compilation::from_json(&compilation.to_json().unwrap()).unwrap();
    assert_eq!(run(&compilation), run(&reparsed));
}

#[test]
fn cascading_results_are_published() {
    let output = run(&fixture("cascade.json"));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let publisher = output.source("OrderPlaced_Publisher.g.cs").unwrap();
    let receipt = publisher.text.find("ReceiptHandler_OrderPlaced_Handler").unwrap();
    let inventory = publisher.text.find("InventoryHandler_OrderPlaced_Handler").unwrap();
    let audit = publisher.text.find("AuditHandler_OrderPlaced_Handler").unwrap();
    assert!(receipt < inventory && inventory < audit, "handlers run in declaration order");

    let wrapper = output.source("PlaceOrderHandler_PlaceOrder_Handler.g.cs").unwrap();
    assert!(wrapper.text.contains("OrderPlaced_Publisher.PublishAsync("));
    assert!(interceptors(&output).text.contains(
        "PlaceOrderHandler_PlaceOrder_Handler.HandleAsync(mediator.ServiceProvider, (global::Demo.PlaceOrder)message, cancellationToken)"
    ));
}

#[test]
fn a_failing_publish_target_does_not_stop_the_others() {
    let output = run(&fixture("cascade.json"));
    let text = unindented(&output.source("OrderPlaced_Publisher.g.cs").unwrap().text);

    let list = "global::System.Collections.Generic.List<global::System.Exception>";
    let guarded = |handler: &str| {
        format!(
            "try\n{{\nglobal::Switchboard.Generated.Demo_App.{handler}_OrderPlaced_Handler.Handle(serviceProvider, message, cancellationToken);\n}}\n\
             catch (global::System.Exception ex)\n{{\n(exceptions ??= new {list}()).Add(ex);\n}}"
        )
    };
    let receipt = text.find(&guarded("ReceiptHandler")).unwrap();
    let inventory = text.find(&guarded("InventoryHandler")).unwrap();
    let audit = text.find(&guarded("AuditHandler")).unwrap();
    assert!(receipt < inventory && inventory < audit);

    // One throw, after the last handler, carrying only what was caught.
    let rethrow = text.find("if (exceptions is not null)\n{\nthrow new global::System.AggregateException(exceptions);\n}").unwrap();
    assert!(audit < rethrow);
    assert_eq!(text.matches("throw").count(), 1);
    assert!(text.contains(&format!("{list}? exceptions = null;")));
}

#[test]
fn equally_specific_handlers_are_ambiguous() {
    let value = json!({
        "assembly": {
            "name": "Demo.App",
            "types": [
                { "name": "Switchboard.IMediator", "kind": "interface" },
                { "name": "Demo.Ping" },
                { "name": "Demo.FirstHandler", "methods": [method("Handle", "Demo.Ping", void())] },
                { "name": "Demo.SecondHandler", "methods": [method("Handle", "Demo.Ping", void())] }
            ]
        },
        "invocations": [invoke("Demo.Ping", 10)]
    });
    let output = run(&compilation(&value));
    assert_eq!(ids(&output), vec![DiagnosticId::AmbiguousHandler, DiagnosticId::AmbiguousHandler]);
    assert!(output.sources.iter().all(|s| !s.hint_name.ends_with("_Interceptors.g.cs")));
}

#[test]
fn middleware_runs_in_rank_order() {
    let before = |ret: Value| {
        json!({
            "name": "Before",
            "parameters": [{ "name": "message", "ty": named("System.Object") }],
            "return_type": ret,
        })
    };
    let finally = json!({
        "name": "Finally",
        "parameters": [
            { "name": "message", "ty": named("System.Object") },
            { "name": "exception", "ty": { "kind": "nullable", "inner": named("System.Exception") } }
        ],
        "return_type": void(),
    });
    let value = json!({
        "assembly": {
            "name": "Demo.App",
            "types": [
                { "name": "Switchboard.IMediator", "kind": "interface" },
                { "name": "Demo.Ping" },
                { "name": "Demo.PingHandler", "methods": [method("Handle", "Demo.Ping", void())] },
                { "name": "Demo.LoggingMiddleware", "methods": [before(void()), finally] },
                {
                    "name": "Demo.ValidationMiddleware",
                    "attributes": [{ "name": "Switchboard.Order", "arguments": [{ "kind": "int", "value": -1 }] }],
                    "methods": [before(void())]
                }
            ]
        },
        "invocations": [invoke("Demo.Ping", 10)]
    });
    let output = run(&compilation(&value));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let text = &output.source("PingHandler_Ping_Handler.g.cs").unwrap().text;
    let validation = text.find("GetRequiredService<global::Demo.ValidationMiddleware>").unwrap();
    let logging = text.find("GetRequiredService<global::Demo.LoggingMiddleware>").unwrap();
    assert!(validation < logging);

    let first = text.find("middleware0.Before(message);").unwrap();
    let second = text.find("middleware1.Before(message);").unwrap();
    let handler = text.find("handler.Handle(message);").unwrap();
    let finally = text.find("middleware1.Finally(message, ").unwrap();
    assert!(first < second && second < handler && handler < finally);
}

#[test]
fn referenced_module_handlers_are_forwarded() {
    let value = json!({
        "assembly": {
            "name": "Demo.App",
            "types": [{ "name": "Switchboard.IMediator", "kind": "interface", "accessibility": "public" }]
        },
        "references": [{
            "name": "Shared.Billing",
            "attributes": [{ "name": "Switchboard.SwitchboardModuleAttribute" }],
            "types": [
                { "name": "Shared.Billing.Charge", "accessibility": "public" },
                {
                    "name": "Shared.Billing.ChargeHandler",
                    "accessibility": "public",
                    "methods": [method("Handle", "Shared.Billing.Charge", void())]
                }
            ]
        }],
        "invocations": [invoke("Shared.Billing.Charge", 10)]
    });
    let output = run(&compilation(&value));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert!(output.source("ChargeHandler_Charge_Handler.g.cs").is_none());
    assert!(interceptors(&output).text.contains(
        "await global::Switchboard.Generated.Shared_Billing.ChargeHandler_Charge_Handler.HandleAsync(mediator.ServiceProvider, (global::Shared.Billing.Charge)message, cancellationToken).ConfigureAwait(false);"
    ));
}

fn void_create_order(call: Value) -> Value {
    json!({
        "assembly": {
            "name": "Demo.App",
            "types": [
                { "name": "Switchboard.IMediator", "kind": "interface" },
                { "name": "Demo.CreateOrder" },
                { "name": "Demo.Order" },
                { "name": "Demo.CreateOrderHandler", "methods": [method("Handle", "Demo.CreateOrder", void())] }
            ]
        },
        "invocations": [call]
    })
}

#[test]
fn discarded_typed_call_to_a_void_handler_returns_default() {
    let mut call = invoke_expecting("Demo.CreateOrder", &named("Demo.Order"), 10);
    call["result_used"] = json!(false);
    let output = run(&compilation(&void_create_order(call)));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let text = &interceptors(&output).text;
    assert!(text.contains("global::System.Threading.Tasks.ValueTask<global::Demo.Order> InterceptInvokeAsync_"));
    assert!(text.contains(
        "CreateOrderHandler_CreateOrder_Handler.Handle(mediator.ServiceProvider, (global::Demo.CreateOrder)message, cancellationToken);"
    ));
    assert!(text.contains("return default!;"));
    assert!(!text.contains("Unit.Value"));
}

#[test]
fn used_typed_call_to_a_void_handler_is_a_response_mismatch() {
    let call = invoke_expecting("Demo.CreateOrder", &named("Demo.Order"), 10);
    let output = run(&compilation(&void_create_order(call)));
    assert_eq!(ids(&output), vec![DiagnosticId::ResponseMismatch]);
    assert!(output.sources.iter().all(|s| !s.hint_name.ends_with("_Interceptors.g.cs")));
}

fn count_handler(returns: &Value, call: Value) -> Value {
    json!({
        "assembly": {
            "name": "Demo.App",
            "types": [
                { "name": "Switchboard.IMediator", "kind": "interface" },
                { "name": "Demo.Count" },
                { "name": "Demo.CountHandler", "methods": [method("HandleAsync", "Demo.Count", task_of(returns))] }
            ]
        },
        "invocations": [call]
    })
}

#[test]
fn nullable_value_response_cannot_serve_a_non_nullable_call() {
    let call = invoke_expecting("Demo.Count", &int(), 10);
    let output = run(&compilation(&count_handler(&nullable(&int()), call)));
    assert_eq!(ids(&output), vec![DiagnosticId::ResponseMismatch]);
    assert!(output.sources.iter().all(|s| !s.hint_name.ends_with("_Interceptors.g.cs")));
}

#[test]
fn value_response_serves_a_nullable_call() {
    let call = invoke_expecting("Demo.Count", &nullable(&int()), 10);
    let output = run(&compilation(&count_handler(&int(), call)));
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let text = &interceptors(&output).text;
    assert!(text.contains("ValueTask<global::System.Int32?> InterceptInvokeAsync_"));
    assert!(text.contains("return await global::Switchboard.Generated.Demo_App.CountHandler_Count_Handler.HandleAsync("));
}

#[test]
fn unmatched_call_is_reported_with_its_location() {
    let value = json!({
        "assembly": {
            "name": "Demo.App",
            "types": [{ "name": "Switchboard.IMediator", "kind": "interface" }, { "name": "Demo.Ping" }]
        },
        "invocations": [invoke("Demo.Ping", 10)]
    });
    let output = run(&compilation(&value));
    assert_eq!(ids(&output), vec![DiagnosticId::UnmatchedCallSite]);
    let location = output.diagnostics[0].location.as_ref().unwrap();
    assert_eq!(location.path.as_str(), "src/Program.cs");
    assert!(output.sources.is_empty());
}

#[test]
fn project_config_changes_the_output() {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    fs::write(
        root.join("switchboard.toml"),
        "[generator]\ngenerated_namespace = \"Acme.Wiring\"\nregistry = false\n",
    )
    .unwrap();
    let config = find_config(&root).unwrap().unwrap();

    let output = generate(&fixture("single_handler.json"), &config, &CancellationToken::new()).unwrap();
    assert!(output.source("SwitchboardHandlerRegistry.g.cs").is_none());
    let wrapper = output.source("PingHandler_Ping_Handler.g.cs").unwrap();
    assert!(wrapper.text.contains("namespace Acme.Wiring.Demo_App\n{"));
}

#[test]
fn cancelled_run_produces_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(generate(&fixture("single_handler.json"), &GeneratorConfig::default(), &token).is_err());
}
