// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source emission.
//!
//! **DDD Context:** Code Generation
//!
//! Each emitter takes a *plan*: a plain, hashable description of one
//! generated file, assembled by the generator from the analysis model. A
//! plan carries everything its rendering depends on, so the rendered text
//! can be memoized on the plan alone.
//!
//! | Emitter | Output |
//! |---------|--------|
//! | [`handler_wrapper`] | one static class per (handler, message type) |
//! | [`publisher`] | one static class per broadcast message type |
//! | [`interceptor`] | one static class per source file with call sites |
//! | [`registry`] | the handler registry and the interception attribute |

pub mod csharp;
pub mod document;
pub mod handler_wrapper;
pub mod interceptor;
pub mod names;
pub mod publisher;
pub mod registry;

use crate::config::{GeneratorConfig, RuntimeNames};
use crate::symbols::hex_prefix;
use document::{Document, line};
use ecow::EcoString;
use sha2::{Digest, Sha256};

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedSource {
    /// File name the host adds the source under (`X.g.cs`).
    pub hint_name: EcoString,
    pub text: String,
    /// Short digest of `text`.
    pub content_hash: EcoString,
}

impl GeneratedSource {
    #[must_use]
    pub fn new(hint_name: EcoString, text: String) -> Self {
        let content_hash = hex_prefix(&Sha256::digest(text.as_bytes()), 8).into();
        Self {
            hint_name,
            text,
            content_hash,
        }
    }
}

/// Which wrapper method a caller dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    /// Statically typed message and response, no boxing.
    Typed,
    /// `object` message and boxed response; used by the registry.
    Untyped,
}

/// The configurable names emitters spell out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmitNames {
    pub runtime: RuntimeNames,
    pub mediator_interface: EcoString,
    /// Façade method publishers fall back to when nothing handles a message
    /// at compile time.
    pub publish_async_method: EcoString,
    pub service_provider_property: EcoString,
    pub service_provider_type: EcoString,
    pub required_service_extensions: EcoString,
}

impl EmitNames {
    #[must_use]
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            runtime: config.runtime.clone(),
            mediator_interface: config.facade.mediator_interface.clone(),
            publish_async_method: config
                .facade
                .publish_methods
                .iter()
                .find(|m| m.ends_with("Async"))
                .or_else(|| config.facade.publish_methods.first())
                .cloned()
                .unwrap_or_else(|| "PublishAsync".into()),
            service_provider_property: config.facade.service_provider_property.clone(),
            service_provider_type: config.facade.service_provider_type.clone(),
            required_service_extensions: config.facade.required_service_extensions.clone(),
        }
    }
}

/// Class members separated by blank lines, ready for a [`document::block`].
#[must_use]
pub fn members<'a>(docs: impl IntoIterator<Item = Document<'a>>) -> Document<'a> {
    let mut out = Vec::new();
    for (index, doc) in docs.into_iter().enumerate() {
        if index > 0 {
            out.push(line());
        }
        out.push(line());
        out.push(doc);
    }
    Document::Vec(out)
}
