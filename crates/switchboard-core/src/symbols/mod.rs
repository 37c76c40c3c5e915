// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Read-only symbol snapshot handed to the generator by its host.
//!
//! **DDD Context:** Symbol Model
//!
//! The host (compiler plugin, IDE, build driver) describes the current
//! compilation and the public surface of referenced assemblies as plain
//! data. Nothing in the core mutates a snapshot; every pass is a function
//! of one `Compilation` value.
//!
//! ```
//! use switchboard_core::symbols::Compilation;
//!
//! let compilation = Compilation::from_json(r#"{
//!     "assembly": { "name": "Demo", "types": [] }
//! }"#).unwrap();
//! assert_eq!(compilation.assembly.name, "Demo");
//! assert!(compilation.references.is_empty());
//! ```

mod location;
pub mod table;
mod type_ref;
pub mod well_known;

pub use location::{LocationFingerprint, SourceLocation, Span};
pub(crate) use location::hex_prefix;
pub use table::{Origin, SymbolTable};
pub use type_ref::{TupleElementRef, TypeRef};

use ecow::EcoString;
use serde::{Deserialize, Serialize};

/// One generation input: the assembly being compiled plus its references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compilation {
    pub assembly: AssemblySymbols,
    #[serde(default)]
    pub references: Vec<AssemblySymbols>,
    #[serde(default)]
    pub invocations: Vec<InvocationSyntax>,
}

impl Compilation {
    /// Parses a snapshot serialized by the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a compilation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the snapshot in the form [`Compilation::from_json`] reads.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Types and assembly-level attributes of one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblySymbols {
    pub name: EcoString,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    #[serde(default)]
    pub types: Vec<TypeSymbol>,
}

impl AssemblySymbols {
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        has_attribute(&self.attributes, name)
    }
}

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Struct,
    Interface,
    Record,
    RecordStruct,
    Enum,
    Delegate,
    /// The host could not bind the declaration.
    Error,
}

impl TypeKind {
    #[must_use]
    pub fn is_value_type(self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::RecordStruct | TypeKind::Enum)
    }
}

/// Declared accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Private,
    Protected,
    #[default]
    Internal,
    ProtectedInternal,
    Public,
}

impl Accessibility {
    /// True when code in another assembly can name the symbol.
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Accessibility::Public)
    }

    /// True when generated code in the same assembly can call the symbol.
    #[must_use]
    pub fn is_assembly_visible(self) -> bool {
        matches!(
            self,
            Accessibility::Public | Accessibility::Internal | Accessibility::ProtectedInternal
        )
    }
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSymbol {
    /// Fully-qualified metadata name (`Demo.Orders.OrderHandler`).
    pub name: EcoString,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_sealed: bool,
    #[serde(default)]
    pub type_parameters: Vec<EcoString>,
    #[serde(default)]
    pub base_type: Option<TypeRef>,
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Name of the enclosing type for nested declarations.
    #[serde(default)]
    pub containing_type: Option<EcoString>,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    #[serde(default)]
    pub methods: Vec<MethodSymbol>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl TypeSymbol {
    /// Simple name without namespace (`OrderHandler`).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        has_attribute(&self.attributes, name)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        find_attribute(&self.attributes, name)
    }

    /// The type as a reference, constructed over its own type parameters.
    #[must_use]
    pub fn as_type_ref(&self) -> TypeRef {
        TypeRef::Named {
            name: self.name.clone(),
            args: self
                .type_parameters
                .iter()
                .map(|p| TypeRef::type_parameter(p, Vec::new()))
                .collect(),
            value_type: self.kind.is_value_type(),
        }
    }
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSymbol {
    pub name: EcoString,
    #[serde(default = "public")]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterSymbol>,
    #[serde(default)]
    pub parameters: Vec<ParameterSymbol>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

fn public() -> Accessibility {
    Accessibility::Public
}

impl MethodSymbol {
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        has_attribute(&self.attributes, name)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        find_attribute(&self.attributes, name)
    }
}

/// A method-level generic parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParameterSymbol {
    pub name: EcoString,
    #[serde(default)]
    pub constraints: Vec<TypeRef>,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterSymbol {
    pub name: EcoString,
    pub ty: TypeRef,
    /// Source text of the default value (`default`, `null`, `42`).
    #[serde(default)]
    pub default_value: Option<EcoString>,
}

impl ParameterSymbol {
    #[must_use]
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
        }
    }
}

/// An attribute application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeData {
    /// Fully-qualified attribute class name.
    pub name: EcoString,
    #[serde(default)]
    pub arguments: Vec<AttributeValue>,
    #[serde(default)]
    pub named_arguments: Vec<NamedArgument>,
}

impl AttributeData {
    /// True when this application is of attribute `name`.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        attribute_matches(&self.name, name)
    }

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            named_arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn named(&self, name: &str) -> Option<&AttributeValue> {
        self.named_arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    /// Every `typeof(...)` argument, flattening `params` arrays.
    #[must_use]
    pub fn type_arguments(&self) -> Vec<&TypeRef> {
        let mut types = Vec::new();
        for arg in &self.arguments {
            arg.collect_types(&mut types);
        }
        types
    }
}

/// A `Name = value` attribute argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedArgument {
    pub name: EcoString,
    pub value: AttributeValue,
}

/// A constant attribute argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Int(i64),
    Bool(bool),
    String(EcoString),
    Type(TypeRef),
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    fn collect_types<'a>(&'a self, into: &mut Vec<&'a TypeRef>) {
        match self {
            AttributeValue::Type(ty) => into.push(ty),
            AttributeValue::Array(items) => {
                for item in items {
                    item.collect_types(into);
                }
            }
            _ => {}
        }
    }
}

/// An invocation expression observed in the current compilation's syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationSyntax {
    pub location: SourceLocation,
    /// Static type of the receiver expression.
    pub receiver_type: TypeRef,
    pub method: InvokedMethod,
    #[serde(default)]
    pub arguments: Vec<ArgumentSyntax>,
    #[serde(default)]
    pub is_awaited: bool,
    #[serde(default = "yes")]
    pub result_used: bool,
    /// Opaque location token produced by the host compiler, when available.
    #[serde(default)]
    pub interceptable: Option<InterceptableLocation>,
}

fn yes() -> bool {
    true
}

/// The bound target method of an invocation, with generic arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvokedMethod {
    pub containing_type: EcoString,
    pub name: EcoString,
    #[serde(default)]
    pub type_arguments: Vec<TypeRef>,
    /// Declared parameters, generic arguments already substituted.
    #[serde(default)]
    pub parameters: Vec<ParameterSymbol>,
    /// Declared return type, generic arguments already substituted.
    pub return_type: TypeRef,
    #[serde(default)]
    pub is_extension: bool,
}

/// An argument expression and the parameter it binds to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArgumentSyntax {
    pub parameter: EcoString,
    /// Static type of the argument expression; `None` for unbound code.
    #[serde(default)]
    pub static_type: Option<TypeRef>,
}

/// Host-encoded interception token for one call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterceptableLocation {
    pub version: u32,
    pub data: EcoString,
}

/// Returns the last dotted segment of a fully-qualified name.
#[must_use]
pub fn simple_name(full_name: &str) -> &str {
    let without_args = full_name.split('<').next().unwrap_or(full_name);
    without_args.rsplit('.').next().unwrap_or(without_args)
}

fn attribute_matches(attribute: &str, wanted: &str) -> bool {
    let attribute = attribute.strip_prefix("global::").unwrap_or(attribute);
    let wanted = wanted.strip_prefix("global::").unwrap_or(wanted);
    attribute == wanted
        || wanted
            .strip_suffix("Attribute")
            .is_some_and(|short| attribute == short)
}

/// True when `attributes` contains `name`, in full or short (`...Attribute`-less) form.
pub(crate) fn has_attribute(attributes: &[AttributeData], name: &str) -> bool {
    find_attribute(attributes, name).is_some()
}

fn find_attribute<'a>(attributes: &'a [AttributeData], name: &str) -> Option<&'a AttributeData> {
    attributes.iter().find(|a| attribute_matches(&a.name, name))
}
