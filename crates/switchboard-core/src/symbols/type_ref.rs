// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Type references as they appear in signatures.
//!
//! **DDD Context:** Symbol Model / Value Object
//!
//! A `TypeRef` is whatever the host wrote in a signature: it may use keyword
//! aliases, `global::` prefixes, metadata arity suffixes or `+` for nested
//! types. [`TypeRef::canonical`] folds all of these spellings into one form
//! so that structurally identical types compare and hash equal.

use super::well_known;
use ecow::{EcoString, eco_format};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A named type, optionally constructed with type arguments.
    Named {
        name: EcoString,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        value_type: bool,
    },
    /// `T?`: a nullable annotation or `Nullable<T>`.
    Nullable { inner: Box<TypeRef> },
    /// A value tuple, `(A first, B second)`.
    Tuple { elements: Vec<TupleElementRef> },
    /// A generic type parameter with its constraint types.
    TypeParameter {
        name: EcoString,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        constraints: Vec<TypeRef>,
    },
    /// A single-dimensional array.
    Array { element: Box<TypeRef> },
    /// A type the host could not resolve (mid-edit code).
    Error,
}

/// One element of a tuple type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleElementRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<EcoString>,
    pub ty: TypeRef,
}

impl TupleElementRef {
    #[must_use]
    pub fn new(name: Option<&str>, ty: TypeRef) -> Self {
        Self {
            name: name.map(EcoString::from),
            ty,
        }
    }
}

impl TypeRef {
    /// A non-generic reference type.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
            value_type: false,
        }
    }

    /// A non-generic value type.
    #[must_use]
    pub fn value(name: &str) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
            value_type: true,
        }
    }

    /// A constructed generic type.
    #[must_use]
    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            args,
            value_type: false,
        }
    }

    /// A constructed generic value type (e.g. `ValueTask<T>`).
    #[must_use]
    pub fn generic_value(name: &str, args: Vec<TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            args,
            value_type: true,
        }
    }

    #[must_use]
    pub fn nullable(self) -> Self {
        Self::Nullable {
            inner: Box::new(self),
        }
    }

    #[must_use]
    pub fn tuple(elements: Vec<TupleElementRef>) -> Self {
        Self::Tuple { elements }
    }

    #[must_use]
    pub fn type_parameter(name: &str, constraints: Vec<TypeRef>) -> Self {
        Self::TypeParameter {
            name: name.into(),
            constraints,
        }
    }

    #[must_use]
    pub fn void() -> Self {
        Self::named(well_known::VOID)
    }

    #[must_use]
    pub fn object() -> Self {
        Self::named(well_known::OBJECT)
    }

    /// Folds every spelling of a type into one canonical form.
    ///
    /// Canonicalization is idempotent.
    #[must_use]
    pub fn canonical(&self) -> TypeRef {
        match self {
            TypeRef::Named {
                name,
                args,
                value_type,
            } => {
                let args: Vec<TypeRef> = args.iter().map(TypeRef::canonical).collect();
                let (name, value_type) = canonical_name(name, *value_type);
                if name == well_known::NULLABLE && args.len() == 1 {
                    return TypeRef::Nullable {
                        inner: Box::new(args.into_iter().next().unwrap_or(TypeRef::Error)),
                    }
                    .canonical();
                }
                if name == well_known::VALUE_TUPLE && !args.is_empty() {
                    return TypeRef::Tuple {
                        elements: args
                            .into_iter()
                            .map(|ty| TupleElementRef { name: None, ty })
                            .collect(),
                    };
                }
                TypeRef::Named {
                    name,
                    args,
                    value_type,
                }
            }
            TypeRef::Nullable { inner } => match inner.canonical() {
                already @ TypeRef::Nullable { .. } => already,
                TypeRef::Error => TypeRef::Error,
                inner => TypeRef::Nullable {
                    inner: Box::new(inner),
                },
            },
            TypeRef::Tuple { elements } => TypeRef::Tuple {
                elements: elements
                    .iter()
                    .map(|e| TupleElementRef {
                        name: e.name.clone(),
                        ty: e.ty.canonical(),
                    })
                    .collect(),
            },
            TypeRef::TypeParameter { name, constraints } => TypeRef::TypeParameter {
                name: name.trim().into(),
                constraints: constraints.iter().map(TypeRef::canonical).collect(),
            },
            TypeRef::Array { element } => TypeRef::Array {
                element: Box::new(element.canonical()),
            },
            TypeRef::Error => TypeRef::Error,
        }
    }

    /// Identity key: canonical name without nullability or `global::`.
    ///
    /// Tuple element names do not participate; `(int a, int b)` and
    /// `(int, int)` are the same type.
    #[must_use]
    pub fn key(&self) -> EcoString {
        match self.canonical() {
            TypeRef::Nullable { inner } => inner.key(),
            canonical => canonical.key_inner(),
        }
    }

    fn key_inner(&self) -> EcoString {
        match self {
            TypeRef::Named { name, args, .. } if args.is_empty() => name.clone(),
            TypeRef::Named { name, args, .. } => {
                let args: Vec<EcoString> = args.iter().map(TypeRef::key_inner).collect();
                eco_format!("{name}<{}>", args.join(", "))
            }
            TypeRef::Nullable { inner } => eco_format!("{}?", inner.key_inner()),
            TypeRef::Tuple { elements } => {
                let parts: Vec<EcoString> = elements.iter().map(|e| e.ty.key_inner()).collect();
                eco_format!("({})", parts.join(", "))
            }
            TypeRef::TypeParameter { name, .. } => name.clone(),
            TypeRef::Array { element } => eco_format!("{}[]", element.key_inner()),
            TypeRef::Error => "?".into(),
        }
    }

    /// The generic definition name for a named type (`Demo.Envelope`).
    #[must_use]
    pub fn definition_name(&self) -> Option<EcoString> {
        match self.canonical() {
            TypeRef::Named { name, .. } => Some(name),
            TypeRef::Nullable { inner } => inner.definition_name(),
            _ => None,
        }
    }

    /// Type arguments of a constructed named type.
    #[must_use]
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            TypeRef::Nullable { inner } => inner.type_args(),
            _ => &[],
        }
    }

    /// Strips one nullable layer, if any.
    #[must_use]
    pub fn non_nullable(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable { inner } => inner,
            other => other,
        }
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self.canonical(), TypeRef::Nullable { .. })
    }

    #[must_use]
    pub fn is_named(&self, full_name: &str) -> bool {
        matches!(self.canonical(), TypeRef::Named { ref name, .. } if name == full_name)
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.is_named(well_known::VOID)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self.canonical().non_nullable(), TypeRef::Named { name, .. } if name == well_known::OBJECT)
    }

    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self.canonical() {
            TypeRef::Named { value_type, .. } => value_type,
            TypeRef::Tuple { .. } => true,
            TypeRef::Nullable { inner } => inner.is_value_type(),
            _ => false,
        }
    }

    /// True when this type or any nested type is an unresolved error type.
    #[must_use]
    pub fn contains_error(&self) -> bool {
        match self {
            TypeRef::Error => true,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::contains_error),
            TypeRef::Nullable { inner } => inner.contains_error(),
            TypeRef::Tuple { elements } => elements.iter().any(|e| e.ty.contains_error()),
            TypeRef::TypeParameter { constraints, .. } => {
                constraints.iter().any(TypeRef::contains_error)
            }
            TypeRef::Array { element } => element.contains_error(),
        }
    }

    /// True when this type mentions a generic type parameter.
    #[must_use]
    pub fn contains_type_parameter(&self) -> bool {
        match self {
            TypeRef::TypeParameter { .. } => true,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::contains_type_parameter),
            TypeRef::Nullable { inner } => inner.contains_type_parameter(),
            TypeRef::Tuple { elements } => elements.iter().any(|e| e.ty.contains_type_parameter()),
            TypeRef::Array { element } => element.contains_type_parameter(),
            TypeRef::Error => false,
        }
    }

    /// Replaces type parameters by name.
    #[must_use]
    pub fn substitute(&self, bindings: &HashMap<EcoString, TypeRef>) -> TypeRef {
        match self {
            TypeRef::TypeParameter { name, .. } => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Named {
                name,
                args,
                value_type,
            } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
                value_type: *value_type,
            },
            TypeRef::Nullable { inner } => TypeRef::Nullable {
                inner: Box::new(inner.substitute(bindings)),
            },
            TypeRef::Tuple { elements } => TypeRef::Tuple {
                elements: elements
                    .iter()
                    .map(|e| TupleElementRef {
                        name: e.name.clone(),
                        ty: e.ty.substitute(bindings),
                    })
                    .collect(),
            },
            TypeRef::Array { element } => TypeRef::Array {
                element: Box::new(element.substitute(bindings)),
            },
            TypeRef::Error => TypeRef::Error,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical() {
            TypeRef::Nullable { inner } => write!(f, "{}?", inner.key_inner()),
            other => f.write_str(&other.key_inner()),
        }
    }
}

/// Normalizes a written type name to its metadata form.
fn canonical_name(raw: &str, value_type: bool) -> (EcoString, bool) {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("global::").unwrap_or(trimmed);
    if let Some((full, is_value)) = well_known::keyword_alias(trimmed) {
        return (full.into(), is_value);
    }
    let without_arity = match trimmed.find('`') {
        Some(index) => &trimmed[..index],
        None => trimmed,
    };
    let name = without_arity.replace('+', ".");
    let value_type = value_type || well_known::is_primitive_value_type(&name);
    (name.into(), value_type)
}
