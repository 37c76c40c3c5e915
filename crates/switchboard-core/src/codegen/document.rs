// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Document algebra for building generated source text.
//!
//! **DDD Context:** Code Generation
//!
//! Emitters build a tree of [`Document`] nodes and render it once at the
//! end, instead of threading a `String` buffer through every function.
//! `nest` controls indentation of the lines it contains, so a method body
//! can be built without knowing how deep its class sits.
//!
//! Indentation is written lazily, on the first text after a line break.
//! Blank lines therefore never carry trailing whitespace, which keeps the
//! generated files byte-stable across formatting-sensitive diffs.
//!
//! # Usage
//!
//! ```
//! use switchboard_core::docvec;
//! use switchboard_core::codegen::document::{Document, INDENT, line, nest};
//!
//! let doc: Document<'_> = docvec![
//!     "public void Run()",
//!     line(),
//!     "{",
//!     nest(INDENT, docvec![line(), "Work();"]),
//!     line(),
//!     "}",
//! ];
//! assert_eq!(doc.to_pretty_string(), "public void Run()\n{\n    Work();\n}");
//! ```

use ecow::EcoString;

/// Standard indentation width for generated code.
pub const INDENT: isize = 4;

/// A document tree node.
#[derive(Debug, Clone)]
pub enum Document<'a> {
    /// A borrowed string, not containing newlines.
    Str(&'a str),
    /// An owned string, not containing newlines.
    String(String),
    /// A line break followed by the current indentation.
    Line,
    /// Increase the indentation of every line break inside.
    Nest(isize, Box<Document<'a>>),
    /// A sequence rendered one after another.
    Vec(Vec<Document<'a>>),
    /// The empty document.
    Nil,
}

/// Conversion into a [`Document`].
pub trait Documentable<'a> {
    fn to_doc(self) -> Document<'a>;
}

impl<'a> Documentable<'a> for &'a str {
    fn to_doc(self) -> Document<'a> {
        Document::Str(self)
    }
}

impl<'a> Documentable<'a> for String {
    fn to_doc(self) -> Document<'a> {
        Document::String(self)
    }
}

impl<'a> Documentable<'a> for EcoString {
    fn to_doc(self) -> Document<'a> {
        Document::String(self.to_string())
    }
}

impl<'a> Documentable<'a> for &'a EcoString {
    fn to_doc(self) -> Document<'a> {
        Document::Str(self.as_str())
    }
}

impl<'a> Documentable<'a> for Document<'a> {
    fn to_doc(self) -> Document<'a> {
        self
    }
}

impl<'a> Documentable<'a> for Vec<Document<'a>> {
    fn to_doc(self) -> Document<'a> {
        Document::Vec(self)
    }
}

impl<'a> Documentable<'a> for usize {
    fn to_doc(self) -> Document<'a> {
        Document::String(self.to_string())
    }
}

impl<'a> Documentable<'a> for i64 {
    fn to_doc(self) -> Document<'a> {
        Document::String(self.to_string())
    }
}

/// Builds a [`Document::Vec`] from any mix of documentable values.
#[macro_export]
macro_rules! docvec {
    () => {
        $crate::codegen::document::Document::Vec(Vec::new())
    };
    ($($x:expr),+ $(,)?) => {
        $crate::codegen::document::Document::Vec(vec![
            $($crate::codegen::document::Documentable::to_doc($x)),+
        ])
    };
}

/// Owned text from anything displayable.
#[must_use]
pub fn text<'a>(value: impl std::fmt::Display) -> Document<'a> {
    Document::String(value.to_string())
}

/// A line break.
#[must_use]
pub fn line<'a>() -> Document<'a> {
    Document::Line
}

/// The empty document.
#[must_use]
pub fn nil<'a>() -> Document<'a> {
    Document::Nil
}

/// Indents every line break inside `doc` by `indent` more columns.
#[must_use]
pub fn nest<'a>(indent: isize, doc: impl Documentable<'a>) -> Document<'a> {
    Document::Nest(indent, Box::new(doc.to_doc()))
}

/// Joins documents with a separator.
#[must_use]
pub fn join<'a>(docs: impl IntoIterator<Item = Document<'a>>, separator: &Document<'a>) -> Document<'a> {
    let mut result = Vec::new();
    for (index, doc) in docs.into_iter().enumerate() {
        if index > 0 {
            result.push(separator.clone());
        }
        result.push(doc);
    }
    Document::Vec(result)
}

/// Concatenates documents.
#[must_use]
pub fn concat<'a>(docs: impl IntoIterator<Item = Document<'a>>) -> Document<'a> {
    Document::Vec(docs.into_iter().collect())
}

/// One statement per line, each preceded by a line break.
#[must_use]
pub fn lines<'a>(docs: impl IntoIterator<Item = Document<'a>>) -> Document<'a> {
    Document::Vec(
        docs.into_iter()
            .flat_map(|doc| [Document::Line, doc])
            .collect(),
    )
}

/// A brace-delimited block: `header`, then `{`, the indented body and `}`
/// on their own lines.
///
/// The body is expected to start every statement with a line break (see
/// [`lines`]). An empty body renders as `{` and `}` on adjacent lines.
#[must_use]
pub fn block<'a>(header: impl Documentable<'a>, body: Document<'a>) -> Document<'a> {
    if body.is_empty() {
        return docvec![header, line(), "{", line(), "}"];
    }
    docvec![header, line(), "{", nest(INDENT, body), line(), "}"]
}

impl Document<'_> {
    /// True when rendering produces no output at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Document::Str(s) => s.is_empty(),
            Document::String(s) => s.is_empty(),
            Document::Line => false,
            Document::Nest(_, doc) => doc.is_empty(),
            Document::Vec(docs) => docs.iter().all(Document::is_empty),
            Document::Nil => true,
        }
    }

    /// Renders the document.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        let mut renderer = Renderer {
            output: String::new(),
            pending_indent: None,
        };
        renderer.render(self, 0);
        renderer.output
    }
}

struct Renderer {
    output: String,
    /// Indentation owed by the most recent line break.
    pending_indent: Option<isize>,
}

impl Renderer {
    fn render(&mut self, doc: &Document<'_>, indent: isize) {
        match doc {
            Document::Str(s) => self.text(s),
            Document::String(s) => self.text(s),
            Document::Line => {
                self.output.push('\n');
                self.pending_indent = Some(indent);
            }
            Document::Nest(extra, inner) => self.render(inner, indent + extra),
            Document::Vec(docs) => {
                for doc in docs {
                    self.render(doc, indent);
                }
            }
            Document::Nil => {}
        }
    }

    fn text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(indent) = self.pending_indent.take() {
            for _ in 0..indent.max(0) {
                self.output.push(' ');
            }
        }
        self.output.push_str(s);
    }
}
