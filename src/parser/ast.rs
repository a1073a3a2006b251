//! Abstract Syntax Tree types for compiled templates

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A dotted lookup path such as `user.name`
///
/// The implicit iterator `.` is represented by an empty segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    pub segments: Vec<String>,
}

impl KeyPath {
    /// Split a tag body into path segments
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "." {
            return Self {
                segments: Vec::new(),
            };
        }
        Self {
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    /// True for the implicit iterator `.`
    pub fn is_current(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_current() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// A single template node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output
    Text(String),
    /// Value interpolation; `escape` is false for `{{{x}}}` and `{{&x}}`
    Variable { path: KeyPath, escape: bool },
    /// `{{#x}}...{{/x}}` or, when `inverted`, `{{^x}}...{{/x}}`
    Section {
        path: KeyPath,
        inverted: bool,
        children: Vec<Spanned<Node>>,
    },
    /// `{{> name}}`
    Partial { name: String },
}
