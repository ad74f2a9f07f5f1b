//! Clauses and the persistent clause sequence.
//!
//! A clause is a keyword plus a [`Template`]: literal text interleaved with
//! parameter references. Templates keep parameters symbolic so the compiler
//! can render them as `$name` or `{name}` depending on the server.

use std::borrow::Cow;
use std::sync::Arc;

/// The kind of a clause, which fixes its keyword and its gating rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Start,
    Match,
    OptionalMatch,
    Create,
    CreateUnique,
    Merge,
    OnCreateSet,
    OnMatchSet,
    Where,
    AndWhere,
    OrWhere,
    Set,
    Remove,
    Delete,
    DetachDelete,
    Return,
    ReturnDistinct,
    OrderBy,
    Skip,
    Limit,
    With,
    Unwind,
    Union,
    UnionAll,
    Call,
    Yield,
    ForEach,
    Raw,
}

impl ClauseKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ClauseKind::Start => "START",
            ClauseKind::Match => "MATCH",
            ClauseKind::OptionalMatch => "OPTIONAL MATCH",
            ClauseKind::Create => "CREATE",
            ClauseKind::CreateUnique => "CREATE UNIQUE",
            ClauseKind::Merge => "MERGE",
            ClauseKind::OnCreateSet => "ON CREATE SET",
            ClauseKind::OnMatchSet => "ON MATCH SET",
            ClauseKind::Where => "WHERE",
            ClauseKind::AndWhere => "AND",
            ClauseKind::OrWhere => "OR",
            ClauseKind::Set => "SET",
            ClauseKind::Remove => "REMOVE",
            ClauseKind::Delete => "DELETE",
            ClauseKind::DetachDelete => "DETACH DELETE",
            ClauseKind::Return => "RETURN",
            ClauseKind::ReturnDistinct => "RETURN DISTINCT",
            ClauseKind::OrderBy => "ORDER BY",
            ClauseKind::Skip => "SKIP",
            ClauseKind::Limit => "LIMIT",
            ClauseKind::With => "WITH",
            ClauseKind::Unwind => "UNWIND",
            ClauseKind::Union => "UNION",
            ClauseKind::UnionAll => "UNION ALL",
            ClauseKind::Call => "CALL",
            ClauseKind::Yield => "YIELD",
            ClauseKind::ForEach => "FOREACH",
            ClauseKind::Raw => "",
        }
    }

    pub(crate) fn is_where(self) -> bool {
        matches!(self, ClauseKind::Where | ClauseKind::AndWhere | ClauseKind::OrWhere)
    }

    pub(crate) fn is_return(self) -> bool {
        matches!(self, ClauseKind::Return | ClauseKind::ReturnDistinct)
    }
}

/// One piece of a clause body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Param(String),
}

/// Clause body: literal text and parameter references, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Template {
    /// Literal text, never scanned for parameters.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment::Text(text)],
        }
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Param(name.into())],
        }
    }

    /// Parse user text, turning `$name` and `{name}` into parameter references.
    ///
    /// Quoted strings and backtick-escaped names are copied verbatim.
    ///
    /// ```rust
    /// # use cyflow::clause::{Segment, Template};
    /// let t = Template::parse("n.name = {name} AND n.tag = '$literal'");
    /// assert_eq!(t.param_names().collect::<Vec<_>>(), vec!["name"]);
    /// assert_eq!(t.render(true), "n.name = $name AND n.tag = '$literal'");
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut out = Template::default();
        let mut literal = String::new();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' | '"' | '`' => {
                    literal.push(c);
                    i += 1;
                    while i < chars.len() {
                        let d = chars[i];
                        literal.push(d);
                        i += 1;
                        if d == '\\' && c != '`' {
                            if let Some(&escaped) = chars.get(i) {
                                literal.push(escaped);
                                i += 1;
                            }
                        } else if d == c {
                            break;
                        }
                    }
                }
                '$' if chars.get(i + 1).is_some_and(|n| is_param_char(*n)) => {
                    let name: String = chars[i + 1..].iter().take_while(|c| is_param_char(**c)).collect();
                    i += 1 + name.chars().count();
                    out.push_text(std::mem::take(&mut literal));
                    out.push_param(name);
                }
                '{' => {
                    let name: String = chars[i + 1..].iter().take_while(|c| is_param_char(**c)).collect();
                    let close = i + 1 + name.chars().count();
                    if !name.is_empty() && chars.get(close) == Some(&'}') {
                        out.push_text(std::mem::take(&mut literal));
                        out.push_param(name);
                        i = close + 1;
                    } else {
                        literal.push(c);
                        i += 1;
                    }
                }
                _ => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        out.push_text(literal);
        out
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Text(prev)) => prev.push_str(&text),
            _ => self.segments.push(Segment::Text(text)),
        }
    }

    pub fn push_param(&mut self, name: impl Into<String>) {
        self.segments.push(Segment::Param(name.into()));
    }

    pub fn append(&mut self, other: Template) {
        for segment in other.segments {
            match segment {
                Segment::Text(t) => self.push_text(t),
                Segment::Param(p) => self.push_param(p),
            }
        }
    }

    /// `self` followed by `other`.
    pub fn then(mut self, other: Template) -> Self {
        self.append(other);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(p) => Some(p.as_str()),
            Segment::Text(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render with `$name` placeholders, or `{name}` when `dollar` is false.
    pub fn render(&self, dollar: bool) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Param(p) if dollar => {
                    out.push('$');
                    out.push_str(p);
                }
                Segment::Param(p) => {
                    out.push('{');
                    out.push_str(p);
                    out.push('}');
                }
            }
        }
        out
    }
}

/// What a `START` clause points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTarget {
    Node,
    Relationship,
}

/// One `ident=node($param)` entry of a `START` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPoint {
    pub identifier: String,
    pub target: StartTarget,
    /// Parameter holding the list of ids.
    pub param: String,
}

/// One step of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub body: Template,
    /// Only set for [`ClauseKind::Start`].
    pub start: Option<StartPoint>,
}

impl Clause {
    pub fn new(kind: ClauseKind, body: Template) -> Self {
        Self { kind, body, start: None }
    }

    pub fn start(point: StartPoint) -> Self {
        let function = match point.target {
            StartTarget::Node => "node",
            StartTarget::Relationship => "relationship",
        };
        let body = Template::text(format!("{}={}(", point.identifier, function))
            .then(Template::param(point.param.clone()))
            .then(Template::text(")"));
        Self {
            kind: ClauseKind::Start,
            body,
            start: Some(point),
        }
    }
}

struct Link {
    clause: Clause,
    prev: Option<Arc<Link>>,
}

/// An append-only list of clauses shared between query values.
///
/// [`push`](Self::push) returns a new sequence; the receiver and every
/// other sequence sharing its prefix are unaffected.
#[derive(Clone, Default)]
pub struct ClauseSequence {
    last: Option<Arc<Link>>,
    len: usize,
}

impl ClauseSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, clause: Clause) -> Self {
        Self {
            last: Some(Arc::new(Link {
                clause,
                prev: self.last.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last(&self) -> Option<&Clause> {
        self.last.as_deref().map(|l| &l.clause)
    }

    /// Clauses in append order.
    pub fn to_vec(&self) -> Vec<&Clause> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.last.as_deref();
        while let Some(link) = cursor {
            out.push(&link.clause);
            cursor = link.prev.as_deref();
        }
        out.reverse();
        out
    }
}

impl std::fmt::Debug for ClauseSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl Drop for ClauseSequence {
    // Unlink iteratively so long chains don't overflow the stack.
    fn drop(&mut self) {
        let mut next = self.last.take();
        while let Some(link) = next {
            match Arc::try_unwrap(link) {
                Ok(mut link) => next = link.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Backtick-escape a label, relationship type or property key unless it is
/// a plain identifier.
pub fn escape_identifier(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}
