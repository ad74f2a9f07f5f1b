//! A small expression DSL for `WHERE` conditions.
//!
//! Every literal goes through the parameter store, so a predicate never
//! inlines a value into the query text.
//!
//! ```rust
//! use cyflow::predicate::prop;
//!
//! let p = prop("n", "age").gt(30).and(prop("n", "name").starts_with("A"));
//! ```

use cyflow_core::traits::{CyflowNode, IntoCyflowValue};
use cyflow_core::{ParameterStore, UsageError, Value};

use crate::clause::{escape_identifier, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    StartsWith,
    EndsWith,
    Contains,
    In,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::StartsWith => "STARTS WITH",
            CompareOp::EndsWith => "ENDS WITH",
            CompareOp::Contains => "CONTAINS",
            CompareOp::In => "IN",
        }
    }
}

/// A boolean condition over node or relationship properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        property: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Carries a construction error to compile time.
    Invalid(UsageError),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Render into a template, binding literals in `params`.
    pub fn render(&self, params: ParameterStore) -> Result<(Template, ParameterStore), UsageError> {
        match self {
            Predicate::Compare { property, op, value } => {
                let (params, name) = params.bind(value.clone());
                let template = Template::text(format!("({property} {} ", op.symbol()))
                    .then(Template::param(name))
                    .then(Template::text(")"));
                Ok((template, params))
            }
            Predicate::IsNull(property) => Ok((Template::text(format!("({property} IS NULL)")), params)),
            Predicate::IsNotNull(property) => Ok((Template::text(format!("({property} IS NOT NULL)")), params)),
            Predicate::And(a, b) => Self::binary(a, "AND", b, params),
            Predicate::Or(a, b) => Self::binary(a, "OR", b, params),
            Predicate::Not(inner) => {
                let (template, params) = inner.render(params)?;
                Ok((Template::text("NOT ").then(template), params))
            }
            Predicate::Invalid(e) => Err(e.clone()),
        }
    }

    fn binary(
        a: &Predicate,
        keyword: &str,
        b: &Predicate,
        params: ParameterStore,
    ) -> Result<(Template, ParameterStore), UsageError> {
        let (left, params) = a.render(params)?;
        let (right, params) = b.render(params)?;
        let template = Template::text("(")
            .then(left)
            .then(Template::text(format!(" {keyword} ")))
            .then(right)
            .then(Template::text(")"));
        Ok((template, params))
    }
}

/// A property of a bound identifier, the left-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    rendered: String,
    error: Option<UsageError>,
}

/// `ident.name`, unchecked.
pub fn prop(identifier: &str, name: &str) -> Property {
    Property {
        rendered: format!("{identifier}.{}", escape_identifier(name)),
        error: None,
    }
}

/// `ident.name`, checked against the properties `T` reads.
///
/// An unknown name surfaces as [`UsageError::UnknownProperty`] when the
/// query compiles.
pub fn prop_of<T: CyflowNode>(identifier: &str, name: &str) -> Property {
    let mut property = prop(identifier, name);
    if !T::PROPERTIES.contains(&name) {
        property.error = Some(UsageError::UnknownProperty {
            label: T::LABEL.to_owned(),
            property: name.to_owned(),
        });
    }
    property
}

impl Property {
    fn compare(self, op: CompareOp, value: Value) -> Predicate {
        match self.error {
            Some(e) => Predicate::Invalid(e),
            None => Predicate::Compare {
                property: self.rendered,
                op,
                value,
            },
        }
    }

    pub fn eq(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Eq, value.into_value())
    }

    pub fn ne(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Ne, value.into_value())
    }

    pub fn gt(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Gt, value.into_value())
    }

    pub fn ge(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Ge, value.into_value())
    }

    pub fn lt(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Lt, value.into_value())
    }

    pub fn le(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Le, value.into_value())
    }

    pub fn starts_with(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::StartsWith, value.into_value())
    }

    pub fn ends_with(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::EndsWith, value.into_value())
    }

    pub fn contains(self, value: impl IntoCyflowValue) -> Predicate {
        self.compare(CompareOp::Contains, value.into_value())
    }

    pub fn in_list<V: IntoCyflowValue>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        let list = Value::List(values.into_iter().map(IntoCyflowValue::into_value).collect());
        self.compare(CompareOp::In, list)
    }

    pub fn is_null(self) -> Predicate {
        match self.error {
            Some(e) => Predicate::Invalid(e),
            None => Predicate::IsNull(self.rendered),
        }
    }

    pub fn is_not_null(self) -> Predicate {
        match self.error {
            Some(e) => Predicate::Invalid(e),
            None => Predicate::IsNotNull(self.rendered),
        }
    }
}
