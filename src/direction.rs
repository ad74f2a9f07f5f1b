//! Working out which way a typed relationship points.

use cyflow_core::traits::{CyflowNode, CyflowRelation};
use cyflow_core::UsageError;

use crate::clause::escape_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `(a)-[:R]->(b)`
    Forward,
    /// `(a)<-[:R]-(b)`
    Reverse,
}

fn allows(labels: &[&str], label: &str) -> bool {
    labels.is_empty() || labels.contains(&label)
}

/// Resolve the direction of `R` between a node labelled `a` and one labelled `b`.
///
/// Exactly one of the two orientations must be allowed by `R`'s declared
/// source and target labels.
pub fn resolve<R: CyflowRelation>(a: &str, b: &str) -> Result<Direction, UsageError> {
    let forward = allows(R::SOURCE_LABELS, a) && allows(R::TARGET_LABELS, b);
    let reverse = allows(R::SOURCE_LABELS, b) && allows(R::TARGET_LABELS, a);
    match (forward, reverse) {
        (true, false) => Ok(Direction::Forward),
        (false, true) => Ok(Direction::Reverse),
        (true, true) => Err(UsageError::AmbiguousDirection {
            relationship: R::TYPE.to_owned(),
            a: a.to_owned(),
            b: b.to_owned(),
        }),
        (false, false) => Err(UsageError::InvalidParticipants {
            relationship: R::TYPE.to_owned(),
            a: a.to_owned(),
            b: b.to_owned(),
        }),
    }
}

/// Render `(a)-[rel:R]->(b)` or its reverse for `R` between `A` and `B`.
///
/// `rel` may be empty for an anonymous relationship.
///
/// ```rust,ignore
/// let pattern = relationship_pattern::<Owns, Person, Car>("p", "c", "o")?;
/// assert_eq!(pattern, "(p)-[o:OWNS]->(c)");
/// ```
pub fn relationship_pattern<R, A, B>(a: &str, b: &str, rel: &str) -> Result<String, UsageError>
where
    R: CyflowRelation,
    A: CyflowNode,
    B: CyflowNode,
{
    let ty = escape_identifier(R::TYPE);
    Ok(match resolve::<R>(A::LABEL, B::LABEL)? {
        Direction::Forward => format!("({a})-[{rel}:{ty}]->({b})"),
        Direction::Reverse => format!("({a})<-[{rel}:{ty}]-({b})"),
    })
}
