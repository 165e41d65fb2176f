use super::{Comparator, ConditionNode, Connector};
use crate::store::{AttributeOccurrence, AttributeSource, PointAttributeSource};

/// What a condition is evaluated against: the GINFO of the current group
/// or the PINFO of one coordinate.
pub(crate) trait Subject {
    fn first(&self, name: &str) -> Option<AttributeOccurrence>;

    fn after(&self, name: &str, previous: &AttributeOccurrence) -> Option<AttributeOccurrence>;

    /// Whether a rule already matched the entity. `None` where the notion
    /// does not apply (coordinates).
    fn chosen(&self) -> Option<bool>;
}

pub(crate) struct GroupSubject<'a, A: AttributeSource + ?Sized> {
    source: &'a A,
    chosen: bool,
}

impl<'a, A: AttributeSource + ?Sized> GroupSubject<'a, A> {
    pub(crate) fn new(source: &'a A, chosen: bool) -> Self {
        GroupSubject { source, chosen }
    }
}

impl<A: AttributeSource + ?Sized> Subject for GroupSubject<'_, A> {
    fn first(&self, name: &str) -> Option<AttributeOccurrence> {
        self.source.attribute(name, 1)
    }

    fn after(&self, name: &str, previous: &AttributeOccurrence) -> Option<AttributeOccurrence> {
        self.source.attribute(name, previous.line + 1)
    }

    fn chosen(&self) -> Option<bool> {
        Some(self.chosen)
    }
}

pub(crate) struct PointSubject<'a, P: PointAttributeSource + ?Sized> {
    source: &'a P,
    point: usize,
}

impl<'a, P: PointAttributeSource + ?Sized> PointSubject<'a, P> {
    pub(crate) fn new(source: &'a P, point: usize) -> Self {
        PointSubject { source, point }
    }
}

impl<P: PointAttributeSource + ?Sized> Subject for PointSubject<'_, P> {
    fn first(&self, name: &str) -> Option<AttributeOccurrence> {
        self.source.point_attribute(name, self.point, 1)
    }

    fn after(&self, name: &str, previous: &AttributeOccurrence) -> Option<AttributeOccurrence> {
        self.source.point_attribute(name, self.point, previous.line + 1)
    }

    fn chosen(&self) -> Option<bool> {
        None
    }
}

/// Lazily fetches the occurrences of one attribute, one read per step.
struct Occurrences<'a, S: Subject + ?Sized> {
    subject: &'a S,
    name: &'a str,
    last: Option<AttributeOccurrence>,
    done: bool,
}

impl<'a, S: Subject + ?Sized> Occurrences<'a, S> {
    fn new(subject: &'a S, name: &'a str) -> Self {
        Occurrences {
            subject,
            name,
            last: None,
            done: false,
        }
    }
}

impl<S: Subject + ?Sized> Iterator for Occurrences<'_, S> {
    type Item = AttributeOccurrence;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match &self.last {
            None => self.subject.first(self.name),
            Some(previous) if previous.has_more => self.subject.after(self.name, previous),
            Some(_) => None,
        };
        match next {
            Some(occurrence) => {
                self.last = Some(occurrence.clone());
                Some(occurrence)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Outcome of testing a single condition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineVerdict {
    pub matched: bool,
    /// The occurrence that decided a positive verdict, when there is one.
    pub hit: Option<AttributeOccurrence>,
}

impl LineVerdict {
    fn of(matched: bool) -> Self {
        LineVerdict { matched, hit: None }
    }
}

/// Tests one condition line, ignoring its children.
pub(crate) fn test_line<S: Subject + ?Sized>(node: &ConditionNode, subject: &S) -> LineVerdict {
    let mut occurrences = Occurrences::new(subject, node.attribute());

    match node.comparator() {
        Comparator::NotPresent => LineVerdict::of(occurrences.next().is_none()),
        Comparator::All => {
            let hit = occurrences.next();
            LineVerdict {
                matched: hit.is_some(),
                hit,
            }
        }
        Comparator::Multiple => {
            let hit = occurrences.nth(1);
            LineVerdict {
                matched: hit.is_some(),
                hit,
            }
        }
        Comparator::NotMoreThan => {
            let limit = node.occurrence_limit();
            LineVerdict::of(occurrences.take(limit + 1).count() <= limit)
        }
        Comparator::NotChosen => LineVerdict::of(subject.chosen() == Some(false)),
        Comparator::NotEqual | Comparator::NotContains => {
            let positive = node.comparator().positive_form();
            let any = positive
                .is_some_and(|c| occurrences.any(|o| node.matches_value(c, &o.value)));
            LineVerdict::of(!any)
        }
        comparator => {
            let hit = occurrences.find(|o| node.matches_value(comparator, &o.value));
            LineVerdict {
                matched: hit.is_some(),
                hit,
            }
        }
    }
}

#[inline]
fn is_tested(result: bool, connector: Connector) -> bool {
    (result && connector == Connector::And) || (!result && connector == Connector::Or)
}

/// Tests `node`, then lets each child refine the verdict.
///
/// A child runs only when it can change the running result: an `OG` child
/// while it is true, an `ELLER` child while it is false.
pub(crate) fn evaluate_subtree<S: Subject + ?Sized>(node: &ConditionNode, subject: &S) -> bool {
    let mut result = test_line(node, subject).matched;
    for child in node.children() {
        if is_tested(result, child.connector()) {
            result = evaluate_subtree(child, subject);
        }
    }
    result
}

/// Folds the top-level conditions of a rule. The first one is always tested.
pub(crate) fn evaluate_conditions<S: Subject + ?Sized>(
    conditions: &[ConditionNode],
    subject: &S,
) -> bool {
    let mut result = false;
    for (index, node) in conditions.iter().enumerate() {
        if index == 0 || is_tested(result, node.connector()) {
            result = evaluate_subtree(node, subject);
        }
    }
    result
}
