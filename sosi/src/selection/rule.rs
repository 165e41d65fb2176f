use std::fmt::{Display, Formatter};

use super::evaluator::{evaluate_conditions, GroupSubject, PointSubject};
use super::{Comparator, ConditionNode, Layer};
use crate::errors::{ErrorKind, SosiError, SosiResult};
use crate::store::{AttributeSource, PointAttributeSource};

/// Which chain a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `GRUPPE-UTVALG`, tested against GINFO.
    Group,
    /// `PUNKT-UTVALG`, tested against the PINFO of each coordinate.
    Point,
    /// `PINFO-UTVALG`, looked up by name.
    Pinfo,
}

impl RuleKind {
    pub fn header_keyword(&self) -> &'static str {
        match self {
            RuleKind::Group => "GRUPPE-UTVALG",
            RuleKind::Point => "PUNKT-UTVALG",
            RuleKind::Pinfo => "PINFO-UTVALG",
        }
    }

    pub fn from_header_keyword(word: &str) -> Option<RuleKind> {
        match word.to_ascii_uppercase().as_str() {
            "GRUPPE-UTVALG" => Some(RuleKind::Group),
            "PUNKT-UTVALG" => Some(RuleKind::Point),
            "PINFO-UTVALG" => Some(RuleKind::Pinfo),
            _ => None,
        }
    }
}

impl Display for RuleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header_keyword())
    }
}

/// Edit status of a rule, kept for callers that maintain rule files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleStatus {
    #[default]
    Unchanged,
    Changed,
    New,
    Deleted,
}

/// A named selection rule: a forest of conditions plus the rule's
/// priority, label and optional layer.
#[derive(Debug, Clone)]
pub struct SelectionRule {
    name: String,
    kind: RuleKind,
    priority: i32,
    original_priority: i32,
    status: RuleStatus,
    drawn: bool,
    layer: Option<Layer>,
    label: Option<String>,
    conditions: Vec<ConditionNode>,
}

impl SelectionRule {
    pub fn new(name: &str, kind: RuleKind) -> Self {
        SelectionRule {
            name: name.to_string(),
            kind,
            priority: 0,
            original_priority: 0,
            status: RuleStatus::Unchanged,
            drawn: true,
            layer: None,
            label: None,
            conditions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Packed priority, dense from 0 after loading.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Priority as written in the rule text.
    pub fn original_priority(&self) -> i32 {
        self.original_priority
    }

    /// Sets both the packed and the original priority.
    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
        self.original_priority = priority;
    }

    pub(crate) fn set_packed_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn status(&self) -> RuleStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RuleStatus) {
        self.status = status;
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    pub fn set_drawn(&mut self, drawn: bool) {
        self.drawn = drawn;
    }

    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    /// Attaches the rule to `layer`. A rule belongs to at most one layer.
    pub fn set_layer(&mut self, layer: Layer) -> SosiResult<()> {
        match &self.layer {
            Some(existing) if !existing.same_as(&layer) => {
                log::error!(
                    "Rule {} already belongs to layer {}, cannot move it to {}",
                    self.name,
                    existing.name(),
                    layer.name()
                );
                Err(SosiError::new(
                    &format!(
                        "Rule {} already belongs to layer {}",
                        self.name,
                        existing.name()
                    ),
                    ErrorKind::InvalidOperation,
                ))
            }
            _ => {
                self.layer = Some(layer);
                Ok(())
            }
        }
    }

    /// The `BRUK-REGEL` label returned on a match.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = Some(label.to_uppercase());
    }

    pub fn conditions(&self) -> &[ConditionNode] {
        &self.conditions
    }

    /// Appends a condition at `nesting` levels below the top.
    ///
    /// The node becomes the last child of the last node on the previous
    /// level, so nesting may grow by at most one per line.
    pub fn append_condition(&mut self, nesting: usize, node: ConditionNode) -> SosiResult<()> {
        if nesting == 0 {
            self.conditions.push(node);
            return Ok(());
        }

        let rule_name = self.name.clone();
        let nesting_error = move || {
            log::error!("Condition nested {} levels deep has no parent in rule {}", nesting, rule_name);
            SosiError::new(
                &format!(
                    "Condition nested {} levels deep has no parent in rule {}",
                    nesting, rule_name
                ),
                ErrorKind::InvalidNesting,
            )
        };

        let mut parent = self.conditions.last_mut().ok_or_else(nesting_error.clone())?;
        for _ in 1..nesting {
            parent = parent
                .children_mut()
                .last_mut()
                .ok_or_else(nesting_error.clone())?;
        }
        parent.children_mut().push(node);
        Ok(())
    }

    /// Whether any condition of the rule uses `comparator`.
    pub fn uses(&self, comparator: Comparator) -> bool {
        self.conditions.iter().any(|c| c.uses(comparator))
    }

    /// A group rule only runs while its layer is active and it is drawn.
    pub fn is_enabled(&self) -> bool {
        self.drawn && self.layer.as_ref().map_or(true, |l| l.is_active())
    }

    /// Tests the rule against the GINFO of the current group.
    ///
    /// `chosen` tells `IV` conditions whether another rule already matched.
    pub fn matches_group<A: AttributeSource + ?Sized>(&self, source: &A, chosen: bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        evaluate_conditions(&self.conditions, &GroupSubject::new(source, chosen))
    }

    /// Tests the rule against the PINFO of coordinate `point` (1-based).
    pub fn matches_point<P: PointAttributeSource + ?Sized>(&self, source: &P, point: usize) -> bool {
        evaluate_conditions(&self.conditions, &PointSubject::new(source, point))
    }
}

impl Display for SelectionRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if let Some(label) = &self.label {
            write!(f, " -> {}", label)?;
        }
        Ok(())
    }
}
