use std::fmt::Write;

use itertools::Itertools;

use super::priority::MAX_PRIORITIES;
use super::{Comparator, ConditionNode, Layer, RuleKind, SelectionRule};
use crate::errors::{ErrorKind, SosiError, SosiResult};

/// Name of the rule created by [`SelectionSet::put_query_line`].
pub const QUERY_RULE_NAME: &str = "Query";

/// The three rule chains of a session plus the layers they share.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    group_rules: Vec<SelectionRule>,
    point_rules: Vec<SelectionRule>,
    pinfo_rules: Vec<SelectionRule>,
    layers: Vec<Layer>,
    max_priority: Option<i32>,
    test_all_points: bool,
}

impl SelectionSet {
    pub fn new() -> Self {
        SelectionSet::default()
    }

    pub fn rules(&self, kind: RuleKind) -> &[SelectionRule] {
        match kind {
            RuleKind::Group => &self.group_rules,
            RuleKind::Point => &self.point_rules,
            RuleKind::Pinfo => &self.pinfo_rules,
        }
    }

    fn chain_mut(&mut self, kind: RuleKind) -> &mut Vec<SelectionRule> {
        match kind {
            RuleKind::Group => &mut self.group_rules,
            RuleKind::Point => &mut self.point_rules,
            RuleKind::Pinfo => &mut self.pinfo_rules,
        }
    }

    fn all_rules(&self) -> impl Iterator<Item = &SelectionRule> {
        self.group_rules
            .iter()
            .chain(self.point_rules.iter())
            .chain(self.pinfo_rules.iter())
    }

    fn all_rules_mut(&mut self) -> impl Iterator<Item = &mut SelectionRule> {
        self.group_rules
            .iter_mut()
            .chain(self.point_rules.iter_mut())
            .chain(self.pinfo_rules.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.group_rules.len() + self.point_rules.len() + self.pinfo_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a complete rule to its chain.
    pub fn push_rule(&mut self, rule: SelectionRule) {
        if rule.kind() == RuleKind::Point && rule.uses(Comparator::NotPresent) {
            self.test_all_points = true;
        }
        self.chain_mut(rule.kind()).push(rule);
    }

    /// Whether point rules must see coordinates without PINFO.
    ///
    /// Set as soon as a point rule uses `!`, which can match an empty coordinate.
    pub fn test_all_points(&self) -> bool {
        self.test_all_points
    }

    /// Returns the layer named `name`, creating an active one if needed.
    pub fn layer_or_create(&mut self, name: &str) -> Layer {
        if let Some(layer) = self.layer(name) {
            return layer;
        }
        let layer = Layer::new(name);
        self.layers.push(layer.clone());
        layer
    }

    pub fn layer(&self, name: &str) -> Option<Layer> {
        let wanted = name.to_uppercase();
        self.layers.iter().find(|l| l.name() == wanted).cloned()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Appends one condition line to the "Query" rule of `kind`.
    ///
    /// Leading dots give the nesting level. The rule is created on first use.
    pub fn put_query_line(&mut self, kind: RuleKind, line: &str) -> SosiResult<()> {
        let trimmed = line.trim_start();
        let text = trimmed.trim_start_matches('.');
        let nesting = trimmed.len() - text.len();
        let node = ConditionNode::parse(text)?;

        let chain = self.chain_mut(kind);
        if chain.is_empty() {
            chain.push(SelectionRule::new(QUERY_RULE_NAME, kind));
        }
        let mut uses_not_present = false;
        if let Some(rule) = chain.last_mut() {
            rule.append_condition(nesting, node)?;
            uses_not_present = rule.uses(Comparator::NotPresent);
        }
        if kind == RuleKind::Point && uses_not_present {
            self.test_all_points = true;
        }
        Ok(())
    }

    /// Sets the label of the last rule of `kind`.
    pub fn put_rule_label(&mut self, kind: RuleKind, label: &str) -> SosiResult<()> {
        self.last_rule_mut(kind)?.set_label(label);
        Ok(())
    }

    /// Attaches the last rule of `kind` to the shared layer `name`.
    pub fn put_layer(&mut self, kind: RuleKind, name: &str) -> SosiResult<()> {
        let layer = self.layer_or_create(name);
        self.last_rule_mut(kind)?.set_layer(layer)
    }

    fn last_rule_mut(&mut self, kind: RuleKind) -> SosiResult<&mut SelectionRule> {
        match self.chain_mut(kind).last_mut() {
            Some(rule) => Ok(rule),
            None => {
                log::error!("No {} rule to modify", kind);
                Err(SosiError::new(
                    &format!("No {} rule to modify", kind),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Names of every rule: group rules, then point rules, then pinfo rules.
    pub fn rule_names(&self) -> Vec<&str> {
        self.all_rules().map(|r| r.name()).collect()
    }

    pub fn find_rule(&self, kind: RuleKind, name: &str) -> Option<&SelectionRule> {
        self.rules(kind).iter().find(|r| r.name() == name)
    }

    pub fn find_rule_mut(&mut self, kind: RuleKind, name: &str) -> Option<&mut SelectionRule> {
        self.chain_mut(kind).iter_mut().find(|r| r.name() == name)
    }

    pub fn find_pinfo_rule(&self, name: &str) -> Option<&SelectionRule> {
        self.find_rule(RuleKind::Pinfo, name)
    }

    /// Highest packed priority, `None` before packing or without rules.
    pub fn max_priority(&self) -> Option<i32> {
        self.max_priority
    }

    pub fn is_priority_used(&self, priority: i32) -> bool {
        self.all_rules().any(|r| r.priority() == priority)
    }

    /// Renumbers priorities to a dense `0..=max` range, keeping their order.
    ///
    /// Only the first [`MAX_PRIORITIES`] distinct priorities (in chain order)
    /// fit. Rules with any other priority are removed and reported.
    pub fn pack_priorities(&mut self) -> Vec<SosiError> {
        let mut kept: Vec<i32> = Vec::new();
        for priority in self.all_rules().map(|r| r.original_priority()).unique() {
            if kept.len() < MAX_PRIORITIES {
                kept.push(priority);
            }
        }
        kept.sort_unstable();

        let mut errors = Vec::new();
        for kind in [RuleKind::Group, RuleKind::Point, RuleKind::Pinfo] {
            self.chain_mut(kind).retain(|rule| {
                if kept.binary_search(&rule.original_priority()).is_ok() {
                    true
                } else {
                    log::warn!(
                        "Discarding rule {} with priority {}: more than {} distinct priorities",
                        rule.name(),
                        rule.original_priority(),
                        MAX_PRIORITIES
                    );
                    errors.push(SosiError::new(
                        &format!(
                            "Rule {} discarded, priority {} exceeds {} distinct priorities",
                            rule.name(),
                            rule.original_priority(),
                            MAX_PRIORITIES
                        ),
                        ErrorKind::PriorityOverflow,
                    ));
                    false
                }
            });
        }

        for rule in self.all_rules_mut() {
            if let Ok(packed) = kept.binary_search(&rule.original_priority()) {
                rule.set_packed_priority(packed as i32);
            }
        }

        self.max_priority = if self.is_empty() {
            None
        } else {
            Some(kept.len() as i32 - 1)
        };
        log::debug!(
            "Packed {} distinct priorities over {} rules",
            kept.len(),
            self.len()
        );
        errors
    }

    /// Lists every priority bucket with its group and point rules.
    pub fn priority_overview(&self) -> String {
        let mut report = String::from("Priorities and rules\n");
        let mut group_count = 0;
        let mut point_count = 0;

        if let Some(max) = self.max_priority {
            for priority in 0..=max {
                let _ = writeln!(report, "Priority: {}", priority);
                for rule in self.group_rules.iter().filter(|r| r.priority() == priority) {
                    let _ = writeln!(
                        report,
                        "   Group rule: {} ({})",
                        rule.name(),
                        rule.original_priority()
                    );
                    group_count += 1;
                }
                for rule in self.point_rules.iter().filter(|r| r.priority() == priority) {
                    let _ = writeln!(
                        report,
                        "   Point rule: {} ({})",
                        rule.name(),
                        rule.original_priority()
                    );
                    point_count += 1;
                }
            }
        }
        let _ = write!(
            report,
            "Total {} group rules and {} point rules.",
            group_count, point_count
        );
        log::info!("{}", report);
        report
    }

    /// Drops every rule and layer.
    pub fn clear(&mut self) {
        *self = SelectionSet::default();
    }
}
