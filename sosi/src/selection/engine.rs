use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::evaluator::{test_line, GroupSubject};
use super::{
    ParseReport, PriorityFilter, PriorityMask, RuleKind, RuleParser, SelectionRule, SelectionSet,
};
use crate::common::{CancelCheck, GroupRef, LayerMask, PollGate};
use crate::engine_builder::SelectionEngineBuilder;
use crate::engine_config::EngineConfig;
use crate::errors::{ErrorKind, SosiError, SosiResult};
use crate::store::{
    restore_current_group, AttributeOccurrence, AttributeSource, GroupStore, PointAttributeSource,
};

/// A rule that matched, as returned by the find operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_name: String,
    /// The rule's `BRUK-REGEL` label.
    pub label: Option<String>,
    /// Packed priority of the rule.
    pub priority: i32,
}

impl RuleMatch {
    fn of(rule: &SelectionRule) -> Self {
        RuleMatch {
            rule_name: rule.name().to_string(),
            label: rule.label().map(str::to_string),
            priority: rule.priority(),
        }
    }
}

/// Result of a find-all sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep visited every group and marked this many.
    Completed(usize),
    /// The cancel hook stopped the sweep. Marks made so far stay set.
    Aborted,
}

impl SweepOutcome {
    pub fn matches(&self) -> Option<usize> {
        match self {
            SweepOutcome::Completed(count) => Some(*count),
            SweepOutcome::Aborted => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SweepOutcome::Aborted)
    }
}

/// How the ring verdicts of a polygon's boundary members combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePolicy {
    /// Every member matches the ring rule. No members means no match.
    All,
    /// At least one member matches.
    Any,
    /// No member matches.
    None,
}

/// Where [`SelectionEngine::lookup_attribute`] searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    /// The current group only.
    Group,
    /// The current group, then the header of its file.
    GroupThenHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeLocation {
    Group,
    Header,
}

/// A successful single-line attribute lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLookup {
    pub location: AttributeLocation,
    /// The occurrence that satisfied the line. Absent for comparators that
    /// succeed without one, such as `!` or `!=`.
    pub occurrence: Option<AttributeOccurrence>,
}

/// Evaluates selection rules against a group store.
///
/// The engine owns one [`SelectionSet`] plus the session state the find
/// operations share: the positions of the group and point rule cursors
/// and the "group already chosen" flag read by `IV` conditions.
pub struct SelectionEngine {
    config: EngineConfig,
    rules: SelectionSet,
    group_cursor: Option<usize>,
    point_cursor: Option<usize>,
    group_chosen: bool,
    report: Option<ParseReport>,
}

impl SelectionEngine {
    /// Creates an engine with an empty rule set. Freezes `config`.
    pub fn new(config: EngineConfig) -> Self {
        config.freeze();
        SelectionEngine {
            config,
            rules: SelectionSet::new(),
            group_cursor: None,
            point_cursor: None,
            group_chosen: false,
            report: None,
        }
    }

    /// Opens a session with the default configuration.
    pub fn open_session() -> Self {
        SelectionEngine::new(EngineConfig::new())
    }

    pub fn builder() -> SelectionEngineBuilder {
        SelectionEngineBuilder::new()
    }

    /// Drops every rule and resets the session state.
    pub fn close_session(&mut self) {
        self.rules.clear();
        self.reset_cursors();
        self.report = None;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &SelectionSet {
        &self.rules
    }

    /// Direct access to the rule set, for building rules through the API.
    pub fn rules_mut(&mut self) -> &mut SelectionSet {
        self.reset_cursors();
        &mut self.rules
    }

    /// All parse results since the session was opened.
    pub fn parse_report(&self) -> Option<&ParseReport> {
        self.report.as_ref()
    }

    /// Whether the last group evaluation found a matching rule.
    pub fn is_group_chosen(&self) -> bool {
        self.group_chosen
    }

    fn reset_cursors(&mut self) {
        self.group_cursor = None;
        self.point_cursor = None;
        self.group_chosen = false;
    }

    // ====================================================================
    // Loading
    // ====================================================================

    /// Loads rule text. Malformed rules are skipped and listed in the report.
    pub fn load_rules_from_text(&mut self, text: &str) -> ParseReport {
        let stop = self.config.stop_on_first_error();
        let report = RuleParser::new(&mut self.rules)
            .stop_on_first_error(stop)
            .parse_str(text);
        self.record(report)
    }

    /// Loads a rule file. Fails only if the file cannot be read.
    pub fn load_rules_from_file<P: AsRef<Path>>(&mut self, path: P) -> SosiResult<ParseReport> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            log::error!("Could not open rule file {}: {}", path.display(), e);
            SosiError::new_with_cause(
                &format!("Could not open rule file {}", path.display()),
                ErrorKind::IOError,
                e.into(),
            )
        })?;
        let stop = self.config.stop_on_first_error();
        let report = RuleParser::new(&mut self.rules)
            .stop_on_first_error(stop)
            .parse_reader(BufReader::new(file))?;
        Ok(self.record(report))
    }

    fn record(&mut self, report: ParseReport) -> ParseReport {
        self.reset_cursors();
        self.report
            .get_or_insert_with(ParseReport::default)
            .merge(report.clone());
        report
    }

    // ====================================================================
    // Toggles
    // ====================================================================

    /// Switches every rule of layer `name` on or off.
    pub fn set_layer_active(&mut self, name: &str, active: bool) -> SosiResult<()> {
        match self.rules.layer(name) {
            Some(layer) => {
                layer.set_active(active);
                Ok(())
            }
            None => {
                log::error!("Layer {} is not defined", name);
                Err(SosiError::new(
                    &format!("Layer {} is not defined", name),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Enables or disables drawing for the group rule `name`.
    pub fn set_rule_drawn(&mut self, name: &str, drawn: bool) -> SosiResult<()> {
        match self.rules.find_rule_mut(RuleKind::Group, name) {
            Some(rule) => {
                rule.set_drawn(drawn);
                Ok(())
            }
            None => {
                log::error!("Group rule {} does not exist", name);
                Err(SosiError::new(
                    &format!("Group rule {} does not exist", name),
                    ErrorKind::RuleNotFound,
                ))
            }
        }
    }

    // ====================================================================
    // Single entity evaluation
    // ====================================================================

    /// Finds the first group rule matching the current group.
    pub fn find_first_group_match<A: AttributeSource + ?Sized>(
        &mut self,
        source: &A,
        filter: PriorityFilter,
    ) -> Option<RuleMatch> {
        self.group_chosen = false;
        self.scan_group_rules(source, filter, 0)
    }

    /// Continues after the rule returned by the previous find.
    pub fn find_next_group_match<A: AttributeSource + ?Sized>(
        &mut self,
        source: &A,
        filter: PriorityFilter,
    ) -> Option<RuleMatch> {
        let start = self.group_cursor? + 1;
        self.scan_group_rules(source, filter, start)
    }

    fn scan_group_rules<A: AttributeSource + ?Sized>(
        &mut self,
        source: &A,
        filter: PriorityFilter,
        start: usize,
    ) -> Option<RuleMatch> {
        let chosen = self.group_chosen;
        let hit = self
            .rules
            .rules(RuleKind::Group)
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, rule)| filter.accepts(rule.priority()) && rule.matches_group(source, chosen))
            .map(|(index, rule)| (index, RuleMatch::of(rule)));

        match hit {
            Some((index, found)) => {
                self.group_chosen = true;
                self.group_cursor = Some(index);
                Some(found)
            }
            None => {
                self.group_cursor = None;
                None
            }
        }
    }

    /// Finds the first point rule matching coordinate `point` (1-based).
    ///
    /// Coordinates without PINFO never match unless a point rule uses `!`.
    pub fn find_first_point_match<P: PointAttributeSource + ?Sized>(
        &mut self,
        source: &P,
        point: usize,
        filter: PriorityFilter,
    ) -> Option<RuleMatch> {
        if !self.rules.test_all_points() && !source.has_point_info(point) {
            self.point_cursor = None;
            return None;
        }
        self.scan_point_rules(source, point, filter, 0)
    }

    pub fn find_next_point_match<P: PointAttributeSource + ?Sized>(
        &mut self,
        source: &P,
        point: usize,
        filter: PriorityFilter,
    ) -> Option<RuleMatch> {
        let start = self.point_cursor? + 1;
        self.scan_point_rules(source, point, filter, start)
    }

    fn scan_point_rules<P: PointAttributeSource + ?Sized>(
        &mut self,
        source: &P,
        point: usize,
        filter: PriorityFilter,
        start: usize,
    ) -> Option<RuleMatch> {
        let hit = self
            .rules
            .rules(RuleKind::Point)
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, rule)| filter.accepts(rule.priority()) && rule.matches_point(source, point))
            .map(|(index, rule)| (index, RuleMatch::of(rule)));

        self.point_cursor = hit.as_ref().map(|(index, _)| *index);
        hit.map(|(_, found)| found)
    }

    /// Tests only the first group rule against the current group.
    pub fn group_query<A: AttributeSource + ?Sized>(&mut self, source: &A) -> bool {
        self.group_chosen = false;
        self.rules
            .rules(RuleKind::Group)
            .first()
            .is_some_and(|rule| rule.matches_group(source, false))
    }

    fn point_is_tested<P: PointAttributeSource + ?Sized>(&self, source: &P, point: usize) -> bool {
        self.rules.test_all_points() || source.has_point_info(point)
    }

    /// Collects the priorities matched by the current group and its coordinates.
    ///
    /// A rule is skipped once its priority bucket is set, so each bucket
    /// costs at most one successful evaluation.
    pub fn compute_matched_priorities<S: GroupStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> SosiResult<PriorityMask> {
        if store.current_group().is_none() {
            log::error!("Cannot compute priorities without a current group");
            return Err(SosiError::new(
                "Cannot compute priorities without a current group",
                ErrorKind::InvalidOperation,
            ));
        }

        let mut mask = PriorityMask::computed();
        self.group_chosen = false;
        for rule in self.rules.rules(RuleKind::Group) {
            if !mask.contains(rule.priority()) && rule.matches_group(store, self.group_chosen) {
                self.group_chosen = true;
                mask.insert(rule.priority());
            }
        }

        for point in 1..=store.point_count() {
            if !self.point_is_tested(store, point) {
                continue;
            }
            for rule in self.rules.rules(RuleKind::Point) {
                if !mask.contains(rule.priority()) && rule.matches_point(store, point) {
                    mask.insert(rule.priority());
                }
            }
        }
        Ok(mask)
    }

    /// Tests one condition line against the current group and, if asked,
    /// the header of its file. The current group is left unchanged.
    pub fn lookup_attribute<S: GroupStore + ?Sized>(
        store: &mut S,
        query_line: &str,
        scope: LookupScope,
    ) -> SosiResult<Option<AttributeLookup>> {
        let mut scratch = SelectionSet::new();
        scratch.put_query_line(RuleKind::Group, query_line)?;
        let node = match scratch.rules(RuleKind::Group).first().and_then(|r| r.conditions().first()) {
            Some(node) => node.clone(),
            None => return Ok(None),
        };

        let current = match store.current_group() {
            Some(group) => group,
            None => {
                log::error!("Attribute lookup needs a current group");
                return Err(SosiError::new(
                    "Attribute lookup needs a current group",
                    ErrorKind::InvalidOperation,
                ));
            }
        };

        let verdict = test_line(&node, &GroupSubject::new(&*store, false));
        if verdict.matched {
            return Ok(Some(AttributeLookup {
                location: AttributeLocation::Group,
                occurrence: verdict.hit,
            }));
        }

        let header = GroupRef::header(current.file_id());
        if scope != LookupScope::GroupThenHeader || store.group_kind(header).is_none() {
            return Ok(None);
        }

        store.select_group(header)?;
        let verdict = test_line(&node, &GroupSubject::new(&*store, false));
        restore_current_group(store, Some(current))?;
        Ok(verdict.matched.then_some(AttributeLookup {
            location: AttributeLocation::Header,
            occurrence: verdict.hit,
        }))
    }

    // ====================================================================
    // Sweeps
    // ====================================================================

    /// Marks every group in `layers` that matches the first group rule.
    ///
    /// Later group rules are ignored, as are priorities. Clears the store's found marks first and restores the current group
    /// when done, also when cancelled or failing.
    pub fn find_all_group_matches<S, C>(
        &mut self,
        store: &mut S,
        layers: LayerMask,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let saved = store.current_group();
        store.clear_found();
        let outcome = self.sweep_groups(store, layers, cancel);
        let restored = restore_current_group(store, saved);
        let outcome = outcome?;
        restored?;
        log::debug!("Group sweep over {} finished: {:?}", layers, outcome);
        Ok(outcome)
    }

    fn sweep_groups<S, C>(
        &mut self,
        store: &mut S,
        layers: LayerMask,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let mut gate = PollGate::new(cancel, self.config.cancel_poll_interval());
        let mut count = 0;
        for group in store.groups(layers) {
            store.select_group(group)?;
            if self.group_query(&*store) {
                store.mark_found(group);
                count += 1;
            }
            if gate.tick() {
                log::warn!("Group sweep cancelled after {} matches", count);
                return Ok(SweepOutcome::Aborted);
            }
        }
        Ok(SweepOutcome::Completed(count))
    }

    /// Marks every group in `layers` where a coordinate matches a point rule.
    ///
    /// Testing a group stops at its first matching coordinate. The cancel
    /// hook is polled per coordinate as well as per group.
    pub fn find_all_point_matches<S, C>(
        &mut self,
        store: &mut S,
        layers: LayerMask,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let saved = store.current_group();
        store.clear_found();
        let outcome = self.sweep_points(store, layers, cancel);
        let restored = restore_current_group(store, saved);
        let outcome = outcome?;
        restored?;
        log::debug!("Point sweep over {} finished: {:?}", layers, outcome);
        Ok(outcome)
    }

    fn sweep_points<S, C>(
        &mut self,
        store: &mut S,
        layers: LayerMask,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let mut gate = PollGate::new(cancel, self.config.cancel_poll_interval());
        let mut count = 0;
        for group in store.groups(layers) {
            store.select_group(group)?;
            for point in 1..=store.point_count() {
                let matched = self.point_is_tested(&*store, point)
                    && self
                        .rules
                        .rules(RuleKind::Point)
                        .iter()
                        .any(|rule| rule.matches_point(&*store, point));
                if matched {
                    store.mark_found(group);
                    count += 1;
                    break;
                }
                if gate.tick() {
                    log::warn!("Point sweep cancelled after {} matches", count);
                    return Ok(SweepOutcome::Aborted);
                }
            }
            if gate.tick() {
                log::warn!("Point sweep cancelled after {} matches", count);
                return Ok(SweepOutcome::Aborted);
            }
        }
        Ok(SweepOutcome::Completed(count))
    }

    /// Marks every polygon that matches this engine's first group rule and
    /// whose boundary members satisfy `ring`'s first group rule under `policy`.
    pub fn find_all_combined_flate_matches<S, C>(
        &mut self,
        ring: &mut SelectionEngine,
        store: &mut S,
        layers: LayerMask,
        policy: CombinePolicy,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let saved = store.current_group();
        store.clear_found();
        let outcome = self.sweep_flates(ring, store, layers, policy, cancel);
        let restored = restore_current_group(store, saved);
        let outcome = outcome?;
        restored?;
        log::debug!(
            "Combined flate sweep ({:?}) over {} finished: {:?}",
            policy,
            layers,
            outcome
        );
        Ok(outcome)
    }

    fn sweep_flates<S, C>(
        &mut self,
        ring: &mut SelectionEngine,
        store: &mut S,
        layers: LayerMask,
        policy: CombinePolicy,
        cancel: &mut C,
    ) -> SosiResult<SweepOutcome>
    where
        S: GroupStore + ?Sized,
        C: CancelCheck + ?Sized,
    {
        let mut gate = PollGate::new(cancel, self.config.cancel_poll_interval());
        let mut count = 0;
        for group in store.groups(layers) {
            if store.is_flate(group) {
                store.select_group(group)?;
                if self.group_query(&*store)
                    && Self::ring_verdict(ring, store, group, policy)?
                {
                    store.mark_found(group);
                    count += 1;
                }
            }
            if gate.tick() {
                log::warn!("Combined flate sweep cancelled after {} matches", count);
                return Ok(SweepOutcome::Aborted);
            }
        }
        Ok(SweepOutcome::Completed(count))
    }

    fn ring_verdict<S: GroupStore + ?Sized>(
        ring: &mut SelectionEngine,
        store: &mut S,
        flate: GroupRef,
        policy: CombinePolicy,
    ) -> SosiResult<bool> {
        let members = store.boundary_members(flate)?;
        let mut last = false;
        for member in members {
            store.select_group(member.group)?;
            last = ring.group_query(&*store);
            let stop = match policy {
                CombinePolicy::All => !last,
                CombinePolicy::Any | CombinePolicy::None => last,
            };
            if stop {
                break;
            }
        }
        store.select_group(flate)?;
        Ok(match policy {
            CombinePolicy::None => !last,
            CombinePolicy::All | CombinePolicy::Any => last,
        })
    }
}
