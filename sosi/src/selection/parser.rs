use std::io::BufRead;

use super::{ConditionNode, RuleKind, SelectionRule, SelectionSet};
use crate::errors::{ErrorKind, SosiError, SosiResult};

const PRIORITY_KEYWORD: &str = "PRIORITET";
const LABEL_KEYWORD: &str = "BRUK-REGEL";
const LAYER_KEYWORD: &str = "LAG";

/// Outcome of loading rule text.
///
/// Malformed rules never abort a load. They are discarded and reported here.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    rules_loaded: usize,
    rules_discarded: usize,
    errors: Vec<SosiError>,
}

impl ParseReport {
    pub fn rules_loaded(&self) -> usize {
        self.rules_loaded
    }

    pub fn rules_discarded(&self) -> usize {
        self.rules_discarded
    }

    pub fn errors(&self) -> &[SosiError] {
        &self.errors
    }

    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: ParseReport) {
        self.rules_loaded += other.rules_loaded;
        self.rules_discarded += other.rules_discarded;
        self.errors.extend(other.errors);
    }

    pub(crate) fn discard(&mut self, error: SosiError) {
        self.rules_discarded += 1;
        self.errors.push(error);
    }

    /// Records rules removed after they were counted as loaded.
    pub(crate) fn discard_loaded(&mut self, errors: Vec<SosiError>) {
        self.rules_loaded -= errors.len().min(self.rules_loaded);
        self.rules_discarded += errors.len();
        self.errors.extend(errors);
    }
}

/// A non-comment line of rule text.
#[derive(Debug, Clone)]
struct RuleLine {
    number: usize,
    level: usize,
    text: String,
}

impl RuleLine {
    fn read(number: usize, raw: &str) -> Option<RuleLine> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('!') {
            return None;
        }
        let text = trimmed.trim_start_matches('.');
        Some(RuleLine {
            number,
            level: trimmed.len() - text.len(),
            text: text.to_string(),
        })
    }

    fn keyword(&self) -> String {
        self.text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }

    fn argument(&self) -> Option<&str> {
        self.text.split_whitespace().nth(1)
    }

    fn is_directive(&self) -> bool {
        matches!(
            self.keyword().as_str(),
            PRIORITY_KEYWORD | LABEL_KEYWORD | LAYER_KEYWORD
        )
    }
}

/// Reads rule blocks into a [`SelectionSet`].
///
/// A block starts with `GRUPPE-UTVALG`, `PUNKT-UTVALG` or `PINFO-UTVALG`
/// and a rule name. Levels inside a block count from the header line:
/// directives (`PRIORITET`, `BRUK-REGEL`, `LAG`) sit at most one level
/// below it, and each further dot nests a condition one level deeper. A
/// line at or above the header level ends the block.
///
/// ```text
/// .GRUPPE-UTVALG Road
/// ..VELG ..OBJTYPE = Veg
/// ...OG ..KLASSE <> 1 3
/// ..PRIORITET 2
/// ..BRUK-REGEL ROAD
/// ```
pub struct RuleParser<'a> {
    set: &'a mut SelectionSet,
    stop_on_first_error: bool,
}

impl<'a> RuleParser<'a> {
    pub fn new(set: &'a mut SelectionSet) -> Self {
        RuleParser {
            set,
            stop_on_first_error: false,
        }
    }

    /// Stops at the first malformed rule instead of skipping it.
    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    /// Parses rule text and packs priorities afterwards.
    pub fn parse_str(&mut self, text: &str) -> ParseReport {
        let lines: Vec<RuleLine> = text
            .lines()
            .enumerate()
            .filter_map(|(index, raw)| RuleLine::read(index + 1, raw))
            .collect();
        self.parse_lines(&lines)
    }

    /// Parses rule text from a reader. Only read failures are errors.
    pub fn parse_reader<R: BufRead>(&mut self, reader: R) -> SosiResult<ParseReport> {
        let mut lines = Vec::new();
        for (index, raw) in reader.lines().enumerate() {
            let raw = raw.map_err(|e| {
                log::error!("Failed to read rule line {}: {}", index + 1, e);
                SosiError::new_with_cause(
                    &format!("Failed to read rule line {}", index + 1),
                    ErrorKind::IOError,
                    e.into(),
                )
            })?;
            if let Some(line) = RuleLine::read(index + 1, &raw) {
                lines.push(line);
            }
        }
        Ok(self.parse_lines(&lines))
    }

    fn parse_lines(&mut self, lines: &[RuleLine]) -> ParseReport {
        let mut report = ParseReport::default();
        let mut index = 0;

        while index < lines.len() {
            let line = &lines[index];
            match RuleKind::from_header_keyword(&line.keyword()) {
                Some(kind) => {
                    index = self.parse_block(lines, index, kind, &mut report);
                    if self.stop_on_first_error && report.had_errors() {
                        log::warn!("Rule loading stopped at line {}", line.number);
                        break;
                    }
                }
                None => {
                    log::debug!("Skipping line {} outside a rule block", line.number);
                    index += 1;
                }
            }
        }

        let overflow = self.set.pack_priorities();
        report.discard_loaded(overflow);
        log::debug!(
            "Loaded {} rules, discarded {}",
            report.rules_loaded(),
            report.rules_discarded()
        );
        report
    }

    /// Parses the block whose header is `lines[start]`. Returns the index
    /// of the first line after the block.
    fn parse_block(
        &mut self,
        lines: &[RuleLine],
        start: usize,
        kind: RuleKind,
        report: &mut ParseReport,
    ) -> usize {
        let header = &lines[start];
        let base = header.level;
        let name = header.argument().unwrap_or_default();
        let mut rule = SelectionRule::new(name, kind);
        let mut layer_name: Option<String> = None;
        let mut failure: Option<SosiError> = None;

        let mut index = start + 1;
        while index < lines.len() {
            let line = &lines[index];
            if RuleKind::from_header_keyword(&line.keyword()).is_some() {
                break;
            }
            let directive = line.is_directive() && line.level <= base + 1;
            if line.level <= base && !directive {
                break;
            }
            index += 1;
            if failure.is_some() {
                continue;
            }

            let outcome = if directive {
                Self::apply_directive(&mut rule, &mut layer_name, line)
            } else {
                ConditionNode::parse(&line.text)
                    .and_then(|node| rule.append_condition(line.level - base - 1, node))
            };
            if let Err(err) = outcome {
                failure = Some(SosiError::new_with_cause(
                    &format!("Rule {} discarded at line {}", rule.name(), line.number),
                    err.kind().clone(),
                    err,
                ));
            }
        }

        if failure.is_none() && rule.label().is_none() {
            failure = Some(SosiError::new(
                &format!(
                    "Rule {} at line {} has no {}",
                    rule.name(),
                    header.number,
                    LABEL_KEYWORD
                ),
                ErrorKind::MissingRuleLabel,
            ));
        }
        if failure.is_none() {
            if let Some(layer) = layer_name {
                let layer = self.set.layer_or_create(&layer);
                if let Err(err) = rule.set_layer(layer) {
                    failure = Some(err);
                }
            }
        }

        match failure {
            Some(err) => {
                log::warn!("{}", err);
                report.discard(err);
            }
            None => {
                log::debug!("Loaded rule {}", rule);
                self.set.push_rule(rule);
                report.rules_loaded += 1;
            }
        }
        index
    }

    fn apply_directive(
        rule: &mut SelectionRule,
        layer_name: &mut Option<String>,
        line: &RuleLine,
    ) -> SosiResult<()> {
        let keyword = line.keyword();
        let argument = line.argument().ok_or_else(|| {
            SosiError::new(
                &format!("{} without a value at line {}", keyword, line.number),
                ErrorKind::RuleSyntax,
            )
        })?;

        match keyword.as_str() {
            PRIORITY_KEYWORD => {
                let priority = argument.parse::<i32>()?;
                rule.set_priority(priority);
            }
            LABEL_KEYWORD => rule.set_label(argument),
            _ => {
                let name = argument.to_uppercase();
                match layer_name {
                    Some(existing) if *existing != name => {
                        return Err(SosiError::new(
                            &format!(
                                "Rule {} already belongs to layer {}",
                                rule.name(),
                                existing
                            ),
                            ErrorKind::InvalidOperation,
                        ));
                    }
                    _ => *layer_name = Some(name),
                }
            }
        }
        Ok(())
    }
}
