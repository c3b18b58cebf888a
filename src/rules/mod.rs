//! Module for rules.
//!
//! A rule is a declarative single-fact pattern: a [`Predicate`] over the fact
//! model plus the category, confidence and rationale of the findings it emits.
//! Rules are pure and independent, so the registry can evaluate them in any
//! order.

mod catalogue;
mod predicate;
#[cfg(test)]
mod tests;

pub use self::predicate::{Match, Predicate};
use crate::{
    criticality::{Confidence, Criticality},
    error::ErrorKind,
    facts::{ApplicationFacts, FactKind},
    results::{Category, Finding, FindingFlag, Origin, SeverityTable},
};
use log::debug;
use regex::Regex;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};
use std::{
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    fmt,
};

/// Vulnerability searching rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    id: String,
    category: Category,
    confidence: Confidence,
    rationale: String,
    predicate: Predicate,
    #[serde(deserialize_with = "deserialize_component_regex")]
    #[serde(default)]
    include_component: Option<Regex>,
    #[serde(deserialize_with = "deserialize_component_regex")]
    #[serde(default)]
    exclude_component: Option<Regex>,
}

impl Rule {
    /// Gets the identifier of the rule.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the category of the findings of this rule.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Gets the confidence of the findings of this rule.
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Gets the rationale of the rule.
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Gets the predicate of the rule.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Gets the fact kinds read by the rule.
    pub fn reads(&self) -> Vec<FactKind> {
        self.predicate.reads()
    }

    /// Returns if this rule has to be applied to the given component.
    pub fn has_to_check(&self, component: &str) -> bool {
        if self.include_component.is_none() && self.exclude_component.is_none() {
            return true;
        }

        let mut has_to_check = true;

        if let Some(ref r) = self.include_component {
            has_to_check = r.is_match(component)
        }

        if let Some(ref r) = self.exclude_component {
            has_to_check = has_to_check && !r.is_match(component)
        }

        has_to_check
    }

    /// Evaluates the rule against the facts of one application.
    pub fn evaluate(&self, facts: &ApplicationFacts) -> Vec<Finding> {
        self.predicate
            .evaluate(facts)
            .into_iter()
            .filter(|m| self.has_to_check(m.component))
            .map(|m| {
                let mut flags = BTreeSet::new();
                let confidence = if m.ambiguous {
                    let _ = flags.insert(FindingFlag::AmbiguousProvenance);
                    self.confidence.downgrade()
                } else {
                    self.confidence
                };

                Finding::new(
                    Origin::Rule(self.id.clone()),
                    self.category,
                    confidence,
                    self.rationale.as_str(),
                    m.evidence,
                    flags,
                )
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ErrorKind> {
        if self.id.trim().is_empty() {
            return Err(ErrorKind::InvalidRule {
                id: self.id.clone(),
                message: "the rule identifier cannot be empty".to_owned(),
            });
        }
        if self.rationale.trim().is_empty() {
            return Err(ErrorKind::InvalidRule {
                id: self.id.clone(),
                message: "every rule needs a rationale for report traceability".to_owned(),
            });
        }
        Ok(())
    }
}

/// Builder for rules of the built-in catalogue.
#[derive(Debug)]
pub struct RuleBuilder {
    id: String,
    category: Category,
    confidence: Confidence,
    rationale: String,
    predicate: Option<Predicate>,
    include_component: Option<Regex>,
    exclude_component: Option<Regex>,
}

impl RuleBuilder {
    /// Starts a new rule with high confidence.
    pub fn new<S: Into<String>>(id: S, category: Category) -> Self {
        Self {
            id: id.into(),
            category,
            confidence: Confidence::High,
            rationale: String::new(),
            predicate: None,
            include_component: None,
            exclude_component: None,
        }
    }

    /// Sets the confidence of the findings.
    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the rationale of the rule.
    pub fn rationale<S: Into<String>>(mut self, rationale: S) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Sets the predicate of the rule.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Only checks components whose name matches the expression.
    pub fn include_component(mut self, regex: Regex) -> Self {
        self.include_component = Some(regex);
        self
    }

    /// Skips components whose name matches the expression.
    pub fn exclude_component(mut self, regex: Regex) -> Self {
        self.exclude_component = Some(regex);
        self
    }

    /// Builds the rule.
    pub fn build(self) -> Result<Rule, ErrorKind> {
        let predicate = match self.predicate {
            Some(predicate) => predicate,
            None => {
                return Err(ErrorKind::InvalidRule {
                    id: self.id,
                    message: "a rule needs a predicate".to_owned(),
                })
            }
        };
        let rule = Rule {
            id: self.id,
            category: self.category,
            confidence: self.confidence,
            rationale: self.rationale,
            predicate,
            include_component: self.include_component,
            exclude_component: self.exclude_component,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Ordered set of rules, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Rule>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in catalogue.
    pub fn builtin() -> Result<Self, ErrorKind> {
        let mut registry = Self::new();
        registry.extend(catalogue::builtin_rules()?)?;
        Ok(registry)
    }

    /// Adds a rule. Identifiers must be unique.
    pub fn insert(&mut self, rule: Rule) -> Result<(), ErrorKind> {
        rule.validate()?;
        match self.rules.entry(rule.id().to_owned()) {
            Entry::Occupied(e) => Err(ErrorKind::InvalidRule {
                id: e.key().clone(),
                message: "a rule with the same identifier is already registered".to_owned(),
            }),
            Entry::Vacant(e) => {
                let _ = e.insert(rule);
                Ok(())
            }
        }
    }

    /// Adds every rule of the iterator.
    pub fn extend<I>(&mut self, rules: I) -> Result<(), ErrorKind>
    where
        I: IntoIterator<Item = Rule>,
    {
        for rule in rules {
            self.insert(rule)?;
        }
        Ok(())
    }

    /// Drops the rules whose category is below the minimum criticality.
    pub fn retain_min_criticality(&mut self, severity: &SeverityTable, min: Criticality) {
        self.rules.retain(|id, rule| {
            let keep = severity.criticality(rule.category()) >= min;
            if !keep {
                debug!("rule `{}` is below the minimum criticality, skipping it", id);
            }
            keep
        });
    }

    /// Gets a rule by identifier.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Iterates over the rules, in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Gets the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Checks if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Regular expression serde visitor.
struct RegexVisitor;

impl<'de> Visitor<'de> for RegexVisitor {
    type Value = Regex;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a valid regular expression")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Regex::new(value).map_err(E::custom)
    }
}

/// Deserializes component filter regular expressions.
fn deserialize_component_regex<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: Deserializer<'de>,
{
    /// Optional regular expression serde visitor.
    struct RegexOptionVisitor;

    impl<'de> Visitor<'de> for RegexOptionVisitor {
        type Value = Option<Regex>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a valid regular expression")
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_str(RegexVisitor).map(Some)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_option(RegexOptionVisitor)
}
