//! Module containing the results of a scan.
//!
//! Findings from the matcher and the chain linker end up here: they get
//! deduplicated, ranked against the severity table and aggregated per
//! application.

mod finding;
mod ranking;

pub use self::{
    finding::{Category, Finding, FindingFlag, Origin},
    ranking::{rank, RankedFinding},
};
use crate::{criticality::Criticality, error::ErrorKind, facts::ApplicationFacts};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;

/// Category severity table.
///
/// Built once from the configuration and passed by reference to the ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityTable {
    table: BTreeMap<Category, Criticality>,
}

impl SeverityTable {
    /// Gets the criticality of a category.
    pub fn criticality(&self, category: Category) -> Criticality {
        self.table
            .get(&category)
            .copied()
            .unwrap_or(Criticality::Warning)
    }

    /// Overrides the criticality of a category.
    pub fn set(&mut self, category: Category, criticality: Criticality) {
        let _ = self.table.insert(category, criticality);
    }

    /// Applies the `[severity]` overrides of the configuration file.
    pub fn with_overrides<'o, I>(mut self, overrides: I) -> Result<Self, ErrorKind>
    where
        I: IntoIterator<Item = (&'o String, &'o Criticality)>,
    {
        for (name, criticality) in overrides {
            let category = name.parse()?;
            self.set(category, *criticality);
        }
        Ok(self)
    }

    /// Iterates over every category and its criticality.
    pub fn iter(&self) -> impl Iterator<Item = (Category, Criticality)> + '_ {
        self.table.iter().map(|(c, k)| (*c, *k))
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        let table = Category::ALL
            .iter()
            .map(|&category| {
                let criticality = match category {
                    Category::ArbitraryCodeExecution => Criticality::Critical,
                    Category::IntentRedirection
                    | Category::PathTraversal
                    | Category::DynamicCodeLoad
                    | Category::UriGrantAbuse => Criticality::High,
                    Category::WebviewUrlInjection | Category::ImplicitIntentInterception => {
                        Criticality::Medium
                    }
                    Category::PermissionGap | Category::UnresolvedReference => Criticality::Low,
                    Category::ExportedComponent => Criticality::Warning,
                };
                (category, criticality)
            })
            .collect();

        Self { table }
    }
}

/// Ranked findings of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Results {
    app_package: String,
    app_min_sdk: u32,
    app_target_sdk: u32,
    findings: Vec<RankedFinding>,
}

impl Results {
    /// Creates the results of an application from its ranked findings.
    pub fn new(facts: &ApplicationFacts, findings: Vec<RankedFinding>) -> Self {
        Self {
            app_package: facts.package().to_owned(),
            app_min_sdk: facts.min_sdk(),
            app_target_sdk: facts.target_sdk(),
            findings,
        }
    }

    /// Gets the package of the application.
    pub fn app_package(&self) -> &str {
        &self.app_package
    }

    /// Gets the ranked findings, superseded ones included.
    pub fn findings(&self) -> &[RankedFinding] {
        &self.findings
    }

    /// Gets the findings that were not superseded by a chain.
    pub fn active(&self) -> impl Iterator<Item = &RankedFinding> {
        self.findings.iter().filter(|f| f.superseded_by().is_none())
    }

    /// Gets the active findings of the given criticality, in rank order.
    pub fn of_criticality(&self, criticality: Criticality) -> Vec<&RankedFinding> {
        self.active()
            .filter(|f| f.criticality() == criticality)
            .collect()
    }

    /// Counts the active findings of the given criticality.
    pub fn count(&self, criticality: Criticality) -> usize {
        self.active()
            .filter(|f| f.criticality() == criticality)
            .count()
    }

    /// Gets the total number of findings.
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Checks if there are no findings.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl Serialize for Results {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser_struct = serializer.serialize_struct("Results", 17)?;

        ser_struct.serialize_field("analyzer_version", clap::crate_version!())?;
        ser_struct.serialize_field("app_package", &self.app_package)?;
        ser_struct.serialize_field("app_min_sdk", &self.app_min_sdk)?;
        ser_struct.serialize_field("app_target_sdk", &self.app_target_sdk)?;

        ser_struct.serialize_field("total_findings", &self.findings.len())?;
        ser_struct.serialize_field(
            "superseded_len",
            &(self.findings.len() - self.active().count()),
        )?;
        for &(name, len_name, criticality) in &[
            ("criticals", "criticals_len", Criticality::Critical),
            ("highs", "highs_len", Criticality::High),
            ("mediums", "mediums_len", Criticality::Medium),
            ("lows", "lows_len", Criticality::Low),
            ("warnings", "warnings_len", Criticality::Warning),
        ] {
            let list = self.of_criticality(criticality);
            ser_struct.serialize_field(name, &list)?;
            ser_struct.serialize_field(len_name, &list.len())?;
        }
        ser_struct.serialize_field("findings", &self.findings)?;

        ser_struct.end()
    }
}
