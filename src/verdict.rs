//! Match results and verdict evaluation.
//!
//! The engine reports zero or more component matches per file, each tagged
//! declared or undeclared. [`Verdict::evaluate`] folds those results into the
//! aggregate pass/fail decision for the run.

use serde::{Deserialize, Serialize};

/// Declaration status of a matched component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Present in the project's declarations (manifest, SBOM).
    Declared,
    /// Matched open source code with no matching declaration.
    Undeclared,
}

/// One open source component the engine matched in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Package URL identifying the component.
    pub purl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub status: ComponentStatus,
}

impl Component {
    pub fn is_undeclared(&self) -> bool {
        self.status == ComponentStatus::Undeclared
    }
}

/// Per-file outcome from the scanning engine.
///
/// `metadata` is engine-reported detail (match type, line ranges, confidence)
/// carried through to the artifact without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub file: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl MatchResult {
    /// A result with no component matches.
    pub fn clean(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            components: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn has_undeclared(&self) -> bool {
        self.components.iter().any(Component::is_undeclared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Clean,
    Flagged,
}

/// A flagged file and the undeclared components that flagged it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffendingFile {
    pub file: String,
    pub undeclared: Vec<Component>,
}

/// Aggregate decision over all match results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub offending: Vec<OffendingFile>,
}

impl Verdict {
    /// Derive the verdict from the engine's results.
    ///
    /// Flagged iff at least one result carries an undeclared component.
    /// Declared components never affect the outcome, and an empty result
    /// sequence is clean. Offending files keep the input ordering.
    pub fn evaluate(results: &[MatchResult]) -> Self {
        let offending: Vec<OffendingFile> = results
            .iter()
            .filter(|r| r.has_undeclared())
            .map(|r| OffendingFile {
                file: r.file.clone(),
                undeclared: r
                    .components
                    .iter()
                    .filter(|c| c.is_undeclared())
                    .cloned()
                    .collect(),
            })
            .collect();

        Self {
            status: if offending.is_empty() {
                VerdictStatus::Clean
            } else {
                VerdictStatus::Flagged
            },
            offending,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.status == VerdictStatus::Flagged
    }
}
