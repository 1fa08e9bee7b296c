//! LLM-extractable models for the structured-extraction stage
//!
//! These mirror the domain types in `screening.rs` but derive `JsonSchema`
//! so the provider can enforce the output shape. The pipeline converts them
//! into domain types after extraction.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::screening::{BackgroundWork, Determination, Evidence, FlagValue};

/// Extracted per-criterion determinations
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDeterminations {
    pub determinations: Vec<ExtractedDetermination>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedDetermination {
    /// Canonical criterion name, verbatim from the narrative
    pub criterion: String,
    pub flag: ExtractedFlag,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub enum ExtractedFlag {
    #[serde(rename = "FLAG")]
    Flag,
    #[serde(rename = "NO FLAG")]
    NoFlag,
    #[serde(rename = "UNDETERMINED")]
    Undetermined,
}

/// Extracted evidence rows, one per criterion
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedEvidence {
    pub evidence: Vec<ExtractedEvidenceRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedEvidenceRow {
    pub criterion: String,
    /// Citation IDs cited in the narrative (e.g. "web1", "screen2")
    pub sources: Vec<String>,
    pub evidence_summary: String,
}

/// Extracted prior-work rows (at most 5)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedBackgroundWork {
    pub works: Vec<ExtractedWorkRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedWorkRow {
    /// 1 (tangential) to 5 (direct hands-on work with the organism)
    pub relevance_level: u8,
    pub organism: String,
    pub sources: Vec<String>,
    pub work_summary: String,
}

impl From<ExtractedFlag> for FlagValue {
    fn from(value: ExtractedFlag) -> Self {
        match value {
            ExtractedFlag::Flag => FlagValue::Flag,
            ExtractedFlag::NoFlag => FlagValue::NoFlag,
            ExtractedFlag::Undetermined => FlagValue::Undetermined,
        }
    }
}

impl From<ExtractedDetermination> for Determination {
    fn from(value: ExtractedDetermination) -> Self {
        Determination {
            criterion: value.criterion,
            flag: value.flag.into(),
        }
    }
}

impl From<ExtractedEvidenceRow> for Evidence {
    fn from(value: ExtractedEvidenceRow) -> Self {
        Evidence {
            criterion: value.criterion,
            sources: value.sources,
            evidence_summary: value.evidence_summary,
        }
    }
}

impl From<ExtractedWorkRow> for BackgroundWork {
    fn from(value: ExtractedWorkRow) -> Self {
        BackgroundWork {
            relevance_level: value.relevance_level.clamp(1, 5),
            organism: value.organism,
            sources: value.sources,
            work_summary: value.work_summary,
        }
    }
}
