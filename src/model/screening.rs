//! Domain types for customer screening results

use serde::{Deserialize, Serialize};

/// The four fixed screening criteria, by their canonical names.
pub const CRITERION_AFFILIATION: &str = "Institutional Affiliation Verification";
pub const CRITERION_INSTITUTION_TYPE: &str = "Institution Type and Biomedical Focus";
pub const CRITERION_EMAIL_DOMAIN: &str = "Email Domain Verification";
pub const CRITERION_SANCTIONS: &str = "Sanctions and Export Control Screening";

/// All criteria in report order.
pub const CRITERIA: [&str; 4] = [
    CRITERION_AFFILIATION,
    CRITERION_INSTITUTION_TYPE,
    CRITERION_EMAIL_DOMAIN,
    CRITERION_SANCTIONS,
];

/// Per-criterion flag value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagValue {
    #[serde(rename = "FLAG")]
    Flag,
    #[serde(rename = "NO FLAG")]
    NoFlag,
    #[serde(rename = "UNDETERMINED")]
    Undetermined,
}

/// A per-criterion determination made by the verification stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Determination {
    pub criterion: String,
    pub flag: FlagValue,
}

/// Cited evidence backing one criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub criterion: String,
    /// Citation IDs (e.g. `web1`, `screen2`) referenced by the summary
    pub sources: Vec<String>,
    pub evidence_summary: String,
}

/// A documented prior work with a dangerous organism
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundWork {
    /// 1 (tangential) to 5 (direct hands-on work)
    pub relevance_level: u8,
    pub organism: String,
    pub sources: Vec<String>,
    pub work_summary: String,
}

/// Overall screening status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreeningStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FLAG")]
    Flag,
    #[serde(rename = "REVIEW")]
    Review,
}

/// Final decision over the determination set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub status: ScreeningStatus,
    pub flags_count: usize,
    pub summary: String,
}

/// One merged row of the final checklist: determination joined with its evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub criterion: String,
    pub flag: FlagValue,
    pub sources: Vec<String>,
    pub evidence_summary: String,
}

/// Flat, audit-friendly record of one tool call, re-derived from the
/// citation-annotated output shown to the model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedToolCall {
    pub tool: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub result_count: usize,
}

/// Raw narrative text per stage, for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNarratives {
    pub verification: String,
    pub work: Option<String>,
}

/// Audit trail attached to the terminal event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<NormalizedToolCall>,
    pub raw: RawNarratives,
}

/// Payload of the terminal `complete` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteData {
    pub decision: Decision,
    pub checks: Vec<Check>,
    #[serde(rename = "backgroundWork")]
    pub background_work: Option<Vec<BackgroundWork>>,
    pub audit: AuditTrail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_value_serializes_to_wire_strings() {
        assert_eq!(serde_json::to_string(&FlagValue::Flag).unwrap(), "\"FLAG\"");
        assert_eq!(
            serde_json::to_string(&FlagValue::NoFlag).unwrap(),
            "\"NO FLAG\""
        );
        assert_eq!(
            serde_json::to_string(&FlagValue::Undetermined).unwrap(),
            "\"UNDETERMINED\""
        );
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ScreeningStatus::Review).unwrap(),
            "\"REVIEW\""
        );
    }

    #[test]
    fn complete_payload_uses_camel_case_wire_keys() {
        let data = CompleteData {
            decision: Decision {
                status: ScreeningStatus::Pass,
                flags_count: 0,
                summary: "ok".to_string(),
            },
            checks: Vec::new(),
            background_work: None,
            audit: AuditTrail {
                tool_calls: Vec::new(),
                raw: RawNarratives {
                    verification: String::new(),
                    work: None,
                },
            },
        };
        let value = serde_json::to_value(&data).unwrap();
        assert!(value.get("backgroundWork").is_some());
        assert!(value["audit"].get("toolCalls").is_some());
    }
}
