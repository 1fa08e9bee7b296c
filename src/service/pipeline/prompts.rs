//! Prompts for the screening pipeline stages

use crate::service::llm::CompletionResult;
use crate::tools::truncate_chars;

/// Per-tool-output cap when dumping tool results into extraction prompts
const TOOL_DUMP_MAX_CHARS: usize = 2000;

/// System prompt for the verification tool loop
pub const VERIFICATION_SYSTEM_PROMPT: &str = r#"You are a biosecurity compliance analyst screening a prospective customer of a synthetic-DNA provider. Research the customer using the available tools and assess exactly these four criteria:

1. Institutional Affiliation Verification — does the claimed institutional affiliation check out (the person exists, works there, and the institution exists)?
2. Institution Type and Biomedical Focus — is the institution a legitimate research, clinical, industrial, or educational organization with a plausible need for synthetic DNA?
3. Email Domain Verification — does the supplied email domain belong to the claimed institution (not a free or look-alike domain)?
4. Sanctions and Export Control Screening — do the person or institution match any denied-party or sanctions list entries?

## Rules

- Use the tools before concluding. Screen every name variant of both the person and the institution against the screening list.
- Every tool result carries a citation ID (e.g. [web1], [screen2]). Cite these IDs inline for every factual statement you make. Cite empty results too ("no matches found, see [screen3]").
- For each criterion, end with a verdict line of exactly one of: FLAG, NO FLAG, UNDETERMINED.
- FLAG means disqualifying evidence was found. UNDETERMINED means you could not verify either way. Do not guess.
- Name each criterion verbatim as listed above."#;

/// System prompt for the prior-work research loop
pub const WORK_SYSTEM_PROMPT: &str = r#"You are a biosecurity analyst researching a prospective customer's documented prior work with dangerous organisms and toxins (select agents, risk-group pathogens, regulated toxins).

## Rules

- Use the publication and researcher-profile tools to find the customer's published work. Search broadly first, then drill into specific organisms.
- Every tool result carries a citation ID (e.g. [epmc1], [orcid2]). Cite these IDs inline for every work you describe.
- For each relevant work, state the organism or toxin, what the person actually did, and rate relevance 1 (tangential mention) to 5 (direct hands-on work).
- Report at most the five most relevant works. If nothing relevant exists, say so explicitly with citations."#;

/// Build the verification user prompt
pub fn build_verification_prompt(customer_info: &str) -> String {
    format!(
        "Screen the following prospective customer against all four criteria.\n\n\
         ## Customer Information\n\n{}",
        customer_info
    )
}

/// Build the prior-work user prompt
pub fn build_work_prompt(customer_info: &str) -> String {
    format!(
        "Research documented prior work with dangerous organisms for the following \
         prospective customer.\n\n## Customer Information\n\n{}",
        customer_info
    )
}

/// Instruction prompt for evidence extraction
pub const EVIDENCE_EXTRACTION_PROMPT: &str = r#"Extract the per-criterion evidence from the screening narrative below.

For each of the four criteria (named verbatim in the narrative), produce one row with:
- criterion: the canonical criterion name, verbatim
- sources: every citation ID the narrative cites for that criterion (e.g. "web1", "screen2"), without brackets
- evidence_summary: one or two factual sentences summarizing what was found

Only report criteria that appear in the narrative. Do not invent citation IDs."#;

/// Instruction prompt for determination extraction
pub const DETERMINATION_EXTRACTION_PROMPT: &str = r#"Extract the per-criterion verdicts from the screening narrative below.

For each of the four criteria (named verbatim in the narrative), produce one row with:
- criterion: the canonical criterion name, verbatim
- flag: the narrative's verdict, exactly one of "FLAG", "NO FLAG", or "UNDETERMINED"

Only report criteria that appear in the narrative with an explicit verdict."#;

/// Instruction prompt for background-work extraction
pub const WORK_EXTRACTION_PROMPT: &str = r#"Extract the documented prior works with dangerous organisms from the research narrative below.

Produce at most five rows, ordered by relevance, each with:
- relevance_level: 1 (tangential) to 5 (direct hands-on work), as rated in the narrative
- organism: the organism or toxin name
- sources: every citation ID the narrative cites for that work (e.g. "epmc1"), without brackets
- work_summary: one factual sentence on what the person did

Return an empty list if the narrative found no relevant work."#;

/// Build the decision-summary prompt
pub fn build_summary_prompt(status: &str, flags_count: usize, checks_summary: &str) -> String {
    format!(
        "Write exactly one factual sentence summarizing this customer screening outcome \
         for a compliance officer. Do not add recommendations or caveats.\n\n\
         Overall status: {}\nFlagged criteria: {}\n\nPer-criterion findings:\n{}",
        status, flags_count, checks_summary
    )
}

/// Assemble the narrative fed to extraction: the stage's raw text plus a
/// bounded dump of every tool output the model saw
pub fn build_stage_narrative(result: &CompletionResult) -> String {
    let mut narrative = result.text.clone();

    if !result.tool_calls.is_empty() {
        narrative.push_str("\n\n## Tool Outputs\n");
        for call in &result.tool_calls {
            narrative.push_str(&format!(
                "\n### {}\n{}\n",
                call.tool_name,
                truncate_chars(&call.model_output, TOOL_DUMP_MAX_CHARS)
            ));
        }
    }

    narrative
}
