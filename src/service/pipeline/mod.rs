//! Screening pipeline orchestrator
//!
//! Sequences the four-stage workflow (verification tool loop, prior-work
//! tool loop, parallel structured extraction, decision + summary) and emits
//! a single ordered event stream terminating in exactly one `complete` or
//! `error` event.

pub mod error;
pub mod prompts;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::model::extraction::{
    ExtractedBackgroundWork, ExtractedDeterminations, ExtractedEvidence,
};
use crate::model::screening::{
    AuditTrail, BackgroundWork, CompleteData, Decision, Determination, Evidence, RawNarratives,
    ScreeningStatus,
};
use crate::model::{Config, ScreeningEvent};
use crate::service::citations::{normalize_tool_calls, parse_result_summary, IdCounters};
use crate::service::decision::{compute_decision, fallback_summary, merge_checks};
use crate::service::llm::{CompletionClient, CompletionProvider, CompletionResult, LlmError};
use crate::tools::ToolRegistry;

pub use error::PipelineError;

use prompts::{
    build_stage_narrative, build_summary_prompt, build_verification_prompt, build_work_prompt,
    DETERMINATION_EXTRACTION_PROMPT, EVIDENCE_EXTRACTION_PROMPT, VERIFICATION_SYSTEM_PROMPT,
    WORK_EXTRACTION_PROMPT, WORK_SYSTEM_PROMPT,
};

/// Tools offered to the prior-work stage; sanctions screening belongs to
/// the verification stage only
const WORK_STAGE_TOOLS: &[&str] = &[
    "web_search",
    "article_search",
    "researcher_profile",
    "search_researcher_works",
];

/// The screening pipeline
pub struct ScreeningPipeline<P: CompletionProvider> {
    llm: CompletionClient<P>,
    registry: ToolRegistry,
    config: Config,
}

impl<P: CompletionProvider + 'static> ScreeningPipeline<P> {
    pub fn new(provider: P, registry: ToolRegistry, config: Config) -> Self {
        Self {
            llm: CompletionClient::new(provider),
            registry,
            config,
        }
    }

    /// Run one screening. Returns a lazy, single-pass event stream; the
    /// sequence is finite and terminates in exactly one `complete` or
    /// `error` event. Input validation (e.g. rejecting empty text) is the
    /// caller's concern.
    pub fn run(self: Arc<Self>, customer_info: String) -> UnboundedReceiverStream<ScreeningEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            self.run_inner(&customer_info, &tx).await;
        });
        UnboundedReceiverStream::new(rx)
    }

    async fn run_inner(&self, customer_info: &str, tx: &UnboundedSender<ScreeningEvent>) {
        let start = std::time::Instant::now();
        let mut counters = IdCounters::new();

        // Stage 1: verification. Load-bearing, fatal on failure.
        let _ = tx.send(ScreeningEvent::Status {
            message: "Verifying customer identity, affiliation, and sanctions status".to_string(),
        });
        let verification = match self
            .run_tool_stage(
                &build_verification_prompt(customer_info),
                VERIFICATION_SYSTEM_PROMPT,
                None,
                &mut counters,
                tx,
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let e = PipelineError::Verification(e);
                tracing::error!(error = %e, "Verification stage failed, aborting run");
                let _ = tx.send(ScreeningEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        // Stage 2: prior-work research. Enrichment only, never fatal.
        let _ = tx.send(ScreeningEvent::Status {
            message: "Researching documented work with dangerous organisms".to_string(),
        });
        let work = match self
            .run_tool_stage(
                &build_work_prompt(customer_info),
                WORK_SYSTEM_PROMPT,
                Some(WORK_STAGE_TOOLS),
                &mut counters,
                tx,
            )
            .await
        {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(error = %e, "Prior-work stage failed, continuing without it");
                None
            }
        };

        // Stage 3: structured extraction, fanned out concurrently. All
        // launched extractions settle before the stage resolves; any
        // failure is fatal because the payload cannot be assembled.
        let _ = tx.send(ScreeningEvent::Status {
            message: "Extracting structured findings".to_string(),
        });
        let verification_narrative = build_stage_narrative(&verification);
        let work_narrative = work.as_ref().map(build_stage_narrative);
        let model = &self.config.extraction_model;

        let (evidence_res, determinations_res, work_res) = match &work_narrative {
            Some(narrative) => {
                let (e, d, w) = tokio::join!(
                    self.llm.extract::<ExtractedEvidence>(
                        &verification_narrative,
                        EVIDENCE_EXTRACTION_PROMPT,
                        model,
                    ),
                    self.llm.extract::<ExtractedDeterminations>(
                        &verification_narrative,
                        DETERMINATION_EXTRACTION_PROMPT,
                        model,
                    ),
                    self.llm.extract::<ExtractedBackgroundWork>(
                        narrative,
                        WORK_EXTRACTION_PROMPT,
                        model,
                    ),
                );
                (e, d, Some(w))
            }
            None => {
                let (e, d) = tokio::join!(
                    self.llm.extract::<ExtractedEvidence>(
                        &verification_narrative,
                        EVIDENCE_EXTRACTION_PROMPT,
                        model,
                    ),
                    self.llm.extract::<ExtractedDeterminations>(
                        &verification_narrative,
                        DETERMINATION_EXTRACTION_PROMPT,
                        model,
                    ),
                );
                (e, d, None)
            }
        };

        let extracted = (|| -> Result<_, LlmError> {
            let evidence = evidence_res?;
            let determinations = determinations_res?;
            let background = work_res.transpose()?;
            Ok((evidence, determinations, background))
        })();
        let (evidence, determinations, background) = match extracted {
            Ok(parts) => parts,
            Err(e) => {
                let e = PipelineError::Extraction(e);
                tracing::error!(error = %e, "Structured extraction failed, aborting run");
                let _ = tx.send(ScreeningEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        // Stage 4: decision, then a cosmetic best-effort summary
        let determinations: Vec<Determination> = determinations
            .determinations
            .into_iter()
            .map(Into::into)
            .collect();
        let evidence: Vec<Evidence> = evidence.evidence.into_iter().map(Into::into).collect();
        let background_work: Option<Vec<BackgroundWork>> =
            background.map(|b| b.works.into_iter().take(5).map(Into::into).collect());

        let outcome = compute_decision(&determinations);
        let checks = merge_checks(&evidence, &determinations);
        let summary = self.generate_summary(outcome.status, outcome.flags_count, &checks).await;
        let decision = Decision {
            status: outcome.status,
            flags_count: outcome.flags_count,
            summary,
        };

        // Stage 5: narrative delta, then the terminal payload
        let narrative = match work.as_ref() {
            Some(w) if !w.text.is_empty() => format!("{}\n\n{}", verification.text, w.text),
            _ => verification.text.clone(),
        };
        let _ = tx.send(ScreeningEvent::Delta { content: narrative });

        let mut all_calls = verification.tool_calls.clone();
        if let Some(w) = &work {
            all_calls.extend(w.tool_calls.iter().cloned());
        }

        tracing::info!(
            status = ?decision.status,
            flags = decision.flags_count,
            tool_calls = all_calls.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Screening run complete"
        );

        let _ = tx.send(ScreeningEvent::Complete {
            data: CompleteData {
                decision,
                checks,
                background_work,
                audit: AuditTrail {
                    tool_calls: normalize_tool_calls(&all_calls),
                    raw: RawNarratives {
                        verification: verification.text,
                        work: work.map(|w| w.text),
                    },
                },
            },
        });
    }

    /// Run one tool-augmented completion, echoing tool activity as events.
    /// The `tool_result` telemetry is re-derived by parsing the annotated
    /// output; malformed output downgrades to an empty id and zero count.
    async fn run_tool_stage(
        &self,
        prompt: &str,
        preamble: &str,
        tool_names: Option<&[&str]>,
        counters: &mut IdCounters,
        tx: &UnboundedSender<ScreeningEvent>,
    ) -> Result<CompletionResult, LlmError> {
        self.llm
            .complete_with_tools(
                prompt,
                preamble,
                &self.config.screening_model,
                tool_names,
                &self.registry,
                counters,
                |tool, args| {
                    let _ = tx.send(ScreeningEvent::ToolCall {
                        tool: tool.to_string(),
                        args: args.clone(),
                    });
                },
                |tool, model_output| {
                    let (id, count) = parse_result_summary(model_output);
                    let _ = tx.send(ScreeningEvent::ToolResult {
                        tool: tool.to_string(),
                        id,
                        count,
                    });
                },
            )
            .await
    }

    /// One-sentence summary with a canned per-status fallback; summary text
    /// is cosmetic and never fails the run
    async fn generate_summary(
        &self,
        status: ScreeningStatus,
        flags_count: usize,
        checks: &[crate::model::screening::Check],
    ) -> String {
        let checks_summary: String = checks
            .iter()
            .map(|c| format!("- {}: {:?}\n", c.criterion, c.flag))
            .collect();
        let status_text = match status {
            ScreeningStatus::Pass => "PASS",
            ScreeningStatus::Flag => "FLAG",
            ScreeningStatus::Review => "REVIEW",
        };
        let prompt = build_summary_prompt(status_text, flags_count, &checks_summary);

        match self
            .llm
            .generate_text(&prompt, &self.config.extraction_model)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback_summary(status).to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Summary generation failed, using canned summary");
                fallback_summary(status).to_string()
            }
        }
    }
}
