use std::fmt::Write as _;

use serde::Serialize;

use super::context::NarrativeContext;
use super::guardrail::Violation;

const SYSTEM_INSTRUCTIONS: &str = "\
You are a hospital quality and performance analyst writing for executive leadership.

Produce a one-screen, executive-ready performance summary for display inside an analytics dashboard, \
using only the JSON performance data supplied by the user.

Formatting rules:
Do not use Markdown. Do not use hashtags, asterisks, or bullet symbols. Use plain text only. \
Separate sections with line breaks. Use short section titles followed by sentences.

Structure the output exactly as follows:
AI-Assisted Performance Summary
Facility Name
Overall Performance Snapshot (2 to 3 sentences)
Key Strengths (2 to 3 sentences)
Priority Concerns (3 to 4 sentences)
Key Interconnections (1 to 2 sentences linking related patterns without implying causality)
Prioritized Actions (2 to 3 process-focused recommendations tied to the weakest metrics)

Content rules:
Base every statement strictly on the supplied metrics and state figures exactly as given or faithfully rounded. \
Describe patterns only; never explain why a metric moved. \
Do not predict future performance. \
Do not compare this facility with any other facility; the national benchmark is the only comparison allowed. \
Do not introduce programs, technologies, staffing, finances, or other topics absent from the data. \
Do not use measure IDs; use the metric display names. \
When a metric is labelled insufficient_data, say no data was reported rather than guessing. \
Keep the tone neutral and executive-friendly.";

const DIRECTIONALITY_RULES: &str = "\
Metric interpretation rules:
Each metric carries a direction and a label computed against the national benchmark. \
lower_is_better: a value below the benchmark is favorable. \
higher_is_better: a value above the benchmark is favorable. \
neutral metrics such as visit volume are context only, not good or bad. \
Use the provided label; do not re-derive it.";

/// Request handed to a narrative provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativePrompt {
    pub system_instructions: String,
    pub context_payload: String,
    pub correction: Option<String>,
}

impl NarrativePrompt {
    pub fn for_context(context: &NarrativeContext, max_words: usize) -> Result<Self, serde_json::Error> {
        let mut system_instructions = String::from(SYSTEM_INSTRUCTIONS);
        let _ = write!(
            system_instructions,
            "\nDo not exceed {max_words} words.\n\n{DIRECTIONALITY_RULES}\n\nTopics that are never allowed:\n"
        );
        for topic in context.disallowed_topics() {
            let _ = writeln!(system_instructions, "{}", topic.describe());
        }

        Ok(Self {
            system_instructions,
            context_payload: serde_json::to_string(context)?,
            correction: None,
        })
    }

    /// Copy of this prompt asking for a rewrite that avoids the listed violations.
    pub fn with_correction(&self, violations: &[Violation]) -> Self {
        let mut correction = String::from(
            "Your previous summary was rejected because it contained statements not supported by the data. \
Rewrite the full summary and avoid these problems:\n",
        );
        for violation in violations {
            let _ = writeln!(correction, "{} ({})", violation.message, violation.token);
        }

        Self {
            correction: Some(correction),
            ..self.clone()
        }
    }

    /// User-turn text: the JSON payload plus any correction block.
    pub fn user_message(&self) -> String {
        let facility_hint = "Write the summary for the facility in this JSON.";
        match &self.correction {
            Some(correction) => format!(
                "{facility_hint}\n\nJSON:\n{}\n\n{correction}",
                self.context_payload
            ),
            None => format!("{facility_hint}\n\nJSON:\n{}", self.context_payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::context::fixtures;
    use crate::narrative::guardrail::ViolationKind;
    use chrono::NaiveDate;

    fn context() -> NarrativeContext {
        fixtures::context("Alpha Hospital", &[], Vec::new(), NaiveDate::from_ymd_opt(2025, 10, 1))
    }

    #[test]
    fn prompt_embeds_payload_and_limits() {
        let prompt = NarrativePrompt::for_context(&context(), 220).expect("serializes");
        assert!(prompt.system_instructions.contains("Do not exceed 220 words."));
        assert!(prompt.system_instructions.contains("comparisons to facilities other than"));
        assert!(prompt.context_payload.contains("\"name\":\"Alpha Hospital\""));
        assert!(prompt.context_payload.contains("2025-10-01"));
        assert!(prompt.user_message().ends_with(&prompt.context_payload));
    }

    #[test]
    fn correction_lists_violations() {
        let prompt = NarrativePrompt::for_context(&context(), 250).expect("serializes");
        let corrected = prompt.with_correction(&[Violation {
            kind: ViolationKind::UngroundedFigure,
            token: "84".to_string(),
            message: "figure does not match any value in the context".to_string(),
        }]);
        assert!(prompt.correction.is_none());
        let message = corrected.user_message();
        assert!(message.contains("Rewrite the full summary"));
        assert!(message.contains("(84)"));
        assert_eq!(corrected.context_payload, prompt.context_payload);
    }
}
