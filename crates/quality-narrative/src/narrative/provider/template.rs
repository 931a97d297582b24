use std::fmt::Write as _;

use async_trait::async_trait;

use super::{NarrativeProvider, ProviderError};
use crate::narrative::catalog::MetricUnit;
use crate::narrative::classifier::{DirectionLabel, MetricAssessment};
use crate::narrative::context::NarrativeContext;
use crate::narrative::prompt::NarrativePrompt;

const MAX_STRENGTHS: usize = 2;
const MAX_CONCERNS: usize = 3;
const MAX_ACTIONS: usize = 2;

/// Offline provider that renders a fixed-shape summary straight from the context.
///
/// Every figure it prints comes from an assessment, so its output is grounded by
/// construction. Used for demos and when no language model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateProvider;

impl TemplateProvider {
    pub fn render(context: &NarrativeContext) -> String {
        let mut text = String::new();
        let facility = context.facility();

        let _ = writeln!(text, "AI-Assisted Performance Summary");
        let _ = writeln!(text, "{}", facility.name);
        if let Some(vintage) = context.data_vintage() {
            let _ = writeln!(text, "Data as of {}", vintage.format("%B %-d, %Y"));
        }

        let total = context.assessments().count();
        let missing = context.count_with_label(DirectionLabel::InsufficientData);
        let _ = write!(
            text,
            "\nOverall Performance Snapshot\n{} of {} tracked metrics have reported data. \
{} compare favorably with the national benchmark, {} unfavorably, and {} sit within the materiality threshold or are informational.\n",
            total - missing,
            total,
            context.count_with_label(DirectionLabel::Favorable),
            context.count_with_label(DirectionLabel::Unfavorable),
            context.count_with_label(DirectionLabel::Neutral),
        );

        let strengths = ranked(context, DirectionLabel::Favorable);
        let _ = writeln!(text, "\nKey Strengths");
        if strengths.is_empty() {
            let _ = writeln!(text, "No metric is currently favorable against the national benchmark.");
        }
        for assessment in strengths.iter().take(MAX_STRENGTHS) {
            let _ = writeln!(text, "{}", comparison_sentence(assessment));
        }

        let concerns = ranked(context, DirectionLabel::Unfavorable);
        let _ = writeln!(text, "\nPriority Concerns");
        if concerns.is_empty() {
            let _ = writeln!(text, "No metric is currently unfavorable against the national benchmark.");
        }
        for assessment in concerns.iter().take(MAX_CONCERNS) {
            let _ = writeln!(text, "{}", comparison_sentence(assessment));
        }
        if missing > 0 {
            let _ = writeln!(text, "{missing} metrics had no reported data for this period.");
        }

        let mut concern_domains: Vec<&str> = Vec::new();
        for assessment in &concerns {
            let label = assessment.domain.label();
            if !concern_domains.contains(&label) {
                concern_domains.push(label);
            }
        }
        if !concern_domains.is_empty() {
            let _ = write!(
                text,
                "\nKey Interconnections\nUnfavorable results appear together in {}.\n",
                join_list(&concern_domains)
            );
        }

        if !concerns.is_empty() {
            let _ = writeln!(text, "\nPrioritized Actions");
            for assessment in concerns.iter().take(MAX_ACTIONS) {
                let _ = writeln!(
                    text,
                    "Review the current process steps behind {}.",
                    lowercase_first(&assessment.display_name)
                );
            }
        }

        text.trim_end().to_string()
    }
}

#[async_trait]
impl NarrativeProvider for TemplateProvider {
    async fn generate(
        &self,
        _prompt: &NarrativePrompt,
        context: &NarrativeContext,
    ) -> Result<String, ProviderError> {
        Ok(Self::render(context))
    }
}

/// Assessments with `label`, largest relative gap to the benchmark first.
fn ranked(context: &NarrativeContext, label: DirectionLabel) -> Vec<&MetricAssessment> {
    let gap = |assessment: &MetricAssessment| match (assessment.delta, assessment.benchmark_value) {
        (Some(delta), Some(benchmark)) if benchmark != 0.0 => (delta / benchmark).abs(),
        (Some(delta), _) => delta.abs(),
        _ => 0.0,
    };

    let mut matching: Vec<&MetricAssessment> = context
        .assessments()
        .filter(|assessment| assessment.label == label)
        .collect();
    matching.sort_by(|a, b| gap(b).total_cmp(&gap(a)));
    matching
}

fn comparison_sentence(assessment: &MetricAssessment) -> String {
    match (assessment.facility_value, assessment.benchmark_value) {
        (Some(value), Some(benchmark)) => format!(
            "{} was {} against a national benchmark of {}.",
            assessment.display_name,
            format_figure(value, assessment.unit),
            format_figure(benchmark, assessment.unit),
        ),
        _ => format!("{} has no reported data.", assessment.display_name),
    }
}

fn format_figure(value: f64, unit: MetricUnit) -> String {
    let number = if value.abs() >= 100.0 {
        format!("{value:.0}")
    } else {
        let fixed = format!("{value:.2}");
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    };

    match unit {
        MetricUnit::Percent => format!("{number}%"),
        MetricUnit::Minutes => format!("{number} minutes"),
        MetricUnit::Ratio | MetricUnit::Rate | MetricUnit::Score | MetricUnit::Count => number,
    }
}

fn join_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

fn lowercase_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if !value.starts_with("ED ") && !value.starts_with("C. ") => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figures_are_trimmed_and_unit_suffixed() {
        assert_eq!(format_figure(72.0, MetricUnit::Percent), "72%");
        assert_eq!(format_figure(0.874, MetricUnit::Ratio), "0.87");
        assert_eq!(format_figure(160.4, MetricUnit::Minutes), "160 minutes");
        assert_eq!(format_figure(20.1, MetricUnit::Rate), "20.1");
    }

    #[test]
    fn lists_join_with_oxford_comma() {
        assert_eq!(join_list(&["Sepsis"]), "Sepsis");
        assert_eq!(join_list(&["Sepsis", "Safety"]), "Sepsis and Safety");
        assert_eq!(
            join_list(&["Sepsis", "Safety", "Readmissions"]),
            "Sepsis, Safety, and Readmissions"
        );
    }

    #[test]
    fn lowercase_first_keeps_acronyms() {
        assert_eq!(lowercase_first("Heart failure death rate"), "heart failure death rate");
        assert_eq!(lowercase_first("ED throughput time (median)"), "ED throughput time (median)");
    }
}
