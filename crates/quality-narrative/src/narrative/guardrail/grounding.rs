use chrono::Datelike;
use regex::Regex;

use crate::narrative::catalog::{Domain, MetricUnit};
use crate::narrative::classifier::DirectionLabel;
use crate::narrative::context::NarrativeContext;
use crate::narrative::normalizer::{normalize_name, token_weight};

const TOLERANCE: f64 = 1e-9;

/// Words that make a figure a measurement rather than a count or a date part.
const MEASUREMENT_UNITS: &[&str] = &[
    "%", "percent", "percentage", "points", "point", "minutes", "minute", "mins", "min",
    "hours", "hour", "days", "day", "per",
];

/// Where a measured figure comes from; decides which stated units it can carry.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Basis {
    Metric(MetricUnit),
    Relative,
}

impl Basis {
    fn admits(self, unit: &str) -> bool {
        match unit {
            "%" | "percent" | "percentage" => matches!(
                self,
                Basis::Relative | Basis::Metric(MetricUnit::Percent | MetricUnit::Rate)
            ),
            "minutes" | "minute" | "mins" | "min" => self == Basis::Metric(MetricUnit::Minutes),
            _ => true,
        }
    }
}

/// Every figure a narrative may state for one context.
#[derive(Debug, Clone, Default)]
pub(crate) struct GroundingSet {
    /// Observed values, benchmarks, and figures derived from them.
    measured: Vec<(f64, Basis)>,
    /// Counts and vintage parts. Never valid as a measurement.
    incidental: Vec<f64>,
    /// Numbers inside metric or facility names, with the word that follows them there.
    embedded: Vec<(f64, String)>,
}

impl GroundingSet {
    pub(crate) fn from_context(context: &NarrativeContext, number: &Regex) -> Self {
        let mut set = Self::default();

        for assessment in context.assessments() {
            let own = Basis::Metric(assessment.unit);
            let values = [
                assessment.facility_value,
                assessment.benchmark_value,
                assessment.delta,
            ];
            set.measured
                .extend(values.into_iter().flatten().map(|value| (value, own)));
            if let Some(delta) = assessment.delta {
                if let Some(benchmark) = assessment.benchmark_value.filter(|b| *b != 0.0) {
                    set.measured.push((delta / benchmark * 100.0, Basis::Relative));
                }
            }
            set.measured.extend(
                assessment
                    .percent_of_benchmark()
                    .map(|percent| (percent, Basis::Relative)),
            );
            set.embedded.extend(embedded_numbers(&assessment.metric_id, number));
            set.embedded.extend(embedded_numbers(&assessment.display_name, number));
        }

        if let Some(vintage) = context.data_vintage() {
            set.incidental.push(f64::from(vintage.year()));
            set.incidental.push(f64::from(vintage.month()));
            set.incidental.push(f64::from(vintage.day()));
        }

        // Counts are derived statements of the context ("4 of 25 metrics").
        let total = context.assessments().count();
        set.incidental.push(total as f64);
        set.incidental.push(Domain::ALL.len() as f64);
        set.incidental
            .push((total - context.count_with_label(DirectionLabel::InsufficientData)) as f64);
        for label in [
            DirectionLabel::Favorable,
            DirectionLabel::Unfavorable,
            DirectionLabel::Neutral,
            DirectionLabel::InsufficientData,
        ] {
            set.incidental.push(context.count_with_label(label) as f64);
        }
        for section in context.domains() {
            set.incidental.push(section.assessments.len() as f64);
        }

        let facility = context.facility();
        for name in std::iter::once(&facility.name).chain(facility.aliases.iter()) {
            set.embedded.extend(embedded_numbers(name, number));
        }

        set
    }

    /// True when `token` states some grounding figure at the token's own precision.
    ///
    /// `trailing` is the text right after the token. A stated unit must fit the
    /// metric a value came from. Counts and dates only ground a figure that is
    /// not followed by a unit, and a number taken from a name only grounds the
    /// same number followed by the same word.
    pub(crate) fn supports(&self, token: &str, trailing: &str) -> bool {
        let cleaned = token.replace(',', "");
        let Ok(stated) = cleaned.parse::<f64>() else {
            return false;
        };
        let decimals = cleaned.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
        let half_unit = 0.5 / 10f64.powi(decimals as i32);
        let close = |figure: f64| (figure.abs() - stated).abs() <= half_unit + TOLERANCE;

        let next = next_word(trailing);
        if self
            .measured
            .iter()
            .any(|(figure, basis)| basis.admits(&next) && close(*figure))
        {
            return true;
        }

        if !MEASUREMENT_UNITS.contains(&next.as_str())
            && self.incidental.iter().any(|figure| close(*figure))
        {
            return true;
        }

        self.embedded
            .iter()
            .any(|(figure, word)| *word == next && close(*figure))
    }
}

fn embedded_numbers(text: &str, number: &Regex) -> Vec<(f64, String)> {
    let spaced = text.replace('_', " ");
    number
        .find_iter(&spaced)
        .filter_map(|m| {
            let value = m.as_str().replace(',', "").parse::<f64>().ok()?;
            Some((value, next_word(&spaced[m.end()..])))
        })
        .collect()
}

/// Lower-cased word right after a figure, `%` included; empty for punctuation.
fn next_word(text: &str) -> String {
    let rest = text.trim_start_matches(|ch: char| ch.is_whitespace() || ch == '-');
    if rest.starts_with('%') {
        return "%".to_string();
    }
    rest.chars()
        .take_while(|ch| ch.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Facility-name mention check: either name may be a trailing part of the other.
pub(crate) fn names_facility(context: &NarrativeContext, mention: &str) -> bool {
    let mention = normalize_name(mention);
    let tokens: Vec<&str> = mention.split_whitespace().collect();
    let facility = context.facility();
    let names: Vec<String> = std::iter::once(&facility.name)
        .chain(facility.aliases.iter())
        .map(|name| format!(" {} ", normalize_name(name)))
        .filter(|name| !name.trim().is_empty())
        .collect();

    // Leading words ("At", "The") are dropped one at a time; what remains must
    // carry a distinctive token and appear whole inside one of the names.
    (0..tokens.len()).any(|start| {
        let tail = &tokens[start..];
        let weight: f64 = tail.iter().map(|token| token_weight(token)).sum();
        if tail.len() < 2 || weight < 1.0 {
            return false;
        }
        let needle = format!(" {} ", tail.join(" "));
        names.iter().any(|name| name.contains(&needle))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::catalog::{Direction, MetricUnit};
    use crate::narrative::classifier::MetricAssessment;
    use crate::narrative::context::{fixtures, DomainSection};
    use chrono::NaiveDate;

    fn context() -> NarrativeContext {
        let assessment = MetricAssessment {
            metric_id: "SEP_SH_3HR".to_string(),
            display_name: "Septic shock care within 3 hours".to_string(),
            domain: Domain::Sepsis,
            unit: MetricUnit::Percent,
            direction: Direction::HigherIsBetter,
            facility_value: Some(72.4),
            benchmark_value: Some(64.0),
            delta: Some(8.4),
            label: DirectionLabel::Favorable,
        };
        fixtures::context(
            "St. Mary's Medical Center",
            &["St. Mary's"],
            vec![DomainSection {
                domain: Domain::Sepsis,
                assessments: vec![assessment],
            }],
            NaiveDate::from_ymd_opt(2025, 10, 1),
        )
    }

    fn number() -> Regex {
        Regex::new(r"\b\d+(?:\.\d+)?\b").expect("pattern")
    }

    #[test]
    fn rounded_values_are_supported() {
        let set = GroundingSet::from_context(&context(), &number());
        assert!(set.supports("72.4", "%"));
        assert!(set.supports("72", " percent"));
        assert!(set.supports("8.4", " points"));
        assert!(set.supports("113", "% of the benchmark"));
        assert!(!set.supports("81", "%"));
        assert!(!set.supports("72.9", "%"));
        assert!(!set.supports("72", " minutes"));
    }

    #[test]
    fn counts_and_dates_do_not_stand_in_for_measurements() {
        let set = GroundingSet::from_context(&context(), &number());
        assert!(set.supports("2025", "."));
        assert!(set.supports("10", "-01"));
        assert!(set.supports("5", " domains"));
        assert!(set.supports("1", " of 1 metrics"));

        assert!(!set.supports("5", "%"));
        assert!(!set.supports("10", " minutes"));
        assert!(!set.supports("1", " percentage points"));
    }

    #[test]
    fn name_numbers_need_their_own_context() {
        let set = GroundingSet::from_context(&context(), &number());
        assert!(set.supports("3", " hours"));
        assert!(!set.supports("3", "%"));
        assert!(!set.supports("3", " minutes"));
    }

    #[test]
    fn facility_mentions_match_trailing_names() {
        let context = context();
        assert!(names_facility(&context, "At St. Mary's Medical Center"));
        assert!(names_facility(&context, "Mary's Medical Center"));
        assert!(!names_facility(&context, "Mercy General Hospital"));
        assert!(!names_facility(&context, "Mercy Medical Center"));
    }
}
