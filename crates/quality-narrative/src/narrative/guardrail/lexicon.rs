use regex::Regex;

use super::ViolationKind;

const NUMBER: &str = r"\b\d{1,3}(?:,\d{3})+(?:\.\d+)?\b|\b\d+(?:\.\d+)?\b";

const FACILITY_MENTION: &str = r"\b(?:[A-Z][\w.'\u{2019}&-]*[ \t]+){1,5}(?:Hospital|Medical Center|Medical Centre|Health Center|Health System|Clinic|Infirmary)s?\b";

const CAUSAL: &str = r"(?i)\b(?:because|due to|caused by|as a result of|driven by|attributable to|stems? from|owing to|leads? to|led to|results? in|resulting in|contribut(?:es|ed|ing) to|thanks to)\b";

const PREDICTIVE: &str = r"(?i)\b(?:will (?:likely |probably )?(?:improve|decline|increase|decrease|rise|fall|continue|worsen|remain)|(?:is|are) expected to|forecast\w*|predict\w*|projected to|(?:is|are) likely to|going forward|in the coming (?:months|year|quarters?)|next (?:year|quarter|month))\b";

const EXTERNAL_COMPARISON: &str = r"(?i)\b(?:other hospitals|other facilities|peer hospitals|peer facilities|competitors?|competing hospitals|neighboring hospitals|nearby hospitals|than (?:most|other|peer) (?:hospitals|facilities)|ranks? (?:among|above|below))\b";

const OUT_OF_SCOPE: &str = r"(?i)\b(?:staffing|staff shortages?|revenue|profit(?:ability)?|budget|financial|finances|costs?|market share|payer mix|length of stay|star rating|lawsuits?|malpractice|turnover|nurse-to-patient|accreditation|ranking)\b";

const CLINICAL_AREAS: &str = r"(?i)\b(?:maternity|obstetrics?|labor and delivery|neonatal|nicu|oncology|cancer care|cardiology|cardiac surgery|surgical site infections?|stroke|orthopedics?|pediatrics?|psychiatric|mental health|behavioral health|dialysis|transplants?|trauma care|radiology|imaging|intensive care|icu|mrsa|patient falls|pressure ulcers?|hospital-acquired pneumonia)\b";

const TONE: &str = r"(?i)\b(?:alarming|disastrous|catastrophic|shocking|terrible|abysmal|dismal|horrible|outstanding|exceptional|amazing|stellar|world-class|unacceptable|crisis)\b|!";

/// Compiled pattern set used by postflight. Detection is lexical only.
#[derive(Debug, Clone)]
pub(crate) struct Lexicon {
    pub(crate) number: Regex,
    pub(crate) facility_mention: Regex,
    pub(crate) phrase_rules: Vec<(ViolationKind, Regex)>,
    pub(crate) out_of_scope: Regex,
    pub(crate) clinical_areas: Regex,
}

impl Lexicon {
    pub(crate) fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            number: Regex::new(NUMBER)?,
            facility_mention: Regex::new(FACILITY_MENTION)?,
            phrase_rules: vec![
                (ViolationKind::CausalLanguage, Regex::new(CAUSAL)?),
                (ViolationKind::PredictiveLanguage, Regex::new(PREDICTIVE)?),
                (ViolationKind::ExternalComparison, Regex::new(EXTERNAL_COMPARISON)?),
                (ViolationKind::ToneViolation, Regex::new(TONE)?),
            ],
            out_of_scope: Regex::new(OUT_OF_SCOPE)?,
            clinical_areas: Regex::new(CLINICAL_AREAS)?,
        })
    }
}

/// Markdown markers the dashboard cannot render.
pub(crate) fn formatting_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        Some("#")
    } else if trimmed.starts_with("* ") || trimmed.starts_with("- ") || trimmed.starts_with('\u{2022}') {
        Some("bullet")
    } else if trimmed.contains("**") || trimmed.contains("__") {
        Some("emphasis")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_compile() {
        Lexicon::compile().expect("patterns compile");
    }

    #[test]
    fn number_pattern_skips_identifier_digits() {
        let lexicon = Lexicon::compile().expect("patterns compile");
        let found: Vec<_> = lexicon
            .number
            .find_iter("HAI_1_SIR was 0.87 across 1,204 visits on OP_18b")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["0.87", "1,204"]);
    }

    #[test]
    fn causal_pattern_matches_common_phrasing() {
        let lexicon = Lexicon::compile().expect("patterns compile");
        let (_, causal) = &lexicon.phrase_rules[0];
        assert!(causal.is_match("Delays were driven by staffing"));
        assert!(causal.is_match("This is Due To volume"));
        assert!(!causal.is_match("Sepsis care exceeded the benchmark"));
    }

    #[test]
    fn clinical_areas_match_whole_terms() {
        let lexicon = Lexicon::compile().expect("patterns compile");
        let found: Vec<_> = lexicon
            .clinical_areas
            .find_iter("Maternity and surgical site infection results; oncology wait times")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["Maternity", "surgical site infection", "oncology"]);
        assert!(!lexicon.clinical_areas.is_match("Sepsis bundle compliance"));
    }

    #[test]
    fn formatting_markers_detected() {
        assert_eq!(formatting_marker("## Summary"), Some("#"));
        assert_eq!(formatting_marker("  - item"), Some("bullet"));
        assert_eq!(formatting_marker("a **bold** claim"), Some("emphasis"));
        assert_eq!(formatting_marker("Key Strengths"), None);
    }
}
