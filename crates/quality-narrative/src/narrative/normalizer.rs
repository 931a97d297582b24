/// Tokens that describe the kind of facility rather than which one it is.
const LOW_WEIGHT_TOKENS: &[&str] = &[
    "hospital",
    "hospitals",
    "medical",
    "center",
    "centre",
    "health",
    "healthcare",
    "regional",
    "system",
    "clinic",
    "memorial",
    "general",
    "the",
    "of",
];

pub(crate) const LOW_TOKEN_WEIGHT: f64 = 0.25;

/// Case-fold, drop apostrophes, turn other punctuation into spaces, collapse whitespace.
pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let mapped: String = cleaned
        .chars()
        .filter(|ch| !matches!(ch, '\'' | '\u{2019}' | '`'))
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

pub(crate) fn token_weight(token: &str) -> f64 {
    if LOW_WEIGHT_TOKENS.contains(&token) {
        LOW_TOKEN_WEIGHT
    } else {
        1.0
    }
}
