mod support;

use quality_narrative::narrative::{
    FacilityRecord, FacilityRegistry, FacilityResolver, MatchMethod, ResolutionError, ResolverConfig,
};
use support::sample_snapshot;

#[test]
fn aliases_and_punctuation_resolve_to_one_facility() {
    let snapshot = sample_snapshot();
    let resolver = FacilityResolver::new(&snapshot.registry, ResolverConfig::default());

    for query in ["st marys", "St Mary's", "ST. MARY'S MEDICAL CENTER", "Saint Marys"] {
        let resolved = resolver.resolve(query).expect("resolves");
        assert_eq!(resolved.record.facility_id, "160001", "query {query:?}");
        assert_eq!(resolved.match_score, 1.0);
        assert_ne!(resolved.match_method, MatchMethod::Fuzzy);
    }

    let exact = resolver
        .resolve("St. Mary's Medical Center")
        .expect("exact name");
    assert_eq!(exact.match_method, MatchMethod::Exact);
    assert!(exact.resolution_note().is_none());
}

#[test]
fn single_typo_is_a_fuzzy_match_with_note() {
    let snapshot = sample_snapshot();
    let resolver = FacilityResolver::new(&snapshot.registry, ResolverConfig::default());

    let resolved = resolver
        .resolve("Riverside Regonal Hospital")
        .expect("typo tolerated");
    assert_eq!(resolved.record.canonical_name, "Riverside Regional Hospital");
    assert_eq!(resolved.match_method, MatchMethod::Fuzzy);
    assert!(resolved.match_score >= 0.85 && resolved.match_score < 1.0);
    let note = resolved.resolution_note().expect("fuzzy matches carry a note");
    assert!(note.contains("Riverside Regional Hospital"));
}

#[test]
fn equidistant_names_are_ambiguous() {
    let snapshot = sample_snapshot();
    let resolver = FacilityResolver::new(&snapshot.registry, ResolverConfig::default());

    match resolver.resolve("Oakwood Community Hospital Sorth") {
        Err(ResolutionError::AmbiguousMatch { candidates, .. }) => {
            assert_eq!(
                candidates,
                vec![
                    "Oakwood Community Hospital North".to_string(),
                    "Oakwood Community Hospital South".to_string(),
                ]
            );
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

fn registry_of(names: &[&str]) -> FacilityRegistry {
    let records = names
        .iter()
        .enumerate()
        .map(|(index, name)| FacilityRecord::new(&format!("9{index:02}"), name, "IA"))
        .collect();
    FacilityRegistry::new(records).expect("valid registry")
}

#[test]
fn equal_edit_distance_is_ambiguous_even_when_lengths_differ() {
    let registry = registry_of(&["Hillcrest Care", "Hillcrest Careplus"]);
    let resolver = FacilityResolver::new(&registry, ResolverConfig::default());

    match resolver.resolve("Hillcrest Carepl") {
        Err(ResolutionError::AmbiguousMatch { mut candidates, .. }) => {
            candidates.sort();
            assert_eq!(candidates, vec!["Hillcrest Care", "Hillcrest Careplus"]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let closer = resolver
        .resolve("Hillcrest Careplu")
        .expect("one name is strictly closer");
    assert_eq!(closer.record.canonical_name, "Hillcrest Careplus");
    assert_eq!(closer.match_method, MatchMethod::Fuzzy);
}

#[test]
fn short_names_tolerate_a_single_typo() {
    let registry = registry_of(&["Mercy", "Unity", "Bethany Hospital"]);
    let resolver = FacilityResolver::new(&registry, ResolverConfig::default());

    for (query, expected) in [("Mercx", "Mercy"), ("Unitu", "Unity"), ("mercy", "Mercy")] {
        let resolved = resolver.resolve(query).expect("within one edit");
        assert_eq!(resolved.record.canonical_name, expected, "query {query:?}");
        assert_ne!(resolved.match_method, MatchMethod::Exact);
    }

    assert!(matches!(
        resolver.resolve("Mxrcx"),
        Err(ResolutionError::NoMatch { .. })
    ));
}

#[test]
fn short_names_one_edit_from_two_facilities_are_ambiguous() {
    let registry = registry_of(&["Mercy", "Merci"]);
    let resolver = FacilityResolver::new(&registry, ResolverConfig::default());

    match resolver.resolve("Merct") {
        Err(ResolutionError::AmbiguousMatch { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn unknown_names_return_no_match_with_suggestions() {
    let snapshot = sample_snapshot();
    let resolver = FacilityResolver::new(&snapshot.registry, ResolverConfig::default());

    match resolver.resolve("Zzyzx Veterinary Annex") {
        Err(ResolutionError::NoMatch { suggestions, .. }) => assert!(suggestions.is_empty()),
        other => panic!("expected no match, got {other:?}"),
    }

    match resolver.resolve("Mercy Clinic") {
        Err(ResolutionError::NoMatch { suggestions, .. }) => {
            assert_eq!(suggestions, vec!["Mercy General Hospital".to_string()]);
        }
        other => panic!("expected no match, got {other:?}"),
    }
}

#[test]
fn generic_suffix_words_weigh_little() {
    let snapshot = sample_snapshot();
    let resolver = FacilityResolver::new(&snapshot.registry, ResolverConfig::default());

    let resolved = resolver
        .resolve("Prairie Valley Clinic")
        .expect("distinctive words carry the match");
    assert_eq!(resolved.record.canonical_name, "Prairie Valley Health Center");
    assert_eq!(resolved.match_method, MatchMethod::Fuzzy);
}

#[test]
fn stricter_threshold_turns_typos_into_misses() {
    let snapshot = sample_snapshot();
    let strict = ResolverConfig {
        acceptance_threshold: 0.99,
        ..ResolverConfig::default()
    };
    let resolver = FacilityResolver::new(&snapshot.registry, strict);

    assert!(matches!(
        resolver.resolve("Riverside Regonal Hospital"),
        Err(ResolutionError::NoMatch { .. })
    ));
    assert!(resolver.resolve("st marys").is_ok());
}
