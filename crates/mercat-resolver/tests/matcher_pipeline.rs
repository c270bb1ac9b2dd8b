mod support;

use mercat_resolver::MatchMethod;
use support::resolve_testkit::{
    FakeProvider, angled_vector, axis_vector, open_resolver, temp_home_in_tmp,
};

#[test]
fn empty_input_matches_nothing() {
    let temp = temp_home_in_tmp("mercat-match-empty");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        let resolver = open_resolver(&home, provider.clone());

        let result = resolver.find_best_match("");
        assert!(matches!(result, Ok(None)));
        let result = resolver.find_best_match("   ");
        assert!(matches!(result, Ok(None)));
        // No tier ran, so no provider cost was incurred.
        assert_eq!(provider.call_count(), 0);
    }
}

#[test]
fn exact_display_name_match_short_circuits_all_other_tiers() {
    let temp = temp_home_in_tmp("mercat-match-exact");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        provider.register("STARBUCKS", axis_vector(0));
        provider.register("STARBUCKS COFFEE #", axis_vector(1));
        let resolver = open_resolver(&home, provider.clone());

        let first = resolver.create_or_get_merchant("STARBUCKS", Some("Coffee"));
        assert!(first.is_ok());
        let second = resolver.create_or_get_merchant("STARBUCKS COFFEE #2291", None);
        assert!(second.is_ok());

        let found = resolver.find_best_match("STARBUCKS");
        assert!(found.is_ok());
        if let (Ok(Some(found)), Ok(first)) = (found, first) {
            assert_eq!(found.merchant.merchant_id, first.merchant_id);
            assert_eq!(found.match_method, MatchMethod::Exact);
            assert!((found.similarity_score - 1.0).abs() < f64::EPSILON);
        } else {
            panic!("expected an exact match");
        }
    }
}

#[test]
fn known_abbreviation_resolves_through_the_mapping_table() {
    let temp = temp_home_in_tmp("mercat-match-mapping");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        let resolver = open_resolver(&home, provider.clone());

        let amazon = resolver.create_or_get_merchant("AMAZON", Some("Shopping"));
        assert!(amazon.is_ok());

        let found = resolver.find_best_match("AMZN MKTP US");
        assert!(found.is_ok());
        if let (Ok(Some(found)), Ok(amazon)) = (found, amazon) {
            assert_eq!(found.merchant.merchant_id, amazon.merchant_id);
            assert_eq!(found.match_method, MatchMethod::Mapping);
            assert!((found.similarity_score - 0.95).abs() < f64::EPSILON);
        } else {
            panic!("expected a mapping match");
        }
    }
}

#[test]
fn stored_aliases_match_at_the_alias_tier() {
    let temp = temp_home_in_tmp("mercat-match-alias");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        let resolver = open_resolver(&home, provider.clone());

        let merchant = resolver.create_or_get_merchant("BLUE BOTTLE", None);
        assert!(merchant.is_ok());
        if let Ok(merchant) = &merchant {
            let aliased = resolver.add_alias(&merchant.merchant_id, "BB ROASTERY OAKLAND");
            assert!(aliased.is_ok());
        }

        let found = resolver.find_best_match("BB ROASTERY OAKLAND");
        assert!(found.is_ok());
        if let (Ok(Some(found)), Ok(merchant)) = (found, merchant) {
            assert_eq!(found.merchant.merchant_id, merchant.merchant_id);
            assert_eq!(found.match_method, MatchMethod::Alias);
            assert!((found.similarity_score - 0.95).abs() < f64::EPSILON);
        } else {
            panic!("expected an alias match");
        }
    }
}

#[test]
fn near_miss_spellings_match_at_the_fuzzy_tier() {
    let temp = temp_home_in_tmp("mercat-match-fuzzy");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        let resolver = open_resolver(&home, provider.clone());

        let merchant = resolver.create_or_get_merchant("WALGREENS", None);
        assert!(merchant.is_ok());

        let found = resolver.find_best_match("WALGREEN");
        assert!(found.is_ok());
        if let (Ok(Some(found)), Ok(merchant)) = (found, merchant) {
            assert_eq!(found.merchant.merchant_id, merchant.merchant_id);
            assert_eq!(found.match_method, MatchMethod::Fuzzy);
            assert!(found.similarity_score >= 0.8 && found.similarity_score < 1.0);
        } else {
            panic!("expected a fuzzy match");
        }
    }
}

#[test]
fn embedding_tiers_generate_once_then_serve_from_cache() {
    let temp = temp_home_in_tmp("mercat-match-embed");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        provider.register("BLUE BOTTLE", axis_vector(0));
        // Differently worded query whose vector is nearly parallel.
        provider.register("BLUE BOTTLE ROASTERS OAKLAND", angled_vector(0, 0.97));
        let resolver = open_resolver(&home, provider.clone());

        let merchant = resolver.create_or_get_merchant("BLUE BOTTLE", None);
        assert!(merchant.is_ok());
        let creation_calls = provider.call_count();

        let generated = resolver.find_best_match("BLUE BOTTLE ROASTERS OAKLAND");
        assert!(generated.is_ok());
        if let Ok(Some(generated)) = generated {
            assert_eq!(generated.match_method, MatchMethod::EmbeddingGenerated);
            assert!(generated.similarity_score >= 0.7);
        } else {
            panic!("expected a generated-embedding match");
        }
        assert_eq!(provider.call_count(), creation_calls + 1);

        // The identical query now resolves from the cache with no new call.
        let cached = resolver.find_best_match("BLUE BOTTLE ROASTERS OAKLAND");
        assert!(cached.is_ok());
        if let Ok(Some(cached)) = cached {
            assert_eq!(cached.match_method, MatchMethod::EmbeddingCached);
            assert!(cached.similarity_score >= 0.7);
        } else {
            panic!("expected a cached-embedding match");
        }
        assert_eq!(provider.call_count(), creation_calls + 1);
    }
}

#[test]
fn embedding_matches_respect_the_caller_threshold() {
    let temp = temp_home_in_tmp("mercat-match-threshold");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        provider.register("LOCAL BAKERY", axis_vector(0));
        // cosine 0.5 against the stored merchant.
        provider.register("NEIGHBORHOOD BREAD", angled_vector(0, 0.5));
        let resolver = open_resolver(&home, provider.clone());

        let merchant = resolver.create_or_get_merchant("LOCAL BAKERY", None);
        assert!(merchant.is_ok());

        // Below the default 0.7 threshold: no match.
        let strict = resolver.find_best_match("NEIGHBORHOOD BREAD");
        assert!(matches!(strict, Ok(None)));

        // A permissive caller threshold accepts the same vector.
        let loose = resolver.find_best_match_with_threshold("NEIGHBORHOOD BREAD", 0.4);
        assert!(loose.is_ok());
        if let Ok(Some(loose)) = loose {
            assert!(loose.similarity_score >= 0.4 && loose.similarity_score < 0.7);
        } else {
            panic!("expected a match at the looser threshold");
        }
    }
}

#[test]
fn provider_failure_degrades_to_no_match() {
    let temp = temp_home_in_tmp("mercat-match-provider-down");
    assert!(temp.is_ok());
    if let Ok((_dir, home)) = temp {
        let provider = FakeProvider::new();
        provider.register("LOCAL BAKERY", axis_vector(0));
        let resolver = open_resolver(&home, provider.clone());

        let merchant = resolver.create_or_get_merchant("LOCAL BAKERY", None);
        assert!(merchant.is_ok());

        provider.set_failing(true);
        let result = resolver.find_best_match("COMPLETELY UNKNOWN VENDOR");
        assert!(matches!(result, Ok(None)));
    }
}
