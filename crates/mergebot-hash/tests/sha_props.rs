use mergebot_hash::{HashError, Sha};
use proptest::prelude::*;

proptest! {
    #[test]
    fn sha1_hex_parses_and_prints_back(hex in "[0-9a-f]{40}") {
        let sha = Sha::from_hex(&hex).unwrap();
        prop_assert_eq!(sha.to_hex(), hex);
    }

    #[test]
    fn uppercase_names_equal_lowercase(hex in "[0-9a-f]{64}") {
        let lower = Sha::from_hex(&hex).unwrap();
        let upper = Sha::from_hex(&hex.to_uppercase()).unwrap();
        prop_assert_eq!(lower, upper);
    }

    #[test]
    fn other_lengths_rejected(hex in "[0-9a-f]{1,39}") {
        let err = Sha::from_hex(&hex).unwrap_err();
        prop_assert_eq!(err, HashError::InvalidLength { actual: hex.len() });
    }
}

#[test]
fn yaml_round_trip_uses_hex_strings() {
    let sha = Sha::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
    let yaml = serde_yaml::to_string(&sha).unwrap();
    assert_eq!(yaml.trim().trim_matches('\''), "0123456789abcdef0123456789abcdef01234567");
    let back: Sha = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back, sha);
}

#[test]
fn yaml_rejects_bad_names() {
    let result: Result<Sha, _> = serde_yaml::from_str("not-a-sha");
    assert!(result.is_err());
}
