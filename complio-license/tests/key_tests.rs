mod common;

use common::test_key;
use complio_license::{KEY_LEN, KEY_PREFIX, LicenseError, LicenseKey, is_well_formed};
use std::collections::HashSet;

fn matches_key_pattern(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("COMPL-") else {
        return false;
    };
    let groups: Vec<&str> = rest.split('-').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| g.len() == 4 && g.chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')))
}

// ── Generation ───────────────────────────────────────────────────

#[test]
fn generated_key_matches_pattern() {
    for _ in 0..200 {
        let key = LicenseKey::generate();
        assert!(matches_key_pattern(key.as_str()), "bad key {key}");
        assert_eq!(key.as_str().len(), KEY_LEN);
    }
}

#[test]
fn generated_key_passes_format_check() {
    let key = LicenseKey::generate();
    assert!(is_well_formed(key.as_str()));
    assert!(LicenseKey::parse(key.as_str()).is_ok());
}

#[test]
fn generated_key_decodes_to_eight_bytes() {
    let key = LicenseKey::generate();
    let payload = key.payload().unwrap();
    assert_eq!(payload.len(), 8);
    assert_eq!(LicenseKey::from_payload(&payload), key);
}

#[test]
fn generated_keys_differ() {
    let keys: HashSet<String> = (0..1000).map(|_| LicenseKey::generate().to_string()).collect();
    assert_eq!(keys.len(), 1000);
}

#[test]
fn from_payload_is_uppercase_grouped() {
    assert_eq!(test_key().as_str(), "COMPL-DEAD-BEEF-0123-4567");
}

#[test]
fn key_len_constant() {
    assert_eq!(KEY_LEN, 25);
    assert_eq!(KEY_PREFIX, "COMPL");
}

// ── Format check ─────────────────────────────────────────────────

#[test]
fn rejects_short_input() {
    assert!(!is_well_formed("not-a-key"));
    assert!(!is_well_formed(""));
}

#[test]
fn rejects_wrong_prefix() {
    assert!(!is_well_formed("ABCDE-DEAD-BEEF-0123-4567"));
    assert!(!is_well_formed("compl-DEAD-BEEF-0123-4567"));
}

#[test]
fn rejects_prefix_without_hyphen() {
    assert!(!is_well_formed("COMPLXDEAD-BEEF-0123-4567"));
}

#[test]
fn rejects_wrong_length() {
    assert!(!is_well_formed("COMPL-DEAD-BEEF-0123-45678"));
    assert!(!is_well_formed("COMPL-DEAD-BEEF-0123-456"));
}

#[test]
fn rejects_multibyte_input_of_key_byte_length() {
    // 16 characters but 25 bytes.
    let raw = format!("COMPL-{}a", "é".repeat(9));
    assert_eq!(raw.len(), KEY_LEN);
    assert!(!is_well_formed(&raw));
    assert!(LicenseKey::parse(&raw).is_err());
}

#[test]
fn parse_reports_format_error() {
    let err = LicenseKey::parse("not-a-key").unwrap_err();
    assert!(matches!(err, LicenseError::InvalidKeyFormat(_)));
}

#[test]
fn non_hex_key_has_no_payload() {
    let key = LicenseKey::parse("COMPL-ZZZZ-BEEF-0123-4567").unwrap();
    assert!(key.payload().is_none());
}

#[test]
fn key_serde_is_transparent() {
    let json = serde_json::to_string(&test_key()).unwrap();
    assert_eq!(json, "\"COMPL-DEAD-BEEF-0123-4567\"");
    let parsed: LicenseKey = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, test_key());
}

#[test]
fn key_deserialize_rejects_malformed() {
    let result: Result<LicenseKey, _> = serde_json::from_str("\"COMPL-short\"");
    assert!(result.is_err());
}
