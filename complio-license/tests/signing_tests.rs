mod common;

use common::{TEST_EMAIL, TEST_SECRET_HEX, test_key};
use complio_license::{
    LicenseError, SIGNATURE_HEX_LEN, SigningSecret, sign, signing_message, verify,
};

#[test]
fn message_is_pipe_delimited_in_order() {
    assert_eq!(
        signing_message("COMPL-AAAA-BBBB-CCCC-DDDD", "a@b.c", "PRO"),
        "COMPL-AAAA-BBBB-CCCC-DDDD|a@b.c|PRO"
    );
}

#[test]
fn signature_is_lowercase_hex_64() {
    let sig = sign(test_key().as_str(), TEST_EMAIL, "PRO", TEST_SECRET_HEX).unwrap();
    assert_eq!(sig.len(), SIGNATURE_HEX_LEN);
    assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn known_answer() {
    // Signatures already in the field must keep verifying.
    let sig = sign(test_key().as_str(), TEST_EMAIL, "PRO", TEST_SECRET_HEX).unwrap();
    assert_eq!(
        sig,
        "c35e32cb33fd25c729a0f7a039090200eed53c53fa16d40725f507e5386b8761"
    );
}

#[test]
fn secret_from_hex_decodes_bytes() {
    let secret = SigningSecret::from_hex(&"0b".repeat(20)).unwrap();
    assert_eq!(secret.as_bytes(), &[0x0b; 20]);
}

#[test]
fn sign_then_verify() {
    let key = test_key();
    let sig = sign(key.as_str(), TEST_EMAIL, "STARTER", TEST_SECRET_HEX).unwrap();
    assert!(verify(key.as_str(), TEST_EMAIL, "STARTER", &sig, TEST_SECRET_HEX));
}

#[test]
fn verify_rejects_changed_tier() {
    let key = test_key();
    let sig = sign(key.as_str(), TEST_EMAIL, "STARTER", TEST_SECRET_HEX).unwrap();
    assert!(!verify(key.as_str(), TEST_EMAIL, "ENTERPRISE", &sig, TEST_SECRET_HEX));
}

#[test]
fn verify_rejects_uppercase_signature() {
    let key = test_key();
    let sig = sign(key.as_str(), TEST_EMAIL, "PRO", TEST_SECRET_HEX).unwrap();
    assert!(!verify(key.as_str(), TEST_EMAIL, "PRO", &sig.to_uppercase(), TEST_SECRET_HEX));
}

#[test]
fn verify_rejects_truncated_and_extended_signature() {
    let key = test_key();
    let sig = sign(key.as_str(), TEST_EMAIL, "PRO", TEST_SECRET_HEX).unwrap();
    assert!(!verify(key.as_str(), TEST_EMAIL, "PRO", &sig[..63], TEST_SECRET_HEX));
    assert!(!verify(key.as_str(), TEST_EMAIL, "PRO", &format!("{sig}0"), TEST_SECRET_HEX));
    assert!(!verify(key.as_str(), TEST_EMAIL, "PRO", "", TEST_SECRET_HEX));
}

#[test]
fn sign_with_non_hex_secret_fails() {
    let err = sign(test_key().as_str(), TEST_EMAIL, "PRO", "not-hex!").unwrap_err();
    assert!(matches!(err, LicenseError::InvalidSecretEncoding(_)));
}

#[test]
fn sign_with_odd_length_secret_fails() {
    let err = sign(test_key().as_str(), TEST_EMAIL, "PRO", "abc").unwrap_err();
    assert!(matches!(err, LicenseError::InvalidSecretEncoding(_)));
}

#[test]
fn verify_with_non_hex_secret_fails_closed() {
    let key = test_key();
    let sig = sign(key.as_str(), TEST_EMAIL, "PRO", TEST_SECRET_HEX).unwrap();
    assert!(!verify(key.as_str(), TEST_EMAIL, "PRO", &sig, "zz"));
}

#[test]
fn secret_debug_is_redacted() {
    let secret = SigningSecret::from_hex(TEST_SECRET_HEX).unwrap();
    let debug = format!("{secret:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("0001020304"));
}

#[test]
fn empty_secret_still_signs() {
    let sig = sign("k", "e", "t", "").unwrap();
    assert_eq!(sig.len(), SIGNATURE_HEX_LEN);
}
