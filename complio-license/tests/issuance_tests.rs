mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{CountingStore, RecordingNotifier, TEST_SECRET_HEX};
use complio_license::{
    ClientInfo, DEFAULT_TERM_DAYS, DisabledNotifier, IssueRequest, LicenseError, LicenseIssuer,
    LicenseKey, LicenseMetadata, LicenseStatus, LicenseStore, LicenseValidator, MAX_KEY_ATTEMPTS,
    Tier, is_well_formed, parse_timestamp, verify,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn request(tier: Tier) -> IssueRequest {
    IssueRequest {
        email: "buyer@example.com".to_string(),
        tier,
        customer_id: Some("cus_9".to_string()),
        subscription_id: Some("sub_9".to_string()),
        expires_at: None,
        metadata: LicenseMetadata {
            origin_event_id: Some("cs_live_9".to_string()),
            created_via: "stripe_webhook".to_string(),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn issue_persists_signed_active_record() {
    let store = Arc::new(CountingStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let issuer = LicenseIssuer::new(store.clone(), notifier.clone(), TEST_SECRET_HEX).unwrap();

    let issued = issuer.issue(request(Tier::Pro)).await.unwrap();
    let record = &issued.record;

    assert!(is_well_formed(record.license_key.as_str()));
    assert_eq!(record.status, LicenseStatus::Active);
    assert_eq!(record.validation_count, 0);
    assert!(record.last_validated_at.is_none());
    assert_eq!(record.stripe_subscription_id.as_deref(), Some("sub_9"));
    assert!(verify(
        record.license_key.as_str(),
        &record.email,
        "PRO",
        &record.signature,
        TEST_SECRET_HEX
    ));

    let stored = store
        .get_license(record.license_key.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&stored, record);
}

#[tokio::test]
async fn default_term_is_thirty_days() {
    let store = Arc::new(CountingStore::new());
    let issuer =
        LicenseIssuer::new(store, Arc::new(RecordingNotifier::default()), TEST_SECRET_HEX).unwrap();

    let issued = issuer.issue(request(Tier::Starter)).await.unwrap();
    let expires = parse_timestamp(issued.record.expires_at.as_deref().unwrap()).unwrap();
    let expected = Utc::now() + Duration::days(DEFAULT_TERM_DAYS);
    assert!((expected - expires).num_seconds().abs() < 5);
}

#[tokio::test]
async fn explicit_expiry_is_kept() {
    let store = Arc::new(CountingStore::new());
    let issuer =
        LicenseIssuer::new(store, Arc::new(RecordingNotifier::default()), TEST_SECRET_HEX).unwrap();
    let at = Utc.with_ymd_and_hms(2031, 1, 2, 3, 4, 5).unwrap();

    let issued = issuer
        .issue(IssueRequest {
            expires_at: Some(at),
            ..request(Tier::Enterprise)
        })
        .await
        .unwrap();
    assert_eq!(issued.record.expires_at.as_deref(), Some("2031-01-02T03:04:05Z"));
}

#[tokio::test]
async fn activation_email_sent_once() {
    let store = Arc::new(CountingStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let issuer = LicenseIssuer::new(store, notifier.clone(), TEST_SECRET_HEX).unwrap();

    let issued = issuer.issue(request(Tier::EarlyAccess)).await.unwrap();

    assert!(issued.email_sent);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "buyer@example.com");
    assert_eq!(sent[0].1, issued.record.license_key.to_string());
    assert_eq!(sent[0].2, Tier::EarlyAccess);
}

#[tokio::test]
async fn email_failure_keeps_license() {
    let store = Arc::new(CountingStore::new());
    let issuer =
        LicenseIssuer::new(store.clone(), Arc::new(RecordingNotifier::failing()), TEST_SECRET_HEX)
            .unwrap();

    let issued = issuer.issue(request(Tier::Pro)).await.unwrap();

    assert!(!issued.email_sent);
    assert_eq!(store.inner.license_count().await, 1);
}

#[tokio::test]
async fn disabled_notifier_is_non_fatal() {
    let store = Arc::new(CountingStore::new());
    let issuer = LicenseIssuer::new(store, Arc::new(DisabledNotifier), TEST_SECRET_HEX).unwrap();
    let issued = issuer.issue(request(Tier::Pro)).await.unwrap();
    assert!(!issued.email_sent);
}

#[tokio::test]
async fn key_collision_retries_with_fresh_key() {
    let store = Arc::new(CountingStore::new());
    store.conflicts_remaining.store(2, Ordering::SeqCst);
    let issuer =
        LicenseIssuer::new(store.clone(), Arc::new(RecordingNotifier::default()), TEST_SECRET_HEX)
            .unwrap();

    issuer.issue(request(Tier::Pro)).await.unwrap();
    assert_eq!(store.inner.license_count().await, 1);
}

#[tokio::test]
async fn persistent_collisions_give_up() {
    let store = Arc::new(CountingStore::new());
    store
        .conflicts_remaining
        .store(MAX_KEY_ATTEMPTS as usize, Ordering::SeqCst);
    let notifier = Arc::new(RecordingNotifier::default());
    let issuer = LicenseIssuer::new(store.clone(), notifier.clone(), TEST_SECRET_HEX).unwrap();

    let err = issuer.issue(request(Tier::Pro)).await.unwrap_err();
    assert!(matches!(err, LicenseError::KeyCollision(n) if n == MAX_KEY_ATTEMPTS));
    assert!(notifier.sent().is_empty());
}

#[test]
fn issuer_rejects_non_hex_secret() {
    let result = LicenseIssuer::new(
        Arc::new(CountingStore::new()),
        Arc::new(DisabledNotifier),
        "nope",
    );
    assert!(matches!(result, Err(LicenseError::InvalidSecretEncoding(_))));
}

#[test]
fn build_record_binds_key_email_tier() {
    let issuer = LicenseIssuer::new(
        Arc::new(CountingStore::new()),
        Arc::new(DisabledNotifier),
        TEST_SECRET_HEX,
    )
    .unwrap();
    let key = LicenseKey::generate();
    let record = issuer.build_record(key.clone(), &request(Tier::Starter));
    assert_eq!(record.license_key, key);
    assert!(verify(
        key.as_str(),
        "buyer@example.com",
        "STARTER",
        &record.signature,
        TEST_SECRET_HEX
    ));
}

#[tokio::test]
async fn issued_license_validates() {
    let store = Arc::new(CountingStore::new());
    let issuer =
        LicenseIssuer::new(store.clone(), Arc::new(DisabledNotifier), TEST_SECRET_HEX).unwrap();
    let validator = LicenseValidator::new(store.clone(), TEST_SECRET_HEX);

    let issued = issuer.issue(request(Tier::Enterprise)).await.unwrap();
    let verdict = validator
        .validate(issued.record.license_key.as_str(), &ClientInfo::default())
        .await
        .unwrap();

    assert!(verdict.is_valid());
}
