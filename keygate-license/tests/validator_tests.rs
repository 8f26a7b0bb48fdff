mod common;

use common::{config_for, down, expiry_in, mount_check, success, validator, UNREACHABLE};
use keygate_license::{ContentPatch, ErrorKind, LicenseContent, MemoryStore, Outcome};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Successful checks ───────────────────────────────────────────

#[tokio::test]
async fn success_reply_licenses() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        success(json!({"version": "pro", "pack": "1y", "expire": "01/01/2099 00:00"})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    assert!(v.is_new().unwrap());

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Licensed);
    assert!(validation.is_valid());
    assert_eq!(v.get_version().unwrap(), "pro");
    assert!(v.get_expire().unwrap() > 0);
    assert!(v.is_licensed().unwrap());
    assert!(!v.is_new().unwrap());

    let data = v.get_data().unwrap();
    assert_eq!(data.pack.as_deref(), Some("1y"));
    assert_eq!(data.date.as_deref(), Some("01/01/2099 00:00"));
    assert_eq!(v.last_error().unwrap(), None);
}

#[tokio::test]
async fn check_sends_domain_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/license/check/"))
        .and(query_param("domain", common::DOMAIN))
        .and(query_param("key", "K-123"))
        .respond_with(success(json!({"version": "pro"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    let activation = v
        .activate(keygate_license::Credentials {
            key: Some("K-123".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(activation.status());
}

#[tokio::test]
async fn missing_fields_fall_back_to_defaults() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    assert!(v.validate().await.unwrap());
    let data = v.get_data().unwrap();
    assert_eq!(data.version.as_deref(), Some("lite"));
    assert_eq!(data.pack.as_deref(), Some("1s"));
    // No expiry means "now", which is worth one day.
    assert_eq!(data.expire, Some(1));
}

#[tokio::test]
async fn expire_counts_days_plus_one() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"expire": expiry_in(10, 2)}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    assert!(v.validate().await.unwrap());
    assert_eq!(v.get_expire().unwrap(), 11);
}

#[tokio::test]
async fn expiry_earlier_today_still_counts_one_day() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "pro", "expire": expiry_in(0, -5)}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Licensed);
    assert_eq!(v.get_expire().unwrap(), 1);
    assert!(v.is_licensed().unwrap());
    assert_eq!(v.last_error().unwrap(), None);
}

#[tokio::test]
async fn float_status_code_is_accepted() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "code": 200.0,
            "status": "success",
            "content": {"version": "pro"}
        })),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    assert_eq!(v.is_valid().await.unwrap().outcome, Outcome::Licensed);
    assert!(v.is_licensed().unwrap());
}

#[tokio::test]
async fn success_stores_quota() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        success(json!({"version": "pro", "quota": ["a.example", "b.example"]})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    assert!(v.validate().await.unwrap());
    assert_eq!(v.get_data().unwrap().quota, vec!["a.example", "b.example"]);
}

#[tokio::test]
async fn success_clears_previous_error() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "pro"}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    v.disable(Some("stale")).unwrap();
    assert_eq!(v.last_error().unwrap().as_deref(), Some("stale"));

    assert!(v.validate().await.unwrap());
    assert_eq!(v.last_error().unwrap(), None);
}

// ── Rejections ──────────────────────────────────────────────────

#[tokio::test]
async fn api_version_is_rejected() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "api"}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::InvalidVersion));
    assert!(!validation.is_valid());
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some(v.translator().message(ErrorKind::InvalidVersion))
    );
    assert_eq!(v.get_expire().unwrap(), 0);
    assert!(v.is_expired().unwrap());
}

#[tokio::test]
async fn server_error_message_is_translated() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::InvalidAuth));
    assert_eq!(
        validation.response.and_then(|r| r.message).as_deref(),
        Some("Unauthorized")
    );
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some("Please verify your email and password")
    );
    assert!(v.is_disabled().unwrap());
}

#[tokio::test]
async fn unknown_server_message_uses_unknown_error() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"message": "Something odd"})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::UnknownError));
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some("Unknown error, please contact support")
    );
}

#[tokio::test]
async fn empty_body_is_empty_response() {
    for body in ["", "not json", "{}", "[]", "null"] {
        let server = MockServer::start().await;
        mount_check(&server, ResponseTemplate::new(200).set_body_string(body)).await;

        let store = Arc::new(MemoryStore::new());
        let mut v = validator(config_for(&server.uri(), None), &store);

        let validation = v.is_valid().await.unwrap();
        assert_eq!(
            validation.outcome,
            Outcome::Rejected(ErrorKind::EmptyResponse),
            "body {body:?}"
        );
        assert_eq!(
            v.last_error().unwrap().as_deref(),
            Some("No response, please try again")
        );
        assert_eq!(v.get_expire().unwrap(), 0);
    }
}

#[tokio::test]
async fn malformed_reply_is_invalid_response() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "status": "success",
            "content": {"expire": 42}
        })),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::InvalidResponse));
    assert!(validation.response.is_none());
    assert!(v.is_expired().unwrap());
}

#[tokio::test]
async fn past_expiry_is_expired_license() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "pro", "expire": expiry_in(-30, 0)}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::ExpiredLicense));
    assert!(!validation.is_valid());
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some("Your license is expired, please renew it")
    );
    assert_eq!(v.get_expire().unwrap(), 0);
    assert!(!v.is_licensed().unwrap());
    assert_eq!(v.get_version().unwrap(), "pro");
}

#[tokio::test]
async fn licensed_then_expired_on_next_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/license/check/"))
        .respond_with(success(json!({"expire": expiry_in(30, 0)})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_check(&server, success(json!({"expire": expiry_in(-2, 0)}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    assert!(v.validate().await.unwrap());
    assert!(v.is_licensed().unwrap());

    assert!(!v.validate().await.unwrap());
    assert!(v.is_disabled().unwrap());
    assert!(v.last_error().unwrap().is_some());
}

#[tokio::test]
async fn unreadable_expiry_is_invalid_response() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"expire": "someday"}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::InvalidResponse));
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some("Invalid response, please try again")
    );
    assert_eq!(v.get_expire().unwrap(), 0);
}

#[tokio::test]
async fn unrecognized_reply_leaves_state_untouched() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"code": 403, "status": "error"})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    v.set_data(ContentPatch {
        version: Some("pro".into()),
        expire: Some(30),
        ..ContentPatch::default()
    })
    .unwrap();
    let before = v.get_data().unwrap();

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Unrecognized);
    assert!(!validation.is_valid());
    assert_eq!(v.get_data().unwrap(), before);
    assert_eq!(v.last_error().unwrap(), None);
    assert!(v.is_licensed().unwrap());
}

// ── Failover ────────────────────────────────────────────────────

#[tokio::test]
async fn both_hosts_down_fails_open() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    mount_check(&primary, down()).await;
    mount_check(&backup, down()).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&primary.uri(), Some(&backup.uri())), &store);
    v.set_data(ContentPatch {
        expire: Some(0),
        ..ContentPatch::default()
    })
    .unwrap();
    let before = v.get_data().unwrap();

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::ServiceUnavailable);
    assert!(validation.is_valid());
    assert_eq!(v.get_data().unwrap(), before);
    assert_eq!(v.last_error().unwrap(), None);
}

#[tokio::test]
async fn fail_open_keeps_new_install_new() {
    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(UNREACHABLE, None), &store);

    assert!(v.validate().await.unwrap());
    assert!(v.is_new().unwrap());
    assert!(!v.is_licensed().unwrap());
}

#[tokio::test]
async fn down_primary_fails_over_to_backup() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/license/check/"))
        .respond_with(down())
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path("/license/check/"))
        .respond_with(success(json!({"version": "pro"})))
        .expect(1)
        .mount(&backup)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&primary.uri(), Some(&backup.uri())), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Licensed);
    assert_eq!(v.get_version().unwrap(), "pro");
}

#[tokio::test]
async fn unreachable_primary_fails_over_to_backup() {
    let backup = MockServer::start().await;
    mount_check(
        &backup,
        ResponseTemplate::new(200).set_body_json(json!({"message": "Invalid license key"})),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(UNREACHABLE, Some(&backup.uri())), &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::Rejected(ErrorKind::InvalidKey));
    assert_eq!(
        v.last_error().unwrap().as_deref(),
        Some("Your license key is invalid, please buy new license")
    );
}

#[tokio::test]
async fn timeout_counts_as_down() {
    let server = MockServer::start().await;
    mount_check(
        &server,
        success(json!({"version": "pro"})).set_delay(Duration::from_secs(3)),
    )
    .await;

    let mut config = config_for(&server.uri(), None);
    config.client.timeout_secs = 1;
    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config, &store);

    let validation = v.is_valid().await.unwrap();
    assert_eq!(validation.outcome, Outcome::ServiceUnavailable);
    assert!(v.is_new().unwrap());
}

#[tokio::test]
async fn ping_probes_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    assert!(v.ping().await);

    let mut offline = validator(config_for(UNREACHABLE, None), &store);
    assert!(!offline.ping().await);
}

// ── Local state ─────────────────────────────────────────────────

#[tokio::test]
async fn disable_forces_sentinel() {
    let store = Arc::new(MemoryStore::new());
    let v = validator(config_for(UNREACHABLE, None), &store);

    v.set_data(ContentPatch {
        expire: Some(120),
        ..ContentPatch::default()
    })
    .unwrap();
    assert!(v.is_licensed().unwrap());

    v.disable(None).unwrap();
    assert_eq!(v.get_expire().unwrap(), 0);
    assert!(v.is_expired().unwrap());
    assert!(!v.is_activated().unwrap());
    assert_eq!(v.last_error().unwrap(), None);

    v.disable(Some("")).unwrap();
    assert_eq!(v.last_error().unwrap(), None);
}

#[tokio::test]
async fn set_data_merges_partial_updates() {
    let store = Arc::new(MemoryStore::new());
    let v = validator(config_for(UNREACHABLE, None), &store);

    v.set_data(ContentPatch {
        version: Some("pro".into()),
        pack: Some("1y".into()),
        expire: Some(12),
        ..ContentPatch::default()
    })
    .unwrap();
    v.set_data(ContentPatch {
        pack: Some("2y".into()),
        ..ContentPatch::default()
    })
    .unwrap();

    let data = v.get_data().unwrap();
    assert_eq!(data.version.as_deref(), Some("pro"));
    assert_eq!(data.pack.as_deref(), Some("2y"));
    assert_eq!(data.expire, Some(12));
}

#[tokio::test]
async fn predicates_follow_expire() {
    let store = Arc::new(MemoryStore::new());
    let v = validator(config_for(UNREACHABLE, None), &store);

    // New: never validated.
    assert!(v.is_new().unwrap());
    assert!(v.is_expired().unwrap());
    assert!(!v.is_licensed().unwrap());
    assert_eq!(v.get_version().unwrap(), "lite");

    // Disabled.
    v.disable(None).unwrap();
    assert!(!v.is_new().unwrap());
    assert!(v.is_disabled().unwrap());
    assert!(!v.is_licensed().unwrap());

    // Licensed.
    v.set_data(ContentPatch {
        expire: Some(3),
        ..ContentPatch::default()
    })
    .unwrap();
    assert!(v.is_activated().unwrap());
    assert!(v.is_licensed().unwrap());
    assert_eq!(
        v.is_licensed().unwrap(),
        !v.is_expired().unwrap() && !v.is_new().unwrap()
    );
}

#[tokio::test]
async fn reset_restores_defaults() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "pro", "expire": expiry_in(30, 0)}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut v = validator(config_for(&server.uri(), None), &store);
    v.activate(keygate_license::Credentials {
        key: Some("K-1".into()),
        ..Default::default()
    })
    .await
    .unwrap();
    v.disable(Some("boom")).unwrap();

    v.reset().unwrap();
    assert_eq!(v.get_data().unwrap(), LicenseContent::default());
    assert!(v.is_new().unwrap());
    assert_eq!(v.last_error().unwrap(), None);
    assert_eq!(v.credentials(), &keygate_license::Credentials::default());
}

#[tokio::test]
async fn state_is_shared_through_the_store() {
    let server = MockServer::start().await;
    mount_check(&server, success(json!({"version": "pro"}))).await;

    let store = Arc::new(MemoryStore::new());
    let mut first = validator(config_for(&server.uri(), None), &store);
    let second = validator(config_for(&server.uri(), None), &store);

    assert!(first.validate().await.unwrap());
    assert!(second.is_licensed().unwrap());
    assert_eq!(second.get_version().unwrap(), "pro");
}
