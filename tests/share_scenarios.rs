//! End-to-end share token lifecycles driven by a manual clock, against both
//! backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use medshare_lib::config::ShareConfig;
use medshare_lib::models::{AccessLogEntry, PatientRecord, RecordKind, ShareToken};
use medshare_lib::sharing::token::{generate_raw_token, hash_token};
use medshare_lib::sharing::{
    ClientInfo, ManualClock, MemoryRecordStore, MemoryTokenStore, RecordStore, ShareError,
    ShareService, SqliteRecordStore, SqliteTokenStore, StoreError, TokenStore,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn clinic() -> ClientInfo {
    ClientInfo {
        ip: Some("198.51.100.23".into()),
        user_agent: Some("ClinicTablet/2.1".into()),
    }
}

fn prescription(patient_id: &str, title: &str, recorded_at: DateTime<Utc>) -> PatientRecord {
    PatientRecord {
        id: Uuid::new_v4(),
        patient_id: patient_id.into(),
        kind: RecordKind::Prescription,
        title: title.into(),
        summary: Some("1 tablet daily".into()),
        recorded_at,
    }
}

struct Fixture {
    service: ShareService,
    store: Arc<dyn TokenStore>,
    clock: Arc<ManualClock>,
}

fn memory_fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(t0()));
    let records = Arc::new(MemoryRecordStore::new());
    for day in 1..=25 {
        records
            .add(prescription(
                "patient-1",
                &format!("Rx {day:02}"),
                t0() - Duration::days(30 - day),
            ))
            .unwrap();
    }
    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::default());
    let service =
        ShareService::with_parts(ShareConfig::default(), store.clone(), records, clock.clone());
    Fixture {
        service,
        store,
        clock,
    }
}

fn sqlite_fixture() -> (Fixture, SqliteTokenStore) {
    let clock = Arc::new(ManualClock::new(t0()));
    let sqlite = SqliteTokenStore::memory().unwrap();
    let records = SqliteRecordStore::new(sqlite.shared_connection());
    for day in 1..=25 {
        records
            .add(&prescription(
                "patient-1",
                &format!("Rx {day:02}"),
                t0() - Duration::days(30 - day),
            ))
            .unwrap();
    }
    let store: Arc<dyn TokenStore> = Arc::new(sqlite.clone());
    let service = ShareService::with_parts(
        ShareConfig::default(),
        store.clone(),
        Arc::new(records),
        clock.clone(),
    );
    (
        Fixture {
            service,
            store,
            clock,
        },
        sqlite,
    )
}

fn fixtures() -> Vec<Fixture> {
    vec![memory_fixture(), sqlite_fixture().0]
}

// ═══════════════════════════════════════════════════════════
// Reissue, revoke and expiry timeline
// ═══════════════════════════════════════════════════════════

#[test]
fn reissue_supersedes_then_expires() {
    for fx in fixtures() {
        let a = fx.service.issuer.issue("patient-1", None).unwrap();
        assert_eq!(a.expires_at, t0() + Duration::seconds(600));

        fx.clock.advance(Duration::seconds(10));
        let b = fx.service.issuer.issue("patient-1", None).unwrap();

        fx.clock.advance(Duration::seconds(5));
        assert!(matches!(
            fx.service.gate.resolve(&a.raw_token, &clinic()),
            Err(ShareError::NotFound)
        ));
        let view = fx.service.gate.resolve(&b.raw_token, &clinic()).unwrap();
        assert_eq!(view.patient_id, "patient-1");

        fx.clock.set(t0() + Duration::seconds(611));
        assert!(matches!(
            fx.service.gate.resolve(&b.raw_token, &clinic()),
            Err(ShareError::Expired)
        ));
    }
}

#[test]
fn resolve_before_expiry_is_repeatable_and_at_expiry_is_expired() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();

        fx.clock.set(issued.expires_at - Duration::milliseconds(1));
        for _ in 0..3 {
            assert!(fx.service.gate.resolve(&issued.raw_token, &clinic()).is_ok());
        }

        fx.clock.set(issued.expires_at);
        assert!(matches!(
            fx.service.gate.resolve(&issued.raw_token, &clinic()),
            Err(ShareError::Expired)
        ));
    }
}

#[test]
fn sub_millisecond_issue_time_expires_where_reported() {
    for fx in fixtures() {
        fx.clock
            .set(t0() + Duration::milliseconds(900) + Duration::microseconds(500));
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        assert_eq!(
            issued.expires_at,
            t0() + Duration::milliseconds(900) + Duration::seconds(600)
        );

        let stored = fx.store.get(&hash_token(&issued.raw_token)).unwrap().unwrap();
        assert_eq!(stored.expires_at, issued.expires_at);

        fx.clock.set(issued.expires_at - Duration::microseconds(500));
        let view = fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();
        assert_eq!(view.patient_id, "patient-1");

        fx.clock.set(issued.expires_at);
        assert!(matches!(
            fx.service.gate.resolve(&issued.raw_token, &clinic()),
            Err(ShareError::Expired)
        ));
    }
}

#[test]
fn revoked_token_is_indistinguishable_from_unknown() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        assert_eq!(
            fx.service
                .revocation
                .revoke_active_for_patient("patient-1")
                .unwrap(),
            1
        );

        let revoked = fx.service.gate.resolve(&issued.raw_token, &clinic());
        let unknown = fx.service.gate.resolve(&generate_raw_token(), &clinic());
        assert!(matches!(revoked, Err(ShareError::NotFound)));
        assert!(matches!(unknown, Err(ShareError::NotFound)));

        // Stays dead once expiry passes too
        fx.clock.advance(Duration::minutes(30));
        assert!(matches!(
            fx.service.gate.resolve(&issued.raw_token, &clinic()),
            Err(ShareError::NotFound)
        ));
        assert_eq!(
            fx.service
                .revocation
                .revoke_active_for_patient("patient-1")
                .unwrap(),
            0
        );
    }
}

#[test]
fn never_issued_tokens_are_not_found() {
    for fx in fixtures() {
        fx.service.issuer.issue("patient-1", None).unwrap();
        for _ in 0..10 {
            assert!(matches!(
                fx.service.gate.resolve(&generate_raw_token(), &clinic()),
                Err(ShareError::NotFound)
            ));
        }
    }
}

#[test]
fn tokens_outside_the_issued_alphabet_are_not_found() {
    let over_long = "x".repeat(300);
    for fx in fixtures() {
        fx.service.issuer.issue("patient-1", None).unwrap();
        for raw in [
            "not-issued!!",
            "has space in it",
            "slash/inside/token",
            over_long.as_str(),
        ] {
            assert!(
                matches!(
                    fx.service.gate.resolve(raw, &clinic()),
                    Err(ShareError::NotFound)
                ),
                "{raw:?}"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Resolve: bounded view, access log, read-only
// ═══════════════════════════════════════════════════════════

#[test]
fn repeated_resolve_appends_one_log_entry_each() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        let before = fx.store.tokens_for_patient("patient-1").unwrap();

        fx.clock.advance(Duration::seconds(30));
        let first = fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();
        fx.clock.advance(Duration::seconds(30));
        let second = fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();

        assert_eq!(first.patient_id, second.patient_id);
        assert_eq!(first.records, second.records);

        let log = fx.store.access_log(&issued.token_id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].accessed_at, t0() + Duration::seconds(30));
        assert_eq!(log[1].accessed_at, t0() + Duration::seconds(60));

        // Token rows untouched by resolving
        assert_eq!(fx.store.tokens_for_patient("patient-1").unwrap(), before);
    }
}

#[test]
fn access_log_holds_hashes_not_client_values() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();
        fx.service
            .gate
            .resolve(&issued.raw_token, &ClientInfo::default())
            .unwrap();

        let log = fx.store.access_log(&issued.token_id).unwrap();
        let ip_hash = log[0].ip_hash.as_deref().unwrap();
        let ua_hash = log[0].user_agent_hash.as_deref().unwrap();
        assert_ne!(ip_hash, "198.51.100.23");
        assert_ne!(ua_hash, "ClinicTablet/2.1");
        assert_eq!(ip_hash.len(), 43);
        assert_eq!(log[1].ip_hash, None);
        assert_eq!(log[1].user_agent_hash, None);
    }
}

#[test]
fn resolve_returns_twenty_newest_records() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        let view = fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();

        assert_eq!(view.records.len(), 20);
        assert_eq!(view.records[0].title, "Rx 25");
        assert_eq!(view.records[19].title, "Rx 06");
        assert!(view
            .records
            .windows(2)
            .all(|pair| pair[0].recorded_at >= pair[1].recorded_at));
    }
}

#[test]
fn resolve_only_sees_own_patient_records() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-2", Some("clinic-4")).unwrap();
        let view = fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();
        assert_eq!(view.patient_id, "patient-2");
        assert_eq!(view.facility_id.as_deref(), Some("clinic-4"));
        assert!(view.records.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════
// Hash-only storage
// ═══════════════════════════════════════════════════════════

#[test]
fn stored_token_carries_hash_only() {
    for fx in fixtures() {
        let issued = fx.service.issuer.issue("patient-1", None).unwrap();
        let stored = fx.store.tokens_for_patient("patient-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token_hash, hash_token(&issued.raw_token));
        assert_ne!(stored[0].token_hash, issued.raw_token);
        assert!(!format!("{:?}", stored[0]).contains(&issued.raw_token));
        assert!(!format!("{issued:?}").contains(&issued.raw_token));
    }
}

#[test]
fn sqlite_file_never_contains_raw_token() {
    let (fx, sqlite) = sqlite_fixture();
    let issued = fx.service.issuer.issue("patient-1", None).unwrap();
    fx.service.gate.resolve(&issued.raw_token, &clinic()).unwrap();

    let conn = sqlite.shared_connection();
    let conn = conn.lock().unwrap();
    let hits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM share_tokens
             WHERE id = ?1 OR patient_id = ?1 OR token_hash = ?1 OR facility_id = ?1",
            [&issued.raw_token],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hits, 0);
    let log_hits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM share_access_log
             WHERE ip_hash = ?1 OR user_agent_hash = ?1",
            [&issued.raw_token],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(log_hits, 0);
}

#[test]
fn hashing_is_deterministic_and_collision_free_in_practice() {
    let raw = generate_raw_token();
    assert_eq!(hash_token(&raw), hash_token(&raw));

    let hashes: std::collections::HashSet<String> =
        (0..1000).map(|_| hash_token(&generate_raw_token())).collect();
    assert_eq!(hashes.len(), 1000);
}

// ═══════════════════════════════════════════════════════════
// Malformed tokens never reach storage
// ═══════════════════════════════════════════════════════════

/// Delegating store that counts lookups.
struct CountingStore {
    inner: MemoryTokenStore,
    lookups: AtomicUsize,
}

impl TokenStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    fn get(&self, token_hash: &str) -> Result<Option<ShareToken>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(token_hash)
    }

    fn insert(&self, record: &ShareToken) -> Result<(), StoreError> {
        self.inner.insert(record)
    }

    fn revoke_active_for_patient(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.revoke_active_for_patient(patient_id, now)
    }

    fn revoke_and_insert(&self, record: &ShareToken, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.revoke_and_insert(record, now)
    }

    fn append_access(&self, entry: &AccessLogEntry) -> Result<(), StoreError> {
        self.inner.append_access(entry)
    }

    fn access_log(&self, share_token_id: &Uuid) -> Result<Vec<AccessLogEntry>, StoreError> {
        self.inner.access_log(share_token_id)
    }

    fn tokens_for_patient(&self, patient_id: &str) -> Result<Vec<ShareToken>, StoreError> {
        self.inner.tokens_for_patient(patient_id)
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.prune(cutoff)
    }
}

#[test]
fn short_tokens_are_malformed_without_lookup() {
    let store = Arc::new(CountingStore {
        inner: MemoryTokenStore::default(),
        lookups: AtomicUsize::new(0),
    });
    let service = ShareService::with_parts(
        ShareConfig::default(),
        store.clone(),
        Arc::new(MemoryRecordStore::new()),
        Arc::new(ManualClock::new(t0())),
    );

    for raw in ["", "ab", "123456789"] {
        assert!(matches!(
            service.gate.resolve(raw, &clinic()),
            Err(ShareError::Malformed)
        ));
    }
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);

    // Ten characters is long enough to be looked up
    assert!(matches!(
        service.gate.resolve("1234567890", &clinic()),
        Err(ShareError::NotFound)
    ));
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
}

// ═══════════════════════════════════════════════════════════
// Validation and compaction
// ═══════════════════════════════════════════════════════════

#[test]
fn invalid_patient_id_changes_nothing() {
    for fx in fixtures() {
        for bad in ["", "   ", "patient 1", "p/../1"] {
            assert!(matches!(
                fx.service.issuer.issue(bad, None),
                Err(ShareError::Validation(_))
            ));
        }
        assert!(matches!(
            fx.service.issuer.issue("patient-1", Some("clinic 9")),
            Err(ShareError::Validation(_))
        ));
        assert!(fx.store.tokens_for_patient("patient-1").unwrap().is_empty());
    }
}

#[test]
fn compaction_drops_only_stale_tokens() {
    for fx in fixtures() {
        let old = fx.service.issuer.issue("patient-1", None).unwrap();
        fx.service.gate.resolve(&old.raw_token, &clinic()).unwrap();

        fx.clock.advance(Duration::days(91));
        let fresh = fx.service.issuer.issue("patient-1", None).unwrap();

        let removed = fx
            .service
            .revocation
            .compact(std::time::Duration::from_secs(90 * 24 * 60 * 60))
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = fx.store.tokens_for_patient("patient-1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.token_id);
        assert!(fx.store.access_log(&old.token_id).unwrap().is_empty());
        assert!(fx.service.gate.resolve(&fresh.raw_token, &clinic()).is_ok());
    }
}

#[test]
fn record_store_bounds_apply_per_backend() {
    let (_, sqlite) = sqlite_fixture();
    let records = SqliteRecordStore::new(sqlite.shared_connection());
    assert_eq!(records.recent_records("patient-1", 5).unwrap().len(), 5);
    assert!(records.recent_records("nobody", 5).unwrap().is_empty());
}
