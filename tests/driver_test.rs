// tests/driver_test.rs
use semver_store::domain::{Bump, SemanticVersion};
use semver_store::driver::{Driver, StoreDriver, MAX_RETRIES};
use semver_store::store::{MemoryStore, Snapshot, VersionStore, WriteOutcome};
use semver_store::{Result, SemverStoreError};
use std::sync::{Arc, Barrier};
use std::thread;

fn v(s: &str) -> SemanticVersion {
    SemanticVersion::parse(s).unwrap()
}

/// Store wrapper that makes two callers finish their first read before
/// either of them writes
struct Lockstep {
    inner: MemoryStore,
    barrier: Arc<Barrier>,
    reads: std::sync::atomic::AtomicUsize,
}

impl Lockstep {
    fn new(inner: MemoryStore, barrier: Arc<Barrier>) -> Self {
        Lockstep {
            inner,
            barrier,
            reads: Default::default(),
        }
    }
}

impl VersionStore for Lockstep {
    type Token = u64;

    fn read(&self) -> Result<Snapshot<u64>> {
        let snapshot = self.inner.read()?;
        let reads = self
            .reads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if reads == 0 {
            self.barrier.wait();
        }
        Ok(snapshot)
    }

    fn write_if(&self, version: &SemanticVersion, expected: &u64) -> Result<WriteOutcome> {
        self.inner.write_if(version, expected)
    }

    fn write(&self, version: &SemanticVersion) -> Result<()> {
        self.inner.write(version)
    }
}

#[test]
fn test_concurrent_bumps_do_not_lose_updates() {
    let store = MemoryStore::with_version(&v("1.0.0"));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let driver = StoreDriver::new(
                Lockstep::new(store.clone(), Arc::clone(&barrier)),
                SemanticVersion::default(),
            );
            thread::spawn(move || driver.bump(&Bump::Patch))
        })
        .collect();

    let mut results: Vec<SemanticVersion> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    results.sort();

    assert_eq!(results, vec![v("1.0.1"), v("1.0.2")]);
    assert_eq!(store.contents().as_deref(), Some("1.0.2"));
    assert_eq!(store.conflicts(), 1);
}

#[test]
fn test_many_concurrent_bumps_apply_exactly_once_each() {
    let store = MemoryStore::with_version(&v("0.1.0"));
    let writers = 6;

    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let driver = StoreDriver::with_max_attempts(store.clone(), SemanticVersion::default(), 100);
            thread::spawn(move || driver.bump(&Bump::Patch))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(store.contents().as_deref(), Some("0.1.6"));
}

#[test]
fn test_ceiling_exhausted_reports_concurrent_modification() {
    let store = MemoryStore::with_version(&v("1.0.0"));
    store.fail_next_writes(MAX_RETRIES);
    let driver = StoreDriver::new(store.clone(), SemanticVersion::default());

    let err = driver.bump(&Bump::Minor).unwrap_err();
    assert!(matches!(
        err,
        SemverStoreError::ConcurrentModification { attempts: MAX_RETRIES }
    ));
    assert_eq!(store.conflicts(), MAX_RETRIES);
    assert_eq!(store.contents().as_deref(), Some("1.0.0"));
}

#[test]
fn test_prerelease_lifecycle() {
    let store = MemoryStore::with_version(&v("1.0.0"));
    let driver = StoreDriver::new(store, SemanticVersion::default());

    assert_eq!(driver.bump(&Bump::Pre(None)).unwrap(), v("1.0.1-rc.1"));
    assert_eq!(driver.bump(&Bump::Pre(None)).unwrap(), v("1.0.1-rc.2"));
    assert_eq!(
        driver.bump(&Bump::Pre(Some("beta".to_string()))).unwrap(),
        v("1.0.1-beta.1")
    );
    assert_eq!(driver.bump(&Bump::Final).unwrap(), v("1.0.1"));
    assert!(matches!(
        driver.bump(&Bump::Final).unwrap_err(),
        SemverStoreError::NoPrereleaseToFinalize(_)
    ));
    assert_eq!(driver.check(None).unwrap(), vec![v("1.0.1")]);
}

#[test]
fn test_initial_version_is_used_then_persisted() {
    let store = MemoryStore::new();
    let driver = StoreDriver::new(store.clone(), v("0.3.0"));

    assert_eq!(driver.check(None).unwrap(), vec![v("0.3.0")]);
    assert_eq!(store.contents(), None);

    assert_eq!(driver.bump(&Bump::Major).unwrap(), v("1.0.0"));
    assert_eq!(driver.check(None).unwrap(), vec![v("1.0.0")]);
}

#[test]
fn test_set_then_check_with_cursor() {
    let store = MemoryStore::with_version(&v("2.0.0"));
    let driver = StoreDriver::new(store, SemanticVersion::default());

    driver.set(&v("1.5.0")).unwrap();
    assert!(driver.check(Some(&v("2.0.0"))).unwrap().is_empty());
    assert_eq!(driver.check(Some(&v("1.5.0"))).unwrap(), vec![v("1.5.0")]);
    assert_eq!(
        driver.check(Some(&v("1.5.0-rc.1"))).unwrap(),
        vec![v("1.5.0")]
    );
}

#[test]
fn test_drivers_are_object_safe() {
    let drivers: Vec<Box<dyn Driver>> = vec![
        Box::new(StoreDriver::new(MemoryStore::new(), v("1.0.0"))),
        Box::new(StoreDriver::new(
            MemoryStore::with_version(&v("4.0.0")),
            v("1.0.0"),
        )),
    ];

    let bumped: Vec<_> = drivers
        .iter()
        .map(|driver| driver.bump(&Bump::Patch).unwrap())
        .collect();
    assert_eq!(bumped, vec![v("1.0.1"), v("4.0.1")]);
}
