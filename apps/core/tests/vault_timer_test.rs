#![cfg(unix)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use keyfind_core::scheduler::{Scheduler, TimerHandle};
use keyfind_core::vault::Vault;

const FAKE_CLI: &str = r#"#!/bin/sh
if [ "$1" = "--help" ]; then exit 0; fi
cat > /dev/null
case "$1" in
  ls) printf 'github\n' ;;
  locate) printf 'github\n' ;;
esac
exit 0
"#;

struct ScheduledJob {
    job: Option<Box<dyn FnOnce() + Send>>,
    handle: TimerHandle,
}

/// Test scheduler: collects jobs instead of sleeping, so tests decide when
/// and whether a pending wipe fires.
#[derive(Default)]
struct ManualScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl ManualScheduler {
    fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Fire job `index` the way the production scheduler would: skipped if
    /// it was cancelled in the meantime.
    fn fire(&self, index: usize) {
        let job = {
            let mut jobs = self.jobs.lock().unwrap();
            let scheduled = &mut jobs[index];
            if scheduled.handle.is_cancelled() {
                None
            } else {
                scheduled.job.take()
            }
        };
        if let Some(job) = job {
            job();
        }
    }

    /// Fire job `index` even if cancelled, simulating a firing that slipped
    /// past the cancel check before the flag was set.
    fn fire_ignoring_cancel(&self, index: usize) {
        let job = self.jobs.lock().unwrap()[index].job.take();
        if let Some(job) = job {
            job();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let handle = TimerHandle::new();
        self.jobs.lock().unwrap().push(ScheduledJob {
            job: Some(job),
            handle: handle.clone(),
        });
        handle
    }
}

fn unique_temp_path(label: &str, extension: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "keyfind-timer-{label}-{}-{unique}{extension}",
        std::process::id()
    ))
}

fn unlocked_vault(label: &str, timeout_secs: u64) -> (Vault, Arc<ManualScheduler>, Vec<PathBuf>) {
    use std::os::unix::fs::PermissionsExt;

    let cli = unique_temp_path(label, ".sh");
    std::fs::write(&cli, FAKE_CLI).expect("should write fake cli script");
    std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o755))
        .expect("should mark fake cli executable");

    let db = unique_temp_path(label, ".kdbx");
    std::fs::write(&db, b"fixture").expect("should write database fixture");

    let scheduler = Arc::new(ManualScheduler::default());
    let mut vault = Vault::with_cli(
        cli.to_string_lossy().into_owned(),
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
    );
    vault.initialize(&db, timeout_secs).unwrap();
    assert!(vault.verify_and_unlock("anything").unwrap());

    (vault, scheduler, vec![cli, db])
}

fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

#[test]
fn rearming_replaces_the_pending_wipe() {
    let (vault, scheduler, paths) = unlocked_vault("rearm", 60);
    assert_eq!(scheduler.job_count(), 1);

    // Activity re-arms: the first pending wipe is cancelled, not stacked.
    vault.search("github").unwrap();
    assert_eq!(scheduler.job_count(), 2);

    scheduler.fire(0);
    assert!(!vault.is_locked());

    scheduler.fire(1);
    let locked = vault.is_locked();
    cleanup(&paths);
    assert!(locked);
}

#[test]
fn stale_firing_cannot_wipe_a_refreshed_secret() {
    let (vault, scheduler, paths) = unlocked_vault("stale-fire", 60);
    vault.search("github").unwrap();

    // Even a firing that slipped past the cancel check must not wipe: its
    // generation no longer matches the one armed by the re-arm.
    scheduler.fire_ignoring_cancel(0);
    let locked = vault.is_locked();
    cleanup(&paths);
    assert!(!locked);
}

#[test]
fn repeated_rearming_yields_exactly_one_effective_wipe() {
    let (vault, scheduler, paths) = unlocked_vault("many-rearms", 60);
    for _ in 0..4 {
        vault.search("github").unwrap();
    }
    assert_eq!(scheduler.job_count(), 5);

    for index in 0..4 {
        scheduler.fire(index);
        assert!(!vault.is_locked());
    }

    scheduler.fire(4);
    let locked = vault.is_locked();
    cleanup(&paths);
    assert!(locked);
}

#[test]
fn zero_timeout_never_arms_the_timer() {
    let (vault, scheduler, paths) = unlocked_vault("zero-timeout", 0);
    vault.search("github").unwrap();
    let count = scheduler.job_count();
    cleanup(&paths);

    assert_eq!(count, 0);
    assert!(!vault.is_locked());
}

#[test]
fn explicit_lock_invalidates_a_pending_firing() {
    let (vault, scheduler, paths) = unlocked_vault("explicit-lock", 60);
    vault.lock();
    assert!(vault.is_locked());

    // Unlock again, then deliver the pre-lock firing: it must be stale.
    assert!(vault.verify_and_unlock("anything").unwrap());
    scheduler.fire_ignoring_cancel(0);
    let locked = vault.is_locked();
    cleanup(&paths);
    assert!(!locked);
}
