//! Integration tests for `resolv-failover`.
//!
//! Every test works on a resolver file in a tempdir and drives the loop with
//! a scripted probe, so no network access or root is needed.

use resolv_failover::{
    ConfigLines, ConfigRotator, CycleOutcome, HealthCheckLoop, HealthProbe, Line, ProbeFailure,
    ProbeOutcome, ResolverConfig, RotationResult, read_nameservers, rotate_left,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

/// Answers per nameserver: a primary listed in `down` always fails.
/// Queued outcomes, if any, take precedence.
#[derive(Default)]
struct FakeDns {
    down: Vec<String>,
    queued: RefCell<VecDeque<ProbeOutcome>>,
    primaries: RefCell<Vec<String>>,
}

impl FakeDns {
    fn with_down(down: &[&str]) -> Self {
        Self {
            down: down.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    fn with_script(script: impl IntoIterator<Item = ProbeOutcome>) -> Self {
        Self {
            queued: RefCell::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    fn primaries(&self) -> Vec<String> {
        self.primaries.borrow().clone()
    }
}

impl HealthProbe for FakeDns {
    async fn probe(&self, _dns_name: &str, nameservers: &[String]) -> ProbeOutcome {
        let Some(primary) = nameservers.first() else {
            return ProbeOutcome::Failure(ProbeFailure::NoNameservers);
        };
        self.primaries.borrow_mut().push(primary.clone());
        if let Some(outcome) = self.queued.borrow_mut().pop_front() {
            return outcome;
        }
        if self.down.contains(primary) {
            ProbeOutcome::Failure(ProbeFailure::Query("connection refused".into()))
        } else {
            ProbeOutcome::Success
        }
    }
}

const ORIGINAL: &str = "\
# Generated by dhclient
search corp.example.test
nameserver 10.0.0.1
options timeout:1 attempts:2

nameserver 10.0.0.2
nameserver 10.0.0.3
";

fn write_conf(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("resolv.conf");
    std::fs::write(&path, content).unwrap();
    path
}

fn config(path: &Path) -> ResolverConfig {
    ResolverConfig::new(path, ["example.test"])
        .with_health_check_interval(Duration::from_secs(60))
        .with_retry_interval(Duration::from_secs(3))
}

fn backups(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("resolv.conf.save."))
        })
        .collect();
    found.sort();
    found
}

fn others(content: &str) -> Vec<String> {
    ConfigLines::parse(content)
        .lines()
        .iter()
        .filter(|l| !l.is_nameserver())
        .map(|l| l.raw().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Failover scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_primary_is_rotated_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let dns = FakeDns::with_down(&["10.0.0.1"]);
    let (_tx, rx) = watch::channel(false);

    let outcome = HealthCheckLoop::new(config(&path), &dns, rx).run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Rewritten(RotationResult::Rotated { .. })
    ));

    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        read_nameservers(&path).unwrap(),
        vec!["10.0.0.2", "10.0.0.3", "10.0.0.1"]
    );
    assert_eq!(others(&rewritten), others(ORIGINAL));

    let saved = backups(dir.path());
    assert_eq!(saved.len(), 1);
    let stamp = saved[0]
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("resolv.conf.save."))
        .unwrap();
    assert_eq!(stamp.len(), 14);
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(std::fs::read_to_string(&saved[0]).unwrap(), ORIGINAL);
    assert!(!dir.path().join("resolv.conf.pre").exists());

    assert_eq!(dns.primaries(), vec!["10.0.0.1", "10.0.0.1"]);
}

#[tokio::test(start_paused = true)]
async fn healthy_primary_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
    let dns = FakeDns::default();
    let (_tx, rx) = watch::channel(false);

    let outcome = HealthCheckLoop::new(config(&path), &dns, rx).run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Healthy);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), ORIGINAL);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    assert!(backups(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_without_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let dns = FakeDns::with_script([ProbeOutcome::Failure(ProbeFailure::EmptyAnswer)]);
    let (_tx, rx) = watch::channel(false);

    let outcome = HealthCheckLoop::new(config(&path), &dns, rx).run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Recovered);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), ORIGINAL);
    assert!(backups(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn retry_disabled_still_probes_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let dns = FakeDns::with_down(&["10.0.0.1"]);
    let (_tx, rx) = watch::channel(false);
    let config = config(&path).with_retry_interval(Duration::ZERO);

    let outcome = HealthCheckLoop::new(config, &dns, rx).run_cycle().await;
    assert_eq!(dns.primaries().len(), 2);
    assert!(matches!(
        outcome,
        CycleOutcome::Rewritten(RotationResult::Rotated { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_nameserver_list_takes_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), "search corp.example.test\n");
    let dns = FakeDns::default();
    let (_tx, rx) = watch::channel(false);

    let outcome = HealthCheckLoop::new(config(&path), &dns, rx).run_cycle().await;
    assert_eq!(outcome, CycleOutcome::NoNameservers);
    assert!(dns.primaries().is_empty());
    assert!(backups(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn loop_walks_through_dead_nameservers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let dns = FakeDns::with_down(&["10.0.0.1", "10.0.0.2"]);
    let (tx, rx) = watch::channel(false);

    // Cycles at t = 0 and t = 63 rotate; the one at t = 126 is healthy.
    let stop = async {
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
    };
    tokio::join!(HealthCheckLoop::new(config(&path), &dns, rx).run(), stop);

    assert_eq!(
        read_nameservers(&path).unwrap(),
        vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"]
    );
    assert_eq!(
        dns.primaries(),
        vec!["10.0.0.1", "10.0.0.1", "10.0.0.2", "10.0.0.2", "10.0.0.3"]
    );
}

// ---------------------------------------------------------------------------
// Rotation properties
// ---------------------------------------------------------------------------

#[test]
fn n_rotations_restore_the_original_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), ORIGINAL);
    let rotator = ConfigRotator::new(&path);

    let base = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    for i in 0..3 {
        let result = rotator
            .rotate_at(base + chrono::Duration::seconds(i))
            .unwrap();
        assert!(matches!(result, RotationResult::Rotated { .. }));
    }

    assert_eq!(std::fs::read_to_string(&path).unwrap(), ORIGINAL);
    assert_eq!(backups(dir.path()).len(), 3);
}

#[test]
fn rotate_left_cycles() {
    let list: Vec<String> = ["a", "b", "c", "d"].iter().map(ToString::to_string).collect();
    let once = rotate_left(&list);
    assert_eq!(once[0], list[1]);
    assert_eq!(once[3], list[0]);
    let back = (1..list.len()).fold(once, |acc, _| rotate_left(&acc));
    assert_eq!(back, list);
}

#[test]
fn commented_nameservers_are_preserved() {
    let content = "# nameserver 192.0.2.1\nnameserver 10.0.0.1 # office\nnameserver 10.0.0.2\n";
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(dir.path(), content);

    ConfigRotator::new(&path).rotate().unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "# nameserver 192.0.2.1\nnameserver 10.0.0.2\nnameserver 10.0.0.1\n"
    );
    assert!(matches!(
        ConfigLines::parse(content).lines()[0],
        Line::Other(_)
    ));
}
