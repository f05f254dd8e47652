//! Target side-channel polling tests.

use std::time::Duration;

use ball_follower::{target, BallColor, TargetSelector, TargetSpec};

/// Wait for the selector to converge on `expected`, bounded.
fn wait_for(selector: &TargetSelector, expected: TargetSpec) -> bool {
    for _ in 0..100 {
        if selector.current() == expected {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn picks_up_target_changes_from_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target.txt");
    target::write_target_file(&path, TargetSpec::All).unwrap();

    let selector = TargetSelector::spawn(path.clone(), Duration::from_millis(20));
    assert_eq!(selector.current(), TargetSpec::All);

    target::write_target_file(&path, TargetSpec::Only(BallColor::Yellow)).unwrap();
    assert!(wait_for(&selector, TargetSpec::Only(BallColor::Yellow)));

    selector.stop();
}

#[test]
fn unrecognized_tokens_leave_the_prior_target_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target.txt");
    target::write_target_file(&path, TargetSpec::Only(BallColor::Green)).unwrap();

    let selector = TargetSelector::spawn(path.clone(), Duration::from_millis(20));
    assert_eq!(selector.current(), TargetSpec::Only(BallColor::Green));

    std::fs::write(&path, "purple").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(selector.current(), TargetSpec::Only(BallColor::Green));

    // A later valid token still lands.
    target::write_target_file(&path, TargetSpec::All).unwrap();
    assert!(wait_for(&selector, TargetSpec::All));

    selector.stop();
}

#[test]
fn missing_file_defaults_to_all() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.txt");

    let selector = TargetSelector::spawn(path, Duration::from_millis(20));
    assert_eq!(selector.current(), TargetSpec::All);
    selector.stop();
}

#[test]
fn ensure_seeds_the_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target.txt");

    target::ensure_target_file(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "all");

    // Existing content is left alone.
    target::write_target_file(&path, TargetSpec::Only(BallColor::Pink)).unwrap();
    target::ensure_target_file(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "pink");
}
