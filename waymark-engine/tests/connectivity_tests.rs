use waymark_engine::ConnectivityMonitor;

#[test]
fn starts_with_the_given_state() {
    assert!(!ConnectivityMonitor::new(false).is_online());
    assert!(ConnectivityMonitor::new(true).is_online());
}

#[test]
fn default_is_offline() {
    assert!(!ConnectivityMonitor::default().is_online());
}

#[test]
fn set_online_reports_transitions() {
    let monitor = ConnectivityMonitor::new(false);
    assert!(monitor.set_online(true), "offline→online is a transition");
    assert!(!monitor.set_online(true), "online→online is not");
    assert!(monitor.set_online(false), "online→offline is a transition");
    assert!(!monitor.set_online(false));
}

#[tokio::test]
async fn subscribers_are_notified_only_on_edges() {
    let monitor = ConnectivityMonitor::new(false);
    let mut rx = monitor.watch();

    // Duplicate reports of the current state wake nobody.
    monitor.set_online(false);
    assert!(!rx.has_changed().unwrap());

    monitor.set_online(true);
    rx.changed().await.unwrap();
    assert!(*rx.borrow_and_update());

    // A second identical report leaves the receiver quiet.
    monitor.set_online(true);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn clones_share_state() {
    let monitor = ConnectivityMonitor::new(false);
    let clone = monitor.clone();

    monitor.set_online(true);
    assert!(clone.is_online());
}
