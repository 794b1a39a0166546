use couchsync_types::{Clock, ManualClock, SystemClock, UnixTimestamp};

// ── UnixTimestamp ────────────────────────────────────────────────

#[test]
fn now_is_after_epoch() {
    assert!(UnixTimestamp::now().as_secs() > 0);
}

#[test]
fn ordering_follows_seconds() {
    assert!(UnixTimestamp::from_secs(10) < UnixTimestamp::from_secs(11));
}

#[test]
fn serializes_as_plain_integer() {
    let json = serde_json::to_string(&UnixTimestamp::from_secs(1_700_000_000)).unwrap();
    assert_eq!(json, "1700000000");
}

// ── Clocks ───────────────────────────────────────────────────────

#[test]
fn system_clock_tracks_wall_time() {
    let before = UnixTimestamp::now();
    let observed = SystemClock.now();
    assert!(observed >= before);
}

#[test]
fn manual_clock_is_pinned() {
    let clock = ManualClock::new(UnixTimestamp::from_secs(100));
    assert_eq!(clock.now(), UnixTimestamp::from_secs(100));
    assert_eq!(clock.now(), UnixTimestamp::from_secs(100));
}

#[test]
fn manual_clock_advance_and_set() {
    let clock = ManualClock::new(UnixTimestamp::from_secs(100));
    clock.advance(5);
    assert_eq!(clock.now().as_secs(), 105);
    clock.set(UnixTimestamp::from_secs(7));
    assert_eq!(clock.now().as_secs(), 7);
}

#[test]
fn clock_usable_as_trait_object() {
    let clock: Box<dyn Clock> = Box::new(ManualClock::new(UnixTimestamp::from_secs(1)));
    assert_eq!(clock.now().as_secs(), 1);
}
