use super::*;

#[test]
fn first_event_is_admitted() {
    let mut throttle = CursorThrottle::default();
    assert!(throttle.admit(Instant::now()));
}

#[test]
fn events_inside_interval_are_dropped() {
    let mut throttle = CursorThrottle::default();
    let start = Instant::now();
    assert!(throttle.admit(start));
    assert!(!throttle.admit(start + Duration::from_millis(10)));
    assert!(!throttle.admit(start + Duration::from_millis(49)));
    assert!(throttle.admit(start + Duration::from_millis(50)));
}

#[test]
fn dropped_events_do_not_extend_the_window() {
    let mut throttle = CursorThrottle::new(Duration::from_millis(50));
    let start = Instant::now();
    assert!(throttle.admit(start));
    assert!(!throttle.admit(start + Duration::from_millis(40)));
    // Measured from the last admitted event, not the last dropped one.
    assert!(throttle.admit(start + Duration::from_millis(60)));
}

#[test]
fn reset_admits_immediately() {
    let mut throttle = CursorThrottle::default();
    let start = Instant::now();
    assert!(throttle.admit(start));
    throttle.reset();
    assert!(throttle.admit(start + Duration::from_millis(1)));
}
