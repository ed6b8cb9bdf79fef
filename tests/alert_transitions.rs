use chrono::Utc;
use aqmon::alerts::HealthTracker;
use aqmon::aqi::{aqi_category, calculate_aqi};
use aqmon::state::Location;
use aqmon::SensorSnapshot;

fn snapshot(id: &str, name: &str, pm25: f64) -> SensorSnapshot {
    SensorSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        location: Location { lat: 0.0, lng: 0.0 },
        pm25,
        temperature: 21.0,
        humidity: 45.0,
        pressure: 1012.0,
        last_updated: Utc::now(),
        aqi: calculate_aqi(pm25),
        aqi_category: aqi_category(pm25),
    }
}

#[test]
fn only_previously_safe_sensors_alert() {
    let mut tracker = HealthTracker::new();

    // Cycle 1: A and B are safe; the safe-set becomes {A, B}.
    let alerts = tracker.observe(&[snapshot("a", "Alpha", 5.0), snapshot("b", "Beta", 8.0)]);
    assert!(alerts.is_empty(), "first cycle can never alert");

    // Cycle 2: A flips unhealthy, B stays safe, C is brand-new and
    // unhealthy. Exactly A fires: C was never previously safe.
    let alerts = tracker.observe(&[
        snapshot("a", "Alpha", 80.0),
        snapshot("b", "Beta", 8.0),
        snapshot("c", "Gamma", 80.0),
    ]);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].name, "Alpha");
    assert_eq!(alerts[0].category, "Unhealthy");
    assert_eq!(alerts[0].aqi, calculate_aqi(80.0));
}

#[test]
fn repeat_unhealthy_does_not_realert_until_recovery() {
    let mut tracker = HealthTracker::new();
    tracker.observe(&[snapshot("a", "Alpha", 5.0)]);

    let alerts = tracker.observe(&[snapshot("a", "Alpha", 80.0)]);
    assert_eq!(alerts.len(), 1);

    // Still unhealthy: silent.
    let alerts = tracker.observe(&[snapshot("a", "Alpha", 90.0)]);
    assert!(alerts.is_empty());

    // Recovery then a second flip alerts again.
    tracker.observe(&[snapshot("a", "Alpha", 5.0)]);
    let alerts = tracker.observe(&[snapshot("a", "Alpha", 80.0)]);
    assert_eq!(alerts.len(), 1);
}

#[test]
fn safe_set_is_replaced_even_when_nothing_fires() {
    let mut tracker = HealthTracker::new();

    // Cycle 1: A safe. Cycle 2: A absent, D safe. Cycle 3: A returns
    // unhealthy — it was not in the previous cycle's safe-set, so no
    // alert.
    tracker.observe(&[snapshot("a", "Alpha", 5.0)]);
    tracker.observe(&[snapshot("d", "Delta", 5.0)]);
    let alerts = tracker.observe(&[snapshot("a", "Alpha", 80.0), snapshot("d", "Delta", 5.0)]);
    assert!(alerts.is_empty());
}
