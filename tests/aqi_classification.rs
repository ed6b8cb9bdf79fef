use aqmon::aqi::{aqi_category, calculate_aqi};

#[test]
fn fixture_concentrations_map_to_expected_categories() {
    assert_eq!(aqi_category(10.0).category, "Good");
    assert_eq!(
        aqi_category(40.0).category,
        "Unhealthy for Sensitive Groups"
    );
    assert_eq!(aqi_category(500.0).category, "Hazardous");
}

#[test]
fn negative_reading_clamps_to_zero_aqi() {
    assert_eq!(calculate_aqi(-5.0), 0);
}

#[test]
fn interpolation_at_tier_boundaries() {
    // Top of the first tier and bottom of the second both sit at AQI 50.
    assert_eq!(calculate_aqi(12.0), 50);
    assert_eq!(calculate_aqi(12.1), 50);

    // Midpoint of the first tier interpolates linearly.
    assert_eq!(calculate_aqi(6.0), 25);
}

#[test]
fn categories_carry_display_colors() {
    assert_eq!(aqi_category(10.0).color, "#4ade80");
    assert_eq!(aqi_category(300.0).color, "#ef4444");
}
