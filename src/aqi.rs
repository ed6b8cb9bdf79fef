use serde::Serialize;

/// EPA PM2.5 breakpoint tiers. AQI bounds per tier are `index * 50` to
/// `index * 50 + 50`, interpolated linearly within the concentration range.
const AQI_BREAKPOINTS: &[Breakpoint] = &[
    Breakpoint {
        min: 0.0,
        max: 12.0,
        category: "Good",
        color: "#4ade80",
    },
    Breakpoint {
        min: 12.1,
        max: 35.4,
        category: "Moderate",
        color: "#facc15",
    },
    Breakpoint {
        min: 35.5,
        max: 55.4,
        category: "Unhealthy for Sensitive Groups",
        color: "#fb923c",
    },
    Breakpoint {
        min: 55.5,
        max: 150.4,
        category: "Unhealthy",
        color: "#f87171",
    },
    Breakpoint {
        min: 150.5,
        max: 250.4,
        category: "Very Unhealthy",
        color: "#c084fc",
    },
    Breakpoint {
        min: 250.5,
        max: 500.0,
        category: "Hazardous",
        color: "#ef4444",
    },
];

struct Breakpoint {
    min: f64,
    max: f64,
    category: &'static str,
    color: &'static str,
}

/// AQI category attached to each sensor snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AqiCategory {
    pub category: String,
    pub color: String,
}

/// Compute the AQI for a PM2.5 concentration in µg/m³.
///
/// Negative readings clamp to 0; concentrations past the last tier clamp
/// to 500.
pub fn calculate_aqi(pm25: f64) -> i64 {
    if pm25 < 0.0 {
        return 0;
    }

    for (index, breakpoint) in AQI_BREAKPOINTS.iter().enumerate() {
        if pm25 <= breakpoint.max {
            let lower_aqi = (index * 50) as f64;
            let upper_aqi = lower_aqi + 50.0;
            let aqi = ((upper_aqi - lower_aqi) / (breakpoint.max - breakpoint.min))
                * (pm25 - breakpoint.min)
                + lower_aqi;
            return aqi.round() as i64;
        }
    }

    500
}

/// Look up the display category for a PM2.5 concentration.
pub fn aqi_category(pm25: f64) -> AqiCategory {
    for breakpoint in AQI_BREAKPOINTS {
        if pm25 <= breakpoint.max {
            return AqiCategory {
                category: breakpoint.category.to_string(),
                color: breakpoint.color.to_string(),
            };
        }
    }

    AqiCategory {
        category: "Hazardous".to_string(),
        color: "#ef4444".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_concentration_clamps_to_zero() {
        assert_eq!(calculate_aqi(-5.0), 0);
    }

    #[test]
    fn tier_boundary_interpolates_to_fifty() {
        assert_eq!(calculate_aqi(12.0), 50);
        // Start of the second tier lands right at its lower AQI bound.
        assert_eq!(calculate_aqi(12.1), 50);
    }

    #[test]
    fn top_of_table_is_hazardous() {
        assert_eq!(calculate_aqi(500.0), 300);
        assert_eq!(aqi_category(500.0).category, "Hazardous");
        assert_eq!(calculate_aqi(600.0), 500);
    }

    #[test]
    fn category_lookup_matches_tiers() {
        assert_eq!(aqi_category(10.0).category, "Good");
        assert_eq!(aqi_category(40.0).category, "Unhealthy for Sensitive Groups");
        assert_eq!(aqi_category(20.0).category, "Moderate");
        assert_eq!(aqi_category(100.0).category, "Unhealthy");
        assert_eq!(aqi_category(200.0).category, "Very Unhealthy");
    }
}
