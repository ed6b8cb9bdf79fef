use anyhow::{bail, Result};

/// Metrics the upstream graph-data endpoint can serve.
///
/// The mapping between the names API consumers use and the field names
/// upstream expects is fixed and exhaustive; anything else is a caller
/// error and never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Pm25,
    Pm10,
    Pm4,
    Pm1,
    Temperature,
    Humidity,
    Pressure,
    No2,
    O3,
    So2,
}

impl Field {
    pub fn from_name(name: &str) -> Result<Self> {
        let field = match name {
            "pm2.5" => Field::Pm25,
            "pm10" => Field::Pm10,
            "pm4" => Field::Pm4,
            "pm1" => Field::Pm1,
            "temperature" => Field::Temperature,
            "humidity" => Field::Humidity,
            "pressure" => Field::Pressure,
            "NO2" => Field::No2,
            "O3" => Field::O3,
            "SO2" => Field::So2,
            other => bail!("unknown metric {other:?}"),
        };
        Ok(field)
    }

    /// Field name as the upstream API spells it.
    pub fn upstream_name(self) -> &'static str {
        match self {
            Field::Pm25 => "pm2.5_ug_m3",
            Field::Pm10 => "pm10.0_ug_m3",
            Field::Pm4 => "pm4.0_ug_m3",
            Field::Pm1 => "pm1.0_ug_m3",
            Field::Temperature => "temperature_C",
            Field::Humidity => "humidity_percent",
            Field::Pressure => "pressure_hPa",
            Field::No2 => "NO2_concentration_ppm",
            Field::O3 => "O3_concentration_ppm",
            Field::So2 => "SO2_concentration_ppm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_names_to_upstream_fields() {
        assert_eq!(
            Field::from_name("pm2.5").unwrap().upstream_name(),
            "pm2.5_ug_m3"
        );
        assert_eq!(
            Field::from_name("pressure").unwrap().upstream_name(),
            "pressure_hPa"
        );
        assert_eq!(
            Field::from_name("NO2").unwrap().upstream_name(),
            "NO2_concentration_ppm"
        );
    }

    #[test]
    fn unknown_metric_is_an_error() {
        assert!(Field::from_name("co2").is_err());
        assert!(Field::from_name("PM2.5").is_err());
    }
}
