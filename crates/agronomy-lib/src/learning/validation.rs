//! Plausibility checks for packets entering the learning buffer
//!
//! Inference runs on whatever the caller sends; only training data is held to
//! these ranges, so a faulty sensor cannot poison the next retrain.

use crate::error::ValidationError;
use crate::models::SensorPacket;

/// Accepted range per field, inclusive
pub const SOIL_MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);
pub const TEMPERATURE_RANGE: (f64, f64) = (10.0, 45.0);
pub const HUMIDITY_RANGE: (f64, f64) = (20.0, 95.0);
pub const WIND_SPEED_RANGE: (f64, f64) = (0.0, 40.0);
pub const EC_SALINITY_RANGE: (f64, f64) = (0.1, 5.0);
pub const SOIL_PH_RANGE: (f64, f64) = (4.0, 9.0);

/// A packet with every field present and inside its plausible range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedPacket {
    pub soil_moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub ec_salinity: f64,
    pub soil_ph: f64,
}

fn check(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn required(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

pub fn validate_packet(packet: &SensorPacket) -> Result<ValidatedPacket, ValidationError> {
    Ok(ValidatedPacket {
        soil_moisture: check("soil_moisture", packet.soil_moisture, SOIL_MOISTURE_RANGE)?,
        temperature: check("temperature", packet.temperature, TEMPERATURE_RANGE)?,
        humidity: check("humidity", packet.humidity, HUMIDITY_RANGE)?,
        wind_speed: check(
            "wind_speed",
            required("wind_speed", packet.wind_speed)?,
            WIND_SPEED_RANGE,
        )?,
        ec_salinity: check(
            "ec_salinity",
            required("ec_salinity", packet.ec_salinity)?,
            EC_SALINITY_RANGE,
        )?,
        soil_ph: check("soil_ph", required("soil_ph", packet.soil_ph)?, SOIL_PH_RANGE)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_packet() -> SensorPacket {
        SensorPacket::new(45.0, 25.0, 60.0)
            .with_wind(10.0)
            .with_soil(1.2, 6.5)
    }

    #[test]
    fn test_valid_packet_passes() {
        let v = validate_packet(&good_packet()).unwrap();
        assert_eq!(v.soil_ph, 6.5);
        assert_eq!(v.wind_speed, 10.0);
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut p = good_packet();
        p.soil_ph = None;
        assert_eq!(
            validate_packet(&p),
            Err(ValidationError::MissingField("soil_ph"))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut p = good_packet();
        p.temperature = 46.0;
        assert!(matches!(
            validate_packet(&p),
            Err(ValidationError::OutOfRange { field: "temperature", .. })
        ));

        let mut p = good_packet();
        p.ec_salinity = Some(0.05);
        assert!(matches!(
            validate_packet(&p),
            Err(ValidationError::OutOfRange { field: "ec_salinity", .. })
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let mut p = good_packet();
        p.humidity = f64::NAN;
        assert_eq!(
            validate_packet(&p),
            Err(ValidationError::NonFinite { field: "humidity" })
        );

        let mut p = good_packet();
        p.wind_speed = Some(f64::INFINITY);
        assert_eq!(
            validate_packet(&p),
            Err(ValidationError::NonFinite { field: "wind_speed" })
        );
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let p = SensorPacket::new(0.0, 10.0, 95.0)
            .with_wind(40.0)
            .with_soil(5.0, 4.0);
        assert!(validate_packet(&p).is_ok());
    }
}
