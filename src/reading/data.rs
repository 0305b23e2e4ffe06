//! Reading snapshot and its JSON wire form.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A temperature/humidity sample at a point in time.
///
/// The default value is the "never captured" reading: zero temperature and
/// humidity with no capture timestamp. Readings are replaced as a whole and
/// never modified in place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    temperature: f32,
    humidity: f32,
    captured_at: Option<DateTime<Utc>>,
}

impl Reading {
    /// Create a reading captured at `captured_at`.
    pub fn new(temperature: f32, humidity: f32, captured_at: DateTime<Utc>) -> Self {
        Self {
            temperature,
            humidity,
            captured_at: Some(captured_at),
        }
    }

    /// Temperature in degrees Celsius.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Relative humidity in percent.
    pub fn humidity(&self) -> f32 {
        self.humidity
    }

    /// When the sample was taken, or `None` if no sample was ever taken.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Whether this reading holds real sensor data.
    pub fn is_captured(&self) -> bool {
        self.captured_at.is_some()
    }

    /// Age of the reading relative to `now`, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.captured_at
            .map(|at| (now - at).max(Duration::zero()))
    }

    /// Whether the reading is older than `threshold`. A never-captured
    /// reading is not considered stale; it is "waiting".
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        let Some(age) = self.age(now) else {
            return false;
        };
        match Duration::from_std(threshold) {
            Ok(threshold) => age > threshold,
            Err(_) => false,
        }
    }
}

/// JSON document served on `GET /api` and consumed by remote fetchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiReading {
    /// Temperature in degrees Celsius
    #[serde(rename = "Temperature")]
    pub temperature: f32,
    /// Relative humidity in percent
    #[serde(rename = "Humidity")]
    pub humidity: f32,
    /// Address of the serving host's configured interface
    #[serde(rename = "IP", default)]
    pub ip: String,
    /// Capture time of the reading; the zero time when never captured
    #[serde(rename = "LastSensorUpdate", default, with = "zero_time")]
    pub last_sensor_update: Option<DateTime<Utc>>,
}

impl ApiReading {
    /// Build the wire form of `reading` as served from a host reachable at `ip`.
    pub fn from_reading(reading: &Reading, ip: impl Into<String>) -> Self {
        Self {
            temperature: reading.temperature,
            humidity: reading.humidity,
            ip: ip.into(),
            last_sensor_update: reading.captured_at,
        }
    }
}

impl From<&ApiReading> for Reading {
    fn from(api: &ApiReading) -> Self {
        Self {
            temperature: api.temperature,
            humidity: api.humidity,
            captured_at: api.last_sensor_update,
        }
    }
}

impl From<ApiReading> for Reading {
    fn from(api: ApiReading) -> Self {
        Reading::from(&api)
    }
}

/// RFC 3339 timestamps where `0001-01-01T00:00:00Z` stands for "never".
mod zero_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

    // Unix timestamp of 0001-01-01T00:00:00Z.
    const ZERO_TIME_UNIX: i64 = -62_135_596_800;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_str(ZERO_TIME),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        let at = parsed.with_timezone(&Utc);
        if at.timestamp() == ZERO_TIME_UNIX && at.timestamp_subsec_nanos() == 0 {
            Ok(None)
        } else {
            Ok(Some(at))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_reading_is_uncaptured() {
        let reading = Reading::default();
        assert_eq!(reading.temperature(), 0.0);
        assert_eq!(reading.humidity(), 0.0);
        assert!(reading.captured_at().is_none());
        assert!(!reading.is_captured());
        assert!(reading.age(Utc::now()).is_none());
    }

    #[test]
    fn test_staleness() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let reading = Reading::new(21.5, 40.0, at);
        let threshold = std::time::Duration::from_secs(180);

        assert!(!reading.is_stale(at + Duration::seconds(180), threshold));
        assert!(reading.is_stale(at + Duration::seconds(181), threshold));
        assert!(!Reading::default().is_stale(at, threshold));
    }

    #[test]
    fn test_age_is_clamped_for_future_captures() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let reading = Reading::new(21.5, 40.0, at);
        assert_eq!(reading.age(at - Duration::seconds(5)), Some(Duration::zero()));
    }

    #[test]
    fn test_uncaptured_reading_uses_zero_time_on_the_wire() {
        let api = ApiReading::from_reading(&Reading::default(), "");
        let json = serde_json::to_string(&api).unwrap();
        assert!(json.contains(r#""LastSensorUpdate":"0001-01-01T00:00:00Z""#));

        let decoded: ApiReading = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.last_sensor_update, None);
    }

    #[test]
    fn test_decode_peer_document_without_ip() {
        let json = r#"{"Temperature":18.2,"Humidity":55.0,"LastSensorUpdate":"2024-01-01T00:00:00Z"}"#;
        let api: ApiReading = serde_json::from_str(json).unwrap();
        let reading = Reading::from(api);

        assert_eq!(reading.temperature(), 18.2);
        assert_eq!(reading.humidity(), 55.0);
        assert_eq!(
            reading.captured_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_offset_timestamp() {
        let json = r#"{"Temperature":1,"Humidity":2,"IP":"10.0.0.2/24","LastSensorUpdate":"2024-01-01T02:00:00+02:00"}"#;
        let api: ApiReading = serde_json::from_str(json).unwrap();
        assert_eq!(api.ip, "10.0.0.2/24");
        assert_eq!(
            api.last_sensor_update,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_rejects_garbage_timestamp() {
        let json = r#"{"Temperature":1,"Humidity":2,"LastSensorUpdate":"yesterday"}"#;
        assert!(serde_json::from_str::<ApiReading>(json).is_err());
    }
}
