//! Oracle DATE and TIMESTAMP encoding and decoding
//!
//! Oracle DATE format (7 bytes):
//! - Byte 0: Century (value + 100)
//! - Byte 1: Year in century (value + 100)
//! - Byte 2: Month (1-12)
//! - Byte 3: Day (1-31)
//! - Byte 4: Hour + 1 (1-24)
//! - Byte 5: Minute + 1 (1-60)
//! - Byte 6: Second + 1 (1-60)
//!
//! Oracle TIMESTAMP adds (4 more bytes):
//! - Bytes 7-10: Fractional seconds (nanoseconds as big-endian u32)
//!
//! Oracle TIMESTAMP WITH TIME ZONE adds (2 more bytes):
//! - Byte 11: Time zone hour offset + 20
//! - Byte 12: Time zone minute offset + 60
//!
//! [`Timestamp`] is the structured form handed to callers. DATE and TIMESTAMP
//! values can also travel as milliseconds since the Unix epoch, which is how
//! a DATE fetched into a DOUBLE cell is represented.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, SecondsFormat, TimeZone, Timelike, Datelike};

use crate::error::{Error, Result};

/// Length of a DATE image
pub const DATE_LENGTH: usize = 7;
/// Length of a TIMESTAMP image
pub const TIMESTAMP_LENGTH: usize = 11;
/// Length of a TIMESTAMP WITH (LOCAL) TIME ZONE image
pub const TIMESTAMP_TZ_LENGTH: usize = 13;

/// Timezone hour offset constant
const TZ_HOUR_OFFSET: i8 = 20;
/// Timezone minute offset constant
const TZ_MINUTE_OFFSET: i8 = 60;
/// Flag indicating named timezone (not supported)
const HAS_REGION_ID: u8 = 0x80;

/// Structured date/time value with optional time zone offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Year (e.g., 2024, negative for BC)
    pub year: i32,
    /// Month (1-12)
    pub month: u8,
    /// Day (1-31)
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
    /// Fractional seconds in nanoseconds (0-999999999)
    pub nanosecond: u32,
    /// Timezone hour offset (-12 to +14)
    pub tz_hour_offset: i8,
    /// Timezone minute offset (-59 to +59), same sign as the hour offset
    pub tz_minute_offset: i8,
}

impl Timestamp {
    /// Create a new timestamp without timezone
    pub fn new(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8, nanosecond: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            nanosecond,
            tz_hour_offset: 0,
            tz_minute_offset: 0,
        }
    }

    /// Create a date-only value (time set to 00:00:00)
    pub fn date(year: i32, month: u8, day: u8) -> Self {
        Self::new(year, month, day, 0, 0, 0, 0)
    }

    /// Set the time zone offset
    pub fn with_offset(mut self, tz_hour_offset: i8, tz_minute_offset: i8) -> Self {
        self.tz_hour_offset = tz_hour_offset;
        self.tz_minute_offset = tz_minute_offset;
        self
    }

    /// Check if this timestamp has a timezone
    pub fn has_timezone(&self) -> bool {
        self.tz_hour_offset != 0 || self.tz_minute_offset != 0
    }

    /// Offset from UTC in seconds
    pub fn offset_seconds(&self) -> i32 {
        self.tz_hour_offset as i32 * 3600 + self.tz_minute_offset as i32 * 60
    }

    /// Drop fractional seconds and time zone, as a DATE column stores it
    pub fn truncate_to_date(&self) -> Self {
        Self::new(self.year, self.month, self.day, self.hour, self.minute, self.second, 0)
    }

    /// Convert to a chrono date/time carrying the offset
    pub fn to_datetime(&self) -> Result<DateTime<FixedOffset>> {
        let naive = NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
            .and_then(|d| {
                d.and_hms_nano_opt(
                    self.hour as u32,
                    self.minute as u32,
                    self.second as u32,
                    self.nanosecond,
                )
            })
            .ok_or_else(|| Error::InvalidDate(format!("{:?} is not a valid date", self)))?;
        let offset = FixedOffset::east_opt(self.offset_seconds())
            .ok_or_else(|| Error::InvalidDate(format!("invalid offset {}", self.offset_seconds())))?;
        offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| Error::InvalidDate(format!("{:?} is ambiguous", self)))
    }

    /// Build from any chrono date/time, keeping its offset
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let local = dt.naive_local();
        let offset = dt.offset().fix().local_minus_utc();
        Self {
            year: local.year(),
            month: local.month() as u8,
            day: local.day() as u8,
            hour: local.hour() as u8,
            minute: local.minute() as u8,
            second: local.second() as u8,
            nanosecond: local.nanosecond().min(999_999_999),
            tz_hour_offset: (offset / 3600) as i8,
            tz_minute_offset: ((offset % 3600) / 60) as i8,
        }
    }

    /// Parse RFC 3339 text (`2024-03-15T14:30:45+05:30`)
    pub fn parse_rfc3339(text: &str) -> Result<Self> {
        let dt = DateTime::parse_from_rfc3339(text.trim())
            .map_err(|e| Error::InvalidDate(format!("{:?}: {}", text, e)))?;
        Ok(Self::from_datetime(&dt))
    }

    /// Format as RFC 3339 text
    pub fn to_rfc3339(&self) -> Result<String> {
        Ok(self.to_datetime()?.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Milliseconds since the Unix epoch, including the fractional part
    pub fn to_epoch_millis(&self) -> Result<f64> {
        let dt = self.to_datetime()?;
        Ok(dt.timestamp() as f64 * 1000.0 + self.nanosecond as f64 / 1_000_000.0)
    }

    /// Build a UTC timestamp from milliseconds since the Unix epoch
    pub fn from_epoch_millis(millis: f64) -> Result<Self> {
        if !millis.is_finite() {
            return Err(Error::InvalidDate(format!("{} is not a point in time", millis)));
        }
        let secs = (millis / 1000.0).floor();
        let nanos = ((millis - secs * 1000.0) * 1_000_000.0).round().clamp(0.0, 999_999_999.0);
        let dt = DateTime::from_timestamp(secs as i64, nanos as u32)
            .ok_or_else(|| Error::InvalidDate(format!("{} ms is out of range", millis)))?;
        Ok(Self::from_datetime(&dt))
    }

    fn check_ranges(&self) -> Result<()> {
        let valid = (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && self.nanosecond < 1_000_000_000
            && (-4712..=9999).contains(&self.year);
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidDate(format!("{:?} out of range", self)))
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::date(1, 1, 1)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(
                f,
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}",
                self.year, self.month, self.day, self.hour, self.minute, self.second, self.nanosecond
            ),
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(dt: DateTime<Tz>) -> Self {
        Self::from_datetime(&dt)
    }
}

/// Encode the date part of a timestamp as a 7-byte DATE image
pub fn encode_oracle_date(ts: &Timestamp) -> Result<[u8; DATE_LENGTH]> {
    ts.check_ranges()?;
    let century = (ts.year / 100 + 100) as u8;
    let year_in_century = (ts.year % 100 + 100) as u8;
    Ok([
        century,
        year_in_century,
        ts.month,
        ts.day,
        ts.hour + 1,
        ts.minute + 1,
        ts.second + 1,
    ])
}

/// Decode a 7-byte DATE image
pub fn decode_oracle_date(data: &[u8]) -> Result<Timestamp> {
    if data.len() < DATE_LENGTH {
        return Err(Error::InvalidDate(format!(
            "Oracle DATE requires {} bytes, got {}",
            DATE_LENGTH,
            data.len()
        )));
    }

    let century = data[0] as i32 - 100;
    let year_in_century = data[1] as i32 - 100;

    Ok(Timestamp::new(
        century * 100 + year_in_century,
        data[2],
        data[3],
        data[4].saturating_sub(1),
        data[5].saturating_sub(1),
        data[6].saturating_sub(1),
        0,
    ))
}

/// Encode a TIMESTAMP image: 11 bytes, or 13 with the time zone offset
pub fn encode_oracle_timestamp(ts: &Timestamp, include_tz: bool) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(TIMESTAMP_TZ_LENGTH);
    result.extend_from_slice(&encode_oracle_date(ts)?);
    result.extend_from_slice(&ts.nanosecond.to_be_bytes());
    if include_tz {
        result.push((ts.tz_hour_offset + TZ_HOUR_OFFSET) as u8);
        result.push((ts.tz_minute_offset + TZ_MINUTE_OFFSET) as u8);
    }
    Ok(result)
}

/// Decode a DATE (7 bytes), TIMESTAMP (11 bytes) or TIMESTAMP WITH TIME ZONE
/// (13 bytes) image
pub fn decode_oracle_timestamp(data: &[u8]) -> Result<Timestamp> {
    let mut ts = decode_oracle_date(data)?;

    if data.len() >= TIMESTAMP_LENGTH {
        ts.nanosecond = u32::from_be_bytes([data[7], data[8], data[9], data[10]]);
    }

    if data.len() >= TIMESTAMP_TZ_LENGTH && data[11] != 0 && data[12] != 0 {
        if data[11] & HAS_REGION_ID != 0 {
            return Err(Error::InvalidDate(
                "named time zone regions are not supported".to_string(),
            ));
        }
        ts.tz_hour_offset = (data[11] as i8) - TZ_HOUR_OFFSET;
        ts.tz_minute_offset = (data[12] as i8) - TZ_MINUTE_OFFSET;
    }

    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_date() {
        // 2024-03-15 14:30:45
        let data = [120, 124, 3, 15, 15, 31, 46];
        let ts = decode_oracle_date(&data).unwrap();
        assert_eq!(ts, Timestamp::new(2024, 3, 15, 14, 30, 45, 0));
    }

    #[test]
    fn test_negative_year() {
        let data = [99, 100, 1, 1, 1, 1, 1];
        assert_eq!(decode_oracle_date(&data).unwrap().year, -100);

        let ts = Timestamp::date(-150, 6, 1);
        let encoded = encode_oracle_date(&ts).unwrap();
        assert_eq!(decode_oracle_date(&encoded).unwrap().year, -150);
    }

    #[test]
    fn test_timestamp_with_timezone() {
        let ts = Timestamp::new(2024, 3, 15, 14, 30, 45, 123_456_000).with_offset(5, 30);
        let encoded = encode_oracle_timestamp(&ts, true).unwrap();
        assert_eq!(encoded.len(), TIMESTAMP_TZ_LENGTH);
        assert_eq!(&encoded[11..], &[25, 90]);
        assert_eq!(decode_oracle_timestamp(&encoded).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_without_timezone_is_11_bytes() {
        let ts = Timestamp::new(2024, 3, 15, 14, 30, 45, 0);
        let encoded = encode_oracle_timestamp(&ts, false).unwrap();
        assert_eq!(encoded.len(), TIMESTAMP_LENGTH);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        let ts = Timestamp::new(2024, 13, 1, 0, 0, 0, 0);
        assert!(encode_oracle_date(&ts).is_err());
        let ts = Timestamp::new(2024, 1, 1, 24, 0, 0, 0);
        assert!(encode_oracle_timestamp(&ts, false).is_err());
    }

    #[test]
    fn test_rfc3339() {
        let ts = Timestamp::parse_rfc3339("2024-03-15T14:30:45-05:30").unwrap();
        assert_eq!(ts.hour, 14);
        assert_eq!(ts.tz_hour_offset, -5);
        assert_eq!(ts.tz_minute_offset, -30);
        assert_eq!(ts.to_rfc3339().unwrap(), "2024-03-15T14:30:45-05:30");

        let utc = Timestamp::date(2000, 1, 2);
        assert_eq!(utc.to_string(), "2000-01-02T00:00:00Z");

        assert!(Timestamp::parse_rfc3339("15/03/2024").is_err());
    }

    #[test]
    fn test_epoch_millis() {
        let ts = Timestamp::new(1970, 1, 2, 0, 0, 0, 500_000_000);
        assert_eq!(ts.to_epoch_millis().unwrap(), 86_400_500.0);
        assert_eq!(Timestamp::from_epoch_millis(86_400_500.0).unwrap(), ts);

        let shifted = Timestamp::date(1970, 1, 1).with_offset(1, 0);
        assert_eq!(shifted.to_epoch_millis().unwrap(), -3_600_000.0);
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert!(Timestamp::date(2023, 2, 30).to_datetime().is_err());
    }
}
