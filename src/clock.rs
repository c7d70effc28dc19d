//! Timestamps are stored in UTC; "today" and display use a fixed local offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn from_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or(Utc.fix());
        Self { offset }
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// Local calendar date of a stored timestamp string.
    pub fn local_date_of(&self, raw: &str) -> Option<NaiveDate> {
        parse_timestamp(raw).map(|at| self.local_date(at))
    }

    pub fn time_of_day(&self, at: DateTime<Utc>) -> String {
        self.local(at).format("%H:%M:%S").to_string()
    }

    pub fn short_date(&self, at: DateTime<Utc>) -> String {
        self.local(at).format("%d/%m/%Y").to_string()
    }

    pub fn long_date(&self, at: DateTime<Utc>) -> String {
        self.local(at).format("%A %-d %B %Y").to_string()
    }

    /// Timestamp sent by the browser; anything unparseable means "now".
    pub fn client_time(&self, raw: Option<&str>) -> DateTime<Utc> {
        raw.and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }

    /// Admin-typed time. Without an offset it is local wall-clock time.
    pub fn admin_time(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }

        const LOCAL_FORMATS: [&str; 4] = [
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%d %H:%M:%S",
        ];
        LOCAL_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .and_then(|naive| naive.and_local_timezone(self.offset).single())
            .map(|at| at.with_timezone(&Utc))
    }
}

/// Parses a stored timestamp. Values without an offset (the store's
/// `timestamp` columns) are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let minutes = (end - start).num_minutes().abs();
    format!("{} hours {} minutes", minutes / 60, minutes % 60)
}

pub mod ts {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw}")))
    }
}

pub mod ts_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match at {
            Some(at) => serializer.serialize_str(&super::format_timestamp(*at)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw}"))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bangkok() -> LocalClock {
        LocalClock::from_minutes(420)
    }

    #[test]
    fn truncates_to_local_date() {
        let clock = bangkok();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(clock.local_date_of("2024-01-01T23:50:00Z"), Some(date));
        assert_eq!(clock.local_date_of("2024-01-02T00:10:00Z"), Some(date));
        assert_eq!(
            clock.local_date_of("2024-01-02T17:30:00"),
            NaiveDate::from_ymd_opt(2024, 1, 3)
        );
        assert_eq!(clock.local_date_of("not a time"), None);
    }

    #[test]
    fn utc_clock_keeps_utc_dates() {
        let clock = LocalClock::from_minutes(0);
        assert_eq!(
            clock.local_date_of("2024-01-01T23:50:00Z"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn admin_time_is_local_wall_clock() {
        let clock = bangkok();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap();
        assert_eq!(clock.admin_time("2024-03-01T08:30"), Some(expected));
        assert_eq!(clock.admin_time("2024-03-01T01:30:00Z"), Some(expected));
        assert_eq!(clock.admin_time("2024-03-01T08:30:00+07:00"), Some(expected));
        assert_eq!(clock.admin_time("yesterday"), None);
    }

    #[test]
    fn client_time_falls_back_to_now() {
        let clock = bangkok();
        let given = clock.client_time(Some("2024-05-05T02:00:00.000Z"));
        assert_eq!(given, Utc.with_ymd_and_hms(2024, 5, 5, 2, 0, 0).unwrap());

        let before = Utc::now();
        let fallback = clock.client_time(Some("garbage"));
        assert!(fallback >= before);
    }

    #[test]
    fn formats_local_time_and_duration() {
        let clock = bangkok();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 50, 5).unwrap();
        assert_eq!(clock.time_of_day(at), "06:50:05");
        assert_eq!(clock.short_date(at), "02/01/2024");
        assert_eq!(clock.long_date(at), "Tuesday 2 January 2024");

        let end = at + chrono::Duration::minutes(8 * 60 + 15);
        assert_eq!(format_duration(at, end), "8 hours 15 minutes");
        assert_eq!(format_timestamp(at), "2024-01-01T23:50:05.000Z");
    }
}
