use chrono::{DateTime, NaiveDateTime};

/// ext2 stores times as seconds since the epoch, 0 meaning never.
pub(crate) fn seconds_to_date_time(seconds: u32) -> Option<NaiveDateTime> {
    if seconds == 0 {
        None
    } else {
        DateTime::from_timestamp(seconds as i64, 0).map(|dt| dt.naive_utc())
    }
}

/// Trims a NUL padded on-disk string.
pub(crate) fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    bytes.get(..end).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_seconds_to_date_time() {
        assert_eq!(None, seconds_to_date_time(0));
        let expected = NaiveDate::from_ymd_opt(2023, 11, 14)
            .unwrap()
            .and_hms_opt(22, 13, 20)
            .unwrap();
        assert_eq!(Some(expected), seconds_to_date_time(1_700_000_000));
    }

    #[test]
    fn test_trim_nul() {
        assert_eq!(b"root", trim_nul(b"root\0\0\0\0"));
        assert_eq!(b"full", trim_nul(b"full"));
        assert_eq!(b"", trim_nul(b"\0abc"));
    }
}
