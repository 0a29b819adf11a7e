//! SQL helpers: embedding blob encoding and parameter lists.

use chrono::NaiveDate;

/// Date format used for the `registration_date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encodes an embedding as little-endian `f32` bytes.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decodes a little-endian `f32` blob.
///
/// Returns `None` for empty blobs and blobs whose length is not a multiple
/// of four.
#[must_use]
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .filter_map(|chunk| chunk.try_into().ok().map(f32::from_le_bytes))
            .collect(),
    )
}

/// Builds `?{start},?{start+1},...` for an `IN (...)` list of `count` values.
#[must_use]
pub fn numbered_placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Formats a date for storage.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a stored date. Unparseable values are treated as unknown.
#[must_use]
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| tracing::debug!(value = raw, error = %e, "Ignoring unparseable date"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_layout() {
        let bytes = encode_embedding(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes), Some(vec![1.0, -2.5]));
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        assert_eq!(decode_embedding(&[]), None);
        assert_eq!(decode_embedding(&[0, 0, 128]), None);
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(numbered_placeholders(1, 3), "?1,?2,?3");
        assert_eq!(numbered_placeholders(4, 1), "?4");
        assert_eq!(numbered_placeholders(1, 0), "");
    }

    #[test]
    fn test_dates() {
        let date = NaiveDate::from_ymd_opt(2019, 11, 5).unwrap();
        assert_eq!(format_date(date), "2019-11-05");
        assert_eq!(parse_date(Some("2019-11-05")), Some(date));
        assert_eq!(parse_date(Some("05/11/2019")), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }
}
