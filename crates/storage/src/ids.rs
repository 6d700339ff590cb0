use rand::distributions::Alphanumeric;
use rand::Rng;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::StorageError;

const ID_LEN: usize = 20;

/// A new 20-character alphanumeric document ID.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// The current UTC time as a fixed-width timestamp
/// (`YYYY-MM-DDTHH:MM:SS.ffffffZ`).
///
/// Fixed width keeps string order equal to time order, which the
/// created-at ordering of owner queries relies on.
pub fn now_timestamp() -> Result<String, StorageError> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");
    OffsetDateTime::now_utc()
        .format(&format)
        .map_err(|e| StorageError::Backend(format!("timestamp format: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_twenty_alphanumerics() {
        let id = generate_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let ts = now_timestamp().unwrap();
        assert_eq!(ts.len(), "2025-01-01T00:00:00.000000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }
}
