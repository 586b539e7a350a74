//! Identifier and timestamp helpers shared by messages, attachments and snippets.

use chrono::Utc;

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a short random identifier (16 hex characters).
///
/// Falls back to a timestamp-derived value if the OS entropy source is
/// unavailable, which keeps identifiers unique within a process in practice.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 8];
    match getrandom::fill(&mut bytes) {
        Ok(()) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        Err(_) => {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            format!("{nanos:016x}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let ids: HashSet<String> = (0..64).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 64);
        for id in ids {
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
