/// Cleans a raw extracted cell value and checks it against the configured
/// sentinel list.
///
/// Strips the value, replaces commas, tabs, newlines, and carriage returns
/// with single spaces (so it survives an unquoted CSV column), then returns
/// `None` if the cleaned value matches any of the configured invalid
/// sentinels -- the caller drops the whole row when any cell is `None`.
pub fn sanitize_cell(data: &str, invalid_output: &[String]) -> Option<String> {
    let cleaned = data
        .trim()
        .replace(',', "")
        .replace('\t', " ")
        .replace('\n', " ")
        .replace('\r', "");
    if invalid_output.iter().any(|s| s == &cleaned) {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_and_replaces_punctuation() {
        let out = sanitize_cell(" a,b\tc\nd\r ", &[]);
        assert_eq!(out.as_deref(), Some("ab c d"));
    }

    #[test]
    fn matches_sentinel_returns_none() {
        let invalid = vec!["N/A".to_string()];
        assert_eq!(sanitize_cell("N/A", &invalid), None);
        assert_eq!(sanitize_cell(" N/A ", &invalid), None);
    }

    #[test]
    fn passthrough_when_clean() {
        assert_eq!(sanitize_cell("hello", &[]).as_deref(), Some("hello"));
    }
}
