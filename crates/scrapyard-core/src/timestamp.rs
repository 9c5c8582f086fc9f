use jiff::Zoned;

/// Returns the current local date formatted as `MM/DD/YYYY`, the format every
/// extracted row is suffixed with.
pub fn timestamp() -> String {
    let now = Zoned::now();
    format!("{:02}/{:02}/{:04}", now.month(), now.day(), now.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_mm_dd_yyyy_shape() {
        let stamp = timestamp();
        let parts: Vec<&str> = stamp.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 4);
    }
}
