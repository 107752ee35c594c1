//! Single-pass character statistics used to pick an encoder.

/// Per-string scan result. Computed once, consumed by encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringStats {
    pub digit_count: usize,
    pub upper_count: usize,
    /// Every char is an ASCII letter, digit, or one of the two specials.
    pub can_lower_upper_digit_special: bool,
    /// Every char is in the five-bit alphabet.
    pub can_lower_special: bool,
}

impl StringStats {
    pub fn compute(value: &str, specials: [char; 2]) -> Self {
        let mut stats = Self {
            can_lower_upper_digit_special: true,
            can_lower_special: true,
            ..Default::default()
        };

        for c in value.chars() {
            if c.is_ascii_digit() {
                stats.digit_count += 1;
            }
            if c.is_ascii_uppercase() {
                stats.upper_count += 1;
            }
            if stats.can_lower_upper_digit_special
                && !(c.is_ascii_alphanumeric() || specials.contains(&c))
            {
                stats.can_lower_upper_digit_special = false;
            }
            if stats.can_lower_special && !matches!(c, 'a'..='z' | '.' | '_' | '$' | '|') {
                stats.can_lower_special = false;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let stats = StringStats::compute("fooBar_2", ['.', '_']);
        assert_eq!(stats.digit_count, 1);
        assert_eq!(stats.upper_count, 1);
        assert!(stats.can_lower_upper_digit_special);
        assert!(!stats.can_lower_special);

        let stats = StringStats::compute("foo.bar|baz", ['.', '_']);
        assert!(stats.can_lower_special);
        assert!(!stats.can_lower_upper_digit_special);

        let stats = StringStats::compute("naïve", ['.', '_']);
        assert!(!stats.can_lower_special);
        assert!(!stats.can_lower_upper_digit_special);
    }
}
