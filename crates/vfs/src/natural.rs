//! Natural ("alphanumeric") ordering of names.
//!
//! Runs of ASCII digits compare by numeric value (`track2 < track10`), other
//! characters compare case-insensitively. Names that are equal under that
//! primary key fall back to plain case-sensitive comparison so sorting stays
//! deterministic.

use crate::object::Entry;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two names in natural order with a case-sensitive tiebreak.
///
/// ```
/// use std::cmp::Ordering;
/// use trove_vfs::natural::compare;
///
/// assert_eq!(compare("track2", "track10"), Ordering::Less);
/// assert_eq!(compare("Track", "track"), Ordering::Less);
/// ```
pub fn compare(lh: &str, rh: &str) -> Ordering {
    compare_primary(lh, rh).then_with(|| lh.cmp(rh))
}

/// Primary key only: numeric runs by value, everything else case-insensitive.
pub fn compare_primary(lh: &str, rh: &str) -> Ordering {
    let mut left = lh.chars().peekable();
    let mut right = rh.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = compare_numbers(&mut left, &mut right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            },
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            },
        }
    }
}

/// Order entries by name.
pub fn compare_entries(lh: &Entry, rh: &Entry) -> Ordering {
    compare(&lh.name(), &rh.name())
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(left: &mut Peekable<Chars<'_>>, right: &mut Peekable<Chars<'_>>) -> Ordering {
    let l = take_digits(left);
    let r = take_digits(right);
    let l_trimmed = l.trim_start_matches('0');
    let r_trimmed = r.trim_start_matches('0');
    // Longer (significant) run is the bigger number; no overflow on huge runs.
    l_trimmed
        .len()
        .cmp(&r_trimmed.len())
        .then_with(|| l_trimmed.cmp(r_trimmed))
        // "01" sorts after "1" so distinct names never compare equal here.
        .then_with(|| l.len().cmp(&r.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("track2", "track10", Ordering::Less)]
    #[case("track10", "track2", Ordering::Greater)]
    #[case("a", "B", Ordering::Less)]
    #[case("Track", "track", Ordering::Less)]
    #[case("track", "Track", Ordering::Greater)]
    #[case("same", "same", Ordering::Equal)]
    #[case("file1", "file01", Ordering::Less)]
    #[case("x99999999999999999999999", "x100000000000000000000000", Ordering::Less)]
    #[case("abc", "abcd", Ordering::Less)]
    #[case("1.mod", "a.mod", Ordering::Less)]
    fn test_compare(#[case] lh: &str, #[case] rh: &str, #[case] expected: Ordering) {
        assert_eq!(compare(lh, rh), expected);
    }

    #[test]
    fn test_primary_key_is_case_insensitive() {
        assert_eq!(compare_primary("Track", "track"), Ordering::Equal);
        assert_eq!(compare_primary("TRACK10", "track2"), Ordering::Greater);
    }

    #[test]
    fn test_sort_is_stable_across_runs() {
        let mut first = vec!["track", "Track10", "track2", "Track", "TRACK2", "a"];
        let mut second = first.clone();
        second.reverse();
        first.sort_by(|l, r| compare(l, r));
        second.sort_by(|l, r| compare(l, r));
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "Track", "track", "TRACK2", "track2", "Track10"]);
    }
}
