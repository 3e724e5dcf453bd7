// src/version.rs

//! Package version ordering
//!
//! Versions are compared the way RPM-family tools compare them: an optional
//! numeric `epoch:` prefix first, then runs of digits by numeric value and
//! everything else byte by byte.

use std::cmp::Ordering;

/// Compare two version strings, epoch aware.
///
/// A version without an epoch has epoch 0. Runs of digits compare by value
/// (`1.2 < 1.10`), other characters compare by byte, and a version that is a
/// strict prefix of the other is the lesser one (`1.0 < 1.0-2`).
pub fn versioncmp(a: &str, b: &str) -> Ordering {
    compare(a.as_bytes(), b.as_bytes())
}

fn compare(s1: &[u8], s2: &[u8]) -> Ordering {
    let (mut n1, mut p1) = split_number(s1);
    let (mut n2, mut p2) = split_number(s2);

    // When only one side carries an epoch the other side's epoch is 0 and
    // its leading number belongs to the version proper.
    match (p1.first() == Some(&b':'), p2.first() == Some(&b':')) {
        (false, true) => {
            n1 = b"";
            p1 = s1;
            p2 = &p2[1..];
        }
        (true, false) => {
            p1 = &p1[1..];
            n2 = b"";
            p2 = s2;
        }
        _ => {}
    }

    let order = compare_numeric(n1, n2);
    if order != Ordering::Equal {
        return order;
    }

    while let (Some(&c1), Some(&c2)) = (p1.first(), p2.first()) {
        if c1 != c2 {
            return c1.cmp(&c2);
        }
        p1 = &p1[1..];
        p2 = &p2[1..];

        let digit1 = p1.first().is_some_and(u8::is_ascii_digit);
        let digit2 = p2.first().is_some_and(u8::is_ascii_digit);
        if digit1 && digit2 {
            return compare(p1, p2);
        }
    }

    p1.first().unwrap_or(&0).cmp(p2.first().unwrap_or(&0))
}

/// Split off the leading run of ASCII digits
fn split_number(s: &[u8]) -> (&[u8], &[u8]) {
    let len = s.iter().take_while(|c| c.is_ascii_digit()).count();
    s.split_at(len)
}

/// Compare two digit runs by value, without overflowing on long runs.
/// An empty run counts as zero.
fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = trim_zeros(a);
    let b = trim_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|&&c| c == b'0').count();
    &digits[zeros..]
}

/// Format an `epoch:version-release` string.
///
/// An empty or `0` epoch and an empty release are left out. Without a
/// version the result is empty.
pub fn build_evr(epoch: Option<&str>, version: &str, release: Option<&str>) -> String {
    if version.is_empty() {
        return String::new();
    }

    let mut evr = String::new();
    if let Some(epoch) = epoch.filter(|e| !e.is_empty() && *e != "0") {
        evr.push_str(epoch);
        evr.push(':');
    }
    evr.push_str(version);
    if let Some(release) = release.filter(|r| !r.is_empty()) {
        evr.push('-');
        evr.push_str(release);
    }

    evr
}

#[cfg(test)]
mod tests {
    use super::*;
    use Ordering::{Equal, Greater, Less};

    #[test]
    fn test_numeric_runs_compare_by_value() {
        assert_eq!(versioncmp("1.2", "1.10"), Less);
        assert_eq!(versioncmp("1.10", "1.2"), Greater);
        assert_eq!(versioncmp("1.010", "1.10"), Equal);
        assert_eq!(versioncmp("2.0", "10.0"), Less);
    }

    #[test]
    fn test_prefix_is_less() {
        assert_eq!(versioncmp("1.0", "1.0-2"), Less);
        assert_eq!(versioncmp("1.0-2", "1.0"), Greater);
        assert_eq!(versioncmp("", "1"), Less);
    }

    #[test]
    fn test_epochs() {
        assert_eq!(versioncmp("2:1.0", "1:5.0"), Greater);
        assert_eq!(versioncmp("1:1.0", "5.0"), Greater);
        assert_eq!(versioncmp("5.0", "1:1.0"), Less);
        assert_eq!(versioncmp("0:1.0", "1.0"), Equal);
        assert_eq!(versioncmp("1:2.0", "1:2.0"), Equal);
        assert_eq!(versioncmp("1:2.0", "1:2.1"), Less);
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(versioncmp("1.0", "1.0"), Equal);
        assert_eq!(versioncmp("", ""), Equal);
        assert_eq!(versioncmp("1.0-1.fc9", "1.0-1.fc9"), Equal);
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        assert_eq!(
            versioncmp("1.99999999999999999999999", "1.100000000000000000000000"),
            Less
        );
    }

    #[test]
    fn test_antisymmetric() {
        let versions = [
            "", "0", "1", "1.0", "1.0-1", "1.0a", "1.1", "1.10", "2:0.1", "1:1.0", "10", "a",
            "1.0.0",
        ];
        for a in versions {
            assert_eq!(versioncmp(a, a), Equal, "{} vs itself", a);
            for b in versions {
                assert_eq!(
                    versioncmp(a, b),
                    versioncmp(b, a).reverse(),
                    "{} vs {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_ascending_chain() {
        let chain = [
            "", "1", "1.0", "1.0-1", "1.0-2", "1.1", "1.2", "1.10", "10", "1:1.0", "2:0.1",
        ];
        for (i, a) in chain.iter().enumerate() {
            for b in &chain[i + 1..] {
                assert_eq!(versioncmp(a, b), Less, "{} < {}", a, b);
            }
        }
    }

    #[test]
    fn test_build_evr() {
        assert_eq!(build_evr(Some("1"), "2.0", Some("3")), "1:2.0-3");
        assert_eq!(build_evr(Some("0"), "2.0", Some("3")), "2.0-3");
        assert_eq!(build_evr(None, "2.0", None), "2.0");
        assert_eq!(build_evr(Some(""), "2.0", Some("")), "2.0");
        assert_eq!(build_evr(Some("4"), "", Some("1")), "");
    }
}
