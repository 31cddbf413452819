// ai
//! 🔢 Versions — `major.minor`, compared like numbers, not like strings.
//!
//! "0.10" > "0.9". Say it with me. "0.10" > "0.9". Lexicographic sorting has
//! ended more release trains than merge conflicts ever did.
//!
//! 🧠 Knowledge graph:
//! - `Version`: `(major, minor)`, derives `Ord` field-wise, which IS numeric ordering.
//! - `VersionId`: a numeric `Version` or a scratch `test.{n}` container. Test versions
//!   live in the same catalog but never take part in "which one is the latest".
//! - Container naming (`{benchmark}.{major}.{minor}`, `.overview`, `.test.{n}`) lives here
//!   so nobody else gets to invent a fourth spelling.
//! - `validate_benchmark_name`: the one gate every benchmark name passes through.

use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// 📇 Name of the global registry container: one marker per benchmark.
pub const REGISTRY_CONTAINER: &str = "benchmarks";

const TEST_PREFIX: &str = "test.";

/// 🔢 A published snapshot number. Immutable once its container exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// ⏭️ The next minor version: `0.1` → `0.2`. Majors are bumped by humans, on purpose.
    /// `InvalidVersion` when the minor is already `u32::MAX`.
    pub fn next_minor(&self) -> StoreResult<Self> {
        let minor = self
            .minor
            .checked_add(1)
            .ok_or_else(|| StoreError::InvalidVersion(format!("{self} has no next minor")))?;
        Ok(Self::new(self.major, minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        let invalid = || StoreError::InvalidVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self::new(parse_number(major).ok_or_else(invalid)?, parse_number(minor).ok_or_else(invalid)?))
    }
}

/// 🏷️ Anything the overview manifest can hold a marker for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionId {
    Numeric(Version),
    Test(u32),
}

impl VersionId {
    /// 🔍 Classifies a marker or container suffix. `None` for anything that is neither
    /// `{major}.{minor}` nor `test.{n}` (like `overview`, or whatever Kevin uploaded).
    pub fn parse(s: &str) -> Option<Self> {
        match s.strip_prefix(TEST_PREFIX) {
            Some(n) => parse_number(n).map(Self::Test),
            None => s.parse().ok().map(Self::Numeric),
        }
    }

    pub fn as_numeric(&self) -> Option<Version> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Test(_) => None,
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => v.fmt(f),
            Self::Test(n) => write!(f, "{TEST_PREFIX}{n}"),
        }
    }
}

impl From<Version> for VersionId {
    fn from(v: Version) -> Self {
        Self::Numeric(v)
    }
}

// -- 🔢 digits only: no signs, no whitespace, no "1e3" shenanigans
fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// -- 🪣 buckets cap at 63 chars, and `{name}.overview` has to fit
const MAX_BENCHMARK_NAME_LEN: usize = 63 - ".overview".len();

/// 🚪 Benchmark names end up inside bucket names, so they play by bucket rules:
/// lowercase ASCII letters, digits and `-`, starting and ending with a letter or digit,
/// short enough that `{name}.overview` is still a legal bucket. No dots — dots are ours.
pub fn validate_benchmark_name(name: &str) -> StoreResult<()> {
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = name.as_bytes();
    let ok = name.len() <= MAX_BENCHMARK_NAME_LEN
        && bytes.first().is_some_and(alnum)
        && bytes.last().is_some_and(alnum)
        && bytes.iter().all(|b| alnum(b) || *b == b'-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// 🪣 `{benchmark}.{id}` — the one true spelling of a version container.
pub fn version_container(benchmark: &str, id: impl Into<VersionId>) -> String {
    format!("{benchmark}.{}", id.into())
}

pub fn overview_container(benchmark: &str) -> String {
    format!("{benchmark}.overview")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_zero_point_ten_beats_zero_point_nine() {
        let mut the_lineup: Vec<Version> = ["0.10", "0.9", "1.0", "0.1"]
            .iter()
            .map(|s| s.parse().expect("💀 valid versions refused to parse"))
            .collect();
        the_lineup.sort();

        let the_order: Vec<String> = the_lineup.iter().map(ToString::to_string).collect();
        assert_eq!(the_order, vec!["0.1", "0.9", "0.10", "1.0"]);
    }

    #[test]
    fn the_one_where_impostor_versions_get_bounced() {
        for the_impostor in ["", "1", "1.", ".1", "1.2.3", "a.b", "-1.0", "1.+2", " 1.2"] {
            assert!(
                the_impostor.parse::<Version>().is_err(),
                "'{the_impostor}' should not parse as a version"
            );
        }
    }

    #[test]
    fn the_one_where_markers_get_sorted_into_their_houses() {
        assert_eq!(VersionId::parse("0.1"), Some(VersionId::Numeric(Version::new(0, 1))));
        assert_eq!(VersionId::parse("test.1"), Some(VersionId::Test(1)));
        assert_eq!(VersionId::parse("test.x"), None);
        assert_eq!(VersionId::parse("overview"), None);
        assert_eq!(VersionId::Test(3).to_string(), "test.3");
    }

    #[test]
    fn the_one_where_containers_are_spelled_one_way_only() {
        assert_eq!(version_container("bm", Version::new(0, 2)), "bm.0.2");
        assert_eq!(version_container("bm", VersionId::Test(1)), "bm.test.1");
        assert_eq!(overview_container("bm"), "bm.overview");
        assert_eq!(Version::new(1, 4).next_minor().expect("💀 1.4 has a successor"), Version::new(1, 5));
    }

    #[test]
    fn the_one_where_the_last_minor_has_nowhere_to_go() {
        let the_ceiling: Version = "0.4294967295".parse().expect("💀 u32::MAX is still a number");
        assert!(matches!(the_ceiling.next_minor(), Err(StoreError::InvalidVersion(_))));
    }

    #[test]
    fn the_one_where_benchmark_names_follow_bucket_rules() {
        assert!(validate_benchmark_name("my-bench-2").is_ok());
        assert!(validate_benchmark_name(&"b".repeat(54)).is_ok());
        let the_longcat = "b".repeat(55);
        for the_rulebreaker in [
            "", "Bench", "bench.v1", "bench/1", "bénch", "my_bench", "-bm", "bm-", the_longcat.as_str(),
        ] {
            assert!(matches!(
                validate_benchmark_name(the_rulebreaker),
                Err(StoreError::InvalidName(_))
            ));
        }
    }
}
