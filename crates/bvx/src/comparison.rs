// ai
//! 🔍 Comparator — "what changed between 0.1 and 0.2?", answered as a context diff.
//!
//! Each version becomes a list of `name:last_modified:hash` lines, in object-name order,, and the two lists
//! are diffed the classic way: `*** version a` / `--- version b` headers, `***************`
//! between hunks, three lines of context, and `! `, `- `, `+ `, `  ` as line markers.
//! The exact layout people already know from `diff -c`.
//!
//! 🧠 Knowledge graph:
//! - `diff_versions` always reads through the public path, credentials or not. What a
//!   consumer can see is what gets compared.
//! - `diff_versions_with` takes any `ObjectStore`, which is how the tests run it in memory.
//! - The line diff is `similar` (Myers, grouped with `n = 3`); the rendering is ours.
//! - Identical snapshots produce an empty string, not a header with nothing under it.

use similar::{Algorithm, DiffTag, capture_diff_slices, group_diff_ops};
use tracing::debug;

use crate::app_config::StoreConfig;
use crate::backends::{ObjectStore, PublicHttpStore};
use crate::error::StoreResult;
use crate::version::{Version, validate_benchmark_name, version_container};

const CONTEXT_LINES: usize = 3;

/// 🔍 Diffs two versions of `benchmark` as an anonymous reader would see them.
pub async fn diff_versions(
    config: &StoreConfig,
    benchmark: &str,
    version1: Version,
    version2: Version,
) -> StoreResult<String> {
    let store = PublicHttpStore::new(&config.without_credentials())?;
    diff_versions_with(&store, benchmark, version1, version2).await
}

/// 🔍 Same diff, any store.
pub async fn diff_versions_with(
    store: &impl ObjectStore,
    benchmark: &str,
    version1: Version,
    version2: Version,
) -> StoreResult<String> {
    validate_benchmark_name(benchmark)?;
    let old = snapshot_lines(store, &version_container(benchmark, version1)).await?;
    let new = snapshot_lines(store, &version_container(benchmark, version2)).await?;
    debug!(
        "🔍 diffing {} line(s) of {} against {} line(s) of {}",
        old.len(),
        version1,
        new.len(),
        version2
    );
    Ok(context_diff(
        &old,
        &new,
        &format!("version {version1}"),
        &format!("version {version2}"),
    ))
}

// -- 📐 ordered by object name; sorting the rendered lines would put `a2:…` before `a:…`
async fn snapshot_lines(store: &impl ObjectStore, container: &str) -> StoreResult<Vec<String>> {
    let mut records = store.list_objects(container, true).await?;
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records.iter().map(|record| record.diff_line()).collect())
}

/// 📐 `start..stop` (0-based) as a context-diff range: 1-based, `a,b`, or a lone line number.
fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length <= 1 {
        beginning.to_string()
    } else {
        format!("{},{}", beginning, beginning + length - 1)
    }
}

fn marker(tag: DiffTag) -> &'static str {
    match tag {
        DiffTag::Equal => "  ",
        DiffTag::Delete => "- ",
        DiffTag::Insert => "+ ",
        DiffTag::Replace => "! ",
    }
}

/// 🧾 Classic context diff of two line lists. Empty when they match.
pub fn context_diff(old: &[String], new: &[String], from_label: &str, to_label: &str) -> String {
    if old == new {
        return String::new();
    }
    let groups = group_diff_ops(capture_diff_slices(Algorithm::Myers, old, new), CONTEXT_LINES);
    let mut out = String::new();
    for (index, group) in groups.iter().enumerate() {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        if index == 0 {
            out.push_str(&format!("*** {from_label}\n--- {to_label}\n"));
        }
        out.push_str("***************\n");

        let tags: Vec<DiffTag> = group.iter().map(|op| op.tag()).collect();

        out.push_str(&format!(
            "*** {} ****\n",
            format_range(first.old_range().start, last.old_range().end)
        ));
        if tags.iter().any(|t| matches!(t, DiffTag::Replace | DiffTag::Delete)) {
            for op in group {
                let (tag, old_range, _) = op.as_tag_tuple();
                if tag == DiffTag::Insert {
                    continue;
                }
                for line in &old[old_range] {
                    out.push_str(marker(tag));
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }

        out.push_str(&format!(
            "--- {} ----\n",
            format_range(first.new_range().start, last.new_range().end)
        ));
        if tags.iter().any(|t| matches!(t, DiffTag::Replace | DiffTag::Insert)) {
            for op in group {
                let (tag, _, new_range) = op.as_tag_tuple();
                if tag == DiffTag::Delete {
                    continue;
                }
                for line in &new[new_range] {
                    out.push_str(marker(tag));
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    out
}
