// AI
//! 📊 progress.rs — "Are we there yet?" — every copy, every download, forever.
//!
//! 🚀 A progress bar for the two slow things this crate does: carrying objects from one
//! version into the next, and pulling a version down to disk. One tick per object, bytes
//! in the message, because "file 3 of 4, 1.0KiB so far" beats silence.
//!
//! ⚠️ Watching this progress bar will not make it go faster. We've tried. Science says no.
//! indicatif already stays quiet when stderr isn't a terminal, so CI logs stay clean.

use indicatif::{ProgressBar, ProgressStyle};

const UNITS: [&str; 7] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

/// 📦 Bytes, scaled for humans: `"    0B"`, `" 1023B"`, `"1.0KiB"`, … `"1.0YiB"`.
/// Takes a `u128` because a yobibyte doesn't fit in a `u64`. Neither does my optimism.
pub fn human_size(bytes: u128) -> String {
    if bytes < 1024 {
        return format!("{bytes:>5}B");
    }
    let mut scaled = bytes as f64 / 1024.0;
    for unit in UNITS {
        if scaled < 1024.0 {
            return format!("{scaled:.1}{unit}B");
        }
        scaled /= 1024.0;
    }
    format!("{scaled:.1}YiB")
}

/// 📊 One bar per transfer: object count as the position, running byte total as the message.
pub struct TransferProgress {
    label: String,
    bytes: u64,
    bar: ProgressBar,
}

impl std::fmt::Debug for TransferProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar keeps its Debug to itself
        f.debug_struct("TransferProgress")
            .field("label", &self.label)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl TransferProgress {
    pub fn new(label: impl Into<String>, total_objects: u64) -> Self {
        let bar = ProgressBar::new(total_objects);
        // -- 🎨 the template is a literal; if indicatif rejects it we keep the default style
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        let label = label.into();
        bar.set_prefix(label.clone());
        Self { label, bytes: 0, bar }
    }

    /// 🙈 Same bookkeeping, nothing drawn.
    pub fn hidden(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bytes: 0,
            bar: ProgressBar::hidden(),
        }
    }

    /// ➕ One more object done, `bytes` heavier.
    pub fn advance(&mut self, bytes: u64) {
        self.bytes += bytes;
        self.bar.inc(1);
        self.bar.set_message(human_size(self.bytes.into()));
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn objects(&self) -> u64 {
        self.bar.position()
    }

    /// ✅ Ring the bell. We made it.
    pub fn finish(&self) {
        self.bar
            .finish_with_message(format!("{} done, {}", self.label, human_size(self.bytes.into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_unit_gets_its_moment() {
        assert_eq!(human_size(0), "    0B");
        assert_eq!(human_size(1), "    1B");
        assert_eq!(human_size(1023), " 1023B");
        let the_units = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
        for (the_power, the_unit) in the_units.iter().enumerate() {
            assert_eq!(human_size(1024u128.pow(the_power as u32 + 1)), format!("1.0{the_unit}"));
        }
        assert_eq!(human_size(1536), "1.5KiB");
    }

    #[test]
    fn the_one_where_the_bar_counts_objects_and_bytes() {
        let mut the_bar = TransferProgress::hidden("copy bm.0.1 → bm.0.2");
        the_bar.advance(4);
        the_bar.advance(6);
        the_bar.finish();
        assert_eq!(the_bar.objects(), 2);
        assert_eq!(the_bar.bytes(), 10);
    }
}
