//! 📊 progress.rs: "Is it uploaded yet?": asked by every human, every time, forever.
//!
//! Two shapes of waiting live here:
//! - byte bars for multipart transfers, where we know the total and can brag about it
//! - spinners for work requests, where the service knows and we just hope
//!
//! ⚠️ Watching the bar will not make the upload faster. We've tried. Science says no.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 binary units, because the service counts in them and so do pedants
const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// 📦 "2147483648" → "2.00 GiB". Because raw byte counts in an error message are a war crime.
pub fn human_size(bytes: u64) -> String {
    let (unit, label) = match bytes {
        b if b >= TIB => (TIB, "TiB"),
        b if b >= GIB => (GIB, "GiB"),
        b if b >= MIB => (MIB, "MiB"),
        b if b >= KIB => (KIB, "KiB"),
        _ => return format!("{bytes} bytes"),
    };
    format!("{:.2} {label}", bytes as f64 / unit as f64)
}

/// 📊 A byte-counting bar. Cheap to clone; every clone draws on the same bar.
#[derive(Clone)]
pub(crate) struct TransferProgress {
    bar: ProgressBar,
}

impl std::fmt::Debug for TransferProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("TransferProgress")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .finish()
    }
}

impl TransferProgress {
    pub(crate) fn new(label: &str, total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes);
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_message(format!("🚚 {label}"));
        Self { bar }
    }

    pub(crate) fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    pub(crate) fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub(crate) fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

/// 🌀 A spinner that ticks on its own while we poll something slow.
pub(crate) fn spinner(label: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {prefix} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(label.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_two_gibibytes_are_exactly_two_gibibytes() {
        assert_eq!(human_size(2_147_483_648), "2.00 GiB");
        assert_eq!(human_size(1536), "1.50 KiB");
        assert_eq!(human_size(12), "12 bytes");
        assert_eq!(human_size(5 * TIB / 2), "2.50 TiB");
    }

    #[test]
    fn the_one_where_clones_share_one_bar() {
        let progress = TransferProgress::new("test", 100);
        let the_clone = progress.clone();
        progress.advance(30);
        the_clone.advance(20);
        assert_eq!(progress.bar.position(), 50);
        progress.finish("done");
    }
}
