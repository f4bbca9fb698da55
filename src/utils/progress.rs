//! Build progress reporting; silent when the `progress` feature is disabled

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use std::time::Duration;

/// Spinner or bar shown on stderr while a project is built.
///
/// A quiet `Progress` swallows every call, so callers never branch on
/// whether output is wanted.
pub struct Progress {
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Shows nothing
    pub fn quiet() -> Self {
        Progress {
            #[cfg(feature = "progress")]
            bar: None,
        }
    }

    /// Open-ended spinner for phases of unknown length, such as the crawl
    pub fn spinner(silent: bool, message: &'static str) -> Self {
        if silent {
            return Self::quiet();
        }
        #[cfg(feature = "progress")]
        {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(message);
            bar.enable_steady_tick(Duration::from_millis(80));
            Progress { bar: Some(bar) }
        }
        #[cfg(not(feature = "progress"))]
        {
            let _ = message;
            Self::quiet()
        }
    }

    /// Bar counting `len` files
    pub fn files(silent: bool, len: usize, message: &'static str) -> Self {
        if silent {
            return Self::quiet();
        }
        #[cfg(feature = "progress")]
        {
            let bar = ProgressBar::new(len as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓▒░  "),
            );
            bar.set_message(message);
            Progress { bar: Some(bar) }
        }
        #[cfg(not(feature = "progress"))]
        {
            let _ = (len, message);
            Self::quiet()
        }
    }

    pub fn inc(&self) {
        #[cfg(feature = "progress")]
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(self, message: String) {
        #[cfg(feature = "progress")]
        if let Some(bar) = self.bar {
            bar.finish_with_message(message);
        }
        #[cfg(not(feature = "progress"))]
        let _ = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_progress_accepts_updates() {
        let progress = Progress::files(true, 10, "Indexing files...");
        for _ in 0..10 {
            progress.inc();
        }
        progress.finish("done".to_string());

        Progress::spinner(true, "Discovering files...").finish("Found 0 files".to_string());
    }
}
