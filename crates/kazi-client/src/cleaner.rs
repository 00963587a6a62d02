use std::sync::Arc;

use htmd::HtmlToMarkdown;
use kazi_core::error::AppError;
use kazi_core::traits::Cleaner;

/// Upper bound on the Markdown handed to the listing extractor.
const DEFAULT_MAX_CHARS: usize = 60_000;

/// HTML-to-Markdown cleaner for job board listing pages.
///
/// Drops non-content elements (scripts, navigation, footers, ...), squeezes
/// runs of blank lines and caps the result so a single page stays within the
/// extractor's input budget.
pub struct ListingCleaner {
    converter: Arc<HtmlToMarkdown>,
    max_chars: usize,
}

impl Clone for ListingCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
            max_chars: self.max_chars,
        }
    }
}

impl ListingCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
                "form", "button",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

impl Default for ListingCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for ListingCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let markdown = self
            .converter
            .convert(html)
            .map_err(|e| AppError::CleanerError(e.to_string()))?;

        let mut squeezed = String::with_capacity(markdown.len());
        let mut blank_run = 0;
        for line in markdown.lines() {
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            squeezed.push_str(line.trim_end());
            squeezed.push('\n');
        }

        if let Some((idx, _)) = squeezed.char_indices().nth(self.max_chars) {
            tracing::debug!(
                original = squeezed.chars().count(),
                kept = self.max_chars,
                "Truncating listing page"
            );
            squeezed.truncate(idx);
        }

        Ok(squeezed)
    }
}
