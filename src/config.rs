use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use serde::Deserialize;
use serde::de::{self, Deserializer, SeqAccess, Visitor};

/// Interval used whenever the requested one is missing, non-numeric or not positive.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 5;

pub const DEFAULT_EXTENSIONS: &str = ".jpg,.jpeg,.png,.gif,.bmp,.webp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// Every advance picks a uniformly random image.
    #[default]
    Random,
    /// Images are visited in sorted path order, wrapping at both ends.
    Ordered,
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            Self::Ordered => "ordered",
        })
    }
}

/// Case-insensitive allow-list of file extensions, stored lowercase with a leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    exts: Vec<String>,
}

impl ExtensionFilter {
    /// Parse a comma separated list such as `".jpg, PNG,.webp"`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::from_entries(text.split(','))
    }

    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Self {
        let mut exts: Vec<String> = Vec::new();
        for raw in entries {
            let trimmed = raw.trim().trim_start_matches('.');
            if trimmed.is_empty() {
                continue;
            }
            let ext = format!(".{}", trimmed.to_ascii_lowercase());
            if !exts.contains(&ext) {
                exts.push(ext);
            }
        }
        Self { exts }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.exts
    }

    /// Return `true` if `path` carries one of the allowed extensions.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.exts.iter().any(|e| e[1..] == ext)
            })
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::parse(DEFAULT_EXTENSIONS)
    }
}

impl fmt::Display for ExtensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.exts.join(","))
    }
}

impl<'de> Deserialize<'de> for ExtensionFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ExtsVisitor;

        impl<'de> Visitor<'de> for ExtsVisitor {
            type Value = ExtensionFilter;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a comma separated string or a list of extensions")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(ExtensionFilter::parse(value))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(entry) = seq.next_element::<String>()? {
                    entries.push(entry);
                }
                Ok(ExtensionFilter::from_entries(entries.iter().map(String::as_str)))
            }
        }

        deserializer.deserialize_any(ExtsVisitor)
    }
}

/// Outcome of interpreting user supplied interval text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSetting {
    pub seconds: u64,
    /// Informational message when the input had to be replaced by the default.
    pub notice: Option<String>,
}

/// Interpret interval text; anything that is not a positive integer becomes
/// [`DEFAULT_INTERVAL_SECONDS`] with a notice.
#[must_use]
pub fn coerce_interval(text: &str) -> IntervalSetting {
    match text.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => IntervalSetting {
            seconds,
            notice: None,
        },
        _ => IntervalSetting {
            seconds: DEFAULT_INTERVAL_SECONDS,
            notice: Some(format!(
                "interval {text:?} is not a positive number of seconds; using {DEFAULT_INTERVAL_SECONDS}"
            )),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Folder to play; playback cannot start until one is selected.
    pub folder: Option<PathBuf>,
    /// Seconds between automatic advances while running.
    pub interval_seconds: u64,
    /// Traversal order.
    pub play_mode: PlayMode,
    /// Whether the scan descends into subdirectories.
    pub recursive: bool,
    /// Extensions treated as images.
    pub extensions: ExtensionFilter,
    /// Prune files deleted behind our back while a folder is loaded.
    pub watch_removals: bool,
    /// Size of the main redraw surface.
    pub surface: SurfaceSize,
    /// Optional deterministic seed for random traversal.
    pub rng_seed: Option<u64>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    ///
    /// The interval is never rejected; it is coerced to the default instead.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.surface.width > 0 && self.surface.height > 0,
            "surface width and height must be greater than zero"
        );
        ensure!(
            !self.extensions.is_empty(),
            "extensions must name at least one file type"
        );
        if self.interval_seconds == 0 {
            tracing::info!(
                default = DEFAULT_INTERVAL_SECONDS,
                "interval-seconds must be positive; using default"
            );
            self.interval_seconds = DEFAULT_INTERVAL_SECONDS;
        }
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            folder: None,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            play_mode: PlayMode::default(),
            recursive: true,
            extensions: ExtensionFilter::default(),
            watch_removals: true,
            surface: SurfaceSize::default(),
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_normalises_entries() {
        let filter = ExtensionFilter::parse(" .JPG, png,,.jpg , .WebP");
        assert_eq!(filter.as_slice(), &[".jpg", ".png", ".webp"]);
        assert!(filter.matches(Path::new("/a/b/photo.JpG")));
        assert!(filter.matches(Path::new("x.webp")));
        assert!(!filter.matches(Path::new("notes.txt")));
        assert!(!filter.matches(Path::new("jpg")));
    }

    #[test]
    fn interval_text_is_coerced() {
        assert_eq!(
            coerce_interval("12"),
            IntervalSetting {
                seconds: 12,
                notice: None
            }
        );
        for bad in ["-3", "abc", "0", ""] {
            let setting = coerce_interval(bad);
            assert_eq!(setting.seconds, DEFAULT_INTERVAL_SECONDS, "input {bad:?}");
            assert!(setting.notice.is_some(), "input {bad:?}");
        }
    }
}
