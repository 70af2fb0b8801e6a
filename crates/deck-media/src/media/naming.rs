//! Filesystem-safe, collision-free media filenames.

use crate::config::MediaConfig;
use crate::error::{MediaError, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Characters that are removed from incoming media names.
const UNSAFE_CHARS: &[char] = &['[', ']', '<', '>', ':', '/', '\\'];

/// Name used when sanitizing leaves nothing behind.
const FALLBACK_NAME: &str = "unnamed";

/// Trailing ` (n)` counter on a filename stem.
static COUNTER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" \((\d+)\)$").unwrap());

/// Remove characters that are unsafe in filenames or clash with the
/// `[sound:...]` reference syntax.
///
/// # Examples
///
/// ```
/// use deck_media::media::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a[1]:b.mp3"), "a1b.mp3");
/// assert_eq!(sanitize_filename("../x\\y.png"), "..xy.png");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}

/// Resolve a catalogued name to a path inside `dir`.
///
/// Only a plain single-component name is accepted. Anything that would
/// leave the media directory (`../x`, `/abs/x`, `sub/x`) yields `None`.
///
/// # Examples
///
/// ```
/// use deck_media::media::media_path;
///
/// assert!(media_path("/media", "clip.mp3").is_some());
/// assert!(media_path("/media", "../clip.mp3").is_none());
/// assert!(media_path("/media", "/etc/passwd").is_none());
/// ```
pub fn media_path(dir: impl AsRef<Path>, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Some(dir.as_ref().join(part)),
        _ => None,
    }
}

/// Split a filename into stem and extension, keeping the dot on the extension.
///
/// Leading dots do not start an extension (`.hidden` has none).
fn split_extension(name: &str) -> (&str, &str) {
    let first_non_dot = name.find(|c| c != '.').unwrap_or(name.len());
    match name.rfind('.') {
        Some(pos) if pos > first_non_dot => name.split_at(pos),
        _ => (name, ""),
    }
}

/// Bump the ` (n)` counter on a stem, or start one at ` (1)`.
fn next_stem(stem: &str) -> String {
    match COUNTER_SUFFIX.captures(stem) {
        Some(caps) => {
            let n: u64 = caps[1].parse().unwrap_or(0);
            COUNTER_SUFFIX
                .replace(stem, format!(" ({})", n.saturating_add(1)))
                .into_owned()
        }
        None => format!("{} (1)", stem),
    }
}

/// Return a sanitized name that does not yet exist under `dir`.
///
/// `photo.jpg` becomes `photo (1).jpg`, then `photo (2).jpg`, and so on. A
/// name that already carries a counter continues from it. Nothing is created
/// on disk, so calling this twice without writing the result yields the same
/// name.
///
/// Gives up with [`MediaError::NameExhausted`] after
/// [`MediaConfig::MAX_UNIQUE_NAME_ATTEMPTS`] candidates.
pub fn unique_filename(dir: impl AsRef<Path>, desired: &str) -> Result<String> {
    let dir = dir.as_ref();
    let mut sanitized = sanitize_filename(desired);
    if sanitized.is_empty() {
        sanitized = FALLBACK_NAME.to_string();
    }

    let (stem, ext) = split_extension(&sanitized);
    let mut stem = stem.to_string();

    for _ in 0..MediaConfig::MAX_UNIQUE_NAME_ATTEMPTS {
        let candidate = format!("{}{}", stem, ext);
        if !dir.join(&candidate).exists() {
            return Ok(candidate);
        }
        stem = next_stem(&stem);
    }

    Err(MediaError::NameExhausted {
        base: sanitized,
        attempts: MediaConfig::MAX_UNIQUE_NAME_ATTEMPTS,
    })
}
