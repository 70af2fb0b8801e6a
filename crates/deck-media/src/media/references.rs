//! Media references embedded in card text.
//!
//! Two forms are recognised, case-insensitively:
//! - audio: `[sound:clip.mp3]`
//! - image: `<img src="picture.png">` (quotes optional, any other attributes)

use regex::Regex;
use std::sync::LazyLock;

static SOUND_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[sound:([^\]]+)\]").unwrap());

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']?([^"'>]+)["']?[^>]?>"#).unwrap()
});

/// Rules in application order. Audio is always tried before images.
fn rules() -> [&'static Regex; 2] {
    [&SOUND_TAG, &IMG_TAG]
}

/// Collect the referenced filenames in `text`.
///
/// All audio references come first (left to right), followed by all image
/// references. Duplicates are kept; callers count occurrences.
pub fn extract_references(text: &str) -> Vec<String> {
    rules()
        .into_iter()
        .flat_map(|rule| {
            rule.captures_iter(text)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        })
        .collect()
}

/// Remove every media reference from `text`, leaving other text untouched.
///
/// Removal is repeated until nothing matches, so fragments that join into a
/// new reference once the inner one is cut out are removed as well.
pub fn strip_references(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut changed = false;
        for rule in rules() {
            if rule.is_match(&current) {
                current = rule.replace_all(&current, "").into_owned();
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}
