//! Fixed-capacity display names.

use arrayvec::ArrayString;

/// Display name used for songs, patterns, channels and instruments.
pub type Name = ArrayString<32>;

/// Build a [`Name`] from `s`, dropping whole characters that do not fit.
///
/// `ArrayString::try_push_str` rejects the whole string on overflow, which
/// would blank out long titles instead of shortening them.
pub fn truncated(s: &str) -> Name {
    let mut name = Name::new();
    for ch in s.chars() {
        if name.try_push(ch).is_err() {
            break;
        }
    }
    name
}
