//! The observation comments side channel.
//!
//! The common name of a species is not a Camtrap column. It travels in the
//! observation `comments` field as a leading `[COMMONNAME:<name>]` tag, and
//! any text after the closing bracket belongs to the user.

pub const COMMON_NAME_TAG: &str = "[COMMONNAME:";

/// Returns the tagged common name. The tag must open the comment.
#[must_use]
pub fn common_name(comments: &str) -> Option<&str> {
    let rest = comments.strip_prefix(COMMON_NAME_TAG)?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}

/// Returns `comments` with its common-name tag set to `name`.
///
/// An existing tag is replaced; the text after it is kept as-is. Without a tag
/// the new one is prepended to the untouched comment.
#[must_use]
pub fn with_common_name(comments: &str, name: &str) -> String {
    let tail = match comments.strip_prefix(COMMON_NAME_TAG).and_then(|r| r.find(']').map(|i| &r[i + 1..])) {
        Some(after) => after,
        None => comments,
    };
    format!("{COMMON_NAME_TAG}{name}]{tail}")
}
