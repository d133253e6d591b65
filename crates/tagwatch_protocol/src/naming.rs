//! Notification topic naming.

use crate::types::TagAction;

/// Build the topic for one action bucket: `<prefix>.container.tag.<action>`.
///
/// Trailing separators on the configured prefix are trimmed so
/// "org.example." and "org.example" produce the same topic.
pub fn notification_topic(prefix: &str, action: TagAction) -> String {
    format!(
        "{}.container.tag.{}",
        prefix.trim_end_matches('.'),
        action.as_str()
    )
}
