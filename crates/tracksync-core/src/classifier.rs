//! Derives the tag label of a ticket from its issue type and parent.

/// Issue type whose tag comes from its parent epic.
pub const STORY_TYPE: &str = "Story";

/// Issue types whose tag differs from the type name.
const TYPE_TAGS: &[(&str, &str)] = &[("Bug", "Fix")];

/// Compute the tag for an issue.
///
/// Stories are tagged `Feat - <parent title>`, or left untagged (empty
/// string) when they have no parent. Every other type maps through the fixed
/// table and falls back to the type name itself.
pub fn classify(issue_type: &str, parent_title: Option<&str>) -> String {
    if issue_type == STORY_TYPE {
        return match parent_title {
            Some(title) => format!("Feat - {title}"),
            None => String::new(),
        };
    }
    TYPE_TAGS
        .iter()
        .find(|(ty, _)| *ty == issue_type)
        .map(|(_, tag)| (*tag).to_string())
        .unwrap_or_else(|| issue_type.to_string())
}
