//! Ticket reference extraction and linking.
//!
//! A ticket reference is two or more uppercase letters, a hyphen, and one or
//! more digits (`PROJ-42`). Only the first reference in a piece of text is
//! recognized.

use std::sync::LazyLock;

use regex::Regex;

static TICKET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,}-\d+").expect("valid ticket pattern"));

/// Return the first ticket reference found in `text`.
pub fn extract_ticket(text: &str) -> Option<String> {
    TICKET_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// Rewrite the first occurrence of `ticket` in `message` as a Slack link.
///
/// Returns `message` unchanged when no tracker base URL is configured (or it
/// is blank), or when `ticket` does not occur in `message`.
pub fn link_ticket(message: &str, ticket: &str, base_url: Option<&str>) -> String {
    let Some(base) = base_url.map(str::trim).filter(|b| !b.is_empty()) else {
        return message.to_string();
    };
    let base = base.trim_end_matches('/');
    message.replacen(ticket, &format!("<{base}/browse/{ticket}|{ticket}>"), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_ticket() {
        assert_eq!(
            extract_ticket("Fixes PROJ-99 and OPS-7 crash"),
            Some("PROJ-99".to_string())
        );
    }

    #[test]
    fn single_letter_prefix_is_not_a_ticket() {
        assert_eq!(extract_ticket("see A-12 for details"), None);
    }

    #[test]
    fn lowercase_is_not_a_ticket() {
        assert_eq!(extract_ticket("proj-12 was closed"), None);
    }

    #[test]
    fn no_ticket_in_plain_text() {
        assert!(extract_ticket("Add retry to uploader").is_none());
    }

    #[test]
    fn links_ticket_when_host_configured() {
        let linked = link_ticket(
            "Fixes PROJ-99 crash",
            "PROJ-99",
            Some("https://acme.atlassian.net"),
        );
        assert_eq!(
            linked,
            "Fixes <https://acme.atlassian.net/browse/PROJ-99|PROJ-99> crash"
        );
    }

    #[test]
    fn trailing_slash_on_host_is_trimmed() {
        let linked = link_ticket("PROJ-1", "PROJ-1", Some("https://jira.example.com/"));
        assert_eq!(linked, "<https://jira.example.com/browse/PROJ-1|PROJ-1>");
    }

    #[test]
    fn passes_through_without_host() {
        assert_eq!(
            link_ticket("Fixes PROJ-99 crash", "PROJ-99", None),
            "Fixes PROJ-99 crash"
        );
        assert_eq!(
            link_ticket("Fixes PROJ-99 crash", "PROJ-99", Some("  ")),
            "Fixes PROJ-99 crash"
        );
    }

    #[test]
    fn only_first_occurrence_is_linked() {
        let linked = link_ticket("AB-1 then AB-1", "AB-1", Some("https://t"));
        assert_eq!(linked, "<https://t/browse/AB-1|AB-1> then AB-1");
    }
}
