// src/utils/html.rs

/// Sanitizes student- or faculty-supplied free text before it is stored.
///
/// Activity details and review notes are rendered on the faculty dashboard,
/// so anything that looks like markup goes through ammonia's whitelist:
/// `<script>` and event-handler attributes are stripped, plain text passes
/// through (with `&`, `<`, `>` entity-escaped).
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input.trim())
}
