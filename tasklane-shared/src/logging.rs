/// Log sanitizing
///
/// User-supplied strings (emails, list names, paths, client messages) are run
/// through [`sanitize`] before they reach a log field, so a crafted value
/// cannot forge extra log lines or inject terminal escape sequences.

/// Longest sanitized value kept in a log field
pub const MAX_LOG_VALUE_LEN: usize = 256;

/// Strips control characters (CR, LF, ESC, NUL, ...) and truncates
///
/// # Example
///
/// ```
/// use tasklane_shared::logging::sanitize;
///
/// assert_eq!(sanitize("alice@example.com\r\nFAKE ENTRY"), "alice@example.comFAKE ENTRY");
/// assert_eq!(sanitize("\u{1b}[31mred"), "[31mred");
/// ```
pub fn sanitize(value: &str) -> String {
    let mut out: String = value
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_LOG_VALUE_LEN)
        .collect();

    if value.chars().filter(|c| !c.is_control()).nth(MAX_LOG_VALUE_LEN).is_some() {
        out.push_str("...");
    }
    out
}
