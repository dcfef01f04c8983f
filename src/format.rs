/// Format a millisecond count as `M:SS`
///
/// `None` and zero both render as `0:00`.
pub fn format_millis(ms: Option<u64>) -> String {
    let ms = ms.unwrap_or(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;

    format!("{}:{:02}", minutes, seconds)
}
