/// Cap on how many individual file errors get printed to the console; the
/// full count is still tracked, just not spelled out past this many lines.
pub const MAX_ERROR_DISPLAY: usize = 10;

pub fn truncate_for_display(messages: &[String]) -> (Vec<&String>, usize) {
    if messages.len() <= MAX_ERROR_DISPLAY {
        (messages.iter().collect(), 0)
    } else {
        (messages[..MAX_ERROR_DISPLAY].iter().collect(), messages.len() - MAX_ERROR_DISPLAY)
    }
}
