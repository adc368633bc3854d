/// How far back from the end of a candidate page to look for a break.
pub const BREAK_WINDOW: usize = 200;

const BREAK_CHARS: [char; 11] = ['\n', '。', '！', '？', '；', '，', '.', '!', '?', ';', ' '];

pub fn is_break_char(c: char) -> bool {
    BREAK_CHARS.contains(&c)
}

/// Returns the length to cut `slice` at so that it ends just after the last
/// break character within the trailing `window` chars, or 0 when there is
/// none.
pub fn find_break(slice: &[char], window: usize) -> usize {
    let floor = slice.len().saturating_sub(window);
    (floor..slice.len())
        .rev()
        .find(|&idx| is_break_char(slice[idx]))
        .map_or(0, |idx| idx + 1)
}
