//! Overlapping character-window splitting with break-point snapping.

use super::ChunkingConfig;

/// Split `text` into overlapping pieces of at most `chunk_size` characters.
///
/// Consecutive pieces share exactly `chunk_overlap` characters. Each cut is
/// moved back to the nearest paragraph break, sentence end or whitespace found
/// within `boundary_window` characters of the hard limit, in that order of
/// preference. Without any, the cut lands on the hard limit.
///
/// Lengths are measured in `char`s, so multi-byte text is never split inside a
/// code point.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let size = config.chunk_size;
    let overlap = config.chunk_overlap;

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        if len - start <= size {
            pieces.push(chars[start..].iter().collect());
            break;
        }

        let hard_end = start + size;
        // A cut at or before start + overlap would stop the window from advancing.
        let floor = (start + overlap + 1).max(hard_end.saturating_sub(config.boundary_window));
        let end = find_break(&chars, floor, hard_end).unwrap_or(hard_end);

        pieces.push(chars[start..end].iter().collect());
        start = end - overlap;
    }

    pieces
}

/// Find the best exclusive end position in `floor..=hard_end`.
fn find_break(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    let candidates = || (floor.max(2)..=hard_end).rev();

    candidates()
        .find(|&end| chars[end - 1] == '\n' && chars[end - 2] == '\n')
        .or_else(|| candidates().find(|&end| is_sentence_end(chars, end)))
        .or_else(|| candidates().find(|&end| chars[end - 1].is_whitespace()))
}

fn is_sentence_end(chars: &[char], end: usize) -> bool {
    chars[end - 1] == '\n'
        || (chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize, boundary_window: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
            boundary_window,
        }
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len <= size {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(split_text("", &config(100, 20, 10)).is_empty());
        assert!(split_text("   \n\n ", &config(100, 20, 10)).is_empty());
    }

    #[test]
    fn test_short_text_is_single_piece() {
        let pieces = split_text("A unit test verifies one behavior in isolation.", &config(100, 20, 10));
        assert_eq!(pieces, vec!["A unit test verifies one behavior in isolation.".to_string()]);
    }

    #[test]
    fn test_hard_split_count_and_overlap() {
        // No whitespace anywhere, so every cut is a hard split.
        for (size, overlap) in [(10, 3), (50, 10), (7, 1), (100, 99), (20, 0)] {
            for len in [1, size, size + 1, 3 * size, 10 * size + 7] {
                let text: String = (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
                let pieces = split_text(&text, &config(size, overlap, 5));

                assert_eq!(
                    pieces.len(),
                    expected_count(len, size, overlap),
                    "size={} overlap={} len={}",
                    size,
                    overlap,
                    len
                );

                for piece in &pieces {
                    assert!(piece.chars().count() <= size);
                }

                for pair in pieces.windows(2) {
                    let prev: Vec<char> = pair[0].chars().collect();
                    let next: Vec<char> = pair[1].chars().collect();
                    let tail: String = prev[prev.len() - overlap..].iter().collect();
                    let head: String = next[..overlap].iter().collect();
                    assert_eq!(tail, head);
                }

                let last = pieces.last().unwrap();
                assert!(text.ends_with(last.as_str()));
            }
        }
    }

    #[test]
    fn test_prefers_sentence_break() {
        let text = "First sentence is here. Second sentence follows it and keeps going on.";
        let pieces = split_text(text, &config(40, 5, 20));

        assert_eq!(pieces[0], "First sentence is here. ");
        assert!(pieces.iter().all(|p| p.chars().count() <= 40));
        assert!(pieces[1].starts_with("ere. "));
    }

    #[test]
    fn test_prefers_paragraph_over_sentence() {
        let text = "Intro line. More words\n\nNext paragraph starts here and runs long enough.";
        let pieces = split_text(text, &config(30, 4, 20));
        assert_eq!(pieces[0], "Intro line. More words\n\n");
    }

    #[test]
    fn test_falls_back_to_whitespace() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let pieces = split_text(text, &config(20, 2, 10));
        assert_eq!(pieces[0], "alpha beta gamma ");
        assert!(pieces.iter().all(|p| p.chars().count() <= 20));
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "ærøåæøå".repeat(10);
        let pieces = split_text(&text, &config(16, 4, 4));
        assert!(pieces.iter().all(|p| p.chars().count() <= 16));
        assert_eq!(pieces.len(), expected_count(70, 16, 4));
    }
}
