//! Length-bounded splitting of group text into overlapping windows.
//!
//! Lengths are counted in characters, not bytes, so Hangul and other
//! multi-byte text is never cut inside a code point.

use super::{Chunk, SegmentGroup, VideoRef};

/// Split a group into chunks of at most `max_len` characters.
///
/// A group that fits is emitted as a single chunk. Every window inherits the
/// group's `start` and `end`. An empty group produces no chunks.
pub fn split(group: &SegmentGroup, video: &VideoRef, max_len: usize, overlap: usize) -> Vec<Chunk> {
    let (Some(start), Some(end)) = (group.start(), group.end()) else {
        return Vec::new();
    };

    split_text(&group.content(), max_len, overlap)
        .into_iter()
        .map(|content| Chunk {
            content,
            channel_id: video.channel_id.clone(),
            video_id: video.video_id.clone(),
            start,
            end,
        })
        .collect()
}

/// Split text into windows of at most `max_len` characters where consecutive
/// windows share exactly `overlap` characters.
///
/// Each window ends at the latest paragraph, line, sentence or word boundary
/// in its second half, falling back to a hard cut at `max_len`.
pub fn split_text(text: &str, max_len: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_len == 0 || chars.len() <= max_len {
        return vec![text.to_string()];
    }
    let overlap = overlap.min(max_len - 1);

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + max_len).min(chars.len());
        if hard_end == chars.len() {
            windows.push(chars[start..hard_end].iter().collect());
            break;
        }

        // Cuts before min_end would either stall (<= start + overlap) or leave
        // a window less than half full.
        let min_end = start + overlap.max(max_len / 2) + 1;
        let end = find_break(&chars, min_end.min(hard_end), hard_end).unwrap_or(hard_end);

        windows.push(chars[start..end].iter().collect());
        start = end - overlap;
    }

    windows
}

/// Latest window end in `[min_end, max_end]` that sits right after a natural
/// boundary, trying coarser boundaries first.
fn find_break(chars: &[char], min_end: usize, max_end: usize) -> Option<usize> {
    let boundaries: [fn(&[char], usize) -> bool; 4] = [
        is_paragraph_break,
        is_line_break,
        is_sentence_break,
        is_word_break,
    ];

    boundaries.iter().find_map(|is_break| {
        (min_end.max(1)..=max_end)
            .rev()
            .find(|&end| is_break(chars, end))
    })
}

fn is_paragraph_break(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 2] == '\n' && chars[end - 1] == '\n'
}

fn is_line_break(chars: &[char], end: usize) -> bool {
    chars[end - 1] == '\n'
}

fn is_sentence_break(chars: &[char], end: usize) -> bool {
    end >= 2 && chars[end - 1].is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?' | '…')
}

fn is_word_break(chars: &[char], end: usize) -> bool {
    chars[end - 1].is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptLine;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    /// Drop the duplicated overlap and glue the windows back together.
    fn reassemble(windows: &[String], overlap: usize) -> String {
        let mut out = windows[0].clone();
        for window in &windows[1..] {
            out.extend(window.chars().skip(overlap));
        }
        out
    }

    fn assert_overlap(windows: &[String], overlap: usize) {
        for pair in windows.windows(2) {
            let tail: String = pair[0].chars().skip(char_len(&pair[0]) - overlap).collect();
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_short_text_is_unchanged() {
        assert_eq!(split_text("짧은 문장", 3000, 300), vec!["짧은 문장".to_string()]);
        assert_eq!(split_text("", 3000, 300), vec![String::new()]);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "a".repeat(25);
        let windows = split_text(&text, 10, 3);

        assert!(windows.iter().all(|w| char_len(w) <= 10));
        assert_eq!(char_len(&windows[0]), 10);
        assert_overlap(&windows, 3);
        assert_eq!(reassemble(&windows, 3), text);
    }

    #[test]
    fn test_prefers_word_boundaries() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let windows = split_text(text, 20, 4);

        assert!(windows.len() > 1);
        assert!(windows[0].ends_with(' '));
        assert!(windows.iter().all(|w| char_len(w) <= 20));
        assert_overlap(&windows, 4);
        assert_eq!(reassemble(&windows, 4), text);
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let text = "one two. three four five six seven eight nine";
        let windows = split_text(text, 20, 2);
        assert_eq!(windows[0], "one two. three four ");

        let text = "one two three. four five six seven";
        let windows = split_text(text, 20, 2);
        assert_eq!(windows[0], "one two three. ");
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let text = "다른 사람이 이기는 걸 좋아해 봐 ".repeat(200);
        let windows = split_text(&text, 3000, 300);

        assert!(windows.len() > 1);
        assert!(windows.iter().all(|w| char_len(w) <= 3000));
        assert_overlap(&windows, 300);
        assert_eq!(reassemble(&windows, 300), text);
    }

    #[test]
    fn test_split_group_carries_group_times() {
        let lines: Vec<TranscriptLine> = (0..10)
            .map(|i| TranscriptLine::new("말".repeat(40), 100.0 + i as f64))
            .collect();
        let group = SegmentGroup::new(lines);
        let video = VideoRef::new("chan", "abc123");

        let chunks = split(&group, &video, 150, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.start, 100.0);
            assert_eq!(chunk.end, 109.0);
            assert_eq!(chunk.video_id, "abc123");
            assert!(char_len(&chunk.content) <= 150);
        }
    }

    #[test]
    fn test_empty_group_is_skipped() {
        let video = VideoRef::new("chan", "vid");
        assert!(split(&SegmentGroup::new(Vec::new()), &video, 3000, 300).is_empty());
    }
}
