//! Splits a streaming answer into a prefix that is safe to parse as markdown
//! and a tail that is still growing.
//!
//! Only newline-terminated lines are ever committed. That keeps the split
//! monotone: once text is in `completed` it stays there as more arrives.

const FENCE: &str = "```";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segmentation<'a> {
    pub completed: &'a str,
    pub pending: &'a str,
}

impl<'a> Segmentation<'a> {
    fn split(content: &'a str, at: usize) -> Self {
        let (completed, pending) = content.split_at(at);
        Self { completed, pending }
    }
}

struct Line<'a> {
    text: &'a str,
    end: usize,
}

pub fn segment(content: &str, is_streaming: bool) -> Segmentation<'_> {
    if !is_streaming || content.is_empty() {
        return Segmentation::split(content, content.len());
    }

    let (lines, tail) = terminated_lines(content);
    let mut in_code_block = false;
    let mut boundary = 0;

    for (index, line) in lines.iter().enumerate() {
        if is_fence(line.text) {
            if in_code_block {
                boundary = line.end;
            }
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        let safe = (index > 0 && is_blank(line.text))
            || is_heading(line.text)
            || (is_list_item(line.text) && list_is_settled(&lines, index, tail));
        if safe {
            boundary = line.end;
        }
    }

    Segmentation::split(content, boundary)
}

/// Returns the newline-terminated lines plus the unterminated remainder.
fn terminated_lines(content: &str) -> (Vec<Line<'_>>, &str) {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in content.split_inclusive('\n') {
        if !raw.ends_with('\n') {
            break;
        }
        offset += raw.len();
        let text = raw.trim_end_matches('\n').trim_end_matches('\r');
        lines.push(Line { text, end: offset });
    }
    (lines, &content[offset..])
}

// A list item is settled when the next line ends the list or adds another
// item. A partial next line only counts once its marker has arrived.
fn list_is_settled(lines: &[Line<'_>], index: usize, tail: &str) -> bool {
    match lines.get(index + 1) {
        Some(next) => is_blank(next.text) || is_list_item(next.text),
        None => is_list_item(tail),
    }
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && starts_with_space(&line[hashes..])
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix(['-', '*', '+']) {
        return starts_with_space(rest);
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0
        && trimmed[digits..]
            .strip_prefix('.')
            .is_some_and(starts_with_space)
}

fn starts_with_space(text: &str) -> bool {
    text.starts_with([' ', '\t'])
}
