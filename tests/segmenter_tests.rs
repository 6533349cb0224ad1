//! Feeds realistic answers through the segmenter one character at a time.

use jarvis::render::{Block, render_stream, segment};

const ANSWERS: &[&str] = &[
    "## Plan\n\nFirst, check the logs.\nThen restart the service.\n\n- one\n- two\n\n```bash\nsystemctl restart jarvis\n```\n\nDone.",
    "Here is a table:\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n> quoted\n> text\n\n1. first\n2. second\n",
    "```rust\nfn main() {\n    // # not a heading\n\n    println!(\"hi\");\n}\n```\n# Title\ntext",
    "Windows lines\r\n\r\n- item\r\n- item two\r\n\r\nEnd",
];

fn char_prefixes(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .map(|(index, _)| &text[..index])
        .chain(std::iter::once(text))
}

#[test]
fn test_segments_reconstruct_content() {
    for answer in ANSWERS {
        for prefix in char_prefixes(answer) {
            let parts = segment(prefix, true);
            assert_eq!(format!("{}{}", parts.completed, parts.pending), prefix);
        }
    }
}

#[test]
fn test_completed_prefix_never_shrinks() {
    for answer in ANSWERS {
        let mut last_completed = 0;
        for prefix in char_prefixes(answer) {
            let completed = segment(prefix, true).completed.len();
            assert!(
                completed >= last_completed,
                "completed shrank from {last_completed} to {completed} at {prefix:?}"
            );
            last_completed = completed;
        }
    }
}

#[test]
fn test_finished_stream_has_no_pending_text() {
    for answer in ANSWERS {
        let parts = segment(answer, false);
        assert_eq!(parts.completed, *answer);
        assert!(parts.pending.is_empty());
    }
}

#[test]
fn test_open_fence_is_never_rendered_as_code() {
    let answer = ANSWERS[0];
    let fence_start = answer.find("```").unwrap();
    let fence_end = answer.rfind("```").unwrap();
    for prefix in char_prefixes(answer).filter(|p| p.len() > fence_start && p.len() <= fence_end) {
        let view = render_stream(prefix, true);
        assert!(
            !view.blocks.iter().any(|block| matches!(block, Block::Code(_))),
            "unterminated fence rendered at {prefix:?}"
        );
    }
}
