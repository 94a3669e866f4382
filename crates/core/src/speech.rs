//! Sentence chunking for speech synthesis.
//!
//! Utterances are handed to the synthesizer one sentence at a time; feeding a
//! whole paragraph in one call produces garbled or repeated playback on some
//! speech backends. Adjacent duplicate sentences are collapsed before
//! speaking so a stuttering generator never says the same thing twice in a row.

/// Splits `text` into trimmed sentence units, collapsing adjacent duplicates.
pub fn sentence_chunks(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '?' | '!') {
            push_chunk(&mut chunks, &current);
            current.clear();
        }
    }
    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    if chunks.last().map(String::as_str) == Some(trimmed) {
        return;
    }
    chunks.push(trimmed.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_boundaries() {
        let chunks = sentence_chunks("Nice work! Now tell me more. What happened next?");
        assert_eq!(
            chunks,
            vec!["Nice work!", "Now tell me more.", "What happened next?"]
        );
    }

    #[test]
    fn collapses_adjacent_duplicates() {
        let chunks = sentence_chunks("Good job. Good job. Keep going.");
        assert_eq!(chunks, vec!["Good job.", "Keep going."]);
    }

    #[test]
    fn keeps_non_adjacent_repeats() {
        let chunks = sentence_chunks("Good. Bad. Good.");
        assert_eq!(chunks, vec!["Good.", "Bad.", "Good."]);
    }

    #[test]
    fn handles_text_without_terminator() {
        let chunks = sentence_chunks("tell me about your weekend");
        assert_eq!(chunks, vec!["tell me about your weekend"]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(sentence_chunks("").is_empty());
        assert!(sentence_chunks("   ").is_empty());
    }
}
