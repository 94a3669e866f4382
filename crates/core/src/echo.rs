//! Echo suppression for recognized transcripts.
//!
//! When the microphone opens right after the synthesizer finishes, some
//! devices re-capture the tail of the system's own speech and the recognizer
//! reports it as a user transcript. A transcript that looks like the
//! immediately preceding utterance is discarded instead of being treated as
//! an answer.

/// Number of leading tokens compared between the transcript and the last
/// system utterance.
const COMPARE_WINDOW: usize = 6;

/// Aligned-position matches within the window that classify an echo.
const ALIGNED_MATCH_THRESHOLD: usize = 3;

/// Overall token-overlap ratio that classifies an echo.
const OVERLAP_RATIO_THRESHOLD: f64 = 0.5;

/// Returns true when `transcript` is likely a re-capture of `last_utterance`.
pub fn is_echo(transcript: &str, last_utterance: &str) -> bool {
    let heard = tokens(transcript);
    let spoken = tokens(last_utterance);
    if heard.is_empty() || spoken.is_empty() {
        return false;
    }

    let heard_window = &heard[..heard.len().min(COMPARE_WINDOW)];
    let spoken_window = &spoken[..spoken.len().min(COMPARE_WINDOW)];

    let aligned = heard_window
        .iter()
        .zip(spoken_window.iter())
        .filter(|(a, b)| a == b)
        .count();
    if aligned >= ALIGNED_MATCH_THRESHOLD {
        return true;
    }

    let overlapping = heard_window
        .iter()
        .filter(|token| spoken_window.contains(token))
        .count();
    overlapping as f64 / heard_window.len() as f64 >= OVERLAP_RATIO_THRESHOLD
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}
