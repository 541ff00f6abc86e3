//! Last-resort text recovery from raw PDF bytes.
//!
//! Works without a PDF parser: content streams are cut out (they are usually
//! compressed and decode to noise) and whatever printable runs remain in the
//! object structure are kept. Lossy by nature, only used when OCR is not
//! available.

use regex::bytes::Regex;
use tracing::debug;

/// Minimum length of a printable byte run to be kept.
const MIN_RUN_LEN: usize = 5;

/// Byte-level patterns used by the heuristic.
pub struct PdfTextHeuristic {
    stream_block: Regex,
    readable_run: Regex,
    whitespace: regex::Regex,
}

impl PdfTextHeuristic {
    pub fn new() -> Self {
        // Static patterns, covered by tests.
        Self {
            stream_block: Regex::new(r"(?s-u)stream.*?endstream").unwrap(),
            readable_run: Regex::new(&format!(r"(?-u)[^\x00-\x1F\x7F-\x9F]{{{},}}", MIN_RUN_LEN))
                .unwrap(),
            whitespace: regex::Regex::new(r"\s+").unwrap(),
        }
    }

    /// Extract readable text from PDF bytes, or `None` if nothing readable is left.
    pub fn extract(&self, bytes: &[u8]) -> Option<String> {
        let without_streams = self.stream_block.replace_all(bytes, &b" "[..]);

        let runs: Vec<String> = self
            .readable_run
            .find_iter(&without_streams)
            .map(|m| latin1_to_string(m.as_bytes()))
            .collect();

        debug!("PDF heuristic: {} readable runs outside streams", runs.len());

        let joined = runs.join(" ");
        let text = self.whitespace.replace_all(&joined, " ").trim().to_string();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Default for PdfTextHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

/// Every byte maps to the code point of the same value.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
