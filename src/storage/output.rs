//! Parser for the human-oriented text printed by `filecoin-pin add`
//!
//! The CLI offers no machine-readable output, so every field is optional and
//! only the label substrings are relied upon. Line order and decoration are
//! ignored. If the same label appears more than once, the last value wins.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const ROOT_CID_LABEL: &str = "Root CID:";
const PIECE_CID_LABEL: &str = "Piece CID:";
const DATA_SET_ID_LABEL: &str = "Data Set ID:";
const TX_HASH_PREFIX: &str = "│ Hash:";
const TX_HASH_LABEL: &str = "Hash:";
const CONTENT_LOADED_MARKER: &str = "IPFS content loaded (";

/// Fields recovered from a successful upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinOutput {
    pub root_cid: Option<String>,
    pub piece_cid: Option<String>,
    pub data_set_id: Option<String>,
    pub transaction_hash: Option<String>,
    /// Size as printed by the tool, e.g. "1.2 KB"
    pub file_size_display: Option<String>,
}

/// Turns captured stdout into structured upload details
pub trait OutputParser: Send + Sync {
    fn parse(&self, stdout: &str) -> PinOutput;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilecoinPinOutputParser;

fn content_loaded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"IPFS content loaded \(([^)]+)\)").expect("static regex is valid")
    })
}

/// Text after `label`, trimmed. Empty values count as absent.
fn value_after(line: &str, label: &str) -> Option<String> {
    line.split_once(label)
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl OutputParser for FilecoinPinOutputParser {
    fn parse(&self, stdout: &str) -> PinOutput {
        let mut out = PinOutput::default();

        for line in stdout.lines() {
            if line.contains(ROOT_CID_LABEL) {
                out.root_cid = value_after(line, ROOT_CID_LABEL).or(out.root_cid);
            } else if line.contains(PIECE_CID_LABEL) {
                out.piece_cid = value_after(line, PIECE_CID_LABEL).or(out.piece_cid);
            } else if line.contains(DATA_SET_ID_LABEL) {
                out.data_set_id = value_after(line, DATA_SET_ID_LABEL).or(out.data_set_id);
            } else if line.trim().starts_with(TX_HASH_PREFIX) {
                out.transaction_hash =
                    value_after(line, TX_HASH_LABEL).or(out.transaction_hash);
            } else if line.contains(CONTENT_LOADED_MARKER) {
                if let Some(caps) = content_loaded_pattern().captures(line) {
                    out.file_size_display = Some(caps[1].to_string());
                }
            }
        }

        out
    }
}
