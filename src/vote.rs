//! Vote token normalisation.
//!
//! Raw vote values arrive as whatever a client sent: a number, one of the
//! textual tokens `"agree"` / `"disagree"` / `"pass"`, or nothing at all.
//! [`normalize`] is the single place that turns that mess into the
//! three-valued `{-1.0, 0.0, 1.0}` plus `None` for "never voted" that the
//! rest of the engine works with.
//!
//! The asymmetry to keep straight: numeric `0` is a pass and is kept as
//! `0.0` (it is present in the matrix, just neutral), whereas the literal
//! token `"pass"` and `NaN` both normalise to missing. A pass recorded as
//! a number still means "this participant looked at this comment and
//! didn't take a side" — that's present-but-neutral, not absent.

use serde::{Deserialize, Serialize};

/// A raw vote value as received from a client, prior to normalisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVote {
    Number(f64),
    Text(String),
}

/// Normalise a raw vote token into the engine's canonical representation.
///
/// `None` in, `None` out: a participant who never saw a comment has no
/// entry at all. Everything else is classified per the module doc.
pub fn normalize(raw: Option<&RawVote>) -> Option<f64> {
    match raw {
        None => None,
        Some(RawVote::Number(n)) => {
            if n.is_nan() {
                None
            } else if *n > 0.0 {
                Some(1.0)
            } else if *n < 0.0 {
                Some(-1.0)
            } else {
                Some(0.0)
            }
        }
        Some(RawVote::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "agree" => Some(1.0),
            "disagree" => Some(-1.0),
            _ => None,
        },
    }
}
