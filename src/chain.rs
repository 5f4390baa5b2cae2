/// Member access chain resolution.
///
/// A chain is the text after the leading variable of a member access,
/// without its first dot: for `list.get(a.b).iterator().` the chain is
/// `get(a.b).iterator().`.  It is tokenized into [`ChainSegment`]s on the
/// dots that are *not* nested inside call arguments, and each segment's
/// return type is asked from the oracle in turn.
///
/// | Chain                    | Segments                  | Remainder |
/// |--------------------------|---------------------------|-----------|
/// | `foo().bar.baz().`       | `foo()`, `bar`, `baz()`   | ``        |
/// | `call(a.b).next`         | `call(a.b)`               | `next`    |
/// | `f(g(x.y), z.w).h.pre`   | `f(g(x.y), z.w)`, `h`     | `pre`     |
/// | `size`                   | (none)                    | `size`    |
use std::time::Instant;

use tracing::debug;

use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::types::{AbsoluteType, ChainSegment};

/// A tokenized access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChain<'a> {
    /// The segments whose return types must be resolved, in order.
    pub segments: Vec<ChainSegment>,
    /// Text after the last top-level dot (the completion prefix).
    pub remainder: &'a str,
}

/// Split `chain` on its top-level dots.
///
/// A dot that sits inside a balanced `( … )` group belongs to the call's
/// arguments and does not end a segment.  When a call is still open
/// (unbalanced), everything from that segment on is the remainder.
pub fn split_chain(chain: &str) -> ParsedChain<'_> {
    let bytes = chain.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;

    while let Some(offset) = chain[start..].find('.') {
        let mut dot = start + offset;

        if let Some(open) = chain[start..dot].find('(') {
            let Some(close) = matching_paren(bytes, start + open) else {
                break;
            };
            match chain[close..].find('.') {
                Some(next) => dot = close + next,
                None => break,
            }
        }

        segments.push(parse_segment(&chain[start..dot]));
        start = dot + 1;
    }

    ParsedChain {
        segments,
        remainder: &chain[start..],
    }
}

/// Index of the `)` closing the `(` at `open`, found with a depth counter.
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth: u32 = 0;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_segment(text: &str) -> ChainSegment {
    let text = text.trim();
    match text.find('(') {
        Some(open) => {
            let close = text.rfind(')').filter(|&c| c > open).unwrap_or(text.len());
            ChainSegment {
                name: text[..open].trim().to_string(),
                arguments: Some(text[open + 1..close].to_string()),
                text: text.to_string(),
            }
        }
        None => {
            // Array indexing does not change the member being accessed.
            let name = text.split('[').next().unwrap_or(text).trim();
            ChainSegment {
                name: name.to_string(),
                arguments: None,
                text: text.to_string(),
            }
        }
    }
}

/// Walk `chain` starting from `start`, replacing the current type with
/// the oracle's return type for each segment.
///
/// Returns the type whose members complete the remainder, or `Ok(None)`
/// as soon as a segment cannot be resolved.
pub fn resolve_chain<O: Oracle + ?Sized>(
    oracle: &mut O,
    start: AbsoluteType,
    chain: &str,
) -> Result<Option<AbsoluteType>, OracleError> {
    let timer = Instant::now();
    let parsed = split_chain(chain);
    let mut current = start;

    for segment in &parsed.segments {
        match oracle.get_return_type(&current, &segment.name)? {
            Some(next) => {
                debug!("{}.{} = {}", current, segment.text, next);
                current = next;
            }
            None => {
                debug!("{}.{} is unresolved", current, segment.text);
                return Ok(None);
            }
        }
    }

    debug!(
        elapsed_ms = timer.elapsed().as_secs_f64() * 1000.0,
        segments = parsed.segments.len(),
        "resolved access chain"
    );
    Ok(Some(current))
}
