/// Completion item building.
///
/// This module turns oracle [`CompletionCandidate`]s into LSP
/// `CompletionItem`s.  The oracle already sorts candidates by label, so
/// the `sort_text` preserves that order instead of letting the client
/// re-sort.
use tower_lsp::lsp_types::*;

use crate::types::CompletionCandidate;

/// Build the LSP item for one candidate.
///
/// `index` is the candidate's position in the oracle's sorted list.
pub fn build_completion_item(candidate: &CompletionCandidate, index: usize) -> CompletionItem {
    let name = candidate.name();
    let is_call = name.contains('(');
    let filter = name.split('(').next().unwrap_or(name).to_string();

    CompletionItem {
        label: name.to_string(),
        kind: Some(if is_call {
            CompletionItemKind::METHOD
        } else {
            CompletionItemKind::FIELD
        }),
        detail: candidate.description().map(str::to_string),
        insert_text: Some(candidate.insert_text.clone()),
        insert_text_format: Some(if candidate.is_snippet() {
            InsertTextFormat::SNIPPET
        } else {
            InsertTextFormat::PLAIN_TEXT
        }),
        filter_text: Some(filter),
        sort_text: Some(format!("{:05}", index)),
        ..CompletionItem::default()
    }
}

/// Build the items for a whole candidate list.
pub fn build_completion_items(candidates: &[CompletionCandidate]) -> Vec<CompletionItem> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| build_completion_item(c, i))
        .collect()
}
