// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merging an edited todo text list into existing items.

use cadence_core::TodoItem;

/// Trim each text and drop blanks.
pub(crate) fn normalize_texts<S: AsRef<str>>(texts: &[S]) -> Vec<String> {
    texts.iter().map(|t| t.as_ref().trim()).filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Build the new item list for `texts`.
///
/// An item whose text is unchanged at the same position keeps its id and
/// history. Otherwise the first unclaimed existing item with the same text
/// is reused, so inserting or removing a line does not reset the items
/// after it. Remaining texts become fresh pending items.
pub fn merge_todos(existing: &[TodoItem], texts: &[String]) -> Vec<TodoItem> {
    let mut claimed = vec![false; existing.len()];
    let mut merged: Vec<Option<TodoItem>> = vec![None; texts.len()];

    for (i, text) in texts.iter().enumerate() {
        if let Some(item) = existing.get(i).filter(|item| item.text == *text) {
            claimed[i] = true;
            merged[i] = Some(item.clone());
        }
    }
    for (i, text) in texts.iter().enumerate() {
        if merged[i].is_some() {
            continue;
        }
        let reuse = existing.iter().enumerate().find(|(j, item)| !claimed[*j] && item.text == *text);
        merged[i] = Some(match reuse {
            Some((j, item)) => {
                claimed[j] = true;
                item.clone()
            }
            None => TodoItem::new(text.clone()),
        });
    }
    merged.into_iter().flatten().collect()
}

#[cfg(test)]
#[path = "todos_tests.rs"]
mod tests;
