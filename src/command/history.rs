use log::{debug, info, warn};
use uuid::Uuid;

use crate::document::Document;
use crate::error::{ToolLoopError, ToolLoopResult};
use crate::geometry::Region;

use super::transaction::Transaction;

/// Undo collaborator of the tool loop. A gesture opens one transaction,
/// then either commits it or aborts it.
pub trait History {
    fn begin_cel_transaction(&mut self, label: &str) -> ToolLoopResult<Uuid>;

    /// Applies `tx` to `doc` and records it as one undo step. Returns
    /// `false` when the transaction was empty and nothing was recorded.
    fn commit_cel_transaction(&mut self, doc: &mut Document, tx: Transaction) -> ToolLoopResult<bool>;

    fn abort_cel_transaction(&mut self, id: Uuid);
}

/// Manages the history of committed transactions for undo/redo
#[derive(Debug, Default)]
pub struct CommandHistory {
    /// Transactions that can be undone
    undo_stack: Vec<Transaction>,
    /// Transactions that can be redone
    redo_stack: Vec<Transaction>,
    open: Option<Uuid>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reverts the last transaction, returning the area to redraw
    pub fn undo(&mut self, doc: &mut Document) -> Option<Region> {
        let tx = self.undo_stack.pop()?;
        info!("Undo '{}'", tx.label);
        tx.revert(doc);
        let dirty = tx.dirty.clone();
        self.redo_stack.push(tx);
        Some(dirty)
    }

    /// Applies again the last undone transaction
    pub fn redo(&mut self, doc: &mut Document) -> Option<Region> {
        let tx = self.redo_stack.pop()?;
        info!("Redo '{}'", tx.label);
        tx.apply(doc);
        let dirty = tx.dirty.clone();
        self.undo_stack.push(tx);
        Some(dirty)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undo steps
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn last(&self) -> Option<&Transaction> {
        self.undo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl History for CommandHistory {
    fn begin_cel_transaction(&mut self, label: &str) -> ToolLoopResult<Uuid> {
        if let Some(open) = self.open {
            warn!("Can't start '{}', transaction {} is still open", label, open);
            return Err(ToolLoopError::HistoryUnavailable);
        }
        let id = Uuid::new_v4();
        debug!("Transaction '{}' ({}) started", label, id);
        self.open = Some(id);
        Ok(id)
    }

    fn commit_cel_transaction(&mut self, doc: &mut Document, tx: Transaction) -> ToolLoopResult<bool> {
        if self.open != Some(tx.id) {
            warn!("Transaction {} wasn't started by this history", tx.id);
            return Err(ToolLoopError::HistoryUnavailable);
        }
        self.open = None;
        if tx.is_empty() {
            debug!("Transaction '{}' is empty, nothing to record", tx.label);
            return Ok(false);
        }
        tx.apply(doc);
        self.undo_stack.push(tx);
        self.redo_stack.clear();
        Ok(true)
    }

    fn abort_cel_transaction(&mut self, id: Uuid) {
        if self.open == Some(id) {
            debug!("Transaction {} aborted", id);
            self.open = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PixelFormat;
    use crate::geometry::Rect;
    use crate::selection::Mask;
    use crate::command::transaction::MaskPatch;

    fn mask_tx(history: &mut CommandHistory, doc: &Document) -> Transaction {
        let id = history.begin_cel_transaction("marquee").unwrap();
        let mut tx = Transaction::new(id, "marquee", doc.active_layer().unwrap());
        tx.mask = Some(MaskPatch {
            before: doc.mask().clone(),
            after: Mask::from_rect(Rect::new(0, 0, 2, 2)),
        });
        tx
    }

    #[test]
    fn test_undo_redo() {
        let mut doc = Document::new(PixelFormat::Rgb, 4, 4);
        doc.add_layer("Layer 1").unwrap();
        let mut history = CommandHistory::new();

        let tx = mask_tx(&mut history, &doc);
        assert!(history.commit_cel_transaction(&mut doc, tx).unwrap());
        assert_eq!(doc.mask().selected_count(), 4);
        assert!(history.can_undo());

        history.undo(&mut doc).unwrap();
        assert!(doc.mask().is_empty());
        assert!(history.can_redo());

        history.redo(&mut doc).unwrap();
        assert_eq!(doc.mask().selected_count(), 4);
        assert!(history.undo(&mut doc).is_some());
        assert!(history.undo(&mut doc).is_none());
    }

    #[test]
    fn test_empty_transaction_is_not_recorded() {
        let mut doc = Document::new(PixelFormat::Rgb, 4, 4);
        let layer = doc.add_layer("Layer 1").unwrap();
        let mut history = CommandHistory::new();
        let id = history.begin_cel_transaction("pencil").unwrap();
        let recorded = history
            .commit_cel_transaction(&mut doc, Transaction::new(id, "pencil", layer))
            .unwrap();
        assert!(!recorded);
        assert!(history.is_empty());
    }

    #[test]
    fn test_one_open_transaction_at_a_time() {
        let mut history = CommandHistory::new();
        let id = history.begin_cel_transaction("a").unwrap();
        assert_eq!(
            history.begin_cel_transaction("b"),
            Err(ToolLoopError::HistoryUnavailable)
        );
        history.abort_cel_transaction(id);
        assert!(history.begin_cel_transaction("b").is_ok());
    }
}
