// ============================================
// Recommendation Queue
// ============================================
//
// FIFO of pending recommendations for one user. Three operations matter:
//
//   peek()            -> the card currently shown
//   pop_current(id)   -> remove it once feedback on that id is confirmed
//   append(item)      -> add a server-provided recommendation at the tail
//
// Ids are unique within a queue; appending an id already queued is a no-op.
// The same type backs the per-user queued set kept by the engine.

use crate::models::Recipe;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is empty")]
    Empty,

    /// Feedback confirmed for an id that is not at the head
    #[error("Queue out of sync: head is {head}, feedback was for {confirmed}")]
    OutOfSync { head: String, confirmed: String },
}

/// Anything that can sit in a queue; identified by recipe id
pub trait QueueItem {
    fn queue_id(&self) -> &str;
}

impl QueueItem for String {
    fn queue_id(&self) -> &str {
        self
    }
}

impl QueueItem for Recipe {
    fn queue_id(&self) -> &str {
        &self.id
    }
}

impl<T: QueueItem + ?Sized> QueueItem for Arc<T> {
    fn queue_id(&self) -> &str {
        (**self).queue_id()
    }
}

#[derive(Debug, Clone)]
pub struct RecommendationQueue<T> {
    items: VecDeque<T>,
    ids: HashSet<String>,
}

impl<T> Default for RecommendationQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            ids: HashSet::new(),
        }
    }
}

impl<T: QueueItem> RecommendationQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Remove the head, but only if it is the item the feedback was for
    pub fn pop_current(&mut self, confirmed_id: &str) -> Result<T, QueueError> {
        let head = self.items.front().ok_or(QueueError::Empty)?;
        if head.queue_id() != confirmed_id {
            return Err(QueueError::OutOfSync {
                head: head.queue_id().to_string(),
                confirmed: confirmed_id.to_string(),
            });
        }

        let item = self.items.pop_front().ok_or(QueueError::Empty)?;
        self.ids.remove(item.queue_id());
        Ok(item)
    }

    /// Remove an id wherever it sits. Returns `true` if it was queued.
    pub fn remove(&mut self, id: &str) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.items.retain(|item| item.queue_id() != id);
        true
    }

    /// Returns `false` if the id was already queued
    pub fn append(&mut self, item: T) -> bool {
        if !self.ids.insert(item.queue_id().to_string()) {
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Append many; returns how many were new
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> usize {
        items
            .into_iter()
            .map(|item| self.append(item))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.queue_id())
    }
}
