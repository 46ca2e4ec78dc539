//! Travel intent storage.
//!
//! Holds the candidate intent pool the matching engine groups over.

use std::collections::HashMap;

use crate::error::{Result, TripMatchError};
use crate::{IntentId, TravelIntent, UserId};

/// Storage for active travel intents, keyed by intent id.
#[derive(Debug, Default)]
pub struct IntentStore {
    intents: HashMap<IntentId, TravelIntent>,
}

impl IntentStore {
    pub fn new() -> Self {
        Self {
            intents: HashMap::new(),
        }
    }

    /// Add an intent. Intents are immutable: an existing id is rejected.
    pub fn add(&mut self, intent: TravelIntent) -> Result<()> {
        if self.intents.contains_key(&intent.id) {
            return Err(TripMatchError::DuplicateIntent { id: intent.id });
        }
        self.intents.insert(intent.id.clone(), intent);
        Ok(())
    }

    /// Withdraw an intent. Returns the removed intent if it existed.
    pub fn remove(&mut self, id: &IntentId) -> Option<TravelIntent> {
        self.intents.remove(id)
    }

    /// Withdraw every intent of a user. Returns how many were removed.
    pub fn remove_user(&mut self, user: &UserId) -> usize {
        let before = self.intents.len();
        self.intents.retain(|_, intent| &intent.user != user);
        before - self.intents.len()
    }

    pub fn get(&self, id: &IntentId) -> Option<&TravelIntent> {
        self.intents.get(id)
    }

    pub fn by_user<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a TravelIntent> {
        self.intents.values().filter(move |i| &i.user == user)
    }

    pub fn contains(&self, id: &IntentId) -> bool {
        self.intents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Snapshot of the pool for a grouping pass.
    pub fn snapshot(&self) -> Vec<TravelIntent> {
        self.intents.values().cloned().collect()
    }
}
