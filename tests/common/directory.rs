//! In-process directory client with scripted responses.

use directory_sync::{DirectoryClient, DirectoryError, ExternalDocument};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(ExternalDocument),
    Update(String, ExternalDocument),
    Delete(String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    creates: VecDeque<Result<String, DirectoryError>>,
    updates: VecDeque<Result<(), DirectoryError>>,
    deletes: VecDeque<Result<(), DirectoryError>>,
}

/// Directory client that succeeds unless told otherwise.
///
/// Creates without a scripted response return `ext-1`, `ext-2`, ... in order.
/// Clones share state, so a test can keep a handle after giving one to the client.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<State>>,
    next_id: Arc<AtomicUsize>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_create(&self, response: Result<String, DirectoryError>) {
        self.state.lock().unwrap().creates.push_back(response);
    }

    pub fn script_update(&self, response: Result<(), DirectoryError>) {
        self.state.lock().unwrap().updates.push_back(response);
    }

    pub fn script_delete(&self, response: Result<(), DirectoryError>) {
        self.state.lock().unwrap().deletes.push_back(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Body of the most recent create.
    pub fn last_created(&self) -> Option<ExternalDocument> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Create(document) => Some(document),
            _ => None,
        })
    }
}

impl DirectoryClient for MockDirectory {
    async fn create(&self, document: &ExternalDocument) -> Result<String, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create(document.clone()));
        state.creates.pop_front().unwrap_or_else(|| {
            Ok(format!("ext-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        })
    }

    async fn update(&self, external_id: &str, document: &ExternalDocument) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Update(external_id.to_string(), document.clone()));
        state.updates.pop_front().unwrap_or(Ok(()))
    }

    async fn delete(&self, external_id: &str) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(external_id.to_string()));
        state.deletes.pop_front().unwrap_or(Ok(()))
    }
}
