//! Scripted collaborators shared by the unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use crate::{
    error::{ExplorerError, Result},
    notice::Notifier,
    source::EntrySource,
    types::PathEntry,
};

#[derive(Clone)]
enum Listing {
    Entries(Vec<PathEntry>),
    Missing(String),
    Broken,
}

/// Holds requests for one path until released
pub struct Gate {
    started: Notify,
    permits: Semaphore,
}

impl Gate {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one pending request through
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    /// Let every request through from now on
    pub fn open(&self) {
        self.permits.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

/// In-memory entry source with per-path answers, request log and gates
#[derive(Default)]
pub struct ScriptedSource {
    roots: Mutex<Vec<String>>,
    listings: Mutex<HashMap<String, Listing>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roots(&self, roots: &[&str]) {
        *self.roots.lock().unwrap() = roots.iter().map(|r| r.to_string()).collect();
    }

    pub fn set_entries(&self, path: &str, entries: Vec<PathEntry>) {
        self.listings
            .lock()
            .unwrap()
            .insert(path.to_string(), Listing::Entries(entries));
    }

    pub fn set_missing(&self, path: &str, message: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(path.to_string(), Listing::Missing(message.to_string()));
    }

    pub fn set_broken(&self, path: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(path.to_string(), Listing::Broken);
    }

    pub fn gate(&self, path: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            started: Notify::new(),
            permits: Semaphore::new(0),
        });
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), gate.clone());
        gate
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == path)
            .count()
    }
}

#[async_trait]
impl EntrySource for ScriptedSource {
    async fn list_entries(&self, path: &str) -> Result<Vec<PathEntry>> {
        self.requests.lock().unwrap().push(path.to_string());

        let gate = self.gates.lock().unwrap().get(path).cloned();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.permits
                .acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }

        let listing = self.listings.lock().unwrap().get(path).cloned();
        match listing {
            Some(Listing::Entries(entries)) => Ok(entries),
            Some(Listing::Missing(message)) => Err(ExplorerError::NotFound { message }),
            Some(Listing::Broken) | None => Err(ExplorerError::UnexpectedResponse {
                status: 500,
                message: format!("no listing scripted for {}", path),
            }),
        }
    }

    async fn root_paths(&self) -> Result<Vec<String>> {
        Ok(self.roots.lock().unwrap().clone())
    }

    fn identifier(&self) -> String {
        "scripted".to_string()
    }
}

/// Keeps every notice for later inspection
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
