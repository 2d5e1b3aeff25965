//! In-memory stand-ins for the remote API and the git executable.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use orgmirror_core::error::MirrorError;
use orgmirror_core::models::repo::{RepositoryDescriptor, TransferUrl};
use orgmirror_host::RepoLister;

use crate::git_ops::{Transfer, MARKER};

pub struct FakeLister {
    result: Result<Vec<RepositoryDescriptor>, u16>,
    pub calls: AtomicUsize,
}

impl FakeLister {
    pub fn ok(repos: Vec<RepositoryDescriptor>) -> Self {
        Self {
            result: Ok(repos),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            result: Err(status),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RepoLister for FakeLister {
    async fn list_repos(&self, _organization: &str) -> Result<Vec<RepositoryDescriptor>, MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(repos) => Ok(repos.clone()),
            Err(status) => Err(MirrorError::ListingFailed {
                status: *status,
                message: "canned failure".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Clone(String),
    Pull(String),
}

/// Clones "succeed" by creating the marker directory; names in `failing`
/// return an error and names in `panicking` panic.
#[derive(Default)]
pub struct FakeTransfer {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    calls: Mutex<Vec<TransferCall>>,
    urls: Mutex<Vec<TransferUrl>>,
    spans: Mutex<Vec<Option<&'static str>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransfer {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn panicking(names: &[&str]) -> Self {
        Self {
            panicking: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TransferCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<TransferUrl> {
        self.urls.lock().unwrap().clone()
    }

    /// Name of the span each transfer ran in.
    pub fn spans(&self) -> Vec<Option<&'static str>> {
        self.spans.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn run(&self, call: TransferCall, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
        let name = name_of(dest);
        let is_clone = matches!(call, TransferCall::Clone(_));
        self.calls.lock().unwrap().push(call);
        self.urls.lock().unwrap().push(url.clone());
        self.spans
            .lock()
            .unwrap()
            .push(tracing::Span::current().metadata().map(|m| m.name()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&name) {
            panic!("simulated crash in {name}");
        }
        if self.failing.contains(&name) {
            return Err(MirrorError::GitError {
                message: "simulated non-zero exit".into(),
            });
        }
        if is_clone {
            std::fs::create_dir_all(dest.join(MARKER))?;
        }
        Ok(())
    }
}

impl Transfer for FakeTransfer {
    fn clone_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
        self.run(TransferCall::Clone(name_of(dest)), url, dest)
    }

    fn pull_into(&self, url: &TransferUrl, dest: &Path) -> Result<(), MirrorError> {
        self.run(TransferCall::Pull(name_of(dest)), url, dest)
    }
}

fn name_of(dest: &Path) -> String {
    dest.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
