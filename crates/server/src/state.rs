//! Shared server state.
//!
//! One reader session is open at a time. Opening a chapter replaces (and
//! drops) the previous session, which releases its page handles.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use mangaread_core::{Error, MetadataCache};
use mangaread_reader::{ReaderDeps, ReaderSession, SessionOptions};

#[derive(Clone)]
pub struct AppState {
    pub deps: ReaderDeps,
    pub metadata: MetadataCache,
    pub options: SessionOptions,
    session: Arc<Mutex<Option<ReaderSession>>>,
}

impl AppState {
    pub fn new(deps: ReaderDeps, metadata: MetadataCache, options: SessionOptions) -> Self {
        Self { deps, metadata, options, session: Arc::new(Mutex::new(None)) }
    }

    pub async fn session(&self) -> MutexGuard<'_, Option<ReaderSession>> {
        self.session.lock().await
    }
}

/// The open session, or [`Error::NoSession`].
pub fn open_session(slot: &mut Option<ReaderSession>) -> Result<&mut ReaderSession, Error> {
    slot.as_mut().ok_or(Error::NoSession)
}
