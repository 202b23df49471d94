//! Run a whole engine call off the calling thread.
//!
//! The closure owns its inputs and the finished value is moved back to the
//! caller by [`Pending::wait`]; nothing is shared between the two sides while
//! the work runs.

use crate::error::{CamError, Result};
use std::any::Any;
use std::thread::{self, JoinHandle};

/// A computation running on a worker thread.
pub struct Pending<T> {
    name: String,
    handle: JoinHandle<T>,
}

/// Start `work` on a named worker thread.
pub fn spawn<T, F>(name: impl Into<String>, work: F) -> Result<Pending<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let name = name.into();
    let handle = thread::Builder::new().name(name.clone()).spawn(work)?;
    log::debug!("started background task `{name}`");
    Ok(Pending { name, handle })
}

impl<T> Pending<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the work is done and take its result.
    pub fn wait(self) -> Result<T> {
        let name = self.name;
        self.handle.join().map_err(|payload| {
            let reason = panic_message(payload.as_ref());
            log::error!("background task `{name}` panicked: {reason}");
            CamError::Background(format!("{name}: {reason}"))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
