//! Last-write-wins conflict resolution.

use crate::models::{RemoteTask, Task, Winner};

/// Anything carrying a last-modified timestamp (Unix ms).
pub trait Versioned {
    fn updated_at(&self) -> i64;
}

impl Versioned for Task {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

impl Versioned for RemoteTask {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Pick the version to keep.
///
/// The strictly newer version wins. On a tie the remote authority wins, as it
/// is the single merge point for every client.
pub fn resolve(local: &impl Versioned, remote: &impl Versioned) -> Winner {
    if local.updated_at() > remote.updated_at() {
        Winner::Local
    } else {
        Winner::Remote
    }
}
