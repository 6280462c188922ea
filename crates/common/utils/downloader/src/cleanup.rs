// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, warn};

/// Temporary files created during one run.
///
/// Paths are registered before the file is created and removed when the set
/// is torn down, either explicitly or on drop. Teardown is best effort and
/// safe to repeat: files that are already gone count as removed.
#[derive(Debug, Default)]
pub struct CleanupSet {
    paths:    Mutex<Vec<PathBuf>>,
    disarmed: AtomicBool,
}

impl CleanupSet {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "tracking temp file");
        self.lock().push(path);
    }

    /// Snapshot of every registered path, in registration order
    #[must_use]
    pub fn registered(&self) -> Vec<PathBuf> { self.lock().clone() }

    /// Keep every registered file on disk, including on drop
    pub fn disarm(&self) { self.disarmed.store(true, Ordering::SeqCst); }

    #[must_use]
    pub fn is_disarmed(&self) -> bool { self.disarmed.load(Ordering::SeqCst) }

    /// Remove every registered file that still exists.
    ///
    /// Returns how many files were actually deleted by this call.
    pub fn teardown(&self) -> usize {
        if self.is_disarmed() {
            return 0;
        }

        let paths = self.registered();
        paths.iter().filter(|path| remove_quietly(path)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CleanupSet {
    fn drop(&mut self) {
        let removed = self.teardown();
        if removed > 0 {
            debug!(removed, "temp files cleaned up");
        }
    }
}

fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove temp file");
            false
        }
    }
}
