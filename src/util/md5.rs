use std::{
    io::{self, Read},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use md5::{Digest as _, Md5};

/// Running MD5 of the bytes handed to the transport, shared with the caller.
#[derive(Clone, Default)]
pub(crate) struct Md5Tracker(Arc<Mutex<Md5>>);

impl Md5Tracker {
    pub(crate) fn reset(&self) {
        *self.lock() = Md5::new();
    }

    pub(crate) fn update(&self, bytes: &[u8]) {
        self.lock().update(bytes);
    }

    /// Hex digest of everything seen since the last reset, as single-part ETags carry it.
    pub(crate) fn hex(&self) -> String {
        hex::encode(self.lock().clone().finalize())
    }

    fn lock(&self) -> MutexGuard<'_, Md5> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Md5Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md5Tracker").finish_non_exhaustive()
    }
}

/// Feeds every byte read through `inner` into a tracker.
pub(crate) struct Md5Reader<R> {
    inner: R,
    tracker: Md5Tracker,
}

impl<R> Md5Reader<R> {
    pub(crate) fn new(inner: R, tracker: Md5Tracker) -> Self {
        Self { inner, tracker }
    }
}

impl<R: Read> Read for Md5Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.tracker.update(&buf[..n]);
        Ok(n)
    }
}
