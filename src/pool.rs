//! Fixed-capacity pools of pre-generated backend handles.

use crate::backend::{AudioBackend, HandleId};
use std::collections::VecDeque;

/// What a pool hands out; decides which backend calls create and delete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Voice,
    Buffer,
}

impl HandleKind {
    fn generate(self, backend: &dyn AudioBackend) -> Option<HandleId> {
        match self {
            Self::Voice => backend.gen_voice(),
            Self::Buffer => backend.gen_buffer(),
        }
    }

    fn delete(self, backend: &dyn AudioBackend, handle: HandleId) {
        match self {
            Self::Voice => backend.delete_voice(handle),
            Self::Buffer => backend.delete_buffer(handle),
        }
    }
}

/// A FIFO of free handles.
///
/// Filled once when created and drained once at shutdown; it never grows.
/// Handles that are checked out are owned by exactly one active voice until
/// they are released.
#[derive(Debug)]
pub struct HandlePool {
    kind: HandleKind,
    free: VecDeque<HandleId>,
    capacity: usize,
}

impl HandlePool {
    /// Generate up to `capacity` handles through the backend.
    ///
    /// A backend that runs out early leaves the pool smaller than requested;
    /// the shortfall is logged and the pool works with what it got.
    pub fn fill(kind: HandleKind, backend: &dyn AudioBackend, capacity: usize) -> Self {
        let mut free = VecDeque::with_capacity(capacity);
        for i in 0..capacity {
            match kind.generate(backend) {
                Some(handle) => free.push_back(handle),
                None => {
                    log::warn!(
                        "Backend {} could only generate {} of {} {:?} handles",
                        backend.name(),
                        i,
                        capacity,
                        kind
                    );
                    break;
                }
            }
        }

        log::info!("Created {:?} pool with {} handles", kind, free.len());

        let capacity = free.len();
        Self {
            kind,
            free,
            capacity,
        }
    }

    /// Take a free handle, or `None` when the pool is exhausted.
    pub fn acquire(&mut self) -> Option<HandleId> {
        self.free.pop_front()
    }

    /// Return a handle to the pool.
    ///
    /// Releasing a handle that is already free is ignored, so a handle can
    /// never sit in the pool twice.
    pub fn release(&mut self, handle: HandleId) {
        if self.free.contains(&handle) {
            log::warn!("{:?} handle {} released twice; ignoring", self.kind, handle);
            return;
        }
        debug_assert!(self.free.len() < self.capacity);
        self.free.push_back(handle);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn in_use(&self) -> usize {
        self.capacity - self.free.len()
    }

    #[cfg(test)]
    fn contains(&self, handle: HandleId) -> bool {
        self.free.contains(&handle)
    }

    /// Delete every free handle through the backend.
    ///
    /// Returns the number of handles still checked out, which leak if the
    /// caller does not release them first.
    pub fn drain(&mut self, backend: &dyn AudioBackend) -> usize {
        let outstanding = self.in_use();
        for handle in self.free.drain(..) {
            self.kind.delete(backend, handle);
        }
        if outstanding > 0 {
            log::warn!(
                "{:?} pool drained with {} handles still in use",
                self.kind,
                outstanding
            );
        }
        log::info!("Drained {:?} pool", self.kind);
        self.capacity = outstanding;
        outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    fn backend() -> SimulatedBackend {
        let backend = SimulatedBackend::new();
        assert!(backend.create_context());
        backend
    }

    #[test]
    fn fill_generates_capacity_handles() {
        let backend = backend();
        let pool = HandlePool::fill(HandleKind::Buffer, &backend, 10);
        assert_eq!(pool.available(), 10);
        assert_eq!(pool.capacity(), 10);
        assert_eq!(backend.live_buffers(), 10);
    }

    #[test]
    fn exhausted_pool_yields_none() {
        let backend = backend();
        let mut pool = HandlePool::fill(HandleKind::Voice, &backend, 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a, b);
        assert!(pool.acquire().is_none());
        assert_eq!(pool.in_use(), 2);

        pool.release(a);
        assert_eq!(pool.acquire(), Some(a));
    }

    #[test]
    fn short_backend_shrinks_pool() {
        let backend = SimulatedBackend::with_voice_limit(3);
        assert!(backend.create_context());
        let pool = HandlePool::fill(HandleKind::Voice, &backend, 8);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn double_release_is_ignored() {
        let backend = backend();
        let mut pool = HandlePool::fill(HandleKind::Voice, &backend, 2);
        let a = pool.acquire().unwrap();
        pool.release(a);
        pool.release(a);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn drain_deletes_free_handles() {
        let backend = backend();
        let mut pool = HandlePool::fill(HandleKind::Voice, &backend, 4);
        let held = pool.acquire().unwrap();
        assert_eq!(pool.drain(&backend), 1);
        assert_eq!(backend.live_voices(), 1);
        assert!(!pool.contains(held));
    }
}
