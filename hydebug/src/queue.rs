//! Intrusive FIFO of wrappers.
//!
//! The links live inside the [`DebugHandle`] records of the session arena, so a wrapper can
//! be a member of at most one queue. A session keeps two of them: the open handles, and the
//! closed handles waiting in quarantine.
use crate::{
    handle::{DebugHandle, HandleArena, HandleKey},
    utils::error::{DebugError, DebugResult},
};

#[derive(Debug, Default)]
pub struct DHQueue {
    head: Option<HandleKey>,
    tail: Option<HandleKey>,
    size: usize,
}

impl DHQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Oldest member.
    pub fn front(&self) -> Option<HandleKey> {
        self.head
    }

    /// Insert `key` at the tail. `key` must not belong to any queue.
    pub fn append(&mut self, arena: &mut HandleArena, key: HandleKey) {
        let tail = self.tail;
        {
            let handle = &mut arena[key];
            debug_assert!(handle.prev.is_none() && handle.next.is_none());
            handle.prev = tail;
            handle.next = None;
        }

        match tail {
            Some(tail) => arena[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.size += 1;
    }

    /// Detach and return the oldest member.
    pub fn pop_front(&mut self, arena: &mut HandleArena) -> Option<HandleKey> {
        let head = self.head?;
        self.remove(arena, head);
        Some(head)
    }

    /// Detach `key`, which must be a member of this queue.
    pub fn remove(&mut self, arena: &mut HandleArena, key: HandleKey) {
        let (prev, next) = {
            let handle: &mut DebugHandle = &mut arena[key];
            (handle.prev.take(), handle.next.take())
        };

        match prev {
            Some(prev) => arena[prev].next = next,
            None => {
                debug_assert_eq!(self.head, Some(key), "handle is not a member of this queue");
                self.head = next;
            }
        }
        match next {
            Some(next) => arena[next].prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(key), "handle is not a member of this queue");
                self.tail = prev;
            }
        }
        self.size -= 1;
    }

    /// Iterate from the oldest to the newest member.
    pub fn iter<'a>(&self, arena: &'a HandleArena) -> DHQueueIter<'a> {
        DHQueueIter {
            arena,
            cursor: self.head,
        }
    }

    /// Walk the queue and verify links, back links, both ends and the cached size.
    pub fn sanity_check(&self, arena: &HandleArena) -> DebugResult<()> {
        let mut count = 0usize;
        let mut prev: Option<HandleKey> = None;
        let mut cursor = self.head;

        while let Some(key) = cursor {
            let handle = arena.get(key).ok_or_else(|| {
                DebugError::QueueCorrupted(format!("member {key:?} is not in the arena"))
            })?;
            if handle.prev != prev {
                return Err(DebugError::QueueCorrupted(format!(
                    "member {key:?} links back to {:?} instead of {prev:?}",
                    handle.prev
                )));
            }

            count += 1;
            if count > self.size {
                return Err(DebugError::QueueCorrupted(format!(
                    "more members than the recorded size {}",
                    self.size
                )));
            }
            prev = Some(key);
            cursor = handle.next;
        }

        if prev != self.tail {
            return Err(DebugError::QueueCorrupted(format!(
                "last member {prev:?} is not the tail {:?}",
                self.tail
            )));
        }
        if count != self.size {
            return Err(DebugError::QueueCorrupted(format!(
                "{count} members but the recorded size is {}",
                self.size
            )));
        }
        Ok(())
    }
}

pub struct DHQueueIter<'a> {
    arena: &'a HandleArena,
    cursor: Option<HandleKey>,
}

impl<'a> Iterator for DHQueueIter<'a> {
    type Item = (HandleKey, &'a DebugHandle);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let handle = self.arena.get(key)?;
        self.cursor = handle.next;
        Some((key, handle))
    }
}
