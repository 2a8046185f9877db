use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

/// A rasterized preview frame, JPEG-encoded at the preview box size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Whole second of the preview element's position when the frame was drawn.
    pub second: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

/// Preview frames keyed by truncated playback second.
///
/// One entry per second; a second write to the same key replaces the first.
/// Bounded: once `capacity` seconds are cached, the least recently used one
/// is evicted. Owned by a single player and dropped with it.
pub struct FrameCache {
    entries: LruCache<u64, Arc<EncodedFrame>>,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Cache key for a playback position: the whole second, negatives clamp to 0.
    pub fn key_for(secs: f64) -> u64 {
        if secs.is_finite() && secs > 0.0 {
            secs.floor() as u64
        } else {
            0
        }
    }

    pub fn put(&mut self, second: u64, frame: Arc<EncodedFrame>) {
        if let Some((evicted, _)) = self.entries.push(second, frame) {
            if evicted != second {
                log::debug!("Preview cache evicted second {evicted}");
            }
        }
    }

    pub fn get(&mut self, second: u64) -> Option<Arc<EncodedFrame>> {
        self.entries.get(&second).cloned()
    }

    pub fn contains(&self, second: u64) -> bool {
        self.entries.contains(&second)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(second: u64, tag: u8) -> Arc<EncodedFrame> {
        Arc::new(EncodedFrame {
            second,
            width: 2,
            height: 2,
            jpeg: vec![tag],
        })
    }

    #[test]
    fn get_missing_returns_none() {
        let mut cache = FrameCache::new(8);
        assert!(cache.get(42).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn second_write_keeps_latest() {
        let mut cache = FrameCache::new(8);
        cache.put(7, frame(7, 1));
        cache.put(7, frame(7, 2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(7).unwrap().jpeg, vec![2]);
    }

    #[test]
    fn key_truncates_to_whole_second() {
        assert_eq!(FrameCache::key_for(7.8), 7);
        assert_eq!(FrameCache::key_for(7.0), 7);
        assert_eq!(FrameCache::key_for(0.4), 0);
        assert_eq!(FrameCache::key_for(-3.0), 0);
        assert_eq!(FrameCache::key_for(f64::NAN), 0);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = FrameCache::new(2);
        cache.put(1, frame(1, 1));
        cache.put(2, frame(2, 2));
        // Touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(1).is_some());
        cache.put(3, frame(3, 3));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_falls_back_to_one() {
        let mut cache = FrameCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, frame(1, 1));
        cache.put(2, frame(2, 2));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(2));
    }

    #[test]
    fn clear_empties() {
        let mut cache = FrameCache::new(4);
        cache.put(1, frame(1, 1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
