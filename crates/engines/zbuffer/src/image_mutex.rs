//! Spatially partitioned pixel locks
//!
//! The image is cut into square tiles and each tile owns one mutex. Two
//! pixels in the same tile exclude each other, which over-locks but never
//! under-locks. Unlocking is tied to the guard's lifetime so every path out
//! of a locked section releases the tile.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

pub struct ImageMutex {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles_x: u32,
    tiles: Vec<Mutex<()>>,
}

/// Held lock on one tile. Dropping it unlocks.
///
/// A guard built with [`PixelGuard::unlocked`] holds nothing; the engine
/// hands those out when it runs single-threaded.
#[must_use = "the pixel is unlocked as soon as the guard is dropped"]
pub struct PixelGuard<'a> {
    guard: Option<MutexGuard<'a, ()>>,
}

impl PixelGuard<'_> {
    pub fn unlocked() -> Self {
        Self { guard: None }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl ImageMutex {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        let tiles_x = width.div_ceil(tile_size).max(1);
        let tiles_y = height.div_ceil(tile_size).max(1);
        Self {
            width,
            height,
            tile_size,
            tiles_x,
            tiles: (0..tiles_x as usize * tiles_y as usize)
                .map(|_| Mutex::new(()))
                .collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Out-of-image coordinates clamp to the border tiles
    #[inline]
    fn tile_index(&self, x: u32, y: u32) -> usize {
        let tx = (x / self.tile_size).min(self.tiles_x - 1);
        let ty = y / self.tile_size;
        let tiles_y = (self.tiles.len() / self.tiles_x as usize) as u32;
        (ty.min(tiles_y - 1) * self.tiles_x + tx) as usize
    }

    /// Block until the tile holding `(x, y)` is available
    pub fn lock(&self, x: u32, y: u32) -> PixelGuard<'_> {
        let guard = self.tiles[self.tile_index(x, y)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        PixelGuard {
            guard: Some(guard),
        }
    }

    /// Take the tile holding `(x, y)` if nobody else holds it. Never blocks.
    pub fn try_lock(&self, x: u32, y: u32) -> Option<PixelGuard<'_>> {
        match self.tiles[self.tile_index(x, y)].try_lock() {
            Ok(guard) => Some(PixelGuard {
                guard: Some(guard),
            }),
            Err(TryLockError::Poisoned(poisoned)) => Some(PixelGuard {
                guard: Some(poisoned.into_inner()),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Whether this partition can serve an image of the given size
    pub fn covers(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

impl std::fmt::Debug for ImageMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageMutex")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("tile_size", &self.tile_size)
            .field("tiles", &self.tiles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_tile_layout() {
        let mutex = ImageMutex::new(20, 10, 8);
        // 3 x 2 tiles
        assert_eq!(mutex.tile_count(), 6);
        assert_eq!(mutex.tile_index(0, 0), 0);
        assert_eq!(mutex.tile_index(19, 9), 5);
        assert_eq!(mutex.tile_index(500, 500), 5);
        assert!(mutex.covers(20, 10));
        assert!(!mutex.covers(21, 10));
    }

    #[test]
    fn test_same_tile_excludes() {
        let mutex = ImageMutex::new(32, 32, 8);
        let guard = mutex.lock(0, 0);
        assert!(guard.is_held());
        assert!(mutex.try_lock(7, 7).is_none());
        assert!(mutex.try_lock(8, 0).is_some());
        drop(guard);
        assert!(mutex.try_lock(7, 7).is_some());
    }

    #[test]
    fn test_unlocked_guard_holds_nothing() {
        assert!(!PixelGuard::unlocked().is_held());
    }

    #[test]
    fn test_lock_serializes_threads() {
        let mutex = Arc::new(ImageMutex::new(16, 16, 4));
        let counter = Arc::new(AtomicU32::new(0));
        let in_section = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mutex = Arc::clone(&mutex);
                let counter = Arc::clone(&counter);
                let in_section = Arc::clone(&in_section);
                thread::spawn(move || {
                    for _ in 0..200 {
                        // Every pixel below lives in tile (0, 0)
                        let _guard = mutex.lock(i % 4, 3);
                        assert!(!in_section.swap(true, Ordering::SeqCst));
                        counter.fetch_add(1, Ordering::Relaxed);
                        in_section.store(false, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1600);
    }
}
