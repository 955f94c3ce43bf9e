//! Drawing surfaces that loaded bitmaps can be selected into.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    bitmap::Bitmap,
    error::{Error, ErrorKind, Result},
};

/// A drawable target that can display one bitmap at a time.
///
/// A surface owns the bitmap selected into it. Selecting a new bitmap releases the previous one, as
/// does dropping the surface.
pub trait Surface {
    /// Returns whether this surface can currently accept a bitmap.
    fn is_valid(&self) -> bool;

    /// Returns the dimensions of the currently selected bitmap, if any.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Replaces the surface contents with `bitmap`.
    ///
    /// On error, the previously selected bitmap must remain selected.
    fn select_bitmap(&mut self, bitmap: Bitmap) -> Result<()>;
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }

    fn select_bitmap(&mut self, bitmap: Bitmap) -> Result<()> {
        (**self).select_bitmap(bitmap)
    }
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        (**self).dimensions()
    }

    fn select_bitmap(&mut self, bitmap: Bitmap) -> Result<()> {
        (**self).select_bitmap(bitmap)
    }
}

/// Counts the bitmap resources that are currently selected into surfaces.
///
/// Cloning a [`ResourceTracker`] yields a handle to the same counter.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    live: Arc<AtomicUsize>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of resources that have been acquired, but not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn acquire(&self) -> ResourceGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        ResourceGuard {
            live: self.live.clone(),
        }
    }
}

/// Releases one tracked resource when dropped.
#[derive(Debug)]
struct ResourceGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
struct Selected {
    bitmap: Bitmap,
    _guard: Option<ResourceGuard>,
}

/// An in-memory surface.
///
/// This is useful for headless applications and tests, or as a staging area before the pixels are
/// handed to some other renderer.
#[derive(Debug)]
pub struct Canvas {
    valid: bool,
    selected: Option<Selected>,
    tracker: Option<ResourceTracker>,
}

impl Canvas {
    /// Creates a valid, empty canvas.
    pub fn new() -> Self {
        Self {
            valid: true,
            selected: None,
            tracker: None,
        }
    }

    /// Creates a valid, empty canvas that reports its selected bitmaps to `tracker`.
    pub fn with_tracker(tracker: ResourceTracker) -> Self {
        Self {
            tracker: Some(tracker),
            ..Self::new()
        }
    }

    /// Releases the selected bitmap and invalidates the canvas.
    ///
    /// Any further attempt to select a bitmap fails with [`ErrorKind::InvalidSurface`].
    pub fn release(&mut self) {
        self.selected = None;
        self.valid = false;
    }

    /// Returns the currently selected bitmap.
    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.selected.as_ref().map(|s| &s.bitmap)
    }

    /// Returns the RGBA value of the pixel at `(x, y)`.
    ///
    /// Returns [`None`] if nothing is selected or the coordinates are out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.bitmap()?.pixel(x, y)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for Canvas {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.bitmap().map(Bitmap::dimensions)
    }

    fn select_bitmap(&mut self, bitmap: Bitmap) -> Result<()> {
        if !self.valid {
            return Err(Error::new(
                ErrorKind::InvalidSurface,
                "canvas has been released",
            ));
        }

        // Replacing `selected` drops the previous bitmap and its guard.
        self.selected = Some(Selected {
            bitmap,
            _guard: self.tracker.as_ref().map(ResourceTracker::acquire),
        });
        Ok(())
    }
}
