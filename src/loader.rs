use std::{
    fs,
    path::Path,
    time::{Duration, Instant},
};

use crate::{
    bitmap::Bitmap,
    decode,
    error::{Error, ErrorKind, Result},
    file::BmpFile,
    surface::Surface,
};

/// Upper bounds on the files a [`BitmapLoader`] accepts.
///
/// Files exceeding any of these are rejected with [`ErrorKind::Unsupported`] before any pixel data
/// is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_width: u32,
    pub max_height: u32,
    /// Maximum size of the file on disk, in bytes.
    pub max_file_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_width: 16384,
            max_height: 16384,
            max_file_size: 256 * 1024 * 1024,
        }
    }
}

impl Limits {
    fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if width > self.max_width || height > self.max_height {
            return Err(Error::new(
                ErrorKind::Unsupported,
                format!(
                    "{width}x{height} bitmap exceeds the configured limit of {}x{}",
                    self.max_width, self.max_height,
                ),
            ));
        }
        Ok(())
    }

    fn check_file_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(Error::new(
                ErrorKind::Unsupported,
                format!(
                    "file of {size} bytes exceeds the configured limit of {} bytes",
                    self.max_file_size,
                ),
            ));
        }
        Ok(())
    }
}

/// Loads bitmap files into [`Surface`]s.
///
/// Loading either replaces the surface contents completely or leaves the surface untouched: the
/// file is read and decoded in full before the surface is modified.
#[derive(Debug, Clone, Default)]
pub struct BitmapLoader {
    limits: Limits,
}

impl BitmapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Loads the bitmap at `path` into `surface`, returning whether that succeeded.
    ///
    /// Failures are logged. Use [`BitmapLoader::try_load_bitmap_into_surface`] to find out why
    /// loading failed.
    pub fn load_bitmap_into_surface<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        path: impl AsRef<Path>,
    ) -> bool {
        let path = path.as_ref();
        match self.try_load_bitmap_into_surface(surface, path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to load bitmap '{}': {}", path.display(), e);
                false
            }
        }
    }

    /// Loads the bitmap at `path` into `surface`.
    ///
    /// On error, `surface` is left unchanged.
    pub fn try_load_bitmap_into_surface<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        if !surface.is_valid() {
            return Err(Error::new(ErrorKind::InvalidSurface, "surface is not valid"));
        }

        let (data, t_read) = time(|| self.read_file(path));
        let data = data?;
        let (bitmap, t_decode) = time(|| self.decode(&data));
        let bitmap = bitmap?;
        drop(data);

        let (width, height) = bitmap.dimensions();
        let (res, t_select) = time(|| surface.select_bitmap(bitmap));
        res?;

        log::trace!(
            "loaded {}x{} bitmap from '{}': t_read={t_read:?}, t_decode={t_decode:?}, t_select={t_select:?}",
            width,
            height,
            path.display(),
        );
        Ok(())
    }

    /// Reads and decodes the bitmap at `path`.
    pub fn read_bitmap(&self, path: impl AsRef<Path>) -> Result<Bitmap> {
        let data = self.read_file(path.as_ref())?;
        self.decode(&data)
    }

    /// Decodes an in-memory bitmap file.
    pub fn decode(&self, data: &[u8]) -> Result<Bitmap> {
        let file = BmpFile::parse(data)?;
        self.limits.check_dimensions(file.width(), file.height())?;
        decode::decode(&file)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        self.limits.check_file_size(metadata.len())?;
        fs::read(path).map_err(|e| Error::io(path, e))
    }
}

impl Bitmap {
    /// Decodes an in-memory bitmap file with the default [`Limits`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        BitmapLoader::new().decode(data)
    }
}

/// Loads the bitmap at `path` into `surface` with a default [`BitmapLoader`].
///
/// Returns `false` if the file cannot be read, is not a valid or supported bitmap, or if the surface
/// cannot accept it. In that case the surface is left unchanged.
pub fn load_bitmap_into_surface<S: Surface + ?Sized>(
    surface: &mut S,
    path: impl AsRef<Path>,
) -> bool {
    BitmapLoader::new().load_bitmap_into_surface(surface, path)
}

fn time<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let res = f();
    (res, start.elapsed())
}
