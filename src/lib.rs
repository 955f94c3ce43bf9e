//! Loads Windows bitmap (BMP) files into drawing surfaces.
//!
//! The main entry point is [`BitmapLoader::load_bitmap_into_surface`] (or the free function
//! [`load_bitmap_into_surface`]), which reads a file, decodes it, and selects the result into any
//! [`Surface`]. Two surfaces are provided: the in-memory [`Canvas`], and [`TextureSurface`], which
//! uploads the bitmap into a WebGPU texture.
//!
//! Uncompressed files with 1, 4, 8, 16, 24 or 32 bits per pixel are supported, including
//! `BI_BITFIELDS` channel masks and top-down row order. Run-length encoded files and embedded
//! JPEG/PNG data are rejected.

mod bitmap;
mod decode;
mod encode;
mod error;
pub mod file;
mod loader;
mod surface;
mod texture;


pub use bitmap::Bitmap;
pub use encode::Format;
pub use error::{Error, ErrorKind};
pub use loader::{load_bitmap_into_surface, BitmapLoader, Limits};
pub use surface::{Canvas, ResourceTracker, Surface};
pub use texture::{Gpu, TextureSurface};
