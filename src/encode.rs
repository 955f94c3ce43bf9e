//! Bitmap file writer.

use std::{io, mem};

use crate::{
    bitmap::Bitmap,
    error::{Error, ErrorKind, Result},
    file::{BitmapFileHeader, BitmapInfoHeader, ChannelMasks, Compression},
};

/// 72 DPI.
const PIXELS_PER_METER: u32 = 2835;

/// Pixel formats that [`Bitmap::encode`] can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Format {
    /// 24-bit BGR with a plain 40-byte info header. Alpha is discarded.
    Bgr24,
    /// 32-bit BGRA, described by channel masks in a 56-byte (V3) info header.
    Bgra32,
}

impl Format {
    fn bits_per_pixel(self) -> u16 {
        match self {
            Format::Bgr24 => 24,
            Format::Bgra32 => 32,
        }
    }
}

impl Bitmap {
    /// Encodes this bitmap as a complete, bottom-up bitmap file.
    ///
    /// Fails if the dimensions or the resulting file size do not fit the 32-bit header fields.
    pub fn encode(&self, format: Format) -> Result<Vec<u8>> {
        let too_large = || {
            Error::new(
                ErrorKind::Unsupported,
                format!(
                    "{}x{} bitmap is too large to encode",
                    self.width(),
                    self.height()
                ),
            )
        };

        let width = i32::try_from(self.width()).map_err(|_| too_large())?;
        let height = i32::try_from(self.height()).map_err(|_| too_large())?;
        let bpp = format.bits_per_pixel();

        let stride = (u64::from(self.width()) * u64::from(bpp) + 31) / 32 * 4;
        let image_size = u32::try_from(stride * u64::from(self.height())).map_err(|_| too_large())?;

        // The V3 header is the 40-byte header followed by all four channel masks.
        let (compression, header_size, masks) = match format {
            Format::Bgr24 => (Compression::RGB, 40, None),
            Format::Bgra32 => (
                Compression::BITFIELDS,
                56,
                Some(ChannelMasks {
                    alpha: 0xff00_0000,
                    ..ChannelMasks::default_for(32)
                }),
            ),
        };
        let info_header = BitmapInfoHeader::new(width, height, bpp, compression)
            .with_header_size(header_size)
            .with_image_size(image_size)
            .with_density(PIXELS_PER_METER, PIXELS_PER_METER);

        let pixel_offset = (mem::size_of::<BitmapFileHeader>() as u32) + info_header.header_size();
        let file_size = pixel_offset.checked_add(image_size).ok_or_else(too_large)?;
        let file_header = BitmapFileHeader::new(file_size, pixel_offset);

        let mut out = Vec::with_capacity(file_size as usize);
        out.extend_from_slice(bytemuck::bytes_of(&file_header));
        out.extend_from_slice(bytemuck::bytes_of(&info_header));
        if let Some(masks) = masks {
            for mask in [masks.red, masks.green, masks.blue, masks.alpha] {
                out.extend_from_slice(&mask.to_le_bytes());
            }
        }

        let padding = stride as usize - self.width() as usize * usize::from(bpp / 8);
        let row_len = self.width() as usize * 4;
        for row in self.pixels().chunks_exact(row_len).rev() {
            for rgba in row.chunks_exact(4) {
                match format {
                    Format::Bgr24 => out.extend_from_slice(&[rgba[2], rgba[1], rgba[0]]),
                    Format::Bgra32 => out.extend_from_slice(&[rgba[2], rgba[1], rgba[0], rgba[3]]),
                }
            }
            out.extend(std::iter::repeat(0).take(padding));
        }

        debug_assert_eq!(out.len(), file_size as usize);
        Ok(out)
    }

    /// Encodes this bitmap and writes the file to `writer`.
    pub fn write_to<W: io::Write>(&self, mut writer: W, format: Format) -> io::Result<()> {
        let bytes = self
            .encode(format)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        writer.write_all(&bytes)
    }
}
