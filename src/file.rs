//! BMP file parser.
//!
//! All multi-byte values in a BMP file are little-endian. A file starts with a 14-byte
//! [`BitmapFileHeader`], followed by a [`BitmapInfoHeader`] (or one of its larger successors, which
//! all start with the same 40 bytes), optional channel masks, an optional color table, and finally
//! the pixel array at the offset given in the file header.

#[cfg(test)]
mod tests;

use std::{fmt, mem};

use bytemuck::{AnyBitPattern, Pod, Zeroable};

use crate::error::{Error, ErrorKind, Result};

/// The two bytes every bitmap file starts with.
pub const SIGNATURE: [u8; 2] = *b"BM";

const _: () = assert!(mem::size_of::<BitmapFileHeader>() == 14);
const _: () = assert!(mem::size_of::<BitmapInfoHeader>() == 40);

/// The leading record of every bitmap file.
///
/// This is a direct view of the on-disk bytes, so it can be cast from and to a byte slice with
/// [`bytemuck`].
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct BitmapFileHeader {
    file_type: [u8; 2],
    file_size: [u8; 4],
    reserved1: [u8; 2],
    reserved2: [u8; 2],
    pixel_offset: [u8; 4],
}

impl BitmapFileHeader {
    /// Creates a file header with the `BM` signature and zeroed reserved fields.
    pub fn new(file_size: u32, pixel_offset: u32) -> Self {
        Self {
            file_type: SIGNATURE,
            file_size: file_size.to_le_bytes(),
            reserved1: [0; 2],
            reserved2: [0; 2],
            pixel_offset: pixel_offset.to_le_bytes(),
        }
    }

    /// Returns the type tag. Valid bitmap files contain [`SIGNATURE`] here.
    #[inline]
    pub fn file_type(&self) -> [u8; 2] {
        self.file_type
    }

    /// Returns the total size of the file in bytes, as declared by the file.
    #[inline]
    pub fn file_size(&self) -> u32 {
        u32::from_le_bytes(self.file_size)
    }

    #[inline]
    pub fn reserved1(&self) -> u16 {
        u16::from_le_bytes(self.reserved1)
    }

    #[inline]
    pub fn reserved2(&self) -> u16 {
        u16::from_le_bytes(self.reserved2)
    }

    /// Returns the offset of the pixel array from the start of the file.
    #[inline]
    pub fn pixel_offset(&self) -> u32 {
        u32::from_le_bytes(self.pixel_offset)
    }
}

impl fmt::Debug for BitmapFileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapFileHeader")
            .field(
                "file_type",
                &format_args!("\"{}\"", self.file_type.escape_ascii()),
            )
            .field("file_size", &self.file_size())
            .field("reserved1", &self.reserved1())
            .field("reserved2", &self.reserved2())
            .field("pixel_offset", &self.pixel_offset())
            .finish()
    }
}

/// The record describing image geometry and pixel encoding.
///
/// Newer header versions (V2 to V5) extend this record. Their first 40 bytes are identical to it,
/// and [`BitmapInfoHeader::header_size`] tells them apart.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct BitmapInfoHeader {
    header_size: [u8; 4],
    width: [u8; 4],
    height: [u8; 4],
    planes: [u8; 2],
    bits_per_pixel: [u8; 2],
    compression: [u8; 4],
    image_size: [u8; 4],
    x_pels_per_meter: [u8; 4],
    y_pels_per_meter: [u8; 4],
    colors_used: [u8; 4],
    colors_important: [u8; 4],
}

impl BitmapInfoHeader {
    /// Creates a 40-byte info header with a single plane and all optional fields zeroed.
    pub fn new(width: i32, height: i32, bits_per_pixel: u16, compression: Compression) -> Self {
        Self {
            header_size: 40u32.to_le_bytes(),
            width: width.to_le_bytes(),
            height: height.to_le_bytes(),
            planes: 1u16.to_le_bytes(),
            bits_per_pixel: bits_per_pixel.to_le_bytes(),
            compression: compression.0.to_le_bytes(),
            image_size: [0; 4],
            x_pels_per_meter: [0; 4],
            y_pels_per_meter: [0; 4],
            colors_used: [0; 4],
            colors_important: [0; 4],
        }
    }

    /// Sets the declared header size.
    ///
    /// Sizes above 40 announce a V2+ header. The caller is responsible for writing the extra bytes
    /// right after this record.
    pub fn with_header_size(mut self, size: u32) -> Self {
        self.header_size = size.to_le_bytes();
        self
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size.to_le_bytes();
        self
    }

    /// Sets the horizontal and vertical resolution, in pixels per meter.
    pub fn with_density(mut self, x: u32, y: u32) -> Self {
        self.x_pels_per_meter = x.to_le_bytes();
        self.y_pels_per_meter = y.to_le_bytes();
        self
    }

    pub fn with_colors(mut self, used: u32, important: u32) -> Self {
        self.colors_used = used.to_le_bytes();
        self.colors_important = important.to_le_bytes();
        self
    }

    #[inline]
    pub fn header_size(&self) -> u32 {
        u32::from_le_bytes(self.header_size)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        i32::from_le_bytes(self.width)
    }

    /// Returns the image height.
    ///
    /// Positive heights denote a bottom-up pixel array (the first row in the file is the bottom
    /// row of the image), negative heights a top-down one.
    #[inline]
    pub fn height(&self) -> i32 {
        i32::from_le_bytes(self.height)
    }

    #[inline]
    pub fn planes(&self) -> u16 {
        u16::from_le_bytes(self.planes)
    }

    #[inline]
    pub fn bits_per_pixel(&self) -> u16 {
        u16::from_le_bytes(self.bits_per_pixel)
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        Compression(u32::from_le_bytes(self.compression))
    }

    /// Returns the size of the pixel array in bytes. May be 0 for uncompressed images.
    #[inline]
    pub fn image_size(&self) -> u32 {
        u32::from_le_bytes(self.image_size)
    }

    #[inline]
    pub fn x_pels_per_meter(&self) -> u32 {
        u32::from_le_bytes(self.x_pels_per_meter)
    }

    #[inline]
    pub fn y_pels_per_meter(&self) -> u32 {
        u32::from_le_bytes(self.y_pels_per_meter)
    }

    /// Returns the number of color table entries. 0 means "as many as the bit depth allows".
    #[inline]
    pub fn colors_used(&self) -> u32 {
        u32::from_le_bytes(self.colors_used)
    }

    #[inline]
    pub fn colors_important(&self) -> u32 {
        u32::from_le_bytes(self.colors_important)
    }
}

impl fmt::Debug for BitmapInfoHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapInfoHeader")
            .field("header_size", &self.header_size())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("planes", &self.planes())
            .field("bits_per_pixel", &self.bits_per_pixel())
            .field("compression", &self.compression())
            .field("image_size", &self.image_size())
            .field("x_pels_per_meter", &self.x_pels_per_meter())
            .field("y_pels_per_meter", &self.y_pels_per_meter())
            .field("colors_used", &self.colors_used())
            .field("colors_important", &self.colors_important())
            .finish()
    }
}

/// The compression scheme identifier stored in the info header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Compression(pub u32);

impl Compression {
    /// Uncompressed pixels.
    pub const RGB: Self = Self(0);
    /// Run-length encoding with 8-bit indices.
    pub const RLE8: Self = Self(1);
    /// Run-length encoding with 4-bit indices.
    pub const RLE4: Self = Self(2);
    /// Uncompressed pixels whose channels are located by bit masks.
    pub const BITFIELDS: Self = Self(3);
    /// An embedded JPEG image.
    pub const JPEG: Self = Self(4);
    /// An embedded PNG image.
    pub const PNG: Self = Self(5);
    /// Like [`Compression::BITFIELDS`], with an additional alpha mask.
    pub const ALPHA_BITFIELDS: Self = Self(6);
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RGB => f.write_str("RGB"),
            Self::RLE8 => f.write_str("RLE8"),
            Self::RLE4 => f.write_str("RLE4"),
            Self::BITFIELDS => f.write_str("BITFIELDS"),
            Self::JPEG => f.write_str("JPEG"),
            Self::PNG => f.write_str("PNG"),
            Self::ALPHA_BITFIELDS => f.write_str("ALPHA_BITFIELDS"),
            _ => f
                .debug_tuple("Compression")
                .field(&format_args!("{:x}", self.0))
                .finish(),
        }
    }
}

/// Bit masks locating the color channels within a 16 or 32-bit pixel.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    /// 0 if the pixels have no alpha channel.
    pub alpha: u32,
}

impl ChannelMasks {
    /// The masks implied by uncompressed 16 (5-5-5) and 32 (8-8-8, no alpha) bit pixels.
    pub fn default_for(bits_per_pixel: u16) -> Self {
        match bits_per_pixel {
            16 => Self {
                red: 0x7c00,
                green: 0x03e0,
                blue: 0x001f,
                alpha: 0,
            },
            32 => Self {
                red: 0x00ff_0000,
                green: 0x0000_ff00,
                blue: 0x0000_00ff,
                alpha: 0,
            },
            _ => Self {
                red: 0,
                green: 0,
                blue: 0,
                alpha: 0,
            },
        }
    }

    fn validated(self, bits_per_pixel: u16) -> Result<Self> {
        for (name, mask) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if bits_per_pixel < 32 && mask >> bits_per_pixel != 0 {
                return Err(Error::new(
                    ErrorKind::Malformed,
                    format!("{name} channel mask {mask:#010x} exceeds {bits_per_pixel} bits per pixel"),
                ));
            }
            let shifted = mask.checked_shr(mask.trailing_zeros()).unwrap_or(0);
            if shifted & shifted.wrapping_add(1) != 0 {
                return Err(Error::new(
                    ErrorKind::Malformed,
                    format!("{name} channel mask {mask:#010x} is not contiguous"),
                ));
            }
        }
        Ok(self)
    }
}

impl fmt::Debug for ChannelMasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelMasks")
            .field("red", &format_args!("{:#010x}", self.red))
            .field("green", &format_args!("{:#010x}", self.green))
            .field("blue", &format_args!("{:#010x}", self.blue))
            .field("alpha", &format_args!("{:#010x}", self.alpha))
            .finish()
    }
}

/// A color table entry, stored as `[blue, green, red, reserved]`.
#[derive(Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ColorTableEntry {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub reserved: u8,
}

impl ColorTableEntry {
    /// Returns the color as opaque RGBA.
    #[inline]
    pub fn rgba(&self) -> [u8; 4] {
        [self.red, self.green, self.blue, 0xff]
    }
}

impl fmt::Debug for ColorTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// A validated, in-memory bitmap file.
///
/// [`BmpFile::parse`] checks every size and offset declared by the headers against the input, so
/// all accessors are infallible and the pixel array is guaranteed to be complete.
pub struct BmpFile<'a> {
    file_header: &'a BitmapFileHeader,
    info_header: &'a BitmapInfoHeader,
    masks: ChannelMasks,
    color_table: &'a [ColorTableEntry],
    pixel_data: &'a [u8],
    stride: usize,
}

impl<'a> BmpFile<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if let Some(tag) = buf.get(..2) {
            if tag != SIGNATURE {
                return Err(Error::new(
                    ErrorKind::NotBitmap,
                    format!("missing `BM` signature (found \"{}\")", tag.escape_ascii()),
                ));
            }
        }

        let mut reader = Reader { buf, position: 0 };
        let file_header: &BitmapFileHeader = reader.read_obj()?;

        let file_size = u64::from(file_header.file_size());
        let actual_size = buf.len() as u64;
        if file_size > actual_size {
            return Err(Error::new(
                ErrorKind::Truncated,
                format!("file header declares {file_size} bytes, but only {actual_size} are present"),
            ));
        }
        if file_size != 0 && file_size < actual_size {
            log::warn!(
                "ignoring {} trailing bytes after the declared file size of {}",
                actual_size - file_size,
                file_size,
            );
        }
        if file_header.reserved1() != 0 || file_header.reserved2() != 0 {
            log::warn!(
                "reserved file header fields are non-zero ({:#06x}, {:#06x})",
                file_header.reserved1(),
                file_header.reserved2(),
            );
        }

        let header_size = reader.peek_u32()?;
        match header_size {
            40 | 52 | 56 | 108 | 124 => {}
            12 => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "OS/2 core headers are not supported",
                ))
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::Malformed,
                    format!("invalid info header size {header_size}"),
                ))
            }
        }
        let header_bytes = reader.read_slice(header_size as usize)?;
        let (info_header, extension) = header_bytes.split_at(mem::size_of::<BitmapInfoHeader>());
        let info_header: &BitmapInfoHeader = bytemuck::from_bytes(info_header);

        let width = info_header.width();
        let height = info_header.height();
        if width <= 0 {
            return Err(Error::new(
                ErrorKind::Malformed,
                format!("invalid image width {width}"),
            ));
        }
        if height == 0 {
            return Err(Error::new(
                ErrorKind::Malformed,
                format!("invalid image height {height}"),
            ));
        }
        if info_header.planes() != 1 {
            return Err(Error::new(
                ErrorKind::Malformed,
                format!("invalid plane count {} (must be 1)", info_header.planes()),
            ));
        }

        let bpp = info_header.bits_per_pixel();
        if !matches!(bpp, 1 | 4 | 8 | 16 | 24 | 32) {
            return Err(Error::new(
                ErrorKind::Unsupported,
                format!("{bpp} bits per pixel are not supported"),
            ));
        }

        let compression = info_header.compression();
        let masks = match compression {
            Compression::RGB => ChannelMasks::default_for(bpp),
            Compression::BITFIELDS | Compression::ALPHA_BITFIELDS if matches!(bpp, 16 | 32) => {
                let with_alpha = compression == Compression::ALPHA_BITFIELDS;
                let masks = if header_size >= 52 {
                    // V2+ headers store the masks themselves.
                    let mut ext = Reader {
                        buf: extension,
                        position: 0,
                    };
                    ChannelMasks {
                        red: ext.read_u32()?,
                        green: ext.read_u32()?,
                        blue: ext.read_u32()?,
                        alpha: if header_size >= 56 { ext.read_u32()? } else { 0 },
                    }
                } else {
                    ChannelMasks {
                        red: reader.read_u32()?,
                        green: reader.read_u32()?,
                        blue: reader.read_u32()?,
                        alpha: if with_alpha { reader.read_u32()? } else { 0 },
                    }
                };
                masks.validated(bpp)?
            }
            _ => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    format!("compression {compression:?} is not supported at {bpp} bits per pixel"),
                ))
            }
        };

        let color_table = if bpp <= 8 {
            let max = 1u32 << bpp;
            let count = match info_header.colors_used() {
                0 => max,
                n if n <= max => n,
                n => {
                    return Err(Error::new(
                        ErrorKind::Malformed,
                        format!("color table with {n} entries exceeds the {max} colors allowed at {bpp} bits per pixel"),
                    ))
                }
            };
            reader.read_objs(count as usize)?
        } else {
            &[]
        };

        let headers_end = reader.position;
        let pixel_offset = file_header.pixel_offset() as usize;
        if pixel_offset < headers_end {
            return Err(Error::new(
                ErrorKind::Malformed,
                format!("pixel data offset {pixel_offset} overlaps the headers, which end at {headers_end}"),
            ));
        }

        // Rows are padded to a multiple of 4 bytes.
        let stride = (u64::from(width.unsigned_abs()) * u64::from(bpp) + 31) / 32 * 4;
        let Some(len) = stride.checked_mul(u64::from(height.unsigned_abs())) else {
            return Err(Error::new(
                ErrorKind::Unsupported,
                format!("image dimensions {width}x{height} are too large"),
            ));
        };
        if pixel_offset as u64 + len > actual_size {
            return Err(Error::new(
                ErrorKind::Truncated,
                format!("pixel array needs {len} bytes at offset {pixel_offset}, but the data is only {actual_size} bytes long"),
            ));
        }
        // Fits in the input buffer, so it also fits in `usize`.
        let len = len as usize;
        let stride = stride as usize;

        let image_size = info_header.image_size();
        if image_size != 0 && image_size as usize != len {
            log::warn!(
                "info header declares an image size of {} bytes, but the pixel array has {} bytes",
                image_size,
                len,
            );
        }

        log::debug!(
            "{}x{} bitmap, {} bpp, compression {:?}, {} color table entries, stride {}",
            width,
            height,
            bpp,
            compression,
            color_table.len(),
            stride,
        );

        Ok(Self {
            file_header,
            info_header,
            masks,
            color_table,
            pixel_data: &buf[pixel_offset..][..len],
            stride,
        })
    }

    #[inline]
    pub fn file_header(&self) -> &'a BitmapFileHeader {
        self.file_header
    }

    #[inline]
    pub fn info_header(&self) -> &'a BitmapInfoHeader {
        self.info_header
    }

    /// Returns the channel masks used for 16 and 32-bit pixels.
    #[inline]
    pub fn masks(&self) -> ChannelMasks {
        self.masks
    }

    /// Returns the color table. It is empty unless the image uses 8 or fewer bits per pixel.
    #[inline]
    pub fn color_table(&self) -> &'a [ColorTableEntry] {
        self.color_table
    }

    /// Returns the pixel array, including row padding, in file order.
    #[inline]
    pub fn pixel_data(&self) -> &'a [u8] {
        self.pixel_data
    }

    /// Returns the number of bytes per row in the pixel array.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.info_header.width().unsigned_abs()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.info_header.height().unsigned_abs()
    }

    /// Returns whether the first row of the pixel array is the top row of the image.
    #[inline]
    pub fn is_top_down(&self) -> bool {
        self.info_header.height() < 0
    }

    /// Returns the pixel array row that holds image row `y` (counted from the top).
    pub(crate) fn row(&self, y: u32) -> &'a [u8] {
        let index = if self.is_top_down() {
            y
        } else {
            self.height() - 1 - y
        };
        &self.pixel_data[index as usize * self.stride..][..self.stride]
    }
}

impl<'a> fmt::Debug for BmpFile<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BmpFile")
            .field("file_header", &self.file_header)
            .field("info_header", &self.info_header)
            .field("masks", &self.masks)
            .field("color_table", &self.color_table)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Reader<'a> {
    buf: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.position..]
    }

    fn peek_u32(&self) -> Result<u32> {
        match self.remaining().get(..4) {
            Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            None => Err(Error::truncated()),
        }
    }

    fn read_u32(&mut self) -> Result<u32> {
        let value = self.peek_u32()?;
        self.position += 4;
        Ok(value)
    }

    fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining().len() < count {
            Err(Error::truncated())
        } else {
            let slice = &self.remaining()[..count];
            self.position += count;
            Ok(slice)
        }
    }

    fn read_obj<T: AnyBitPattern>(&mut self) -> Result<&'a T> {
        assert_eq!(mem::align_of::<T>(), 1);

        let bytes = self.read_slice(mem::size_of::<T>())?;
        Ok(bytemuck::from_bytes(bytes))
    }

    fn read_objs<T: AnyBitPattern>(&mut self, count: usize) -> Result<&'a [T]> {
        assert_eq!(mem::align_of::<T>(), 1);

        let byte_count = count
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(Error::truncated)?;
        let bytes = self.read_slice(byte_count)?;
        Ok(bytemuck::cast_slice(bytes))
    }
}
