//! Conversion of pixel arrays into RGBA8 [`Bitmap`]s.

use crate::{
    bitmap::Bitmap,
    error::{Error, ErrorKind, Result},
    file::{BmpFile, ChannelMasks},
};

pub(crate) fn decode(file: &BmpFile<'_>) -> Result<Bitmap> {
    let width = file.width();
    let height = file.height();
    let bpp = file.info_header().bits_per_pixel();

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let row = file.row(y);
        match bpp {
            1 | 4 | 8 => decode_indexed_row(file, row, width, bpp, &mut pixels)?,
            24 => {
                for bgr in row.chunks_exact(3).take(width as usize) {
                    pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0], 0xff]);
                }
            }
            16 | 32 => decode_masked_row(file.masks(), row, width, bpp, &mut pixels),
            _ => {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    format!("{bpp} bits per pixel are not supported"),
                ))
            }
        }
    }

    Bitmap::from_rgba8(width, height, pixels)
}

fn decode_indexed_row(
    file: &BmpFile<'_>,
    row: &[u8],
    width: u32,
    bpp: u16,
    out: &mut Vec<u8>,
) -> Result<()> {
    let table = file.color_table();
    let per_byte = 8 / usize::from(bpp);
    let index_mask = (0xffu16 >> (8 - bpp)) as u8;

    for x in 0..width as usize {
        // The leftmost pixel occupies the most significant bits.
        let shift = 8 - usize::from(bpp) * (x % per_byte + 1);
        let index = (row[x / per_byte] >> shift) & index_mask;
        let Some(entry) = table.get(usize::from(index)) else {
            return Err(Error::new(
                ErrorKind::Malformed,
                format!(
                    "color index {index} is out of range for a table with {} entries",
                    table.len()
                ),
            ));
        };
        out.extend_from_slice(&entry.rgba());
    }
    Ok(())
}

fn decode_masked_row(masks: ChannelMasks, row: &[u8], width: u32, bpp: u16, out: &mut Vec<u8>) {
    let red = Channel::new(masks.red);
    let green = Channel::new(masks.green);
    let blue = Channel::new(masks.blue);
    let alpha = Channel::new(masks.alpha);

    let bytes_per_pixel = usize::from(bpp / 8);
    for raw in row.chunks_exact(bytes_per_pixel).take(width as usize) {
        let pixel = match *raw {
            [a, b] => u32::from(u16::from_le_bytes([a, b])),
            [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
            _ => unreachable!(),
        };
        out.extend_from_slice(&[
            red.map_or(0, |c| c.extract(pixel)),
            green.map_or(0, |c| c.extract(pixel)),
            blue.map_or(0, |c| c.extract(pixel)),
            alpha.map_or(0xff, |c| c.extract(pixel)),
        ]);
    }
}

/// A contiguous run of bits holding one color channel.
#[derive(Clone, Copy)]
struct Channel {
    mask: u32,
    shift: u32,
    max: u64,
}

impl Channel {
    fn new(mask: u32) -> Option<Self> {
        if mask == 0 {
            return None;
        }
        let shift = mask.trailing_zeros();
        let bits = (mask >> shift).count_ones();
        Some(Self {
            mask,
            shift,
            max: (1u64 << bits) - 1,
        })
    }

    /// Extracts the channel from `pixel`, scaled to the range `0..=255`.
    fn extract(&self, pixel: u32) -> u8 {
        let value = u64::from((pixel & self.mask) >> self.shift);
        ((value * 255 + self.max / 2) / self.max) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_scaling() {
        let five = Channel::new(0x7c00).unwrap();
        assert_eq!(five.extract(0x0000), 0);
        assert_eq!(five.extract(0x7c00), 255);
        assert_eq!(five.extract(0x4000), 132);

        let eight = Channel::new(0xff00).unwrap();
        for value in [0u32, 1, 127, 128, 254, 255] {
            assert_eq!(eight.extract(value << 8), value as u8);
        }

        let one = Channel::new(0x8000_0000).unwrap();
        assert_eq!(one.extract(0x8000_0000), 255);
        assert_eq!(one.extract(0x7fff_ffff), 0);

        assert!(Channel::new(0).is_none());
    }
}
