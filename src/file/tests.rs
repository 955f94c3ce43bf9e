use std::fmt::Write;

use expect_test::{expect, Expect};

use super::{BitmapFileHeader, BitmapInfoHeader, BmpFile, Compression};

fn dump(bmp: &[u8]) -> String {
    let file = match BmpFile::parse(bmp) {
        Ok(file) => file,
        Err(e) => return format!("error: {e}\n"),
    };

    let mut out = String::new();
    writeln!(out, "{:?}", file.file_header()).unwrap();
    writeln!(out, "{:?}", file.info_header()).unwrap();
    writeln!(out, "{:?}", file.masks()).unwrap();
    writeln!(out, "color table: {:?}", file.color_table()).unwrap();
    writeln!(
        out,
        "pixel array: {} bytes, stride {}, {}",
        file.pixel_data().len(),
        file.stride(),
        if file.is_top_down() {
            "top-down"
        } else {
            "bottom-up"
        },
    )
    .unwrap();
    out
}

fn check(bmp: &[u8], expect: Expect) {
    expect.assert_eq(&dump(bmp));
}

/// Assembles a file from a 40-byte info header, the bytes following it (masks, color table), and
/// the pixel array.
fn build(info: BitmapInfoHeader, extra: &[u8], pixels: &[u8]) -> Vec<u8> {
    let offset = (14 + 40 + extra.len()) as u32;
    let size = offset + pixels.len() as u32;
    let mut out = Vec::new();
    out.extend_from_slice(bytemuck::bytes_of(&BitmapFileHeader::new(size, offset)));
    out.extend_from_slice(bytemuck::bytes_of(&info));
    out.extend_from_slice(extra);
    out.extend_from_slice(pixels);
    out
}

fn rgb_2x2() -> Vec<u8> {
    build(
        BitmapInfoHeader::new(2, 2, 24, Compression::RGB),
        &[],
        &[0; 16],
    )
}

#[test]
fn header_layout() {
    let file = BitmapFileHeader::new(0x0403_0201, 0x0807_0605);
    assert_eq!(
        bytemuck::bytes_of(&file),
        &[b'B', b'M', 1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8],
    );

    let info = BitmapInfoHeader::new(-2, -3, 24, Compression::BITFIELDS)
        .with_image_size(16)
        .with_density(2835, 2836)
        .with_colors(4, 5);
    let bytes = bytemuck::bytes_of(&info);
    assert_eq!(&bytes[0..4], &40u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &(-2i32).to_le_bytes());
    assert_eq!(&bytes[8..12], &(-3i32).to_le_bytes());
    assert_eq!(&bytes[12..14], &1u16.to_le_bytes());
    assert_eq!(&bytes[14..16], &24u16.to_le_bytes());
    assert_eq!(&bytes[16..20], &3u32.to_le_bytes());
    assert_eq!(&bytes[20..24], &16u32.to_le_bytes());
    assert_eq!(&bytes[24..28], &2835u32.to_le_bytes());
    assert_eq!(&bytes[28..32], &2836u32.to_le_bytes());
    assert_eq!(&bytes[32..36], &4u32.to_le_bytes());
    assert_eq!(&bytes[36..40], &5u32.to_le_bytes());
}

#[test]
fn reserved_fields_are_preserved() {
    let mut bmp = rgb_2x2();
    bmp[6..8].copy_from_slice(&0x1234u16.to_le_bytes());
    bmp[8..10].copy_from_slice(&0xabcdu16.to_le_bytes());

    let file = BmpFile::parse(&bmp).unwrap();
    assert_eq!(file.file_header().reserved1(), 0x1234);
    assert_eq!(file.file_header().reserved2(), 0xabcd);
}

#[test]
fn rgb() {
    check(
        &rgb_2x2(),
        expect![[r#"
            BitmapFileHeader { file_type: "BM", file_size: 70, reserved1: 0, reserved2: 0, pixel_offset: 54 }
            BitmapInfoHeader { header_size: 40, width: 2, height: 2, planes: 1, bits_per_pixel: 24, compression: RGB, image_size: 0, x_pels_per_meter: 0, y_pels_per_meter: 0, colors_used: 0, colors_important: 0 }
            ChannelMasks { red: 0x00000000, green: 0x00000000, blue: 0x00000000, alpha: 0x00000000 }
            color table: []
            pixel array: 16 bytes, stride 8, bottom-up
        "#]],
    );
}

#[test]
fn indexed() {
    check(
        &build(
            BitmapInfoHeader::new(3, -1, 8, Compression::RGB).with_colors(2, 0),
            &[
                0x00, 0x00, 0xff, 0x00, // red
                0xff, 0x00, 0x00, 0x00, // blue
            ],
            &[0, 1, 0, 0],
        ),
        expect![[r#"
            BitmapFileHeader { file_type: "BM", file_size: 66, reserved1: 0, reserved2: 0, pixel_offset: 62 }
            BitmapInfoHeader { header_size: 40, width: 3, height: -1, planes: 1, bits_per_pixel: 8, compression: RGB, image_size: 0, x_pels_per_meter: 0, y_pels_per_meter: 0, colors_used: 2, colors_important: 0 }
            ChannelMasks { red: 0x00000000, green: 0x00000000, blue: 0x00000000, alpha: 0x00000000 }
            color table: [#ff0000, #0000ff]
            pixel array: 4 bytes, stride 4, top-down
        "#]],
    );
}

#[test]
fn bitfields() {
    // 5-6-5 masks following a 40-byte header.
    let mut masks = Vec::new();
    for mask in [0xf800u32, 0x07e0, 0x001f] {
        masks.extend_from_slice(&mask.to_le_bytes());
    }
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 16, Compression::BITFIELDS),
            &masks,
            &[0; 4],
        ),
        expect![[r#"
            BitmapFileHeader { file_type: "BM", file_size: 70, reserved1: 0, reserved2: 0, pixel_offset: 66 }
            BitmapInfoHeader { header_size: 40, width: 1, height: 1, planes: 1, bits_per_pixel: 16, compression: BITFIELDS, image_size: 0, x_pels_per_meter: 0, y_pels_per_meter: 0, colors_used: 0, colors_important: 0 }
            ChannelMasks { red: 0x0000f800, green: 0x000007e0, blue: 0x0000001f, alpha: 0x00000000 }
            color table: []
            pixel array: 4 bytes, stride 4, bottom-up
        "#]],
    );

    // A V3 header stores all four masks itself.
    let mut masks = Vec::new();
    for mask in [0x00ff_0000u32, 0x0000_ff00, 0x0000_00ff, 0xff00_0000] {
        masks.extend_from_slice(&mask.to_le_bytes());
    }
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 32, Compression::BITFIELDS).with_header_size(56),
            &masks,
            &[0; 4],
        ),
        expect![[r#"
            BitmapFileHeader { file_type: "BM", file_size: 74, reserved1: 0, reserved2: 0, pixel_offset: 70 }
            BitmapInfoHeader { header_size: 56, width: 1, height: 1, planes: 1, bits_per_pixel: 32, compression: BITFIELDS, image_size: 0, x_pels_per_meter: 0, y_pels_per_meter: 0, colors_used: 0, colors_important: 0 }
            ChannelMasks { red: 0x00ff0000, green: 0x0000ff00, blue: 0x000000ff, alpha: 0xff000000 }
            color table: []
            pixel array: 4 bytes, stride 4, bottom-up
        "#]],
    );
}

#[test]
fn empty() {
    check(
        &[],
        expect![[r#"
            error: reached end of data while decoding bitmap
        "#]],
    );
    check(
        b"BM",
        expect![[r#"
            error: reached end of data while decoding bitmap
        "#]],
    );
    check(
        &rgb_2x2()[..14],
        expect![[r#"
            error: file header declares 70 bytes, but only 14 are present
        "#]],
    );
}

#[test]
fn signature() {
    check(
        b"XY",
        expect![[r#"
            error: missing `BM` signature (found "XY")
        "#]],
    );

    let mut bmp = rgb_2x2();
    bmp[1] = 0;
    check(
        &bmp,
        expect![[r#"
            error: missing `BM` signature (found "B\x00")
        "#]],
    );
}

#[test]
fn sizes() {
    let bmp = rgb_2x2();
    check(
        &bmp[..bmp.len() - 1],
        expect![[r#"
            error: file header declares 70 bytes, but only 69 are present
        "#]],
    );

    // Without a declared file size, the pixel array bounds are what catches truncation.
    let mut bmp = rgb_2x2();
    bmp[2..6].copy_from_slice(&0u32.to_le_bytes());
    bmp.truncate(62);
    check(
        &bmp,
        expect![[r#"
            error: pixel array needs 16 bytes at offset 54, but the data is only 62 bytes long
        "#]],
    );

    let mut bmp = rgb_2x2();
    bmp[10..14].copy_from_slice(&20u32.to_le_bytes());
    check(
        &bmp,
        expect![[r#"
            error: pixel data offset 20 overlaps the headers, which end at 54
        "#]],
    );

    // Trailing data past the declared file size is ignored.
    let mut bmp = rgb_2x2();
    bmp.extend_from_slice(&[0xAA; 3]);
    assert!(BmpFile::parse(&bmp).is_ok());
}

#[test]
fn info_header() {
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 24, Compression::RGB).with_header_size(12),
            &[],
            &[0; 16],
        ),
        expect![[r#"
            error: OS/2 core headers are not supported
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 24, Compression::RGB).with_header_size(41),
            &[],
            &[0; 16],
        ),
        expect![[r#"
            error: invalid info header size 41
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(0, 2, 24, Compression::RGB),
            &[],
            &[],
        ),
        expect![[r#"
            error: invalid image width 0
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(2, 0, 24, Compression::RGB),
            &[],
            &[],
        ),
        expect![[r#"
            error: invalid image height 0
        "#]],
    );

    let mut bmp = rgb_2x2();
    bmp[26..28].copy_from_slice(&2u16.to_le_bytes());
    check(
        &bmp,
        expect![[r#"
            error: invalid plane count 2 (must be 1)
        "#]],
    );
}

#[test]
fn unsupported() {
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 2, Compression::RGB),
            &[0; 16],
            &[0; 8],
        ),
        expect![[r#"
            error: 2 bits per pixel are not supported
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 8, Compression::RLE8),
            &[0; 1024],
            &[0; 8],
        ),
        expect![[r#"
            error: compression RLE8 is not supported at 8 bits per pixel
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 24, Compression::BITFIELDS),
            &[0; 12],
            &[0; 16],
        ),
        expect![[r#"
            error: compression BITFIELDS is not supported at 24 bits per pixel
        "#]],
    );
    check(
        &build(
            BitmapInfoHeader::new(2, 2, 24, Compression(9)),
            &[],
            &[0; 16],
        ),
        expect![[r#"
            error: compression Compression(9) is not supported at 24 bits per pixel
        "#]],
    );
}

#[test]
fn color_table() {
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 8, Compression::RGB).with_colors(300, 0),
            &[0; 1200],
            &[0; 4],
        ),
        expect![[r#"
            error: color table with 300 entries exceeds the 256 colors allowed at 8 bits per pixel
        "#]],
    );
    // `colors_used == 0` means a full table of 16 entries (64 bytes), which does not fit.
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 4, Compression::RGB),
            &[0; 8],
            &[],
        ),
        expect![[r#"
            error: reached end of data while decoding bitmap
        "#]],
    );
}

#[test]
fn masks() {
    let mut masks = Vec::new();
    for mask in [0x00ff_00ffu32, 0x0000_ff00, 0x0000_00ff] {
        masks.extend_from_slice(&mask.to_le_bytes());
    }
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 32, Compression::BITFIELDS),
            &masks,
            &[0; 4],
        ),
        expect![[r#"
            error: red channel mask 0x00ff00ff is not contiguous
        "#]],
    );

    let mut masks = Vec::new();
    for mask in [0x0001_0000u32, 0x07e0, 0x001f] {
        masks.extend_from_slice(&mask.to_le_bytes());
    }
    check(
        &build(
            BitmapInfoHeader::new(1, 1, 16, Compression::BITFIELDS),
            &masks,
            &[0; 4],
        ),
        expect![[r#"
            error: red channel mask 0x00010000 exceeds 16 bits per pixel
        "#]],
    );
}
