use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
};

use anyhow::{bail, ensure};
use bmpload::{Bitmap, Format};

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Trace)
        .parse_default_env()
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();

    let [infile, outfile, rest @ ..] = &*args else {
        bail!("usage: png2bmp <infile.png> <outfile.bmp> [--alpha]")
    };
    let format = match rest {
        [] => Format::Bgr24,
        [flag] if flag == "--alpha" => Format::Bgra32,
        _ => bail!("usage: png2bmp <infile.png> <outfile.bmp> [--alpha]"),
    };

    let infile = File::open(infile)?;
    let png = png::Decoder::new(infile);
    let mut reader = png.read_info()?;

    ensure!(reader.info().bit_depth == png::BitDepth::Eight);

    let width = reader.info().width;
    let height = reader.info().height;
    let color_type = reader.info().color_type;
    let mut buf = vec![0; reader.output_buffer_size()];
    reader.next_frame(&mut buf)?;

    let rgba = match color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 0xff])
            .collect(),
        other => bail!("unsupported PNG color type {other:?} (only RGB and RGBA are supported)"),
    };

    let bitmap = Bitmap::from_rgba8(width, height, rgba)?;
    let mut outfile = BufWriter::new(File::create(outfile)?);
    bitmap.write_to(&mut outfile, format)?;
    outfile.flush()?;

    log::info!("wrote {width}x{height} bitmap as {format:?}");
    Ok(())
}
