use std::{env, process, sync::Arc};

use anyhow::anyhow;
use bmpload::{BitmapLoader, Gpu, Surface, TextureSurface};
use wgpu::InstanceDescriptor;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    window::WindowBuilder,
};

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module(env!("CARGO_PKG_NAME"), log::LevelFilter::Trace)
        .parse_default_env()
        .init();

    let path = match &*env::args().skip(1).collect::<Vec<_>>() {
        [path] => path.clone(),
        _ => {
            eprintln!("usage: viewer <file.bmp>");
            process::exit(1);
        }
    };

    let loader = BitmapLoader::new();
    let bitmap = loader.read_bitmap(&path)?;
    let (width, height) = bitmap.dimensions();

    let ev = EventLoop::new()?;
    let win = WindowBuilder::new()
        .with_title(format!("{path} ({width}x{height})"))
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&ev)?;

    let instance = wgpu::Instance::new(InstanceDescriptor::default());
    let surface = unsafe { instance.create_surface(&win)? };
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        compatible_surface: Some(&surface),
        ..Default::default()
    }))
    .ok_or_else(|| anyhow!("no compatible graphics adapter found"))?;
    let (device, queue) =
        pollster::block_on(adapter.request_device(&Gpu::device_descriptor(), None))?;
    let (device, queue) = (Arc::new(device), Arc::new(queue));

    // Bitmaps are uploaded as RGBA, and texture copies cannot convert formats.
    let format = surface
        .get_capabilities(&adapter)
        .formats
        .into_iter()
        .find(|f| f.remove_srgb_suffix() == wgpu::TextureFormat::Rgba8Unorm)
        .ok_or_else(|| anyhow!("window surface does not support an RGBA8 format"))?;
    let size = win.inner_size();
    let mut conf = surface
        .get_default_config(&adapter, size.width, size.height)
        .expect("incompatible surface, despite requiring one");
    conf.format = format;
    conf.usage |= wgpu::TextureUsages::COPY_DST;
    surface.configure(&device, &conf);

    let gpu = Arc::new(Gpu::from_wgpu(device.clone(), queue.clone()));
    let mut texture = TextureSurface::new(gpu, "viewer", wgpu::TextureUsages::COPY_SRC);
    texture.select_bitmap(bitmap)?;

    ev.run(move |event, target| match event {
        Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } => {
            let st = loop {
                match surface.get_current_texture() {
                    Ok(tex) => break tex,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(&device, &conf);
                    }
                    Err(e) => {
                        eprintln!("fatal error: {e}");
                        process::exit(1);
                    }
                }
            };

            let Some(src) = texture.texture() else {
                return;
            };
            let copy_size = wgpu::Extent3d {
                width: src.width().min(st.texture.width()),
                height: src.height().min(st.texture.height()),
                depth_or_array_layers: 1,
            };
            let mut enc = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
            enc.copy_texture_to_texture(src.as_image_copy(), st.texture.as_image_copy(), copy_size);
            queue.submit([enc.finish()]);

            st.present();
        }
        Event::WindowEvent {
            event: WindowEvent::Resized(size),
            ..
        } => {
            if size.width > 0 && size.height > 0 {
                conf.width = size.width;
                conf.height = size.height;
                surface.configure(&device, &conf);
                win.request_redraw();
            }
        }
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => target.exit(),
        _ => {}
    })?;

    Ok(())
}
