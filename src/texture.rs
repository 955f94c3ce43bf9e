//! A [`Surface`] backed by a WebGPU texture.

use std::{borrow::Cow, sync::Arc};

use wgpu::*;

use crate::{
    bitmap::Bitmap,
    error::{Error, ErrorKind, Result},
    surface::Surface,
};

const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// An open handle to a GPU.
pub struct Gpu {
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl Gpu {
    /// Returns the [`DeviceDescriptor`] that devices passed to [`Gpu::from_wgpu`] should be
    /// created with.
    pub fn device_descriptor() -> DeviceDescriptor<'static> {
        DeviceDescriptor {
            label: Some("bmpload"),
            features: Features::empty(),
            limits: Limits::default(),
        }
    }

    pub async fn open() -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            // The OpenGL backend panics spuriously, so don't enable it.
            backends: Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidSurface, "no supported graphics adapter found")
            })?;
        let (device, queue) = adapter
            .request_device(&Self::device_descriptor(), None)
            .await
            .map_err(|_| {
                Error::new(ErrorKind::InvalidSurface, "no supported graphics device found")
            })?;

        Ok(Self::from_wgpu(device.into(), queue.into()))
    }

    pub fn from_wgpu(device: Arc<Device>, queue: Arc<Queue>) -> Self {
        Self { device, queue }
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}

/// An on-GPU [`Texture`] that holds the selected bitmap.
///
/// The texture is allocated when the first bitmap is selected, and reallocated whenever a bitmap of
/// different dimensions replaces it. Its format is always [`TextureFormat::Rgba8Unorm`].
pub struct TextureSurface {
    gpu: Arc<Gpu>,
    name: Cow<'static, str>,
    usage: TextureUsages,
    texture: Option<(Texture, TextureView)>,
    released: bool,
    /// The generation counter starts at 0 and is incremented every time the underlying [`Texture`]
    /// is (re)allocated. It can be used for change detection, e.g. to recreate [`BindGroup`]s that
    /// refer to the texture.
    generation: u64,
}

impl TextureSurface {
    /// Creates an empty surface.
    ///
    /// `usage` is added to the usages the surface needs itself (`COPY_DST`).
    pub fn new(gpu: Arc<Gpu>, name: impl Into<Cow<'static, str>>, usage: TextureUsages) -> Self {
        Self {
            gpu,
            name: name.into(),
            usage: usage | TextureUsages::COPY_DST,
            texture: None,
            released: false,
            generation: 0,
        }
    }

    /// Destroys the texture and invalidates the surface.
    pub fn release(&mut self) {
        if let Some((texture, _)) = self.texture.take() {
            texture.destroy();
        }
        self.released = true;
    }

    #[inline]
    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref().map(|(texture, _)| texture)
    }

    #[inline]
    pub fn view(&self) -> Option<&TextureView> {
        self.texture.as_ref().map(|(_, view)| view)
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn reserve(&mut self, width: u32, height: u32) -> &Texture {
        let reuse = matches!(
            &self.texture,
            Some((texture, _)) if texture.width() == width && texture.height() == height
        );
        if !reuse {
            log::debug!(
                "recreating TextureSurface '{}' at {}x{}",
                self.name,
                width,
                height
            );
            let texture = self.gpu.device.create_texture(&TextureDescriptor {
                label: Some(&self.name),
                size: Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: self.usage,
                view_formats: &[TEXTURE_FORMAT.add_srgb_suffix()],
            });
            let view = texture.create_view(&TextureViewDescriptor {
                label: Some(&self.name),
                ..Default::default()
            });
            // Dropping the old texture releases it once the GPU is done with it.
            self.texture = Some((texture, view));
            self.generation += 1;
        }

        match &self.texture {
            Some((texture, _)) => texture,
            None => unreachable!(),
        }
    }
}

impl Surface for TextureSurface {
    fn is_valid(&self) -> bool {
        !self.released
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.texture().map(|t| (t.width(), t.height()))
    }

    fn select_bitmap(&mut self, bitmap: Bitmap) -> Result<()> {
        if self.released {
            return Err(Error::new(
                ErrorKind::InvalidSurface,
                format!("texture surface '{}' has been released", self.name),
            ));
        }

        let max = self.gpu.device.limits().max_texture_dimension_2d;
        if bitmap.width() > max || bitmap.height() > max {
            return Err(Error::new(
                ErrorKind::Unsupported,
                format!(
                    "{}x{} bitmap exceeds the maximum texture size of {max}",
                    bitmap.width(),
                    bitmap.height(),
                ),
            ));
        }

        let gpu = self.gpu.clone();
        let texture = self.reserve(bitmap.width(), bitmap.height());
        gpu.queue.write_texture(
            ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            bitmap.pixels(),
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bitmap.width() * 4),
                rows_per_image: Some(bitmap.height()),
            },
            Extent3d {
                width: bitmap.width(),
                height: bitmap.height(),
                depth_or_array_layers: 1,
            },
        );
        log::trace!(
            "uploaded {} bytes to TextureSurface '{}'",
            bitmap.pixels().len(),
            self.name
        );

        Ok(())
    }
}
