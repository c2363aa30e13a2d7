use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::debug;

use crate::error::ResourceError;

/// RGBA8 pixels plus the mip chain generated from them.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    levels: Vec<RgbaImage>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.levels[0].width()
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height()
    }

    pub fn base(&self) -> &RgbaImage {
        &self.levels[0]
    }

    /// Mip levels from full size down to 1x1.
    pub fn levels(&self) -> &[RgbaImage] {
        &self.levels
    }
}

/// Decodes an encoded image into RGBA8 and builds its mip chain.
///
/// With `flip_vertically` the rows are mirrored before upload; wgpu samples
/// with a top-left origin so this is off unless the UVs assume bottom-left.
pub fn decode_rgba(name: &str, bytes: &[u8], flip_vertically: bool) -> Result<DecodedImage, ResourceError> {
    let decoded = image::load_from_memory(bytes).map_err(|source| ResourceError::Image {
        name: name.to_string(),
        source,
    })?;
    let mut base = decoded.to_rgba8();
    if flip_vertically {
        imageops::flip_vertical_in_place(&mut base);
    }

    let mut levels = vec![base];
    while let Some(last) = levels.last() {
        let (width, height) = last.dimensions();
        if width <= 1 && height <= 1 {
            break;
        }
        let next = imageops::resize(last, (width / 2).max(1), (height / 2).max(1), FilterType::Triangle);
        levels.push(next);
    }
    debug!(
        "decoded texture {name}: {}x{}, {} mip level(s)",
        levels[0].width(),
        levels[0].height(),
        levels.len()
    );
    Ok(DecodedImage { levels })
}

/// Sampled 2D texture with its own sampler and bind group.
#[derive(Debug)]
pub struct Texture {
    texture: wgpu::Texture,
    _view: wgpu::TextureView,
    _sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

impl Texture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Layout of the texture bind group: texture at 0, sampler at 1.
    pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    /// Uploads every mip level and creates a repeating trilinear sampler.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        image: &DecodedImage,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: image.levels().len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, pixels) in image.levels().iter().enumerate() {
            let (width, height) = pixels.dimensions();
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Self {
            texture,
            _view: view,
            _sampler: sampler,
            bind_group,
        }
    }

    /// Binds the texture to `group` (texture unit 0 of the program).
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, group: u32) {
        pass.set_bind_group(group, &self.bind_group, &[]);
    }

    pub fn destroy(self) {
        self.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn encode_png(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn two_row_image() -> RgbaImage {
        RgbaImage::from_fn(4, 2, |_, y| {
            if y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn decodes_and_builds_mip_chain() {
        let decoded = decode_rgba("rows.png", &encode_png(&two_row_image()), false).unwrap();
        let sizes: Vec<_> = decoded.levels().iter().map(|l| l.dimensions()).collect();
        assert_eq!(sizes, vec![(4, 2), (2, 1), (1, 1)]);
        assert_eq!(decoded.base().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn flip_mirrors_rows() {
        let decoded = decode_rgba("rows.png", &encode_png(&two_row_image()), true).unwrap();
        assert_eq!(decoded.base().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(decoded.base().get_pixel(3, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn embedded_checker_decodes() {
        let store = crate::resources::ResourceStore::embedded();
        let bytes = store.get(crate::resources::DEFAULT_TEXTURE).unwrap();
        let decoded = decode_rgba("checker", &bytes, false).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
        assert_eq!(decoded.levels().len(), 7);
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = decode_rgba("junk.png", b"definitely not a png", false).unwrap_err();
        assert!(matches!(err, ResourceError::Image { .. }));
    }
}
