use std::sync::Arc;

use anyhow::{Context, Result};
use image::DynamicImage;
use log::debug;

use super::{PendingLoad, Resources};
use crate::error::ResourceError;

/// RGBA8 pixels ready for upload to the graphics context.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn decode_image(raw: Vec<u8>) -> Result<DynamicImage> {
    image::load_from_memory(&raw).context("unable to decode image")
}

fn parse_texture(image: DynamicImage) -> Result<TextureData> {
    let rgba = image.to_rgba8();
    Ok(TextureData {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

impl Resources {
    pub fn load_texture(&self, key: &str) -> Option<PendingLoad> {
        self.load_decode_parse(&self.textures, key, decode_image, parse_texture)
    }

    pub fn get_texture(&self, key: &str) -> Result<Arc<TextureData>, ResourceError> {
        self.textures.get_resource(key)
    }

    /// Returns `true` when the last holder released the texture and its GPU
    /// handle should be deleted.
    pub fn unload_texture(&self, key: &str) -> Result<bool, ResourceError> {
        let released = self.textures.unload_resource(key)?;
        if released {
            debug!("texture {key} released");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryFetcher;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_png_to_rgba() {
        let fetcher = MemoryFetcher::new().with_file("ship.png", png_bytes(3, 2, [255, 0, 0, 255]));
        let resources = Resources::new(fetcher);
        resources.load_texture("ship.png");
        pollster::block_on(resources.wait_on_requests()).unwrap();

        let texture = resources.get_texture("ship.png").unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.pixels.len(), 3 * 2 * 4);
        assert_eq!(&texture.pixels[..4], &[255, 0, 0, 255]);
        assert!(resources.unload_texture("ship.png").unwrap());
    }

    #[test]
    fn garbage_bytes_fail_the_load() {
        let resources = Resources::new(MemoryFetcher::new().with_file("bad.png", "not a png"));
        resources.load_texture("bad.png");
        let err = pollster::block_on(resources.wait_on_requests()).unwrap_err();
        assert_eq!(err.key(), "bad.png");
    }
}
