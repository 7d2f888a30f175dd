//! Texture pixel loading.
//!
//! Images are decoded with the `image` crate and converted to tightly
//! packed RGBA8. When no image is configured a checkerboard is generated
//! instead, so the sampler binding always has something to read.

use std::path::Path;

use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Decoded RGBA8 pixels, row-major, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decodes an image file into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be decoded.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let decoded = image::open(path).map_err(|source| ResourceError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        info!("Loaded texture {}: {}x{}", path.display(), width, height);

        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Loads `path` if given, otherwise generates the fallback checkerboard.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is given and cannot be loaded.
    pub fn load_or_checkerboard(path: Option<&Path>) -> ResourceResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::checkerboard(256, 8)),
        }
    }

    /// A `size` x `size` checkerboard with `cells` squares per side.
    pub fn checkerboard(size: u32, cells: u32) -> Self {
        let size = size.max(1);
        let cell = (size / cells.max(1)).max(1);

        let image = image::RgbaImage::from_fn(size, size, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                image::Rgba([235, 235, 235, 255])
            } else {
                image::Rgba([40, 40, 40, 255])
            }
        });

        Self {
            width: size,
            height: size,
            pixels: image.into_raw(),
        }
    }

    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        self.pixels
            .get(offset..offset + 4)
            .and_then(|p| p.try_into().ok())
    }
}
