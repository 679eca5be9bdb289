use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::Result;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Decodes any format the `image` crate understands into an RGBA buffer.
pub fn load(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let image = image::open(path)?.to_rgba8();
    PixelBuffer::try_from(image)
}

pub fn save_png(path: impl AsRef<Path>, buffer: &PixelBuffer) -> Result<()> {
    let output = BufWriter::new(File::create(path)?);
    let encoder = PngEncoder::new(output);
    encoder.write_image(
        buffer.as_bytes(),
        buffer.width(),
        buffer.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pixel_lab_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn save_then_load_keeps_pixels() {
        let mut data = vec![255u8; 7 * 3 * 4];
        let mut intensity = 0u8;
        for px in data.chunks_mut(4) {
            px[0] = intensity;
            px[1] = intensity / 2;
            px[2] = 255 - intensity;
            intensity = intensity.wrapping_add(11);
        }
        let buffer = PixelBuffer::new(7, 3, data).unwrap();
        let path = scratch("gradient.png");

        save_png(&path, &buffer).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, buffer);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(load(scratch("does_not_exist.png")).is_err());
    }
}
