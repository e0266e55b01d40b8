use crate::error::{Error, Result};
use image::ImageOutputFormat;
use std::io::Cursor;

/// Decode any supported raster image and re-encode it as PNG
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(Error::icon_decode)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)
        .map_err(Error::icon_decode)?;
    Ok(out.into_inner())
}

/// File extensions [normalize] can read
pub fn is_raster_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    [".png", ".webp"].iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    #[test]
    fn reencodes_as_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut src = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut src, ImageOutputFormat::Png)
            .unwrap();

        let png = normalize(src.get_ref()).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            normalize(b"definitely not an image"),
            Err(Error::IconDecode(_))
        ));
    }

    #[test]
    fn raster_paths() {
        assert!(is_raster_path("res/mipmap-hdpi/ic_launcher.png"));
        assert!(is_raster_path("res/mipmap-hdpi/ic_launcher.WEBP"));
        assert!(!is_raster_path("res/mipmap-anydpi-v26/ic_launcher.xml"));
    }
}
