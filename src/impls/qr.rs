use image::{DynamicImage, ImageFormat, Rgb};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use crate::core::ports::qr::QrRenderer;
use crate::error::Error;

const DARK: Rgb<u8> = Rgb([0x1f, 0x29, 0x37]);
const LIGHT: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// PNG renderer for share links.
#[derive(Debug, Clone, Copy)]
pub struct PngQr {
    size: u32,
}

impl PngQr {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for PngQr {
    fn default() -> Self {
        Self::new(400)
    }
}

impl QrRenderer for PngQr {
    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn render(&self, url: &str) -> Result<Vec<u8>, Error> {
        let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)?;
        let img = code
            .render::<Rgb<u8>>()
            .dark_color(DARK)
            .light_color(LIGHT)
            .quiet_zone(true)
            .min_dimensions(self.size, self.size)
            .build();
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}
