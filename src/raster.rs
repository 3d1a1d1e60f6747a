use std::io::Cursor;

use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::models::ArtifactPayload;

/// Fixed upscaling factor for the rasterized page, to keep the bitmap sharp
/// against the display surface.
pub const PAGE_SCALE: f32 = 2.0;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("artifact is not a PDF document")]
    NotPdf,
    #[error("PDF rendering engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("could not render PDF preview: {0}")]
    Malformed(String),
    #[error("bitmap encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub struct RenderedPage {
    pub png: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Decode the inline PDF payload and rasterize its first page to a PNG.
///
/// Only page 1 is rendered; later pages are out of scope. pdfium is not
/// async-safe, so async callers must run this under `spawn_blocking`.
pub fn render_first_page(payload: &ArtifactPayload) -> Result<RenderedPage, RasterError> {
    if !payload.is_pdf() {
        return Err(RasterError::NotPdf);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&payload.data)
        .map_err(|e| RasterError::Malformed(format!("invalid base64 payload: {e}")))?;

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| RasterError::EngineUnavailable(e.to_string()))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(&bytes, None)
        .map_err(|e| RasterError::Malformed(e.to_string()))?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| RasterError::Malformed(format!("no first page: {e}")))?;

    let bitmap = page
        .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(PAGE_SCALE))
        .map_err(|e| RasterError::Malformed(e.to_string()))?;
    let image = bitmap.as_image();
    let (width, height) = (image.width(), image.height());
    debug!(width, height, "rasterized first PDF page");

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(RenderedPage { png: Bytes::from(png), width, height })
}
