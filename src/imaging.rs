use crate::errors::GenerationError;
use image::{load_from_memory, ImageFormat};
use std::io::Cursor;

/// Decodes an image in any supported format and re-encodes it as PNG.
pub fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>, GenerationError> {
    let img = load_from_memory(bytes).map_err(GenerationError::UndecodableImage)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(GenerationError::UndecodableImage)?;
    Ok(out.into_inner())
}
