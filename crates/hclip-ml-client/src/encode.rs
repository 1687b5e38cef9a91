//! Frame encoding for upload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use hclip_models::VideoFrame;

use crate::error::{MlError, MlResult};

const JPEG_QUALITY: u8 = 80;

/// Encode an RGB24 frame as base64 JPEG.
pub fn encode_frame_jpeg(frame: &VideoFrame) -> MlResult<String> {
    if frame.width == 0 || frame.height == 0 || !frame.is_complete() {
        return Err(MlError::InvalidFrame(format!(
            "frame {} is {}x{} with {} bytes",
            frame.index,
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(&frame.data, frame.width, frame.height, ColorType::Rgb8)
        .map_err(|e| MlError::InvalidFrame(e.to_string()))?;

    Ok(STANDARD.encode(jpeg))
}
