use crate::error::{CaptureError, EggcamError};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 8-bit grayscale
    Gray8,
    /// 8-bit interleaved RGB
    Rgb24,
}

impl PixelLayout {
    /// Get bytes per pixel for the layout
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Gray8 => 1,
            PixelLayout::Rgb24 => 3,
        }
    }

    fn color_type(&self) -> ColorType {
        match self {
            PixelLayout::Gray8 => ColorType::L8,
            PixelLayout::Rgb24 => ColorType::Rgb8,
        }
    }
}

/// An uncompressed camera frame.
///
/// Pixel data is immutable and reference counted, so cloning a frame hands
/// out an independent handle without copying the bitmap.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Timestamp when frame was captured
    pub captured_at: SystemTime,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout
    pub layout: PixelLayout,
    data: Arc<Vec<u8>>,
}

impl Frame {
    /// Create a frame from raw pixels, rejecting buffers of the wrong size
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, EggcamError> {
        let expected = Self::expected_len(width, height, layout);
        if data.len() != expected {
            return Err(EggcamError::system(format!(
                "Frame buffer is {} bytes, expected {} for {}x{} {:?}",
                data.len(),
                expected,
                width,
                height,
                layout
            )));
        }

        Ok(Self {
            captured_at: SystemTime::now(),
            width,
            height,
            layout,
            data: Arc::new(data),
        })
    }

    /// All-zero RGB frame used when the camera has nothing to offer
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            captured_at: SystemTime::now(),
            width,
            height,
            layout: PixelLayout::Rgb24,
            data: Arc::new(vec![0u8; Self::expected_len(width, height, PixelLayout::Rgb24)]),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True when both handles point at the same pixel buffer
    pub fn shares_pixels_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Encode the frame as a baseline JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let mut buf = Vec::with_capacity(self.data.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder
            .encode(&self.data, self.width, self.height, self.layout.color_type())
            .map_err(|e| CaptureError::Encode {
                details: e.to_string(),
            })?;
        Ok(buf)
    }

    fn expected_len(width: u32, height: u32, layout: PixelLayout) -> usize {
        width as usize * height as usize * layout.channels()
    }
}
