//! Captured pixel buffers

use crate::{CaptureError, CaptureResult, ScreenId};
use image::{ImageBuffer, RgbaImage};

/// Pixel data as returned by the platform capturer (BGRA, rows may be padded)
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
}

impl RawCapture {
    /// Tightly packed BGRA buffer
    pub fn packed(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            bytes_per_row: width as usize * 4,
        }
    }
}

/// A finished capture, owned by the core until handed to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Tightly packed BGRA pixels
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Screen the pixels were actually taken from
    pub screen: ScreenId,
}

impl CapturedImage {
    /// Strip row padding from a raw buffer
    pub fn from_raw(raw: RawCapture, screen: ScreenId) -> CaptureResult<Self> {
        let row_len = raw.width as usize * 4;
        let needed = raw.bytes_per_row * raw.height.saturating_sub(1) as usize + row_len;

        if raw.width == 0
            || raw.height == 0
            || raw.bytes_per_row < row_len
            || raw.data.len() < needed
        {
            return Err(CaptureError::CaptureFailed(format!(
                "short buffer: {} bytes for {}x{} at {} bytes/row",
                raw.data.len(),
                raw.width,
                raw.height,
                raw.bytes_per_row
            )));
        }

        let data = if raw.bytes_per_row == row_len {
            let mut data = raw.data;
            data.truncate(row_len * raw.height as usize);
            data
        } else {
            let mut data = Vec::with_capacity(row_len * raw.height as usize);
            for row in raw.data.chunks(raw.bytes_per_row).take(raw.height as usize) {
                data.extend_from_slice(&row[..row_len]);
            }
            data
        };

        Ok(Self {
            data,
            width: raw.width,
            height: raw.height,
            screen,
        })
    }

    /// Convert BGRA data to RGBA image
    pub fn to_rgba_image(&self) -> CaptureResult<RgbaImage> {
        let mut rgba_data = self.data.clone();

        for chunk in rgba_data.chunks_exact_mut(4) {
            chunk.swap(0, 2);
        }

        ImageBuffer::from_raw(self.width, self.height, rgba_data).ok_or_else(|| {
            CaptureError::CaptureFailed("pixel buffer does not match dimensions".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_stripped() {
        // 2x2 image, 12 bytes per row (4 bytes of padding)
        let mut data = Vec::new();
        for row in 0..2u8 {
            data.extend_from_slice(&[row, 1, 2, 255, row, 1, 2, 255]);
            data.extend_from_slice(&[9, 9, 9, 9]);
        }
        let raw = RawCapture {
            data,
            width: 2,
            height: 2,
            bytes_per_row: 12,
        };

        let image = CapturedImage::from_raw(raw, ScreenId(1)).unwrap();
        assert_eq!(image.data.len(), 16);
        assert!(!image.data.contains(&9));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let raw = RawCapture::packed(vec![0; 10], 2, 2);
        assert!(matches!(
            CapturedImage::from_raw(raw, ScreenId(1)),
            Err(CaptureError::CaptureFailed(_))
        ));
    }

    #[test]
    fn rgba_conversion_swaps_channels() {
        let raw = RawCapture::packed(vec![10, 20, 30, 255], 1, 1);
        let image = CapturedImage::from_raw(raw, ScreenId(1)).unwrap();
        let rgba = image.to_rgba_image().unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [30, 20, 10, 255]);
    }
}
