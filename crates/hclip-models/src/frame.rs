//! Decoded video frames handed to frame analyzers.

/// A decoded RGB24 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Zero-based index of the frame in the clip
    pub index: u64,
    /// Position of the frame inside the clip, in seconds
    pub offset_secs: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Packed RGB24 pixels, `width * height * 3` bytes
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Size in bytes of one RGB24 frame with the given dimensions.
    pub fn rgb24_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_complete(&self) -> bool {
        self.data.len() == Self::rgb24_len(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_completeness() {
        let frame = VideoFrame {
            index: 0,
            offset_secs: 0.0,
            width: 4,
            height: 2,
            data: vec![0; 24],
        };
        assert!(frame.is_complete());

        let short = VideoFrame { data: vec![0; 10], ..frame };
        assert!(!short.is_complete());
    }
}
