/// A decoded video frame ready for texture upload.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8, tightly packed
    pub width: u32,
    pub height: u32,
    /// Presentation time in seconds.
    pub pts: f64,
}

impl DecodedFrame {
    /// Byte length an RGBA buffer of this size must have.
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == Self::expected_len(self.width, self.height)
    }
}
