use super::source::FrameSource;
use crate::error::Result;
use crate::frame::{Frame, PixelLayout};
use async_trait::async_trait;
use tracing::trace;

/// Synthetic source producing a scrolling gradient.
///
/// Used when no camera backend is compiled in, or when the configured
/// source is `"test"`.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_counter: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_counter: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let offset = (self.frame_counter % 256) as usize;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);

        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                data.push(((x + offset) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(offset as u8);
            }
        }

        data
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    async fn read_frame(&mut self) -> Result<Frame> {
        self.frame_counter = self.frame_counter.wrapping_add(1);
        trace!("Generated test pattern frame {}", self.frame_counter);
        Frame::new(self.width, self.height, PixelLayout::Rgb24, self.render())
    }

    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}
