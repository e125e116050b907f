use opencv::{core::Mat, prelude::*};

use crate::error::Error;

/// Ordered sequence of frames. `Ok(None)` marks the end of input.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Option<Mat>, Error>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> Result<(), Error>;

    fn fps(&self) -> f64 {
        25.0
    }
}

pub trait FrameSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<(), Error>;
}

/// Frames held in memory.
pub struct MemorySource {
    frames: Vec<Mat>,
    pos: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Mat>) -> Self {
        Self { frames, pos: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Option<Mat>, Error> {
        let frame = match self.frames.get(self.pos) {
            Some(frame) => frame.try_clone()?,
            None => return Ok(None),
        };
        self.pos += 1;

        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.pos = 0;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<Mat>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Mat) -> Result<(), Error> {
        self.frames.push(frame.try_clone()?);
        Ok(())
    }
}
