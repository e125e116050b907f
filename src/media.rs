//! File-backed media: the uploaded input and the rendered outputs.

use std::path::{Path, PathBuf};

use log::{debug, info};
use opencv::{
    core::{Mat, Size, Vector},
    imgcodecs,
    prelude::*,
    videoio,
};

use crate::error::Error;
use crate::frame::{FrameSink, FrameSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("jpg") | Some("jpeg") | Some("png") | Some("bmp") => Ok(MediaKind::Image),
            Some("mp4") | Some("avi") | Some("mov") | Some("mkv") => Ok(MediaKind::Video),
            _ => Err(Error::UnsupportedMedia(path.display().to_string())),
        }
    }
}

/// The single file a run works on.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaInput {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self, Error> {
        let path = path.into();
        let kind = MediaKind::from_path(&path)?;

        Ok(Self { path, kind })
    }

    pub fn open(&self) -> Result<Box<dyn FrameSource>, Error> {
        Ok(match self.kind {
            MediaKind::Image => Box::new(ImageSource::open(&self.path)?),
            MediaKind::Video => Box::new(VideoFileSource::open(&self.path)?),
        })
    }
}

fn path_str(path: &Path) -> Result<&str, Error> {
    path.to_str()
        .ok_or_else(|| Error::MediaOpen(path.display().to_string()))
}

/// A still image presented as a one-frame sequence.
pub struct ImageSource {
    frame: Mat,
    done: bool,
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let frame = imgcodecs::imread(path_str(path)?, imgcodecs::IMREAD_COLOR)?;
        if frame.rows() == 0 || frame.cols() == 0 {
            return Err(Error::MediaOpen(path.display().to_string()));
        }

        Ok(Self { frame, done: false })
    }
}

impl FrameSource for ImageSource {
    fn read_frame(&mut self) -> Result<Option<Mat>, Error> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        Ok(Some(self.frame.try_clone()?))
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.done = false;
        Ok(())
    }
}

pub struct VideoFileSource {
    capture: videoio::VideoCapture,
    fps: f64,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let capture = videoio::VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::MediaOpen(path.display().to_string()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let total = capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i32;
        info!("video {}x{} {} frames at {} fps", width, height, total, fps);

        Ok(Self {
            capture,
            fps: if fps > 0.0 { fps } else { 25.0 },
        })
    }
}

impl FrameSource for VideoFileSource {
    fn read_frame(&mut self) -> Result<Option<Mat>, Error> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? {
            return Ok(None);
        }

        if frame.rows() == 0 || frame.cols() == 0 {
            return Ok(None);
        }

        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        Ok(())
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

/// Video writer opened on the first frame and re-opened when the frame size changes.
pub struct VideoFileSink {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    out_file: PathBuf,
    fps: f64,
}

impl VideoFileSink {
    pub fn new<P: Into<PathBuf>>(out_file: P, fps: f64) -> Self {
        Self {
            writer: None,
            size: None,
            out_file: out_file.into(),
            fps,
        }
    }

    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
        }

        Ok(())
    }

    fn reinit(&mut self, size: (i32, i32)) -> Result<(), Error> {
        debug!("opening video writer {:?} at {:?}", self.out_file, size);
        self.release()?;

        let writer = videoio::VideoWriter::new(
            path_str(&self.out_file)?,
            videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
            self.fps,
            Size::new(size.0, size.1),
            true,
        )?;

        if !writer.is_opened()? {
            return Err(Error::MediaOpen(self.out_file.display().to_string()));
        }

        self.size = Some(size);
        self.writer = Some(writer);

        Ok(())
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<(), Error> {
        let size = (frame.cols(), frame.rows());

        if self.writer.is_none() || self.size != Some(size) {
            self.reinit(size)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(frame)?;
        }

        Ok(())
    }
}

impl Drop for VideoFileSink {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!("failed to release video writer: {}", err);
        }
    }
}

pub fn write_image(path: &Path, frame: &Mat) -> Result<(), Error> {
    if !imgcodecs::imwrite(path_str(path)?, frame, &Vector::new())? {
        return Err(Error::MediaOpen(path.display().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.JPG")).unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("car.png")).unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("clip.mp4")).unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("clip.MOV")).unwrap(), MediaKind::Video);

        assert!(matches!(
            MediaKind::from_path(Path::new("notes.txt")),
            Err(Error::UnsupportedMedia(_))
        ));
        assert!(MediaKind::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_input_carries_kind() {
        let input = MediaInput::new("uploads/sample.mp4").unwrap();
        assert_eq!(input.kind, MediaKind::Video);
        assert_eq!(input.path, PathBuf::from("uploads/sample.mp4"));
    }

    #[test]
    fn test_missing_image_fails_to_open() {
        let input = MediaInput::new("/nonexistent/dir/frame.jpg").unwrap();
        assert!(input.open().is_err());
    }
}
