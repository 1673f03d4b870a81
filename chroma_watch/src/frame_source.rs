//! Frame acquisition: the `FrameSource` seam and an image-file implementation.
//!
//! A source is polled once per tick. `Ok(None)` means nothing is ready yet and the
//! tick is skipped; errors are collaborator failures that the monitor reports but
//! never treats as fatal, except `Exhausted`, which ends the run.

use crate::core_modules::pixel::RGBA_STRIDE;
use crate::error::CoreError;
use image::{DynamicImage, ImageError, ImageFormat};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One sampled RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps an RGBA buffer, checking that it holds exactly `width × height` pixels.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CoreError> {
        let expected = width as usize * height as usize * RGBA_STRIDE;
        if data.len() != expected {
            return Err(CoreError::DimensionMismatch { expected, actual: data.len() });
        }
        Ok(Self { width, height, data })
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            data: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Coarse failure categories, used for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    PermissionDenied,
    NotFound,
    Exhausted,
    Decode,
    Other,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("no frame source found: {0}")]
    NotFound(String),

    #[error("frame sequence exhausted")]
    Exhausted,

    #[error("failed to decode frame: {0}")]
    Decode(ImageError),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::PermissionDenied(_) => SourceErrorKind::PermissionDenied,
            SourceError::NotFound(_) => SourceErrorKind::NotFound,
            SourceError::Exhausted => SourceErrorKind::Exhausted,
            SourceError::Decode(_) => SourceErrorKind::Decode,
            SourceError::Other(_) => SourceErrorKind::Other,
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        let target = path.display().to_string();
        match error.kind() {
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(target),
            io::ErrorKind::NotFound => SourceError::NotFound(target),
            _ => SourceError::Other(format!("{target}: {error}")),
        }
    }

    fn from_image(path: &Path, error: ImageError) -> Self {
        match error {
            ImageError::IoError(io_error) => SourceError::from_io(path, io_error),
            other => SourceError::Decode(other),
        }
    }
}

/// Supplies one frame per tick.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Option<Frame>, SourceError>,
{
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self()
    }
}

/// Plays back a list of still images as a frame stream.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>, looping: bool) -> Self {
        Self { paths, cursor: 0, looping }
    }

    /// Collects every file in `dir` with a recognised image extension, in name order.
    pub fn from_dir(dir: impl AsRef<Path>, looping: bool) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| SourceError::from_io(dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SourceError::from_io(dir, e))?.path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(SourceError::NotFound(format!("no images in {}", dir.display())));
        }
        paths.sort();
        Ok(Self::new(paths, looping))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.cursor >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return Err(SourceError::Exhausted);
            }
            self.cursor = 0;
        }
        let path = &self.paths[self.cursor];
        self.cursor += 1;

        let image = image::open(path).map_err(|e| SourceError::from_image(path, e))?;
        Ok(Some(Frame::from_image(&image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chroma_watch_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn frame_checks_buffer_length() {
        assert!(Frame::new(2, 2, vec![0; 16]).is_ok());
        assert_eq!(
            Frame::new(2, 2, vec![0; 12]),
            Err(CoreError::DimensionMismatch { expected: 16, actual: 12 })
        );
    }

    #[test]
    fn frame_from_rgb_image_gains_alpha() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]));
        let image = DynamicImage::ImageRgb8(rgb);
        let frame = Frame::from_image(&image);
        assert_eq!(frame.pixel_count(), 6);
        assert_eq!(&frame.data()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn closures_are_sources() {
        let mut calls = 0;
        let mut source = || -> Result<Option<Frame>, SourceError> {
            calls += 1;
            Ok(None)
        };
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(calls, 1);
    }

    #[test]
    fn sequence_reads_images_in_name_order_then_exhausts() {
        let dir = scratch_dir("sequence");
        RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255])).save(dir.join("b.png")).unwrap();
        RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255])).save(dir.join("a.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::from_dir(&dir, false).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().pixel_count(), 1);
        assert_eq!(source.next_frame().unwrap().unwrap().pixel_count(), 4);
        assert!(matches!(source.next_frame(), Err(SourceError::Exhausted)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn looping_sequence_restarts() {
        let dir = scratch_dir("looping");
        RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])).save(dir.join("only.png")).unwrap();

        let mut source = ImageSequenceSource::from_dir(&dir, true).unwrap();
        for _ in 0..3 {
            assert!(source.next_frame().unwrap().is_some());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_files_are_not_found() {
        let mut source = ImageSequenceSource::new(vec![PathBuf::from("/no/such/frame.png")], false);
        let err = source.next_frame().unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::NotFound);

        let err = ImageSequenceSource::from_dir("/no/such/dir", false).unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::NotFound);
    }
}
