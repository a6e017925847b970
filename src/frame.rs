//! Frame data contract.
//!
//! Acquisition and colour conversion happen outside the core. What the core
//! needs from that step is captured here:
//!
//! - `Frame`: pixels plus dimensions and a capture sequence number.
//! - `FrameSource`: anything that can hand over the next frame.
//! - `SharedFrameSource`: one camera shared by both workers behind a lock.
//! - `SyntheticSource`: paced blank frames for `stub://` deployments and tests.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One captured frame. Pixels are read-only once captured.
pub struct Frame {
    data: Vec<u8>,
    size: FrameSize,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, size: FrameSize, sequence: u64) -> Self {
        Self {
            data,
            size,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

impl std::fmt::Debug for Frame {
    // Pixel content is never logged.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Source of frames for the perception workers.
pub trait FrameSource: Send {
    /// Capture the next frame, blocking until one is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Dimensions of the frames this source produces.
    fn frame_size(&self) -> FrameSize;
}

/// Camera shared by both workers. Only one worker should be active at a time,
/// but a state flip mid-iteration can overlap them briefly.
pub type SharedFrameSource = Arc<Mutex<dyn FrameSource>>;

pub fn share_source<S: FrameSource + 'static>(source: S) -> SharedFrameSource {
    Arc::new(Mutex::new(source))
}

/// Synthetic frame source producing blank frames at a target rate.
pub struct SyntheticSource {
    size: FrameSize,
    interval: Duration,
    next_due: Option<Instant>,
    frames_captured: u64,
}

impl SyntheticSource {
    pub fn new(size: FrameSize, target_fps: u32) -> Result<Self> {
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("synthetic source requires non-zero frame size"));
        }
        let interval = if target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(target_fps))
        };
        Ok(Self {
            size,
            interval,
            next_due: None,
            frames_captured: 0,
        })
    }

    /// Open a `stub://` URL. Any other scheme needs a hardware source.
    pub fn from_url(url: &str, size: FrameSize, target_fps: u32) -> Result<Self> {
        if !url.starts_with("stub://") {
            return Err(anyhow!(
                "frame source '{}' is not available in this build (only stub:// is supported)",
                url
            ));
        }
        Self::new(size, target_fps)
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.interval);

        let len = self.size.width as usize * self.size.height as usize * 3;
        let frame = Frame::new(vec![0u8; len], self.size, self.frames_captured);
        self.frames_captured += 1;
        Ok(frame)
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_numbers_frames() {
        let mut source = SyntheticSource::new(FrameSize::new(4, 2), 0).unwrap();
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert_eq!(second.pixels().len(), 4 * 2 * 3);
        assert_eq!(source.frames_captured(), 2);
    }

    #[test]
    fn synthetic_source_paces_frames() {
        let mut source = SyntheticSource::new(FrameSize::new(2, 2), 50).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            source.next_frame().unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn only_stub_urls_are_accepted() {
        let size = FrameSize::new(640, 480);
        assert!(SyntheticSource::from_url("stub://forklift_cam", size, 10).is_ok());
        assert!(SyntheticSource::from_url("rtsp://camera", size, 10).is_err());
        assert!(SyntheticSource::new(FrameSize::new(0, 480), 10).is_err());
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = Frame::new(vec![7u8; 12], FrameSize::new(2, 2), 9);
        let debug = format!("{:?}", frame);
        assert!(debug.contains("bytes: 12"));
        assert!(!debug.contains("[7"));
    }
}
