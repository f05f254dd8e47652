//! Replay source: recorded frame pairs from a local directory.
//!
//! Record format, one file per pair (`frame-000042.fpr`):
//!
//! ```text
//! magic "FPR1" | width u32 LE | height u32 LE | depth_scale f32 LE
//! | color RGB8 (width*height*3 bytes) | depth Z16 LE (width*height*2 bytes)
//! ```
//!
//! The source reads files in index order and reports `None` when the next
//! index is missing, which is also how a live bridge looks while its writer
//! is mid-sequence, so an external camera process can feed the daemon by
//! writing records into the directory (atomically, write-then-rename).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::FramePair;
use crate::ingest::{FrameSource, SourceStats};

const MAGIC: &[u8; 4] = b"FPR1";

pub struct ReplaySource {
    dir: PathBuf,
    next_index: u64,
    frames_delivered: u64,
}

impl ReplaySource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            next_index: 0,
            frames_delivered: 0,
        }
    }

    fn record_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame-{index:06}.fpr"))
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(anyhow!(
                "replay directory {} does not exist",
                self.dir.display()
            ));
        }
        log::info!("ReplaySource: reading from {}", self.dir.display());
        Ok(())
    }

    fn poll_pair(&mut self) -> Result<Option<FramePair>> {
        let path = self.record_path(self.next_index);
        if !path.exists() {
            return Ok(None);
        }
        let pair = read_frame_pair(&path)
            .with_context(|| format!("reading frame record {}", path.display()))?;
        self.next_index += 1;
        self.frames_delivered += 1;
        Ok(Some(pair))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frames_delivered,
            url: self.dir.display().to_string(),
        }
    }
}

/// Write one frame pair in the bridge record format.
pub fn write_frame_pair(path: &Path, pair: &FramePair) -> Result<()> {
    let mut data = Vec::with_capacity(16 + pair.color.len() + pair.depth.len() * 2);
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&pair.width.to_le_bytes());
    data.extend_from_slice(&pair.height.to_le_bytes());
    data.extend_from_slice(&pair.depth_scale.to_le_bytes());
    data.extend_from_slice(&pair.color);
    for sample in &pair.depth {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    crate::command::write_atomic(path, &data)
}

fn read_frame_pair(path: &Path) -> Result<FramePair> {
    let bytes = fs::read(path)?;
    let mut cursor = 0usize;

    if read_slice(&bytes, &mut cursor, 4)? != MAGIC {
        return Err(anyhow!("bad magic; not a frame record"));
    }
    let width = read_u32(&bytes, &mut cursor)?;
    let height = read_u32(&bytes, &mut cursor)?;
    let depth_scale = f32::from_le_bytes(read_slice(&bytes, &mut cursor, 4)?.try_into()?);

    if depth_scale <= 0.0 || !depth_scale.is_finite() {
        return Err(anyhow!("invalid depth scale {depth_scale}"));
    }

    let color_len = FramePair::color_len(width, height);
    let depth_len = FramePair::depth_len(width, height);
    let color = read_slice(&bytes, &mut cursor, color_len)?.to_vec();

    let depth_bytes = read_slice(&bytes, &mut cursor, depth_len * 2)?;
    let depth = depth_bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    if cursor != bytes.len() {
        return Err(anyhow!("trailing bytes in frame record"));
    }

    Ok(FramePair {
        color,
        depth,
        width,
        height,
        depth_scale,
    })
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32> {
    let slice = read_slice(bytes, cursor, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
    if *cursor + len > bytes.len() {
        return Err(anyhow!("truncated frame record"));
    }
    let out = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pair() -> FramePair {
        FramePair {
            color: (0..FramePair::color_len(8, 4)).map(|i| i as u8).collect(),
            depth: (0..FramePair::depth_len(8, 4)).map(|i| 400 + i as u16).collect(),
            width: 8,
            height: 4,
            depth_scale: 0.001,
        }
    }

    #[test]
    fn records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame-000000.fpr");
        let pair = sample_pair();
        write_frame_pair(&path, &pair).unwrap();

        let read = read_frame_pair(&path).unwrap();
        assert_eq!(read.width, pair.width);
        assert_eq!(read.height, pair.height);
        assert_eq!(read.depth_scale, pair.depth_scale);
        assert_eq!(read.color, pair.color);
        assert_eq!(read.depth, pair.depth);
    }

    #[test]
    fn replays_in_order_then_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut pair = sample_pair();
        for i in 0..3u64 {
            pair.depth[0] = 1000 + i as u16;
            write_frame_pair(&dir.path().join(format!("frame-{i:06}.fpr")), &pair).unwrap();
        }

        let mut source = ReplaySource::new(dir.path());
        source.connect().unwrap();
        for i in 0..3u64 {
            let read = source.poll_pair().unwrap().expect("recorded frame");
            assert_eq!(read.depth[0], 1000 + i as u16);
        }
        // Exhausted: empty poll, not an error.
        assert!(source.poll_pair().unwrap().is_none());
        assert_eq!(source.stats().frames_delivered, 3);
    }

    #[test]
    fn missing_directory_fails_connect() {
        let mut source = ReplaySource::new("/nonexistent/frames");
        assert!(source.connect().is_err());
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame-000000.fpr");
        fs::write(&path, b"FPR1 not really").unwrap();

        let mut source = ReplaySource::new(dir.path());
        assert!(source.poll_pair().is_err());
    }
}
