//! Persistent storage collaborators.
//!
//! The streamer thread is the sole caller of [`TapeStorage`]; everything else
//! in the engine stays bounded by in-memory operations. Storage owns its own
//! layout; positions below zero are never backed (reads of them come back as
//! silence, writes of them are reported as shortfall by the facade).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use spool_core::{TapeSlice, TapeTime, NUM_TRACKS};

use crate::error::{Error, Result};

/// Byte/sample source the streamer thread reads and writes spans against.
pub trait TapeStorage: Send {
    /// Fills `out` with one track's samples over the absolute `span`,
    /// zero-filling anything unbacked. Returns the number of frames that came
    /// from real backing.
    fn read_span(&mut self, track: usize, span: TapeSlice, out: &mut [f32]) -> Result<usize>;

    /// Persists one track's samples over `span`. Returns the number of frames
    /// actually committed; anything short of `data.len()` is a shortfall the
    /// caller keeps pending.
    fn write_span(&mut self, track: usize, span: TapeSlice, data: &[f32]) -> Result<usize>;
}

/// In-memory storage: the zero-setup default, and what the tests run on.
#[derive(Debug, Default)]
pub struct MemStorage {
    tracks: [Vec<f32>; NUM_TRACKS],
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames currently backed on `track`.
    pub fn track_len(&self, track: usize) -> usize {
        self.tracks[track].len()
    }
}

impl TapeStorage for MemStorage {
    fn read_span(&mut self, track: usize, span: TapeSlice, out: &mut [f32]) -> Result<usize> {
        let buf = &self.tracks[track];
        let mut backed = 0;
        for (i, pos) in (span.start..span.end).enumerate() {
            out[i] = if pos >= 0 && (pos as usize) < buf.len() {
                backed += 1;
                buf[pos as usize]
            } else {
                0.0
            };
        }
        Ok(backed)
    }

    fn write_span(&mut self, track: usize, span: TapeSlice, data: &[f32]) -> Result<usize> {
        let buf = &mut self.tracks[track];
        let mut written = 0;
        for (i, pos) in (span.start..span.end).enumerate() {
            if pos < 0 {
                continue;
            }
            let idx = pos as usize;
            if idx >= buf.len() {
                buf.resize(idx + 1, 0.0);
            }
            buf[idx] = data[i];
            written += 1;
        }
        Ok(written)
    }
}

/// Directory-backed storage: one raw little-endian `f32` file per track,
/// sparse-extended on write, zero-filled on reads past EOF.
pub struct DirStorage {
    files: [File; NUM_TRACKS],
    path: PathBuf,
}

impl DirStorage {
    /// Opens (creating as needed) `track0.raw` .. `track3.raw` under `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        let mut files = Vec::with_capacity(NUM_TRACKS);
        for track in 0..NUM_TRACKS {
            files.push(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path.join(format!("track{track}.raw")))?,
            );
        }
        let files: [File; NUM_TRACKS] = files
            .try_into()
            .map_err(|_| Error::Storage("track file set incomplete".into()))?;
        Ok(Self { files, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TapeStorage for DirStorage {
    fn read_span(&mut self, track: usize, span: TapeSlice, out: &mut [f32]) -> Result<usize> {
        out.fill(0.0);
        if span.is_empty() || span.end <= 0 {
            return Ok(0);
        }
        let start = span.start.max(0);
        let skip = (start - span.start) as usize;
        let file = &mut self.files[track];
        let file_frames = (file.metadata()?.len() / 4) as TapeTime;
        let end = span.end.min(file_frames);
        if end <= start {
            return Ok(0);
        }

        let frames = (end - start) as usize;
        let mut bytes = vec![0u8; frames * 4];
        file.seek(SeekFrom::Start(start as u64 * 4))?;
        file.read_exact(&mut bytes)?;
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            out[skip + i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(frames)
    }

    fn write_span(&mut self, track: usize, span: TapeSlice, data: &[f32]) -> Result<usize> {
        if span.is_empty() || span.end <= 0 {
            return Ok(0);
        }
        let start = span.start.max(0);
        let skip = (start - span.start) as usize;
        let frames = (span.end - start) as usize;

        let mut bytes = Vec::with_capacity(frames * 4);
        for sample in &data[skip..skip + frames] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let file = &mut self.files[track];
        file.seek(SeekFrom::Start(start as u64 * 4))?;
        file.write_all(&bytes)?;
        Ok(frames)
    }
}

/// Renders a track's recorded slices to a 16-bit mono WAV file, with silence
/// over the gaps between slices.
pub fn export_track_wav(
    storage: &mut dyn TapeStorage,
    slices: &[TapeSlice],
    track: usize,
    path: impl AsRef<Path>,
    sample_rate: f64,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;

    if let (Some(first), Some(last)) = (slices.first(), slices.last()) {
        let span = TapeSlice::new(first.start.max(0), last.end);
        if !span.is_empty() {
            let mut samples = vec![0.0f32; span.len() as usize];
            for slice in slices {
                if let Some(clipped) = slice.intersect(&span) {
                    let offset = (clipped.start - span.start) as usize;
                    let len = clipped.len() as usize;
                    storage.read_span(track, clipped, &mut samples[offset..offset + len])?;
                }
            }
            for sample in samples {
                let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(quantized)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}
