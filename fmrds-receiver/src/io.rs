//! External-collaborator interfaces (§6): the tuner/device source, the
//! audio sink, and file-based source/sink used for offline runs and
//! regression tests.
//!
//! Device capture (mmap'd kernel I/Q streaming) and real-time audio
//! playback are explicitly out of scope (§1) -- only their trait boundary
//! to the core is specified here, mirroring how `receiver::FmReceiver`
//! only needs *a* source of `Complex32` chunks and *a* consumer of stereo
//! `f32` chunks, never a concrete device. The file-based variants are
//! fully implemented since `load`/`dump`/`test` need them.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use num_complex::Complex32;

use crate::error::{ReceiverError, Result};

/// A source of complex baseband I/Q samples, nominally 1 MS/s centered on
/// the wanted station (§1, §6). Implementors may be a live tuner device or
/// a file played back at whatever rate the caller drives it.
pub trait IqSource {
    /// Requests the tuner re-center on `hz`. File-based sources ignore
    /// this (the capture was already made at a fixed frequency).
    fn set_center_frequency(&mut self, hz: u32);

    /// Requests a new sampling rate. File-based sources ignore this.
    fn set_sampling_rate(&mut self, hz: u32);

    /// Drains any buffered-but-stale samples (device sources drop up to
    /// the current monotonic timestamp per §6; file sources rewind or
    /// no-op).
    fn reset(&mut self);

    /// Fills `buf` with up to `buf.len()` fresh samples, returning the
    /// count actually filled. Returns `0` at end-of-stream.
    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize>;
}

/// A consumer of demodulated stereo audio at the sink's configured rate
/// (§1, §6). Implementors may buffer a startup delay before producing any
/// sound; this trait only covers the data-flow boundary, not that timing.
pub trait AudioSink {
    fn write(&mut self, left: &[f32], right: &[f32]) -> Result<()>;
}

/// Reads raw interleaved `(re, im)` little-endian `f32` pairs from a file,
/// the capture format `dump` produces and `load` consumes (§6).
pub struct FileIqSource {
    reader: BufReader<File>,
}

impl FileIqSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(ReceiverError::Io)?;
        Ok(FileIqSource {
            reader: BufReader::new(file),
        })
    }
}

impl IqSource for FileIqSource {
    fn set_center_frequency(&mut self, _hz: u32) {}
    fn set_sampling_rate(&mut self, _hz: u32) {}
    fn reset(&mut self) {}

    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize> {
        let mut raw = vec![0u8; buf.len() * 8];
        let mut filled_bytes = 0;
        loop {
            match self.reader.read(&mut raw[filled_bytes..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled_bytes += n;
                    if filled_bytes == raw.len() {
                        break;
                    }
                }
                Err(e) => return Err(ReceiverError::Io(e)),
            }
        }
        let complete_samples = filled_bytes / 8;
        for (i, sample) in buf.iter_mut().take(complete_samples).enumerate() {
            let base = i * 8;
            let re = f32::from_le_bytes(raw[base..base + 4].try_into().unwrap());
            let im = f32::from_le_bytes(raw[base + 4..base + 8].try_into().unwrap());
            *sample = Complex32::new(re, im);
        }
        Ok(complete_samples)
    }
}

/// Writes raw interleaved `(re, im)` little-endian `f32` pairs to a file,
/// the format `dump` produces (§6).
pub struct FileIqSink {
    writer: BufWriter<File>,
}

impl FileIqSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).map_err(ReceiverError::Io)?;
        Ok(FileIqSink {
            writer: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, samples: &[Complex32]) -> Result<()> {
        for sample in samples {
            self.writer.write_all(&sample.re.to_le_bytes()).map_err(ReceiverError::Io)?;
            self.writer.write_all(&sample.im.to_le_bytes()).map_err(ReceiverError::Io)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(ReceiverError::Io)
    }
}

/// Writes interleaved `(ch0, ch1)` little-endian `f32` frames to a file
/// (§6's multichannel sink layout), for `load`/`test` to produce a
/// comparable artifact without a real sound card.
pub struct FileAudioSink {
    writer: BufWriter<File>,
    frames_written: u64,
}

impl FileAudioSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path).map_err(ReceiverError::Io)?;
        Ok(FileAudioSink {
            writer: BufWriter::new(file),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(ReceiverError::Io)
    }
}

impl AudioSink for FileAudioSink {
    fn write(&mut self, left: &[f32], right: &[f32]) -> Result<()> {
        debug_assert_eq!(left.len(), right.len());
        for (&l, &r) in left.iter().zip(right.iter()) {
            self.writer.write_all(&l.to_le_bytes()).map_err(ReceiverError::Io)?;
            self.writer.write_all(&r.to_le_bytes()).map_err(ReceiverError::Io)?;
        }
        self.frames_written += left.len() as u64;
        Ok(())
    }
}

/// Counts frames without writing anything -- used by `test` and by
/// `FmReceiver` regression runs that only need the sample count and RDS
/// state, not an audio artifact (§8 scenario 1).
#[derive(Default)]
pub struct CountingAudioSink {
    frames_written: u64,
}

impl CountingAudioSink {
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for CountingAudioSink {
    fn write(&mut self, left: &[f32], right: &[f32]) -> Result<()> {
        debug_assert_eq!(left.len(), right.len());
        self.frames_written += left.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_iq_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path();
        let samples = vec![
            Complex32::new(0.5, -0.25),
            Complex32::new(-1.0, 1.0),
            Complex32::new(0.0, 0.0),
        ];

        {
            let mut sink = FileIqSink::create(path).unwrap();
            sink.write(&samples).unwrap();
            sink.flush().unwrap();
        }

        let mut source = FileIqSource::open(path).unwrap();
        let mut buf = vec![Complex32::new(0.0, 0.0); 8];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(n, samples.len());
        assert_eq!(&buf[..n], &samples[..]);
    }

    #[test]
    fn counting_sink_tracks_frame_count() {
        let mut sink = CountingAudioSink::default();
        sink.write(&[0.0; 100], &[0.0; 100]).unwrap();
        sink.write(&[0.0; 50], &[0.0; 50]).unwrap();
        assert_eq!(sink.frames_written(), 150);
    }
}
