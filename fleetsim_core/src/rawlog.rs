//! Compressed, append-only observation logs.
//!
//! File layout: one LZ4 frame whose decompressed content is a sequence of
//! records, each `u32` little-endian length followed by that many bytes of
//! encoded [`ObservationEnvelope`].
//!
//! Every append ends the current LZ4 block and flushes the file, so a log
//! whose frame was never finished (process killed mid-run) still reads back
//! up to the last complete record.

use crate::error::SimError;
use fleetsim_env::ObservationEnvelope;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Largest record accepted by the writer and reader.
pub const MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// Writer for one rawlog file.
///
/// The LZ4 frame is finished when the writer is dropped; call
/// [`RawlogWriter::finish`] to observe errors instead.
pub struct RawlogWriter {
    encoder: Option<FrameEncoder<BufWriter<File>>>,
    path: PathBuf,
    records: u64,
}

impl RawlogWriter {
    /// Creates (truncating) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            SimError::LogWriteFailure(format!("cannot create '{}': {e}", path.display()))
        })?;
        
        Ok(Self {
            encoder: Some(FrameEncoder::new(BufWriter::new(file))),
            path,
            records: 0,
        })
    }
    
    /// Appends one envelope.
    pub fn append(&mut self, envelope: &ObservationEnvelope) -> Result<(), SimError> {
        let bytes = envelope.encode()?;
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(SimError::LogWriteFailure(format!(
                "record of {} bytes too large",
                bytes.len()
            )));
        }
        let len = bytes.len() as u32;
        
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| SimError::LogWriteFailure("writer already finished".into()))?;
        
        encoder
            .write_all(&len.to_le_bytes())
            .and_then(|_| encoder.write_all(&bytes))
            .map_err(|e| SimError::LogWriteFailure(format!("{}: {e}", self.path.display())))?;
        
        self.records += 1;
        self.flush()
    }
    
    /// Writes the pending block and flushes the file (the frame stays open).
    pub fn flush(&mut self) -> Result<(), SimError> {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder
                .flush()
                .and_then(|_| encoder.get_mut().flush())
                .map_err(|e| SimError::LogWriteFailure(format!("{}: {e}", self.path.display())))?;
        }
        Ok(())
    }
    
    /// Closes the LZ4 frame and flushes the file.
    pub fn finish(mut self) -> Result<(), SimError> {
        self.finish_inner()
    }
    
    fn finish_inner(&mut self) -> Result<(), SimError> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let mut inner = encoder
            .finish()
            .map_err(|e| SimError::LogWriteFailure(format!("{}: {e}", self.path.display())))?;
        inner.flush()?;
        Ok(())
    }
    
    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
    
    /// Returns the number of records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl std::fmt::Debug for RawlogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawlogWriter")
            .field("path", &self.path)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Drop for RawlogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish_inner() {
            tracing::warn!(path = %self.path.display(), "failed to close rawlog: {e}");
        }
    }
}

/// Sequential reader over a rawlog stream.
pub struct RawlogReader<R: Read> {
    decoder: FrameDecoder<R>,
}

impl RawlogReader<BufReader<File>> {
    /// Opens a rawlog file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RawlogReader<R> {
    /// Wraps a compressed byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            decoder: FrameDecoder::new(reader),
        }
    }
    
    /// Reads the next record, or `None` at a clean end of stream.
    ///
    /// A frame without its end mark ends cleanly at the last flushed block.
    pub fn next_record(&mut self) -> Result<Option<ObservationEnvelope>, SimError> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = self.decoder.read(&mut len_buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(SimError::Codec("truncated record header".into()));
            }
            filled += n;
        }
        
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_RECORD_BYTES {
            return Err(SimError::Codec(format!("record length {len} exceeds limit")));
        }
        
        let mut record = Vec::new();
        (&mut self.decoder)
            .take(len as u64)
            .read_to_end(&mut record)
            .map_err(|e| SimError::Codec(format!("truncated record body: {e}")))?;
        if record.len() != len {
            return Err(SimError::Codec(format!(
                "truncated record body: {} of {len} bytes",
                record.len()
            )));
        }
        
        ObservationEnvelope::decode(&record)
            .map(Some)
            .map_err(|e| SimError::Codec(e.to_string()))
    }
}

impl<R: Read> Iterator for RawlogReader<R> {
    type Item = Result<ObservationEnvelope, SimError>;
    
    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{GrayImage, Observation, ObservationPayload};
    use crate::physics::Pose;
    
    #[test]
    fn test_rawlog_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam.rawlog");
        
        let obs = Observation::new(
            "camera1",
            1_704_067_200.125,
            &Pose::identity(),
            ObservationPayload::Image(GrayImage::new(3, 2)),
        );
        let original = obs.to_envelope("r1").unwrap();
        
        let mut writer = RawlogWriter::create(&path).unwrap();
        writer.append(&original).unwrap();
        assert_eq!(writer.records(), 1);
        writer.finish().unwrap();
        
        let records: Vec<_> = RawlogReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].unix_timestamp, original.unix_timestamp);
        assert_eq!(records[0].source_object_id, "r1");
        assert_eq!(records[0].serialized_observation, original.serialized_observation);
        assert_eq!(Observation::from_envelope(&records[0]).unwrap(), obs);
    }
    
    #[test]
    fn test_rawlog_drop_finishes_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.rawlog");
        
        {
            let mut writer = RawlogWriter::create(&path).unwrap();
            for i in 0..10 {
                let env = ObservationEnvelope::new(i as f64, "r1", vec![i as u8; i]);
                writer.append(&env).unwrap();
            }
        }
        
        let stamps: Vec<f64> = RawlogReader::open(&path)
            .unwrap()
            .map(|r| r.unwrap().unix_timestamp)
            .collect();
        assert_eq!(stamps, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }
    
    #[test]
    fn test_rawlog_readable_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.rawlog");
        
        let mut writer = RawlogWriter::create(&path).unwrap();
        for i in 0..3 {
            writer.append(&ObservationEnvelope::new(i as f64, "r1", vec![1, 2, 3])).unwrap();
        }
        
        // Writer still open: no end mark yet.
        let stamps: Vec<f64> = RawlogReader::open(&path)
            .unwrap()
            .map(|r| r.unwrap().unix_timestamp)
            .collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);
        
        writer.append(&ObservationEnvelope::new(3.0, "r1", vec![])).unwrap();
        assert_eq!(RawlogReader::open(&path).unwrap().count(), 4);
    }
    
    fn compressed(raw: &[u8]) -> Vec<u8> {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }
    
    #[test]
    fn test_oversized_length_prefix_rejected() {
        let bytes = compressed(&u32::MAX.to_le_bytes());
        let mut reader = RawlogReader::new(bytes.as_slice());
        assert!(matches!(reader.next_record(), Err(SimError::Codec(_))));
    }
    
    #[test]
    fn test_truncated_body_and_bad_envelope_are_codec_errors() {
        let mut raw = 10u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[0xAB; 4]);
        let bytes = compressed(&raw);
        let mut reader = RawlogReader::new(bytes.as_slice());
        assert!(matches!(reader.next_record(), Err(SimError::Codec(_))));
        
        let mut raw = 2u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[0xFF, 0xFF]);
        let bytes = compressed(&raw);
        let mut reader = RawlogReader::new(bytes.as_slice());
        assert!(matches!(reader.next_record(), Err(SimError::Codec(_))));
    }
    
    #[test]
    fn test_rawlog_create_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = RawlogWriter::create(dir.path().join("nope/x.rawlog"));
        assert!(matches!(result, Err(SimError::LogWriteFailure(_))));
    }
}
