//! WAV helpers: open-ended streaming header and duration probing

use std::path::Path;

/// Size field value for a stream of unknown length
pub const UNKNOWN_SIZE: u32 = 0xFFFF_FFFF;

/// Length of the canonical PCM header
pub const HEADER_LEN: usize = 44;

/// 44-byte PCM WAV header with unresolved RIFF and data sizes
pub fn streaming_header(sample_rate: u32, channels: u16, bits_per_sample: u16) -> [u8; HEADER_LEN] {
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    // PCM
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    header
}

/// Duration in whole seconds, if the file is a readable WAV
pub fn probe_duration_secs(path: &Path) -> Option<u64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    // duration() counts frames (samples per channel)
    Some(u64::from(reader.duration()) / u64::from(spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = streaming_header(44100, 1, 16);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[4..8], &[0xFF; 4]);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 1);
        assert_eq!(u32::from_le_bytes(header[24..28].try_into().unwrap()), 44100);
        assert_eq!(u32::from_le_bytes(header[28..32].try_into().unwrap()), 88200);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 2);
        assert_eq!(u16::from_le_bytes([header[34], header[35]]), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(&header[40..44], &[0xFF; 4]);
    }

    #[test]
    fn test_stereo_block_align() {
        let header = streaming_header(48000, 2, 16);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(u32::from_le_bytes(header[28..32].try_into().unwrap()), 192_000);
    }

    #[test]
    fn test_probe_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert_eq!(probe_duration_secs(&path), Some(2));
    }

    #[test]
    fn test_probe_non_wav_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();
        assert_eq!(probe_duration_secs(&path), None);
        assert_eq!(probe_duration_secs(&dir.path().join("missing.wav")), None);
    }
}
