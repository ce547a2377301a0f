// Utterance payload assembly.
//
// At the end of one recording episode the buffered frames are flattened into
// a single WAV payload (16-bit PCM) and sent to the backend as one binary
// message. The buffer is drained exactly once per episode.

use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::AudioFrame;

/// Assemble buffered frames into one in-memory WAV payload, consuming them.
///
/// Returns `None` when the episode captured nothing (no frames or only empty
/// frames); sending an empty utterance would only make the backend guess.
pub fn assemble_wav(frames: Vec<AudioFrame>) -> Result<Option<Vec<u8>>> {
    let Some(first) = frames.iter().find(|f| !f.samples.is_empty()) else {
        return Ok(None);
    };

    let spec = hound::WavSpec {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for frame in &frames {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV payload")?;
            }
        }
        writer.finalize().context("Failed to finalize WAV payload")?;
    }

    Ok(Some(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }

    #[test]
    fn empty_episode_produces_no_payload() {
        assert!(assemble_wav(Vec::new()).unwrap().is_none());
        assert!(assemble_wav(vec![frame(Vec::new(), 0)]).unwrap().is_none());
    }

    #[test]
    fn frames_concatenate_into_one_wav() {
        let payload = assemble_wav(vec![
            frame(vec![1, 2, 3], 0),
            frame(vec![4, 5, 6], 100),
        ])
        .unwrap()
        .expect("payload");

        let reader = hound::WavReader::new(Cursor::new(payload)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn header_matches_first_nonempty_frame() {
        let mut f = frame(vec![9; 160], 0);
        f.sample_rate = 24000;
        let payload = assemble_wav(vec![frame(Vec::new(), 0), f]).unwrap().unwrap();
        let reader = hound::WavReader::new(Cursor::new(payload)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
    }
}
