use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use kira::sound::static_sound::StaticSoundData;
use kira::Frame;

use super::{PendingLoad, Resources};
use crate::error::ResourceError;

/// Fully decoded sound, ready to hand to a kira `AudioManager`.
#[derive(Debug, Clone)]
pub struct AudioClip {
    sound: StaticSoundData,
}

impl AudioClip {
    pub fn sound(&self) -> &StaticSoundData {
        &self.sound
    }

    pub fn sample_rate(&self) -> u32 {
        self.sound.sample_rate
    }

    /// Stereo frames; mono sources are duplicated to both channels.
    pub fn frames(&self) -> &[Frame] {
        &self.sound.frames
    }

    pub fn frame_count(&self) -> usize {
        self.sound.frames.len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate())
    }
}

fn decode_sound(raw: Vec<u8>) -> Result<StaticSoundData> {
    StaticSoundData::from_cursor(Cursor::new(raw))
        .map_err(|err| anyhow!("unable to decode audio: {err}"))
}

fn parse_clip(sound: StaticSoundData) -> Result<AudioClip> {
    if sound.sample_rate == 0 {
        bail!("audio stream reports a sample rate of 0");
    }
    Ok(AudioClip { sound })
}

impl Resources {
    pub fn load_audio(&self, key: &str) -> Option<PendingLoad> {
        self.load_decode_parse(&self.audio, key, decode_sound, parse_clip)
    }

    pub fn get_audio(&self, key: &str) -> Result<Arc<AudioClip>, ResourceError> {
        self.audio.get_resource(key)
    }

    pub fn unload_audio(&self, key: &str) -> Result<bool, ResourceError> {
        self.audio.unload_resource(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryFetcher;

    /// 16-bit PCM WAV with every sample set to `sample`.
    fn wave_bytes(channels: u16, rate: u32, frames: usize, sample: i16) -> Vec<u8> {
        let block_align = channels * 2;
        let mut data = Vec::new();
        for _ in 0..frames * usize::from(channels) {
            data.extend_from_slice(&sample.to_le_bytes());
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        bytes
    }

    #[test]
    fn decodes_stereo_wave() {
        let clip = parse_clip(decode_sound(wave_bytes(2, 22_050, 22_050, 0)).unwrap()).unwrap();
        assert_eq!(clip.sample_rate(), 22_050);
        assert_eq!(clip.frame_count(), 22_050);
        assert!((clip.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mono_samples_fill_both_channels() {
        let clip = parse_clip(decode_sound(wave_bytes(1, 8_000, 4, 16_384)).unwrap()).unwrap();
        let frame = clip.frames()[0];
        assert!((frame.left - 0.5).abs() < 1e-3);
        assert!((frame.right - 0.5).abs() < 1e-3);
    }

    #[test]
    fn rejects_unrecognised_bytes() {
        assert!(decode_sound(b"definitely not audio".to_vec()).is_err());
    }

    #[test]
    fn loads_through_the_cache() {
        let fetcher =
            MemoryFetcher::new().with_file("sfx/jump.wav", wave_bytes(1, 8_000, 800, 0));
        let resources = Resources::new(fetcher);
        resources.load_audio("sfx/jump.wav");
        pollster::block_on(resources.wait_on_requests()).unwrap();
        let clip = resources.get_audio("sfx/jump.wav").unwrap();
        assert!((clip.duration_secs() - 0.1).abs() < 1e-9);
        assert!(resources.unload_audio("sfx/jump.wav").unwrap());
    }
}
