use crate::error::{PetalVoiceError, Result};
use rubato::{FftFixedIn, Resampler};

/// Offline sample-rate converter for interleaved f32 audio.
pub struct AudioResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl AudioResampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(PetalVoiceError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(PetalVoiceError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024),
        })
    }

    /// Resample interleaved samples, returning interleaved samples.
    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let frames = interleaved.len() / channels;

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            channels,
        )
        .map_err(|e| PetalVoiceError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| interleaved.iter().skip(ch).step_by(channels).copied().collect())
            .collect();

        // The FFT resampler may round the requested chunk size up
        let chunk_size = resampler.input_frames_next();
        let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
        let mut chunk: Vec<Vec<f32>> = vec![vec![0.0; chunk_size]; channels];
        let mut frame_idx = 0;

        while frame_idx < frames {
            let take = (frames - frame_idx).min(chunk_size);
            for (ch, input) in planar.iter().enumerate() {
                chunk[ch][..take].copy_from_slice(&input[frame_idx..frame_idx + take]);
                // Pad the last chunk with silence
                chunk[ch][take..].fill(0.0);
            }

            let waves_out = resampler
                .process(&chunk, None)
                .map_err(|e| PetalVoiceError::AudioLoading(format!("Resampling error: {}", e)))?;

            for (out, wave) in output.iter_mut().zip(waves_out) {
                out.extend_from_slice(&wave);
            }
            frame_idx += take;
        }

        let expected = (frames as f64 * self.resample_ratio()).ceil() as usize;
        let new_frames = output.first().map_or(0, |o| o.len().min(expected));

        let mut result = Vec::with_capacity(new_frames * channels);
        for frame in 0..new_frames {
            for out in &output {
                result.push(out[frame]);
            }
        }
        Ok(result)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}
