use crate::audio::{Audio, AudioInfo};
use crate::audio_data::{AudioResampler, Data, LoadOptions, f32_to_pcm16};
use crate::backend::PcmFormat;
use crate::error::{PetalVoiceError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use symphonia::{
    core::{
        audio::SampleBuffer,
        codecs::{Decoder, DecoderOptions},
        errors::Error,
        formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
        io::MediaSourceStream,
        meta::MetadataOptions,
        probe::Hint,
    },
    default::{get_codecs, get_probe},
};

struct OpenedTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    n_frames: Option<u64>,
}

fn open_track(path: &str) -> Result<OpenedTrack> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            PetalVoiceError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
        })?;

    let format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PetalVoiceError::AudioLoading("No default audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PetalVoiceError::AudioLoading("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| PetalVoiceError::AudioLoading("Channel count not found".to_string()))?
        .count() as u16;

    let decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PetalVoiceError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

    Ok(OpenedTrack {
        track_id: track.id,
        n_frames: track.codec_params.n_frames,
        format,
        decoder,
        sample_rate,
        channels,
    })
}

fn pcm16_format(channels: u16) -> Result<PcmFormat> {
    PcmFormat::from_channels(channels, 16).ok_or_else(|| {
        PetalVoiceError::AudioFormat(format!(
            "{} channels cannot be played without downmixing",
            channels
        ))
    })
}

/// Decode a whole file into static content.
///
/// The result is 16-bit PCM, optionally downmixed to mono (or reduced to one
/// channel) and resampled to `options.target_sample_rate`.
pub fn load_static(path: &str, options: &LoadOptions) -> Result<Arc<Audio>> {
    let OpenedTrack {
        mut format,
        mut decoder,
        track_id,
        sample_rate,
        channels,
        ..
    } = open_track(path)?;

    if let Some(ch) = options.mono_channel {
        if ch >= channels as usize {
            return Err(PetalVoiceError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                ch,
                channels - 1
            )));
        }
    }

    let max_frames = options.max_frames(sample_rate);
    let mut samples: Vec<f32> = Vec::new();
    let mut frames_decoded = 0;

    while frames_decoded < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-file
            Err(e) => {
                return Err(PetalVoiceError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(_)) => continue, // recoverable corruption
            Err(e) => {
                return Err(PetalVoiceError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);
        samples.extend_from_slice(tmp.samples());
        frames_decoded = samples.len() / channels as usize;
    }

    samples.truncate(max_frames.saturating_mul(channels as usize).min(samples.len()));

    let (mut samples, out_channels) = if options.convert_to_mono && channels > 1 {
        let mono: Vec<f32> = match options.mono_channel {
            Some(ch) => samples.chunks(channels as usize).map(|f| f[ch]).collect(),
            None => samples
                .chunks(channels as usize)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
        };
        (mono, 1)
    } else {
        (samples, channels)
    };

    let mut out_rate = sample_rate;
    if let Some(target) = options.target_sample_rate {
        if target != sample_rate {
            let resampler = AudioResampler::new(sample_rate, target, out_channels, None)?;
            samples = resampler.resample_interleaved(&samples)?;
            out_rate = target;
        }
    }

    let format = pcm16_format(out_channels)?;
    let mut pcm = Vec::new();
    f32_to_pcm16(&samples, &mut pcm);

    log::debug!(
        "Loaded {} ({} Hz, {} ch, {} bytes of PCM)",
        path,
        out_rate,
        out_channels,
        pcm.len()
    );

    Ok(Audio::from_static(
        AudioInfo::for_pcm(format, out_rate, pcm.len()),
        pcm,
    ))
}

/// Open a file as streaming content decoded on demand.
pub fn open_streaming(path: &str) -> Result<Arc<Audio>> {
    let data = SymphoniaData::open(path)?;
    let info = *data.info();
    Ok(Audio::from_streaming(info, Box::new(data)))
}

/// Decoded bytes not handed out yet.
///
/// A decode error hit after part of a chunk was filled is held back, so the
/// bytes already written are delivered first and the error surfaces on the
/// following read.
#[derive(Default)]
struct PendingPcm {
    bytes: Vec<u8>,
    pos: usize,
    deferred: Option<PetalVoiceError>,
    finished: bool,
}

impl PendingPcm {
    fn clear(&mut self) {
        self.bytes.clear();
        self.pos = 0;
        self.deferred = None;
    }

    /// Copy into `buf`, calling `decode` for more bytes whenever the pending
    /// ones run out. `decode` returns `Ok(false)` at the end of the stream.
    fn fill(
        &mut self,
        buf: &mut [u8],
        mut decode: impl FnMut(&mut Vec<u8>) -> Result<bool>,
    ) -> Result<usize> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }

        let mut written = 0;
        while written < buf.len() && !self.finished {
            if self.pos >= self.bytes.len() {
                self.bytes.clear();
                self.pos = 0;
                match decode(&mut self.bytes) {
                    Ok(true) => continue,
                    Ok(false) => {
                        self.finished = true;
                        break;
                    }
                    Err(e) if written > 0 => {
                        self.deferred = Some(e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
            let available = &self.bytes[self.pos..];
            let n = available.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&available[..n]);
            self.pos += n;
            written += n;
        }
        Ok(written)
    }
}

/// Decode the next packet of `track_id` into `out` as 16-bit PCM. `Ok(false)`
/// at the end of the file.
fn decode_packet(
    format: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
    out: &mut Vec<u8>,
) -> Result<bool> {
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => return Ok(false),
            Err(Error::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(PetalVoiceError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut tmp = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                tmp.copy_interleaved_ref(decoded);
                for sample in tmp.samples() {
                    out.extend_from_slice(&sample.to_le_bytes());
                }
                return Ok(true);
            }
            Err(Error::IoError(_)) => return Ok(false),
            Err(Error::DecodeError(_)) => continue,
            Err(e) => {
                return Err(PetalVoiceError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        }
    }
}

/// Streaming provider decoding a file packet by packet into 16-bit PCM.
pub struct SymphoniaData {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: AudioInfo,
    pending: PendingPcm,
}

impl SymphoniaData {
    pub fn open(path: &str) -> Result<Self> {
        let track = open_track(path)?;
        let format = pcm16_format(track.channels)?;
        let duration = match track.n_frames {
            Some(frames) => Duration::from_secs_f64(frames as f64 / track.sample_rate as f64),
            None => Duration::ZERO,
        };

        Ok(Self {
            format: track.format,
            decoder: track.decoder,
            track_id: track.track_id,
            info: AudioInfo::new(format, track.sample_rate, duration),
            pending: PendingPcm::default(),
        })
    }

    pub fn info(&self) -> &AudioInfo {
        &self.info
    }
}

impl Data for SymphoniaData {
    fn reset(&mut self) {
        self.pending.clear();
        match self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: 0,
                track_id: self.track_id,
            },
        ) {
            Ok(_) => {
                self.decoder.reset();
                self.pending.finished = false;
            }
            Err(e) => {
                log::warn!("Failed to rewind stream: {:?}", e);
                self.pending.finished = true;
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Self {
            format,
            decoder,
            track_id,
            pending,
            ..
        } = self;
        let track_id = *track_id;
        pending.fill(buf, |out| {
            decode_packet(format.as_mut(), decoder.as_mut(), track_id, out)
        })
    }

    fn close(&mut self) {
        self.pending = PendingPcm {
            finished: true,
            ..PendingPcm::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_static("does/not/exist.wav", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PetalVoiceError::Io(_)));
        assert!(SymphoniaData::open("does/not/exist.ogg").is_err());
    }

    #[test]
    fn decode_error_after_partial_chunk_is_deferred() {
        let mut pending = PendingPcm::default();
        let mut calls = 0;
        let mut decode = |out: &mut Vec<u8>| {
            calls += 1;
            match calls {
                1 => {
                    out.extend_from_slice(&[1, 2, 3]);
                    Ok(true)
                }
                2 => Err(PetalVoiceError::AudioLoading("corrupt packet".to_string())),
                3 => {
                    out.extend_from_slice(&[4, 5]);
                    Ok(true)
                }
                _ => Ok(false),
            }
        };

        let mut buf = [0u8; 8];
        assert_eq!(pending.fill(&mut buf, &mut decode).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(pending.fill(&mut buf, &mut decode).is_err());
        assert_eq!(pending.fill(&mut buf, &mut decode).unwrap(), 2);
        assert_eq!(pending.fill(&mut buf, &mut decode).unwrap(), 0);
    }

    #[test]
    fn error_before_any_byte_is_reported_at_once() {
        let mut pending = PendingPcm::default();
        let mut buf = [0u8; 4];
        let result = pending.fill(&mut buf, |_| {
            Err(PetalVoiceError::AudioLoading("bad header".to_string()))
        });
        assert!(result.is_err());
        assert!(pending.deferred.is_none());
    }

    #[test]
    fn surround_needs_downmix() {
        assert!(pcm16_format(6).is_err());
        assert_eq!(pcm16_format(2).unwrap(), PcmFormat::Stereo16);
    }
}
