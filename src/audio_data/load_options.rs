use std::time::Duration;

/// Options for [`load_static`](super::load_static).
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Target sample rate for resampling (None = keep original)
    pub target_sample_rate: Option<u32>,
    /// Downmix to mono after loading
    pub convert_to_mono: bool,
    /// Maximum duration to load (None = load entire file)
    pub max_duration: Option<Duration>,
    /// Which channel to keep for mono conversion (None = mix all channels)
    pub mono_channel: Option<usize>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }

    pub fn convert_to_mono(mut self, convert: bool) -> Self {
        self.convert_to_mono = convert;
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Keep one channel instead of downmixing. Implies mono conversion.
    pub fn mono_channel(mut self, channel: usize) -> Self {
        self.mono_channel = Some(channel);
        self.convert_to_mono = true;
        self
    }

    /// Frame limit implied by `max_duration` at the given rate.
    pub(crate) fn max_frames(&self, sample_rate: u32) -> usize {
        self.max_duration
            .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
            .unwrap_or(usize::MAX)
    }
}
