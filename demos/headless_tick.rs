use anyhow::Result;
use petalvoice::audio_data::{MemoryData, open_streaming};
use petalvoice::{
    Audio, AudioContext, AudioInfo, Listener, Orientation, PcmFormat,
    SimulatedBackend, UpdateTicker, Vec3, VoiceManager, VoicePoolDesc,
};
use std::sync::Arc;
use std::time::Duration;

/// Two seconds of a 440 Hz tone as 16-bit mono PCM
fn sine_wave(sample_rate: u32) -> Vec<u8> {
    let frames = sample_rate as usize * 2;
    let mut pcm = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.2;
        pcm.extend_from_slice(&((sample * i16::MAX as f32) as i16).to_le_bytes());
    }
    pcm
}

/// Drives a looping stream and a handful of one-shots through the simulated
/// backend, printing what the manager does.
///
/// Pass a path to stream a file instead of the generated tone.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let backend = SimulatedBackend::new();
    let ctx = Arc::new(AudioContext::init(backend.clone())?);
    let desc = VoicePoolDesc::new().max_sources(4).chunk_size(8 * 1024);
    let manager = Arc::new(VoiceManager::new(&ctx, desc)?);

    manager.apply_listener(
        &ctx,
        &Listener::new()
            .position(Vec3::new(0.0, 1.8, 0.0))
            .orientation(Orientation::look_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)),
    );

    let music = match std::env::args().nth(1) {
        Some(path) => open_streaming(&path)?,
        None => {
            let pcm = sine_wave(22050);
            let info = AudioInfo::for_pcm(PcmFormat::Mono16, 22050, pcm.len());
            Audio::from_streaming(info, Box::new(MemoryData::new(pcm)))
        }
    };
    let music_source = manager.source(music.clone());
    music_source.set_looping(true);
    music_source.set_positional(false);

    let blip = {
        let pcm = sine_wave(11025);
        let info = AudioInfo::for_pcm(PcmFormat::Mono16, 11025, pcm.len());
        Audio::from_static(info, pcm)
    };
    let blips: Vec<_> = (0..6)
        .map(|i| {
            let source = manager.source(blip.clone());
            source.set_position(Vec3::new(i as f32 - 3.0, 0.0, -2.0));
            source
        })
        .collect();

    let mut ticker = UpdateTicker::start(ctx.clone(), manager.clone(), manager.desc().update_interval)?;

    manager.play(&ctx, &music_source);
    for blip in &blips {
        manager.play(&ctx, blip);
    }
    println!(
        "Voices in use: {} of {}",
        manager.active_voices(),
        manager.desc().max_sources
    );

    // Pretend the device plays one streaming buffer and finishes one blip per step
    for step in 0..20 {
        if let Some(voice) = music_source.voice() {
            backend.consume(voice, 1);
        }
        if let Some(voice) = blips.iter().find_map(|b| b.voice()) {
            backend.finish(voice);
        }
        std::thread::sleep(Duration::from_millis(60));

        for event in manager.poll_events() {
            println!("step {:>2}: {:?}", step, event);
        }
        // Blips dropped for lack of voices get another chance
        for blip in &blips {
            if blip.voice().is_none() && step % 5 == 4 {
                manager.play(&ctx, blip);
            }
        }
    }

    ticker.stop();
    println!("Ticker ran {} sweeps", ticker.ticks());

    manager.shutdown(&ctx);
    music.dispose(&ctx)?;
    blip.dispose(&ctx)?;
    println!("Backend commands issued: {}", backend.command_count());

    Ok(())
}
