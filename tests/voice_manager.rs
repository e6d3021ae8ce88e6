use petalvoice::backend::{ParamKind, VoiceParam};
use petalvoice::{
    Audio, AudioContent, AudioContext, AudioInfo, AudioSource, PcmFormat, SimulatedBackend,
    UpdateTicker, Vec3, VoiceEvent, VoiceManager, VoicePoolDesc, VoiceState,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(desc: VoicePoolDesc) -> (SimulatedBackend, AudioContext, VoiceManager) {
    init_logger();
    let backend = SimulatedBackend::new();
    let ctx = AudioContext::init(backend.clone()).unwrap();
    let manager = VoiceManager::new(&ctx, desc).unwrap();
    (backend, ctx, manager)
}

fn clip() -> Arc<Audio> {
    let info = AudioInfo::for_pcm(PcmFormat::Stereo16, 44100, 4096);
    Audio::from_static(info, vec![0; 4096])
}

#[test]
fn third_source_waits_for_a_free_voice() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(2));
    let a = AudioSource::new(clip());
    let b = AudioSource::new(clip());
    let c = AudioSource::new(clip());

    manager.play(&ctx, &a);
    manager.play(&ctx, &b);
    manager.play(&ctx, &c);

    let voice_a = a.voice().unwrap();
    assert!(b.voice().is_some());
    assert!(c.voice().is_none());
    assert_eq!(manager.free_voices(), 0);
    assert!(
        manager
            .poll_events()
            .contains(&VoiceEvent::Dropped { source_id: c.id() })
    );

    backend.finish(voice_a);
    manager.update(&ctx);
    assert!(a.voice().is_none());
    assert_eq!(manager.free_voices(), 1);

    manager.play(&ctx, &c);
    assert_eq!(c.voice(), Some(voice_a));
    assert_eq!(backend.state_of(voice_a), Some(VoiceState::Playing));

    manager.shutdown(&ctx);
}

#[test]
fn pause_and_stop_are_idempotent() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(1));
    let source = AudioSource::new(clip());
    manager.play(&ctx, &source);

    manager.pause(&ctx, &source);
    assert_eq!(manager.state(&ctx, &source), VoiceState::Paused);
    let commands = backend.command_count();
    manager.pause(&ctx, &source);
    assert_eq!(backend.command_count(), commands);

    manager.resume(&ctx, &source);
    assert_eq!(manager.state(&ctx, &source), VoiceState::Playing);
    let commands = backend.command_count();
    manager.resume(&ctx, &source);
    assert_eq!(backend.command_count(), commands);

    manager.stop(&ctx, &source);
    let commands = backend.command_count();
    manager.stop(&ctx, &source);
    manager.pause(&ctx, &source);
    manager.resume(&ctx, &source);
    assert_eq!(backend.command_count(), commands);

    // The voice is only returned by the next sweep
    assert!(source.voice().is_some());
    manager.update(&ctx);
    assert!(source.voice().is_none());

    let commands = backend.command_count();
    manager.stop(&ctx, &source);
    assert_eq!(backend.command_count(), commands);

    manager.shutdown(&ctx);
}

#[test]
fn dirty_params_converge_after_one_sweep() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(1));
    let source = AudioSource::new(clip());
    manager.play(&ctx, &source);
    let voice = source.voice().unwrap();
    let pushes = backend.param_pushes(voice);

    source.set_position(Vec3::new(3.0, 0.0, -1.0));
    source.set_velocity(Vec3::X);
    assert!(source.set_pitch(1.5));
    assert!(!source.set_volume(4.0));
    source.set_looping(false); // unchanged, not dirty

    manager.update(&ctx);
    assert_eq!(backend.param_pushes(voice), pushes + 3);
    assert_eq!(
        backend.param(voice, ParamKind::Pitch),
        Some(VoiceParam::Pitch(1.5))
    );
    assert!(source.dirty().is_empty());

    manager.update(&ctx);
    assert_eq!(backend.param_pushes(voice), pushes + 3);

    manager.shutdown(&ctx);
}

#[test]
fn parameters_set_without_a_voice_are_pushed_on_play() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(1));
    let source = AudioSource::new(clip());
    source.set_positional(false);
    source.set_position(Vec3::splat(5.0));
    source.set_directional(true);
    source.set_direction(Vec3::Z);

    manager.play(&ctx, &source);
    let voice = source.voice().unwrap();
    assert_eq!(
        backend.param(voice, ParamKind::Relative),
        Some(VoiceParam::Relative(true))
    );
    assert_eq!(
        backend.param(voice, ParamKind::Position),
        Some(VoiceParam::Position(Vec3::ZERO))
    );
    assert_eq!(
        backend.param(voice, ParamKind::Direction),
        Some(VoiceParam::Direction(Vec3::Z))
    );
    assert!(source.dirty().is_empty());

    manager.shutdown(&ctx);
}

#[test]
fn static_clip_is_uploaded_once_for_all_sources() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(4));
    let audio = clip();
    let sources: Vec<_> = (0..3).map(|_| AudioSource::new(audio.clone())).collect();
    for source in &sources {
        manager.play(&ctx, source);
    }

    let AudioContent::Static(static_clip) = audio.content() else {
        panic!("expected static content");
    };
    let buffer = static_clip.buffer().unwrap();
    assert_eq!(backend.upload_count(buffer), 1);
    assert!(!static_clip.has_host_copy());
    for source in &sources {
        assert_eq!(backend.bound_buffer(source.voice().unwrap()), Some(buffer));
    }

    // Still bound: disposing must wait
    assert!(audio.dispose(&ctx).is_err());
    manager.stop_all(&ctx);
    manager.update(&ctx);
    assert_eq!(manager.active_voices(), 0);
    assert!(audio.dispose(&ctx).is_ok());

    manager.shutdown(&ctx);
}

#[test]
fn replay_restarts_on_the_same_voice() {
    let (backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(2));
    let source = AudioSource::new(clip());
    manager.play(&ctx, &source);
    let voice = source.voice().unwrap();

    manager.play(&ctx, &source);
    assert_eq!(source.voice(), Some(voice));
    assert_eq!(manager.free_voices(), 1);
    assert_eq!(manager.active_voices(), 1);
    assert_eq!(backend.state_of(voice), Some(VoiceState::Playing));

    manager.shutdown(&ctx);
}

#[test]
fn global_transport_reaches_every_voice() {
    let (_backend, ctx, manager) = setup(VoicePoolDesc::new().max_sources(3));
    let sources: Vec<_> = (0..3).map(|_| AudioSource::new(clip())).collect();
    for source in &sources {
        manager.play(&ctx, source);
    }

    manager.pause_all(&ctx);
    assert!(
        sources
            .iter()
            .all(|s| manager.state(&ctx, s) == VoiceState::Paused)
    );

    manager.resume_all(&ctx);
    assert!(
        sources
            .iter()
            .all(|s| manager.state(&ctx, s) == VoiceState::Playing)
    );

    manager.stop_all(&ctx);
    manager.update(&ctx);
    assert_eq!(manager.free_voices(), 3);
    let reclaimed = manager
        .poll_events()
        .into_iter()
        .filter(|e| matches!(e, VoiceEvent::Reclaimed { .. }))
        .count();
    assert_eq!(reclaimed, 3);

    manager.shutdown(&ctx);
}

#[test]
fn ticker_reclaims_in_the_background() {
    init_logger();
    let backend = SimulatedBackend::new();
    let ctx = Arc::new(AudioContext::init(backend.clone()).unwrap());
    let manager = Arc::new(VoiceManager::new(&ctx, VoicePoolDesc::new().max_sources(1)).unwrap());

    let mut ticker =
        UpdateTicker::start(ctx.clone(), manager.clone(), Duration::from_millis(5)).unwrap();
    assert!(ticker.is_running());

    let source = AudioSource::new(clip());
    manager.play(&ctx, &source);
    backend.finish(source.voice().unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    while source.voice().is_some() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(source.voice().is_none());

    ticker.stop();
    assert!(!ticker.is_running());
    assert!(ticker.ticks() > 0);

    manager.shutdown(&ctx);
}

#[test]
fn zero_interval_ticker_is_rejected() {
    init_logger();
    let ctx = Arc::new(AudioContext::init(SimulatedBackend::new()).unwrap());
    let manager = Arc::new(VoiceManager::new(&ctx, VoicePoolDesc::default()).unwrap());
    assert!(UpdateTicker::start(ctx.clone(), manager.clone(), Duration::ZERO).is_err());
    manager.shutdown(&ctx);
}
