//! Renderer and end-to-end mixdown tests

use padmix::audio::{encode_wav, StereoBuffer, WAV_HEADER_BYTES};
use padmix::config::Config;
use padmix::error::MixError;
use padmix::event::{Event, Instrument, Recording};
use padmix::mix_plan::{build_plan, MixRequest};
use padmix::render::{render, CancelToken, RenderOptions};
use padmix::samples::{DirectoryResolver, MemoryResolver};
use padmix::settings::{MasterSettings, TrackSettings};
use padmix::Mixdown;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Short decaying noise-free "hit" encoded as WAV bytes
fn generate_hit_wav(frames: usize, freq_hz: f32) -> Vec<u8> {
    let samples: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / 44100.0;
            (2.0 * std::f32::consts::PI * freq_hz * t).sin() * (-t * 30.0).exp() * 0.8
        })
        .collect();
    encode_wav(&StereoBuffer::from_mono(44100, samples)).unwrap()
}

/// Single full-scale click followed by silence
fn generate_click_wav() -> Vec<u8> {
    let mut samples = vec![0.0f32; 32];
    samples[0] = 1.0;
    encode_wav(&StereoBuffer::from_mono(44100, samples)).unwrap()
}

fn drum_kit() -> MemoryResolver {
    MemoryResolver::new()
        .with_sample("kick", generate_hit_wav(4410, 60.0))
        .with_sample("snare", generate_hit_wav(4410, 200.0))
}

fn kick_snare_recording() -> Recording {
    Recording::new(
        Instrument::Drums,
        vec![
            Event::new(Instrument::Drums, "kick", 0.0),
            Event::new(Instrument::Drums, "snare", 500.0),
        ],
        1000.0,
    )
}

/// Master settings that leave the signal untouched
fn transparent_master() -> MasterSettings {
    MasterSettings {
        volume: 1.0,
        compression_ratio: 1.0,
        reverb_mix: 0.0,
        effects_amount: 0.0,
    }
}

fn unity_track() -> TrackSettings {
    TrackSettings {
        volume: 1.0,
        ..TrackSettings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_kick_and_snare() {
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let mixdown = Mixdown::default();
        let mut rng = StdRng::seed_from_u64(5);

        let output = mixdown
            .run(&recordings, &request, &drum_kit(), &mut rng, &RenderOptions::default())
            .unwrap();

        assert_eq!(output.track_count, 1);
        assert!(output.frames >= 441000);
        assert_eq!(output.wav.len(), WAV_HEADER_BYTES + output.frames * 4);
        assert_eq!(output.scheduled_events, 2);
        assert_eq!(output.skipped_events, 0);
        assert!(output.duration_ms >= 10000.0);
    }

    #[test]
    fn test_missing_sample_skips_only_that_event() {
        let resolver = MemoryResolver::new().with_sample("kick", generate_hit_wav(4410, 60.0));
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(5);

        let plan = build_plan(&recordings, &request, &config, &mut rng).unwrap();
        let rendered = render(&plan, &resolver, &config, &mut rng, &RenderOptions::default()).unwrap();
        assert_eq!(rendered.scheduled, 1);
        assert_eq!(rendered.skipped, 1);
        assert_eq!(rendered.buffer.frames(), 441000);
        assert!(rendered.buffer.peak() > 0.0);
    }

    #[test]
    fn test_undecodable_sample_is_skipped() {
        let resolver = MemoryResolver::new()
            .with_sample("kick", b"garbage".to_vec())
            .with_sample("snare", generate_hit_wav(4410, 200.0));
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let output = Mixdown::default()
            .run(
                &recordings,
                &request,
                &resolver,
                &mut StdRng::seed_from_u64(1),
                &RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(output.skipped_events, 1);
        assert_eq!(output.scheduled_events, 1);
    }

    #[test]
    fn test_event_lands_on_its_start_frame() {
        let resolver = MemoryResolver::new().with_sample("kick", generate_click_wav());
        let recordings = vec![Recording::new(
            Instrument::Drums,
            vec![Event::new(Instrument::Drums, "kick", 250.0).with_velocity(0.5)],
            500.0,
        )];
        let request = MixRequest::new(120.0)
            .with_track(0, unity_track())
            .with_master(transparent_master());
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(3);

        let plan = build_plan(&recordings, &request, &config, &mut rng).unwrap();
        let rendered = render(&plan, &resolver, &config, &mut rng, &RenderOptions::default()).unwrap();
        let buffer = rendered.buffer;

        // 16-bit full scale decodes to 32767/32768
        assert!((buffer.left[11025] - 0.5).abs() < 1e-4);
        assert!((buffer.right[11025] - 0.5).abs() < 1e-4);
        assert_eq!(buffer.left[11024], 0.0);
        assert_eq!(buffer.left[11026], 0.0);
    }

    #[test]
    fn test_hard_right_pan_silences_left() {
        let resolver = MemoryResolver::new().with_sample("kick", generate_click_wav());
        let recordings = vec![Recording::new(
            Instrument::Drums,
            vec![Event::new(Instrument::Drums, "kick", 0.0)],
            100.0,
        )];
        let request = MixRequest::new(120.0)
            .with_track(
                0,
                TrackSettings {
                    pan: 1.0,
                    ..unity_track()
                },
            )
            .with_master(transparent_master());
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(3);

        let plan = build_plan(&recordings, &request, &config, &mut rng).unwrap();
        let buffer = render(&plan, &resolver, &config, &mut rng, &RenderOptions::default())
            .unwrap()
            .buffer;
        assert!(buffer.left[0].abs() < 1e-6);
        assert!((buffer.right[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_same_seed_same_bytes() {
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let mixdown = Mixdown::default();
        let a = mixdown
            .run(
                &recordings,
                &request,
                &drum_kit(),
                &mut StdRng::seed_from_u64(77),
                &RenderOptions::default(),
            )
            .unwrap();
        let b = mixdown
            .run(
                &recordings,
                &request,
                &drum_kit(),
                &mut StdRng::seed_from_u64(77),
                &RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(a.wav, b.wav);
    }

    #[test]
    fn test_effects_bus_adds_signal() {
        let recordings = vec![kick_snare_recording()];
        let config = Config::default();
        let dry_master = transparent_master();
        let wet_master = MasterSettings {
            effects_amount: 0.5,
            ..dry_master
        };

        let render_with = |master: MasterSettings| {
            let request = MixRequest::new(120.0)
                .with_track(0, unity_track())
                .with_master(master);
            let mut rng = StdRng::seed_from_u64(2);
            let plan = build_plan(&recordings, &request, &config, &mut rng).unwrap();
            render(&plan, &drum_kit(), &config, &mut rng, &RenderOptions::default())
                .unwrap()
                .buffer
        };

        let dry = render_with(dry_master);
        let wet = render_with(wet_master);
        assert_eq!(dry.frames(), wet.frames());
        // the echo at 0.15s lands where the dry kick has long decayed
        let echo_frame = (0.15 * 44100.0) as usize + 100;
        assert!(dry.left[echo_frame].abs() < 1e-2);
        let energy = |b: &StereoBuffer| b.left.iter().map(|x| x * x).sum::<f32>();
        assert!(energy(&wet) > energy(&dry));
    }

    #[test]
    fn test_muted_track_silences_its_effects() {
        let recordings = vec![Recording::new(
            Instrument::Drums,
            vec![Event::new(Instrument::Drums, "kick", 0.0)],
            500.0,
        )];
        let request = MixRequest::new(120.0)
            .with_track(
                0,
                TrackSettings {
                    volume: 0.0,
                    ..TrackSettings::default()
                },
            )
            .with_master(MasterSettings {
                effects_amount: 0.5,
                ..transparent_master()
            });
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(9);

        let plan = build_plan(&recordings, &request, &config, &mut rng).unwrap();
        let rendered = render(&plan, &drum_kit(), &config, &mut rng, &RenderOptions::default())
            .unwrap();
        assert_eq!(rendered.scheduled, 1);
        assert_eq!(rendered.buffer.peak(), 0.0);
    }

    #[test]
    fn test_cancelled_render_produces_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let err = Mixdown::default()
            .run(
                &recordings,
                &request,
                &drum_kit(),
                &mut StdRng::seed_from_u64(1),
                &RenderOptions::default().with_cancel(token),
            )
            .unwrap_err();
        assert!(matches!(err, MixError::Cancelled));
    }

    #[test]
    fn test_timeout_aborts_render() {
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let err = Mixdown::default()
            .run(
                &recordings,
                &request,
                &drum_kit(),
                &mut StdRng::seed_from_u64(1),
                &RenderOptions::default().with_timeout(Duration::from_nanos(1)),
            )
            .unwrap_err();
        assert!(matches!(err, MixError::TimedOut(_)));
    }

    #[test]
    fn test_directory_resolver_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kick.wav"), generate_hit_wav(2205, 60.0)).unwrap();
        std::fs::write(dir.path().join("snare.wav"), generate_hit_wav(2205, 200.0)).unwrap();

        let resolver = DirectoryResolver::new(dir.path());
        let recordings = vec![kick_snare_recording()];
        let request = MixRequest::new(120.0).with_track(0, TrackSettings::default());
        let output = Mixdown::default()
            .run(
                &recordings,
                &request,
                &resolver,
                &mut StdRng::seed_from_u64(4),
                &RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(output.scheduled_events, 2);
        assert_eq!(output.skipped_events, 0);
    }
}
