mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{assert_times_close, failing_encoder, recording_encoder, solid, FakeMedia, RenderLoop};
use raytrack_capture_engine::{CaptureOptions, CaptureSession, SessionState, TimeUpdate};
use raytrack_common::config::{CaptureConfig, Format};
use raytrack_common::error::RaytrackError;
use raytrack_encoders::{ArtifactSink, ChannelTransport, Encoder, MemorySink};
use raytrack_host::{Host, HostRuntime, MediaSource};
use tokio::sync::mpsc::error::TryRecvError;

fn config(fps: u32, frame_limit: u64) -> CaptureConfig {
    CaptureConfig {
        fps,
        frame_limit,
        file_name: Some("clip".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_two_frame_limit_at_30fps() {
    let runtime = HostRuntime::new().unwrap();
    let host = runtime.host();
    let original = host.time_source();
    let sink = Rc::new(MemorySink::new());
    let done = Rc::new(Cell::new(0u32));
    let render = RenderLoop::new(|i| solid(i as u8));

    let config = config(30, 2);
    let (encoder, frames) = recording_encoder(&config, sink.clone());
    let counter = Rc::clone(&done);
    let options = CaptureOptions::new(config).on_done(move || counter.set(counter.get() + 1));
    let session = CaptureSession::with_encoder(&host, options, encoder, sink.clone()).unwrap();

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    let host = runtime.run_until_idle();

    assert_times_close(&render.capture_times(), &[0.0, 1000.0 / 30.0]);
    assert_eq!(frames.borrow().len(), 2);
    assert_eq!(session.frame_count(), 2);
    assert_eq!(done.get(), 1);
    assert_eq!(session.state(), SessionState::Finalized);

    let stored = sink.artifacts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].file_name, "clip.png");
    assert_eq!(stored[0].artifact.frames, 2);

    assert!(!host.is_overridden());
    assert!(Rc::ptr_eq(&host.time_source(), &original));
    assert!(host.take_unhandled_errors().is_empty());
}

#[test]
fn test_host_time_is_restored_after_stop() {
    let host = Host::new();
    let original = host.time_source();
    let sink = Rc::new(MemorySink::new());
    let config = CaptureConfig {
        start_time: 5_000.0,
        ..config(60, 0)
    };
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&host, CaptureOptions::new(config), encoder, sink).unwrap();

    let before = host.now_ms();
    session.start().unwrap();
    assert!(host.is_overridden());
    assert_eq!(session.state(), SessionState::Capturing);
    // Frozen until a frame step advances it, offset by the start time.
    let frozen = host.now_ms();
    assert!(frozen >= before + 5_000.0);
    assert_eq!(host.now_ms(), frozen);

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!host.is_overridden());
    assert!(Rc::ptr_eq(&host.time_source(), &original));

    session.stop().unwrap();
    assert_eq!(session.save().unwrap(), None);
    assert_eq!(session.state(), SessionState::Finalized);
    assert_eq!(session.save().unwrap(), None);
}

#[test]
fn test_second_session_cannot_start() {
    let host = Host::new();
    let sink: Rc<dyn ArtifactSink> = Rc::new(MemorySink::new());
    let make = || {
        let config = config(30, 0);
        let (encoder, _) = recording_encoder(&config, Rc::clone(&sink));
        CaptureSession::with_encoder(&host, CaptureOptions::new(config), encoder, Rc::clone(&sink))
            .unwrap()
    };
    let first = make();
    let second = make();

    first.start().unwrap();
    let err = second.start().unwrap_err();
    assert!(matches!(err, RaytrackError::OverrideActive));
    assert_eq!(second.state(), SessionState::Idle);

    first.stop().unwrap();
    second.start().unwrap();
    assert!(second.is_capturing());
    second.stop().unwrap();
}

#[test]
fn test_start_twice_is_rejected() {
    let host = Host::new();
    let sink = Rc::new(MemorySink::new());
    let config = config(30, 0);
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&host, CaptureOptions::new(config), encoder, sink).unwrap();

    session.start().unwrap();
    assert!(session.start().is_err());
    session.stop().unwrap();
    assert!(session.start().is_err());
}

#[test]
fn test_capture_outside_capturing_is_noop() {
    let host = Host::new();
    let sink = Rc::new(MemorySink::new());
    let config = config(30, 0);
    let (encoder, frames) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&host, CaptureOptions::new(config), encoder, sink).unwrap();

    session.capture(&solid(1), &[]).unwrap();
    assert_eq!(session.frame_count(), 0);

    session.start().unwrap();
    session.stop().unwrap();
    session.capture(&solid(2), &[]).unwrap();

    assert_eq!(session.frame_count(), 0);
    assert!(frames.borrow().is_empty());
}

#[test]
fn test_motion_blur_averages_sub_frames() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let render = RenderLoop::new(|i| solid(i as u8 * 10));
    let config = CaptureConfig {
        motion_blur_frames: 3,
        ..config(10, 2)
    };
    let (encoder, frames) = recording_encoder(&config, sink.clone());
    let session = CaptureSession::with_encoder(
        &runtime.host(),
        CaptureOptions::new(config),
        encoder,
        sink.clone(),
    )
    .unwrap();

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    let host = runtime.run_until_idle();

    let step = 100.0;
    assert_times_close(
        &render.capture_times(),
        &[
            0.0,
            step / 6.0,
            2.0 * step / 6.0,
            step,
            step + step / 6.0,
            step + 2.0 * step / 6.0,
        ],
    );

    let frames = frames.borrow();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].get_pixel(0, 0).0, [20, 0, 0, 255]);
    assert_eq!(frames[1].get_pixel(3, 3).0, [50, 0, 0, 255]);
    assert_eq!(session.frame_count(), 2);
    assert_eq!(session.sub_frame_count(), 0);
    assert!(host.take_unhandled_errors().is_empty());
}

#[test]
fn test_media_follows_simulated_time() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let media = Rc::new(FakeMedia::default());
    let render = RenderLoop::new(|_| solid(0)).with_media(media.clone() as Rc<dyn MediaSource>);
    let config = config(4, 3);
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&runtime.host(), CaptureOptions::new(config), encoder, sink)
            .unwrap();

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    runtime.run_until_idle();

    assert!(media.is_paused());
    assert_eq!(media.pause_calls.get(), 1);
    assert_eq!(media.current_time(), 0.75);
}

#[test]
fn test_timers_fire_on_simulated_schedule() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let render = RenderLoop::new(|_| solid(0));
    let config = config(20, 6);
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&runtime.host(), CaptureOptions::new(config), encoder, sink)
            .unwrap();

    let interval_times = Rc::new(RefCell::new(Vec::new()));
    let timeout_times = Rc::new(RefCell::new(Vec::new()));
    let cancelled = Rc::new(Cell::new(false));

    let (driver, handle) = (render.clone(), session.clone());
    let (intervals, timeouts, flag) = (
        Rc::clone(&interval_times),
        Rc::clone(&timeout_times),
        Rc::clone(&cancelled),
    );
    runtime.spawn(move |host| {
        handle.start()?;

        let clock = handle.clone();
        host.set_interval(
            Rc::new(move || {
                intervals.borrow_mut().push(clock.elapsed_ms());
                Ok(())
            }),
            100.0,
        );
        let clock = handle.clone();
        host.set_timeout(
            Rc::new(move || {
                timeouts.borrow_mut().push(clock.elapsed_ms());
                Ok(())
            }),
            120.0,
        );
        let id = host.set_timeout(
            Rc::new(move || {
                flag.set(true);
                Ok(())
            }),
            75.0,
        );
        host.clear_timeout(id);
        host.clear_timeout(id);

        driver.run(&host, &handle)
    });
    runtime.run_until_idle();

    assert_times_close(&interval_times.borrow(), &[100.0, 200.0, 300.0]);
    assert_times_close(&timeout_times.borrow(), &[150.0]);
    assert!(!cancelled.get());
}

#[test]
fn test_due_callbacks_run_in_order() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let config = config(10, 1);
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&runtime.host(), CaptureOptions::new(config), encoder, sink)
            .unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let entries = Rc::clone(&log);
    let handle = session.clone();
    runtime.spawn(move |host| {
        handle.start()?;
        let record = |label: &'static str| {
            let entries = Rc::clone(&entries);
            move || {
                entries.borrow_mut().push(label);
                Ok::<(), anyhow::Error>(())
            }
        };
        let on_frame = record("frame");
        host.request_animation_frame(Rc::new(move |_| on_frame()));
        host.set_interval(Rc::new(record("interval")), 100.0);
        host.set_timeout(Rc::new(record("timeout")), 100.0);

        handle.capture(&solid(0), &[])?;
        Ok(())
    });
    runtime.run_until_idle();

    assert_eq!(*log.borrow(), vec!["timeout", "interval", "frame"]);
}

#[test]
fn test_encode_error_aborts_session() {
    let runtime = HostRuntime::new().unwrap();
    let host = runtime.host();
    let original = host.time_source();
    let sink = Rc::new(MemorySink::new());
    let config = config(30, 0);
    let encoder = failing_encoder(&config, sink.clone());
    let session =
        CaptureSession::with_encoder(&host, CaptureOptions::new(config), encoder, sink).unwrap();

    let outcome = Rc::new(RefCell::new(None));
    let (slot, handle) = (Rc::clone(&outcome), session.clone());
    runtime.spawn(move |_| {
        handle.start()?;
        *slot.borrow_mut() = Some(handle.capture(&solid(0), &[]));
        Ok(())
    });
    let host = runtime.run_until_idle();

    let result = outcome.borrow_mut().take().unwrap();
    assert!(matches!(result, Err(RaytrackError::FrameEncode { .. })));
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.frame_count(), 0);
    assert!(Rc::ptr_eq(&host.time_source(), &original));
}

#[test]
fn test_streaming_session_sends_every_frame() {
    let runtime = HostRuntime::new().unwrap();
    let host = runtime.host();
    let sink = Rc::new(MemorySink::new());
    let (transport, mut rx) = ChannelTransport::new();
    let config = CaptureConfig {
        format: Format::Socket,
        ..config(30, 3)
    };
    let encoder = Encoder::streaming(&host, &config, Box::new(transport));
    let done = Rc::new(Cell::new(false));
    let flag = Rc::clone(&done);
    let options = CaptureOptions::new(config).on_done(move || flag.set(true));
    let session = CaptureSession::with_encoder(&host, options, encoder, sink.clone()).unwrap();
    let render = RenderLoop::new(|i| solid(i as u8));

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    let host = runtime.run_until_idle();

    assert!(done.get());
    assert_eq!(render.capture_times().len(), 3);
    for red in 1..=3u8 {
        let bytes = rx.try_recv().unwrap();
        let frame = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(0, 0)[0], red);
    }
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    assert!(sink.artifacts().is_empty());
    assert!(host.take_unhandled_errors().is_empty());
}

#[test]
fn test_time_updates_reported_each_step() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let updates: Rc<RefCell<Vec<TimeUpdate>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&updates);
    let config = config(30, 3);
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let options =
        CaptureOptions::new(config).on_update_time(move |u| seen.borrow_mut().push(u.clone()));
    let session = CaptureSession::with_encoder(&runtime.host(), options, encoder, sink).unwrap();
    let render = RenderLoop::new(|_| solid(0));

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    runtime.run_until_idle();

    let updates = updates.borrow();
    let counts: Vec<u64> = updates.iter().map(|u| u.frame_count).collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert_eq!(updates[0].estimated_seconds_remaining, None);
    assert!(updates[1].estimated_seconds_remaining.is_some());
    assert_eq!(updates[2].estimated_seconds_remaining, Some(0.0));
    assert!(updates.iter().all(|u| u.formatted_elapsed_time == "00:00:00"));
}

#[test]
fn test_auto_split_names_parts() {
    let runtime = HostRuntime::new().unwrap();
    let sink = Rc::new(MemorySink::new());
    let config = CaptureConfig {
        auto_save_time: 1.0,
        ..config(2, 7)
    };
    let (encoder, _) = recording_encoder(&config, sink.clone());
    let session = CaptureSession::with_encoder(
        &runtime.host(),
        CaptureOptions::new(config),
        encoder,
        sink.clone(),
    )
    .unwrap();
    let render = RenderLoop::new(|_| solid(0));

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    runtime.run_until_idle();

    assert_eq!(
        sink.file_names(),
        vec![
            "clip-part-0000001.png",
            "clip-part-0000002.png",
            "clip-part-0000003.png"
        ]
    );
    let frames: Vec<u64> = sink.artifacts().iter().map(|s| s.artifact.frames).collect();
    // Each split part holds one frame past the two-frame threshold.
    assert_eq!(frames, vec![3, 3, 1]);
}

#[test]
fn test_apng_written_to_output_directory() {
    let runtime = HostRuntime::new().unwrap();
    let dir = std::env::temp_dir().join(format!(
        "raytrack-session-{}",
        raytrack_common::generate_file_name()
    ));
    let config = CaptureConfig {
        output_dir: dir.clone(),
        ..config(24, 3)
    };
    let session = CaptureSession::new(&runtime.host(), CaptureOptions::new(config)).unwrap();
    assert_eq!(session.file_name(), "clip.png");
    let render = RenderLoop::new(|i| solid(i as u8 * 40));

    let (driver, handle) = (render.clone(), session.clone());
    runtime.spawn(move |host| {
        handle.start()?;
        driver.run(&host, &handle)
    });
    let host = runtime.run_until_idle();
    assert!(host.take_unhandled_errors().is_empty());

    let bytes = std::fs::read(dir.join("clip.png")).unwrap();
    let decoder = png::Decoder::new(bytes.as_slice());
    let reader = decoder.read_info().unwrap();
    assert_eq!(reader.info().animation_control.map(|c| c.num_frames), Some(3));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_invalid_configuration_fails_construction() {
    let host = Host::new();
    let zero_fps = CaptureConfig {
        fps: 0,
        ..Default::default()
    };
    let err = CaptureSession::new(&host, CaptureOptions::new(zero_fps))
        .err()
        .expect("zero fps must be rejected");
    assert!(matches!(err, RaytrackError::Config { .. }));

    let negative = CaptureConfig {
        time_limit: -1.0,
        ..Default::default()
    };
    assert!(CaptureSession::new(&host, CaptureOptions::new(negative)).is_err());
}
