//! Record the demo animation.
//!
//! A square slides across the canvas at a speed read from the host clock and
//! changes colour on an interval timer. Under capture both follow simulated
//! time, so the output is identical on every run.

use std::cell::Cell;
use std::rc::Rc;

use image::Rgba;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use raytrack_capture_engine::{CaptureOptions, CaptureSession, TimeUpdate};
use raytrack_common::config::{CaptureConfig, Format};
use raytrack_host::{CallbackResult, Host, HostRuntime, Surface};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
const SQUARE: u32 = 40;

/// Canvas pixels the square moves per second.
const SPEED: f64 = 120.0;

/// How often the square changes colour.
const COLOUR_PERIOD_MS: f64 = 500.0;

const PALETTE: [Rgba<u8>; 2] = [Rgba([230, 80, 60, 255]), Rgba([60, 140, 230, 255])];

/// Animation state shared between the render loop and the colour timer.
struct Scene {
    origin_ms: f64,
    colour: Cell<usize>,
}

impl Scene {
    fn draw(&self, now_ms: f64) -> Surface {
        let mut surface = Surface::from_pixel(WIDTH, HEIGHT, Rgba([16, 16, 24, 255]));
        let travel = f64::from(WIDTH - SQUARE);
        let distance = ((now_ms - self.origin_ms) / 1_000.0 * SPEED).max(0.0) % (2.0 * travel);
        let x = if distance > travel {
            2.0 * travel - distance
        } else {
            distance
        };
        let y = (HEIGHT - SQUARE) / 2;
        draw_filled_rect_mut(
            &mut surface,
            Rect::at(x.round() as i32, y as i32).of_size(SQUARE, SQUARE),
            PALETTE[self.colour.get() % PALETTE.len()],
        );
        surface
    }
}

fn render(host: &Host, session: &CaptureSession, scene: &Rc<Scene>) -> CallbackResult {
    if !session.is_capturing() {
        return Ok(());
    }
    let surface = scene.draw(host.high_res_now_ms());

    let (next_host, next_session, next_scene) = (host.clone(), session.clone(), Rc::clone(scene));
    host.request_animation_frame(Rc::new(move |_timestamp| {
        render(&next_host, &next_session, &next_scene)
    }));

    session.capture(&surface, &[])?;
    Ok(())
}

fn print_progress(update: &TimeUpdate) {
    match update.estimated_seconds_remaining {
        Some(remaining) => eprint!(
            "\r  {} frames  {}  ~{remaining:.1}s left   ",
            update.frame_count, update.formatted_elapsed_time
        ),
        None => eprint!(
            "\r  {} frames  {}   ",
            update.frame_count, update.formatted_elapsed_time
        ),
    }
}

pub fn run(config: CaptureConfig) -> anyhow::Result<()> {
    println!("Recording demo animation");
    println!("  Format: {}", config.format);
    println!("  FPS: {}", config.fps);
    if config.frame_limit > 0 {
        println!("  Frames: {}", config.frame_limit);
    } else {
        println!("  Seconds: {}", config.time_limit);
    }
    if config.motion_blur_enabled() {
        println!("  Motion blur: {} samples", config.motion_blur_frames);
    }
    println!();

    let runtime = HostRuntime::new()?;
    let output_dir = config.output_dir.clone();
    let stream_address = config.stream_address.clone();
    let format = config.format;

    let options = CaptureOptions::new(config)
        .on_update_time(print_progress)
        .on_done(|| eprintln!());
    let session = CaptureSession::new(&runtime.host(), options)?;

    let handle = session.clone();
    runtime.spawn(move |host| {
        handle.start()?;

        let scene = Rc::new(Scene {
            origin_ms: host.high_res_now_ms(),
            colour: Cell::new(0),
        });
        let timer_scene = Rc::clone(&scene);
        host.set_interval(
            Rc::new(move || {
                timer_scene.colour.set(timer_scene.colour.get() + 1);
                Ok(())
            }),
            COLOUR_PERIOD_MS,
        );

        render(&host, &handle, &scene)
    });
    let host = runtime.run_until_idle();
    tracing::debug!(frames = session.frame_count(), "Demo recording finished");

    if let Some(err) = host.take_unhandled_errors().into_iter().next() {
        return Err(err.context("Recording failed"));
    }

    match format {
        Format::Socket => println!("Frames streamed to: {stream_address}"),
        Format::Apng | Format::Webm => {
            println!("Recording saved to: {}", output_dir.join(session.file_name()).display())
        }
    }
    Ok(())
}
