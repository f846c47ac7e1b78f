//! Per-frame driver and frame statistics.

use crate::engine::EngineError;
use std::time::{Duration, Instant};

/// Work a view performs on each display refresh, in the order the driver
/// invokes it.
pub trait FrameTarget {
    /// Non-blocking check of the in-flight load fence.
    fn poll_load_fence(&mut self, now: Instant);
    fn advance_animation(&mut self, elapsed: Duration);
    fn render_frame(&mut self, now: Instant) -> Result<(), EngineError>;
    /// Hand over pick results produced by the frame just rendered.
    fn deliver_picks(&mut self);
}

/// Self-rearming per-frame callback.
///
/// The host calls `tick` on every display refresh; the driver only does work
/// while started. Stopping is "do not re-arm": a tick already armed still
/// runs once, then nothing runs until `start`.
pub struct FrameDriver {
    running: bool,
    armed: bool,
    started: Instant,
    stats: FrameStats,
    dropped_frames: u64,
}

impl FrameDriver {
    pub fn new(now: Instant) -> Self {
        Self {
            running: false,
            armed: false,
            started: now,
            stats: FrameStats::new(now),
            dropped_frames: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::info!("Frame driver started");
        }
        self.running = true;
        self.armed = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            log::info!("Frame driver stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the next `tick` will do work.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Runs one frame. Returns false when the driver was not armed.
    pub fn tick<T: FrameTarget + ?Sized>(&mut self, now: Instant, target: &mut T) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = self.running;

        target.poll_load_fence(now);
        target.advance_animation(now.saturating_duration_since(self.started));

        let render_start = Instant::now();
        if let Err(err) = target.render_frame(now) {
            self.dropped_frames += 1;
            log::error!("Frame render failed, skipping frame: {err}");
        }
        self.stats
            .set_render_ms(render_start.elapsed().as_secs_f32() * 1000.0);

        target.deliver_picks();
        self.stats.update(now);
        true
    }
}

/// Frame cadence, with fps averaged over half-second windows.
pub struct FrameStats {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
    fps: f32,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            fps: 0.0,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn update(&mut self, now: Instant) {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            log::debug!(
                "{:.1} fps (cadence {:.2} ms, render {:.2} ms)",
                self.fps,
                self.frame_dt * 1000.0,
                self.render_ms
            );
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_render: bool,
    }

    impl FrameTarget for Recorder {
        fn poll_load_fence(&mut self, _now: Instant) {
            self.calls.push("fence".to_string());
        }

        fn advance_animation(&mut self, elapsed: Duration) {
            self.calls.push(format!("animate {}", elapsed.as_millis()));
        }

        fn render_frame(&mut self, _now: Instant) -> Result<(), EngineError> {
            self.calls.push("render".to_string());
            if self.fail_render {
                Err(EngineError::Render("swap chain lost".to_string()))
            } else {
                Ok(())
            }
        }

        fn deliver_picks(&mut self) {
            self.calls.push("picks".to_string());
        }
    }

    #[test]
    fn tick_runs_steps_in_order() {
        let t0 = Instant::now();
        let mut driver = FrameDriver::new(t0);
        let mut target = Recorder::default();
        driver.start();

        assert!(driver.tick(t0 + Duration::from_millis(250), &mut target));
        assert_eq!(target.calls, ["fence", "animate 250", "render", "picks"]);
        assert!(driver.is_armed());
    }

    #[test]
    fn stopped_driver_does_nothing() {
        let t0 = Instant::now();
        let mut driver = FrameDriver::new(t0);
        let mut target = Recorder::default();
        assert!(!driver.tick(t0, &mut target));

        driver.start();
        driver.stop();
        // Already armed: the in-flight frame still runs, then nothing.
        assert!(driver.tick(t0, &mut target));
        assert!(!driver.tick(t0, &mut target));
        assert_eq!(target.calls.len(), 4);

        driver.start();
        assert!(driver.tick(t0, &mut target));
        assert_eq!(target.calls.len(), 8);
    }

    #[test]
    fn render_failure_does_not_stop_the_loop() {
        let t0 = Instant::now();
        let mut driver = FrameDriver::new(t0);
        let mut target = Recorder {
            fail_render: true,
            ..Recorder::default()
        };
        driver.start();

        assert!(driver.tick(t0, &mut target));
        assert!(driver.tick(t0, &mut target));
        assert_eq!(driver.dropped_frames(), 2);
        assert!(driver.is_armed());
        assert_eq!(target.calls.last().map(String::as_str), Some("picks"));
    }

    #[test]
    fn fps_is_averaged_over_half_second_windows() {
        let t0 = Instant::now();
        let mut stats = FrameStats::new(t0);
        for frame in 1..=30 {
            stats.update(t0 + Duration::from_millis(frame * 20));
        }
        assert!((stats.fps() - 50.0).abs() < 0.01);
        assert!((stats.frame_dt - 0.02).abs() < 1e-6);
    }
}
