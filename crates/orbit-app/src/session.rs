// SPDX-License-Identifier: CEPL-1.0
use orbit_math::Camera;
use orbit_platform::{EventQueue, InputAction, InputEvent, InputState};
use orbit_render::{
    FrameDevice, FrameError, FrameLoop, FrameOutcome, FrameUniforms, RenderSize,
};
use tracing::{debug, info, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// One viewer run: the frame loop plus the camera it feeds and the input
/// that moves the camera.
pub struct Session<D: FrameDevice> {
    camera: Camera,
    input: InputState,
    events: EventQueue,
    frame_loop: FrameLoop<D>,
}

impl<D: FrameDevice> Session<D> {
    pub fn new(device: D) -> Result<Self, FrameError> {
        Ok(Self {
            camera: Camera::default(),
            input: InputState::default(),
            events: EventQueue::new(),
            frame_loop: FrameLoop::new(device)?,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn frame_loop(&self) -> &FrameLoop<D> {
        &self.frame_loop
    }

    /// Queues an event for the end of the next iteration.
    pub fn push_event(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Renders one frame, then drains queued input. `ms` is the time since
    /// the previous iteration and scales camera motion.
    ///
    /// Resizes received during the drain are coalesced and applied once,
    /// after the drain.
    pub fn iterate(&mut self, ms: f32) -> Result<(FrameOutcome, LoopControl), FrameError> {
        let camera = &self.camera;
        let outcome = self.frame_loop.render_frame(|surface| FrameUniforms {
            mvp: camera
                .mvp_for_extent(surface.extent.width, surface.extent.height)
                .to_cols_array_2d(),
        })?;

        let control = self.poll_events(ms);
        if control == LoopControl::Continue {
            self.frame_loop.ensure_surface()?;
        }
        Ok((outcome, control))
    }

    fn poll_events(&mut self, ms: f32) -> LoopControl {
        let mut control = LoopControl::Continue;
        if !self.events.is_empty() {
            trace!("draining {} input events", self.events.len());
        }
        for event in self.events.drain() {
            match self.input.apply(&event) {
                InputAction::None => {}
                InputAction::Orbit(motion) => self.camera.orbit(motion, ms),
                InputAction::Zoom(delta) => self.camera.zoom(delta, ms),
                InputAction::Resize { width, height } => {
                    self.frame_loop
                        .notify_resized(RenderSize::new(width, height));
                }
                InputAction::Close => {
                    info!("close requested");
                    control = LoopControl::Exit;
                }
            }
        }
        if control == LoopControl::Exit {
            debug!("camera at exit: {:?}", self.camera);
        }
        control
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_platform::MouseButtons;
    use orbit_render::testing::{DeviceEvent, MockDevice};
    use orbit_render::SurfaceState;

    fn session() -> (Session<MockDevice>, orbit_render::testing::EventLog) {
        let (device, log) = MockDevice::new(RenderSize::new(800, 600), 3);
        (Session::new(device).unwrap(), log)
    }

    fn drag(s: &mut Session<MockDevice>, from: (f32, f32), to: (f32, f32)) {
        s.push_event(InputEvent::CursorMoved { x: from.0, y: from.1 });
        s.push_event(InputEvent::Button {
            button: MouseButtons::LEFT,
            pressed: true,
        });
        s.push_event(InputEvent::CursorMoved { x: to.0, y: to.1 });
    }

    #[test]
    fn drag_orbits_camera_after_frame() {
        let (mut s, _log) = session();
        drag(&mut s, (100.0, 100.0), (110.0, 95.0));

        let (outcome, control) = s.iterate(16.0).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(control, LoopControl::Continue);

        let r = s.camera().rotation;
        assert!((r.x - 5.0 * 0.0005 * 16.0).abs() < 1e-6);
        assert!((r.y + 10.0 * 0.0005 * 16.0).abs() < 1e-6);
    }

    #[test]
    fn wheel_zooms() {
        let (mut s, _log) = session();
        let z0 = s.camera().position.z;
        s.push_event(InputEvent::Wheel { delta: 1.0 });
        s.iterate(16.0).unwrap();
        assert!((s.camera().position.z - (z0 + 0.025 * 16.0)).abs() < 1e-6);
    }

    #[test]
    fn motion_without_button_is_ignored() {
        let (mut s, _log) = session();
        s.push_event(InputEvent::CursorMoved { x: 0.0, y: 0.0 });
        s.push_event(InputEvent::CursorMoved { x: 50.0, y: 50.0 });
        s.iterate(16.0).unwrap();
        assert_eq!(s.camera().rotation, Camera::default().rotation);
    }

    #[test]
    fn resize_burst_rebuilds_once_at_last_size() {
        let (mut s, log) = session();
        s.push_event(InputEvent::Resized {
            width: 640,
            height: 480,
        });
        s.push_event(InputEvent::Resized {
            width: 1024,
            height: 768,
        });
        s.iterate(16.0).unwrap();

        let recreates: Vec<_> = log
            .events()
            .into_iter()
            .filter(|e| matches!(e, DeviceEvent::Recreate(_)))
            .collect();
        assert_eq!(recreates, [DeviceEvent::Recreate(RenderSize::new(1024, 768))]);
        assert_eq!(s.frame_loop().state(), SurfaceState::Created);
        assert_eq!(s.frame_loop().surface().extent, RenderSize::new(1024, 768));
    }

    #[test]
    fn next_frame_uses_new_extent() {
        let (mut s, log) = session();
        s.push_event(InputEvent::Resized {
            width: 1024,
            height: 768,
        });
        s.iterate(16.0).unwrap();
        log.clear();
        s.iterate(16.0).unwrap();
        assert!(log.events().iter().any(|e| matches!(
            e,
            DeviceEvent::Record { extent, .. } if *extent == RenderSize::new(1024, 768)
        )));
    }

    #[test]
    fn minimized_window_pauses_until_restored() {
        let (mut s, _log) = session();
        s.push_event(InputEvent::Resized {
            width: 0,
            height: 0,
        });
        s.iterate(16.0).unwrap();
        let (outcome, _) = s.iterate(16.0).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Skipped(orbit_render::SkipReason::Paused)
        );

        s.push_event(InputEvent::Resized {
            width: 320,
            height: 200,
        });
        s.iterate(16.0).unwrap();
        let (outcome, _) = s.iterate(16.0).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
    }

    #[test]
    fn close_exits_without_rebuilding() {
        let (mut s, log) = session();
        s.push_event(InputEvent::Resized {
            width: 640,
            height: 480,
        });
        s.push_event(InputEvent::CloseRequested);
        let (_, control) = s.iterate(16.0).unwrap();
        assert_eq!(control, LoopControl::Exit);
        assert_eq!(log.count(|e| matches!(e, DeviceEvent::Recreate(_))), 0);
    }

    #[test]
    fn teardown_idles_before_release() {
        let (s, log) = session();
        drop(s);
        let events = log.events();
        let idle = events
            .iter()
            .position(|e| *e == DeviceEvent::WaitIdle)
            .unwrap();
        let first_drop = events
            .iter()
            .position(|e| matches!(e, DeviceEvent::DropFrame(_)))
            .unwrap();
        assert!(idle < first_drop);
        assert!(matches!(
            events.last(),
            Some(DeviceEvent::DropDevice { in_flight: 0 })
        ));
    }
}
