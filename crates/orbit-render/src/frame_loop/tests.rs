// SPDX-License-Identifier: CEPL-1.0
use super::*;
use crate::testing::{DeviceEvent, EventLog, MockDevice};

const SIZE: RenderSize = RenderSize::new(800, 600);

fn setup(image_count: u32) -> (FrameLoop<MockDevice>, EventLog) {
    let (device, log) = MockDevice::new(SIZE, image_count);
    let frame_loop = FrameLoop::new(device).unwrap();
    log.clear();
    (frame_loop, log)
}

fn frame(frame_loop: &mut FrameLoop<MockDevice>) -> FrameOutcome {
    frame_loop
        .render_frame(|_| FrameUniforms::IDENTITY)
        .unwrap()
}

fn position(events: &[DeviceEvent], pred: impl Fn(&DeviceEvent) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .expect("event not found in log")
}

#[test]
fn slot_goes_zero_one_zero() {
    let (mut lp, _log) = setup(3);
    assert_eq!(lp.frame_slot().index(), 0);
    frame(&mut lp);
    assert_eq!(lp.frame_slot().index(), 1);
    frame(&mut lp);
    assert_eq!(lp.frame_slot().index(), 0);
}

#[test]
fn slots_cycle_without_skips() {
    let (mut lp, _log) = setup(3);
    let slots: Vec<usize> = (0..9)
        .map(|_| match frame(&mut lp) {
            FrameOutcome::Presented { slot, .. } => slot.index(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(slots, [0, 1, 0, 1, 0, 1, 0, 1, 0]);
    assert_eq!(lp.presented(), 9);
}

#[test]
fn steps_run_in_protocol_order() {
    let (mut lp, log) = setup(2);
    frame(&mut lp);
    let s0 = FrameSlot::all().next().unwrap();
    let img = ImageIndex::new(0);
    assert_eq!(
        log.events(),
        [
            DeviceEvent::Wait(s0),
            DeviceEvent::Acquire(s0),
            DeviceEvent::Reset(s0),
            DeviceEvent::WriteUniforms(s0),
            DeviceEvent::Record {
                slot: s0,
                image: img,
                extent: SIZE
            },
            DeviceEvent::Submit {
                slot: s0,
                signal: img,
                generation: 0
            },
            DeviceEvent::Present {
                image: img,
                signal: img,
                generation: 0
            },
        ]
    );
}

#[test]
fn slot_is_written_only_after_its_fence_wait() {
    let (mut lp, log) = setup(3);
    for _ in 0..8 {
        frame(&mut lp);
    }
    let events = log.events();
    for (i, e) in events.iter().enumerate() {
        let DeviceEvent::WriteUniforms(slot) = e else {
            continue;
        };
        let last_submit = events[..i]
            .iter()
            .rposition(|e| matches!(e, DeviceEvent::Submit { slot: s, .. } if s == slot));
        let last_wait = events[..i]
            .iter()
            .rposition(|e| *e == DeviceEvent::Wait(*slot))
            .expect("write without a wait");
        if let Some(submit) = last_submit {
            assert!(last_wait > submit, "{slot} written before its fence wait");
        }
    }
}

#[test]
fn present_signal_is_picked_by_image_not_slot() {
    let (mut lp, log) = setup(3);
    lp.device_mut().script_acquire([
        Acquire::Image {
            index: ImageIndex::new(2),
            suboptimal: false,
        },
        Acquire::Image {
            index: ImageIndex::new(0),
            suboptimal: false,
        },
        Acquire::Image {
            index: ImageIndex::new(2),
            suboptimal: false,
        },
    ]);
    for _ in 0..5 {
        frame(&mut lp);
    }

    let events = log.events();
    let acquired: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::Record { image, .. } => Some(image.get()),
            _ => None,
        })
        .collect();
    let submitted: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::Submit { signal, .. } => Some(signal.get()),
            _ => None,
        })
        .collect();
    let presented: Vec<(u32, u32)> = events
        .iter()
        .filter_map(|e| match e {
            DeviceEvent::Present { image, signal, .. } => Some((image.get(), signal.get())),
            _ => None,
        })
        .collect();

    assert_eq!(acquired, [2, 0, 2, 0, 1]);
    assert_eq!(submitted, acquired);
    assert!(presented.iter().all(|(image, signal)| image == signal));
    assert_eq!(
        presented.iter().map(|p| p.0).collect::<Vec<_>>(),
        acquired
    );
}

#[test]
fn resize_rebuilds_with_new_extent_and_image_count() {
    let (mut lp, log) = setup(3);
    frame(&mut lp);
    frame(&mut lp);

    let new_size = RenderSize::new(1024, 768);
    lp.device_mut().set_image_count_after_recreate(4);
    lp.notify_resized(new_size);
    assert_eq!(lp.state(), SurfaceState::Stale { size: new_size });
    log.clear();

    let mut seen = None;
    lp.render_frame(|surface| {
        seen = Some(surface);
        FrameUniforms::IDENTITY
    })
    .unwrap();

    let surface = seen.unwrap();
    assert_eq!(surface.extent, new_size);
    assert_eq!(surface.image_count, 4);
    assert_eq!(lp.surface(), surface);
    assert_eq!(lp.recreations(), 1);
    assert_eq!(lp.state(), SurfaceState::InUse);

    let events = log.events();
    assert_eq!(
        log.count(|e| matches!(e, DeviceEvent::CreateImageSignal { generation: 1, .. })),
        4
    );
    assert_eq!(
        log.count(|e| matches!(e, DeviceEvent::DropImageSignal { generation: 0, .. })),
        3
    );
    assert!(events.iter().any(|e| matches!(
        e,
        DeviceEvent::Record { extent, .. } if *extent == new_size
    )));
}

#[test]
fn rebuild_idles_before_releasing_anything() {
    let (mut lp, log) = setup(2);
    frame(&mut lp);
    lp.notify_resized(RenderSize::new(640, 480));
    assert!(lp.ensure_surface().unwrap());

    let events = log.events();
    let idle = position(&events, |e| *e == DeviceEvent::WaitIdle);
    let first_drop = position(&events, |e| {
        matches!(e, DeviceEvent::DropImageSignal { .. })
    });
    let recreate = position(&events, |e| matches!(e, DeviceEvent::Recreate(_)));
    let first_new = position(&events, |e| {
        matches!(e, DeviceEvent::CreateImageSignal { generation: 1, .. })
    });
    assert!(idle < first_drop);
    assert!(first_drop < recreate);
    assert!(recreate < first_new);
    assert_eq!(lp.state(), SurfaceState::Created);
}

#[test]
fn resize_burst_costs_one_rebuild_at_final_size() {
    let (mut lp, log) = setup(3);
    frame(&mut lp);
    for w in [300, 500, 700, 900] {
        lp.notify_resized(RenderSize::new(w, 400));
    }
    let outcome = frame(&mut lp);
    assert!(matches!(outcome, FrameOutcome::Presented { .. }));

    assert_eq!(log.count(|e| matches!(e, DeviceEvent::Recreate(_))), 1);
    assert!(log
        .events()
        .contains(&DeviceEvent::Recreate(RenderSize::new(900, 400))));
    assert_eq!(lp.surface().extent, RenderSize::new(900, 400));
}

#[test]
fn minimized_window_pauses_until_it_has_area() {
    let (mut lp, log) = setup(3);
    frame(&mut lp);
    lp.notify_resized(RenderSize::new(0, 600));
    log.clear();

    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::Paused));
    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::Paused));
    assert!(log.events().is_empty());
    assert_eq!(lp.frame_slot().index(), 1);

    lp.notify_resized(RenderSize::new(320, 240));
    assert!(matches!(frame(&mut lp), FrameOutcome::Presented { .. }));
    assert_eq!(lp.surface().extent, RenderSize::new(320, 240));
}

#[test]
fn out_of_date_acquire_skips_and_rebuilds() {
    let (mut lp, log) = setup(3);
    lp.device_mut().script_acquire([Acquire::OutOfDate]);

    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::OutOfDate));
    assert_eq!(lp.frame_slot().index(), 0);
    assert_eq!(lp.state(), SurfaceState::Stale { size: SIZE });
    assert_eq!(log.count(|e| matches!(e, DeviceEvent::Reset(_))), 0);

    // The untouched fence lets the retry's wait return.
    assert!(matches!(frame(&mut lp), FrameOutcome::Presented { .. }));
    assert_eq!(lp.recreations(), 1);
    assert_eq!(lp.frame_slot().index(), 1);
}

#[test]
fn suboptimal_acquire_still_presents_then_rebuilds() {
    let (mut lp, log) = setup(3);
    lp.device_mut().script_acquire([Acquire::Image {
        index: ImageIndex::new(1),
        suboptimal: true,
    }]);

    assert_eq!(
        frame(&mut lp),
        FrameOutcome::Presented {
            slot: FrameSlot::all().next().unwrap(),
            image: ImageIndex::new(1)
        }
    );
    assert!(lp.state().is_stale());
    frame(&mut lp);
    assert_eq!(log.count(|e| matches!(e, DeviceEvent::Recreate(_))), 1);
}

#[test]
fn out_of_date_present_marks_stale() {
    let (mut lp, _log) = setup(3);
    lp.device_mut().script_present([Present::OutOfDate]);
    assert!(matches!(frame(&mut lp), FrameOutcome::Presented { .. }));
    assert_eq!(lp.state(), SurfaceState::Stale { size: SIZE });
    assert_eq!(lp.frame_slot().index(), 1);
}

#[test]
fn unknown_image_is_an_error() {
    let (mut lp, _log) = setup(3);
    lp.device_mut().script_acquire([Acquire::Image {
        index: ImageIndex::new(7),
        suboptimal: false,
    }]);
    let err = lp.render_frame(|_| FrameUniforms::IDENTITY).unwrap_err();
    assert!(matches!(err, FrameError::UnknownImage { count: 3, .. }));
}

#[test]
fn unknown_image_leaves_the_slot_fence_signaled() {
    let (mut lp, log) = setup(3);
    lp.device_mut().script_acquire([Acquire::Image {
        index: ImageIndex::new(9),
        suboptimal: false,
    }]);
    assert!(lp.render_frame(|_| FrameUniforms::IDENTITY).is_err());
    assert_eq!(log.count(|e| matches!(e, DeviceEvent::Reset(_))), 0);
    assert_eq!(lp.frame_slot().index(), 0);

    // The mock refuses to wait on a fence that was reset but never submitted.
    assert!(matches!(frame(&mut lp), FrameOutcome::Presented { .. }));
}

#[test]
fn surface_without_area_pauses_instead_of_rebuilding() {
    let (mut lp, log) = setup(3);
    frame(&mut lp);
    // Minimized before the resize event: the stale size is still 800x600
    // but the surface already reports nothing.
    lp.device_mut().script_acquire([Acquire::OutOfDate]);
    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::OutOfDate));
    lp.device_mut()
        .set_extent_after_recreate(RenderSize::new(0, 0));

    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::Paused));
    assert_eq!(
        lp.state(),
        SurfaceState::Stale {
            size: RenderSize::new(0, 0)
        }
    );
    assert_eq!(lp.recreations(), 0);
    assert_eq!(lp.device().generation(), 0);
    assert_eq!(lp.surface().extent, SIZE);

    log.clear();
    assert_eq!(frame(&mut lp), FrameOutcome::Skipped(SkipReason::Paused));
    assert!(log.events().is_empty());

    lp.notify_resized(RenderSize::new(640, 480));
    assert!(matches!(frame(&mut lp), FrameOutcome::Presented { .. }));
    assert_eq!(lp.surface().extent, RenderSize::new(640, 480));
    assert_eq!(lp.recreations(), 1);
    assert_eq!(
        log.count(|e| matches!(e, DeviceEvent::CreateImageSignal { generation: 1, .. })),
        3
    );
}

#[test]
fn teardown_without_frames_idles_first() {
    let (lp, log) = setup(3);
    drop(lp);
    let events = log.events();
    assert_eq!(events[0], DeviceEvent::WaitIdle);
    assert_eq!(
        events.last(),
        Some(&DeviceEvent::DropDevice { in_flight: 0 })
    );
    assert_eq!(log.count(|e| matches!(e, DeviceEvent::DropFrame(_))), 2);
    assert_eq!(
        log.count(|e| matches!(e, DeviceEvent::DropImageSignal { .. })),
        3
    );
}

#[test]
fn teardown_after_frames_idles_before_releasing() {
    let (mut lp, log) = setup(3);
    for _ in 0..5 {
        frame(&mut lp);
    }
    assert!(lp.device().in_flight() > 0);
    log.clear();
    drop(lp);

    let events = log.events();
    let idle = position(&events, |e| *e == DeviceEvent::WaitIdle);
    let first_release = position(&events, |e| {
        matches!(
            e,
            DeviceEvent::DropFrame(_) | DeviceEvent::DropImageSignal { .. }
        )
    });
    assert!(idle < first_release);
    assert_eq!(
        events.last(),
        Some(&DeviceEvent::DropDevice { in_flight: 0 })
    );
}

#[test]
fn uniforms_see_the_current_surface() {
    let (mut lp, _log) = setup(2);
    let mut extent = None;
    lp.render_frame(|s| {
        extent = Some(s.extent);
        FrameUniforms::IDENTITY
    })
    .unwrap();
    assert_eq!(extent, Some(SIZE));
}
