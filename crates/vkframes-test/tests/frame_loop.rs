//! Frame loop behaviour against the mock device and window.

use ash::vk;
use vkframes_app::{FrameError, FrameLoop, FrameLoopConfig, FrameOutcome, SyncStrategy};
use vkframes_gpu::GpuError;
use vkframes_test::{
    extent, frame_loop, run_frames, AcquireScript, MockDevice, MockWindow, PresentScript,
    TraceRecorder,
};

fn presented(image_index: u32, slot: usize) -> FrameOutcome {
    FrameOutcome::Presented {
        image_index,
        slot,
        suboptimal: false,
    }
}

fn setup(device: MockDevice) -> (FrameLoop<MockDevice>, MockWindow, TraceRecorder) {
    let window = MockWindow::new(800, 600);
    let frame_loop = frame_loop(device, &window, FrameLoopConfig::default()).unwrap();
    (frame_loop, window, TraceRecorder::new())
}

fn assert_clean(device: &MockDevice) {
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn steady_state_rotates_slots_and_images() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 6).unwrap();

    assert_eq!(
        outcomes,
        vec![
            presented(0, 0),
            presented(1, 1),
            presented(2, 0),
            presented(0, 1),
            presented(1, 0),
            presented(2, 1),
        ]
    );
    assert_eq!(frame_loop.frame_number(), 6);
    assert_eq!(recorder.frames.len(), 6);
    assert_eq!(recorder.frames[3].frame_number, 3);
    assert_eq!(recorder.frames[3].extent, extent(800, 600));
    assert_eq!(
        recorder.frames[2].swapchain_image,
        frame_loop.swapchain().images()[2]
    );
    assert_eq!(frame_loop.device().swapchains_created(), 1);
    assert_clean(frame_loop.device());
}

#[test]
fn presents_one_frame_per_iteration_with_a_single_slot() {
    let device = MockDevice::default();
    let mut window = MockWindow::new(800, 600);
    let config = FrameLoopConfig {
        frames_in_flight: 1,
        ..Default::default()
    };
    let mut frame_loop = frame_loop(device, &window, config).unwrap();
    let mut recorder = TraceRecorder::new();

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();

    assert_eq!(outcomes, vec![presented(0, 0), presented(1, 0), presented(2, 0)]);
    assert_clean(frame_loop.device());
}

#[test]
fn out_of_date_acquire_recreates_without_rendering() {
    let device = MockDevice::default();
    device.script_acquire(5, AcquireScript::OutOfDate);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 5).unwrap();
    assert_eq!(outcomes[4], FrameOutcome::Recreated);
    assert_eq!(frame_loop.device().submit_calls(), 4);
    assert_eq!(frame_loop.device().present_calls(), 4);
    assert_eq!(recorder.record_calls, 4);
    assert_eq!(frame_loop.device().swapchains_created(), 2);

    let next = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(next, presented(0, 0));
    assert_eq!(frame_loop.device().live_swapchains(), 1);
    assert_clean(frame_loop.device());
}

#[test]
fn suboptimal_present_recreates_exactly_once() {
    let device = MockDevice::default();
    device.script_present(2, PresentScript::Suboptimal);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 5).unwrap();

    assert_eq!(
        outcomes,
        vec![
            presented(0, 0),
            FrameOutcome::Presented {
                image_index: 1,
                slot: 1,
                suboptimal: true,
            },
            FrameOutcome::Recreated,
            presented(0, 0),
            presented(1, 1),
        ]
    );
    assert_eq!(frame_loop.device().swapchains_created(), 2);
    assert_eq!(recorder.recreated, vec![extent(800, 600)]);
    assert_clean(frame_loop.device());
}

#[test]
fn suboptimal_acquire_still_presents_then_recreates() {
    let device = MockDevice::default();
    device.script_acquire(1, AcquireScript::Suboptimal);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 2).unwrap();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Presented {
                image_index: 0,
                slot: 0,
                suboptimal: true,
            },
            FrameOutcome::Recreated,
        ]
    );
    assert_clean(frame_loop.device());
}

#[test]
fn out_of_date_present_recreates_on_the_next_iteration() {
    let device = MockDevice::default();
    device.script_present(1, PresentScript::OutOfDate);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();

    assert!(matches!(
        outcomes[0],
        FrameOutcome::Presented {
            suboptimal: true,
            ..
        }
    ));
    assert_eq!(outcomes[1], FrameOutcome::Recreated);
    assert_eq!(outcomes[2], presented(0, 0));
    assert_clean(frame_loop.device());
}

#[test]
fn window_resize_rebuilds_at_the_new_size() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());
    run_frames(&mut frame_loop, &mut window, &mut recorder, 2).unwrap();

    window.resize(1024, 768);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Recreated);
    assert_eq!(frame_loop.swapchain().extent(), extent(1024, 768));
    assert_eq!(recorder.recreated, vec![extent(1024, 768)]);
    assert!(!frame_loop.resize_pending());

    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(outcome, presented(0, 0));
    assert_eq!(recorder.frames.last().map(|f| f.extent), Some(extent(1024, 768)));
    assert_clean(frame_loop.device());
}

#[test]
fn failed_rebuild_on_resize_drops_the_frame_and_retries() {
    let (mut frame_loop, mut window, _) = setup(MockDevice::default());
    let mut recorder = TraceRecorder::new().fail_rebuild_on(1);
    run_frames(&mut frame_loop, &mut window, &mut recorder, 2).unwrap();

    window.resize(1024, 768);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Dropped);
    assert_eq!(recorder.rebuild_calls, 2);
    assert_eq!(recorder.recreated, vec![extent(1024, 768)]);
    assert!(!frame_loop.resize_pending());

    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(outcome, presented(0, 0));
    assert_eq!(recorder.frames.last().map(|f| f.extent), Some(extent(1024, 768)));
    assert_eq!(frame_loop.device().live_swapchains(), 1);
    assert_clean(frame_loop.device());
}

#[test]
fn repeated_rebuild_failure_stays_pending_until_it_succeeds() {
    let (mut frame_loop, mut window, _) = setup(MockDevice::default());
    let mut recorder = TraceRecorder::new().fail_rebuild_on(1).fail_rebuild_on(2);

    window.resize(1024, 768);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Dropped);
    assert!(frame_loop.resize_pending());
    assert!(recorder.recreated.is_empty());
    assert_eq!(frame_loop.device().acquire_calls(), 0);

    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(outcome, FrameOutcome::Recreated);
    assert!(!frame_loop.resize_pending());
    assert_eq!(recorder.recreated, vec![extent(1024, 768)]);

    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(outcome, presented(0, 0));
    assert_eq!(recorder.frames.last().map(|f| f.extent), Some(extent(1024, 768)));
    assert_clean(frame_loop.device());
}

#[test]
fn minimized_window_waits_for_a_nonzero_size() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());
    run_frames(&mut frame_loop, &mut window, &mut recorder, 1).unwrap();

    window.resize(0, 0);
    window.queue_size_on_wait(640, 480);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Recreated);
    assert_eq!(window.waits, 1);
    assert_eq!(frame_loop.swapchain().extent(), extent(640, 480));
    assert_eq!(frame_loop.device().swapchains_created(), 2);
    assert_clean(frame_loop.device());
}

#[test]
fn minimize_restore_cycles_leave_one_live_swapchain() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());

    for cycle in 0..5 {
        window.resize(0, 0);
        window.queue_size_on_wait(800 + cycle * 10, 600);
        let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
        assert_eq!(outcome, FrameOutcome::Recreated);

        let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, FrameOutcome::Presented { .. })));

        let device = frame_loop.device();
        assert_eq!(device.live_swapchains(), 1);
        assert_eq!(device.live_image_views(), frame_loop.swapchain().image_count());
    }

    assert_eq!(frame_loop.swapchain().extent(), extent(840, 600));
    assert_clean(frame_loop.device());
}

#[test]
fn closing_while_minimized_skips_without_recreating() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());

    window.resize(0, 0);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert!(frame_loop.resize_pending());
    assert_eq!(frame_loop.device().swapchains_created(), 1);
    assert_eq!(frame_loop.device().acquire_calls(), 0);
}

#[test]
fn closing_window_skips_the_frame() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());

    window.close();
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();

    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(frame_loop.device().acquire_calls(), 0);
    assert_eq!(recorder.record_calls, 0);
}

#[test]
fn recorder_failure_drops_the_frame_without_deadlock() {
    let (mut frame_loop, mut window, _) = setup(MockDevice::default());
    let mut recorder = TraceRecorder::new().fail_on(2);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 4).unwrap();

    assert_eq!(
        outcomes,
        vec![
            presented(0, 0),
            FrameOutcome::Dropped,
            presented(0, 0),
            presented(1, 1),
        ]
    );
    let device = frame_loop.device();
    // Only submitted frames reset their fence.
    assert_eq!(device.fence_resets(), 3);
    assert_eq!(device.semaphores_created(), 5);
    assert_eq!(device.live_semaphores(), 4);
    assert_eq!(device.swapchains_created(), 2);
    assert_eq!(recorder.frames.len(), 3);
    assert_clean(device);
}

#[test]
fn transient_present_error_is_absorbed() {
    let device = MockDevice::default();
    device.script_present(
        1,
        PresentScript::Error(vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT),
    );
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let outcomes = run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();

    assert_eq!(
        outcomes,
        vec![FrameOutcome::Dropped, presented(0, 0), presented(1, 1)]
    );
    assert_eq!(frame_loop.device().semaphores_created(), 5);
    assert_clean(frame_loop.device());
}

#[test]
fn device_lost_on_acquire_is_fatal() {
    let device = MockDevice::default();
    device.script_acquire(2, AcquireScript::Error(vk::Result::ERROR_DEVICE_LOST));
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    frame_loop.run_once(&mut window, &mut recorder).unwrap();
    let err = frame_loop.run_once(&mut window, &mut recorder).unwrap_err();

    assert!(matches!(
        err,
        FrameError::Gpu(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST))
    ));
    assert!(!err.is_recoverable());
    assert_eq!(frame_loop.device().wait_idles(), 0);

    let device = frame_loop.shutdown();
    assert_eq!(device.live_swapchains(), 0);
    assert_eq!(device.live_fences(), 0);
}

#[test]
fn failed_submit_is_fatal_and_still_shuts_down_cleanly() {
    let device = MockDevice::default();
    device.fail_submit(1, vk::Result::ERROR_DEVICE_LOST);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    let err = frame_loop.run_once(&mut window, &mut recorder).unwrap_err();
    assert!(!err.is_recoverable());

    let device = frame_loop.shutdown();
    assert_eq!(device.live_fences(), 0);
    assert_eq!(device.live_semaphores(), 0);
    assert_eq!(device.live_command_buffers(), 0);
}

#[test]
fn present_mode_change_goes_through_recreate() {
    let (mut frame_loop, mut window, mut recorder) = setup(MockDevice::default());
    assert_eq!(
        frame_loop.swapchain().present_mode(),
        vk::PresentModeKHR::MAILBOX
    );

    frame_loop.set_preferred_present_mode(vk::PresentModeKHR::IMMEDIATE);
    let outcome = frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(outcome, FrameOutcome::Recreated);
    assert_eq!(
        frame_loop.swapchain().present_mode(),
        vk::PresentModeKHR::IMMEDIATE
    );
    assert_eq!(
        frame_loop.device().latest_swapchain(),
        Some((extent(800, 600), vk::PresentModeKHR::IMMEDIATE))
    );

    frame_loop.set_preferred_present_mode(vk::PresentModeKHR::FIFO_RELAXED);
    frame_loop.run_once(&mut window, &mut recorder).unwrap();
    assert_eq!(frame_loop.swapchain().present_mode(), vk::PresentModeKHR::FIFO);
    assert_clean(frame_loop.device());
}

#[test]
fn timeline_strategy_signals_increasing_values() {
    let device = MockDevice::default();
    let mut window = MockWindow::new(800, 600);
    let config = FrameLoopConfig {
        sync_strategy: SyncStrategy::Timeline,
        ..Default::default()
    };
    let mut frame_loop = frame_loop(device, &window, config).unwrap();
    let mut recorder = TraceRecorder::new();

    run_frames(&mut frame_loop, &mut window, &mut recorder, 4).unwrap();
    window.resize(900, 700);
    run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();

    let device = frame_loop.device();
    assert_eq!(device.live_fences(), 0);
    assert_eq!(device.timeline_signals(), vec![1, 2, 3, 4, 5, 6]);
    assert!(device.timeline_signals().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(frame_loop.sync().timeline_value(), 6);
    assert_clean(device);
}

#[test]
fn shutdown_releases_every_object() {
    let device = MockDevice::default();
    device.script_acquire(3, AcquireScript::OutOfDate);
    let (mut frame_loop, mut window, mut recorder) = setup(device);
    run_frames(&mut frame_loop, &mut window, &mut recorder, 6).unwrap();

    let device = frame_loop.shutdown();

    assert_eq!(device.live_swapchains(), 0);
    assert_eq!(device.live_image_views(), 0);
    assert_eq!(device.live_semaphores(), 0);
    assert_eq!(device.live_fences(), 0);
    assert_eq!(device.live_command_buffers(), 0);
    assert_clean(&device);
}

#[test]
fn out_of_date_trace() {
    let device = MockDevice::default();
    device.script_acquire(2, AcquireScript::OutOfDate);
    let (mut frame_loop, mut window, mut recorder) = setup(device);

    run_frames(&mut frame_loop, &mut window, &mut recorder, 3).unwrap();

    insta::assert_snapshot!(frame_loop.device().trace().join("\n"), @r"
    create_swapchain #1 800x600
    acquire #1 -> image 0
    reset_fence
    submit
    present #1 image 0 -> presented
    acquire #1 -> out of date
    wait_idle
    create_swapchain #2 800x600 old=#1
    destroy_swapchain #1
    acquire #2 -> image 0
    reset_fence
    submit
    present #2 image 0 -> presented
    ");
}

#[test]
fn recorder_failure_trace() {
    let (mut frame_loop, mut window, _) = setup(MockDevice::default());
    let mut recorder = TraceRecorder::new().fail_on(1);

    run_frames(&mut frame_loop, &mut window, &mut recorder, 2).unwrap();

    insta::assert_snapshot!(frame_loop.device().trace().join("\n"), @r"
    create_swapchain #1 800x600
    acquire #1 -> image 0
    wait_idle
    wait_idle
    create_swapchain #2 800x600 old=#1
    destroy_swapchain #1
    acquire #2 -> image 0
    reset_fence
    submit
    present #2 image 0 -> presented
    ");
}
