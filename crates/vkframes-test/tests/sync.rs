//! Frame slot synchronization against the mock device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ash::vk;
use vkframes_gpu::{
    AcquireOutcome, CommandDevice, CompletionSignal, FrameSubmit, FrameSyncPool, GpuError,
    Swapchain, SwapchainConfig, SyncDevice, SyncStrategy,
};
use vkframes_test::{extent, MockDevice};

fn swapchain(device: &MockDevice) -> Swapchain {
    Swapchain::create(
        device,
        extent(800, 600),
        &SwapchainConfig::default(),
        &[],
        None,
    )
    .unwrap()
}

/// Wait for the slot, then acquire, submit and present one frame from it.
fn run_slot(device: &MockDevice, pool: &mut FrameSyncPool, swapchain: &Swapchain, slot: usize) {
    let handles = pool.begin_frame(device, slot).unwrap();
    let AcquireOutcome::Acquired { image_index, .. } = swapchain
        .acquire_next_image(device, handles.image_available, u64::MAX)
        .unwrap()
    else {
        panic!("unexpected out of date");
    };
    pool.note_acquired(slot).unwrap();
    pool.arm(device, slot).unwrap();
    device
        .submit_frame(&FrameSubmit {
            command_buffer: vk::CommandBuffer::null(),
            wait_semaphore: handles.image_available,
            wait_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: handles.render_finished,
            completion: handles.completion,
        })
        .unwrap();
    pool.end_frame(slot).unwrap();
    swapchain
        .present(device, image_index, &[handles.render_finished])
        .unwrap();
    pool.note_presented(slot).unwrap();
}

#[test]
fn zero_frames_in_flight_is_rejected() {
    let device = MockDevice::default();
    let err = FrameSyncPool::new(&device, 0, SyncStrategy::Fences).unwrap_err();
    assert!(matches!(err, GpuError::InvalidState(_)));
    assert_eq!(device.live_semaphores(), 0);
}

#[test]
fn fresh_slots_do_not_block() {
    let device = MockDevice::default();
    let pool = FrameSyncPool::new(&device, 3, SyncStrategy::Fences).unwrap();

    for slot in 0..3 {
        let handles = pool.begin_frame(&device, slot).unwrap();
        assert_eq!(handles.slot, slot);
        assert!(matches!(handles.completion, CompletionSignal::Fence(_)));
    }
    assert_eq!(device.fence_resets(), 0);
    assert!(pool.begin_frame(&device, 3).is_err());
}

#[test]
fn render_semaphores_follow_the_slot_not_the_image() {
    let device = MockDevice::default();
    let swapchain = swapchain(&device);
    let mut pool = FrameSyncPool::new(&device, 2, SyncStrategy::Fences).unwrap();
    assert_eq!(swapchain.image_count(), 3);

    let first = pool.begin_frame(&device, 0).unwrap().render_finished;
    run_slot(&device, &mut pool, &swapchain, 0);
    run_slot(&device, &mut pool, &swapchain, 1);

    // Slot 0 comes back for image 2 with the semaphore it presented image 0 with.
    let again = pool.begin_frame(&device, 0).unwrap().render_finished;
    assert_eq!(again, first);
    run_slot(&device, &mut pool, &swapchain, 0);
    assert_eq!(device.semaphores_created(), 4);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn begin_frame_blocks_until_the_slot_fence_signals() {
    let device = MockDevice::default();
    let chain = swapchain(&device);
    let mut pool = FrameSyncPool::new(&device, 1, SyncStrategy::Fences).unwrap();

    device.set_auto_complete(false);
    run_slot(&device, &mut pool, &chain, 0);

    let returned = AtomicBool::new(false);
    thread::scope(|scope| {
        let waiter = scope.spawn(|| {
            let handles = pool.begin_frame(&device, 0);
            returned.store(true, Ordering::SeqCst);
            handles
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!returned.load(Ordering::SeqCst));

        device.complete_submissions();
        assert!(waiter.join().unwrap().is_ok());
    });
    assert!(returned.load(Ordering::SeqCst));

    unsafe {
        pool.destroy(&device);
        chain.destroy(&device);
    }
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn end_frame_requires_arm() {
    let device = MockDevice::default();
    let mut pool = FrameSyncPool::new(&device, 2, SyncStrategy::Fences).unwrap();

    let err = pool.end_frame(0).unwrap_err();
    assert!(matches!(err, GpuError::InvalidState(_)));
    unsafe { pool.destroy(&device) };
}

#[test]
fn timeline_values_strictly_increase() {
    let device = MockDevice::default();
    let chain = swapchain(&device);
    let mut pool = FrameSyncPool::new(&device, 2, SyncStrategy::Timeline).unwrap();
    assert_eq!(device.live_fences(), 0);

    for frame in 0..5 {
        let slot = pool.current_slot();
        assert_eq!(slot, frame % 2);
        run_slot(&device, &mut pool, &chain, slot);
        pool.advance();
    }

    assert_eq!(device.timeline_signals(), vec![1, 2, 3, 4, 5]);
    // Each slot waits for the value it signaled two frames earlier.
    assert_eq!(device.timeline_waits(), vec![1, 2, 3]);
    assert_eq!(pool.timeline_value(), 5);

    unsafe {
        pool.destroy(&device);
        chain.destroy(&device);
    }
    assert_eq!(device.live_semaphores(), 0);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn recover_replaces_a_fence_reset_without_submit() {
    let device = MockDevice::default();
    let mut pool = FrameSyncPool::new(&device, 2, SyncStrategy::Fences).unwrap();

    let handles = pool.begin_frame(&device, 0).unwrap();
    let CompletionSignal::Fence(fence) = handles.completion else {
        panic!("expected a fence");
    };
    pool.arm(&device, 0).unwrap();
    assert!(!device.fence_signaled(fence));

    device.wait_idle().unwrap();
    unsafe { pool.recover(&device) }.unwrap();

    let handles = pool.begin_frame(&device, 0).unwrap();
    let CompletionSignal::Fence(replacement) = handles.completion else {
        panic!("expected a fence");
    };
    assert_ne!(replacement, fence);
    assert!(device.fence_signaled(replacement));
    assert_eq!(device.live_fences(), 2);

    unsafe { pool.destroy(&device) };
    assert_eq!(device.live_fences(), 0);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn recover_replaces_unconsumed_semaphores() {
    let device = MockDevice::default();
    let chain = swapchain(&device);
    let mut pool = FrameSyncPool::new(&device, 1, SyncStrategy::Fences).unwrap();

    let handles = pool.begin_frame(&device, 0).unwrap();
    chain
        .acquire_next_image(&device, handles.image_available, u64::MAX)
        .unwrap();
    pool.note_acquired(0).unwrap();

    device.wait_idle().unwrap();
    unsafe { pool.recover(&device) }.unwrap();

    let recovered = pool.begin_frame(&device, 0).unwrap();
    assert_ne!(recovered.image_available, handles.image_available);
    assert_eq!(recovered.render_finished, handles.render_finished);
    assert_eq!(device.semaphores_created(), 3);
    assert_eq!(device.live_semaphores(), 2);

    run_slot(&device, &mut pool, &chain, 0);

    unsafe {
        pool.destroy(&device);
        chain.destroy(&device);
    }
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn wait_all_drains_every_slot() {
    let device = MockDevice::default();
    let chain = swapchain(&device);
    let mut pool = FrameSyncPool::new(&device, 2, SyncStrategy::Fences).unwrap();

    device.set_auto_complete(false);
    run_slot(&device, &mut pool, &chain, 0);
    run_slot(&device, &mut pool, &chain, 1);
    device.complete_submissions();

    pool.wait_all(&device).unwrap();

    unsafe {
        pool.destroy(&device);
        chain.destroy(&device);
    }
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}
