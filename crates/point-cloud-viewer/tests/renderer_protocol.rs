use glam::Mat4;
use point_cloud_viewer::config::RendererConfig;
use point_cloud_viewer::renderer::backend::site;
use point_cloud_viewer::renderer::recording::{BindState, Operation, RecordingBackend};
use point_cloud_viewer::renderer::shaders::ShaderSources;
use point_cloud_viewer::PointCloudRenderer;
use tracking::{PointBatch, PointSource, SimulatedTracker, SimulatedTrackerConfig, BYTES_PER_POINT};

fn renderer_with(config: RendererConfig) -> PointCloudRenderer<RecordingBackend> {
    PointCloudRenderer::initialize(RecordingBackend::new(), &ShaderSources::embedded(), config)
        .unwrap()
}

fn renderer() -> PointCloudRenderer<RecordingBackend> {
    renderer_with(RendererConfig::default())
}

fn batch(points: usize) -> PointBatch {
    let values: Vec<f32> = (0..points * 4).map(|i| i as f32).collect();
    PointBatch::new(0, values)
}

#[test]
fn draw_count_matches_last_batch() {
    let mut r = renderer();
    for n in [0usize, 1, 999, 1000, 1001, 37] {
        let b = batch(n);
        r.update(&b).unwrap();
        r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
        assert_eq!(*r.backend().drawn_counts().last().unwrap(), b.len_points() as u32);
    }
}

#[test]
fn uploaded_bytes_match_batch() {
    let mut r = renderer();
    let b = batch(3);
    r.update(&b).unwrap();

    let buf = r
        .backend()
        .commands()
        .iter()
        .find_map(|c| match c {
            point_cloud_viewer::renderer::recording::Command::WriteBuffer { len, offset, .. } => {
                Some((*offset, *len))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(buf, (0, (3 * BYTES_PER_POINT) as u64));
}

#[test]
fn partial_trailing_record_is_not_uploaded() {
    let mut r = renderer();
    r.update(&PointBatch::new(0, vec![1.0f32; 4 * 5 + 3])).unwrap();
    r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
    assert_eq!(r.backend().drawn_counts(), vec![5]);
}

#[test]
fn growing_sequence_reallocates_logarithmically() {
    let mut r = renderer();
    let mut last_capacity = r.capacity_bytes();
    for n in (0..=64_000usize).step_by(500) {
        r.update(&batch(n)).unwrap();
        assert!(r.capacity_bytes() >= (n * BYTES_PER_POINT) as u64);
        assert!(r.capacity_bytes() >= last_capacity);
        last_capacity = r.capacity_bytes();
    }
    // 1000 -> 2000 -> ... -> 64000: six growths after the initial allocation.
    assert_eq!(r.backend().allocations().len(), 7);
    assert_eq!(r.capacity_points(), 64_000);
}

#[test]
fn growth_factor_is_configurable() {
    let mut r = renderer_with(RendererConfig {
        growth_factor: 4,
        ..Default::default()
    });
    r.update(&batch(2500)).unwrap();
    assert_eq!(r.capacity_points(), 4000);
    r.update(&batch(4001)).unwrap();
    assert_eq!(r.capacity_points(), 16_000);
}

#[test]
fn initial_capacity_is_configurable() {
    let mut r = renderer_with(RendererConfig {
        initial_capacity_points: 10,
        ..Default::default()
    });
    r.update(&batch(11)).unwrap();
    assert_eq!(r.capacity_points(), 20);
}

#[test]
fn state_is_clean_after_draw_and_after_failures() {
    let mut r = renderer();
    r.update(&batch(5)).unwrap();
    r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
    assert_eq!(r.backend().bind_state(), BindState::default());

    r.backend_mut().fail_at(site::DRAW);
    let err = r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap_err();
    assert_eq!(err.site, site::DRAW);
    assert_eq!(r.backend().bind_state(), BindState::default());

    r.backend_mut().fail_at(site::AFTER_UPDATE);
    assert!(r.update(&batch(5000)).is_err());
    assert_eq!(r.backend().bind_state(), BindState::default());
}

#[test]
fn failed_reallocation_keeps_draws_in_bounds() {
    let mut r = renderer();
    r.update(&batch(800)).unwrap();
    r.backend_mut().fail_at(site::AFTER_UPDATE);
    assert!(r.update(&batch(5000)).is_err());

    // The old buffer and count stay valid.
    r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
    assert_eq!(r.backend().drawn_counts(), vec![800]);
}

#[test]
fn failed_write_after_grow_reuploads_previous_batch() {
    let mut r = renderer();
    let previous = batch(800);
    r.update(&previous).unwrap();

    // The grow succeeds; only the upload into the new buffer fails.
    r.backend_mut()
        .fail_op_at(Operation::WriteBuffer, site::AFTER_UPDATE);
    let err = r.update(&batch(5000)).unwrap_err();
    assert_eq!(err.site, site::AFTER_UPDATE);
    assert_eq!(r.backend().allocations().len(), 2);

    r.update(&previous).unwrap();
    r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
    assert_eq!(r.backend().upload_count(), 2);
    assert_eq!(r.backend().drawn_counts(), vec![800]);
}

#[test]
fn each_call_site_reports_its_tag() {
    for tag in [site::BEFORE_CREATE, site::BUFFER_ALLOC, site::PROGRAM, site::PROGRAM_PARAMS] {
        let mut gpu = RecordingBackend::new();
        gpu.fail_at(tag);
        let err = PointCloudRenderer::initialize(
            gpu,
            &ShaderSources::embedded(),
            RendererConfig::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.site, tag);
    }

    let mut r = renderer();
    r.backend_mut().fail_at(site::BEFORE_UPDATE);
    assert_eq!(r.update(&batch(1)).unwrap_err().site, site::BEFORE_UPDATE);

    r.backend_mut().fail_at(site::BEFORE_DRAW);
    assert_eq!(
        r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap_err().site,
        site::BEFORE_DRAW
    );
}

#[test]
fn driver_error_surfaces_at_next_check() {
    let mut r = renderer();
    r.backend_mut().raise("context lost");
    let err = r.update(&batch(1)).unwrap_err();
    assert_eq!(err.site, site::BEFORE_UPDATE);
    assert_eq!(err.message, "context lost");
}

#[test]
fn empty_shader_fails_program_step() {
    let shaders = ShaderSources {
        vertex: "".into(),
        fragment: ShaderSources::embedded().fragment,
    };
    let err = PointCloudRenderer::initialize(RecordingBackend::new(), &shaders, Default::default())
        .err()
        .unwrap();
    assert_eq!(err.site, site::PROGRAM);
}

#[test]
fn tracker_frames_upload_once_per_new_batch() {
    let mut tracker = SimulatedTracker::new(SimulatedTrackerConfig {
        max_points: 3000,
        points_per_update: 700,
        frames_per_update: 4,
        seed: 1,
    });
    let mut r = renderer();

    for _ in 0..20 {
        let b = tracker.acquire();
        r.update(&b).unwrap();
        r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
        assert_eq!(r.point_count() as usize, b.len_points());
    }

    assert_eq!(r.backend().upload_count(), 5);
    assert_eq!(r.backend().drawn_counts().len(), 20);
    assert_eq!(r.capacity_points(), 4000);
}
