use wire_ngin::{
    FailureKind,
    backend::recording::{RecordingDevice, RecordingOptions, RecordingView},
    config::ViewConfig,
    data_structures::vertex_layout::{MeshVertexDescriptor, Semantic, VertexFormat, VertexLayout},
    pipelines::state::PipelineBuilder,
    playground::{DeviceReady, render_once, wireframe_descriptor},
    render::FillMode,
};

mod common;

#[tokio::test]
async fn cube_is_drawn_once_as_wireframe() -> anyhow::Result<()> {
    let device = RecordingDevice::default();
    let mut view = RecordingView::new(ViewConfig::default());

    let report = render_once(device.clone(), &mut view, &common::assets("cube.obj")).await?;

    assert_eq!(report.draw_calls.len(), 1);
    let draw = &report.draw_calls[0];
    assert_eq!(draw.index_count, 36);
    assert_eq!(draw.index_format, wgpu::IndexFormat::Uint16);
    assert_eq!(draw.fill_mode, FillMode::Lines);
    assert_eq!(draw.vertex_buffer_slots, vec![0]);

    let log = device.log();
    assert_eq!(log.shader_modules.len(), 1);
    assert_eq!(log.pipelines.len(), 1);
    assert_eq!(log.frames.len(), 1);
    let frame = &log.frames[0];
    assert!(frame.presented);
    assert_eq!(frame.pass.clear_colour, ViewConfig::default().clear_colour);
    assert_eq!((frame.pass.width, frame.pass.height), (600, 600));
    assert_eq!(frame.draw_calls, report.draw_calls);
    Ok(())
}

#[tokio::test]
async fn train_draws_its_first_submesh() -> anyhow::Result<()> {
    let device = RecordingDevice::default();
    let mut view = RecordingView::new(ViewConfig::default());
    let assets = common::assets("train.obj");

    let loaded = DeviceReady::new(device.clone())?
        .load_mesh(&assets, &assets.model, &wireframe_descriptor()?)
        .await?;
    let first = loaded.mesh().submeshes[0].index_count;
    assert!(loaded.mesh().submeshes.len() > 1);

    let report = render_once(device, &mut view, &assets).await?;
    assert_eq!(report.draw_calls[0].index_count, first);
    Ok(())
}

#[tokio::test]
async fn mesh_and_pipeline_share_one_layout() -> anyhow::Result<()> {
    let device = RecordingDevice::default();
    let assets = common::assets("cube.obj");
    let descriptor = wireframe_descriptor()?;

    let ready = DeviceReady::new(device)?
        .load_mesh(&assets, "cube.obj", &descriptor)
        .await?
        .compile_shader(
            wire_ngin::pipelines::shader::WIREFRAME_SHADER,
            "vertex_main",
            "fragment_main",
        )?
        .build_pipeline(wgpu::TextureFormat::Bgra8Unorm)?;

    assert_eq!(ready.pipeline().vertex_layout(), &VertexLayout::position_only());
    assert_eq!(
        &ready.mesh().vertex_descriptor().to_vertex_layout()?,
        ready.pipeline().vertex_layout()
    );
    Ok(())
}

#[tokio::test]
async fn pipeline_layout_must_match_the_loaded_mesh() -> anyhow::Result<()> {
    let device = RecordingDevice::default();
    let assets = common::assets("cube.obj");
    let compiled = DeviceReady::new(device.clone())?
        .load_mesh(&assets, "cube.obj", &wireframe_descriptor()?)
        .await?
        .compile_shader(
            wire_ngin::pipelines::shader::WIREFRAME_SHADER,
            "vertex_main",
            "fragment_main",
        )?;
    let wide = VertexLayout::builder()
        .attribute(0, VertexFormat::Float32x4, 0, 0)
        .stride(0, 16)
        .build()?;

    let err = PipelineBuilder::new(compiled.program())
        .color_format(wgpu::TextureFormat::Bgra8Unorm)
        .vertex_layout(&wide)
        .mesh_descriptor(compiled.mesh().vertex_descriptor())
        .build(&device)
        .err()
        .unwrap();

    assert_eq!(err.kind(), FailureKind::BackendRejected);
    assert!(device.log().pipelines.is_empty());
    Ok(())
}

#[tokio::test]
async fn padded_layout_fails_fast() {
    let layout = VertexLayout::builder()
        .attribute(0, VertexFormat::Float32x3, 0, 0)
        .stride(0, 16)
        .build()
        .unwrap();
    let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position]).unwrap();
    let device = RecordingDevice::default();

    let err = DeviceReady::new(device.clone())
        .unwrap()
        .load_mesh(&common::assets("cube.obj"), "cube.obj", &descriptor)
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), FailureKind::InvalidLayout);
    assert!(device.log().buffers.is_empty());
}

#[tokio::test]
async fn failures_carry_their_kind() {
    let cases = [
        (
            RecordingDevice::default(),
            RecordingView::new(ViewConfig::default()),
            common::assets("missing.obj"),
            FailureKind::AssetNotFound,
        ),
        (
            RecordingDevice::default(),
            RecordingView::new(ViewConfig::default()),
            common::fixtures("no_faces.obj"),
            FailureKind::AssetMalformed,
        ),
        (
            RecordingDevice::new(RecordingOptions {
                queue_unavailable: true,
                ..Default::default()
            }),
            RecordingView::new(ViewConfig::default()),
            common::assets("cube.obj"),
            FailureKind::DeviceUnavailable,
        ),
        (
            RecordingDevice::new(RecordingOptions {
                reject_pipelines: true,
                ..Default::default()
            }),
            RecordingView::new(ViewConfig::default()),
            common::assets("cube.obj"),
            FailureKind::BackendRejected,
        ),
        (
            RecordingDevice::new(RecordingOptions {
                wireframe: false,
                ..Default::default()
            }),
            RecordingView::new(ViewConfig::default()),
            common::assets("cube.obj"),
            FailureKind::BackendRejected,
        ),
        (
            RecordingDevice::default(),
            RecordingView::new(ViewConfig::default()).without_drawables(),
            common::assets("cube.obj"),
            FailureKind::NoDrawable,
        ),
    ];

    for (device, mut view, assets, kind) in cases {
        let err = render_once(device.clone(), &mut view, &assets)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{} ({err})", assets.model);
        assert!(device.log().frames.is_empty());
    }
}

#[tokio::test]
async fn depth_view_format_is_rejected_at_build_time() {
    let device = RecordingDevice::default();
    let mut view = RecordingView::new(ViewConfig {
        color_format: wgpu::TextureFormat::Depth24Plus,
        ..Default::default()
    });
    let err = render_once(device.clone(), &mut view, &common::assets("cube.obj"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::BackendRejected);
    assert!(device.log().pipelines.is_empty());
}
