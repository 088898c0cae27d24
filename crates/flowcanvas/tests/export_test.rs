use flowcanvas::model::{
    Breadboard, Connection, ElementKind, Endpoint, GridCell, ProcessDiagram, ProcessStep, Screen,
    SubElement,
};
use flowcanvas::render::raster::{
    ExportOptions, Exporter, ImageFormat, RasterError, export_breadboard_jpeg_sync,
    export_process_jpeg, export_process_png_sync,
};
use flowcanvas::LayoutConfig;
use futures::executor::block_on;

fn three_steps() -> ProcessDiagram {
    let mut d = ProcessDiagram::new();
    for (i, (r, c)) in [(0, 0), (1, 4), (0, 2)].into_iter().enumerate() {
        d.add_entity(ProcessStep::new(format!("s{i}"), "Step", GridCell::new(r, c)))
            .unwrap();
    }
    d.add_connection(Connection::new(Endpoint::entity("s0"), "s2").with_label("next"))
        .unwrap();
    d
}

fn dims(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

#[test]
fn jpeg_export_renders_whole_diagram_at_requested_scale() {
    let cfg = LayoutConfig::default();
    let bytes = block_on(export_process_jpeg(
        &three_steps(),
        &cfg,
        &ExportOptions::from_config(&cfg),
    ))
    .unwrap();
    assert!(bytes.starts_with(&[0xFF, 0xD8]));
    assert_eq!(dims(&bytes), (3000, 680));
}

#[test]
fn oversized_export_is_downscaled_to_the_ceiling() {
    let cfg = LayoutConfig::default();
    let mut d = ProcessDiagram::new();
    for c in 0..30 {
        d.add_entity(ProcessStep::new(format!("top{c}"), "Step", GridCell::new(0, c)))
            .unwrap();
    }
    d.add_entity(ProcessStep::new("below", "Step", GridCell::new(1, 0)))
        .unwrap();
    let bytes = export_process_png_sync(&d, &cfg, &ExportOptions::from_config(&cfg)).unwrap();
    assert_eq!(dims(&bytes), (8000, 303));
}

#[test]
fn breadboard_jpeg_export() {
    let cfg = LayoutConfig::default();
    let mut d = Breadboard::new();
    d.add_entity(
        Screen::new("login", "Login")
            .with_element(SubElement::new("go", ElementKind::Button, "Sign in")),
    )
    .unwrap();
    d.add_entity(Screen::new("home", "Home")).unwrap();
    d.add_connection(Connection::new(Endpoint::sub_element("login", "go"), "home"))
        .unwrap();
    let options = ExportOptions {
        scale: 1.0,
        ..ExportOptions::from_config(&cfg)
    };
    let bytes = export_breadboard_jpeg_sync(&d, &cfg, &options).unwrap();
    // Both screens share the first row: 600 wide, each screen is 44 + 30 + 24 high.
    assert_eq!(dims(&bytes), (600, 178));
}

#[test]
fn empty_diagram_is_refused() {
    let cfg = LayoutConfig::default();
    let err = block_on(export_process_jpeg(
        &ProcessDiagram::new(),
        &cfg,
        &ExportOptions::default(),
    ))
    .unwrap_err();
    assert!(matches!(err, RasterError::EmptyDiagram));
}

#[test]
fn exporter_refuses_concurrent_requests() {
    let cfg = LayoutConfig::default();
    let d = three_steps();
    let exporter = Exporter::new(ExportOptions {
        scale: 0.5,
        ..ExportOptions::default()
    });

    let guard = exporter.try_begin().unwrap();
    assert!(exporter.is_busy());
    let err = block_on(exporter.export_process(&d, &cfg)).unwrap_err();
    assert!(matches!(err, RasterError::ExportInProgress));
    drop(guard);
    assert!(!exporter.is_busy());

    let artifact = block_on(exporter.export_process(&d, &cfg)).unwrap();
    assert!(!exporter.is_busy());
    assert_eq!(artifact.format, ImageFormat::Jpeg);
    assert_eq!((artifact.width_px, artifact.height_px), (750, 170));
    assert!(artifact.data_uri().starts_with("data:image/jpeg;base64,"));

    let restored = ProcessDiagram::from_json(&artifact.json).unwrap();
    assert_eq!(restored.entities.len(), 3);
    assert_eq!(restored.connections.len(), 1);
}
