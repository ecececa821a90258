#![allow(dead_code)]

use std::path::Path;

use wire_ngin::config::AssetConfig;

/// The shipped assets with `model` selected.
pub fn assets(model: &str) -> AssetConfig {
    AssetConfig::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"), model)
}

/// Broken and edge case OBJ files.
pub fn fixtures(model: &str) -> AssetConfig {
    AssetConfig::new(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("assets"),
        model,
    )
}

pub fn colour_to_rgba(colour: wgpu::Color) -> image::Rgba<u8> {
    let f_to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    image::Rgba([
        f_to_u8(colour.r),
        f_to_u8(colour.g),
        f_to_u8(colour.b),
        f_to_u8(colour.a),
    ])
}
