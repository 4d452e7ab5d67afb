//! # Viewer
//!
//! Renders the vehicle and fire scene. The meshes spin about their up axis;
//! F2 cycles the effect techniques, arrow keys move the camera.
//!
//! Assets are read from `assets/` next to the crate manifest unless
//! `FLINT_ASSET_DIR` points elsewhere. Missing models fall back to a cube and
//! a quad; missing maps are skipped.

use std::path::PathBuf;

use flint::config::{EffectCompileConfig, RendererConfig};
use flint::FlintApp;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("flint=info")).init();

    let asset_root = std::env::var_os("FLINT_ASSET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"));

    let config = RendererConfig::default().with_effects(EffectCompileConfig::from_build_profile());

    // Create the application
    let app = FlintApp::new(config, asset_root)?;

    // Run the application
    app.run()
}
