//! Build script for the playlist tuner.
//!
//! Copies the `.env.example` configuration template into the local data
//! directory where [`config::load_env`] looks for the `.env` file, so a fresh
//! install has a template next to the place the real file must live.

use std::{env, fs, path::PathBuf};

/// Copies `.env.example` from the crate root to `<data_local_dir>/playlist-tuner/`.
///
/// A missing template only produces a cargo warning. Failing to create the
/// target directory or to write the file fails the build.
///
/// Target locations:
/// - Linux: `~/.local/share/playlist-tuner/.env.example`
/// - macOS: `~/Library/Application Support/playlist-tuner/.env.example`
/// - Windows: `%LOCALAPPDATA%/playlist-tuner/.env.example`
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("playlist-tuner");
    fs::create_dir_all(&out_dir)?;

    if env_example_path.is_file() {
        let contents = fs::read_to_string(&env_example_path)?;
        fs::write(out_dir.join(".env.example"), contents)?;
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
    }

    Ok(())
}
