//! Filesystem persistence for grid outputs.
//!
//! Layout under the grid directory:
//!
//! ```text
//! adv_grid_<name>/
//!   config.json
//!   images/adv_cell-<code>-<name>.png
//!   thumbnails/adv_cell-<code>-<name>.png
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use advgrid_core::manifest::{GridManifest, MANIFEST_FILE};
use image::{DynamicImage, ImageFormat};

use crate::error::PipelineError;

pub const IMAGES_DIR: &str = "images";
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Bounding box of generated thumbnails.
pub const THUMBNAIL_SIZE: u32 = 512;

/// Text chunk key holding the generation parameters.
pub const PARAMETERS_KEY: &str = "parameters";

/// Whether `dir` holds a file named `stem` with any extension.
pub fn cell_exists(dir: &Path, stem: &str) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .any(|entry| entry.path().file_stem().is_some_and(|s| s == stem))
}

/// Write the manifest to `<grid_path>/config.json`, creating the directory.
pub fn write_manifest(grid_path: &Path, manifest: &GridManifest) -> Result<PathBuf, PipelineError> {
    let path = grid_path.join(MANIFEST_FILE);
    let manifest_error = |reason: String| PipelineError::Manifest {
        path: path.display().to_string(),
        reason,
    };
    let json = manifest.to_json()?;
    fs::create_dir_all(grid_path).map_err(|e| manifest_error(e.to_string()))?;
    fs::write(&path, json).map_err(|e| manifest_error(e.to_string()))?;
    tracing::debug!(path = %path.display(), "Grid manifest written");
    Ok(path)
}

fn artifact_error(context: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Artifact(format!("{context}: {err}"))
}

/// Decode encoded image bytes returned by the renderer.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    image::load_from_memory(bytes).map_err(|e| artifact_error("Cannot decode image", e))
}

/// Whether cell images can be written with `extension`. Only PNG carries
/// the `parameters` text chunk.
pub fn is_supported_format(extension: &str) -> bool {
    ImageFormat::from_extension(extension) == Some(ImageFormat::Png)
}

/// Save `image` as `<dir>/<stem>.<extension>` with `infotext` in a
/// `parameters` text chunk.
pub fn save_image(
    image: &DynamicImage,
    dir: &Path,
    stem: &str,
    extension: &str,
    infotext: &str,
) -> Result<PathBuf, PipelineError> {
    if !is_supported_format(extension) {
        return Err(PipelineError::Artifact(format!(
            "Unsupported image format '{extension}'"
        )));
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{extension}"));
    write_png_with_parameters(image, &path, infotext)?;
    Ok(path)
}

fn write_png_with_parameters(
    image: &DynamicImage,
    path: &Path,
    infotext: &str,
) -> Result<(), PipelineError> {
    let rgba = image.to_rgba8();
    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(writer, rgba.width(), rgba.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder
        .add_itxt_chunk(PARAMETERS_KEY.to_string(), infotext.to_string())
        .map_err(|e| artifact_error("Cannot embed parameters", e))?;
    let mut writer = encoder
        .write_header()
        .map_err(|e| artifact_error("Cannot write PNG header", e))?;
    writer
        .write_image_data(rgba.as_raw())
        .map_err(|e| artifact_error("Cannot write PNG data", e))?;
    Ok(())
}

/// Save a PNG thumbnail bounded by [`THUMBNAIL_SIZE`], keeping aspect ratio.
pub fn save_thumbnail(image: &DynamicImage, dir: &Path, stem: &str) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.png"));
    image
        .thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| artifact_error("Cannot save thumbnail", e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use advgrid_core::GenerationRequest;
    use assert_matches::assert_matches;
    use image::RgbaImage;

    use super::*;

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255])))
    }

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    // -- existence --

    #[test]
    fn exists_matches_stem_with_any_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("adv_cell-0101-cat.jpg"), b"x").unwrap();
        assert!(cell_exists(dir.path(), "adv_cell-0101-cat"));
        assert!(!cell_exists(dir.path(), "adv_cell-0101"));
        assert!(!cell_exists(dir.path(), "adv_cell-0102-cat"));
        assert!(!cell_exists(&dir.path().join("missing"), "adv_cell-0101-cat"));
    }

    // -- images --

    #[test]
    fn png_embeds_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let image = decode_image(&encode_png(&sample(8, 4))).unwrap();
        let path = save_image(&image, dir.path(), "cell", "png", "a cat\nSteps: 20").unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        let text = info
            .utf8_text
            .iter()
            .find(|chunk| chunk.keyword == PARAMETERS_KEY)
            .unwrap();
        assert_eq!(text.get_text().unwrap(), "a cat\nSteps: 20");
        assert_eq!((info.width, info.height), (8, 4));
    }

    #[test]
    fn formats_without_parameters_are_rejected() {
        assert!(is_supported_format("png"));
        assert!(is_supported_format("PNG"));
        assert!(!is_supported_format("jpg"));
        assert!(!is_supported_format("webp"));

        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            save_image(&sample(4, 4), dir.path(), "cell", "jpg", "a cat"),
            Err(PipelineError::Artifact(_))
        );
        assert!(!dir.path().join("cell.jpg").exists());
    }

    #[test]
    fn garbage_bytes_are_artifact_errors() {
        assert_matches!(decode_image(b"not an image"), Err(PipelineError::Artifact(_)));
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            save_image(&sample(2, 2), dir.path(), "cell", "nope", ""),
            Err(PipelineError::Artifact(_))
        );
    }

    #[test]
    fn thumbnail_fits_bounding_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_thumbnail(&sample(1024, 768), dir.path(), "cell").unwrap();
        let thumb = image::open(path).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (512, 384));
    }

    // -- manifest --

    #[test]
    fn manifest_is_written_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let grid_path = dir.path().join("adv_grid_test");
        let manifest = GridManifest::new("test", &GenerationRequest::default(), &[]).unwrap();
        let path = write_manifest(&grid_path, &manifest).unwrap();
        let written: GridManifest = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, manifest);
    }
}
