// ============================================================
// Layer 4 — Image Folder Dataset
// ============================================================
// One split of labelled images laid out as
//
//   <root>/<class_a>/img001.jpg
//   <root>/<class_a>/img002.png
//   <root>/<class_b>/...
//
// Class indices follow the sorted subfolder names, so the same
// folder names always map to the same labels across splits.
// Every image is decoded once when the split is opened and a
// file that doesn't decode fails the open. Only paths are kept;
// pixels are decoded again when a batch is assembled.

use anyhow::{bail, Context, Result};
use burn::data::dataset::Dataset;
use image::{DynamicImage, ImageReader};
use std::{
    fs,
    path::{Path, PathBuf},
};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "gif", "webp", "tiff"];

/// A single labelled image reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub path:  PathBuf,
    pub label: usize,
}

pub struct ImageFolder {
    root:        PathBuf,
    items:       Vec<ImageItem>,
    class_names: Vec<String>,
}

impl ImageFolder {
    /// Scan `root` for class subfolders and the images inside them.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let mut class_names: Vec<String> = fs::read_dir(&root)
            .with_context(|| format!("Cannot read image folder '{}'", root.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        class_names.sort();

        let mut items = Vec::new();
        for (label, class) in class_names.iter().enumerate() {
            let class_dir = root.join(class);
            let mut paths: Vec<PathBuf> = fs::read_dir(&class_dir)
                .with_context(|| format!("Cannot read class folder '{}'", class_dir.display()))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            paths.sort();

            for path in &paths {
                load_image(path)?;
            }

            tracing::debug!("  class {} '{}': {} images", label, class, paths.len());
            items.extend(paths.into_iter().map(|path| ImageItem { path, label }));
        }

        if items.is_empty() {
            bail!("No images found under '{}'", root.display());
        }

        tracing::info!(
            "Loaded {} images in {} classes from '{}'",
            items.len(),
            class_names.len(),
            root.display()
        );

        Ok(Self { root, items, class_names })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}

/// Decode an image, detecting the format from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .with_context(|| format!("Cannot read image '{}'", path.display()))?
        .decode()
        .with_context(|| format!("Cannot decode image '{}'", path.display()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl Dataset<ImageItem> for ImageFolder {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    /// Writes a 2x2 PNG regardless of the file's extension
    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut buf = Cursor::new(Vec::new());
        RgbImage::new(2, 2).write_to(&mut buf, ImageFormat::Png).unwrap();
        fs::write(path, buf.into_inner()).unwrap();
    }

    #[test]
    fn test_labels_follow_sorted_folders() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("dog/b.jpg"));
        touch(&dir.path().join("dog/a.PNG"));
        touch(&dir.path().join("cat/x.jpeg"));
        fs::write(dir.path().join("cat/notes.txt"), b"ignored").unwrap();

        let ds = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(ds.class_names(), &["cat".to_string(), "dog".to_string()]);
        assert_eq!(ds.len(), 3);

        let first = ds.get(0).unwrap();
        assert_eq!(first.label, 0);
        assert!(first.path.ends_with("cat/x.jpeg"));

        let second = ds.get(1).unwrap();
        assert_eq!(second.label, 1);
        assert!(second.path.ends_with("dog/a.PNG"));
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty_class")).unwrap();
        assert!(ImageFolder::open(dir.path()).is_err());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageFolder::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cat/ok.png"));
        fs::write(dir.path().join("cat/broken.png"), b"not an image").unwrap();

        let err = ImageFolder::open(dir.path()).err().unwrap();
        assert!(format!("{err:#}").contains("broken.png"));
    }
}
