//! Image store and per-location registry
//!
//! An [`ImageStore`] owns one image cube loaded wholesale from an NPY file and
//! hands out copies of individual cutouts by integer key. A [`StoreRegistry`]
//! maps resource locations to shared store handles so that opening the same
//! location twice reuses the already-loaded cube.

use crate::error::{PanelError, PanelResult};
use crate::io::npy::read_npy;
use ndarray::{s, Array2, Array3, Array4, ArrayView3, Axis};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One cutout, stored as `height x width x channels` samples
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pixels: Array3<f32>,
}

impl ImageBuffer {
    pub fn new(pixels: Array3<f32>) -> Self {
        Self { pixels }
    }

    /// Wrap a single-channel image
    pub fn from_gray(pixels: Array2<f32>) -> Self {
        Self {
            pixels: pixels.insert_axis(Axis(2)),
        }
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn channels(&self) -> usize {
        self.pixels.shape()[2]
    }

    pub fn pixels(&self) -> ArrayView3<'_, f32> {
        self.pixels.view()
    }

    /// Sample at row `y`, column `x`, channel `c`
    pub fn sample(&self, y: usize, x: usize, c: usize) -> f32 {
        self.pixels[[y, x, c]]
    }

    /// Minimum and maximum over finite samples, `None` if there are none
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.pixels
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Image cube loaded from a single resource location
#[derive(Debug)]
pub struct ImageStore {
    location: PathBuf,
    cube: RwLock<Option<Array4<f32>>>,
}

impl ImageStore {
    /// Load the whole cube at `path`; fails with `NotFound` if it does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> PanelResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PanelError::missing_resource(path));
        }
        let cube = read_npy(path)?;
        log::info!(
            "Loaded image cube {} with {} images",
            path.display(),
            cube.shape()[0]
        );
        Ok(Self::from_cube(path, cube))
    }

    /// Build a store around an in-memory cube shaped `(count, h, w, c)`
    pub fn from_cube<P: AsRef<Path>>(location: P, cube: Array4<f32>) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            cube: RwLock::new(Some(cube)),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.cube.read().is_some()
    }

    /// Number of images; zero once unloaded
    pub fn len(&self) -> usize {
        self.cube.read().as_ref().map_or(0, |c| c.shape()[0])
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(height, width, channels)` shared by every image in the cube
    pub fn image_shape(&self) -> Option<(usize, usize, usize)> {
        self.cube.read().as_ref().map(|c| {
            let shape = c.shape();
            (shape[1], shape[2], shape[3])
        })
    }

    /// Copy out the image stored under `key`
    pub fn get_image(&self, key: i64) -> PanelResult<ImageBuffer> {
        let guard = self.cube.read();
        let cube = guard.as_ref().ok_or_else(|| {
            PanelError::NotFound(format!("no data loaded for {}", self.location.display()))
        })?;
        let index = checked_index(key, cube.shape()[0])?;
        Ok(ImageBuffer::new(cube.index_axis(Axis(0), index).to_owned()))
    }

    /// Overwrite one image in place; the change is visible through every handle
    pub fn replace_image(&self, key: i64, image: &ImageBuffer) -> PanelResult<()> {
        let mut guard = self.cube.write();
        let cube = guard.as_mut().ok_or_else(|| {
            PanelError::NotFound(format!("no data loaded for {}", self.location.display()))
        })?;
        let index = checked_index(key, cube.shape()[0])?;
        let mut slot = cube.slice_mut(s![index, .., .., ..]);
        if slot.shape() != image.pixels().shape() {
            return Err(PanelError::invalid_config(format!(
                "image shape {:?} does not match cube shape {:?}",
                image.pixels().shape(),
                slot.shape()
            )));
        }
        slot.assign(&image.pixels());
        Ok(())
    }

    /// Drop the cube; later lookups fail with `NotFound`
    pub fn unload(&self) {
        if self.cube.write().take().is_some() {
            log::debug!("Unloaded image cube {}", self.location.display());
        }
    }
}

fn checked_index(key: i64, len: usize) -> PanelResult<usize> {
    if key < 0 || key as u64 >= len as u64 {
        return Err(PanelError::OutOfRange { index: key, len });
    }
    Ok(key as usize)
}

/// Location-keyed registry of shared stores.
///
/// The first `open` of a location loads it; later calls return the same
/// handle. Loading happens under the registry lock, so concurrent callers
/// never load a location twice.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, Arc<ImageStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open<P: AsRef<Path>>(&self, path: P) -> PanelResult<Arc<ImageStore>> {
        let path = path.as_ref();
        let key = registry_key(path);

        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key) {
            log::debug!("Reusing image store for {}", key.display());
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(ImageStore::open(path)?);
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Equivalent spellings of an existing file share one entry
fn registry_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::npy::write_npy;
    use ndarray::Array4;
    use tempfile::tempdir;

    fn demo_cube(count: usize) -> Array4<f32> {
        Array4::from_shape_fn((count, 4, 5, 1), |(n, y, x, _)| (n * 100 + y * 10 + x) as f32)
    }

    #[test]
    fn test_get_image() {
        let store = ImageStore::from_cube("mem.npy", demo_cube(3));
        let image = store.get_image(2).unwrap();
        assert_eq!((image.height(), image.width(), image.channels()), (4, 5, 1));
        assert_eq!(image.sample(3, 4, 0), 234.0);
        assert_eq!(image.value_range(), Some((200.0, 234.0)));
    }

    #[test]
    fn test_get_image_out_of_range() {
        let store = ImageStore::from_cube("mem.npy", demo_cube(3));
        for key in [3, -1, i64::MAX, i64::MIN] {
            match store.get_image(key) {
                Err(PanelError::OutOfRange { index, len }) => {
                    assert_eq!(index, key);
                    assert_eq!(len, 3);
                }
                other => panic!("expected OutOfRange for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unloaded_store_is_not_found() {
        let store = ImageStore::from_cube("mem.npy", demo_cube(1));
        store.unload();
        assert!(!store.is_loaded());
        assert_eq!(store.len(), 0);
        assert!(matches!(store.get_image(0), Err(PanelError::NotFound(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = ImageStore::open(dir.path().join("absent.npy")).unwrap_err();
        assert!(matches!(err, PanelError::NotFound(_)));
    }

    #[test]
    fn test_replace_image_checks_shape() {
        let store = ImageStore::from_cube("mem.npy", demo_cube(2));
        let wrong = ImageBuffer::from_gray(Array2::zeros((2, 2)));
        assert!(matches!(
            store.replace_image(0, &wrong),
            Err(PanelError::InvalidConfig(_))
        ));

        let blank = ImageBuffer::from_gray(Array2::zeros((4, 5)));
        store.replace_image(1, &blank).unwrap();
        assert_eq!(store.get_image(1).unwrap(), blank);
    }

    #[test]
    fn test_registry_reuses_loaded_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.npy");
        write_npy(&path, &demo_cube(2)).unwrap();

        let registry = StoreRegistry::new();
        let a = registry.open(&path).unwrap();
        let b = registry.open(dir.path().join(".").join("cube.npy")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        // An edit through one handle is observed through the other
        let blank = ImageBuffer::from_gray(Array2::zeros((4, 5)));
        a.replace_image(0, &blank).unwrap();
        assert_eq!(b.get_image(0).unwrap(), blank);
    }

    #[test]
    fn test_registries_are_isolated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.npy");
        write_npy(&path, &demo_cube(2)).unwrap();

        let first = StoreRegistry::new().open(&path).unwrap();
        let second = StoreRegistry::new().open(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registry_missing_location() {
        let registry = StoreRegistry::new();
        assert!(matches!(
            registry.open("/no/such/cube.npy"),
            Err(PanelError::NotFound(_))
        ));
        assert!(registry.is_empty());
    }
}
