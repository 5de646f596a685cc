//! Handle table for CPU-resident surfaces

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::{CpuSurface, SurfaceError, SurfaceRef, SurfaceResult};

/// Maps native surface handles to CPU pixel data.
///
/// The host registers a surface once and then replaces its contents every
/// frame with [`SurfaceStore::update`]. Dimensions are fixed at
/// registration, like a render texture.
pub struct SurfaceStore {
    surfaces: RwLock<HashMap<u64, CpuSurface>>,
    next_handle: AtomicU64,
}

impl SurfaceStore {
    pub fn new() -> Self {
        Self {
            surfaces: RwLock::new(HashMap::new()),
            // 0 is the null handle
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register a surface and return a reference to it
    pub fn insert(&self, surface: CpuSurface) -> SurfaceResult<SurfaceRef> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        if handle == 0 || handle == u64::MAX {
            return Err(SurfaceError::HandlesExhausted);
        }

        let reference = SurfaceRef::new(handle, surface.width, surface.height, surface.format);
        self.surfaces.write().insert(handle, surface);

        debug!(
            handle,
            width = reference.width(),
            height = reference.height(),
            "Registered surface"
        );
        Ok(reference)
    }

    /// Replace the contents of a registered surface
    pub fn update(&self, reference: SurfaceRef, surface: CpuSurface) -> SurfaceResult<()> {
        if reference.is_null() {
            return Err(SurfaceError::NullSurface);
        }

        let mut surfaces = self.surfaces.write();
        let slot = surfaces
            .get_mut(&reference.handle())
            .ok_or(SurfaceError::UnknownSurface(reference.handle()))?;

        if surface.width != slot.width || surface.height != slot.height {
            return Err(SurfaceError::SizeMismatch {
                expected_width: slot.width,
                expected_height: slot.height,
                width: surface.width,
                height: surface.height,
            });
        }

        *slot = surface;
        Ok(())
    }

    /// Resolve a reference to its current contents
    pub fn get(&self, reference: SurfaceRef) -> SurfaceResult<CpuSurface> {
        if reference.is_null() {
            return Err(SurfaceError::NullSurface);
        }

        self.surfaces
            .read()
            .get(&reference.handle())
            .cloned()
            .ok_or(SurfaceError::UnknownSurface(reference.handle()))
    }

    /// Unregister a surface. Later lookups of `reference` fail.
    pub fn remove(&self, reference: SurfaceRef) -> Option<CpuSurface> {
        self.surfaces.write().remove(&reference.handle())
    }

    pub fn len(&self) -> usize {
        self.surfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SurfaceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    #[test]
    fn test_insert_and_get() {
        let store = SurfaceStore::new();
        let surface = CpuSurface::solid(8, 4, PixelFormat::Rgba8Unorm, [9, 9, 9, 255]).unwrap();

        let reference = store.insert(surface).unwrap();
        assert!(!reference.is_null());
        assert_eq!((reference.width(), reference.height()), (8, 4));

        let resolved = store.get(reference).unwrap();
        assert_eq!(resolved.row(0)[0], 9);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_keeps_size() {
        let store = SurfaceStore::new();
        let reference = store
            .insert(CpuSurface::solid(8, 4, PixelFormat::Rgba8Unorm, [0; 4]).unwrap())
            .unwrap();

        let resized = CpuSurface::solid(4, 4, PixelFormat::Rgba8Unorm, [0; 4]).unwrap();
        assert!(matches!(
            store.update(reference, resized),
            Err(SurfaceError::SizeMismatch { .. })
        ));

        let next = CpuSurface::solid(8, 4, PixelFormat::Rgba8Unorm, [1; 4]).unwrap();
        store.update(reference, next).unwrap();
        assert_eq!(store.get(reference).unwrap().row(3)[0], 1);
    }

    #[test]
    fn test_null_and_removed() {
        let store = SurfaceStore::new();
        assert!(matches!(store.get(SurfaceRef::NULL), Err(SurfaceError::NullSurface)));

        let reference = store
            .insert(CpuSurface::solid(2, 2, PixelFormat::Rgba8Unorm, [0; 4]).unwrap())
            .unwrap();
        assert!(store.remove(reference).is_some());
        assert!(matches!(
            store.get(reference),
            Err(SurfaceError::UnknownSurface(_))
        ));
        assert!(store.is_empty());
    }
}
