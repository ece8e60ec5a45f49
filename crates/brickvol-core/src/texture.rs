//! The brick container of one volume.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{DMat4, DVec3, UVec3};

use crate::{BBox, Brick, BrickvolError, Result};

static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a volume texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u64);

impl VolumeId {
    fn next() -> Self {
        Self(NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies one brick of one volume for the texture provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrickRef {
    pub volume: VolumeId,
    pub index: usize,
}

/// A decomposed volume: bricks in normalized index space plus volume-wide metadata.
///
/// Brick boxes live in `[0,1]^3`; `transform` maps that space into the scene.
#[derive(Debug, Clone)]
pub struct VolumeTexture {
    id: VolumeId,
    dims: UVec3,
    spacing: DVec3,
    bbox: BBox,
    transform: DMat4,
    components: u32,
    has_mask: bool,
    has_label: bool,
    bricks: Vec<Brick>,
    quota: Vec<usize>,
}

impl VolumeTexture {
    /// Creates a volume of `dims` voxels from already decomposed bricks.
    pub fn new(dims: UVec3, bricks: Vec<Brick>) -> Self {
        Self {
            id: VolumeId::next(),
            dims: dims.max(UVec3::ONE),
            spacing: DVec3::ONE,
            bbox: BBox::unit(),
            transform: DMat4::IDENTITY,
            components: 1,
            has_mask: false,
            has_label: false,
            bricks,
            quota: Vec::new(),
        }
    }

    /// Splits a `dims` volume into a regular grid of bricks of at most `brick_dims` voxels.
    pub fn from_grid(dims: UVec3, brick_dims: UVec3) -> Self {
        let dims = dims.max(UVec3::ONE);
        let step = brick_dims.max(UVec3::ONE);
        let count = (dims + step - UVec3::ONE) / step;
        let size = dims.as_dvec3();

        let mut bricks = Vec::with_capacity(count.x as usize * count.y as usize * count.z as usize);
        for k in 0..count.z {
            for j in 0..count.y {
                for i in 0..count.x {
                    let offset = UVec3::new(i, j, k) * step;
                    let extent = (dims - offset).min(step);
                    let bbox = BBox::new(
                        offset.as_dvec3() / size,
                        (offset + extent).as_dvec3() / size,
                    );
                    bricks.push(Brick::new(bbox, extent, offset));
                }
            }
        }
        Self::new(dims, bricks)
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn nx(&self) -> u32 {
        self.dims.x
    }

    pub fn ny(&self) -> u32 {
        self.dims.y
    }

    pub fn nz(&self) -> u32 {
        self.dims.z
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn spacing(&self) -> DVec3 {
        self.spacing
    }

    /// Sets the voxel spacing; the scene transform is rebuilt to `dims * spacing`.
    pub fn set_spacing(&mut self, spacing: DVec3) {
        self.spacing = spacing;
        self.transform = DMat4::from_scale(self.dims.as_dvec3() * spacing);
    }

    /// Transform from normalized index space to the scene.
    pub fn transform(&self) -> &DMat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: DMat4) {
        self.transform = transform;
    }

    /// Number of data components per voxel.
    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn set_components(&mut self, components: u32) {
        self.components = components.max(1);
    }

    pub fn has_mask(&self) -> bool {
        self.has_mask
    }

    pub fn set_has_mask(&mut self, has_mask: bool) {
        self.has_mask = has_mask;
    }

    pub fn has_label(&self) -> bool {
        self.has_label
    }

    pub fn set_has_label(&mut self, has_label: bool) {
        self.has_label = has_label;
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn bricks_mut(&mut self) -> &mut [Brick] {
        &mut self.bricks
    }

    pub fn brick_count(&self) -> usize {
        self.bricks.len()
    }

    pub fn brick(&self, index: usize) -> Result<&Brick> {
        let count = self.bricks.len();
        self.bricks
            .get(index)
            .ok_or(BrickvolError::BrickOutOfRange { index, count })
    }

    pub fn brick_mut(&mut self, index: usize) -> Result<&mut Brick> {
        let count = self.bricks.len();
        self.bricks
            .get_mut(index)
            .ok_or(BrickvolError::BrickOutOfRange { index, count })
    }

    /// Reference used when talking to the texture provider.
    pub fn brick_ref(&self, index: usize) -> BrickRef {
        BrickRef {
            volume: self.id,
            index,
        }
    }

    /// The current quota selection (indices into [`Self::bricks`]).
    pub fn quota(&self) -> &[usize] {
        &self.quota
    }

    pub fn set_quota(&mut self, quota: Vec<usize>) {
        self.quota = quota;
    }

    /// Clears all drawn flags and quota state.
    pub fn reset_bricks(&mut self) {
        for brick in &mut self.bricks {
            brick.reset_drawn();
        }
        self.quota.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_grid_tiles_volume() {
        let tex = VolumeTexture::from_grid(UVec3::new(100, 64, 30), UVec3::new(64, 64, 16));
        assert_eq!(tex.brick_count(), 2 * 1 * 2);
        let total: usize = tex.bricks().iter().map(Brick::voxel_count).sum();
        assert_eq!(total, 100 * 64 * 30);
        let last = tex.brick(3).unwrap();
        assert_eq!(last.dims(), UVec3::new(36, 64, 14));
        assert!((last.bbox().max - DVec3::ONE).length() < 1e-12);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = VolumeTexture::from_grid(UVec3::splat(8), UVec3::splat(8));
        let b = VolumeTexture::from_grid(UVec3::splat(8), UVec3::splat(8));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.brick_ref(0).volume, a.id());
    }

    #[test]
    fn test_brick_out_of_range() {
        let tex = VolumeTexture::from_grid(UVec3::splat(8), UVec3::splat(8));
        assert!(matches!(
            tex.brick(5),
            Err(BrickvolError::BrickOutOfRange { index: 5, count: 1 })
        ));
    }
}
