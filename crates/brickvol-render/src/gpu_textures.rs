//! wgpu residency for brick payloads.
//!
//! Brick channels are uploaded on demand as single-channel 3D textures. Resident
//! textures beyond the budget are evicted least recently used first, except for pinned
//! bricks, which stay until unpinned.

use std::collections::{HashMap, HashSet};

use brickvol_core::{BrickRef, UVec3};

use crate::backend::{Channel, TextureHandle, TextureProvider};
use crate::error::{RenderError, RenderResult};

/// Row pitch of a texture copy, padded to wgpu's buffer alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    width.div_ceil(align) * align
}

/// Bytes of a single-channel brick, widened before multiplying.
pub fn voxel_count(dims: UVec3) -> usize {
    dims.x as usize * dims.y as usize * dims.z as usize
}

/// One resident brick channel.
struct ResidentBrick {
    handle: TextureHandle,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    dims: UVec3,
    filter: wgpu::FilterMode,
    last_used: u64,
}

/// Uploads brick payloads to the GPU and keeps them resident within a budget.
pub struct WgpuBrickTextures {
    device: wgpu::Device,
    queue: wgpu::Queue,
    payloads: HashMap<(BrickRef, Channel), Vec<u8>>,
    resident: HashMap<(BrickRef, Channel), ResidentBrick>,
    pinned: HashSet<BrickRef>,
    max_resident: usize,
    next_handle: u64,
    tick: u64,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
}

impl WgpuBrickTextures {
    /// Creates a provider keeping at most `max_resident` unpinned channels resident.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, max_resident: usize) -> Self {
        let sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("brick sampler (linear)", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("brick sampler (nearest)", wgpu::FilterMode::Nearest);
        Self {
            device,
            queue,
            payloads: HashMap::new(),
            resident: HashMap::new(),
            pinned: HashSet::new(),
            max_resident: max_resident.max(1),
            next_handle: 1,
            tick: 0,
            linear_sampler,
            nearest_sampler,
        }
    }

    /// Creates a provider on a fresh headless device.
    pub async fn new_headless(max_resident: usize) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("brickvol device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;
        log::info!("headless brick residency on {}", adapter.get_info().name);
        Ok(Self::new(device, queue, max_resident))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers the CPU payload of one brick channel, dropping any stale resident copy.
    pub fn set_payload(&mut self, brick: BrickRef, channel: Channel, bytes: Vec<u8>) {
        self.resident.remove(&(brick, channel));
        self.payloads.insert((brick, channel), bytes);
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn is_resident(&self, brick: BrickRef, channel: Channel) -> bool {
        self.resident.contains_key(&(brick, channel))
    }

    /// View and sampler for a handle returned by [`TextureProvider::load_brick`].
    pub fn binding(&self, handle: TextureHandle) -> Option<(&wgpu::TextureView, &wgpu::Sampler)> {
        let brick = self.resident.values().find(|b| b.handle == handle)?;
        let sampler = match brick.filter {
            wgpu::FilterMode::Linear => &self.linear_sampler,
            wgpu::FilterMode::Nearest => &self.nearest_sampler,
        };
        Some((&brick.view, sampler))
    }

    fn upload(
        &self,
        brick: BrickRef,
        channel: Channel,
        dims: UVec3,
        bytes: &[u8],
    ) -> RenderResult<(wgpu::Texture, wgpu::TextureView)> {
        let expected = voxel_count(dims);
        if bytes.len() != expected {
            return Err(RenderError::TextureCreationFailed(format!(
                "brick {} {channel:?}: {} bytes for {}x{}x{}",
                brick.index,
                bytes.len(),
                dims.x,
                dims.y,
                dims.z
            )));
        }
        let size = wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("brick texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.x),
                rows_per_image: Some(dims.y),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok((texture, view))
    }

    /// Drops least recently used unpinned channels until the budget holds.
    fn evict(&mut self) {
        while self.resident.len() > self.max_resident {
            let victim = self
                .resident
                .iter()
                .filter(|((brick, _), _)| !self.pinned.contains(brick))
                .min_by_key(|(_, r)| r.last_used)
                .map(|(key, _)| *key);
            let Some(key) = victim else {
                break;
            };
            self.resident.remove(&key);
            log::debug!("evicted brick {} {:?}", key.0.index, key.1);
        }
    }
}

impl TextureProvider for WgpuBrickTextures {
    fn load_brick(
        &mut self,
        brick: BrickRef,
        dims: UVec3,
        channel: Channel,
        filter: wgpu::FilterMode,
    ) -> Option<TextureHandle> {
        self.tick += 1;
        if let Some(resident) = self.resident.get_mut(&(brick, channel)) {
            resident.last_used = self.tick;
            resident.filter = filter;
            return Some(resident.handle);
        }
        let Some(bytes) = self.payloads.get(&(brick, channel)) else {
            log::warn!("brick {} {channel:?} has no payload", brick.index);
            return None;
        };
        let (texture, view) = match self.upload(brick, channel, dims, bytes) {
            Ok(uploaded) => uploaded,
            Err(e) => {
                log::warn!("{e}");
                return None;
            }
        };
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.resident.insert(
            (brick, channel),
            ResidentBrick {
                handle,
                texture,
                view,
                dims,
                filter,
                last_used: self.tick,
            },
        );
        self.evict();
        self.resident
            .contains_key(&(brick, channel))
            .then_some(handle)
    }

    fn pin(&mut self, brick: BrickRef) {
        self.pinned.insert(brick);
    }

    fn unpin(&mut self, brick: BrickRef) {
        self.pinned.remove(&brick);
        self.evict();
    }

    fn read_back(&mut self, brick: BrickRef, channel: Channel) -> RenderResult<Vec<u8>> {
        let resident = self.resident.get(&(brick, channel)).ok_or_else(|| {
            RenderError::ReadbackFailed(format!("brick {} is not resident", brick.index))
        })?;
        let dims = resident.dims;
        let padded = padded_bytes_per_row(dims.x);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brick readback buffer"),
            size: u64::from(padded) * u64::from(dims.y) * u64::from(dims.z),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("brick readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &resident.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(dims.y),
                },
            },
            wgpu::Extent3d {
                width: dims.x,
                height: dims.y,
                depth_or_array_layers: dims.z,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::Timeout)?
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut out = Vec::with_capacity(voxel_count(dims));
        for row in data.chunks(padded as usize) {
            out.extend_from_slice(&row[..dims.x as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickvol_core::{UVec3, VolumeTexture};

    fn provider(max_resident: usize) -> Option<WgpuBrickTextures> {
        match pollster::block_on(WgpuBrickTextures::new_headless(max_resident)) {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_voxel_count_does_not_wrap() {
        assert_eq!(voxel_count(UVec3::new(5, 3, 2)), 30);
        assert_eq!(voxel_count(UVec3::splat(2048)), 8_589_934_592);
    }

    #[test]
    fn test_upload_and_read_back_unaligned_brick() {
        let Some(mut gpu) = provider(8) else { return };
        let tex = VolumeTexture::from_grid(UVec3::new(5, 3, 2), UVec3::new(5, 3, 2));
        let brick = tex.brick_ref(0);
        let bytes: Vec<u8> = (0..30).collect();
        gpu.set_payload(brick, Channel::Data, bytes.clone());

        let dims = UVec3::new(5, 3, 2);
        let handle = gpu.load_brick(brick, dims, Channel::Data, wgpu::FilterMode::Linear);
        assert!(handle.is_some());
        assert!(gpu.binding(handle.unwrap()).is_some());
        assert_eq!(gpu.read_back(brick, Channel::Data).unwrap(), bytes);
    }

    #[test]
    fn test_missing_payload_is_not_resident() {
        let Some(mut gpu) = provider(8) else { return };
        let tex = VolumeTexture::from_grid(UVec3::splat(4), UVec3::splat(4));
        let brick = tex.brick_ref(0);
        assert!(gpu
            .load_brick(brick, UVec3::splat(4), Channel::Mask, wgpu::FilterMode::Nearest)
            .is_none());
        assert!(gpu.read_back(brick, Channel::Mask).is_err());
    }

    #[test]
    fn test_eviction_keeps_pinned_bricks() {
        let Some(mut gpu) = provider(2) else { return };
        let tex = VolumeTexture::from_grid(UVec3::new(4, 4, 12), UVec3::splat(4));
        let dims = UVec3::splat(4);
        for i in 0..3 {
            gpu.set_payload(tex.brick_ref(i), Channel::Data, vec![0; 64]);
        }
        gpu.pin(tex.brick_ref(0));
        for i in 0..3 {
            gpu.load_brick(tex.brick_ref(i), dims, Channel::Data, wgpu::FilterMode::Nearest);
        }
        assert_eq!(gpu.resident_count(), 2);
        assert!(gpu.is_resident(tex.brick_ref(0), Channel::Data));
        assert!(!gpu.is_resident(tex.brick_ref(1), Channel::Data));
        assert!(gpu.is_resident(tex.brick_ref(2), Channel::Data));
    }
}
