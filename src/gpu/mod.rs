//! GPU compute infrastructure.
//!
//! Uses wgpu for cross-platform compute (Metal, Vulkan, DX12). A
//! [`DeviceContext`] bundles a device and its queue under a process-unique
//! identity; kernels key their compilation cache on that identity, so the
//! same context listed twice compiles once.

pub mod vector;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use vector::{partition, DeviceVector};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

struct ContextInner {
    id: u64,
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// A compute device, its submission queue, and a process-unique id.
///
/// Cloning shares the underlying device; clones compare as the same
/// context for compilation-cache purposes.
#[derive(Clone)]
pub struct DeviceContext {
    inner: Arc<ContextInner>,
}

impl DeviceContext {
    fn from_adapter(adapter: &wgpu::Adapter) -> Option<DeviceContext> {
        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("symkern-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .ok()?;
        Some(DeviceContext {
            inner: Arc::new(ContextInner {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                name: info.name,
                device,
                queue,
            }),
        })
    }

    /// The highest-preference adapter, or None when the host has no usable
    /// compute device.
    pub fn try_default() -> Option<DeviceContext> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            }))?;
        DeviceContext::from_adapter(&adapter)
    }

    /// One context per adapter the host exposes. Adapters that refuse a
    /// device request are skipped.
    pub fn enumerate() -> Vec<DeviceContext> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        instance
            .enumerate_adapters(wgpu::Backends::all())
            .iter()
            .filter_map(DeviceContext::from_adapter)
            .collect()
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.inner.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.inner.queue
    }

    /// Threads per workgroup baked into kernels compiled for this device.
    /// Capped at 64, which every current backend supports in one dimension.
    pub fn preferred_workgroup_size(&self) -> u32 {
        self.inner
            .device
            .limits()
            .max_compute_workgroup_size_x
            .clamp(1, 64)
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let Some(ctx) = DeviceContext::try_default() else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let twin = ctx.clone();
        assert_eq!(ctx.id(), twin.id());
        let wg = ctx.preferred_workgroup_size();
        assert!((1..=64).contains(&wg));
    }

    #[test]
    fn enumerated_contexts_have_distinct_ids() {
        let contexts = DeviceContext::enumerate();
        if contexts.is_empty() {
            eprintln!("no GPU adapter available, skipping");
            return;
        }
        for (i, a) in contexts.iter().enumerate() {
            for b in &contexts[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }
}
