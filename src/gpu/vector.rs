//! Device vectors partitioned across contexts.
//!
//! A [`DeviceVector`] holds one storage buffer per context, covering a
//! contiguous slice of the logical vector. Partition boundaries come from
//! [`partition`], so every vector split over the same context list lines up
//! element for element and generated kernels never need cross-device reads.

use wgpu::util::DeviceExt;

use super::DeviceContext;
use crate::error::Error;
use crate::kernel::VectorArg;
use crate::sym::Scalar;

/// Element range `[start, end)` assigned to partition `part` of `parts`.
/// Splits as evenly as integer arithmetic allows; the ranges are contiguous
/// and cover `0..len` exactly.
pub fn partition(len: usize, parts: usize, part: usize) -> std::ops::Range<usize> {
    debug_assert!(part < parts);
    (len * part / parts)..(len * (part + 1) / parts)
}

struct Part {
    ctx: DeviceContext,
    buffer: wgpu::Buffer,
    len: usize,
}

/// A logical vector of `T`, stored as one buffer slice per device context.
pub struct DeviceVector<T: Scalar> {
    parts: Vec<Part>,
    len: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Scalar> DeviceVector<T> {
    /// Upload `data`, partitioned evenly over `contexts`.
    pub fn from_slice(contexts: &[DeviceContext], data: &[T]) -> Result<Self, Error> {
        if contexts.is_empty() {
            return Err(Error::NoDevice);
        }
        let parts = contexts
            .iter()
            .enumerate()
            .map(|(d, ctx)| {
                let range = partition(data.len(), contexts.len(), d);
                Part {
                    ctx: ctx.clone(),
                    buffer: upload(ctx, &data[range.clone()]),
                    len: range.len(),
                }
            })
            .collect();
        Ok(DeviceVector {
            parts,
            len: data.len(),
            _marker: std::marker::PhantomData,
        })
    }

    /// A vector of `len` copies of `value`.
    pub fn splat(contexts: &[DeviceContext], len: usize, value: T) -> Result<Self, Error> {
        Self::from_slice(contexts, &vec![value; len])
    }

    /// Logical element count across all partitions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy every partition back to the host, in partition order.
    pub fn read(&self) -> Result<Vec<T>, Error> {
        let mut out = Vec::with_capacity(self.len);
        for part in &self.parts {
            if part.len == 0 {
                continue;
            }
            out.extend_from_slice(&readback(part)?);
        }
        Ok(out)
    }
}

impl<T: Scalar> VectorArg for DeviceVector<T> {
    fn element_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn num_parts(&self) -> usize {
        self.parts.len()
    }

    fn part_len(&self, part: usize) -> usize {
        self.parts[part].len
    }

    fn part_buffer(&self, part: usize) -> &wgpu::Buffer {
        &self.parts[part].buffer
    }
}

fn upload<T: Scalar>(ctx: &DeviceContext, data: &[T]) -> wgpu::Buffer {
    // Zero-length bindings are invalid, so an empty partition still gets one
    // element of backing store. It is never dispatched against.
    let contents: &[u8] = if data.is_empty() {
        &[0u8; 4]
    } else {
        bytemuck::cast_slice(data)
    };
    ctx.device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("symkern-vector"),
            contents,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        })
}

fn readback<T: Scalar>(part: &Part) -> Result<Vec<T>, Error> {
    let device = part.ctx.device();
    let size = (part.len * std::mem::size_of::<T>()) as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("symkern-staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("symkern-readback"),
    });
    encoder.copy_buffer_to_buffer(&part.buffer, 0, &staging, 0, size);
    part.ctx.queue().submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| Error::Dispatch("readback channel closed".to_string()))?
        .map_err(|e| Error::Dispatch(format!("readback mapping failed: {}", e)))?;

    let data = slice.get_mapped_range();
    let values = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    Ok(values)
}
