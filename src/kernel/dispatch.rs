//! Multi-device kernel dispatch.
//!
//! [`Kernel::build`] compiles the assembled WGSL once per distinct device
//! context (identity, not equality, keys the cache) and bakes each device's
//! preferred workgroup size into its copy of the source. [`Kernel::invoke`]
//! matches real arguments positionally against the recorded parameters,
//! sizes each device's dispatch from the first vector argument's partition,
//! and enqueues without waiting: completion is the caller's concern, and
//! partitions are disjoint so no cross-device ordering is needed.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::assemble::{assemble, KernelParam, KernelSource, ParamInfo, ParamKind};
use crate::error::Error;
use crate::gpu::DeviceContext;

/// Per-device extent and raw buffer access: the only two facts the
/// dispatcher reads from a vector argument.
///
/// Partition indices line up with the context list the kernel was built
/// over: partition `d` of every vector argument must live on the same
/// device as the kernel's context `d`.
pub trait VectorArg {
    fn element_type(&self) -> &'static str;
    fn num_parts(&self) -> usize;
    fn part_len(&self, part: usize) -> usize;
    fn part_buffer(&self, part: usize) -> &wgpu::Buffer;
}

/// A by-value scalar argument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
    F32(f32),
    I32(i32),
    U32(u32),
}

impl ScalarValue {
    fn type_name(self) -> &'static str {
        match self {
            ScalarValue::F32(_) => "f32",
            ScalarValue::I32(_) => "i32",
            ScalarValue::U32(_) => "u32",
        }
    }

    fn bytes(self) -> [u8; 4] {
        match self {
            ScalarValue::F32(v) => v.to_le_bytes(),
            ScalarValue::I32(v) => v.to_le_bytes(),
            ScalarValue::U32(v) => v.to_le_bytes(),
        }
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::F32(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::I32(v)
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::U32(v)
    }
}

/// One positional kernel argument.
pub enum Arg<'a> {
    Vector(&'a dyn VectorArg),
    Scalar(ScalarValue),
}

impl<'a> Arg<'a> {
    pub fn vector(v: &'a dyn VectorArg) -> Self {
        Arg::Vector(v)
    }

    pub fn scalar(v: impl Into<ScalarValue>) -> Self {
        Arg::Scalar(v.into())
    }
}

struct DevicePartition {
    ctx: DeviceContext,
    pipeline: wgpu::ComputePipeline,
    workgroup_size: u32,
}

/// A compiled kernel bound to one or more device contexts.
pub struct Kernel {
    name: String,
    params: Vec<ParamInfo>,
    parts: Vec<DevicePartition>,
}

/// Build entry point: record once, build once, invoke many times.
pub fn build_kernel(
    contexts: &[DeviceContext],
    name: &str,
    body: &str,
    params: &[&dyn KernelParam],
) -> Result<Kernel, Error> {
    Kernel::build(contexts, name, body, params)
}

impl Kernel {
    /// Compile `body` with `params` for every context in `contexts`. One
    /// queue slot per entry; compilation happens once per distinct context
    /// and is cached. A compile failure on any device aborts construction.
    pub fn build(
        contexts: &[DeviceContext],
        name: &str,
        body: &str,
        params: &[&dyn KernelParam],
    ) -> Result<Kernel, Error> {
        if contexts.is_empty() {
            return Err(Error::NoDevice);
        }
        let infos: Vec<ParamInfo> = params
            .iter()
            .map(|p| p.param_info())
            .collect::<Result<_, _>>()?;

        let mut compiled: HashMap<u64, (wgpu::ComputePipeline, u32)> = HashMap::new();
        let mut parts = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            let (pipeline, workgroup_size) = match compiled.get(&ctx.id()) {
                Some(entry) => entry.clone(),
                None => {
                    let wg = ctx.preferred_workgroup_size();
                    let source = assemble(name, body, params, wg)?;
                    let pipeline = compile(ctx, &source)?;
                    compiled.insert(ctx.id(), (pipeline.clone(), wg));
                    (pipeline, wg)
                }
            };
            parts.push(DevicePartition {
                ctx: ctx.clone(),
                pipeline,
                workgroup_size,
            });
        }
        Ok(Kernel {
            name: name.to_string(),
            params: infos,
            parts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The recorded parameter list, in positional order.
    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    /// Call entry point. Arguments match the recorded parameters
    /// positionally; returns once every non-empty partition is enqueued,
    /// without waiting for completion.
    pub fn invoke(&self, args: &[Arg<'_>]) -> Result<(), Error> {
        if args.len() != self.params.len() {
            return Err(Error::Arity {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        self.check_bindings(args)?;

        for (d, part) in self.parts.iter().enumerate() {
            let psize = partition_size(args, d)?;
            if psize == 0 {
                // Nothing assigned to this device.
                continue;
            }
            self.enqueue(d, part, args, psize as u32)?;
        }
        Ok(())
    }

    /// Positional kind and element-type checks, before any device is
    /// touched.
    fn check_bindings(&self, args: &[Arg<'_>]) -> Result<(), Error> {
        for (i, (arg, param)) in args.iter().zip(&self.params).enumerate() {
            match (arg, param.kind) {
                (Arg::Vector(v), ParamKind::Vector) => {
                    if v.element_type() != param.type_name {
                        return Err(Error::KindMismatch {
                            index: i,
                            expected: format!("vector of {}", param.type_name),
                            got: format!("vector of {}", v.element_type()),
                        });
                    }
                    if v.num_parts() != self.parts.len() {
                        return Err(Error::Dispatch(format!(
                            "argument {} is partitioned over {} device(s), kernel over {}",
                            i,
                            v.num_parts(),
                            self.parts.len()
                        )));
                    }
                }
                (Arg::Scalar(s), ParamKind::Scalar) => {
                    if s.type_name() != param.type_name {
                        return Err(Error::KindMismatch {
                            index: i,
                            expected: format!("scalar {}", param.type_name),
                            got: format!("scalar {}", s.type_name()),
                        });
                    }
                }
                (Arg::Vector(_), ParamKind::Scalar) => {
                    return Err(Error::KindMismatch {
                        index: i,
                        expected: format!("scalar {}", param.type_name),
                        got: "vector".to_string(),
                    });
                }
                (Arg::Scalar(_), ParamKind::Vector) => {
                    return Err(Error::KindMismatch {
                        index: i,
                        expected: format!("vector of {}", param.type_name),
                        got: "scalar".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn enqueue(
        &self,
        d: usize,
        part: &DevicePartition,
        args: &[Arg<'_>],
        n: u32,
    ) -> Result<(), Error> {
        let device = part.ctx.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniform = pack_uniform(n, args);
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("symkern-params"),
            contents: &uniform,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: params_buf.as_entire_binding(),
        }];
        let mut binding = 1u32;
        for arg in args {
            if let Arg::Vector(v) = arg {
                entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: v.part_buffer(d).as_entire_binding(),
                });
                binding += 1;
            }
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("symkern-args"),
            layout: &part.pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.name),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&part.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups = (n + part.workgroup_size - 1) / part.workgroup_size;
            pass.dispatch_workgroups(groups, 1, 1);
        }
        part.ctx.queue().submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Dispatch(format!("{}: {}", part.ctx.name(), err)));
        }
        Ok(())
    }
}

/// Thread count for device `d`: the first vector argument's extent there.
/// Scalars contribute no size information.
fn partition_size(args: &[Arg<'_>], d: usize) -> Result<usize, Error> {
    for arg in args {
        if let Arg::Vector(v) = arg {
            return Ok(v.part_len(d));
        }
    }
    Err(Error::MissingVectorArg)
}

/// The implicit size plus every scalar argument in positional order, padded
/// to the 16-byte uniform binding granularity. Must mirror the `Params`
/// struct the assembler emits.
fn pack_uniform(n: u32, args: &[Arg<'_>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&n.to_le_bytes());
    for arg in args {
        if let Arg::Scalar(s) = arg {
            bytes.extend_from_slice(&s.bytes());
        }
    }
    while bytes.len() % 16 != 0 {
        bytes.push(0);
    }
    bytes
}

fn compile(ctx: &DeviceContext, source: &KernelSource) -> Result<wgpu::ComputePipeline, Error> {
    let device = ctx.device();
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&source.name),
        source: wgpu::ShaderSource::Wgsl(source.source.as_str().into()),
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&source.name),
        layout: None,
        module: &module,
        entry_point: Some(&source.name),
        compilation_options: Default::default(),
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(Error::Compile {
            device: ctx.name().to_string(),
            message: err.to_string(),
        });
    }
    Ok(pipeline)
}
