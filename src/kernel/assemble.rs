//! Kernel assembler: recorded body text to complete WGSL source.
//!
//! Layout of the assembled source, in order:
//! 1. `Params` uniform struct: the implicit element count `n` first, then one
//!    field per scalar parameter (WGSL passes scalars through a uniform, not
//!    as by-value signature slots).
//! 2. One storage-buffer declaration per vector parameter. The uniform sits
//!    at binding 0; vector parameters take successive bindings in parameter
//!    order.
//! 3. The entry point, with a per-thread guard `if (idx < params.n)`.
//! 4. Inside the guard: each parameter's read staging, the recorded body
//!    statements in order, then each parameter's write staging, all at the
//!    guard block's indentation.
//!
//! Given the same body, parameter list, and workgroup size, the output is
//! byte-identical. Parameter names are contract: `var<N>` for the value seen
//! by the recorded statements, `p_var<N>` for its backing storage.

use crate::error::Error;
use crate::sym::{Role, Scalar, Sym};

/// Vector or scalar parameter kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Vector,
    Scalar,
}

/// Everything the assembler and the dispatcher need to know about one
/// recorded kernel parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub type_name: &'static str,
    pub kind: ParamKind,
    pub is_const: bool,
}

impl ParamInfo {
    /// `p_var<N>`: the parameter's backing-storage name.
    pub fn storage_name(&self) -> String {
        format!("p_{}", self.name)
    }

    fn buffer_decl(&self, binding: u32) -> String {
        let access = if self.is_const { "read" } else { "read_write" };
        format!(
            "@group(0) @binding({}) var<storage, {}> {}: array<{}>;",
            binding,
            access,
            self.storage_name(),
            self.type_name
        )
    }

    fn uniform_field(&self) -> String {
        format!("    {}: {},", self.storage_name(), self.type_name)
    }

    /// Load staging: vector parameters index by the thread id, scalars read
    /// from the uniform.
    fn read(&self) -> String {
        match self.kind {
            ParamKind::Vector => format!(
                "var {}: {} = {}[idx];",
                self.name,
                self.type_name,
                self.storage_name()
            ),
            ParamKind::Scalar => format!(
                "var {}: {} = params.{};",
                self.name,
                self.type_name,
                self.storage_name()
            ),
        }
    }

    /// Store staging; only non-const vector parameters write back.
    fn write(&self) -> Option<String> {
        match self.kind {
            ParamKind::Vector if !self.is_const => Some(format!(
                "{}[idx] = {};",
                self.storage_name(),
                self.name
            )),
            _ => None,
        }
    }
}

/// Derives a [`ParamInfo`] from a placeholder; the seam between recording
/// and assembly.
pub trait KernelParam {
    fn param_info(&self) -> Result<ParamInfo, Error>;
}

impl<T: Scalar> KernelParam for Sym<T> {
    fn param_info(&self) -> Result<ParamInfo, Error> {
        let (kind, is_const) = match self.role() {
            Role::VectorParam { is_const } => (ParamKind::Vector, is_const),
            Role::ScalarParam => (ParamKind::Scalar, false),
            Role::Local => return Err(Error::NotAParameter(self.name())),
        };
        Ok(ParamInfo {
            name: self.name(),
            type_name: T::TYPE_NAME,
            kind,
            is_const,
        })
    }
}

/// Assembled kernel source plus the metadata dispatch needs.
#[derive(Clone, Debug)]
pub struct KernelSource {
    pub name: String,
    pub source: String,
    pub params: Vec<ParamInfo>,
    pub workgroup_size: u32,
}

/// Assemble complete WGSL from a recorded body and its ordered parameter
/// list. The parameter order here is the positional order real arguments
/// must be supplied in later.
pub fn assemble(
    name: &str,
    body: &str,
    params: &[&dyn KernelParam],
    workgroup_size: u32,
) -> Result<KernelSource, Error> {
    let params: Vec<ParamInfo> = params
        .iter()
        .map(|p| p.param_info())
        .collect::<Result<_, _>>()?;
    let source = render(name, body, &params, workgroup_size);
    Ok(KernelSource {
        name: name.to_string(),
        source,
        params,
        workgroup_size,
    })
}

fn render(name: &str, body: &str, params: &[ParamInfo], workgroup_size: u32) -> String {
    let mut src = String::new();

    src.push_str("struct Params {\n");
    src.push_str("    n: u32,\n");
    for p in params.iter().filter(|p| p.kind == ParamKind::Scalar) {
        src.push_str(&p.uniform_field());
        src.push('\n');
    }
    src.push_str("}\n\n");

    src.push_str("@group(0) @binding(0) var<uniform> params: Params;\n");
    let mut binding = 1u32;
    for p in params.iter().filter(|p| p.kind == ParamKind::Vector) {
        src.push_str(&p.buffer_decl(binding));
        src.push('\n');
        binding += 1;
    }
    src.push('\n');

    src.push_str(&format!("@compute @workgroup_size({})\n", workgroup_size));
    src.push_str(&format!(
        "fn {}(@builtin(global_invocation_id) gid: vec3<u32>) {{\n",
        name
    ));
    src.push_str("    let idx = gid.x;\n");
    src.push_str("    if (idx < params.n) {\n");

    for p in params {
        push_line(&mut src, &p.read());
    }

    for line in body.lines() {
        push_line(&mut src, line);
    }

    for p in params {
        if let Some(w) = p.write() {
            push_line(&mut src, &w);
        }
    }

    src.push_str("    }\n}\n");
    src
}

/// One statement at the guard block's depth.
fn push_line(src: &mut String, line: &str) {
    src.push_str("        ");
    src.push_str(line);
    src.push('\n');
}
