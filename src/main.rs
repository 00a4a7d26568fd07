use clap::{Parser, Subcommand};
use std::ops::{AddAssign, Mul, Sub};
use std::process;

use symkern::kernel::KernelParam;
use symkern::{
    assemble, build_kernel, Arg, DeviceContext, DeviceVector, Error, Expr, Recorder, Sym,
};

#[derive(Parser)]
#[command(
    name = "symkern",
    version,
    about = "Record numeric code symbolically, run it as generated compute kernels"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the generated WGSL for the Lorenz ensemble stepper
    Emit {
        /// Workgroup size to bake into the source
        #[arg(long, default_value_t = 64)]
        workgroup: u32,
    },
    /// Integrate a Lorenz attractor ensemble on every available device
    Run {
        /// Number of ensemble members
        #[arg(long, default_value_t = 1024)]
        size: usize,
        /// Euler steps to take
        #[arg(long, default_value_t = 100)]
        steps: usize,
        /// Time step
        #[arg(long, default_value_t = 0.01)]
        dt: f32,
    },
}

const SIGMA: f32 = 10.0;
const B: f32 = 8.0 / 3.0;

struct LorenzStep {
    rec: Recorder,
    x: Sym<f32>,
    y: Sym<f32>,
    z: Sym<f32>,
    r: Sym<f32>,
    dt: Sym<f32>,
}

/// One explicit-Euler step of the Lorenz system, generic over the value
/// representation: `V` is the state type, `E` whatever its operators
/// produce. Instantiated at `f32` it integrates numerically; instantiated at
/// `Sym<f32>` the identical code records kernel statements instead.
fn lorenz_step<V, E>(x: &mut V, y: &mut V, z: &mut V, r: &V, dt: &V)
where
    V: Clone + AddAssign<E>,
    E: Sub<E, Output = E>,
    f32: Mul<E, Output = E>,
    for<'a> &'a V: Sub<&'a V, Output = E> + Mul<&'a V, Output = E> + Mul<E, Output = E>,
    for<'a> E: Sub<&'a V, Output = E>,
    for<'a> f32: Mul<&'a V, Output = E>,
{
    // Snapshots keep the three updates order-independent.
    let x0 = x.clone();
    let y0 = y.clone();
    let z0 = z.clone();
    *x += dt * (SIGMA * (&y0 - &x0));
    *y += dt * ((r * &x0 - &y0) - &x0 * &z0);
    *z += dt * (&x0 * &y0 - B * &z0);
}

/// Run the stepper once over placeholders. Each ensemble member carries its
/// own Rayleigh number `r`.
fn record_lorenz() -> LorenzStep {
    let rec = Recorder::new();
    let mut x = Sym::<f32>::vector_param(&rec);
    let mut y = Sym::<f32>::vector_param(&rec);
    let mut z = Sym::<f32>::vector_param(&rec);
    let r = Sym::<f32>::vector_param_const(&rec);
    let dt = Sym::<f32>::scalar_param(&rec);

    lorenz_step::<Sym<f32>, Expr<f32>>(&mut x, &mut y, &mut z, &r, &dt);

    LorenzStep { rec, x, y, z, r, dt }
}

fn emit(workgroup: u32) -> Result<(), Error> {
    let step = record_lorenz();
    let params: Vec<&dyn KernelParam> =
        vec![&step.x, &step.y, &step.z, &step.r, &step.dt];
    let ks = assemble("lorenz_step", &step.rec.body(), &params, workgroup)?;
    print!("{}", ks.source);
    Ok(())
}

fn run(size: usize, steps: usize, dt: f32) -> Result<(), Error> {
    let contexts = DeviceContext::enumerate();
    if contexts.is_empty() {
        return Err(Error::NoDevice);
    }
    for ctx in &contexts {
        eprintln!("device {}: {}", ctx.id(), ctx.name());
    }

    let step = record_lorenz();
    let params: Vec<&dyn KernelParam> =
        vec![&step.x, &step.y, &step.z, &step.r, &step.dt];
    let kernel = build_kernel(&contexts, "lorenz_step", &step.rec.body(), &params)?;
    eprintln!(
        "kernel {}: {} parameter(s), {} queue slot(s)",
        kernel.name(),
        kernel.params().len(),
        contexts.len()
    );

    let x = DeviceVector::splat(&contexts, size, 10.0f32)?;
    let y = DeviceVector::splat(&contexts, size, 10.0f32)?;
    let z = DeviceVector::splat(&contexts, size, 10.0f32)?;
    // Rayleigh numbers ramp over the ensemble, one trajectory per member.
    let rayleigh: Vec<f32> = (0..size)
        .map(|i| 0.1 + 49.9 * i as f32 / size.max(2).saturating_sub(1) as f32)
        .collect();
    let r = DeviceVector::from_slice(&contexts, &rayleigh)?;

    for _ in 0..steps {
        kernel.invoke(&[
            Arg::vector(&x),
            Arg::vector(&y),
            Arg::vector(&z),
            Arg::vector(&r),
            Arg::scalar(dt),
        ])?;
    }

    let xs = x.read()?;
    println!("{} members, {} steps, dt = {}", size, steps, dt);
    for i in (0..size).step_by((size / 8).max(1)) {
        println!("member {:>6}: r = {:>8.3}  x = {:>12.6}", i, rayleigh[i], xs[i]);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Emit { workgroup } => emit(workgroup),
        Command::Run { size, steps, dt } => run(size, steps, dt),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
