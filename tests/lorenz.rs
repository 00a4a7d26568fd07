//! End-to-end check: one generic Lorenz stepper, instantiated at `f32` for a
//! host-side reference and at `Sym<f32>` for recording. The same function
//! body drives both, so the generated kernel and the reference integration
//! cannot drift apart. GPU runs are compared against the host result.

use std::ops::{AddAssign, Mul, Sub};

use symkern::kernel::KernelParam;
use symkern::{
    assemble, build_kernel, Arg, DeviceContext, DeviceVector, Error, Expr, Recorder, Sym,
};

const SIGMA: f32 = 10.0;
const B: f32 = 8.0 / 3.0;
const DT: f32 = 0.01;

/// One explicit-Euler step of the Lorenz system, written once against
/// operator availability only. `V` is the state type, `E` whatever its
/// operators produce: `f32`/`f32` computes, `Sym<f32>`/`Expr<f32>` records.
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

struct LorenzStep {
    rec: Recorder,
    x: Sym<f32>,
    y: Sym<f32>,
    z: Sym<f32>,
    r: Sym<f32>,
    dt: Sym<f32>,
}

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

/// The numeric instantiation of the very same stepper.
fn cpu_reference(rayleigh: &[f32], steps: usize) -> Vec<f32> {
    let n = rayleigh.len();
    let mut x = vec![10.0f32; n];
    let mut y = vec![10.0f32; n];
    let mut z = vec![10.0f32; n];
    for _ in 0..steps {
        for i in 0..n {
            lorenz_step::<f32, f32>(&mut x[i], &mut y[i], &mut z[i], &rayleigh[i], &DT);
        }
    }
    x
}

fn rayleigh_ramp(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.1 + 49.9 * i as f32 / n.max(2).saturating_sub(1) as f32)
        .collect()
}

fn run_on(contexts: &[DeviceContext], size: usize, steps: usize) -> Vec<f32> {
    let step = record_lorenz();
    let params: Vec<&dyn KernelParam> = vec![&step.x, &step.y, &step.z, &step.r, &step.dt];
    let kernel = build_kernel(contexts, "lorenz_step", &step.rec.body(), &params).unwrap();

    let x = DeviceVector::splat(contexts, size, 10.0f32).unwrap();
    let y = DeviceVector::splat(contexts, size, 10.0f32).unwrap();
    let z = DeviceVector::splat(contexts, size, 10.0f32).unwrap();
    let r = DeviceVector::from_slice(contexts, &rayleigh_ramp(size)).unwrap();

    for _ in 0..steps {
        kernel
            .invoke(&[
                Arg::vector(&x),
                Arg::vector(&y),
                Arg::vector(&z),
                Arg::vector(&r),
                Arg::scalar(DT),
            ])
            .unwrap();
    }
    x.read().unwrap()
}

fn assert_close(got: &[f32], want: &[f32]) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        let tol = 1e-3 * w.abs().max(1.0);
        assert!(
            (g - w).abs() <= tol,
            "member {}: device {} vs host {}",
            i,
            g,
            w
        );
    }
}

#[test]
fn generic_stepper_records_expected_statements() {
    // The symbolic instantiation of the shared stepper: three snapshot
    // declarations from the clones, then one assignment per state update,
    // fully parenthesized, referencing snapshots only.
    let step = record_lorenz();
    assert_eq!(
        step.rec.statements(),
        vec![
            "var var5: f32 = var0;",
            "var var6: f32 = var1;",
            "var var7: f32 = var2;",
            "var0 = (var0 + (var4 * (1e1f * (var6 - var5))));",
            "var1 = (var1 + (var4 * (((var3 * var5) - var6) - (var5 * var7))));",
            "var2 = (var2 + (var4 * ((var5 * var6) - (2.6666667e0f * var7))));",
        ]
    );
}

#[test]
fn generated_source_is_deterministic() {
    fn once() -> String {
        let step = record_lorenz();
        let params: Vec<&dyn KernelParam> =
            vec![&step.x, &step.y, &step.z, &step.r, &step.dt];
        assemble("lorenz_step", &step.rec.body(), &params, 64)
            .unwrap()
            .source
    }
    assert_eq!(once(), once());
}

#[test]
fn lorenz_matches_host_integration() {
    let Some(ctx) = DeviceContext::try_default() else {
        eprintln!("no GPU adapter available, skipping");
        return;
    };
    let contexts = [ctx];
    for size in [1usize, 1000, 1023] {
        let got = run_on(&contexts, size, 100);
        let want = cpu_reference(&rayleigh_ramp(size), 100);
        assert_close(&got, &want);
    }
}

#[test]
fn duplicated_context_compiles_once_and_partitions() {
    let Some(ctx) = DeviceContext::try_default() else {
        eprintln!("no GPU adapter available, skipping");
        return;
    };
    // Same context listed twice: one compilation, two partitions.
    let contexts = [ctx.clone(), ctx];
    let got = run_on(&contexts, 1001, 50);
    let want = cpu_reference(&rayleigh_ramp(1001), 50);
    assert_close(&got, &want);
}

#[test]
fn empty_partition_is_skipped() {
    let Some(ctx) = DeviceContext::try_default() else {
        eprintln!("no GPU adapter available, skipping");
        return;
    };
    // One element over two queue slots leaves one partition empty; the
    // invocation must still run the element exactly once.
    let contexts = [ctx.clone(), ctx];
    let got = run_on(&contexts, 1, 10);
    let want = cpu_reference(&rayleigh_ramp(1), 10);
    assert_close(&got, &want);
}

#[test]
fn invoke_rejects_bad_arguments() {
    let Some(ctx) = DeviceContext::try_default() else {
        eprintln!("no GPU adapter available, skipping");
        return;
    };
    let contexts = [ctx];
    let step = record_lorenz();
    let params: Vec<&dyn KernelParam> = vec![&step.x, &step.y, &step.z, &step.r, &step.dt];
    let kernel = build_kernel(&contexts, "lorenz_step", &step.rec.body(), &params).unwrap();

    assert_eq!(kernel.name(), "lorenz_step");
    assert_eq!(kernel.params().len(), 5);

    let x = DeviceVector::splat(&contexts, 8, 0.0f32).unwrap();

    // Wrong arity.
    let err = kernel.invoke(&[Arg::vector(&x)]).unwrap_err();
    assert_eq!(err, Error::Arity { expected: 5, got: 1 });

    // Scalar where a vector is recorded.
    let err = kernel
        .invoke(&[
            Arg::scalar(1.0f32),
            Arg::vector(&x),
            Arg::vector(&x),
            Arg::vector(&x),
            Arg::scalar(DT),
        ])
        .unwrap_err();
    assert!(matches!(err, Error::KindMismatch { index: 0, .. }));

    // Wrong scalar element type.
    let err = kernel
        .invoke(&[
            Arg::vector(&x),
            Arg::vector(&x),
            Arg::vector(&x),
            Arg::vector(&x),
            Arg::scalar(3u32),
        ])
        .unwrap_err();
    assert!(matches!(err, Error::KindMismatch { index: 4, .. }));
}
