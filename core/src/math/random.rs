use rand::Rng;
use std::f64::consts::TAU;

/// Draws one sample from `N(mean, std_dev)` using the Box-Muller transform.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    // gen::<f64>() is in [0, 1); shift away from zero so ln() stays finite.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
    mean + std_dev * z as f32
}
