use rand::Rng;

use crate::math::random::gaussian;
use crate::math::vector::Vec2;

/// Life a particle starts with.
pub const FULL_LIFE: f32 = 100.0;
/// Life lost per update.
pub const FADE_RATE: f32 = 3.5;

const VELOCITY_SPREAD: f32 = 0.2;
const UPWARD_DRIFT: f32 = -0.8;

/// A short-lived smoke puff with explicit-Euler kinematics.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    remaining_life: f32,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position,
            velocity,
            acceleration: Vec2::ZERO,
            remaining_life: FULL_LIFE,
        }
    }

    /// Particle at `origin` drifting upward with Gaussian jitter.
    pub fn spawn<R: Rng + ?Sized>(origin: Vec2, rng: &mut R) -> Self {
        let velocity = Vec2::new(
            gaussian(rng, 0.0, VELOCITY_SPREAD),
            gaussian(rng, UPWARD_DRIFT, VELOCITY_SPREAD),
        );
        Self::new(origin, velocity)
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force;
    }

    /// One integration step. Dead particles are left untouched.
    pub fn update(&mut self) {
        if self.is_dead() {
            return;
        }
        self.velocity += self.acceleration;
        self.position += self.velocity;
        self.remaining_life -= FADE_RATE;
        self.acceleration = Vec2::ZERO;
    }

    pub fn is_dead(&self) -> bool {
        self.remaining_life <= 0.0
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn remaining_life(&self) -> f32 {
        self.remaining_life
    }

    /// Remaining life as a fraction of full life, in `[0, 1]`.
    pub fn life_fraction(&self) -> f32 {
        (self.remaining_life / FULL_LIFE).clamp(0.0, 1.0)
    }
}
