use serde::{Deserialize, Serialize};

use crate::dispatch::{color_for_call_type, Rgb};
use crate::playback::particle::{Particle, FULL_LIFE};

/// Fraction of the texture size a full-life particle is drawn at.
const SPRITE_SCALE: f32 = 0.6;

/// Draw instruction for one particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleSprite {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Rgb,
    /// Alpha on a 0-255 scale, equal to the remaining life, so a fresh
    /// particle is drawn at 100/255.
    pub opacity: u8,
}

impl ParticleSprite {
    /// Sprite for `particle`, coloured by the owning emitter's call type.
    pub fn from_particle(particle: &Particle, call_type_code: &str, texture_size: f32) -> Self {
        let life = particle.life_fraction();
        let position = particle.position();
        Self {
            x: position.x,
            y: position.y,
            size: texture_size * life * SPRITE_SCALE,
            color: color_for_call_type(call_type_code),
            opacity: particle.remaining_life().clamp(0.0, FULL_LIFE).round() as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector::Vec2;

    #[test]
    fn fresh_particle_is_translucent_and_full_size() {
        let p = Particle::new(Vec2::new(3.0, 4.0), Vec2::ZERO);
        let sprite = ParticleSprite::from_particle(&p, "602", 64.0);
        assert_eq!(sprite.opacity, 100);
        assert!((sprite.size - 38.4).abs() < 1e-4);
        assert_eq!(sprite.color, Rgb::new(173, 216, 230));
        assert_eq!((sprite.x, sprite.y), (3.0, 4.0));
    }

    #[test]
    fn opacity_tracks_remaining_life() {
        let mut p = Particle::new(Vec2::ZERO, Vec2::ZERO);
        for _ in 0..10 {
            p.update();
        }
        // 100 - 10 * 3.5
        assert_eq!(ParticleSprite::from_particle(&p, "602", 64.0).opacity, 65);
        for _ in 0..40 {
            p.update();
        }
        assert_eq!(ParticleSprite::from_particle(&p, "602", 64.0).opacity, 0);
    }
}
