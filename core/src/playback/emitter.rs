use rand::{rngs::StdRng, SeedableRng};
use std::collections::VecDeque;

use crate::dispatch::{DispatchRecord, Priority};
use crate::math::projection::{GeoBounds, GeoProjector};
use crate::math::vector::Vec2;
use crate::playback::event_store::EventStore;
use crate::playback::particle::Particle;
use crate::playback::sprite::ParticleSprite;
use crate::prelude::{EngineConfig, OverflowPolicy, RetirementPolicy};

/// Particle source anchored at one projected call location.
#[derive(Debug, Clone)]
pub struct Emitter {
    record_id: String,
    origin: Vec2,
    call_type_code: String,
    priority: Priority,
    age: u32,
    lifespan_frames: u32,
    spawn_rate: u32,
    capacity: usize,
    particles: Vec<Particle>,
}

impl Emitter {
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn call_type_code(&self) -> &str {
        &self.call_type_code
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn lifespan_frames(&self) -> u32 {
        self.lifespan_frames
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn is_expired(&self) -> bool {
        self.age > self.lifespan_frames
    }

    /// Advances particles one frame and tops the emitter back up.
    fn step<R: rand::Rng + ?Sized>(&mut self, force: Vec2, rng: &mut R) {
        for particle in &mut self.particles {
            particle.apply_force(force);
            particle.update();
        }
        self.particles.retain(|particle| !particle.is_dead());

        let room = self.capacity.saturating_sub(self.particles.len());
        let burst = (self.spawn_rate as usize).min(room);
        for _ in 0..burst {
            self.particles.push(Particle::spawn(self.origin, rng));
        }

        self.age = self.age.saturating_add(1);
    }
}

/// What `EmitterPool::spawn` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned { evicted: usize },
    Rejected,
}

/// Counts from one `EmitterPool::step`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub retired: usize,
    pub particles: usize,
}

/// Bounded set of live emitters, in spawn order.
pub struct EmitterPool {
    emitters: VecDeque<Emitter>,
    config: EngineConfig,
    bounds: GeoBounds,
    rng: StdRng,
}

impl EmitterPool {
    pub fn new(config: EngineConfig, bounds: GeoBounds) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            emitters: VecDeque::with_capacity(config.max_emitters),
            config,
            bounds,
            rng,
        }
    }

    /// Creates an emitter for `record`, making room per the overflow policy.
    pub fn spawn(&mut self, record: &DispatchRecord) -> SpawnOutcome {
        let cap = self.config.max_emitters;
        if cap == 0 {
            return SpawnOutcome::Rejected;
        }

        let mut evicted = 0;
        if self.emitters.len() >= cap {
            match self.config.overflow {
                OverflowPolicy::RejectNew => return SpawnOutcome::Rejected,
                OverflowPolicy::EvictOldest => {
                    while self.emitters.len() >= cap {
                        self.emitters.pop_front();
                        evicted += 1;
                    }
                }
            }
        }

        let origin = GeoProjector::project(
            record.location.lon,
            record.location.lat,
            &self.bounds,
            self.config.surface_width,
            self.config.surface_height,
        );
        let emitter = Emitter {
            record_id: record.id.clone(),
            origin,
            call_type_code: record.call_type_code.clone(),
            priority: record.priority,
            age: 0,
            lifespan_frames: self.config.lifespan_frames.get(record.priority),
            spawn_rate: self.config.spawn_rate.get(record.priority),
            capacity: self.config.max_particles_per_emitter,
            particles: Vec::new(),
        };
        self.emitters.push_back(emitter);
        SpawnOutcome::Spawned { evicted }
    }

    /// Applies `force`, advances every emitter one frame, and retires the
    /// ones the retirement policy says are done.
    pub fn step(&mut self, force: Vec2, store: &EventStore) -> StepReport {
        let policy = self.config.retirement;
        let rng = &mut self.rng;
        let before = self.emitters.len();

        self.emitters.retain_mut(|emitter| {
            emitter.step(force, &mut *rng);
            let expired = emitter.is_expired();
            let on_scene = store.is_completed(&emitter.record_id);
            let retire = match policy {
                RetirementPolicy::Lifespan => expired,
                RetirementPolicy::OnScene => on_scene,
                RetirementPolicy::Either => expired || on_scene,
            };
            !retire
        });

        StepReport {
            retired: before - self.emitters.len(),
            particles: self.particle_count(),
        }
    }

    pub fn clear(&mut self) {
        self.emitters.clear();
    }

    /// Re-targets future spawns at a new surface size.
    pub fn set_surface(&mut self, width: f32, height: f32) {
        self.config.surface_width = width;
        self.config.surface_height = height;
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn particle_count(&self) -> usize {
        self.emitters.iter().map(|e| e.particles.len()).sum()
    }

    pub fn emitters(&self) -> impl Iterator<Item = &Emitter> {
        self.emitters.iter()
    }

    pub fn sprites(&self) -> Vec<ParticleSprite> {
        let texture_size = self.config.texture_size;
        self.emitters
            .iter()
            .flat_map(|emitter| {
                emitter.particles.iter().map(move |particle| {
                    ParticleSprite::from_particle(particle, &emitter.call_type_code, texture_size)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::GeoPoint;
    use crate::math::projection::SF_BOUNDS;

    fn record(id: &str, received: i64, priority: Priority) -> DispatchRecord {
        DispatchRecord::new(
            id,
            received,
            None,
            priority,
            "246 - SHOOTING",
            GeoPoint {
                lon: -122.44,
                lat: 37.76,
            },
        )
    }

    fn pool(config: EngineConfig) -> EmitterPool {
        EmitterPool::new(
            EngineConfig {
                seed: Some(3),
                ..config
            },
            SF_BOUNDS,
        )
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let mut pool = pool(EngineConfig {
            max_emitters: 2,
            ..Default::default()
        });
        assert_eq!(
            pool.spawn(&record("1", 0, Priority::A)),
            SpawnOutcome::Spawned { evicted: 0 }
        );
        pool.spawn(&record("2", 1, Priority::B));
        assert_eq!(
            pool.spawn(&record("3", 2, Priority::C)),
            SpawnOutcome::Spawned { evicted: 1 }
        );
        let ids: Vec<_> = pool.emitters().map(|e| e.record_id().to_string()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn population_never_exceeds_cap() {
        let mut pool = pool(EngineConfig {
            max_emitters: 5,
            ..Default::default()
        });
        for i in 0..50 {
            pool.spawn(&record(&i.to_string(), i, Priority::ALL[i as usize % 3]));
            assert!(pool.len() <= 5);
        }
    }

    #[test]
    fn reject_policy_keeps_existing() {
        let mut pool = pool(EngineConfig {
            max_emitters: 1,
            overflow: OverflowPolicy::RejectNew,
            ..Default::default()
        });
        pool.spawn(&record("1", 0, Priority::A));
        assert_eq!(pool.spawn(&record("2", 1, Priority::A)), SpawnOutcome::Rejected);
        assert_eq!(pool.emitters().next().unwrap().record_id(), "1");
    }

    #[test]
    fn spawn_projects_origin_and_sets_lifespan() {
        let mut pool = pool(EngineConfig::default());
        pool.spawn(&record("1", 0, Priority::B));
        let emitter = pool.emitters().next().unwrap();
        let expected = GeoProjector::project(-122.44, 37.76, &SF_BOUNDS, 1280.0, 800.0);
        assert_eq!(emitter.origin(), expected);
        assert_eq!(emitter.lifespan_frames(), 150);
        assert!(emitter.particles().is_empty());
    }

    #[test]
    fn step_emits_by_priority_and_respects_capacity() {
        let store = EventStore::default();
        let mut pool = pool(EngineConfig {
            max_particles_per_emitter: 3,
            ..Default::default()
        });
        pool.spawn(&record("a", 0, Priority::A));
        pool.spawn(&record("c", 0, Priority::C));

        pool.step(Vec2::ZERO, &store);
        let counts: Vec<_> = pool.emitters().map(|e| e.particles().len()).collect();
        assert_eq!(counts, vec![2, 1]);

        for _ in 0..5 {
            pool.step(Vec2::ZERO, &store);
        }
        assert!(pool.emitters().all(|e| e.particles().len() <= 3));
    }

    #[test]
    fn lifespan_retires_emitter() {
        let store = EventStore::default();
        let mut pool = pool(EngineConfig::default());
        pool.spawn(&record("c", 0, Priority::C));
        let mut retired = 0;
        for _ in 0..120 {
            retired += pool.step(Vec2::ZERO, &store).retired;
        }
        assert_eq!((pool.len(), retired), (1, 0));
        assert_eq!(pool.step(Vec2::ZERO, &store).retired, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn on_scene_policy_follows_store() {
        let mut store = EventStore::default();
        store.ingest_at(vec![record("a", 0, Priority::A)], 0);
        let mut pool = pool(EngineConfig {
            retirement: RetirementPolicy::OnScene,
            ..Default::default()
        });
        pool.spawn(&store.records()[0].clone());

        for _ in 0..500 {
            pool.step(Vec2::ZERO, &store);
        }
        assert_eq!(pool.len(), 1, "age alone must not retire under OnScene");

        store.mark_completed_due(i64::MAX);
        assert_eq!(pool.step(Vec2::ZERO, &store).retired, 1);
    }

    #[test]
    fn either_policy_retires_on_first_trigger() {
        let mut store = EventStore::default();
        store.ingest_at(
            vec![record("a", 0, Priority::A), record("c", 0, Priority::C)],
            0,
        );
        let mut pool = pool(EngineConfig {
            retirement: RetirementPolicy::Either,
            ..Default::default()
        });
        for record in store.records().to_vec() {
            pool.spawn(&record);
        }

        // Priority A is on scene after five minutes, C not until fifteen.
        assert_eq!(store.mark_completed_due(5 * 60 * 1000), 1);
        assert_eq!(pool.step(Vec2::ZERO, &store).retired, 1);
        assert_eq!(pool.emitters().next().unwrap().record_id(), "c");

        for _ in 0..119 {
            assert_eq!(pool.step(Vec2::ZERO, &store).retired, 0);
        }
        assert_eq!(pool.step(Vec2::ZERO, &store).retired, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn force_pushes_particles() {
        let store = EventStore::default();
        let mut pool = pool(EngineConfig::default());
        pool.spawn(&record("a", 0, Priority::A));
        pool.step(Vec2::ZERO, &store);
        let before: Vec<_> = pool.emitters().next().unwrap().particles()[..2]
            .iter()
            .map(|p| p.velocity().x)
            .collect();
        pool.step(Vec2::new(1.0, 0.0), &store);
        let after: Vec<_> = pool.emitters().next().unwrap().particles()[..2]
            .iter()
            .map(|p| p.velocity().x)
            .collect();
        for (b, a) in before.iter().zip(&after) {
            assert!((a - b - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn clear_empties_pool_and_sprites() {
        let store = EventStore::default();
        let mut pool = pool(EngineConfig::default());
        pool.spawn(&record("a", 0, Priority::A));
        pool.step(Vec2::ZERO, &store);
        assert!(!pool.sprites().is_empty());
        pool.clear();
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.step(Vec2::ZERO, &store), StepReport::default());
        assert!(pool.sprites().is_empty());
    }
}
