use glam::Vec3;

use mantling::{
    AgentPose, AnimationPlayer, Collaborators, CollisionProfile, Fallback, GeneralMantlingSettings,
    InterruptCause, LedgeDetector, MantlingConfig, MantlingSession, MantlingType, MotionWarping,
    PhysicsWorld, PrimitiveHandle, Ragdoll, SessionOutcome, SessionState, SettingsResolver,
    StartRejection, TimelineRef, TraceLog, WarpRequest, classify,
};

const RADIUS: f32 = 30.0;
const HEIGHT: f32 = 180.0;
const DT: f32 = 1.0 / 60.0;

struct Timeline {
    length: f32,
    position: f32,
    playing: bool,
    stops: Vec<f32>,
}

impl Timeline {
    fn new() -> Self {
        Self {
            length: 0.0,
            position: 0.0,
            playing: false,
            stops: Vec::new(),
        }
    }

    fn advance(&mut self, dt: f32) {
        if self.playing {
            self.position += dt;
            self.playing = self.position < self.length;
        }
    }
}

impl AnimationPlayer for Timeline {
    fn play(&mut self, timeline: &TimelineRef, start_time: f32) -> bool {
        self.length = timeline.play_length.unwrap_or(1.0);
        self.position = start_time;
        self.playing = true;
        true
    }
    fn stop(&mut self, blend_out: f32) {
        self.stops.push(blend_out);
        self.playing = false;
    }
    fn is_playing(&self) -> bool {
        self.playing
    }
    fn position(&self) -> f32 {
        self.position
    }
}

#[derive(Default)]
struct Warps(Vec<WarpRequest>);

impl MotionWarping for Warps {
    fn warp(&mut self, request: &WarpRequest) {
        self.0.push(request.clone());
    }
}

#[derive(Default)]
struct Ragdolls(u32);

impl Ragdoll for Ragdolls {
    fn start_ragdolling(&mut self) {
        self.0 += 1;
    }
}

/// Floor at y = 0 and a `height` cm block whose near face is 60 cm ahead.
fn course(height: f32) -> (PhysicsWorld, PrimitiveHandle) {
    let mut world = PhysicsWorld::new();
    world.add_box(
        Vec3::new(0.0, -5.0, 0.0),
        Vec3::new(1000.0, 5.0, 1000.0),
        CollisionProfile::world_static(),
    );
    let block = world
        .add_box(
            Vec3::new(0.0, height / 2.0, -160.0),
            Vec3::new(200.0, height / 2.0, 100.0),
            CollisionProfile::world_dynamic(),
        )
        .unwrap();
    (world, block)
}

fn agent() -> AgentPose {
    AgentPose::new(Vec3::ZERO, Vec3::NEG_Z, RADIUS, HEIGHT)
}

fn detect(world: &PhysicsWorld, general: &GeneralMantlingSettings, airborne: bool) -> Option<mantling::LedgeHit> {
    LedgeDetector::new(world, general).detect(&agent(), Vec3::NEG_Z * 200.0, airborne)
}

#[test]
fn grounded_150_cm_ledge_is_high_and_completes() {
    let (world, _) = course(150.0);
    let config = MantlingConfig::standard();
    let resolver = SettingsResolver::new(&config).unwrap();

    let hit = detect(&world, &config.general, false).expect("ledge");
    let params = classify(&hit, false, &config.general);
    assert_eq!(params.mantling_type(), MantlingType::High);
    assert!((params.mantling_height() - 150.0).abs() < 1e-3);

    let mut session = MantlingSession::new();
    session.try_start(params, &resolver, &config.general).unwrap();

    let mut timeline = Timeline::new();
    let mut warps = Warps::default();
    let mut ragdolls = Ragdolls::default();
    let mut outcome = None;
    for _ in 0..200 {
        timeline.advance(DT);
        let mut collaborators = Collaborators {
            animation: &mut timeline,
            warping: &mut warps,
            ragdoll: &mut ragdolls,
        };
        outcome = session.tick(DT, &world, &mut collaborators);
        if outcome.is_some() {
            break;
        }
    }

    assert_eq!(outcome, Some(SessionOutcome::Completed));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(warps.0.len(), 1);
    assert!((warps.0[0].target_location - hit.target_location).length() < 0.01);
    assert_eq!(ragdolls.0, 0);
}

#[test]
fn airborne_agent_gets_in_air_mantle() {
    let (world, _) = course(120.0);
    let general = GeneralMantlingSettings::default();
    let hit = detect(&world, &general, true).expect("ledge");
    assert_eq!(classify(&hit, true, &general).mantling_type(), MantlingType::InAir);
}

#[test]
fn fast_target_is_ignored() {
    let (mut world, block) = course(150.0);
    world.set_velocity(block, Vec3::new(15.0, 0.0, 0.0));
    let general = GeneralMantlingSettings::default();
    assert!(detect(&world, &general, false).is_none());

    world.set_velocity(block, Vec3::new(5.0, 0.0, 0.0));
    assert!(detect(&world, &general, false).is_some());
}

#[test]
fn destroyed_target_ragdolls_mid_session() {
    let (mut world, block) = course(100.0);
    let config = MantlingConfig::standard();
    let resolver = SettingsResolver::new(&config).unwrap();
    let hit = detect(&world, &config.general, false).expect("ledge");
    assert_eq!(hit.target_primitive, block);
    let params = classify(&hit, false, &config.general);
    assert_eq!(params.mantling_type(), MantlingType::Low);

    let mut session = MantlingSession::new();
    session.try_start(params, &resolver, &config.general).unwrap();
    assert_eq!(
        session.try_start(params, &resolver, &config.general),
        Err(StartRejection::SessionActive)
    );

    let mut timeline = Timeline::new();
    let mut warps = Warps::default();
    let mut ragdolls = Ragdolls::default();
    {
        let mut collaborators = Collaborators {
            animation: &mut timeline,
            warping: &mut warps,
            ragdoll: &mut ragdolls,
        };
        assert_eq!(session.tick(DT, &world, &mut collaborators), None);
        assert_eq!(session.state(), SessionState::Active);
    }

    world.remove(block);
    let mut collaborators = Collaborators {
        animation: &mut timeline,
        warping: &mut warps,
        ragdoll: &mut ragdolls,
    };
    assert_eq!(
        session.tick(DT, &world, &mut collaborators),
        Some(SessionOutcome::Interrupted {
            cause: InterruptCause::TargetDestroyed,
            fallback: Fallback::Ragdoll,
        })
    );
    assert_eq!(ragdolls.0, 1);
    assert!(session.is_idle());
}

#[test]
fn moving_platform_is_followed_then_dropped() {
    let (mut world, block) = course(150.0);
    let config = MantlingConfig::standard();
    let resolver = SettingsResolver::new(&config).unwrap();
    let hit = detect(&world, &config.general, false).expect("ledge");
    let params = classify(&hit, false, &config.general);

    let mut session = MantlingSession::new();
    session.try_start(params, &resolver, &config.general).unwrap();

    let mut timeline = Timeline::new();
    let mut warps = Warps::default();
    let mut ragdolls = Ragdolls::default();
    let mut tick = |session: &mut MantlingSession, world: &PhysicsWorld| {
        let mut collaborators = Collaborators {
            animation: &mut timeline,
            warping: &mut warps,
            ragdoll: &mut ragdolls,
        };
        session.tick(DT, world, &mut collaborators)
    };

    assert_eq!(tick(&mut session, &world), None);

    // 10 cm per tick: re-warped while within tolerance, dropped once past it
    world.set_velocity(block, Vec3::new(600.0, 0.0, 0.0));
    let mut outcome = None;
    for _ in 0..60 {
        world.step(DT);
        outcome = tick(&mut session, &world);
        if outcome.is_some() {
            break;
        }
    }
    assert_eq!(
        outcome,
        Some(SessionOutcome::Interrupted {
            cause: InterruptCause::TargetMoved,
            fallback: Fallback::BlendOut,
        })
    );
    assert!(warps.0.len() > 1);
    assert_eq!(timeline.stops, vec![config.general.blend_out_duration]);
}

#[test]
fn draw_failed_traces_records_misses() {
    let (world, _) = course(150.0);
    let mut general = GeneralMantlingSettings::default();
    general.grounded_trace.draw_failed_traces = true;
    let far = AgentPose::new(Vec3::new(0.0, 0.0, 400.0), Vec3::NEG_Z, RADIUS, HEIGHT);
    let mut log = TraceLog::new();
    let detector = LedgeDetector::new(&world, &general);
    assert!(detector.detect_with_debug(&far, Vec3::ZERO, false, &mut log).is_none());
    assert!(!log.records().is_empty());
    assert_eq!(log.misses().count(), log.records().len());
}

#[test]
fn config_file_drives_the_pipeline() {
    let json = r#"{
        "name": "tall",
        "general": { "mantling_high_height_threshold": 160.0 },
        "high": { "montage": { "asset": "hi" } },
        "low": { "montage": { "asset": "lo", "play_length": 0.8 } },
        "in_air": { "montage": { "asset": "air" }, "auto_calculate_start_time": true }
    }"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mantling.json");
    std::fs::write(&path, json).unwrap();

    let config = MantlingConfig::load(&path).unwrap();
    let resolver = SettingsResolver::new(&config).unwrap();
    let (world, _) = course(150.0);
    let hit = detect(&world, &config.general, false).expect("ledge");
    let params = classify(&hit, false, &config.general);
    assert_eq!(params.mantling_type(), MantlingType::Low);
    assert_eq!(resolver.resolve(params.mantling_type()).montage.asset, "lo");
}
