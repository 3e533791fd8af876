//! mantle-probe: walks a probe agent at obstacles and runs the mantling
//! pipeline (detect -> classify -> resolve -> session) against a simulated
//! animation timeline.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mantling::config::{AGENT_CAPSULE_HEIGHT, AGENT_CAPSULE_RADIUS, AGENT_WALK_SPEED, SIM_TICK};
use mantling::map::load_collision_from_path;
use mantling::{
    AgentPose, AnimationPlayer, Collaborators, CollisionProfile, LedgeDetector, MantlingConfig,
    MantlingSession, MantlingType, MotionWarping, PhysicsWorld, Ragdoll, SessionOutcome,
    SettingsResolver, TimelineRef, TraceFilter, TraceLog, WarpRequest, WorldQuery, classify,
};

const COURSE_HEIGHTS: [f32; 5] = [40.0, 90.0, 150.0, 200.0, 260.0];
const LANE_SPACING: f32 = 400.0;
const OBSTACLE_DISTANCE: f32 = 300.0;
const HEIGHT_JITTER: f32 = 10.0;
const DISTANCE_JITTER: f32 = 40.0;
const STEP_HEIGHT: f32 = 45.0;
const MAX_DROP: f32 = 1000.0;
const BODY_PROBE_HEIGHTS: [f32; 3] = [20.0, 60.0, 120.0];
const DEFAULT_PLAY_LENGTH: f32 = 1.0;

#[derive(Parser, Debug)]
#[command(name = "mantle-probe", about = "Run the mantling pipeline against a test course")]
struct Args {
    /// Mantling config (JSON). Uses the built-in standard config when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// GLB map to use instead of the generated course.
    #[arg(long)]
    map: Option<PathBuf>,
    /// Seed for course jitter.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Simulation ticks per lane.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Detect with the in-air trace profile.
    #[arg(long)]
    airborne: bool,
    /// Record and log every detector ray.
    #[arg(long)]
    draw_traces: bool,
}

/// Start point and facing for one run.
struct Lane {
    start: Vec3,
    facing: Vec3,
    label: String,
}

/// Timeline that just counts time.
#[derive(Default)]
struct SimAnimation {
    length: f32,
    position: f32,
    playing: bool,
}

impl SimAnimation {
    fn advance(&mut self, dt: f32) {
        if self.playing {
            self.position += dt;
            if self.position >= self.length {
                self.playing = false;
            }
        }
    }
}

impl AnimationPlayer for SimAnimation {
    fn play(&mut self, timeline: &TimelineRef, start_time: f32) -> bool {
        self.length = timeline.play_length.unwrap_or(DEFAULT_PLAY_LENGTH);
        self.position = start_time;
        self.playing = start_time < self.length;
        log::debug!("Playing '{}' from {:.3}s of {:.3}s", timeline.asset, start_time, self.length);
        self.playing
    }

    fn stop(&mut self, blend_out: f32) {
        log::debug!("Stopping timeline at {:.3}s, blend out {:.2}s", self.position, blend_out);
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
struct SimWarp {
    last: Option<WarpRequest>,
}

impl MotionWarping for SimWarp {
    fn warp(&mut self, request: &WarpRequest) {
        log::debug!(
            "Warp to {:?} during {:.2}..{:.2}s",
            request.target_location,
            request.window.min,
            request.window.max
        );
        self.last = Some(request.clone());
    }
}

struct SimRagdoll;

impl Ragdoll for SimRagdoll {
    fn start_ragdolling(&mut self) {
        log::warn!("Agent is ragdolling");
    }
}

struct LaneResult {
    label: String,
    mantling_type: Option<MantlingType>,
    outcome: Option<SessionOutcome>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => MantlingConfig::load(path)?,
        None => MantlingConfig::standard(),
    };
    if args.draw_traces {
        config.general.grounded_trace.draw_failed_traces = true;
        config.general.in_air_trace.draw_failed_traces = true;
    }
    let resolver = SettingsResolver::new(&config)?;

    let (mut world, lanes) = match &args.map {
        Some(path) => {
            let mesh = load_collision_from_path(path)?;
            let lane = Lane {
                start: mesh.spawn_point(),
                facing: Vec3::NEG_Z,
                label: path.display().to_string(),
            };
            (mesh.into_world()?.0, vec![lane])
        }
        None => build_course(args.seed),
    };
    log::info!(
        "Running {} lane(s), {} primitives, airborne: {}",
        lanes.len(),
        world.len(),
        args.airborne
    );

    let mut results = Vec::new();
    for lane in lanes {
        results.push(run_lane(&mut world, &lane, &config, &resolver, &args));
    }

    for result in &results {
        match (result.mantling_type, result.outcome) {
            (Some(kind), Some(outcome)) => {
                log::info!("{}: {:?} -> {:?}", result.label, kind, outcome)
            }
            (Some(kind), None) => log::info!("{}: {:?}, still running", result.label, kind),
            (None, _) => log::info!("{}: no mantle", result.label),
        }
    }
    Ok(())
}

/// Floor plus one box per lane, heights and distances jittered by `seed`.
fn build_course(seed: u64) -> (PhysicsWorld, Vec<Lane>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut world = PhysicsWorld::new();
    let width = LANE_SPACING * COURSE_HEIGHTS.len() as f32;
    world.add_box(
        Vec3::new(width / 2.0, -5.0, -width / 2.0),
        Vec3::new(width, 5.0, width),
        CollisionProfile::world_static(),
    );

    let mut lanes = Vec::with_capacity(COURSE_HEIGHTS.len());
    for (i, base_height) in COURSE_HEIGHTS.iter().enumerate() {
        let height = base_height + rng.random_range(-HEIGHT_JITTER..HEIGHT_JITTER);
        let distance = OBSTACLE_DISTANCE + rng.random_range(-DISTANCE_JITTER..DISTANCE_JITTER);
        let x = i as f32 * LANE_SPACING;
        world.add_box(
            Vec3::new(x, height / 2.0, -distance - 100.0),
            Vec3::new(LANE_SPACING / 4.0, height / 2.0, 100.0),
            CollisionProfile::world_static(),
        );
        lanes.push(Lane {
            start: Vec3::new(x, 0.0, 0.0),
            facing: Vec3::NEG_Z,
            label: format!("lane {} ({:.0} cm at {:.0} cm)", i, height, distance),
        });
    }
    (world, lanes)
}

fn run_lane(
    world: &mut PhysicsWorld,
    lane: &Lane,
    config: &MantlingConfig,
    resolver: &SettingsResolver,
    args: &Args,
) -> LaneResult {
    let mut session = MantlingSession::new();
    let mut animation = SimAnimation::default();
    let mut warp = SimWarp::default();
    let mut ragdoll = SimRagdoll;
    let mut traces = TraceLog::new();
    let filter = config.general.trace_filter();

    let mut agent = lane.start;
    let mut result = LaneResult {
        label: lane.label.clone(),
        mantling_type: None,
        outcome: None,
    };

    for tick in 0..args.ticks {
        world.step(SIM_TICK);

        if session.is_idle() {
            let velocity = lane.facing * AGENT_WALK_SPEED;
            let pose = AgentPose::new(agent, lane.facing, AGENT_CAPSULE_RADIUS, AGENT_CAPSULE_HEIGHT);
            let detector = LedgeDetector::new(&*world, &config.general);
            let hit = detector.detect_with_debug(&pose, velocity, args.airborne, &mut traces);
            if args.draw_traces {
                traces.dump();
                traces.clear();
            }

            match hit {
                Some(hit) => {
                    let params = classify(&hit, args.airborne, &config.general);
                    log::info!(
                        "{}: tick {} found {:?} ledge, height {:.1}",
                        lane.label,
                        tick,
                        params.mantling_type(),
                        params.mantling_height()
                    );
                    match session.try_start(params, resolver, &config.general) {
                        Ok(()) => result.mantling_type = Some(params.mantling_type()),
                        Err(e) => log::warn!("{}: {}", lane.label, e),
                    }
                }
                None => {
                    let next = agent + velocity * SIM_TICK;
                    agent = clamp_desired_to_path(
                        &*world,
                        agent,
                        next,
                        &BODY_PROBE_HEIGHTS,
                        AGENT_CAPSULE_RADIUS,
                        &filter,
                    );
                    if let Some(y) = ground_height(&*world, agent, STEP_HEIGHT, MAX_DROP, &filter) {
                        agent.y = y;
                    }
                }
            }
        }

        animation.advance(SIM_TICK);
        let mut collaborators = Collaborators {
            animation: &mut animation,
            warping: &mut warp,
            ragdoll: &mut ragdoll,
        };
        if let Some(outcome) = session.tick(SIM_TICK, &*world, &mut collaborators) {
            if outcome == SessionOutcome::Completed
                && let Some(request) = &warp.last
            {
                agent = request.target_location;
                log::info!("{}: agent now at {:?}", lane.label, agent);
            }
            result.outcome = Some(outcome);
            return result;
        }
    }

    log::info!("{}: gave up after {} ticks at {:?}", lane.label, args.ticks, agent);
    result
}

/// Raycast from previous position toward next; if geometry is hit along the segment,
/// return a position clamped to just before the hit.
/// Casts one ray per height above the base and clamps to the earliest hit.
fn clamp_desired_to_path(
    world: &impl WorldQuery,
    prev_pos: Vec3,
    next_pos: Vec3,
    heights: &[f32],
    margin: f32,
    filter: &TraceFilter,
) -> Vec3 {
    let delta = next_pos - prev_pos;
    let len = delta.length();
    if len <= 1e-6 {
        return next_pos;
    }
    let dir = delta / len;
    let max_dist = len + margin;

    let mut min_hit = f32::MAX;
    for &height in heights {
        let origin = prev_pos + Vec3::new(0.0, height, 0.0);
        if let Some(hit) = world.cast_ray(origin, dir, max_dist, filter)
            && hit.distance < min_hit
        {
            min_hit = hit.distance;
        }
    }

    if min_hit <= max_dist {
        let safe_dist = (min_hit - margin).clamp(0.0, len);
        prev_pos + dir * safe_dist
    } else {
        next_pos
    }
}

/// Height of the first surface below `position + step_height`, searching `max_drop`.
fn ground_height(
    world: &impl WorldQuery,
    position: Vec3,
    step_height: f32,
    max_drop: f32,
    filter: &TraceFilter,
) -> Option<f32> {
    let origin = position + Vec3::new(0.0, step_height, 0.0);
    world
        .cast_ray(origin, Vec3::NEG_Y, step_height + max_drop, filter)
        .map(|hit| hit.point.y)
}
