// Forward probe
pub const FORWARD_PROBE_SPACING: f32 = 10.0; // vertical gap between forward probe rays
pub const DOWNWARD_PROBE_LIFT: f32 = 1.0; // downward probe starts this far above the band max
pub const MIN_TRACE_SPEED: f32 = 1.0; // below this horizontal speed, trace along facing instead
pub const CLEARANCE_LIFT: f32 = 2.0; // headroom probe starts this far above the ledge surface

// Placement
pub const LOCATION_QUANTIZE: f32 = 100.0; // target locations snap to 1/100 cm

// Session
pub const DEFAULT_TARGET_MOVE_TOLERANCE: f32 = 50.0;

// Demo agent (mantle-probe)
pub const AGENT_CAPSULE_RADIUS: f32 = 30.0;
pub const AGENT_CAPSULE_HEIGHT: f32 = 180.0;
pub const AGENT_WALK_SPEED: f32 = 300.0;
pub const SIM_TICK: f32 = 1.0 / 60.0;

// Map import
pub const MAP_UNIT_SCALE: f32 = 100.0; // glTF meters -> world centimeters
pub const SPAWN_LIFT: f32 = 50.0; // spawn this far above the map's top
