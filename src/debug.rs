use glam::Vec3;

/// Which detector probe produced a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    Forward,
    Downward,
    Clearance,
}

/// One ray the detector cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceRecord {
    pub kind: TraceKind,
    pub start: Vec3,
    pub end: Vec3,
    /// Hit location, `None` when the ray found nothing.
    pub hit: Option<Vec3>,
}

/// Sink for detector traces. The host decides how to draw them.
pub trait DebugDraw {
    fn trace(&mut self, record: TraceRecord);
}

/// Discards everything.
pub struct NoDebugDraw;

impl DebugDraw for NoDebugDraw {
    fn trace(&mut self, _record: TraceRecord) {}
}

/// Collects traces in memory, e.g. to dump them after a frame.
#[derive(Default)]
pub struct TraceLog {
    records: Vec<TraceRecord>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn misses(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter().filter(|r| r.hit.is_none())
    }

    /// Write every record at debug level.
    pub fn dump(&self) {
        for record in &self.records {
            let fmt = |v: Vec3| format!("[{:.1}, {:.1}, {:.1}]", v.x, v.y, v.z);
            match record.hit {
                Some(hit) => log::debug!(
                    "{:?} trace {} -> {} hit {}",
                    record.kind,
                    fmt(record.start),
                    fmt(record.end),
                    fmt(hit)
                ),
                None => log::debug!(
                    "{:?} trace {} -> {} miss",
                    record.kind,
                    fmt(record.start),
                    fmt(record.end)
                ),
            }
        }
    }
}

impl DebugDraw for TraceLog {
    fn trace(&mut self, record: TraceRecord) {
        self.records.push(record);
    }
}
