//! Collision channels and the filter a mantling trace runs with.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionChannel {
    WorldStatic,
    WorldDynamic,
    Pawn,
    Visibility,
    Camera,
    PhysicsBody,
    Vehicle,
    Destructible,
}

impl CollisionChannel {
    pub const ALL: [CollisionChannel; 8] = [
        CollisionChannel::WorldStatic,
        CollisionChannel::WorldDynamic,
        CollisionChannel::Pawn,
        CollisionChannel::Visibility,
        CollisionChannel::Camera,
        CollisionChannel::PhysicsBody,
        CollisionChannel::Vehicle,
        CollisionChannel::Destructible,
    ];

    fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Set of collision channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const NONE: ChannelMask = ChannelMask(0);
    pub const ALL: ChannelMask = ChannelMask((1 << CollisionChannel::ALL.len()) - 1);

    pub fn with(self, channel: CollisionChannel) -> Self {
        Self(self.0 | channel.bit())
    }

    pub fn without(self, channel: CollisionChannel) -> Self {
        Self(self.0 & !channel.bit())
    }

    pub fn contains(self, channel: CollisionChannel) -> bool {
        self.0 & channel.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<CollisionChannel> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = CollisionChannel>>(iter: I) -> Self {
        iter.into_iter().fold(ChannelMask::NONE, ChannelMask::with)
    }
}

/// Object types a mantling trace blocks on.
///
/// Holds the authored channel list and the mask derived from it. The mask
/// starts as "ignore everything" and every listed channel is set to block;
/// it is rebuilt whenever the list is replaced or deserialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CollisionChannel>", into = "Vec<CollisionChannel>")]
pub struct TraceResponses {
    channels: Vec<CollisionChannel>,
    mask: ChannelMask,
}

impl TraceResponses {
    pub fn new(channels: Vec<CollisionChannel>) -> Self {
        let mask = channels.iter().copied().collect();
        Self { channels, mask }
    }

    pub fn channels(&self) -> &[CollisionChannel] {
        &self.channels
    }

    pub fn mask(&self) -> ChannelMask {
        self.mask
    }
}

impl Default for TraceResponses {
    fn default() -> Self {
        Self::new(vec![
            CollisionChannel::WorldStatic,
            CollisionChannel::WorldDynamic,
            CollisionChannel::Destructible,
        ])
    }
}

impl From<Vec<CollisionChannel>> for TraceResponses {
    fn from(channels: Vec<CollisionChannel>) -> Self {
        Self::new(channels)
    }
}

impl From<TraceResponses> for Vec<CollisionChannel> {
    fn from(responses: TraceResponses) -> Self {
        responses.channels
    }
}

/// How a world primitive takes part in traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionProfile {
    /// The primitive's own object type.
    pub object_channel: CollisionChannel,
    /// Trace channels this primitive blocks.
    pub blocks: ChannelMask,
}

impl CollisionProfile {
    pub fn new(object_channel: CollisionChannel, blocks: ChannelMask) -> Self {
        Self {
            object_channel,
            blocks,
        }
    }

    pub fn world_static() -> Self {
        Self::new(CollisionChannel::WorldStatic, ChannelMask::ALL)
    }

    pub fn world_dynamic() -> Self {
        Self::new(CollisionChannel::WorldDynamic, ChannelMask::ALL)
    }
}

impl Default for CollisionProfile {
    fn default() -> Self {
        Self::world_static()
    }
}

/// Channel and response mask a single trace runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceFilter {
    pub channel: CollisionChannel,
    pub responses: ChannelMask,
}

impl TraceFilter {
    pub fn new(channel: CollisionChannel, responses: ChannelMask) -> Self {
        Self { channel, responses }
    }

    /// A primitive blocks the trace only when both sides agree: it blocks the
    /// trace channel and the trace responds to its object type.
    pub fn accepts(&self, profile: &CollisionProfile) -> bool {
        profile.blocks.contains(self.channel) && self.responses.contains(profile.object_channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_from_channels() {
        let mask: ChannelMask = [CollisionChannel::Pawn, CollisionChannel::Camera]
            .into_iter()
            .collect();
        assert!(mask.contains(CollisionChannel::Pawn));
        assert!(mask.contains(CollisionChannel::Camera));
        assert!(!mask.contains(CollisionChannel::WorldStatic));
        assert!(!mask.without(CollisionChannel::Pawn).contains(CollisionChannel::Pawn));
    }

    #[test]
    fn responses_rebuild_mask_on_deserialize() {
        let responses: TraceResponses = serde_json::from_str(r#"["vehicle","pawn"]"#).unwrap();
        assert!(responses.mask().contains(CollisionChannel::Vehicle));
        assert!(responses.mask().contains(CollisionChannel::Pawn));
        assert!(!responses.mask().contains(CollisionChannel::WorldStatic));
    }

    #[test]
    fn empty_responses_ignore_everything() {
        let responses = TraceResponses::new(Vec::new());
        assert!(responses.mask().is_empty());
        let filter = TraceFilter::new(CollisionChannel::Visibility, responses.mask());
        assert!(!filter.accepts(&CollisionProfile::world_static()));
    }

    #[test]
    fn filter_requires_both_sides_to_block() {
        let filter = TraceFilter::new(
            CollisionChannel::Visibility,
            TraceResponses::default().mask(),
        );
        assert!(filter.accepts(&CollisionProfile::world_static()));

        let see_through = CollisionProfile::new(
            CollisionChannel::WorldStatic,
            ChannelMask::ALL.without(CollisionChannel::Visibility),
        );
        assert!(!filter.accepts(&see_through));

        let pawn = CollisionProfile::new(CollisionChannel::Pawn, ChannelMask::ALL);
        assert!(!filter.accepts(&pawn));
    }
}
