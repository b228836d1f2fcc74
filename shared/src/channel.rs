use serde::{Deserialize, Serialize};

const TOPIC_ROOT: &str = "maps.gw2.io";

/// Which map the viewer is showing. Live entities are scoped to one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapContext {
    /// The PvE continent.
    #[default]
    Tyria,
    /// The WvW continent.
    Mists,
}

impl MapContext {
    pub fn continent_id(self) -> u8 {
        match self {
            Self::Tyria => 1,
            Self::Mists => 2,
        }
    }

    /// Zoom level at which map coordinates equal tile pixels.
    pub fn max_zoom(self) -> u8 {
        match self {
            Self::Tyria => 7,
            Self::Mists => 6,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tyria" | "1" => Some(Self::Tyria),
            "mists" | "wvw" | "2" => Some(Self::Mists),
            _ => None,
        }
    }
}

/// Broadcast channel a viewer subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Global,
    Guild,
    Solo,
    Custom,
}

impl Channel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Some(Self::Global),
            "guild" => Some(Self::Guild),
            "solo" => Some(Self::Solo),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Everything needed to resolve a subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub channel: Channel,
    /// Home region (`na`/`eu`), used by the Tyria global channel.
    pub region: Option<String>,
    /// WvW match id such as `2-4`, used by the Mists global channel.
    pub wvw_match: Option<String>,
    /// WvW team colour, used by the Mists global channel.
    pub wvw_team: Option<String>,
    pub guild_channel: Option<String>,
    pub custom_channel: Option<String>,
}

impl ChannelSettings {
    /// Resolve the wildcard topic for `context`.
    ///
    /// Returns `None` when a required part is missing, and always for
    /// [`Channel::Solo`], which has no shared topic.
    pub fn topic(&self, context: MapContext) -> Option<String> {
        match self.channel {
            Channel::Global => match context {
                MapContext::Tyria => {
                    let region = non_empty(&self.region)?;
                    Some(format!(
                        "{TOPIC_ROOT}/global/{}/{region}/#",
                        context.continent_id()
                    ))
                }
                MapContext::Mists => {
                    let wvw_match = non_empty(&self.wvw_match)?;
                    let team = non_empty(&self.wvw_team)?;
                    Some(format!(
                        "{TOPIC_ROOT}/global/{}/{wvw_match}/{team}/#",
                        context.continent_id()
                    ))
                }
            },
            Channel::Guild => {
                let guild = non_empty(&self.guild_channel)?;
                Some(format!("{TOPIC_ROOT}/guild/{guild}/#"))
            }
            Channel::Custom => {
                let custom = non_empty(&self.custom_channel)?;
                Some(format!("{TOPIC_ROOT}/{custom}/#"))
            }
            Channel::Solo => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
