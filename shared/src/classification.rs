use serde::{Deserialize, Serialize};

/// Character profession as reported by the game's MumbleLink identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Profession {
    #[default]
    Unknown,
    Guardian,
    Warrior,
    Engineer,
    Ranger,
    Thief,
    Elementalist,
    Mesmer,
    Necromancer,
    Revenant,
}

/// Active mount. Numbering follows the game's mount index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Mount {
    #[default]
    None,
    Jackal,
    Griffon,
    Springer,
    Skimmer,
    Raptor,
    RollerBeetle,
    Warclaw,
    Skyscale,
    Skiff,
    SiegeTurtle,
}

/// Last-known classification of a tracked character. Replaced wholesale on
/// every state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub profession: Profession,
    pub specialisation: u32,
    pub mount: Mount,
    pub is_commander: bool,
}

impl From<u8> for Profession {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Guardian,
            2 => Self::Warrior,
            3 => Self::Engineer,
            4 => Self::Ranger,
            5 => Self::Thief,
            6 => Self::Elementalist,
            7 => Self::Mesmer,
            8 => Self::Necromancer,
            9 => Self::Revenant,
            _ => Self::Unknown,
        }
    }
}

impl From<Profession> for u8 {
    fn from(value: Profession) -> Self {
        match value {
            Profession::Unknown => 0,
            Profession::Guardian => 1,
            Profession::Warrior => 2,
            Profession::Engineer => 3,
            Profession::Ranger => 4,
            Profession::Thief => 5,
            Profession::Elementalist => 6,
            Profession::Mesmer => 7,
            Profession::Necromancer => 8,
            Profession::Revenant => 9,
        }
    }
}

impl Profession {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Guardian => "Guardian",
            Self::Warrior => "Warrior",
            Self::Engineer => "Engineer",
            Self::Ranger => "Ranger",
            Self::Thief => "Thief",
            Self::Elementalist => "Elementalist",
            Self::Mesmer => "Mesmer",
            Self::Necromancer => "Necromancer",
            Self::Revenant => "Revenant",
        }
    }

    /// Profession colour as a CSS hex string.
    pub fn colour(self) -> &'static str {
        match self {
            Self::Guardian => "#67AECB",
            Self::Warrior => "#BC8D16",
            Self::Engineer => "#98692C",
            Self::Ranger => "#8EA53A",
            Self::Thief => "#495578",
            Self::Elementalist => "#A3362E",
            Self::Mesmer => "#724192",
            Self::Necromancer => "#3F5847",
            Self::Revenant => "#572435",
            Self::Unknown => "#DDD",
        }
    }

    pub fn icon_url(self) -> &'static str {
        match self {
            Self::Guardian => {
                "https://render.guildwars2.com/file/C32BE61FC55C962524624F643897ECF1A9C80462/156634.png"
            }
            Self::Warrior => {
                "https://render.guildwars2.com/file/0A97E13F29B3597A447EEC04A09BE5BD699A2250/156643.png"
            }
            Self::Engineer => {
                "https://render.guildwars2.com/file/5CCB361F44CCC7256132405D31E3A24DACCF440A/156632.png"
            }
            Self::Ranger => {
                "https://render.guildwars2.com/file/49B10316B424F4E20139EB5E51ADCF24A8724E9B/156640.png"
            }
            Self::Thief => {
                "https://render.guildwars2.com/file/F9EC00E23F630D6DB20CDA985592EC010E2A5705/156641.png"
            }
            Self::Elementalist => {
                "https://render.guildwars2.com/file/77B793123251931AFF9FCA24C07E0F704BC4DA49/156630.png"
            }
            Self::Mesmer => {
                "https://render.guildwars2.com/file/E43730AD49A903C3A1B4F27E41DE04EA51A775EC/156636.png"
            }
            Self::Necromancer => {
                "https://render.guildwars2.com/file/AE56F8670807B87CF6EEE3FC7E6CB9710959E004/156638.png"
            }
            Self::Revenant => {
                "https://render.guildwars2.com/file/7C9309BE7A2A48C6A9FBCC70CC1EBEBFD7593C05/961390.png"
            }
            Self::Unknown => "/assets/refresh_icon.png",
        }
    }
}

impl From<u8> for Mount {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Jackal,
            2 => Self::Griffon,
            3 => Self::Springer,
            4 => Self::Skimmer,
            5 => Self::Raptor,
            6 => Self::RollerBeetle,
            7 => Self::Warclaw,
            8 => Self::Skyscale,
            9 => Self::Skiff,
            10 => Self::SiegeTurtle,
            _ => Self::None,
        }
    }
}

impl From<Mount> for u8 {
    fn from(value: Mount) -> Self {
        match value {
            Mount::None => 0,
            Mount::Jackal => 1,
            Mount::Griffon => 2,
            Mount::Springer => 3,
            Mount::Skimmer => 4,
            Mount::Raptor => 5,
            Mount::RollerBeetle => 6,
            Mount::Warclaw => 7,
            Mount::Skyscale => 8,
            Mount::Skiff => 9,
            Mount::SiegeTurtle => 10,
        }
    }
}

impl Mount {
    pub fn is_mounted(self) -> bool {
        self != Self::None
    }

    /// Sidebar icon path, or `None` when dismounted.
    pub fn icon_path(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Jackal => Some("/assets/jackal_icon.png"),
            Self::Griffon => Some("/assets/griffon_icon.png"),
            Self::Springer => Some("/assets/springer_icon.png"),
            Self::Skimmer => Some("/assets/skimmer_icon.png"),
            Self::Raptor => Some("/assets/raptor_icon.png"),
            Self::RollerBeetle => Some("/assets/beetle_icon.png"),
            Self::Warclaw => Some("/assets/warclaw_icon.png"),
            Self::Skyscale => Some("/assets/skyscale_icon.png"),
            Self::Skiff => Some("/assets/skiff_icon.png"),
            Self::SiegeTurtle => Some("/assets/turtle_icon.png"),
        }
    }
}
