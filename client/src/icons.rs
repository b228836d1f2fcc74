use gw2map_shared::Classification;

use crate::layer::{IconOverlay, MarkerIcon, OverlayAnchor};

pub const MARKER_SIZE: [u32; 2] = [32, 32];
pub const SELF_MARKER_SRC: &str = "/assets/player_marker.png";
pub const PLAYER_MARKER_SRC: &str = "/assets/global_player_dot.png";
pub const COMMANDER_BADGE_SRC: &str = "/assets/commander_blue.png";
pub const COMMANDER_BADGE_SIZE: [u32; 2] = [12, 12];

pub fn marker_icon(is_self: bool) -> MarkerIcon {
    MarkerIcon {
        url: if is_self {
            SELF_MARKER_SRC
        } else {
            PLAYER_MARKER_SRC
        },
        size: MARKER_SIZE,
    }
}

/// Decorations drawn around a marker for the given classification.
pub fn overlays_for(classification: &Classification) -> Vec<IconOverlay> {
    let mut overlays = Vec::new();
    if classification.is_commander {
        overlays.push(IconOverlay {
            url: COMMANDER_BADGE_SRC,
            anchor: OverlayAnchor::Top,
            size: COMMANDER_BADGE_SIZE,
            offset: [0, 0],
        });
    }
    overlays
}

pub fn tooltip(character_name: &str, account_name: &str) -> String {
    format!("{character_name} ({account_name})")
}

#[cfg(test)]
mod tests {
    use gw2map_shared::{Classification, Mount};

    use super::{
        COMMANDER_BADGE_SRC, PLAYER_MARKER_SRC, SELF_MARKER_SRC, marker_icon, overlays_for, tooltip,
    };
    use crate::layer::OverlayAnchor;

    #[test]
    fn local_user_gets_the_player_marker() {
        assert_eq!(marker_icon(true).url, SELF_MARKER_SRC);
        assert_eq!(marker_icon(false).url, PLAYER_MARKER_SRC);
        assert_eq!(marker_icon(false).size, [32, 32]);
    }

    #[test]
    fn commanders_carry_a_badge_on_top() {
        let plain = Classification {
            mount: Mount::Griffon,
            ..Classification::default()
        };
        assert!(overlays_for(&plain).is_empty());

        let commander = Classification {
            is_commander: true,
            ..plain
        };
        let overlays = overlays_for(&commander);
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].url, COMMANDER_BADGE_SRC);
        assert_eq!(overlays[0].anchor, OverlayAnchor::Top);
        assert_eq!(overlays[0].size, [12, 12]);
    }

    #[test]
    fn tooltip_names_character_and_account() {
        assert_eq!(tooltip("Zojja", "zojja.1234"), "Zojja (zojja.1234)");
    }
}
