//! Quartz event kinds, modifier flags and virtual key codes the macOS tap
//! reduces to monitor input.

use crate::keyboard_listener::character_input;
use crate::monitor::InputEvent;

pub const LEFT_MOUSE_DOWN: u32 = 1;
pub const RIGHT_MOUSE_DOWN: u32 = 3;
pub const KEY_DOWN: u32 = 10;
pub const OTHER_MOUSE_DOWN: u32 = 25;
pub const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
pub const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

/// Event kinds the tap subscribes to. The disabled notifications arrive
/// without being asked for.
pub const EVENT_MASK: u64 =
    1 << KEY_DOWN | 1 << LEFT_MOUSE_DOWN | 1 << RIGHT_MOUSE_DOWN | 1 << OTHER_MOUSE_DOWN;

const FLAG_CONTROL: u64 = 0x0004_0000;
const FLAG_ALTERNATE: u64 = 0x0008_0000;
const FLAG_COMMAND: u64 = 0x0010_0000;
const CHORD_FLAGS: u64 = FLAG_CONTROL | FLAG_ALTERNATE | FLAG_COMMAND;

const KEY_DELETE: u16 = 0x33;

const RESET_KEYS: &[u16] = &[
    0x24, // return
    0x30, // tab
    0x31, // space
    0x35, // escape
    0x4C, // keypad enter
    0x72, // help / insert
    0x73, // home
    0x74, // page up
    0x75, // forward delete
    0x77, // end
    0x79, // page down
    0x7B, // left
    0x7C, // right
    0x7D, // down
    0x7E, // up
];

pub fn is_tap_disabled(kind: u32) -> bool {
    kind == TAP_DISABLED_BY_TIMEOUT || kind == TAP_DISABLED_BY_USER_INPUT
}

/// `None` means the event does not concern the buffer.
pub fn translate(kind: u32, keycode: u16, flags: u64, text: Option<&str>) -> Option<InputEvent> {
    match kind {
        LEFT_MOUSE_DOWN | RIGHT_MOUSE_DOWN | OTHER_MOUSE_DOWN => Some(InputEvent::Reset),
        KEY_DOWN => {
            if flags & CHORD_FLAGS != 0 || RESET_KEYS.contains(&keycode) {
                Some(InputEvent::Reset)
            } else if keycode == KEY_DELETE {
                Some(InputEvent::Backspace)
            } else {
                text.map(character_input)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: u16 = 0x00;
    const SHIFT: u64 = 0x0002_0000;

    #[test]
    fn typed_characters_follow_the_layout() {
        assert_eq!(
            translate(KEY_DOWN, KEY_A, 0, Some("a")),
            Some(InputEvent::Character('a'))
        );
        assert_eq!(
            translate(KEY_DOWN, 0x29, SHIFT, Some(":")),
            Some(InputEvent::Character(':'))
        );
    }

    #[test]
    fn command_chords_reset() {
        assert_eq!(
            translate(KEY_DOWN, 0x09, FLAG_COMMAND, Some("v")),
            Some(InputEvent::Reset)
        );
        assert_eq!(
            translate(KEY_DOWN, KEY_DELETE, FLAG_ALTERNATE, None),
            Some(InputEvent::Reset)
        );
    }

    #[test]
    fn delete_and_navigation_keys() {
        assert_eq!(
            translate(KEY_DOWN, KEY_DELETE, 0, Some("\u{8}")),
            Some(InputEvent::Backspace)
        );
        assert_eq!(translate(KEY_DOWN, 0x7B, 0, None), Some(InputEvent::Reset));
        assert_eq!(translate(KEY_DOWN, 0x31, 0, Some(" ")), Some(InputEvent::Reset));
    }

    #[test]
    fn clicks_reset_and_other_kinds_are_ignored() {
        assert_eq!(translate(LEFT_MOUSE_DOWN, 0, 0, None), Some(InputEvent::Reset));
        assert_eq!(translate(11, KEY_A, 0, Some("a")), None);
        assert_eq!(translate(KEY_DOWN, 0x60, 0, None), None);
    }

    #[test]
    fn disabled_notifications_are_recognised() {
        assert!(is_tap_disabled(TAP_DISABLED_BY_TIMEOUT));
        assert!(is_tap_disabled(TAP_DISABLED_BY_USER_INPUT));
        assert!(!is_tap_disabled(KEY_DOWN));
    }
}
