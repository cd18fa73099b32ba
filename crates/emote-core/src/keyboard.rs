use crate::error::{EmoteError, Result};
use crate::injection::InjectionMarker;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Longest run handed to the OS in a single synthetic text event.
const CHUNK_SIZE: usize = 512;

/// Create a keyboard controller whose events carry `marker`.
///
/// macOS stores the marker in the event source user data and Windows in the
/// extra info word; other platforms ignore it and rely on the injection guard.
pub fn create_keyboard_controller(marker: InjectionMarker) -> Result<Enigo> {
    let settings = Settings {
        event_source_user_data: Some(marker.value()),
        windows_dw_extra_info: Some(marker.value() as usize),
        open_prompt_to_get_permissions: false,
        ..Settings::default()
    };

    Enigo::new(&settings).map_err(|err| {
        EmoteError::Enigo(format!("Failed to create keyboard controller: {}", err))
    })
}

/// Send backspace key presses
pub fn send_backspace(keyboard: &mut impl Keyboard, count: usize) -> Result<()> {
    for _ in 0..count {
        keyboard
            .key(Key::Backspace, Direction::Click)
            .map_err(|err| EmoteError::Enigo(format!("Failed to send backspace: {}", err)))?;
    }
    Ok(())
}

/// Type text as synthetic Unicode input, turning newlines into Return presses.
pub fn type_text(keyboard: &mut impl Keyboard, text: &str) -> Result<()> {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            keyboard
                .key(Key::Return, Direction::Click)
                .map_err(|err| EmoteError::Enigo(format!("Failed to type newline: {}", err)))?;
        }

        let chars: Vec<char> = line.chars().collect();
        for chunk in chars.chunks(CHUNK_SIZE) {
            let chunk: String = chunk.iter().collect();
            keyboard
                .text(&chunk)
                .map_err(|err| EmoteError::Enigo(format!("Failed to type text: {}", err)))?;
        }
    }

    Ok(())
}

/// The platform's paste modifier.
pub fn paste_modifier() -> Key {
    if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    }
}

/// Send the paste chord (Command-V on macOS, Control-V elsewhere).
pub fn send_paste_chord(keyboard: &mut impl Keyboard) -> Result<()> {
    let modifier = paste_modifier();
    let to_err = |err: enigo::InputError| EmoteError::Enigo(format!("Failed to send paste: {}", err));

    keyboard.key(modifier, Direction::Press).map_err(to_err)?;
    let pressed = keyboard.key(Key::Unicode('v'), Direction::Click).map_err(to_err);
    // Always let go of the modifier, even when the V press failed.
    let released = keyboard.key(modifier, Direction::Release).map_err(to_err);

    pressed.and(released)
}
