//! Desktop input automation helpers.
//!
//! Key name parsing for KeyInput commands and the enigo-backed input driver.

use super::services::InputDriver;
use crate::settings::MouseButton;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

/// Convert a string key name to an enigo Key variant.
pub fn string_to_key(key_str: &str) -> Option<Key> {
    match key_str.to_lowercase().as_str() {
        // Modifier keys
        "shift" | "lshift" => Some(Key::Shift),
        "control" | "ctrl" | "lcontrol" => Some(Key::Control),
        "alt" | "option" | "lalt" => Some(Key::Alt),
        "meta" | "command" | "cmd" | "win" | "super" => Some(Key::Meta),

        // Function keys
        "f1" => Some(Key::F1),
        "f2" => Some(Key::F2),
        "f3" => Some(Key::F3),
        "f4" => Some(Key::F4),
        "f5" => Some(Key::F5),
        "f6" => Some(Key::F6),
        "f7" => Some(Key::F7),
        "f8" => Some(Key::F8),
        "f9" => Some(Key::F9),
        "f10" => Some(Key::F10),
        "f11" => Some(Key::F11),
        "f12" => Some(Key::F12),

        // Navigation keys
        "up" | "uparrow" => Some(Key::UpArrow),
        "down" | "downarrow" => Some(Key::DownArrow),
        "left" | "leftarrow" => Some(Key::LeftArrow),
        "right" | "rightarrow" => Some(Key::RightArrow),
        "home" => Some(Key::Home),
        "end" => Some(Key::End),
        "pageup" | "pgup" => Some(Key::PageUp),
        "pagedown" | "pgdn" => Some(Key::PageDown),

        // Special keys
        "return" | "enter" => Some(Key::Return),
        "escape" | "esc" => Some(Key::Escape),
        "tab" => Some(Key::Tab),
        "backspace" | "back" => Some(Key::Backspace),
        "delete" | "del" => Some(Key::Delete),
        "space" => Some(Key::Space),
        "capslock" | "caps" => Some(Key::CapsLock),
        "plus" => Some(Key::Unicode('+')),

        // Single character keys are typed as lowercase Unicode
        _ if key_str.chars().count() == 1 => key_str
            .chars()
            .next()
            .map(|c| Key::Unicode(c.to_ascii_lowercase())),

        _ => None,
    }
}

/// Splits `Ctrl+Shift+S` into keys in press order. Returns the first part
/// that is not a known key name on failure.
pub fn parse_key_combo(combo: &str) -> Result<Vec<Key>, String> {
    combo
        .split('+')
        .map(str::trim)
        .map(|part| {
            if part.is_empty() {
                Err(combo.to_string())
            } else {
                string_to_key(part).ok_or_else(|| part.to_string())
            }
        })
        .collect()
}

/// Presses `keys` in order, then releases the pressed ones in reverse.
///
/// A failed press stops further presses but every key already down is
/// still released. The first error is returned.
pub fn press_and_release<E>(
    keys: &[Key],
    mut send: impl FnMut(Key, Direction) -> Result<(), E>,
) -> Result<(), E> {
    let mut result = Ok(());
    let mut pressed = 0;
    for key in keys {
        if let Err(e) = send(*key, Direction::Press) {
            result = Err(e);
            break;
        }
        pressed += 1;
    }
    for key in keys[..pressed].iter().rev() {
        if let Err(e) = send(*key, Direction::Release) {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

fn to_enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Input driver backed by enigo. The connection is opened on first use so a
/// headless process can still load and validate scripts.
#[derive(Default)]
pub struct EnigoInput {
    enigo: Option<Enigo>,
}

impl EnigoInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn enigo(&mut self) -> anyhow::Result<&mut Enigo> {
        if self.enigo.is_none() {
            self.enigo = Some(Enigo::new(&Settings::default())?);
        }
        self.enigo
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Input connection unavailable"))
    }
}

impl InputDriver for EnigoInput {
    fn click(&mut self, x: i32, y: i32, button: MouseButton, count: u32) -> anyhow::Result<()> {
        let enigo = self.enigo()?;
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        for _ in 0..count {
            enigo.button(to_enigo_button(button), Direction::Click)?;
        }
        Ok(())
    }

    fn press_keys(&mut self, keys: &[Key]) -> anyhow::Result<()> {
        let enigo = self.enigo()?;
        press_and_release(keys, |key, direction| enigo.key(key, direction))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combos_parse_in_press_order() {
        assert_eq!(
            parse_key_combo("Ctrl+Shift+S").unwrap(),
            vec![Key::Control, Key::Shift, Key::Unicode('s')]
        );
        assert_eq!(parse_key_combo(" enter ").unwrap(), vec![Key::Return]);
    }

    #[test]
    fn failed_press_releases_held_modifiers() {
        let keys = [Key::Control, Key::Shift, Key::Unicode('s')];
        let mut sent = Vec::new();
        let result = press_and_release(&keys, |key, direction| {
            let press = direction == Direction::Press;
            sent.push((key, press));
            if press && key == Key::Unicode('s') {
                Err("no such key")
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err("no such key"));
        assert_eq!(
            sent,
            vec![
                (Key::Control, true),
                (Key::Shift, true),
                (Key::Unicode('s'), true),
                (Key::Shift, false),
                (Key::Control, false),
            ]
        );
    }

    #[test]
    fn release_errors_do_not_skip_other_releases() {
        let keys = [Key::Alt, Key::Tab];
        let mut released = Vec::new();
        let result = press_and_release(&keys, |key, direction| {
            if direction == Direction::Press {
                return Ok(());
            }
            released.push(key);
            if key == Key::Tab { Err("stuck") } else { Ok(()) }
        });
        assert_eq!(result, Err("stuck"));
        assert_eq!(released, vec![Key::Tab, Key::Alt]);
    }

    #[test]
    fn unknown_parts_are_reported() {
        assert_eq!(parse_key_combo("Alt+Nope"), Err("Nope".to_string()));
        assert_eq!(parse_key_combo("Ctrl+"), Err("Ctrl+".to_string()));
    }
}
