// Physical input simulation.
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use enigo::{
    Axis, Button, Coordinate as EnigoCoordinate, Direction, Enigo, InputError, Key, Keyboard,
    Mouse, Settings,
};
use tokio::sync::oneshot;

use crate::config::InputConfig;
use crate::errors::{DeskError, DeskResult};
use crate::executor::hotkey::{KeySymbol, KeypadKey, Modifier, NamedKey};
use crate::perception::types::{Coordinate, Logical};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// The native pointer/keyboard driver. Every call may suspend; callers
/// serialize access because the pointer and keyboard are shared state.
#[async_trait]
pub trait InputBackend: Send + Sync {
    async fn press_key(&self, key: KeySymbol) -> DeskResult<()>;
    async fn release_key(&self, key: KeySymbol) -> DeskResult<()>;
    async fn type_text(&self, text: &str) -> DeskResult<()>;
    async fn move_pointer(&self, to: Coordinate<Logical>) -> DeskResult<()>;
    async fn press_button(&self, button: MouseButton) -> DeskResult<()>;
    async fn release_button(&self, button: MouseButton) -> DeskResult<()>;
    async fn click_button(&self, button: MouseButton) -> DeskResult<()>;
    /// `amount` is in pixels.
    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> DeskResult<()>;
    async fn pointer_position(&self) -> DeskResult<Coordinate<Logical>>;
    /// Lets go of every key and button this backend still holds down.
    async fn release_all(&self) -> DeskResult<()>;
}

// ── enigo backend ──────────────────────────────────────────────────────────

struct InputWorker {
    enigo: Enigo,
    held_keys: Vec<Key>,
    held_buttons: Vec<Button>,
    key_delay: Duration,
}

impl InputWorker {
    fn key(&mut self, key: Key, direction: Direction) -> Result<(), InputError> {
        self.enigo.key(key, direction)?;
        match direction {
            Direction::Press => {
                if !self.held_keys.contains(&key) {
                    self.held_keys.push(key);
                }
            }
            Direction::Release => self.held_keys.retain(|k| *k != key),
            Direction::Click => {}
        }
        if !self.key_delay.is_zero() {
            std::thread::sleep(self.key_delay);
        }
        Ok(())
    }

    fn button(&mut self, button: Button, direction: Direction) -> Result<(), InputError> {
        self.enigo.button(button, direction)?;
        match direction {
            Direction::Press => {
                if !self.held_buttons.contains(&button) {
                    self.held_buttons.push(button);
                }
            }
            Direction::Release => self.held_buttons.retain(|b| *b != button),
            Direction::Click => {}
        }
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), InputError> {
        while let Some(key) = self.held_keys.pop() {
            self.enigo.key(key, Direction::Release)?;
        }
        while let Some(button) = self.held_buttons.pop() {
            self.enigo.button(button, Direction::Release)?;
        }
        Ok(())
    }
}

type Job = Box<dyn FnOnce(&mut InputWorker) + Send>;

/// `InputBackend` over enigo. The `Enigo` handle lives on one dedicated
/// thread; async callers hand it jobs and await the reply.
pub struct EnigoBackend {
    jobs: mpsc::Sender<Job>,
    config: InputConfig,
}

impl EnigoBackend {
    pub fn spawn(config: InputConfig) -> DeskResult<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<DeskResult<()>>(1);
        let key_delay = Duration::from_millis(config.key_delay_ms);

        std::thread::Builder::new()
            .name("deskbridge-input".into())
            .spawn(move || {
                let enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => enigo,
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeskError::Input(format!(
                            "failed to initialize input backend: {e}"
                        ))));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let mut worker = InputWorker {
                    enigo,
                    held_keys: Vec::new(),
                    held_buttons: Vec::new(),
                    key_delay,
                };
                while let Ok(job) = jobs_rx.recv() {
                    job(&mut worker);
                }
                tracing::debug!("input worker exiting");
            })?;

        ready_rx
            .recv()
            .map_err(|_| DeskError::Input("input worker died during startup".into()))??;
        tracing::info!(key_delay_ms = config.key_delay_ms, "enigo input backend ready");
        Ok(Self { jobs: jobs_tx, config })
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> DeskResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut InputWorker) -> Result<T, InputError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(Box::new(move |worker: &mut InputWorker| {
                let _ = tx.send(f(worker));
            }))
            .map_err(|_| DeskError::Input(format!("{op}: input worker stopped")))?;
        rx.await
            .map_err(|_| DeskError::Input(format!("{op}: input worker dropped the request")))?
            .map_err(|e| DeskError::Input(format!("{op}: {e}")))
    }
}

#[async_trait]
impl InputBackend for EnigoBackend {
    async fn press_key(&self, key: KeySymbol) -> DeskResult<()> {
        let native = native_key(key)?;
        self.run("press key", move |w| w.key(native, Direction::Press)).await
    }

    async fn release_key(&self, key: KeySymbol) -> DeskResult<()> {
        let native = native_key(key)?;
        self.run("release key", move |w| w.key(native, Direction::Release)).await
    }

    async fn type_text(&self, text: &str) -> DeskResult<()> {
        let text = text.to_owned();
        self.run("type text", move |w| w.enigo.text(&text)).await
    }

    async fn move_pointer(&self, to: Coordinate<Logical>) -> DeskResult<()> {
        self.run("move pointer", move |w| {
            w.enigo.move_mouse(to.x, to.y, EnigoCoordinate::Abs)
        })
        .await
    }

    async fn press_button(&self, button: MouseButton) -> DeskResult<()> {
        let native = native_button(button);
        self.run("press button", move |w| w.button(native, Direction::Press)).await
    }

    async fn release_button(&self, button: MouseButton) -> DeskResult<()> {
        let native = native_button(button);
        self.run("release button", move |w| w.button(native, Direction::Release)).await
    }

    async fn click_button(&self, button: MouseButton) -> DeskResult<()> {
        let native = native_button(button);
        self.run("click button", move |w| w.button(native, Direction::Click)).await
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> DeskResult<()> {
        let notches = scroll_notches(amount, self.config.scroll_pixels_per_notch);
        let (length, axis) = match direction {
            ScrollDirection::Up => (-notches, Axis::Vertical),
            ScrollDirection::Down => (notches, Axis::Vertical),
            ScrollDirection::Left => (-notches, Axis::Horizontal),
            ScrollDirection::Right => (notches, Axis::Horizontal),
        };
        tracing::debug!(?direction, amount, notches, "scrolling");
        self.run("scroll", move |w| w.enigo.scroll(length, axis)).await
    }

    async fn pointer_position(&self) -> DeskResult<Coordinate<Logical>> {
        let (x, y) = self.run("pointer position", |w| w.enigo.location()).await?;
        Ok(Coordinate::new(x, y))
    }

    async fn release_all(&self) -> DeskResult<()> {
        self.run("release all", |w| w.release_all()).await
    }
}

/// Pixels to wheel notches, rounding up so any positive amount scrolls.
fn scroll_notches(amount: u32, pixels_per_notch: u32) -> i32 {
    let per_notch = pixels_per_notch.max(1);
    let notches = amount.div_ceil(per_notch).max(1);
    i32::try_from(notches).unwrap_or(i32::MAX)
}

fn native_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

fn native_key(symbol: KeySymbol) -> DeskResult<Key> {
    let key = match symbol {
        KeySymbol::Char(c) => Key::Unicode(c),
        KeySymbol::Modifier(Modifier::Ctrl) => Key::Control,
        KeySymbol::Modifier(Modifier::Alt) => Key::Alt,
        KeySymbol::Modifier(Modifier::Shift) => Key::Shift,
        KeySymbol::Modifier(Modifier::Super) => Key::Meta,
        KeySymbol::Named(named) => match named {
            NamedKey::Return => Key::Return,
            NamedKey::Escape => Key::Escape,
            NamedKey::Tab => Key::Tab,
            NamedKey::Space => Key::Space,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Delete => Key::Delete,
            NamedKey::Home => Key::Home,
            NamedKey::End => Key::End,
            NamedKey::PageUp => Key::PageUp,
            NamedKey::PageDown => Key::PageDown,
            NamedKey::Up => Key::UpArrow,
            NamedKey::Down => Key::DownArrow,
            NamedKey::Left => Key::LeftArrow,
            NamedKey::Right => Key::RightArrow,
            NamedKey::CapsLock => Key::CapsLock,
            NamedKey::Function(n) if n <= 20 => function_key(n),
            other => platform_keycode(other)
                .map(Key::Other)
                .ok_or_else(|| DeskError::Input(format!("key {other} is not available on this platform")))?,
        },
    };
    Ok(key)
}

fn function_key(n: u8) -> Key {
    const KEYS: [Key; 20] = [
        Key::F1, Key::F2, Key::F3, Key::F4, Key::F5,
        Key::F6, Key::F7, Key::F8, Key::F9, Key::F10,
        Key::F11, Key::F12, Key::F13, Key::F14, Key::F15,
        Key::F16, Key::F17, Key::F18, Key::F19, Key::F20,
    ];
    KEYS[(n.clamp(1, 20) - 1) as usize]
}

/// Raw platform keycodes for keys enigo has no portable variant for.
#[cfg(all(unix, not(target_os = "macos")))]
fn platform_keycode(key: NamedKey) -> Option<u32> {
    // X11 keysyms.
    let code = match key {
        NamedKey::Insert => 0xff63,
        NamedKey::Function(n) if (21..=24).contains(&n) => 0xffbe + (n as u32 - 1),
        NamedKey::Keypad(KeypadKey::Digit(d)) => 0xffb0 + d as u32,
        NamedKey::Keypad(KeypadKey::Add) => 0xffab,
        NamedKey::Keypad(KeypadKey::Subtract) => 0xffad,
        NamedKey::Keypad(KeypadKey::Multiply) => 0xffaa,
        NamedKey::Keypad(KeypadKey::Divide) => 0xffaf,
        NamedKey::Keypad(KeypadKey::Decimal) => 0xffae,
        NamedKey::Keypad(KeypadKey::Enter) => 0xff8d,
        _ => return None,
    };
    Some(code)
}

#[cfg(target_os = "windows")]
fn platform_keycode(key: NamedKey) -> Option<u32> {
    // Virtual-key codes.
    let code = match key {
        NamedKey::Insert => 0x2d,
        NamedKey::Function(n) if (21..=24).contains(&n) => 0x70 + (n as u32 - 1),
        NamedKey::Keypad(KeypadKey::Digit(d)) => 0x60 + d as u32,
        NamedKey::Keypad(KeypadKey::Add) => 0x6b,
        NamedKey::Keypad(KeypadKey::Subtract) => 0x6d,
        NamedKey::Keypad(KeypadKey::Multiply) => 0x6a,
        NamedKey::Keypad(KeypadKey::Divide) => 0x6f,
        NamedKey::Keypad(KeypadKey::Decimal) => 0x6e,
        NamedKey::Keypad(KeypadKey::Enter) => 0x0d,
        _ => return None,
    };
    Some(code)
}

#[cfg(target_os = "macos")]
fn platform_keycode(key: NamedKey) -> Option<u32> {
    // Carbon virtual keycodes; there is no F21-F24.
    const KEYPAD_DIGITS: [u32; 10] = [0x52, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5b, 0x5c];
    let code = match key {
        NamedKey::Insert => 0x72,
        NamedKey::Keypad(KeypadKey::Digit(d)) => *KEYPAD_DIGITS.get(d as usize)?,
        NamedKey::Keypad(KeypadKey::Add) => 0x45,
        NamedKey::Keypad(KeypadKey::Subtract) => 0x4e,
        NamedKey::Keypad(KeypadKey::Multiply) => 0x43,
        NamedKey::Keypad(KeypadKey::Divide) => 0x4b,
        NamedKey::Keypad(KeypadKey::Decimal) => 0x41,
        NamedKey::Keypad(KeypadKey::Enter) => 0x4c,
        _ => return None,
    };
    Some(code)
}
