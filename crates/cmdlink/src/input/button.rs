use bitflags::bitflags;

/// Fallback credit when a release carries no usable timestamp.
const RELEASE_FALLBACK_MSEC: u32 = 10;

/// Backdate applied to presses that arrive without a timestamp, so a
/// console-typed press still covers some time.
const PRESS_BACKDATE_MSEC: u32 = 100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ButtonState: u8 {
        const DOWN = 1 << 0;
        const PRESSED = 1 << 1;
        const RELEASED = 1 << 2;
    }
}

/// Physical origin of a press: a key number, or the console with no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressSource {
    Key(u32),
    Console,
}

/// A logical action held by at most two physical sources at once.
///
/// The button is down while either slot is occupied, so releasing one of two
/// keys bound to the same action does not release the action.
#[derive(Debug, Clone, Default)]
pub struct LogicalButton {
    sources: [Option<PressSource>; 2],
    down_time: u32,
    msec: u32,
    state: ButtonState,
}

impl LogicalButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this press moved the button from up to down.
    pub fn press(&mut self, source: PressSource, timestamp: Option<u32>, event_time: u32) -> bool {
        if self.sources.contains(&Some(source)) {
            return false;
        }

        let Some(slot) = self.sources.iter_mut().find(|slot| slot.is_none()) else {
            log::warn!("Three sources down for a button, ignoring {:?}", source);
            return false;
        };
        *slot = Some(source);

        if self.state.contains(ButtonState::DOWN) {
            return false;
        }

        self.down_time = match timestamp {
            Some(time) if time != 0 => time,
            _ => event_time.wrapping_sub(PRESS_BACKDATE_MSEC),
        };
        self.state |= ButtonState::DOWN | ButtonState::PRESSED;
        true
    }

    /// Returns `true` if this release moved the button from down to up.
    pub fn release(&mut self, source: PressSource, timestamp: Option<u32>) -> bool {
        if source == PressSource::Console {
            self.sources = [None, None];
            self.state = ButtonState::empty();
            return false;
        }

        let Some(slot) = self.sources.iter_mut().find(|slot| **slot == Some(source)) else {
            // release without a matching press, e.g. a key that went down in a menu
            return false;
        };
        *slot = None;

        if self.is_held() || !self.state.contains(ButtonState::DOWN) {
            return false;
        }

        self.msec += match timestamp {
            Some(uptime) if uptime > self.down_time => uptime - self.down_time,
            _ => RELEASE_FALLBACK_MSEC,
        };

        self.state.remove(ButtonState::DOWN);
        self.state.insert(ButtonState::RELEASED);
        true
    }

    /// Fraction of the pending command's duration this button was held.
    pub fn active_fraction(&self, cmd_msec: u32, event_time: u32) -> f32 {
        if cmd_msec == 0 {
            return 0.0;
        }

        let mut msec = self.msec;
        if self.is_down() && event_time > self.down_time {
            msec += event_time - self.down_time;
        }

        (msec as f32 / cmd_msec as f32).clamp(0.0, 1.0)
    }

    pub fn clear(&mut self, event_time: u32) {
        self.msec = 0;
        self.state.remove(ButtonState::PRESSED | ButtonState::RELEASED);
        if self.is_down() {
            self.down_time = event_time;
        }
    }

    pub fn clear_pressed(&mut self) {
        self.state.remove(ButtonState::PRESSED);
    }

    #[inline]
    pub fn is_down(&self) -> bool {
        self.state.contains(ButtonState::DOWN)
    }

    /// Down now, or went down at some point since the last clear.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.intersects(ButtonState::DOWN | ButtonState::PRESSED)
    }

    #[inline]
    pub fn was_pressed(&self) -> bool {
        self.state.contains(ButtonState::PRESSED)
    }

    #[inline]
    pub fn was_released(&self) -> bool {
        self.state.contains(ButtonState::RELEASED)
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn active_msec(&self) -> u32 {
        self.msec
    }

    fn is_held(&self) -> bool {
        self.sources.iter().any(Option::is_some)
    }
}
