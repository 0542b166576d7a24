use cmdlink::{Action, CommandSession, MouseDelta, PressSource};

/// Key numbers for the synthetic keyboard.
const KEY_W: u32 = 17;
const KEY_D: u32 = 32;
const KEY_UP: u32 = 72;
const KEY_SHIFT: u32 = 42;
const MOUSE1: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct Binding {
    key: u32,
    action: Action,
    /// Held for `on` ms out of every `period` ms, starting at `phase`.
    period: u32,
    on: u32,
    phase: u32,
}

const BINDINGS: [Binding; 5] = [
    Binding { key: KEY_W, action: Action::Forward, period: 1200, on: 900, phase: 0 },
    Binding { key: KEY_D, action: Action::MoveRight, period: 700, on: 250, phase: 300 },
    Binding { key: KEY_UP, action: Action::Forward, period: 2000, on: 400, phase: 500 },
    Binding { key: KEY_SHIFT, action: Action::Speed, period: 3000, on: 1000, phase: 1500 },
    Binding { key: MOUSE1, action: Action::Attack, period: 450, on: 40, phase: 100 },
];

/// Deterministic player: keys cycle on fixed schedules and the mouse sweeps
/// back and forth. `KEY_W` and `KEY_UP` share `forward` to exercise
/// two-source holds.
#[derive(Debug, Default)]
pub struct InputScript {
    held: [bool; BINDINGS.len()],
}

impl InputScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies key edges up to `now`.
    pub fn apply_keys(&mut self, session: &mut CommandSession, now: u32) {
        for (binding, held) in BINDINGS.iter().zip(self.held.iter_mut()) {
            let in_cycle = now.wrapping_add(binding.period - binding.phase) % binding.period;
            let want = in_cycle < binding.on;
            if want == *held {
                continue;
            }
            *held = want;

            let source = PressSource::Key(binding.key);
            if want {
                session.press(binding.action, source, Some(now), now);
            } else {
                session.release(binding.action, source, Some(now));
            }
        }
    }

    pub fn mouse(&self, now: u32) -> MouseDelta {
        let phase = (now % 4000) as f32 / 4000.0 * std::f32::consts::TAU;
        MouseDelta {
            dx: (phase.sin() * 6.0) as i32,
            dy: (phase.cos() * 2.0) as i32,
        }
    }

    pub fn any_key_down(&self) -> bool {
        self.held.iter().any(|&h| h)
    }
}
