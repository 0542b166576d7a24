mod button;
mod buttons;
mod sampler;

pub use button::{ButtonState, LogicalButton, PressSource};
pub use buttons::{Action, ButtonSet, center_view};
pub use sampler::{InputSampler, MouseDelta, SampleContext, base_move, clamp_speed};
