use glam::{Vec2, Vec3};

use super::buttons::{Action, ButtonSet};
use crate::command::{MoveCommand, ServerState, short_to_angle};
use crate::settings::InputSettings;

/// Vertical FOV of a 90 degree horizontal FOV at 4:3.
const REFERENCE_FOV_Y: f32 = 73.739_8;

const PITCH_LIMIT: f32 = 89.0;

/// Raw relative mouse motion reported by the platform for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseDelta {
    pub dx: i32,
    pub dy: i32,
}

/// Everything the sampler reads but does not own.
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub settings: &'a InputSettings,
    pub server: &'a ServerState,
    pub event_time: u32,
    pub fov_x: f32,
}

/// Per-frame view angle and movement accumulation.
#[derive(Debug, Clone, Default)]
pub struct InputSampler {
    /// Pitch, yaw, roll in degrees.
    pub view_angles: Vec3,
    /// Forward and side movement accumulated from the mouse this tick.
    mouse_move: Vec2,
    /// Movement for local prediction, rebuilt every frame.
    local_move: Vec3,
    old_mouse: MouseDelta,
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_move(&self) -> Vec3 {
        self.local_move
    }

    pub fn mouse_move(&self) -> Vec2 {
        self.mouse_move
    }

    pub fn take_mouse_move(&mut self) -> Vec2 {
        std::mem::take(&mut self.mouse_move)
    }

    /// Paused frames contribute nothing to the pending command.
    pub fn pause_frame(&mut self) {
        self.local_move = Vec3::ZERO;
    }

    /// Must run at most once per render frame.
    pub fn update(
        &mut self,
        msec: u32,
        mouse: Option<MouseDelta>,
        pending: &mut MoveCommand,
        buttons: &ButtonSet,
        ctx: &SampleContext<'_>,
    ) {
        pending.add_msec(msec);
        let cmd_msec = pending.msec as u32;

        self.adjust_angles(msec, cmd_msec, buttons, ctx);

        let mut local_move = base_move(buttons, ctx.settings, cmd_msec, ctx.event_time);

        if let Some(delta) = mouse {
            self.mouse_motion(delta, buttons, ctx);
        }

        local_move.x += self.mouse_move.x;
        local_move.y += self.mouse_move.y;
        self.local_move = clamp_speed(local_move, ctx.server.max_speed);

        self.clamp_pitch(ctx.server.delta_pitch);

        pending.set_view_angles(self.view_angles.x, self.view_angles.y, self.view_angles.z);
    }

    fn adjust_angles(&mut self, msec: u32, cmd_msec: u32, buttons: &ButtonSet, ctx: &SampleContext<'_>) {
        let settings = ctx.settings;
        let fraction = |action| buttons.fraction(action, cmd_msec, ctx.event_time);

        let mut speed = msec as f32 * 0.001;
        if buttons.is_down(Action::Speed) {
            speed *= settings.angle_speed_key;
        }

        if !buttons.is_down(Action::Strafe) {
            self.view_angles.y -= speed * settings.yaw_speed * fraction(Action::Right);
            self.view_angles.y += speed * settings.yaw_speed * fraction(Action::Left);
        }
        if buttons.is_down(Action::KeyLook) {
            self.view_angles.x -= speed * settings.pitch_speed * fraction(Action::Forward);
            self.view_angles.x += speed * settings.pitch_speed * fraction(Action::Back);
        }

        self.view_angles.x -= speed * settings.pitch_speed * fraction(Action::LookUp);
        self.view_angles.x += speed * settings.pitch_speed * fraction(Action::LookDown);
    }

    fn mouse_motion(&mut self, delta: MouseDelta, buttons: &ButtonSet, ctx: &SampleContext<'_>) {
        let settings = ctx.settings;

        let (mut mx, mut my) = if settings.mouse_filter {
            (
                (delta.dx + self.old_mouse.dx) as f32 * 0.5,
                (delta.dy + self.old_mouse.dy) as f32 * 0.5,
            )
        } else {
            (delta.dx as f32, delta.dy as f32)
        };
        self.old_mouse = delta;

        if mx == 0.0 && my == 0.0 {
            return;
        }

        let accel = settings.mouse_accel.clamp(0.0, 1.0);
        let speed = settings.sensitivity + (mx * mx + my * my).sqrt() * accel;
        mx *= speed;
        my *= speed;

        if settings.mouse_autosens {
            mx *= ctx.fov_x / 90.0;
            my *= calc_fov(ctx.fov_x, 4.0, 3.0) / REFERENCE_FOV_Y;
        }

        let strafing = buttons.is_down(Action::Strafe);
        let mouse_looking = buttons.is_mouse_looking();

        if strafing || (settings.lookstrafe && !mouse_looking) {
            self.mouse_move.y += settings.mouse_side * mx;
        } else {
            self.view_angles.y -= settings.mouse_yaw * mx;
        }

        if (mouse_looking || settings.freelook) && !strafing {
            self.view_angles.x += settings.mouse_pitch * my;
        } else {
            self.mouse_move.x -= settings.mouse_forward * my;
        }
    }

    fn clamp_pitch(&mut self, delta_pitch: i16) {
        let mut baseline = short_to_angle(delta_pitch);
        if baseline > 180.0 {
            baseline -= 360.0;
        }

        let pitch = &mut self.view_angles.x;
        if *pitch + baseline < -360.0 {
            *pitch += 360.0;
        }
        if *pitch + baseline > 360.0 {
            *pitch -= 360.0;
        }

        if *pitch + baseline > PITCH_LIMIT {
            *pitch = PITCH_LIMIT - baseline;
        }
        if *pitch + baseline < -PITCH_LIMIT {
            *pitch = -PITCH_LIMIT - baseline;
        }
    }
}

/// Movement requested by held buttons, as forward, side, up.
pub fn base_move(buttons: &ButtonSet, settings: &InputSettings, cmd_msec: u32, event_time: u32) -> Vec3 {
    let fraction = |action| buttons.fraction(action, cmd_msec, event_time);
    let mut movement = Vec3::ZERO;

    if buttons.is_down(Action::Strafe) {
        movement.y += settings.side_speed * fraction(Action::Right);
        movement.y -= settings.side_speed * fraction(Action::Left);
    }

    movement.y += settings.side_speed * fraction(Action::MoveRight);
    movement.y -= settings.side_speed * fraction(Action::MoveLeft);

    movement.z += settings.up_speed * fraction(Action::MoveUp);
    movement.z -= settings.up_speed * fraction(Action::MoveDown);

    if !buttons.is_down(Action::KeyLook) {
        movement.x += settings.forward_speed * fraction(Action::Forward);
        movement.x -= settings.forward_speed * fraction(Action::Back);
    }

    if buttons.is_down(Action::Speed) ^ settings.always_run {
        movement *= 2.0;
    }

    movement
}

/// Bounds each axis and the overall length by the server's max speed.
pub fn clamp_speed(movement: Vec3, max_speed: f32) -> Vec3 {
    let max_speed = max_speed.max(0.0);
    movement
        .clamp(Vec3::splat(-max_speed), Vec3::splat(max_speed))
        .clamp_length_max(max_speed)
}

fn calc_fov(fov_x: f32, width: f32, height: f32) -> f32 {
    let fov_x = fov_x.clamp(1.0, 179.0);
    let x = width / (fov_x / 360.0 * std::f32::consts::PI).tan();
    (height / x).atan() * 360.0 / std::f32::consts::PI
}
