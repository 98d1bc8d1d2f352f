use bevy::input::gamepad::{GamepadConnection, GamepadEvent};
use bevy::prelude::*;

use crate::eye::EyeStates;
use crate::session::{RecenterEvent, SessionMode, SessionRequest, ViewSettings};

#[derive(Resource)]
pub struct Keybinds {
    pub up: KeyCode,
    pub down: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub nearer: KeyCode,
    pub farther: KeyCode,
    pub twist_ccw: KeyCode,
    pub twist_cw: KeyCode,
}

impl Default for Keybinds {
    fn default() -> Self {
        Self {
            up: KeyCode::ArrowUp,
            down: KeyCode::ArrowDown,
            left: KeyCode::ArrowLeft,
            right: KeyCode::ArrowRight,
            nearer: KeyCode::PageDown,
            farther: KeyCode::PageUp,
            twist_ccw: KeyCode::Comma,
            twist_cw: KeyCode::Period,
        }
    }
}

#[derive(Resource)]
struct ActiveGamepad(Gamepad);

pub struct InputPlugin;
impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Keybinds>().add_systems(
            Update,
            (
                gamepad_connections,
                plane_nudge,
                eye_select_toggle,
                head_lock_toggle,
                both_eyes_toggle,
                hud_toggle,
                controller_toggle,
                recenter_trigger,
                session_toggle,
            ),
        );
    }
}

/// Samples keyboard and gamepad once per frame and applies
/// `delta = rate * elapsed` to the active eye's state, so movement speed is
/// independent of frame rate.
fn plane_nudge(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    keybinds: Res<Keybinds>,
    settings: Res<ViewSettings>,
    mut eyes: ResMut<EyeStates>,
    active_gamepad: Option<Res<ActiveGamepad>>,
    axes: Res<Axis<GamepadAxis>>,
) {
    let dt = time.delta_seconds();
    let mut dir = Vec3::ZERO;
    let mut twist = 0.0;

    if keys.pressed(keybinds.up) {
        dir.y += 1.0;
    }
    if keys.pressed(keybinds.down) {
        dir.y -= 1.0;
    }
    if keys.pressed(keybinds.left) {
        dir.x -= 1.0;
    }
    if keys.pressed(keybinds.right) {
        dir.x += 1.0;
    }
    if keys.pressed(keybinds.farther) {
        dir.z += 1.0;
    }
    if keys.pressed(keybinds.nearer) {
        dir.z -= 1.0;
    }
    if keys.pressed(keybinds.twist_ccw) {
        twist += 1.0;
    }
    if keys.pressed(keybinds.twist_cw) {
        twist -= 1.0;
    }

    if let Some(ActiveGamepad(gamepad)) = active_gamepad.as_deref() {
        let stick = |axis_type| {
            axes.get(GamepadAxis {
                gamepad: *gamepad,
                axis_type,
            })
            .unwrap_or(0.0)
        };
        dir.x += stick(GamepadAxisType::LeftStickX);
        dir.y += stick(GamepadAxisType::LeftStickY);
        dir.z += stick(GamepadAxisType::RightStickY);
        twist -= stick(GamepadAxisType::RightStickX);
    }

    if dir.length_squared() < 1e-6 && twist.abs() < 1e-3 {
        return;
    }

    let step = dir * settings.move_rate * dt;
    let twist_step = twist * settings.rotate_rate * dt;
    for eye in settings.active_eye.targets() {
        let state = eyes.get_mut(*eye);
        state.position += step;
        state.rotation.z += twist_step;
    }
}

fn eye_select_toggle(mut settings: ResMut<ViewSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::Tab) {
        settings.active_eye = settings.active_eye.next();
    }
}

fn head_lock_toggle(mut settings: ResMut<ViewSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyL) {
        settings.head_locked = !settings.head_locked;
    }
}

fn both_eyes_toggle(mut settings: ResMut<ViewSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyB) {
        settings.show_both_eyes = !settings.show_both_eyes;
    }
}

fn hud_toggle(mut settings: ResMut<ViewSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyH) {
        settings.show_hud = !settings.show_hud;
    }
}

fn controller_toggle(mut settings: ResMut<ViewSettings>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyC) {
        settings.show_controllers = !settings.show_controllers;
    }
}

fn recenter_trigger(mut ev_recenter: EventWriter<RecenterEvent>, keys: Res<ButtonInput<KeyCode>>) {
    if keys.just_pressed(KeyCode::KeyR) {
        ev_recenter.send(RecenterEvent);
    }
}

fn session_toggle(
    keys: Res<ButtonInput<KeyCode>>,
    mode: Res<State<SessionMode>>,
    mut ev_request: EventWriter<SessionRequest>,
) {
    if keys.just_pressed(KeyCode::Enter) && *mode.get() == SessionMode::Desktop {
        ev_request.send(SessionRequest { enter: true });
    }
    if keys.just_pressed(KeyCode::Escape) && *mode.get() == SessionMode::InSession {
        ev_request.send(SessionRequest { enter: false });
    }
}

fn gamepad_connections(
    mut commands: Commands,
    active_gamepad: Option<Res<ActiveGamepad>>,
    mut evr_gamepad: EventReader<GamepadEvent>,
) {
    for ev in evr_gamepad.read() {
        let GamepadEvent::Connection(ev_conn) = ev else {
            continue;
        };
        match &ev_conn.connection {
            GamepadConnection::Connected(info) => {
                debug!("gamepad connected: {:?}, name: {}", ev_conn.gamepad, info.name);
                if active_gamepad.is_none() {
                    commands.insert_resource(ActiveGamepad(ev_conn.gamepad));
                }
            }
            GamepadConnection::Disconnected => {
                debug!("gamepad disconnected: {:?}", ev_conn.gamepad);
                if let Some(ActiveGamepad(old_id)) = active_gamepad.as_deref() {
                    if *old_id == ev_conn.gamepad {
                        commands.remove_resource::<ActiveGamepad>();
                    }
                }
            }
        }
    }
}
