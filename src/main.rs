mod eye;
mod input;
mod layers;
mod planes;
mod session;
mod ui;

use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use input::InputPlugin;
use layers::LayerMask;
use planes::PlanesPlugin;
use session::{SessionMode, SessionPlugin};
use ui::UiPlugin;

fn main() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.04)))
        .insert_resource(Msaa::Sample4)
        .init_state::<SessionMode>()
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "amblyoscope-rs — dichoptic alignment trainer".into(),
                resolution: (1400., 900.).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins((SessionPlugin, PlanesPlugin, UiPlugin, InputPlugin))
        .add_systems(Startup, setup_camera)
        .run();
}

/// Desktop preview camera: sees both eye planes overlaid plus all common
/// content. Deactivated for the duration of a stereo session.
fn setup_camera(mut commands: Commands) {
    let mask = LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON]);
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0.0, 0.0, 0.0),
            ..default()
        },
        mask,
        mask.to_render_layers(),
        MainCamera,
    ));
}

#[derive(Component)]
pub struct MainCamera;
