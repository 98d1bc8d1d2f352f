use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin};

use crate::eye::{diopters_to_meters, meters_to_diopters, Eye, EyeStates, ImageState};
use crate::planes::ImageSet;
use crate::session::{
    EmulatedDevice, RecenterEvent, SessionMode, SessionRequest, StatusLine, ViewSettings,
};

pub struct UiPlugin;
impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin)
            .init_resource::<ControlValues>()
            .init_resource::<ControlsDirty>()
            .insert_resource(ControlSyncTimer(Timer::from_seconds(
                0.1,
                TimerMode::Repeating,
            )))
            .add_systems(Update, (ui_system, hud_system, sync_controls));
    }
}

/// Slider mirror of one eye's state, in display units: prism diopters for
/// lateral offsets, meters for distance, degrees for rotation.
#[derive(Clone, PartialEq, Debug)]
pub struct EyeControls {
    pub horizontal_pd: f32,
    pub vertical_pd: f32,
    pub distance_m: f32,
    pub rotation_deg: Vec3,
}

impl EyeControls {
    fn from_state(state: &ImageState, viewing_distance: f32) -> Self {
        Self {
            horizontal_pd: meters_to_diopters(state.position.x, viewing_distance),
            vertical_pd: meters_to_diopters(state.position.y, viewing_distance),
            distance_m: state.position.z,
            rotation_deg: Vec3::new(
                state.rotation.x.to_degrees(),
                state.rotation.y.to_degrees(),
                state.rotation.z.to_degrees(),
            ),
        }
    }

    fn write_state(&self, state: &mut ImageState, viewing_distance: f32) {
        state.position.x = diopters_to_meters(self.horizontal_pd, viewing_distance);
        state.position.y = diopters_to_meters(self.vertical_pd, viewing_distance);
        state.position.z = self.distance_m;
        state.rotation = Vec3::new(
            self.rotation_deg.x.to_radians(),
            self.rotation_deg.y.to_radians(),
            self.rotation_deg.z.to_radians(),
        );
    }
}

#[derive(Resource, Clone, PartialEq, Debug)]
pub struct ControlValues {
    pub left: EyeControls,
    pub right: EyeControls,
}

impl Default for ControlValues {
    fn default() -> Self {
        let defaults = EyeStates::default();
        Self {
            left: EyeControls::from_state(&defaults.left, 2.0),
            right: EyeControls::from_state(&defaults.right, 2.0),
        }
    }
}

/// Set when the panel itself wrote the state this frame; the next sync tick
/// skips the pull so a slider drag is not overwritten mid-gesture.
#[derive(Resource, Default)]
struct ControlsDirty(bool);

#[derive(Resource)]
struct ControlSyncTimer(Timer);

fn ui_system(
    mut contexts: EguiContexts,
    mut settings: ResMut<ViewSettings>,
    mut values: ResMut<ControlValues>,
    mut dirty: ResMut<ControlsDirty>,
    mut eyes: ResMut<EyeStates>,
    mut device: ResMut<EmulatedDevice>,
    mode: Res<State<SessionMode>>,
    status: Res<StatusLine>,
    mut ev_request: EventWriter<SessionRequest>,
    mut ev_recenter: EventWriter<RecenterEvent>,
) {
    let desktop = *mode.get() == SessionMode::Desktop;
    let in_session = *mode.get() == SessionMode::InSession;
    let before = values.clone();

    egui::Window::new("Alignment").show(contexts.ctx_mut(), |ui| {
        let values = &mut *values;
        for (eye, controls) in [
            (Eye::Left, &mut values.left),
            (Eye::Right, &mut values.right),
        ] {
            ui.collapsing(format!("{} eye image", eye.label()), |ui| {
                ui.add(
                    egui::Slider::new(&mut controls.horizontal_pd, -30.0..=30.0)
                        .text("Horizontal (PD)"),
                );
                ui.add(
                    egui::Slider::new(&mut controls.vertical_pd, -30.0..=30.0)
                        .text("Vertical (PD)"),
                );
                ui.add(
                    egui::Slider::new(&mut controls.distance_m, 0.5..=5.0).text("Distance (m)"),
                );
                ui.add(
                    egui::Slider::new(&mut controls.rotation_deg.z, -45.0..=45.0)
                        .text("Torsion (deg)"),
                );
                ui.add(
                    egui::Slider::new(&mut controls.rotation_deg.x, -45.0..=45.0)
                        .text("Tilt (deg)"),
                );
                ui.add(
                    egui::Slider::new(&mut controls.rotation_deg.y, -45.0..=45.0)
                        .text("Swing (deg)"),
                );
            });
        }

        ui.separator();

        ui.checkbox(&mut settings.head_locked, "Head-locked");
        ui.checkbox(&mut settings.show_both_eyes, "Show both eyes");
        ui.checkbox(&mut settings.show_hud, "HUD");
        ui.checkbox(&mut settings.show_controllers, "Controllers");

        ui.separator();

        egui::ComboBox::from_label("Image set")
            .selected_text(settings.image_set.label())
            .show_ui(ui, |ui| {
                for set in [ImageSet::Grid, ImageSet::Rings, ImageSet::Cross] {
                    ui.selectable_value(&mut settings.image_set, set, set.label());
                }
            });
        ui.add(egui::Slider::new(&mut settings.image_size, 0.1..=2.0).text("Image size (m)"));
        ui.add(
            egui::Slider::new(&mut settings.desktop_opacity, 0.1..=1.0).text("Desktop opacity"),
        );

        ui.separator();

        ui.add_enabled_ui(desktop, |ui| {
            egui::ComboBox::from_label("Device")
                .selected_text(device.label())
                .show_ui(ui, |ui| {
                    for d in [
                        EmulatedDevice::StereoHeadset,
                        EmulatedDevice::MonoscopicViewer,
                        EmulatedDevice::Unsupported,
                    ] {
                        ui.selectable_value(&mut *device, d, d.label());
                    }
                });
        });

        ui.horizontal(|ui| {
            if ui
                .add_enabled(desktop, egui::Button::new("Enter session"))
                .clicked()
            {
                ev_request.send(SessionRequest { enter: true });
            }
            if ui
                .add_enabled(in_session, egui::Button::new("Exit session"))
                .clicked()
            {
                ev_request.send(SessionRequest { enter: false });
            }
            if ui
                .add_enabled(in_session, egui::Button::new("Recenter"))
                .clicked()
            {
                ev_recenter.send(RecenterEvent);
            }
        });

        ui.label(format!("Active eye: {}", settings.active_eye.label()));
        if !status.0.is_empty() {
            ui.label(status.0.as_str());
        }
    });

    if *values != before {
        let vd = settings.viewing_distance;
        values.left.write_state(&mut eyes.left, vd);
        values.right.write_state(&mut eyes.right, vd);
        dirty.0 = true;
    }
}

/// Pull-based refresh of the displayed slider values from the stored state,
/// throttled so controller polling does not thrash the widgets.
fn sync_controls(
    time: Res<Time>,
    mut timer: ResMut<ControlSyncTimer>,
    mut dirty: ResMut<ControlsDirty>,
    settings: Res<ViewSettings>,
    eyes: Res<EyeStates>,
    mut values: ResMut<ControlValues>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }
    if dirty.0 {
        dirty.0 = false;
        return;
    }
    let refreshed = ControlValues {
        left: EyeControls::from_state(&eyes.left, settings.viewing_distance),
        right: EyeControls::from_state(&eyes.right, settings.viewing_distance),
    };
    if *values != refreshed {
        *values = refreshed;
    }
}

fn hud_system(
    mut contexts: EguiContexts,
    settings: Res<ViewSettings>,
    eyes: Res<EyeStates>,
    mode: Res<State<SessionMode>>,
    device: Res<EmulatedDevice>,
    status: Res<StatusLine>,
    diagnostics: Res<DiagnosticsStore>,
) {
    if !settings.show_hud {
        return;
    }
    egui::Window::new("HUD")
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .resizable(false)
        .show(contexts.ctx_mut(), |ui| {
            let mode_label = match mode.get() {
                SessionMode::Desktop => "Desktop",
                SessionMode::Entering => "Entering...",
                SessionMode::InSession => "In session",
            };
            ui.label(format!("Mode: {}  ({})", mode_label, device.label()));
            for eye in [Eye::Left, Eye::Right] {
                let state = eyes.get(eye);
                ui.label(format!(
                    "{}: H {:+.1} PD  V {:+.1} PD  T {:+.1} deg",
                    eye.label(),
                    meters_to_diopters(state.position.x, settings.viewing_distance),
                    meters_to_diopters(state.position.y, settings.viewing_distance),
                    state.rotation.z.to_degrees(),
                ));
            }
            if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
                if let Some(value) = fps.smoothed() {
                    ui.label(format!("FPS: {:.1}", value));
                }
            }
            if !status.0.is_empty() {
                ui.label(status.0.as_str());
            }
        });
}
