use bevy::prelude::*;
use bevy::render::camera::Viewport;
use bevy::render::view::RenderLayers;

use crate::eye::{Eye, EyeStates, ImageState};
use crate::layers::LayerMask;
use crate::planes::ImageSet;
use crate::MainCamera;

#[derive(States, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SessionMode {
    #[default]
    Desktop,
    /// Session requested but not yet resolved; controls are disabled.
    Entering,
    InSession,
}

/// Stand-in for the headset capability query. Selectable from the UI so the
/// monoscopic and unsupported branches can be exercised on a desktop.
#[derive(Resource, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EmulatedDevice {
    #[default]
    StereoHeadset,
    MonoscopicViewer,
    Unsupported,
}

impl EmulatedDevice {
    pub fn rig_cameras(self) -> Option<usize> {
        match self {
            EmulatedDevice::StereoHeadset => Some(2),
            EmulatedDevice::MonoscopicViewer => Some(1),
            EmulatedDevice::Unsupported => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EmulatedDevice::StereoHeadset => "Stereo headset",
            EmulatedDevice::MonoscopicViewer => "Monoscopic viewer",
            EmulatedDevice::Unsupported => "Unsupported",
        }
    }
}

#[derive(Resource, Clone)]
pub struct ViewSettings {
    pub head_locked: bool,
    pub show_both_eyes: bool,
    pub show_hud: bool,
    pub show_controllers: bool,
    pub desktop_opacity: f32,
    pub viewing_distance: f32,
    pub move_rate: f32,
    pub rotate_rate: f32,
    pub active_eye: ActiveEye,
    pub image_size: f32,
    pub image_set: ImageSet,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            head_locked: true,
            show_both_eyes: false,
            show_hud: true,
            show_controllers: true,
            desktop_opacity: 0.5,
            viewing_distance: 2.0,
            move_rate: 0.25,
            rotate_rate: 30f32.to_radians(),
            active_eye: ActiveEye::default(),
            image_size: 0.5,
            image_set: ImageSet::default(),
        }
    }
}

/// Which eye's image the keyboard/gamepad nudges.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ActiveEye {
    #[default]
    Right,
    Left,
    Both,
}

impl ActiveEye {
    pub fn targets(self) -> &'static [Eye] {
        match self {
            ActiveEye::Left => &[Eye::Left],
            ActiveEye::Right => &[Eye::Right],
            ActiveEye::Both => &[Eye::Left, Eye::Right],
        }
    }

    pub fn next(self) -> ActiveEye {
        match self {
            ActiveEye::Right => ActiveEye::Left,
            ActiveEye::Left => ActiveEye::Both,
            ActiveEye::Both => ActiveEye::Right,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActiveEye::Right => "Right",
            ActiveEye::Left => "Left",
            ActiveEye::Both => "Both",
        }
    }
}

#[derive(Event)]
pub struct SessionRequest {
    pub enter: bool,
}

#[derive(Event, Default)]
pub struct RecenterEvent;

/// One-line status surfaced in the HUD; the only place failures go.
#[derive(Resource, Default)]
pub struct StatusLine(pub String);

#[derive(Component)]
pub struct EyePlane {
    pub eye: Eye,
}

#[derive(Component)]
pub struct RigCamera {
    pub eye: Option<Eye>,
    pub index: usize,
}

#[derive(Component)]
pub struct ControllerVisual;

/// Scoped handle for the per-frame exclusivity pass. Inserted on session
/// start, removed in `OnExit(InSession)` so it cannot outlive the session.
#[derive(Resource)]
pub struct EyeVisibilityHook;

/// Everything the placement machine needs to know, gathered explicitly
/// instead of read from ambient globals.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionContext {
    pub session_active: bool,
    pub head_locked: bool,
    pub show_both_eyes: bool,
    pub rig_camera_count: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlaneAnchor {
    World,
    Rig(usize),
    /// Monoscopic fallback: both planes share the single session camera.
    SessionCamera,
}

#[derive(Clone, PartialEq, Debug)]
pub struct PlanePlacement {
    pub mask: LayerMask,
    pub anchor: PlaneAnchor,
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Pure placement rule. Head-locked split eyes share the COMMON mask and rely
/// on the per-frame hook for strict separation; world-locked eyes carry their
/// exclusive bit and rely on the rig-camera masks alone. A rig count below 2
/// takes the monoscopic branch and is never an error.
pub fn place_plane(eye: Eye, ctx: &SessionContext, state: &ImageState) -> PlanePlacement {
    let (mask, anchor) = if !ctx.session_active {
        (eye.mask(), PlaneAnchor::World)
    } else if ctx.show_both_eyes {
        let mask = LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON]);
        (mask, head_anchor(eye, ctx))
    } else if ctx.rig_camera_count >= 2 && ctx.head_locked {
        (LayerMask::COMMON, PlaneAnchor::Rig(eye.index()))
    } else if ctx.rig_camera_count >= 2 {
        (eye.mask(), PlaneAnchor::World)
    } else {
        (eye.mask(), head_anchor(eye, ctx))
    };
    PlanePlacement {
        mask,
        anchor,
        position: state.position,
        rotation: state.rotation,
    }
}

fn head_anchor(eye: Eye, ctx: &SessionContext) -> PlaneAnchor {
    if !ctx.head_locked {
        PlaneAnchor::World
    } else if ctx.rig_camera_count >= 2 {
        PlaneAnchor::Rig(eye.index())
    } else {
        PlaneAnchor::SessionCamera
    }
}

/// Mask for rig camera `index` out of `count`. With a stereo pair each camera
/// sees its own eye plus common content; a lone camera sees everything.
pub fn rig_camera_mask(index: usize, count: usize) -> LayerMask {
    if count >= 2 {
        match index {
            0 => LayerMask::LEFT.union(LayerMask::COMMON),
            _ => LayerMask::RIGHT.union(LayerMask::COMMON),
        }
    } else {
        LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON])
    }
}

/// Per-frame hook rule: for a camera flagged left, only the left plane shows;
/// symmetric for right; any other camera sees both.
pub fn eye_exclusive_visibility(camera_eye: Option<Eye>) -> (bool, bool) {
    match camera_eye {
        Some(Eye::Left) => (true, false),
        Some(Eye::Right) => (false, true),
        None => (true, true),
    }
}

/// Desktop overlays both images half-transparent for see-through alignment;
/// in a session each eye is naturally separated, so full opacity.
pub fn plane_opacity(session_active: bool, desktop_opacity: f32) -> f32 {
    if session_active {
        1.0
    } else {
        desktop_opacity
    }
}

pub struct SessionPlugin;
impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewSettings>()
            .init_resource::<EyeStates>()
            .init_resource::<EmulatedDevice>()
            .init_resource::<StatusLine>()
            .add_event::<SessionRequest>()
            .add_event::<RecenterEvent>()
            .add_systems(OnEnter(SessionMode::InSession), begin_session)
            .add_systems(OnExit(SessionMode::InSession), end_session)
            .add_systems(
                Update,
                (
                    handle_session_request,
                    resolve_session_entry.run_if(in_state(SessionMode::Entering)),
                    handle_recenter.run_if(in_state(SessionMode::InSession)),
                    apply_controller_visibility,
                ),
            )
            .add_systems(
                Update,
                (
                    apply_plane_placement,
                    enforce_eye_exclusivity.run_if(resource_exists::<EyeVisibilityHook>),
                )
                    .chain(),
            );
    }
}

fn handle_session_request(
    mut requests: EventReader<SessionRequest>,
    mode: Res<State<SessionMode>>,
    mut next: ResMut<NextState<SessionMode>>,
    mut status: ResMut<StatusLine>,
) {
    for request in requests.read() {
        match (request.enter, mode.get()) {
            (true, SessionMode::Desktop) => {
                status.0 = "Requesting session...".into();
                next.set(SessionMode::Entering);
            }
            (false, SessionMode::InSession) => {
                next.set(SessionMode::Desktop);
            }
            _ => {}
        }
    }
}

/// Resolves the pending request as a two-outcome result: either the device
/// admits a session or the request fails into a status message with no
/// state-machine transition.
fn resolve_session_entry(
    device: Res<EmulatedDevice>,
    mut next: ResMut<NextState<SessionMode>>,
    mut status: ResMut<StatusLine>,
) {
    match device.rig_cameras() {
        Some(_) => next.set(SessionMode::InSession),
        None => {
            status.0 = "Stereo session unsupported on this device".into();
            next.set(SessionMode::Desktop);
        }
    }
}

const RIG_IPD_HALF: f32 = 0.032;

fn begin_session(
    mut commands: Commands,
    device: Res<EmulatedDevice>,
    settings: Res<ViewSettings>,
    windows: Query<&Window>,
    mut main_camera: Query<&mut Camera, With<MainCamera>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut status: ResMut<StatusLine>,
) {
    let count = device.rig_cameras().unwrap_or(1).max(1);

    if let Ok(mut camera) = main_camera.get_single_mut() {
        camera.is_active = false;
    }

    let (width, height) = windows
        .get_single()
        .map(|w| (w.physical_width(), w.physical_height()))
        .unwrap_or((1280, 720));

    for index in 0..count {
        let mask = rig_camera_mask(index, count);
        let eye = if count >= 2 {
            Some(if index == 0 { Eye::Left } else { Eye::Right })
        } else {
            None
        };
        let viewport = if count >= 2 {
            Viewport {
                physical_position: UVec2::new(index as u32 * width / 2, 0),
                physical_size: UVec2::new((width / 2).max(1), height.max(1)),
                ..default()
            }
        } else {
            Viewport {
                physical_position: UVec2::ZERO,
                physical_size: UVec2::new(width.max(1), height.max(1)),
                ..default()
            }
        };
        let x = match eye {
            Some(Eye::Left) => -RIG_IPD_HALF,
            Some(Eye::Right) => RIG_IPD_HALF,
            None => 0.0,
        };
        commands.spawn((
            Camera3dBundle {
                camera: Camera {
                    order: 1 + index as isize,
                    viewport: Some(viewport),
                    ..default()
                },
                transform: Transform::from_xyz(x, 0.0, 0.0),
                ..default()
            },
            RigCamera { eye, index },
            mask,
            mask.to_render_layers(),
        ));
    }

    // Simple hand markers on the common mask, toggled from the settings.
    let hand_mesh = meshes.add(Cuboid::new(0.03, 0.03, 0.1));
    let hand_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.7, 0.7, 0.75),
        unlit: true,
        ..default()
    });
    for side in [-1.0, 1.0] {
        commands.spawn((
            PbrBundle {
                mesh: hand_mesh.clone(),
                material: hand_material.clone(),
                transform: Transform::from_xyz(0.15 * side, -0.25, -0.4),
                visibility: if settings.show_controllers {
                    Visibility::Inherited
                } else {
                    Visibility::Hidden
                },
                ..default()
            },
            ControllerVisual,
            LayerMask::COMMON,
            LayerMask::COMMON.to_render_layers(),
        ));
    }

    commands.insert_resource(EyeVisibilityHook);
    status.0 = format!("Session started ({} rig camera{})", count, if count == 1 { "" } else { "s" });
    debug!("session begin: {} rig cameras", count);
}

fn end_session(
    mut commands: Commands,
    rig_entities: Query<Entity, Or<(With<RigCamera>, With<ControllerVisual>)>>,
    mut main_camera: Query<&mut Camera, With<MainCamera>>,
    mut status: ResMut<StatusLine>,
) {
    for entity in &rig_entities {
        commands.entity(entity).despawn_recursive();
    }
    if let Ok(mut camera) = main_camera.get_single_mut() {
        camera.is_active = true;
    }
    commands.remove_resource::<EyeVisibilityHook>();
    status.0 = "Session ended".into();
    debug!("session end");
}

fn handle_recenter(
    mut events: EventReader<RecenterEvent>,
    mut eyes: ResMut<EyeStates>,
    mut status: ResMut<StatusLine>,
) {
    if events.read().next().is_some() {
        eyes.reset_all();
        status.0 = "Recentered".into();
    }
}

/// Re-applies the full placement mapping every frame: parent, transform and
/// mask per plane from the pure rule. Despawned rig parents never dangle
/// because the anchor is resolved against the live camera query.
fn apply_plane_placement(
    mut commands: Commands,
    mode: Res<State<SessionMode>>,
    settings: Res<ViewSettings>,
    eyes: Res<EyeStates>,
    rig_cameras: Query<(Entity, &RigCamera)>,
    mut planes: Query<(
        Entity,
        &EyePlane,
        &mut Transform,
        &mut LayerMask,
        &mut RenderLayers,
        Option<&Parent>,
    )>,
) {
    let ctx = SessionContext {
        session_active: *mode.get() == SessionMode::InSession,
        head_locked: settings.head_locked,
        show_both_eyes: settings.show_both_eyes,
        rig_camera_count: rig_cameras.iter().count(),
    };

    for (entity, plane, mut transform, mut mask, mut layers, parent) in &mut planes {
        let placement = place_plane(plane.eye, &ctx, eyes.get(plane.eye));

        let target_parent = match placement.anchor {
            PlaneAnchor::World => None,
            PlaneAnchor::Rig(index) => rig_cameras
                .iter()
                .find(|(_, rig)| rig.index == index)
                .map(|(e, _)| e),
            PlaneAnchor::SessionCamera => rig_cameras.iter().next().map(|(e, _)| e),
        };
        if parent.map(|p| p.get()) != target_parent {
            match target_parent {
                Some(p) => {
                    commands.entity(entity).set_parent(p);
                }
                None => {
                    commands.entity(entity).remove_parent();
                }
            }
        }

        *transform = plane_transform(&placement, settings.image_size);
        if *mask != placement.mask {
            *mask = placement.mask;
            *layers = placement.mask.to_render_layers();
        }
    }
}

/// Logical state keeps `position.z` as distance ahead; the renderer looks
/// down -Z, so the apply step owns the sign flip.
fn plane_transform(placement: &PlanePlacement, image_size: f32) -> Transform {
    Transform {
        translation: Vec3::new(
            placement.position.x,
            placement.position.y,
            -placement.position.z,
        ),
        rotation: Quat::from_euler(
            EulerRot::XYZ,
            placement.rotation.x,
            placement.rotation.y,
            placement.rotation.z,
        ),
        scale: Vec3::splat(image_size),
    }
}

/// Per-frame exclusivity pass, active only while the hook resource exists.
/// Planes whose mask already isolates one eye are left alone; shared-mask
/// planes get their render layers narrowed to the cameras allowed to draw
/// them this frame.
fn enforce_eye_exclusivity(
    settings: Res<ViewSettings>,
    cameras: Query<&RigCamera>,
    mut planes: Query<(&EyePlane, &LayerMask, &mut RenderLayers)>,
) {
    if settings.show_both_eyes {
        return;
    }
    for (plane, mask, mut layers) in &mut planes {
        if mask.intersects(LayerMask::LEFT) != mask.intersects(LayerMask::RIGHT) {
            continue;
        }
        let mut visible_to = LayerMask::NONE;
        for rig in &cameras {
            let (left, right) = eye_exclusive_visibility(rig.eye);
            let shown = match plane.eye {
                Eye::Left => left,
                Eye::Right => right,
            };
            if shown {
                let bit = match rig.eye {
                    Some(camera_eye) => camera_eye.mask(),
                    None => plane.eye.mask(),
                };
                visible_to = visible_to.union(bit);
            }
        }
        *layers = visible_to.to_render_layers();
    }
}

fn apply_controller_visibility(
    settings: Res<ViewSettings>,
    mut visuals: Query<&mut Visibility, With<ControllerVisual>>,
) {
    for mut visibility in &mut visuals {
        *visibility = if settings.show_controllers {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eye::{Axis, DEFAULT_IMAGE_DISTANCE};

    fn ctx(session_active: bool, rig_camera_count: usize) -> SessionContext {
        SessionContext {
            session_active,
            head_locked: true,
            show_both_eyes: false,
            rig_camera_count,
        }
    }

    #[test]
    fn desktop_planes_get_exclusive_masks_and_world_anchor() {
        let state = ImageState::default();
        let left = place_plane(Eye::Left, &ctx(false, 0), &state);
        let right = place_plane(Eye::Right, &ctx(false, 0), &state);
        assert_eq!(left.mask, LayerMask::LEFT);
        assert_eq!(right.mask, LayerMask::RIGHT);
        assert_eq!(left.anchor, PlaneAnchor::World);
        assert_eq!(right.anchor, PlaneAnchor::World);
    }

    #[test]
    fn head_locked_split_parents_each_plane_to_its_rig_camera() {
        let state = ImageState::default();
        let left = place_plane(Eye::Left, &ctx(true, 2), &state);
        let right = place_plane(Eye::Right, &ctx(true, 2), &state);
        assert_eq!(left.mask, LayerMask::COMMON);
        assert_eq!(right.mask, LayerMask::COMMON);
        assert_eq!(left.anchor, PlaneAnchor::Rig(0));
        assert_eq!(right.anchor, PlaneAnchor::Rig(1));
    }

    #[test]
    fn world_locked_split_keeps_exclusive_masks() {
        let context = SessionContext {
            head_locked: false,
            ..ctx(true, 2)
        };
        let left = place_plane(Eye::Left, &context, &ImageState::default());
        assert_eq!(left.mask, LayerMask::LEFT);
        assert_eq!(left.anchor, PlaneAnchor::World);
    }

    #[test]
    fn monoscopic_fallback_shares_the_single_session_camera() {
        for count in [0, 1] {
            let left = place_plane(Eye::Left, &ctx(true, count), &ImageState::default());
            let right = place_plane(Eye::Right, &ctx(true, count), &ImageState::default());
            assert_eq!(left.anchor, PlaneAnchor::SessionCamera);
            assert_eq!(right.anchor, PlaneAnchor::SessionCamera);
        }
    }

    #[test]
    fn dual_eye_debug_combines_all_mask_groups() {
        let context = SessionContext {
            show_both_eyes: true,
            ..ctx(true, 2)
        };
        let placement = place_plane(Eye::Left, &context, &ImageState::default());
        assert!(placement.mask.intersects(LayerMask::LEFT));
        assert!(placement.mask.intersects(LayerMask::RIGHT));
        assert!(placement.mask.intersects(LayerMask::COMMON));
    }

    #[test]
    fn rig_masks_for_a_stereo_pair() {
        assert_eq!(
            rig_camera_mask(0, 2),
            LayerMask::LEFT.union(LayerMask::COMMON)
        );
        assert_eq!(
            rig_camera_mask(1, 2),
            LayerMask::RIGHT.union(LayerMask::COMMON)
        );
    }

    #[test]
    fn lone_rig_camera_sees_everything() {
        let full = LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON]);
        assert_eq!(rig_camera_mask(0, 1), full);
        assert_eq!(rig_camera_mask(0, 0), full);
    }

    #[test]
    fn hook_isolates_flagged_cameras_only() {
        assert_eq!(eye_exclusive_visibility(Some(Eye::Left)), (true, false));
        assert_eq!(eye_exclusive_visibility(Some(Eye::Right)), (false, true));
        assert_eq!(eye_exclusive_visibility(None), (true, true));
    }

    #[test]
    fn opacity_is_full_in_session_and_partial_on_desktop() {
        assert_eq!(plane_opacity(true, 0.5), 1.0);
        assert_eq!(plane_opacity(false, 0.5), 0.5);
    }

    #[test]
    fn session_round_trip_preserves_state_unless_recentered() {
        let mut eyes = EyeStates::default();
        eyes.get_mut(Eye::Left).set_position(Axis::X, 0.04);
        eyes.get_mut(Eye::Left).set_rotation(Axis::Z, 0.1);
        let before = eyes.clone();

        // Enter with a stereo pair: shared mask, rig parents, transforms
        // passed through untouched.
        let in_session = ctx(true, 2);
        let left = place_plane(Eye::Left, &in_session, eyes.get(Eye::Left));
        assert_eq!(left.anchor, PlaneAnchor::Rig(0));
        assert_eq!(left.position, eyes.get(Eye::Left).position);
        assert_eq!(rig_camera_mask(0, 2), LayerMask::LEFT.union(LayerMask::COMMON));
        assert_eq!(rig_camera_mask(1, 2), LayerMask::RIGHT.union(LayerMask::COMMON));

        // Placement is a pure read; leaving and re-entering changes nothing.
        assert_eq!(eyes, before);
        let back = place_plane(Eye::Left, &ctx(false, 0), eyes.get(Eye::Left));
        assert_eq!(back.mask, LayerMask::LEFT);
        assert_eq!(back.position.x, 0.04);
        assert_eq!(plane_opacity(false, 0.5), 0.5);

        // Recenter is the one thing that does reset the logical state.
        eyes.reset_all();
        assert_eq!(
            eyes.get(Eye::Left).position,
            Vec3::new(0.0, 0.0, DEFAULT_IMAGE_DISTANCE)
        );
        assert_eq!(eyes.get(Eye::Left).rotation, Vec3::ZERO);
    }
}
