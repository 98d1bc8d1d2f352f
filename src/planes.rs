use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};

use crate::eye::Eye;
use crate::session::{plane_opacity, EyePlane, SessionMode, ViewSettings};

/// Procedural dichoptic test patterns; no asset files involved.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ImageSet {
    #[default]
    Grid,
    Rings,
    Cross,
}

impl ImageSet {
    pub fn label(self) -> &'static str {
        match self {
            ImageSet::Grid => "Grid",
            ImageSet::Rings => "Rings",
            ImageSet::Cross => "Cross",
        }
    }
}

pub struct PlanesPlugin;
impl Plugin for PlanesPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_eye_planes)
            .add_systems(Update, (apply_opacity, refresh_patterns));
    }
}

fn spawn_eye_planes(
    mut commands: Commands,
    settings: Res<ViewSettings>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    let quad = meshes.add(Rectangle::new(1.0, 1.0));
    for eye in [Eye::Left, Eye::Right] {
        let image = images.add(pattern_image(settings.image_set, eye));
        let material = materials.add(StandardMaterial {
            base_color: Color::srgba(1.0, 1.0, 1.0, settings.desktop_opacity),
            base_color_texture: Some(image),
            unlit: true,
            alpha_mode: AlphaMode::Blend,
            ..default()
        });
        commands.spawn((
            PbrBundle {
                mesh: quad.clone(),
                material,
                transform: Transform::from_xyz(0.0, 0.0, -2.0),
                ..default()
            },
            EyePlane { eye },
            eye.mask(),
            eye.mask().to_render_layers(),
        ));
    }
}

fn apply_opacity(
    mode: Res<State<SessionMode>>,
    settings: Res<ViewSettings>,
    planes: Query<&Handle<StandardMaterial>, With<EyePlane>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let alpha = plane_opacity(*mode.get() == SessionMode::InSession, settings.desktop_opacity);
    for handle in &planes {
        if let Some(material) = materials.get_mut(handle) {
            if (material.base_color.alpha() - alpha).abs() > f32::EPSILON {
                material.base_color.set_alpha(alpha);
            }
        }
    }
}

/// Regenerates both planes' textures in place when the image set changes.
fn refresh_patterns(
    settings: Res<ViewSettings>,
    mut current: Local<Option<ImageSet>>,
    planes: Query<(&EyePlane, &Handle<StandardMaterial>)>,
    materials: Res<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    if *current == Some(settings.image_set) {
        return;
    }
    *current = Some(settings.image_set);
    for (plane, handle) in &planes {
        let Some(material) = materials.get(handle) else {
            continue;
        };
        if let Some(texture) = &material.base_color_texture {
            images.insert(texture.id(), pattern_image(settings.image_set, plane.eye));
        }
    }
}

const PATTERN_SIZE: u32 = 256;

/// Per-eye tint keeps the overlaid desktop view readable at half opacity.
fn eye_tint(eye: Eye) -> [u8; 3] {
    match eye {
        Eye::Left => [40, 180, 255],
        Eye::Right => [255, 120, 40],
    }
}

fn pattern_image(set: ImageSet, eye: Eye) -> Image {
    let [r, g, b] = eye_tint(eye);
    let mut data = vec![0u8; (PATTERN_SIZE * PATTERN_SIZE * 4) as usize];
    let center = (PATTERN_SIZE / 2) as i32;
    for y in 0..PATTERN_SIZE {
        for x in 0..PATTERN_SIZE {
            let on = match set {
                ImageSet::Grid => x % 32 < 2 || y % 32 < 2,
                ImageSet::Rings => {
                    let dx = x as f32 - center as f32 + 0.5;
                    let dy = y as f32 - center as f32 + 0.5;
                    ((dx * dx + dy * dy).sqrt() as u32) % 24 < 3
                }
                ImageSet::Cross => {
                    (x as i32 - center).unsigned_abs() < 4
                        || (y as i32 - center).unsigned_abs() < 4
                }
            };
            if on {
                let i = ((y * PATTERN_SIZE + x) * 4) as usize;
                data[i..i + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }
    }
    Image::new(
        Extent3d {
            width: PATTERN_SIZE,
            height: PATTERN_SIZE,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(image: &Image, x: u32, y: u32) -> u8 {
        image.data[((y * PATTERN_SIZE + x) * 4 + 3) as usize]
    }

    #[test]
    fn grid_pattern_draws_lines_on_transparent_ground() {
        let image = pattern_image(ImageSet::Grid, Eye::Left);
        assert_eq!(alpha_at(&image, 0, 0), 255);
        assert_eq!(alpha_at(&image, 16, 16), 0);
    }

    #[test]
    fn cross_pattern_is_opaque_at_the_center() {
        for eye in [Eye::Left, Eye::Right] {
            let image = pattern_image(ImageSet::Cross, eye);
            assert_eq!(alpha_at(&image, PATTERN_SIZE / 2, PATTERN_SIZE / 2), 255);
            assert_eq!(alpha_at(&image, 4, 4), 0);
        }
    }

    #[test]
    fn eyes_use_distinct_tints() {
        assert_ne!(eye_tint(Eye::Left), eye_tint(Eye::Right));
    }
}
