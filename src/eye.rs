use bevy::prelude::*;

use crate::layers::LayerMask;

/// Default distance of each image plane ahead of the viewer, in meters.
pub const DEFAULT_IMAGE_DISTANCE: f32 = 2.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    pub fn mask(self) -> LayerMask {
        match self {
            Eye::Left => LayerMask::LEFT,
            Eye::Right => LayerMask::RIGHT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Eye::Left => "Left",
            Eye::Right => "Right",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Logical transform of one eye's image, independent of rendering.
/// Position is meters, rotation is radians; `position.z` is the distance
/// ahead of the viewer. Ranges are not validated here, sliders clamp.
#[derive(Clone, PartialEq, Debug)]
pub struct ImageState {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Default for ImageState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, DEFAULT_IMAGE_DISTANCE),
            rotation: Vec3::ZERO,
        }
    }
}

impl ImageState {
    pub fn set_position(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.position.x = value,
            Axis::Y => self.position.y = value,
            Axis::Z => self.position.z = value,
        }
    }

    pub fn set_rotation(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.rotation.x = value,
            Axis::Y => self.rotation.y = value,
            Axis::Z => self.rotation.z = value,
        }
    }

    /// Whole-struct assignment so position and rotation restore together.
    pub fn reset(&mut self, to: &ImageState) {
        *self = to.clone();
    }
}

#[derive(Resource, Clone, PartialEq, Debug, Default)]
pub struct EyeStates {
    pub left: ImageState,
    pub right: ImageState,
}

impl EyeStates {
    pub fn get(&self, eye: Eye) -> &ImageState {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, eye: Eye) -> &mut ImageState {
        match eye {
            Eye::Left => &mut self.left,
            Eye::Right => &mut self.right,
        }
    }

    pub fn reset_all(&mut self) {
        let default = ImageState::default();
        self.left.reset(&default);
        self.right.reset(&default);
    }
}

/// Lateral offset in meters to prism diopters at the given viewing distance.
/// Display-unit conversion only; stored state is always meters/radians.
pub fn meters_to_diopters(meters: f32, viewing_distance: f32) -> f32 {
    meters * 100.0 / viewing_distance
}

pub fn diopters_to_meters(diopters: f32, viewing_distance: f32) -> f32 {
    diopters * viewing_distance / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diopter_conversion_round_trips() {
        let vd = 2.0;
        for m in [-0.5, -0.04, 0.0, 0.013, 0.2, 1.5] {
            assert_relative_eq!(
                diopters_to_meters(meters_to_diopters(m, vd), vd),
                m,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn diopter_scale_matches_definition() {
        // 1 prism diopter = 1 cm displacement at 1 m.
        assert_relative_eq!(meters_to_diopters(0.01, 1.0), 1.0);
        assert_relative_eq!(meters_to_diopters(0.04, 2.0), 2.0);
    }

    #[test]
    fn set_position_touches_only_one_axis() {
        let mut state = ImageState::default();
        state.set_position(Axis::X, 0.25);
        assert_eq!(state.position, Vec3::new(0.25, 0.0, DEFAULT_IMAGE_DISTANCE));
        state.set_rotation(Axis::Z, 0.1);
        assert_eq!(state.rotation, Vec3::new(0.0, 0.0, 0.1));
    }

    #[test]
    fn reset_restores_position_and_rotation_together() {
        let mut state = ImageState::default();
        state.set_position(Axis::Y, -0.3);
        state.set_rotation(Axis::X, 1.0);
        state.reset(&ImageState::default());
        assert_eq!(state, ImageState::default());
    }

    #[test]
    fn reset_all_returns_both_eyes_to_defaults() {
        let mut eyes = EyeStates::default();
        eyes.get_mut(Eye::Left).set_position(Axis::X, 0.1);
        eyes.get_mut(Eye::Right).set_rotation(Axis::Z, -0.2);
        eyes.reset_all();
        assert_eq!(eyes, EyeStates::default());
        assert_eq!(
            eyes.get(Eye::Left).position,
            Vec3::new(0.0, 0.0, DEFAULT_IMAGE_DISTANCE)
        );
    }
}
