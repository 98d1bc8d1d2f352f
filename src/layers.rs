use bevy::prelude::*;
use bevy::render::view::RenderLayers;

/// Visibility bitmask shared by cameras and meshes. A mesh is drawn by a
/// camera iff the two masks intersect. The upper bits isolate eye-specific
/// content; everything else lives in the common region.
#[derive(Component, Clone, Copy, PartialEq, Eq, Debug)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const LEFT: LayerMask = LayerMask(0x1000_0000);
    pub const RIGHT: LayerMask = LayerMask(0x2000_0000);
    /// All lower 28 bits: content visible to every camera.
    pub const COMMON: LayerMask = LayerMask(0x0FFF_FFFF);

    pub const fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }

    pub fn combine(masks: &[LayerMask]) -> LayerMask {
        masks.iter().fold(LayerMask::NONE, |acc, m| acc.union(*m))
    }

    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Bit i of the mask maps to render layer i, so the renderer enforces
    /// the same mesh-and-camera intersection contract.
    pub fn to_render_layers(self) -> RenderLayers {
        (0..32usize)
            .filter(|bit| self.0 & (1u32 << bit) != 0)
            .fold(RenderLayers::none(), |layers, bit| layers.with(bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_mask_covers_all_groups() {
        let m = LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON]);
        assert!(m.intersects(LayerMask::LEFT));
        assert!(m.intersects(LayerMask::RIGHT));
        assert!(m.intersects(LayerMask::COMMON));
    }

    #[test]
    fn eye_bits_are_exclusive() {
        assert!(!LayerMask::LEFT.intersects(LayerMask::RIGHT));
        assert!(!LayerMask::LEFT.intersects(LayerMask::COMMON));
        assert!(!LayerMask::RIGHT.intersects(LayerMask::COMMON));
    }

    #[test]
    fn visibility_contract_is_mask_intersection() {
        let left_mesh = LayerMask::LEFT;
        let left_camera = LayerMask::LEFT.union(LayerMask::COMMON);
        let right_camera = LayerMask::RIGHT.union(LayerMask::COMMON);
        assert!(left_mesh.intersects(left_camera));
        assert!(!left_mesh.intersects(right_camera));
    }

    #[test]
    fn render_layers_mirror_mask_bits() {
        let left = LayerMask::LEFT.to_render_layers();
        let right = LayerMask::RIGHT.to_render_layers();
        assert!(left.intersects(&RenderLayers::layer(28)));
        assert!(right.intersects(&RenderLayers::layer(29)));
        assert!(!left.intersects(&right));
        let common = LayerMask::COMMON.to_render_layers();
        assert!(common.intersects(&RenderLayers::layer(0)));
        assert!(!common.intersects(&RenderLayers::layer(28)));
    }

    #[test]
    fn none_mask_hides_from_everything() {
        let all = LayerMask::combine(&[LayerMask::LEFT, LayerMask::RIGHT, LayerMask::COMMON]);
        assert!(!LayerMask::NONE.intersects(all));
    }
}
