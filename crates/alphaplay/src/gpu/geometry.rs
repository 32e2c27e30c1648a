//! Texture layout of packed color + mask frames.
//!
//! Quad vertices are ordered top-left, top-right, bottom-left, bottom-right
//! (triangle strip). Texture coordinates use a bottom-up `v` axis because frames
//! are flipped at upload.
//!
//! Input contract: the mask must occupy the half complementary to the color half
//! along the split axis. A source that packs its mask anywhere else renders with
//! wrong alpha; nothing can detect it.

use crate::settings::{Orientation, StencilOrder};

/// Clip-space corners of the full-viewport quad.
pub const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];

const PORTRAIT_FRONT: [[f32; 2]; 4] = [[0.0, 0.5], [1.0, 0.5], [0.0, 0.0], [1.0, 0.0]];
const PORTRAIT_BACK: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.5], [1.0, 0.5]];
const LANDSCAPE_FRONT: [[f32; 2]; 4] = [[0.5, 1.0], [1.0, 1.0], [0.5, 0.0], [1.0, 0.0]];
const LANDSCAPE_BACK: [[f32; 2]; 4] = [[0.0, 1.0], [0.5, 1.0], [0.0, 0.0], [0.5, 0.0]];

/// Color sub-rectangle and the offset from a color texel to its mask texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryPreset {
    pub tex_coords: [[f32; 2]; 4],
    pub stencil_offset: [f32; 2],
}

impl GeometryPreset {
    pub fn lookup(orientation: Orientation, order: StencilOrder) -> Self {
        let (tex_coords, stencil_offset) = match (orientation, order) {
            (Orientation::Portrait, StencilOrder::Front) => (PORTRAIT_FRONT, [0.0, 0.5]),
            (Orientation::Portrait, StencilOrder::Back) => (PORTRAIT_BACK, [0.0, -0.5]),
            (Orientation::Landscape, StencilOrder::Front) => (LANDSCAPE_FRONT, [-0.5, 0.0]),
            (Orientation::Landscape, StencilOrder::Back) => (LANDSCAPE_BACK, [0.5, 0.0]),
        };
        Self {
            tex_coords,
            stencil_offset,
        }
    }

    /// Logical render size for a packed frame: the half that holds the color.
    pub fn half_size(orientation: Orientation, width: u32, height: u32) -> (u32, u32) {
        match orientation {
            Orientation::Portrait => (width, height / 2),
            Orientation::Landscape => (width / 2, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [(Orientation, StencilOrder); 4] = [
        (Orientation::Portrait, StencilOrder::Front),
        (Orientation::Portrait, StencilOrder::Back),
        (Orientation::Landscape, StencilOrder::Front),
        (Orientation::Landscape, StencilOrder::Back),
    ];

    #[test]
    fn offset_is_half_along_split_axis() {
        for (orientation, order) in ALL {
            let [dx, dy] = GeometryPreset::lookup(orientation, order).stencil_offset;
            match orientation {
                Orientation::Portrait => {
                    assert_eq!(dx, 0.0);
                    assert_eq!(dy.abs(), 0.5);
                }
                Orientation::Landscape => {
                    assert_eq!(dx.abs(), 0.5);
                    assert_eq!(dy, 0.0);
                }
            }
        }
    }

    #[test]
    fn color_covers_half_the_unit_square() {
        for (orientation, order) in ALL {
            let coords = GeometryPreset::lookup(orientation, order).tex_coords;
            let (min_u, max_u) = bounds(coords.iter().map(|c| c[0]));
            let (min_v, max_v) = bounds(coords.iter().map(|c| c[1]));
            assert_eq!((max_u - min_u) * (max_v - min_v), 0.5, "{orientation:?}/{order:?}");
        }
    }

    #[test]
    fn mask_lands_in_complementary_half() {
        for (orientation, order) in ALL {
            let preset = GeometryPreset::lookup(orientation, order);
            for [u, v] in preset.tex_coords {
                let mu = u + preset.stencil_offset[0];
                let mv = v + preset.stencil_offset[1];
                assert!((0.0..=1.0).contains(&mu) && (0.0..=1.0).contains(&mv));
            }
            let color = preset.tex_coords[0];
            let mask = [
                color[0] + preset.stencil_offset[0],
                color[1] + preset.stencil_offset[1],
            ];
            assert_ne!(color, mask);
        }
    }

    #[test]
    fn quad_winding_matches_texture_corners() {
        // Left corners sample the smaller u, top corners the larger v.
        for (orientation, order) in ALL {
            let c = GeometryPreset::lookup(orientation, order).tex_coords;
            assert!(c[0][0] < c[1][0] && c[2][0] < c[3][0]);
            assert!(c[0][1] > c[2][1] && c[1][1] > c[3][1]);
        }
    }

    #[test]
    fn back_mask_follows_color_in_frame_order() {
        // Portrait back: color on top (v upper half), mask below.
        let p = GeometryPreset::lookup(Orientation::Portrait, StencilOrder::Back);
        assert_eq!(p.tex_coords[2][1], 0.5);
        assert!(p.stencil_offset[1] < 0.0);
        // Landscape back: color left, mask right.
        let l = GeometryPreset::lookup(Orientation::Landscape, StencilOrder::Back);
        assert_eq!(l.tex_coords[1][0], 0.5);
        assert!(l.stencil_offset[0] > 0.0);
    }

    #[test]
    fn half_size_follows_orientation() {
        assert_eq!(GeometryPreset::half_size(Orientation::Portrait, 720, 2560), (720, 1280));
        assert_eq!(GeometryPreset::half_size(Orientation::Landscape, 1920, 540), (960, 540));
    }

    fn bounds(values: impl Iterator<Item = f32>) -> (f32, f32) {
        values.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }
}
