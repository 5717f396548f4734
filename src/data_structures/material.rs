//! Surface materials.
//!
//! Two shading models are supported: unlit (`Basic`) and a simple metal/roughness
//! model (`Standard`). Colours are given as `0xRRGGBB` in sRGB and converted to
//! linear once here.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shading {
    Basic,
    Standard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub shading: Shading,
    /// Linear RGB.
    pub color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub side: Side,
    pub wireframe: bool,
}

impl Material {
    pub fn basic(hex: u32) -> Self {
        Self {
            shading: Shading::Basic,
            color: hex_to_linear(hex),
            metalness: 0.0,
            roughness: 1.0,
            side: Side::Front,
            wireframe: false,
        }
    }

    pub fn standard(hex: u32, metalness: f32, roughness: f32) -> Self {
        Self::standard_linear(hex_to_linear(hex), metalness, roughness)
    }

    pub fn standard_linear(color: [f32; 3], metalness: f32, roughness: f32) -> Self {
        Self {
            shading: Shading::Standard,
            color,
            metalness: metalness.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            side: Side::Front,
            wireframe: false,
        }
    }

    pub fn double_sided(mut self) -> Self {
        self.side = Side::Double;
        self
    }

    pub fn wireframe(mut self) -> Self {
        self.wireframe = true;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::standard(0xffffff, 0.0, 1.0)
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts `0xRRGGBB` to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_are_linearised() {
        assert_eq!(hex_to_linear(0xffffff), [1.0, 1.0, 1.0]);
        assert_eq!(hex_to_linear(0x000000), [0.0, 0.0, 0.0]);
        let [r, g, b] = hex_to_linear(0xffa700);
        assert_eq!(r, 1.0);
        assert!(g > 0.37 && g < 0.40, "{}", g);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn builder_flags() {
        let ring = Material::standard(0x00ffcc, 0.2, 0.6).double_sided().wireframe();
        assert_eq!(ring.side, Side::Double);
        assert!(ring.wireframe);
        assert_eq!(Material::basic(0xffffff).shading, Shading::Basic);
        assert_eq!(Material::standard(0, 2.0, -1.0).metalness, 1.0);
    }
}
