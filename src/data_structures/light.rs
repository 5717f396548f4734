//! Scene lights and their GPU representation.

use cgmath::Vector3;

use super::material::hex_to_linear;

/// The renderer shades with at most this many non-ambient lights.
pub const MAX_LIGHTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vector3<f32>,
    },
    /// `range` of zero means no falloff limit.
    Point {
        color: [f32; 3],
        intensity: f32,
        range: f32,
        position: Vector3<f32>,
    },
    /// Sky/ground gradient picked by how much a normal faces `position`.
    Hemisphere {
        sky: [f32; 3],
        ground: [f32; 3],
        intensity: f32,
        position: Vector3<f32>,
    },
}

impl Light {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Light::Ambient {
            color: hex_to_linear(hex),
            intensity,
        }
    }

    pub fn directional(hex: u32, intensity: f32, position: [f32; 3]) -> Self {
        Light::Directional {
            color: hex_to_linear(hex),
            intensity,
            position: position.into(),
        }
    }

    pub fn point(hex: u32, intensity: f32, range: f32, position: [f32; 3]) -> Self {
        Light::Point {
            color: hex_to_linear(hex),
            intensity,
            range,
            position: position.into(),
        }
    }

    pub fn hemisphere(sky: u32, ground: u32, intensity: f32, position: [f32; 3]) -> Self {
        Light::Hemisphere {
            sky: hex_to_linear(sky),
            ground: hex_to_linear(ground),
            intensity,
            position: position.into(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRaw {
    /// xyz position or direction, w kind (1 directional, 2 point, 3 hemisphere).
    position: [f32; 4],
    /// rgb premultiplied by intensity, w range.
    color: [f32; 4],
    /// Hemisphere ground colour.
    ground: [f32; 4],
}

/// Uniform block holding every light of a scene.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    ambient: [f32; 4],
    count: [u32; 4],
    lights: [LightRaw; MAX_LIGHTS],
}

impl LightsUniform {
    pub fn from_lights(lights: &[Light]) -> Self {
        let mut uniform = LightsUniform {
            ambient: [0.0; 4],
            count: [0; 4],
            lights: [LightRaw::default(); MAX_LIGHTS],
        };
        let mut used = 0;
        for light in lights {
            let scale = |c: [f32; 3], i: f32| [c[0] * i, c[1] * i, c[2] * i];
            let raw = match *light {
                Light::Ambient { color, intensity } => {
                    let [r, g, b] = scale(color, intensity);
                    uniform.ambient[0] += r;
                    uniform.ambient[1] += g;
                    uniform.ambient[2] += b;
                    continue;
                }
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => LightRaw {
                    position: position.extend(1.0).into(),
                    color: rgb_w(scale(color, intensity), 0.0),
                    ground: [0.0; 4],
                },
                Light::Point {
                    color,
                    intensity,
                    range,
                    position,
                } => LightRaw {
                    position: position.extend(2.0).into(),
                    color: rgb_w(scale(color, intensity), range),
                    ground: [0.0; 4],
                },
                Light::Hemisphere {
                    sky,
                    ground,
                    intensity,
                    position,
                } => LightRaw {
                    position: position.extend(3.0).into(),
                    color: rgb_w(scale(sky, intensity), 0.0),
                    ground: rgb_w(scale(ground, intensity), 0.0),
                },
            };
            if used == MAX_LIGHTS {
                log::warn!("only {} lights are supported, ignoring the rest", MAX_LIGHTS);
                break;
            }
            uniform.lights[used] = raw;
            used += 1;
        }
        uniform.count[0] = used as u32;
        uniform
    }

    pub fn count(&self) -> u32 {
        self.count[0]
    }

    pub fn ambient(&self) -> [f32; 3] {
        [self.ambient[0], self.ambient[1], self.ambient[2]]
    }
}

fn rgb_w(rgb: [f32; 3], w: f32) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], w]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_lights_are_summed_and_not_counted() {
        let uniform = LightsUniform::from_lights(&[
            Light::ambient(0xffffff, 1.2),
            Light::directional(0xffffff, 4.0, [3.0, 3.0, 3.0]),
            Light::point(0xffffff, 10.0, 10.0, [-2.0, 2.0, 2.0]),
        ]);
        assert_eq!(uniform.count(), 2);
        assert_eq!(uniform.ambient(), [1.2, 1.2, 1.2]);
    }

    #[test]
    fn extra_lights_are_dropped() {
        let lights = vec![Light::directional(0xffffff, 1.0, [0.0, 1.0, 0.0]); MAX_LIGHTS + 2];
        assert_eq!(LightsUniform::from_lights(&lights).count(), MAX_LIGHTS as u32);
    }
}
