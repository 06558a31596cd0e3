//! RGBA color type for material values.
//!
//! [`Color`] is a plain 4-float RGBA value with a C-compatible layout so it
//! can be packed directly into GPU-visible buffers. The graphics crate treats
//! it as a 4-float vector, with an RGB-only special case when a shader slot
//! declares exactly three floats.

/// An RGBA color with f32 components.
///
/// Components are not clamped; HDR values are allowed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha component.
    pub a: f32,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    /// Opaque black.
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    /// Create a color from RGBA components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color from RGB components.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// The color as an `[r, g, b, a]` array.
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// The RGB components as an `[r, g, b]` array, dropping alpha.
    pub const fn rgb_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 4]> for Color {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        c.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_is_opaque() {
        let c = Color::rgb(0.25, 0.5, 0.75);
        assert_eq!(c.a, 1.0);
        assert_eq!(c.rgb_array(), [0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_array_round_trip() {
        let c = Color::new(0.1, 0.2, 0.3, 0.4);
        let arr: [f32; 4] = c.into();
        assert_eq!(Color::from(arr), c);
    }

    #[test]
    fn test_byte_layout() {
        let c = Color::new(1.0, 0.0, 0.0, 1.0);
        let bytes: &[u8] = bytemuck::bytes_of(&c);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }
}
