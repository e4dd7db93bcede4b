//! Colour maps for single-channel cutouts

use serde::{Deserialize, Serialize};

/// Viridis sampled at nine evenly spaced stops from 0 to 1
const VIRIDIS_STOPS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [72, 40, 120],
    [62, 73, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [110, 206, 88],
    [253, 231, 37],
];

/// How a normalised single-channel sample becomes a colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Gray,
}

impl Colormap {
    /// Colour of a sample already scaled to `0..=1`
    pub fn rgb(self, t: f32) -> [u8; 3] {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            Colormap::Gray => {
                let v = (t * 255.0).round() as u8;
                [v, v, v]
            }
            Colormap::Viridis => {
                let pos = t * (VIRIDIS_STOPS.len() - 1) as f32;
                let lo = (pos.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
                let frac = pos - lo as f32;
                let (a, b) = (VIRIDIS_STOPS[lo], VIRIDIS_STOPS[lo + 1]);
                let mix = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * frac).round() as u8;
                [mix(0), mix(1), mix(2)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(Colormap::Viridis.rgb(0.0), [68, 1, 84]);
        assert_eq!(Colormap::Viridis.rgb(1.0), [253, 231, 37]);
        assert_eq!(Colormap::Viridis.rgb(0.5), [38, 130, 142]);
        assert_eq!(Colormap::Viridis.rgb(f32::NAN), [68, 1, 84]);
    }

    #[test]
    fn test_gray() {
        assert_eq!(Colormap::Gray.rgb(0.5), [128, 128, 128]);
        assert_eq!(Colormap::Gray.rgb(2.0), [255, 255, 255]);
    }
}
