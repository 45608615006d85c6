use serde::{Deserialize, Serialize};

/// Colormaps for heatmap rendering.
///
/// Each map is a table of evenly spaced RGB stops with linear interpolation
/// in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Diverging dark blue → white → dark red; zero maps to white.
    #[default]
    Seismic,
    Grayscale,
    Viridis,
    Inferno,
}

const SEISMIC: [[f32; 3]; 5] = [
    [0.0, 0.0, 76.0],
    [0.0, 0.0, 255.0],
    [255.0, 255.0, 255.0],
    [255.0, 0.0, 0.0],
    [128.0, 0.0, 0.0],
];

const GRAYSCALE: [[f32; 3]; 2] = [[0.0, 0.0, 0.0], [255.0, 255.0, 255.0]];

const VIRIDIS: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [49.0, 54.0, 149.0],
    [53.0, 183.0, 121.0],
    [180.0, 222.0, 44.0],
    [253.0, 231.0, 37.0],
];

const INFERNO: [[f32; 3]; 5] = [
    [0.0, 0.0, 4.0],
    [87.0, 16.0, 110.0],
    [188.0, 55.0, 84.0],
    [249.0, 142.0, 9.0],
    [252.0, 255.0, 164.0],
];

impl Colormap {
    pub const ALL: [Colormap; 4] = [
        Colormap::Seismic,
        Colormap::Grayscale,
        Colormap::Viridis,
        Colormap::Inferno,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Colormap::Seismic => "seismic",
            Colormap::Grayscale => "grayscale",
            Colormap::Viridis => "viridis",
            Colormap::Inferno => "inferno",
        }
    }

    fn stops(&self) -> &'static [[f32; 3]] {
        match self {
            Colormap::Seismic => &SEISMIC,
            Colormap::Grayscale => &GRAYSCALE,
            Colormap::Viridis => &VIRIDIS,
            Colormap::Inferno => &INFERNO,
        }
    }

    /// Map a normalized value [0, 1] to RGB color. NaN maps to the lowest stop.
    pub fn map(&self, t: f32) -> [u8; 3] {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        let segments = (stops.len() - 1) as f32;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(stops.len() - 2);
        let s = pos - i as f32;

        let (lo, hi) = (stops[i], stops[i + 1]);
        let mut rgb = [0u8; 3];
        for (k, channel) in rgb.iter_mut().enumerate() {
            *channel = (lo[k] + s * (hi[k] - lo[k])).round() as u8;
        }
        rgb
    }

    /// Generate a 256-entry lookup table for fast colormap application.
    pub fn generate_lut(&self) -> [[u8; 3]; 256] {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = self.map(i as f32 / 255.0);
        }
        lut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seismic_is_white_at_zero() {
        assert_eq!(Colormap::Seismic.map(0.5), [255, 255, 255]);
        assert_eq!(Colormap::Seismic.map(0.0), [0, 0, 76]);
        assert_eq!(Colormap::Seismic.map(1.0), [128, 0, 0]);
    }

    #[test]
    fn test_endpoints_and_clamping() {
        for cmap in Colormap::ALL {
            let stops = cmap.stops();
            let last = stops[stops.len() - 1];
            let expected = [last[0] as u8, last[1] as u8, last[2] as u8];
            assert_eq!(cmap.map(2.0), expected, "{}", cmap.name());
            assert_eq!(cmap.map(f32::NAN), cmap.map(0.0));
        }
        assert_eq!(Colormap::Grayscale.map(0.5), [128, 128, 128]);
    }

    #[test]
    fn test_lut_matches_map() {
        let lut = Colormap::Viridis.generate_lut();
        assert_eq!(lut[0], Colormap::Viridis.map(0.0));
        assert_eq!(lut[255], Colormap::Viridis.map(1.0));
    }
}
