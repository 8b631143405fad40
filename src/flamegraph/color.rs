//! Colour schemes: map a frame name and a heat ratio in `[0, 1]` to an RGB
//! string. All schemes are deterministic; the same frame gets the same
//! colour across runs and across graphs.

use std::hash::Hasher;

use fnv::FnvHasher;
use log::warn;

/// Fixed near-white for the synthetic root; applied by the renderer, not by
/// any scheme.
pub const ROOT_COLOR: &str = "rgb(250,250,250)";

/// Neutral grey for the literal separator frames `--` and `-`; also a
/// renderer override.
pub const SEPARATOR_COLOR: &str = "rgb(240,240,240)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Hot,
    Mem,
    Io,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::Hot
    }
}

impl Palette {
    /// Resolve a scheme tag. Unknown tags fall back to `hot`.
    pub fn from_tag(tag: &str) -> Palette {
        match tag {
            "hot" => Palette::Hot,
            "mem" => Palette::Mem,
            "io" => Palette::Io,
            unknown => {
                warn!("unknown color scheme {:?}, falling back to hot", unknown);
                Palette::Hot
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Palette::Hot => "hot",
            Palette::Mem => "mem",
            Palette::Io => "io",
        }
    }

    pub fn color(&self, name: &str, heat_ratio: f64) -> String {
        let (v1, v2, v3) = mix(name, heat_ratio);

        macro_rules! t {
            ($base:expr, $scale:expr, $x:expr) => {
                $base + ($scale as f32 * $x) as u8
            };
        }

        let (r, g, b) = match self {
            Palette::Hot => (t!(205, 50, v3), t!(0, 230, v1), t!(0, 55, v2)),
            Palette::Mem => (t!(0, 0, v3), t!(190, 50, v2), t!(0, 210, v1)),
            Palette::Io => (t!(80, 60, v1), t!(80, 60, v1), t!(190, 55, v2)),
        };
        format!("rgb({},{},{})", r, g, b)
    }
}

impl std::str::FromStr for Palette {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Palette::from_tag(s))
    }
}

// Mix the frame name with the heat ratio and split the result into three
// component weights in [0, 1].
fn mix(name: &str, heat_ratio: f64) -> (f32, f32, f32) {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    hasher.write_u64(heat_ratio.to_bits());
    let hash = hasher.finish();

    let v1 = (hash & 0xff) as f32 / 255.0;
    let v2 = ((hash >> 8) & 0xff) as f32 / 255.0;
    let v3 = ((hash >> 16) & 0xff) as f32 / 255.0;
    (v1, v2, v3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_deterministic() {
        let a = Palette::Hot.color("compute", 0.5);
        let b = Palette::Hot.color("compute", 0.5);
        assert_eq!(a, b);
        assert_ne!(a, Palette::Hot.color("compute", 0.25));
        assert_ne!(a, Palette::Hot.color("computf", 0.5));
    }

    #[test]
    fn hot_stays_in_the_warm_band() {
        for (i, name) in ["main", "worker", "compute", "[libc.so.6]", ""]
            .iter()
            .enumerate()
        {
            let rgb = Palette::Hot.color(name, i as f64 / 4.0);
            let parts: Vec<u32> = rgb
                .trim_start_matches("rgb(")
                .trim_end_matches(')')
                .split(',')
                .map(|p| p.parse().unwrap())
                .collect();
            assert!(parts[0] >= 205, "red out of band: {}", rgb);
            assert!(parts[1] <= 230, "green out of band: {}", rgb);
            assert!(parts[2] <= 55, "blue out of band: {}", rgb);
        }
    }

    #[test]
    fn unknown_tags_fall_back_to_hot() {
        assert_eq!(Palette::from_tag("hot"), Palette::Hot);
        assert_eq!(Palette::from_tag("mem"), Palette::Mem);
        assert_eq!(Palette::from_tag("io"), Palette::Io);
        assert_eq!(Palette::from_tag("chilly"), Palette::Hot);
        assert_eq!("io".parse::<Palette>().unwrap(), Palette::Io);
    }
}
