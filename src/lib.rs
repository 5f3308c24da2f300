pub mod clock;
pub mod config;
pub mod error;
pub mod geometry;
pub mod identity;
pub mod registry;
pub mod scene;
pub mod store;
pub mod window_manager;

pub use config::Config;
pub use registry::{Registry, WindowRecord};
pub use window_manager::{ManagerState, WindowManager};

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Screen position and viewport size of a window, in device pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Shape {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// JSON has no NaN or infinity, so only finite shapes can be persisted.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }
}

impl std::str::FromStr for Shape {
    type Err = error::ParseShapeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| error::ParseShapeError(s.to_string()))?;

        match parts.as_slice() {
            [x, y, w, h] => {
                let shape = Self::new(*x, *y, *w, *h);
                if shape.is_finite() {
                    Ok(shape)
                } else {
                    Err(error::ParseShapeError(s.to_string()))
                }
            }
            _ => Err(error::ParseShapeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_shape_from_comma_list() {
        let shape: Shape = "100, 50,800,600".parse().unwrap();
        assert_eq!(shape, Shape::new(100.0, 50.0, 800.0, 600.0));
        assert_eq!(shape.center(), (500.0, 350.0));
    }

    #[test]
    fn rejects_malformed_shape() {
        assert_matches!("1,2,3".parse::<Shape>(), Err(_));
        assert_matches!("a,b,c,d".parse::<Shape>(), Err(_));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        assert_matches!("NaN,0,800,600".parse::<Shape>(), Err(error::ParseShapeError(_)));
        assert_matches!("0,inf,800,600".parse::<Shape>(), Err(error::ParseShapeError(_)));
        assert_matches!("0,0,-infinity,600".parse::<Shape>(), Err(error::ParseShapeError(_)));
    }

    #[test]
    fn window_id_displays_as_fixed_width_hex() {
        assert_eq!(WindowId(0xa1).to_string(), "00000000000000a1");
    }
}
