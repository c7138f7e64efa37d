//! Parametrische Kurven über Bogenlänge: Bézier, B-Spline und Klothoide.
//!
//! Alle Varianten teilen dieselbe Schnittstelle: `evaluate`, `derivative`
//! und `derivative2` nehmen physikalische Bogenlänge entgegen, `length`
//! liefert die Gesamtlänge. Abgeleiteter Zustand (Tabellen, Fits) wird
//! lazy gepflegt, deshalb nehmen auch Lese-Operationen `&mut self`.

use glam::DVec2;
use serde::{Deserialize, Serialize};

pub mod arc_length;
pub mod bezier;
pub mod bspline;
pub mod clothoid;

pub use arc_length::ArcLengthTable;
pub use bezier::{BezierSolver, CubicBezier};
pub use bspline::{BSpline, BSplineSolver};
pub use clothoid::{CLOTHOID_ORDER, Clothoid, ClothoidSolver};

/// Schrittweite der Vorwärtsdifferenzen über der Bogenlänge.
pub const FD_STEP: f64 = 1e-4;

/// Vorzeichenbehaftete Krümmung aus erster und zweiter Ableitung.
pub fn curvature_from(d1: DVec2, d2: DVec2) -> f64 {
    let denom = d1.length().powi(3);
    if denom == 0.0 {
        return 0.0;
    }
    d1.perp_dot(d2) / denom
}

/// Kurven-Variante einer Kante.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveKind {
    Bezier,
    BSpline,
    #[default]
    Clothoid,
}

/// Kurve einer Mesh-Kante.
#[derive(Debug, Clone)]
pub enum Curve {
    Bezier(CubicBezier),
    BSpline(BSpline),
    Clothoid(Clothoid),
}

impl Curve {
    /// Erstellt die zur Variante passende Standard-Kurve zwischen zwei
    /// Endpunkten (gerade Sehne).
    pub fn new(kind: CurveKind, v1: DVec2, v2: DVec2) -> Self {
        match kind {
            CurveKind::Bezier => Curve::Bezier(CubicBezier::from_endpoints(v1, v2)),
            CurveKind::BSpline => Curve::BSpline(BSpline::new(v1, v2, bspline::DEFAULT_POINTS)),
            CurveKind::Clothoid => Curve::Clothoid(Clothoid::new(v1, v2)),
        }
    }

    pub fn kind(&self) -> CurveKind {
        match self {
            Curve::Bezier(_) => CurveKind::Bezier,
            Curve::BSpline(_) => CurveKind::BSpline,
            Curve::Clothoid(_) => CurveKind::Clothoid,
        }
    }

    /// Gesamt-Bogenlänge.
    pub fn length(&mut self) -> f64 {
        match self {
            Curve::Bezier(c) => c.length(),
            Curve::BSpline(c) => c.length(),
            Curve::Clothoid(c) => c.length(),
        }
    }

    /// Position zur Bogenlänge `s`.
    pub fn evaluate(&mut self, s: f64) -> DVec2 {
        match self {
            Curve::Bezier(c) => c.evaluate(s),
            Curve::BSpline(c) => c.evaluate(s),
            Curve::Clothoid(c) => c.evaluate(s),
        }
    }

    /// Tangente zur Bogenlänge `s` (nicht zwingend normiert).
    pub fn derivative(&mut self, s: f64) -> DVec2 {
        match self {
            Curve::Bezier(c) => c.derivative(s),
            Curve::BSpline(c) => c.derivative(s),
            Curve::Clothoid(c) => c.derivative(s),
        }
    }

    /// Zweite Ableitung zur Bogenlänge `s`.
    pub fn derivative2(&mut self, s: f64) -> DVec2 {
        match self {
            Curve::Bezier(c) => c.derivative2(s),
            Curve::BSpline(c) => c.derivative2(s),
            Curve::Clothoid(c) => c.derivative2(s),
        }
    }

    /// Vorzeichenbehaftete Krümmung zur Bogenlänge `s`.
    pub fn curvature(&mut self, s: f64) -> f64 {
        let d1 = self.derivative(s);
        let d2 = self.derivative2(s);
        curvature_from(d1, d2)
    }

    /// Verschiebt die Endpunkte und invalidiert den abgeleiteten Zustand.
    pub fn set_endpoints(&mut self, v1: DVec2, v2: DVec2) {
        match self {
            Curve::Bezier(c) => c.set_endpoints(v1, v2),
            Curve::BSpline(c) => c.set_endpoints(v1, v2),
            Curve::Clothoid(c) => c.set_endpoints(v1, v2),
        }
    }

    pub fn as_bezier(&self) -> Option<&CubicBezier> {
        match self {
            Curve::Bezier(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bezier_mut(&mut self) -> Option<&mut CubicBezier> {
        match self {
            Curve::Bezier(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bspline(&self) -> Option<&BSpline> {
        match self {
            Curve::BSpline(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_bspline_mut(&mut self) -> Option<&mut BSpline> {
        match self {
            Curve::BSpline(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_clothoid(&self) -> Option<&Clothoid> {
        match self {
            Curve::Clothoid(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_clothoid_mut(&mut self) -> Option<&mut Clothoid> {
        match self {
            Curve::Clothoid(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn all_kinds_start_as_the_chord() {
        let v1 = DVec2::new(0.0, 0.0);
        let v2 = DVec2::new(10.0, 0.0);

        for kind in [CurveKind::Bezier, CurveKind::BSpline, CurveKind::Clothoid] {
            let mut curve = Curve::new(kind, v1, v2);
            assert_eq!(curve.kind(), kind);
            assert_relative_eq!(curve.length(), 10.0, epsilon = 1e-6);
            assert_abs_diff_eq!(curve.evaluate(5.0).y, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn straight_curves_have_zero_curvature() {
        for kind in [CurveKind::Bezier, CurveKind::BSpline, CurveKind::Clothoid] {
            let mut curve = Curve::new(kind, DVec2::ZERO, DVec2::new(10.0, 0.0));
            assert_abs_diff_eq!(curve.curvature(5.0), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn curvature_from_handles_degenerate_tangents() {
        assert_eq!(curvature_from(DVec2::ZERO, DVec2::new(1.0, 0.0)), 0.0);
    }

    #[test]
    fn set_endpoints_moves_all_variants() {
        let v2 = DVec2::new(30.0, 0.0);
        for kind in [CurveKind::Bezier, CurveKind::BSpline, CurveKind::Clothoid] {
            let mut curve = Curve::new(kind, DVec2::ZERO, DVec2::new(10.0, 0.0));
            let _ = curve.length();

            curve.set_endpoints(DVec2::ZERO, v2);
            let len = curve.length();
            assert_abs_diff_eq!(curve.evaluate(len).distance(v2), 0.0, epsilon = 1e-9);
        }
    }
}
