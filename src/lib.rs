//! Parametrische Kurven-Engine.
//! Bézier, B-Spline und Klothoide über Bogenlänge, dazu Stetigkeits-Solver
//! und Stroke-Eingabe als Library exportiert für Tests und Wiederverwendung.

pub mod core;
pub mod curve;
pub mod shared;
pub mod solve;
pub mod stroke;

pub use crate::core::{Mesh, MeshEdge, MeshVertex};
pub use curve::{
    ArcLengthTable, BSpline, BSplineSolver, BezierSolver, CLOTHOID_ORDER, Clothoid,
    ClothoidSolver, CubicBezier, Curve, CurveKind,
};
pub use shared::StrokerOptions;
pub use solve::{Constraint, Solver};
pub use stroke::{Dab, StrokeError, Stroker};
