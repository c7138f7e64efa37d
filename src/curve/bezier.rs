//! Kubische Bézier-Kurve mit Arc-Length-Tabelle plus Handle-Solver.

use glam::DVec2;

use super::FD_STEP;
use super::arc_length::ArcLengthTable;
use crate::core::Mesh;

/// Kubische Interpolation einer Koordinate: zwei Runden linearer
/// Interpolation über die vier Kontrollwerte.
pub fn cubic(a: f64, b: f64, c: f64, d: f64, t: f64) -> f64 {
    let k1 = a + (b - a) * t;
    let k2 = b + (c - b) * t;
    let k3 = c + (d - c) * t;

    let ka = k1 + (k2 - k1) * t;
    let kb = k2 + (k3 - k2) * t;

    ka + (kb - ka) * t
}

/// Kubische Bézier-Kurve aus zwei Endpunkten und zwei Handles.
///
/// `evaluate` nimmt physikalische Bogenlänge entgegen; intern wird über die
/// Arc-Length-Tabelle auf den Kurvenparameter zurückgerechnet. Jede
/// Kontrollpunkt-Mutation setzt das Dirty-Flag; Tabelle und Länge werden
/// gemeinsam beim nächsten Zugriff neu aufgebaut.
#[derive(Debug, Clone)]
pub struct CubicBezier {
    v1: DVec2,
    h1: DVec2,
    h2: DVec2,
    v2: DVec2,
    table: ArcLengthTable,
    regen: bool,
}

impl CubicBezier {
    /// Erstellt eine Kurve aus vier Kontrollpunkten.
    pub fn new(v1: DVec2, h1: DVec2, h2: DVec2, v2: DVec2) -> Self {
        Self {
            v1,
            h1,
            h2,
            v2,
            table: ArcLengthTable::empty(),
            regen: true,
        }
    }

    /// Erstellt eine gerade Kurve zwischen zwei Endpunkten
    /// (Handles bei 1/3 und 2/3 der Sehne).
    pub fn from_endpoints(v1: DVec2, v2: DVec2) -> Self {
        Self::new(v1, v1.lerp(v2, 1.0 / 3.0), v1.lerp(v2, 2.0 / 3.0), v2)
    }

    pub fn v1(&self) -> DVec2 {
        self.v1
    }

    pub fn h1(&self) -> DVec2 {
        self.h1
    }

    pub fn h2(&self) -> DVec2 {
        self.h2
    }

    pub fn v2(&self) -> DVec2 {
        self.v2
    }

    /// Setzt alle vier Kontrollpunkte und invalidiert Tabelle und Länge.
    pub fn set_points(&mut self, v1: DVec2, h1: DVec2, h2: DVec2, v2: DVec2) {
        self.v1 = v1;
        self.h1 = h1;
        self.h2 = h2;
        self.v2 = v2;
        self.regen = true;
    }

    /// Verschiebt nur die Endpunkte (Handles bleiben) und invalidiert.
    pub fn set_endpoints(&mut self, v1: DVec2, v2: DVec2) {
        self.v1 = v1;
        self.v2 = v2;
        self.regen = true;
    }

    /// Roher parametrischer Evaluator über t ∈ [0, 1].
    fn eval_param(&self, t: f64) -> DVec2 {
        DVec2::new(
            cubic(self.v1.x, self.h1.x, self.h2.x, self.v2.x, t),
            cubic(self.v1.y, self.h1.y, self.h2.y, self.v2.y, t),
        )
    }

    fn ensure_table(&mut self) {
        if !self.regen {
            return;
        }
        self.regen = false;

        let (v1, h1, h2, v2) = (self.v1, self.h1, self.h2, self.v2);
        self.table = ArcLengthTable::build(|t| {
            DVec2::new(
                cubic(v1.x, h1.x, h2.x, v2.x, t),
                cubic(v1.y, h1.y, h2.y, v2.y, t),
            )
        });
    }

    /// Gesamt-Bogenlänge (lazy, gecacht).
    pub fn length(&mut self) -> f64 {
        self.ensure_table();
        self.table.length()
    }

    /// Position zur Bogenlänge `s` (geklemmt auf [0, length]).
    pub fn evaluate(&mut self, s: f64) -> DVec2 {
        self.ensure_table();
        let t = self.table.param_at(s);
        self.eval_param(t)
    }

    /// Unnormierte Tangente (Vorwärtsdifferenz über der Bogenlänge).
    pub fn derivative(&mut self, s: f64) -> DVec2 {
        let a = self.evaluate(s);
        let b = self.evaluate(s + FD_STEP);
        (b - a) / FD_STEP
    }

    /// Zweite Ableitung (Vorwärtsdifferenz der Tangente).
    pub fn derivative2(&mut self, s: f64) -> DVec2 {
        let a = self.derivative(s);
        let b = self.derivative(s + FD_STEP);
        (b - a) / FD_STEP
    }
}

/// Setzt die Bézier-Handles aller Mesh-Kanten so, dass benachbarte Kanten
/// näherungsweise G1-stetig ineinander übergehen.
///
/// Die Handle-Richtung an jedem Endpunkt mittelt die Richtung zur
/// dahinterliegenden Nachbar-Kante mit der eigenen Kantenrichtung und wird
/// auf 1/3 der Mischung skaliert.
pub struct BezierSolver;

impl BezierSolver {
    /// Berechnet die Kurven aller Kanten neu; idempotent.
    pub fn solve(mesh: &mut Mesh) {
        // Erst einsammeln, dann schreiben (Borrow-Konflikt vermeiden)
        let updates: Vec<(u64, DVec2, DVec2, DVec2, DVec2)> = mesh
            .edges_iter()
            .filter_map(|e| {
                let v1 = mesh.vertex_position(e.v1)?;
                let v2 = mesh.vertex_position(e.v2)?;
                let vp = mesh.vertex_position(mesh.neighbor_behind(e.v1, e.id))?;
                let vn = mesh.vertex_position(mesh.neighbor_behind(e.v2, e.id))?;

                let chord = v2 - v1;
                let h1 = (v1 - vp).lerp(chord, 0.5) * (1.0 / 3.0) + v1;
                let h2 = chord.lerp(vn - v2, 0.5) * (-1.0 / 3.0) + v2;

                Some((e.id, v1, h1, h2, v2))
            })
            .collect();

        for (id, v1, h1, h2, v2) in updates {
            if let Some(curve) = mesh.edge_mut(id).and_then(|e| e.curve.as_mut())
                && let Some(bezier) = curve.as_bezier_mut()
            {
                bezier.set_points(v1, h1, h2, v2);
            }
        }
    }
}
