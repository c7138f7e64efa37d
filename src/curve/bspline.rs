//! Geklemmter B-Spline mit gewichtetem Knotenvektor (Cox–de Boor).

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::FD_STEP;
use super::arc_length::ArcLengthTable;
use crate::core::Mesh;

/// Effektiver Spline-Grad.
const DEGREE: usize = 2;
/// Standard-Anzahl an Kontrollpunkten pro Kante.
pub const DEFAULT_POINTS: usize = 4;
/// Epsilon gegen Division durch null bei wiederholten Knoten.
const KNOT_EPS: f64 = 1e-4;

fn safe_inv(n: f64) -> f64 {
    if n == 0.0 { 100000.0 } else { 1.0 / n }
}

/// Kontrollpunkt mit Position und positivem Knotenabstands-Gewicht.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BSplinePoint {
    /// Position des Kontrollpunkts
    pub co: DVec2,
    /// Knotenabstands-Gewicht (> 0); steuert die Parameterdichte
    pub k: f64,
    /// Index in der Kontrollpunkt-Folge
    pub index: usize,
}

impl BSplinePoint {
    pub fn new(co: DVec2, index: usize) -> Self {
        Self { co, k: 1.0, index }
    }
}

/// Rekursive Cox–de-Boor-Basis mit geklemmten Indizes.
///
/// Basisfall: Indikator von `s ∈ [knot_i, knot_{i+1})`; die letzte Spanne
/// wird geschlossen behandelt, damit `s = 1` auf den Endpunkt fällt.
fn basis(knots: &[f64], s: f64, i: isize, n: usize) -> f64 {
    let len = knots.len() as isize;
    let clamp = |j: isize| j.clamp(0, len - 1) as usize;

    let ki = clamp(i);
    let kn = clamp(i + 1);
    let knn = clamp(i + n as isize);
    let knn1 = clamp(i + n as isize + 1);

    if n == 0 {
        let k0 = knots[ki];
        let k1 = knots[kn];
        let inside = s >= k0 && (s < k1 || (s >= 1.0 && k1 >= 1.0 && k0 < k1));
        return if inside { 1.0 } else { 0.0 };
    }

    let a = (s - knots[ki]) * safe_inv(knots[knn] - knots[ki] + KNOT_EPS);
    let b = (knots[knn1] - s) * safe_inv(knots[knn1] - knots[kn] + KNOT_EPS);

    a * basis(knots, s, i, n - 1) + b * basis(knots, s, i + 1, n - 1)
}

/// Geklemmter B-Spline über einer Kontrollpunkt-Folge.
///
/// Erster und letzter Punkt sind auf die Kurven-Endpunkte gepinnt. Der
/// Knotenvektor ist abgeleiteter Zustand: `DEGREE` Null-Knoten als Präfix,
/// ein Knoten je Kontrollpunkt (akkumuliert aus den Gewichten), `DEGREE`
/// Kopien der Summe als Suffix, alles auf [0, 1] normiert.
///
/// `evaluate` nimmt Bogenlänge entgegen; die Arc-Length-Tabelle der
/// Bézier-Variante wird hier wiederverwendet.
#[derive(Debug, Clone)]
pub struct BSpline {
    v1: DVec2,
    v2: DVec2,
    points: Vec<BSplinePoint>,
    degree: usize,
    knots: Vec<f64>,
    table: ArcLengthTable,
    regen_knots: bool,
    regen_table: bool,
}

impl BSpline {
    /// Erstellt einen Spline mit `count` uniform verteilten Kontrollpunkten.
    pub fn new(v1: DVec2, v2: DVec2, count: usize) -> Self {
        let count = count.max(DEGREE + 1);
        let points = (0..count)
            .map(|i| {
                let s = i as f64 / (count - 1) as f64;
                BSplinePoint::new(v1.lerp(v2, s), i)
            })
            .collect();

        Self {
            v1,
            v2,
            points,
            degree: DEGREE,
            knots: Vec::new(),
            table: ArcLengthTable::empty(),
            regen_knots: true,
            regen_table: true,
        }
    }

    pub fn v1(&self) -> DVec2 {
        self.v1
    }

    pub fn v2(&self) -> DVec2 {
        self.v2
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn points(&self) -> &[BSplinePoint] {
        &self.points
    }

    /// Setzt die Position eines Kontrollpunkts und invalidiert die Tabelle.
    pub fn set_point(&mut self, index: usize, co: DVec2) {
        if let Some(p) = self.points.get_mut(index) {
            p.co = co;
            self.regen_table = true;
        }
    }

    /// Setzt das Knotenabstands-Gewicht eines Kontrollpunkts und
    /// invalidiert Knotenvektor und Tabelle.
    pub fn set_weight(&mut self, index: usize, k: f64) {
        if let Some(p) = self.points.get_mut(index) {
            p.k = k.max(f64::EPSILON);
            self.regen_knots = true;
        }
    }

    /// Pinnt die End-Kontrollpunkte auf neue Endpunkte.
    pub fn set_endpoints(&mut self, v1: DVec2, v2: DVec2) {
        self.v1 = v1;
        self.v2 = v2;
        let last = self.points.len() - 1;
        self.points[0].co = v1;
        self.points[last].co = v2;
        self.regen_table = true;
    }

    /// Leitet die Kontrollpunkte aus der Kanten-Geometrie neu ab.
    ///
    /// Endpunkte werden gepinnt, innere Punkte uniform auf der Sehne
    /// verteilt; die beiden endpunktnahen Punkte werden entlang einer
    /// gemittelten Tangente (Nachbarkanten-Richtung ⊕ eigene Richtung)
    /// um ±1/3 verschoben, um G1-Stetigkeit anzunähern.
    pub fn init_from_chain(&mut self, v1: DVec2, v2: DVec2, prev: DVec2, next: DVec2) {
        self.v1 = v1;
        self.v2 = v2;

        let n = self.points.len();
        for i in 0..n {
            let s = i as f64 / (n - 1) as f64;
            self.points[i].co = v1.lerp(v2, s);
        }

        let t1 = (v2 - v1).lerp(v1 - prev, 0.5);
        self.points[1].co = v1 + t1 * (1.0 / 3.0);

        let t2 = (next - v2).lerp(v2 - v1, 0.5);
        self.points[n - 2].co = v2 + t2 * (-1.0 / 3.0);

        self.regen_table = true;
    }

    fn rebuild_knots(&mut self) {
        self.regen_knots = false;
        self.knots.clear();

        for _ in 0..self.degree {
            self.knots.push(0.0);
        }

        let mut k = 0.0;
        let mut sum = 0.0;
        for p in &self.points {
            self.knots.push(k);
            k += p.k;
            sum += p.k;
        }

        for _ in 0..self.degree {
            self.knots.push(sum);
        }

        let inv = if sum > 0.0 { 1.0 / sum } else { 0.0 };
        for knot in &mut self.knots {
            *knot *= inv;
        }
    }

    /// Gewichtete Kontrollpunkt-Summe über alle Basisfunktionen,
    /// normiert auf die Basissumme (Partition der Eins trotz Epsilon-Schutz).
    fn eval_param(&self, s: f64) -> DVec2 {
        let last = self.points.len() - 1;
        let mut acc = DVec2::ZERO;
        let mut wsum = 0.0;

        for i in 0..self.knots.len() {
            let pi = i.min(last);
            let w = basis(&self.knots, s, i as isize, self.degree);
            acc += self.points[pi].co * w;
            wsum += w;
        }

        if wsum > f64::EPSILON { acc / wsum } else { acc }
    }

    /// Ableitung im Parameterraum über die reduzierte Grad-Rekurrenz:
    /// Differenzen benachbarter Kontrollpunkte, gewichtet mit der Basis
    /// vom Grad `degree - 1` und skaliert mit `degree / knot_span`.
    ///
    /// Die Spannen-Indizes bleiben im Knotenraum; nur die
    /// Kontrollpunkt-Zugriffe werden geklemmt. Ein geklemmter
    /// Spannen-Index würde die Gewichte nahe den Kurvenenden verzerren.
    fn derivative_param(&self, s: f64) -> DVec2 {
        let last = self.points.len() - 1;
        let knots = &self.knots;
        let mut ret = DVec2::ZERO;

        for i in 1..knots.len().saturating_sub(1) {
            let p1 = (i - 1).min(last);
            let p2 = i.min(last);
            let kp = (i + self.degree).min(knots.len() - 1);

            let w = basis(knots, s, i as isize, self.degree - 1);
            let dv = (self.points[p2].co - self.points[p1].co)
                * (self.degree as f64 * safe_inv(knots[kp] - knots[i]));

            ret += dv * w;
        }

        ret
    }

    fn ensure(&mut self) {
        if self.regen_knots {
            self.rebuild_knots();
            self.regen_table = true;
        }
        if self.regen_table {
            self.regen_table = false;
            let table = ArcLengthTable::build(|t| self.eval_param(t));
            self.table = table;
        }
    }

    /// Gesamt-Bogenlänge (lazy, gecacht).
    pub fn length(&mut self) -> f64 {
        self.ensure();
        self.table.length()
    }

    /// Position zur Bogenlänge `s` (geklemmt auf [0, length]).
    pub fn evaluate(&mut self, s: f64) -> DVec2 {
        self.ensure();
        let t = self.table.param_at(s);
        self.eval_param(t)
    }

    /// Unnormierte Tangente an der Bogenlänge `s`.
    pub fn derivative(&mut self, s: f64) -> DVec2 {
        self.ensure();
        let t = self.table.param_at(s);

        // Die letzte Knotenspanne ist durch den gedoppelten End-Kontrollpunkt
        // degeneriert (Kurve konstant, Ableitung null); knapp davor auswerten
        let tail = self.knots[self.knots.len() - self.degree - 1];
        let t = t.min((tail - 1e-6).max(0.0));

        self.derivative_param(t)
    }

    /// Zweite Ableitung (Vorwärtsdifferenz der Tangente).
    pub fn derivative2(&mut self, s: f64) -> DVec2 {
        let a = self.derivative(s);
        let b = self.derivative(s + FD_STEP);
        (b - a) / FD_STEP
    }
}

/// Leitet die Kontrollpunkte aller Kanten-Splines aus der Mesh-Geometrie ab.
pub struct BSplineSolver;

impl BSplineSolver {
    /// Berechnet die Kurven aller Kanten neu; idempotent.
    pub fn solve(mesh: &mut Mesh) {
        let updates: Vec<(u64, DVec2, DVec2, DVec2, DVec2)> = mesh
            .edges_iter()
            .filter_map(|e| {
                let v1 = mesh.vertex_position(e.v1)?;
                let v2 = mesh.vertex_position(e.v2)?;
                let prev = mesh.vertex_position(mesh.neighbor_behind(e.v1, e.id))?;
                let next = mesh.vertex_position(mesh.neighbor_behind(e.v2, e.id))?;
                Some((e.id, v1, v2, prev, next))
            })
            .collect();

        for (id, v1, v2, prev, next) in updates {
            if let Some(curve) = mesh.edge_mut(id).and_then(|e| e.curve.as_mut())
                && let Some(spline) = curve.as_bspline_mut()
            {
                spline.init_from_chain(v1, v2, prev, next);
            }
        }
    }
}
