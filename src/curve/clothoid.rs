//! Klothoide über einem stückweise linearen Krümmungsprofil.
//!
//! Die Kurve lebt zunächst im kanonischen Raum (Parameter -0.5 bis 0.5,
//! Einheitslänge) und wird per Starrkörper-Fit (Offset, Rotation, Skalierung)
//! exakt auf die beiden Endpunkte gelegt. Dadurch interpolieren `evaluate(0)`
//! und `evaluate(length)` die Endpunkte ohne Toleranz.

use glam::DVec2;

use super::FD_STEP;
use crate::core::Mesh;
use crate::solve::{Constraint, Solver};

/// Anzahl der Stützstellen des Krümmungsprofils.
pub const CLOTHOID_ORDER: usize = 12;
/// Schrittzahl der Taylor-Quadratur.
const QUADRATURE_STEPS: usize = 19;

/// Krümmung an der Profilposition `s ∈ [0, 1]` (stückweise linear).
///
/// Die letzte Spanne wird konstant gehalten statt interpoliert; das glättet
/// das Solver-Verhalten am auslaufenden Ende.
fn profile(ks: &[f64], s: f64) -> f64 {
    let klen = ks.len();
    let fi = s * (klen - 1) as f64;
    let i1 = ((fi + 1e-5) as usize).min(klen - 1);
    let i2 = i1 + 1;

    if i2 < klen - 1 {
        let t = fi - fi.floor();
        ks[i1] + (ks[i2] - ks[i1]) * t
    } else {
        ks[i1]
    }
}

/// Ableitung der Krümmung (Vorwärtsdifferenz über dem Profil).
fn profile_derivative(ks: &[f64], s: f64) -> f64 {
    let df = 1e-5;
    (profile(ks, s + df) - profile(ks, s)) / df
}

/// Exaktes Integral eines linearen Segments von 0 bis `s` (s ∈ [0, 1]).
fn imix(a: f64, b: f64, s: f64) -> f64 {
    -((s - 2.0) * a - b * s) * s * 0.5
}

/// Integral der Krümmung von 0 bis `s`, also der Tangentenwinkel im
/// kanonischen Raum. Segmentweise exakt über `imix`.
fn profile_integral(ks: &[f64], s: f64) -> f64 {
    let klen = ks.len();
    let klen2 = (klen - 1) as f64;

    let fi = s * klen2;
    let t = fi - fi.floor();
    let i1 = ((fi + 1e-5) as usize).min(klen - 1);
    let i2 = (i1 + 1).min(klen - 1);

    let mut sum = 0.0;
    for i in 0..i1 {
        sum += imix(ks[i], ks[i + 1], 1.0) / klen2;
    }
    if i2 != i1 {
        sum += imix(ks[i1], ks[i2], t) / klen2;
    }

    sum
}

/// Integriert die kanonische Kurve von der Profilmitte bis `s ∈ [-0.5, 0.5]`.
///
/// Pro Schritt wird die lokale Lösung der Frenet-Gleichungen bis zur zweiten
/// Ordnung in `ds` entwickelt (Krümmung und Krümmungsableitung gehen ein).
fn quadrature(ks: &[f64], s: f64) -> DVec2 {
    let ds = s / QUADRATURE_STEPS as f64;
    let mut s2: f64 = 0.0;
    let mut x = 0.0;
    let mut y = 0.0;

    for _ in 0..QUADRATURE_STEPS {
        let s3 = (s2 + 0.5).clamp(0.0, 1.0);

        let dk = profile_derivative(ks, s3);
        let k = profile(ks, s3);
        let th = profile_integral(ks, s3);

        let (sin, cos) = th.sin_cos();

        x += cos - k * sin * ds * 0.5 - (cos * k * k + dk * sin) * ds * ds * (1.0 / 6.0);
        y += sin + k * cos * ds * 0.5 + (cos * dk - k * k * sin) * ds * ds * (1.0 / 6.0);

        s2 += ds;
    }

    DVec2::new(x * ds, y * ds)
}

/// Klothoiden-Segment zwischen zwei Endpunkten.
///
/// Der Starrkörper-Fit (Offset, Skalierung, Rotation) ist abgeleiteter
/// Zustand und wird lazy beim nächsten Zugriff neu berechnet. Die
/// Bogenlänge entspricht der Fit-Skalierung, da die kanonische Kurve
/// Einheitslänge hat.
#[derive(Debug, Clone)]
pub struct Clothoid {
    v1: DVec2,
    v2: DVec2,
    ks: [f64; CLOTHOID_ORDER],
    offset: DVec2,
    scale: f64,
    arc_scale: f64,
    rotation: f64,
    recalc: bool,
}

impl Clothoid {
    /// Gerades Segment (Krümmungsprofil null).
    pub fn new(v1: DVec2, v2: DVec2) -> Self {
        Self {
            v1,
            v2,
            ks: [0.0; CLOTHOID_ORDER],
            offset: DVec2::ZERO,
            scale: 0.0,
            arc_scale: 0.0,
            rotation: 0.0,
            recalc: true,
        }
    }

    /// Segment mit vorgegebenem Krümmungsprofil (überzählige Werte
    /// werden ignoriert, fehlende bleiben null).
    pub fn from_params(ks: &[f64], v1: DVec2, v2: DVec2) -> Self {
        let mut c = Self::new(v1, v2);
        for (dst, src) in c.ks.iter_mut().zip(ks) {
            *dst = *src;
        }
        c
    }

    pub fn v1(&self) -> DVec2 {
        self.v1
    }

    pub fn v2(&self) -> DVec2 {
        self.v2
    }

    pub fn ks(&self) -> &[f64] {
        &self.ks
    }

    /// Überschreibt das Krümmungsprofil und invalidiert den Fit.
    pub fn set_params(&mut self, ks: &[f64]) {
        for (dst, src) in self.ks.iter_mut().zip(ks) {
            *dst = *src;
        }
        self.recalc = true;
    }

    /// Setzt eine einzelne Profil-Stützstelle.
    pub fn set_k(&mut self, index: usize, k: f64) {
        if let Some(slot) = self.ks.get_mut(index) {
            *slot = k;
            self.recalc = true;
        }
    }

    /// Setzt alle Stützstellen auf denselben Wert (Kreisbogen-Profil).
    pub fn fill_k(&mut self, k: f64) {
        self.ks.fill(k);
        self.recalc = true;
    }

    pub fn set_endpoints(&mut self, v1: DVec2, v2: DVec2) {
        self.v1 = v1;
        self.v2 = v2;
        self.recalc = true;
    }

    /// Starrkörper-Fit: kanonische Endpunkte bestimmen, dann Offset,
    /// Skalierung und Rotation so wählen, dass die Kurve exakt von
    /// `v1` nach `v2` läuft.
    fn ensure(&mut self) {
        if !self.recalc {
            return;
        }
        self.recalc = false;

        let s = quadrature(&self.ks, -0.5);
        let e = quadrature(&self.ks, 0.5);

        self.offset = -s;
        self.scale = self.v1.distance(self.v2) / s.distance(e);
        self.arc_scale = 1.0 / self.scale;

        let span = e - s;
        let th1 = (self.v2 - self.v1).to_angle();
        let th2 = span.to_angle();
        self.rotation = th1 - th2;
    }

    /// Bogenlänge (identisch zur Fit-Skalierung).
    pub fn length(&mut self) -> f64 {
        self.ensure();
        self.scale
    }

    /// Position zur Bogenlänge `s` (geklemmt auf [0, length]).
    pub fn evaluate(&mut self, s: f64) -> DVec2 {
        self.ensure();

        let s = (s * self.arc_scale).clamp(0.0, 1.0) - 0.5;
        let p = quadrature(&self.ks, s) + self.offset;

        DVec2::from_angle(self.rotation).rotate(p) * self.scale + self.v1
    }

    /// Einheits-Tangente zur Bogenlänge `s` (analytisch über den
    /// Tangentenwinkel, daher immer normiert).
    pub fn derivative(&mut self, s: f64) -> DVec2 {
        self.ensure();

        let s = (s * self.arc_scale).clamp(0.0, 1.0);
        let th = profile_integral(&self.ks, s) + self.rotation;

        DVec2::new(th.cos(), th.sin())
    }

    /// Zweite Ableitung (Vorwärtsdifferenz der Tangente).
    pub fn derivative2(&mut self, s: f64) -> DVec2 {
        let a = self.derivative(s);
        let b = self.derivative(s + FD_STEP);
        (b - a) / FD_STEP
    }
}

/// Winkel zwischen den Kantenrichtungen, unterhalb dessen ein Knoten als
/// Ecke gilt und von der Stetigkeits-Lösung ausgenommen wird.
const CORNER_ANGLE: f64 = std::f64::consts::PI * 0.4;
/// Solver-Iterationen pro Lauf.
const SOLVE_STEPS: usize = 55;
/// Schrittweiten-Dämpfung des Solvers.
const DAMPING: f64 = 0.7;
/// Blendfaktor der Krümmungs-Relaxation.
const CURVATURE_FAC: f64 = 0.5;

/// Löst die Krümmungsprofile aller Kanten so, dass Tangenten an inneren
/// Knoten stetig übergehen; Ecken bleiben gerade auslaufend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClothoidSolver {
    /// Zusätzlich zur Tangente auch die Krümmung an Knoten angleichen
    /// (Relaxation, kein hartes Constraint).
    pub curvature_continuity: bool,
}

struct JointInfo {
    range1: std::ops::Range<usize>,
    range2: std::ops::Range<usize>,
    e1: (DVec2, DVec2),
    e2: (DVec2, DVec2),
    at_start1: bool,
    at_start2: bool,
}

/// Tangente am betroffenen Ende einer temporär aufgebauten Klothoide.
fn end_tangent(params: &[f64], v1: DVec2, v2: DVec2, at_start: bool) -> DVec2 {
    let mut c = Clothoid::from_params(params, v1, v2);
    if at_start {
        c.derivative(0.0)
    } else {
        let len = c.length();
        c.derivative(len)
    }
}

impl ClothoidSolver {
    /// Berechnet die Krümmungsprofile aller Kanten neu.
    ///
    /// Die Profile aller Kanten bilden einen flachen Parametervektor
    /// (`CLOTHOID_ORDER` Werte je Kante), auf dem der gedämpfte Solver
    /// arbeitet. Start ist ein fast gerades Profil (0.001), damit die
    /// numerischen Gradienten nicht in einem exakten Sattel starten.
    pub fn solve(&self, mesh: &mut Mesh) {
        let edge_ids: Vec<u64> = mesh.edges_iter().map(|e| e.id).collect();
        let mut ranges = std::collections::HashMap::new();
        let mut endpoints = Vec::with_capacity(edge_ids.len());

        for (i, &id) in edge_ids.iter().enumerate() {
            let range = i * CLOTHOID_ORDER..(i + 1) * CLOTHOID_ORDER;
            ranges.insert(id, range);

            let Some(edge) = mesh.edge(id) else { continue };
            let (Some(p1), Some(p2)) = (
                mesh.vertex_position(edge.v1),
                mesh.vertex_position(edge.v2),
            ) else {
                continue;
            };
            endpoints.push((id, p1, p2));
        }

        let mut params = vec![0.001; edge_ids.len() * CLOTHOID_ORDER];

        // Innere Knoten klassifizieren: glatte Gelenke bekommen ein
        // Tangenten-Constraint, Ecken werden gesammelt und später auf
        // Krümmung null am anliegenden Ende gesetzt.
        let mut solver = Solver::new();
        let mut joints: Vec<JointInfo> = Vec::new();
        let mut corners: Vec<u64> = Vec::new();

        for vert_id in mesh.verts_iter().map(|v| v.id).collect::<Vec<_>>() {
            let edges = mesh.edges_at(vert_id);
            if edges.len() != 2 {
                continue;
            }
            let (id1, id2) = (edges[0], edges[1]);

            let Some(v) = mesh.vertex_position(vert_id) else {
                continue;
            };
            let (Some(o1), Some(o2)) = (
                mesh.other_vertex(id1, vert_id),
                mesh.other_vertex(id2, vert_id),
            ) else {
                continue;
            };
            let (Some(p1), Some(p2)) = (mesh.vertex_position(o1), mesh.vertex_position(o2))
            else {
                continue;
            };

            let t1 = (p1 - v).normalize_or_zero();
            let t2 = (p2 - v).normalize_or_zero();
            if t1 == DVec2::ZERO || t2 == DVec2::ZERO {
                continue;
            }

            let th = (t1.dot(t2) * 0.99999).acos();
            if th < CORNER_ANGLE {
                corners.push(vert_id);
                continue;
            }

            let (Some(e1), Some(e2)) = (mesh.edge(id1), mesh.edge(id2)) else {
                continue;
            };
            let (Some(e1p1), Some(e1p2)) = (
                mesh.vertex_position(e1.v1),
                mesh.vertex_position(e1.v2),
            ) else {
                continue;
            };
            let (Some(e2p1), Some(e2p2)) = (
                mesh.vertex_position(e2.v1),
                mesh.vertex_position(e2.v2),
            ) else {
                continue;
            };

            joints.push(JointInfo {
                range1: ranges[&id1].clone(),
                range2: ranges[&id2].clone(),
                e1: (e1p1, e1p2),
                e2: (e2p1, e2p2),
                at_start1: e1.v1 == vert_id,
                at_start2: e2.v1 == vert_id,
            });
        }

        for joint in &joints {
            let (r1, r2) = (joint.range1.clone(), joint.range2.clone());
            let (e1, e2) = (joint.e1, joint.e2);
            let (at_start1, at_start2) = (joint.at_start1, joint.at_start2);

            let slots: Vec<usize> = r1.clone().chain(r2.clone()).collect();
            solver.add(Constraint::new(
                "tangente",
                slots,
                1.0,
                Box::new(move |params: &[f64]| {
                    let t1 = end_tangent(&params[r1.clone()], e1.0, e1.1, at_start1);
                    let mut t2 = end_tangent(&params[r2.clone()], e2.0, e2.1, at_start2);

                    // Beide Kanten laufen am Gelenk in dieselbe Richtung,
                    // wenn sie dort mit demselben Ende anliegen
                    if at_start1 == at_start2 {
                        t2 = -t2;
                    }

                    t1.dot(t2).clamp(-1.0, 1.0).acos()
                }),
            ));
        }

        let mut error = 0.0;
        for _ in 0..SOLVE_STEPS {
            error = solver.solve(&mut params, 1, DAMPING);

            if self.curvature_continuity {
                Self::relax_curvature(&mut params, &joints);
            }
        }
        log::debug!(
            "Klothoiden-Solver: {} Gelenke, Restfehler {error:.5}",
            joints.len()
        );

        // Profile zurückschreiben
        for &(id, _, _) in &endpoints {
            let range = ranges[&id].clone();
            if let Some(curve) = mesh.edge_mut(id).and_then(|e| e.curve.as_mut())
                && let Some(clothoid) = curve.as_clothoid_mut()
            {
                clothoid.set_params(&params[range]);
            }
        }

        // Ecken laufen gerade aus: Krümmung am anliegenden Ende null
        for vert_id in corners {
            for edge_id in mesh.edges_at(vert_id).to_vec() {
                let Some(edge) = mesh.edge(edge_id) else { continue };
                let index = if edge.v1 == vert_id {
                    0
                } else {
                    CLOTHOID_ORDER - 1
                };

                if let Some(curve) = mesh.edge_mut(edge_id).and_then(|e| e.curve.as_mut())
                    && let Some(clothoid) = curve.as_clothoid_mut()
                {
                    clothoid.set_k(index, 0.0);
                }
            }
        }

        // Instabilitätswächter: entartet der Fit, fällt die Kante auf die
        // gerade Verbindung zurück
        for &(id, p1, p2) in &endpoints {
            let chord = p1.distance(p2);
            if let Some(curve) = mesh.edge_mut(id).and_then(|e| e.curve.as_mut())
                && let Some(clothoid) = curve.as_clothoid_mut()
            {
                let len = clothoid.length();
                if !len.is_finite() || len > chord * 4.0 {
                    log::warn!(
                        "Klothoide an Kante {id} instabil (Laenge {len:.3}, Sehne {chord:.3}), Profil zurueckgesetzt"
                    );
                    clothoid.fill_k(0.0);
                }
            }
        }
    }

    /// Gleicht die Krümmungswerte beider Kantenenden eines Gelenks an.
    ///
    /// Die Roh-Parameter leben im kanonischen Raum; vor der Mittelung
    /// werden sie über die Fit-Skalierung in physikalische Krümmung
    /// umgerechnet und bei gegenläufiger Orientierung im Vorzeichen
    /// gespiegelt.
    fn relax_curvature(params: &mut [f64], joints: &[JointInfo]) {
        for joint in joints {
            let i1 = if joint.at_start1 {
                joint.range1.start
            } else {
                joint.range1.end - 1
            };
            let i2 = if joint.at_start2 {
                joint.range2.start
            } else {
                joint.range2.end - 1
            };

            let scale1 =
                Clothoid::from_params(&params[joint.range1.clone()], joint.e1.0, joint.e1.1)
                    .length();
            let scale2 =
                Clothoid::from_params(&params[joint.range2.clone()], joint.e2.0, joint.e2.1)
                    .length();
            if scale1 <= 0.0 || scale2 <= 0.0 {
                continue;
            }

            let flip = joint.at_start1 != joint.at_start2;

            let k1 = params[i1] / scale1;
            let mut k2 = params[i2] / scale2;
            if flip {
                k2 = -k2;
            }

            let k = (k1 + k2) * 0.5;
            let k1 = k1 + (k - k1) * CURVATURE_FAC;
            let mut k2 = k2 + (k - k2) * CURVATURE_FAC;
            if flip {
                k2 = -k2;
            }

            params[i1] = k1 * scale1;
            params[i2] = k2 * scale2;
        }
    }
}
