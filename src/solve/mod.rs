//! Gedämpfter Gauss-Seidel-Solver über skalaren Constraints.
//!
//! Jedes Constraint liefert ein skalares Residuum über einem flachen
//! Parametervektor und benennt die Parameter-Slots, von denen es abhängt.
//! Der Solver schätzt den Gradienten numerisch und schiebt die Slots
//! entlang des negativen Gradienten, gedämpft und gewichtet.

/// Schrittweite der numerischen Gradientenschätzung.
const GRADIENT_STEP: f64 = 1e-4;
/// Untergrenze der Gradienten-Norm; darunter wird der Schritt übersprungen.
const GRADIENT_FLOOR: f64 = 1e-12;

/// Skalares Constraint über einem Parametervektor.
pub struct Constraint {
    name: &'static str,
    slots: Vec<usize>,
    weight: f64,
    residual: Box<dyn Fn(&[f64]) -> f64>,
}

impl Constraint {
    pub fn new(
        name: &'static str,
        slots: Vec<usize>,
        weight: f64,
        residual: Box<dyn Fn(&[f64]) -> f64>,
    ) -> Self {
        Self {
            name,
            slots,
            weight,
            residual,
        }
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("slots", &self.slots)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Constraint-Sammlung mit Lösungs-Schleife.
#[derive(Debug)]
pub struct Solver {
    constraints: Vec<Constraint>,
    /// Residuen unterhalb dieser Schwelle gelten als erfüllt.
    pub threshold: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
            threshold: 0.001,
        }
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Führt `steps` Durchläufe über alle Constraints aus und liefert den
    /// Fehler (Summe der absoluten Residuen) des letzten Durchlaufs.
    ///
    /// `damping ∈ (0, 1]` skaliert die Schrittweite. Die Slots werden
    /// direkt in `params` mutiert.
    pub fn solve(&self, params: &mut [f64], steps: usize, damping: f64) -> f64 {
        let mut error = 0.0;

        for _ in 0..steps {
            error = 0.0;

            for con in &self.constraints {
                let r1 = (con.residual)(params);
                error += r1.abs();

                if r1.abs() < self.threshold {
                    continue;
                }

                // Numerischer Gradient über die deklarierten Slots
                let mut gs = Vec::with_capacity(con.slots.len());
                let mut total_gs = 0.0;
                for &slot in &con.slots {
                    let orig = params[slot];
                    params[slot] += GRADIENT_STEP;
                    let r2 = (con.residual)(params);
                    params[slot] = orig;

                    let g = (r2 - r1) / GRADIENT_STEP;
                    total_gs += g * g;
                    gs.push(g);
                }

                if total_gs < GRADIENT_FLOOR {
                    continue;
                }

                let rk = r1 / total_gs * damping * con.weight;
                for (&slot, g) in con.slots.iter().zip(&gs) {
                    params[slot] -= g * rk;
                }
            }
        }

        error
    }
}
