//! Stroke-Eingabe: rohe Zeigerpositionen werden zu gleichmäßig
//! verteilten Dabs entlang geglätteter Kurvensegmente.
//!
//! Der Stroker hält eine kurze Historie akzeptierter Eingabepunkte,
//! baut daraus pro Schritt ein kleines [`Mesh`], lässt den
//! Stetigkeits-Solver laufen und tastet das nachlaufende (bereits von
//! beiden Seiten gestützte) Segment in festem Bogenlängen-Abstand ab.

use glam::DVec2;
use thiserror::Error;

use crate::core::Mesh;
use crate::shared::StrokerOptions;

/// Ein Abtastpunkt entlang des Strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dab {
    /// Position auf der Kurve
    pub position: DVec2,
    /// Tangente an dieser Stelle (nicht zwingend normiert)
    pub tangent: DVec2,
    /// Normierte Lage im Segment, 0 bis 1
    pub t: f64,
}

/// Fehler der Dab-Erzeugung; die Eingabe-Historie bleibt in diesem Fall
/// unverändert, der nächste Punkt kann es erneut versuchen.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrokeError {
    #[error("Segmentlaenge oder Dab-Abstand nicht endlich")]
    NonFiniteLength,
    #[error("Dab-Abstand ist null")]
    ZeroSpacing,
    #[error("Segment ohne Kurve")]
    MissingTopology,
}

/// Verdichtet Zeiger-Eingaben zu Dabs mit festem Abstand.
///
/// `history[0]` ist der zuletzt akzeptierte Punkt. Die Emission beginnt
/// erst, wenn genug Historie für ein beidseitig gestütztes Segment
/// vorliegt; das erste Segment überspringt jeden zweiten Punkt, damit
/// die Anlaufphase dieselbe Segmentlänge bekommt wie der stationäre
/// Betrieb.
pub struct Stroker<F: FnMut(Dab)> {
    callback: F,
    options: StrokerOptions,
    mpos: DVec2,
    history: [DVec2; 4],
    accepted: [bool; 4],
    leftover: f64,
    first: bool,
    first_segment: bool,
}

impl<F: FnMut(Dab)> Stroker<F> {
    pub fn new(options: StrokerOptions, callback: F) -> Self {
        Self {
            callback,
            options: options.sanitize(),
            mpos: DVec2::ZERO,
            history: [DVec2::ZERO; 4],
            accepted: [false; 4],
            leftover: 0.0,
            first: true,
            first_segment: true,
        }
    }

    /// Wie [`Stroker::new`], verarbeitet aber sofort einen ersten
    /// Eingabepunkt. Mit `emit_first` wird dieser Punkt direkt als Dab
    /// gemeldet (Tangente null, t = 0).
    pub fn with_first_sample(
        options: StrokerOptions,
        callback: F,
        emit_first: bool,
        x: f64,
        y: f64,
        radius: f64,
        spacing: f64,
    ) -> Result<Self, StrokeError> {
        let mut stroker = Self::new(options, callback);

        if emit_first {
            (stroker.callback)(Dab {
                position: DVec2::new(x, y),
                tangent: DVec2::ZERO,
                t: 0.0,
            });
        }

        stroker.on_input(x, y, radius, spacing)?;
        Ok(stroker)
    }

    /// Aktuelle (rohe) Zeigerposition.
    pub fn mpos(&self) -> DVec2 {
        self.mpos
    }

    /// Verarbeitet einen Eingabepunkt.
    ///
    /// Punkte, deren Abstand zum letzten akzeptierten Punkt unter
    /// `spacing * lag * 2 * radius` liegt, werden verdichtet (kein
    /// Historien-Schritt). Akzeptierte Punkte schieben die Historie;
    /// sobald sie voll genug ist, werden Dabs über das nachlaufende
    /// Segment emittiert. Der Restabstand wird ins nächste Segment
    /// übertragen, damit der Dab-Abstand über Segmentgrenzen hinweg
    /// konstant bleibt.
    pub fn on_input(&mut self, x: f64, y: f64, radius: f64, spacing: f64) -> Result<(), StrokeError> {
        let mpos = DVec2::new(x, y);
        self.mpos = mpos;

        if self.first {
            self.leftover = 0.0;
            self.history[0] = mpos;
            self.first = false;
            return Ok(());
        }

        let dt = mpos.distance(self.history[0]) / (radius * 2.0);
        if dt <= spacing * self.options.lag {
            return Ok(());
        }

        let ready = self.accepted[3] || (self.first_segment && self.accepted[2]);
        if ready {
            let ds = spacing * 2.0 * radius;
            if ds == 0.0 {
                return Err(StrokeError::ZeroSpacing);
            }
            if !ds.is_finite() {
                return Err(StrokeError::NonFiniteLength);
            }

            let mut mesh = Mesh::new();
            let emit_edge;

            if !self.first_segment {
                let v1 = mesh.add_vertex(self.history[3]);
                let v2 = mesh.add_vertex(self.history[2]);
                let v3 = mesh.add_vertex(self.history[1]);
                let v4 = mesh.add_vertex(self.history[0]);
                let v5 = mesh.add_vertex(mpos);

                mesh.add_edge(v1, v2);
                emit_edge = mesh.add_edge(v2, v3);
                mesh.add_edge(v3, v4);
                mesh.add_edge(v4, v5);
            } else {
                // Anlaufphase: jeder zweite Punkt, damit das erste Segment
                // dieselbe Spannweite hat wie die stationären
                let v1 = mesh.add_vertex(self.history[3]);
                let v3 = mesh.add_vertex(self.history[1]);
                let v4 = mesh.add_vertex(mpos);

                emit_edge = mesh.add_edge(v1, v3);
                mesh.add_edge(v3, v4);
            }

            mesh.solve(self.options.curve);

            let edge_id = emit_edge.ok_or(StrokeError::MissingTopology)?;
            let Some(curve) = mesh.edge_mut(edge_id).and_then(|e| e.curve.as_mut()) else {
                return Err(StrokeError::MissingTopology);
            };

            let elen = curve.length();
            if !elen.is_finite() {
                return Err(StrokeError::NonFiniteLength);
            }

            // Ab hier kann nichts mehr fehlschlagen; Zustand übernehmen
            if self.first_segment {
                self.first_segment = false;
                self.leftover = ds;
            }

            let mut s = self.leftover;
            while s < elen {
                let position = curve.evaluate(s);
                let tangent = curve.derivative(s);
                (self.callback)(Dab {
                    position,
                    tangent,
                    t: s / elen,
                });
                s += ds;
            }
            self.leftover = s - elen;
        }

        self.accepted.rotate_right(1);
        self.accepted[0] = true;
        self.history.rotate_right(1);
        self.history[0] = mpos;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKind;

    fn collecting_stroker(
        dabs: std::rc::Rc<std::cell::RefCell<Vec<Dab>>>,
        curve: CurveKind,
    ) -> Stroker<impl FnMut(Dab)> {
        let options = StrokerOptions {
            lag: 1.0,
            curve,
        };
        Stroker::new(options, move |dab| dabs.borrow_mut().push(dab))
    }

    #[test]
    fn first_input_emits_nothing() {
        let dabs = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut stroker = collecting_stroker(dabs.clone(), CurveKind::Bezier);

        stroker.on_input(0.0, 0.0, 4.0, 0.5).unwrap();
        assert!(dabs.borrow().is_empty());
        assert_eq!(stroker.mpos(), DVec2::ZERO);
    }

    #[test]
    fn close_inputs_are_coalesced() {
        let dabs = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut stroker = collecting_stroker(dabs.clone(), CurveKind::Bezier);

        // Abstandsschwelle ist spacing * lag * 2 * radius = 4.0
        stroker.on_input(0.0, 0.0, 4.0, 0.5).unwrap();
        for i in 1..50 {
            stroker.on_input(i as f64 * 0.05, 0.0, 4.0, 0.5).unwrap();
        }

        assert!(dabs.borrow().is_empty());
        assert!(stroker.first_segment);
    }

    #[test]
    fn emission_starts_at_the_fifth_accepted_input() {
        let dabs = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut stroker = collecting_stroker(dabs.clone(), CurveKind::Bezier);

        for i in 0..4 {
            stroker.on_input(i as f64 * 5.0, 0.0, 4.0, 0.5).unwrap();
            assert!(dabs.borrow().is_empty());
        }

        stroker.on_input(20.0, 0.0, 4.0, 0.5).unwrap();
        assert!(!dabs.borrow().is_empty());
    }

    #[test]
    fn zero_spacing_is_rejected_without_corrupting_history() {
        let dabs = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let options = StrokerOptions {
            lag: 1.0,
            curve: CurveKind::Bezier,
        };
        let mut stroker = Stroker::new(options, move |dab| dabs.borrow_mut().push(dab));

        for i in 0..4 {
            stroker.on_input(i as f64 * 5.0, 0.0, 4.0, 0.5).unwrap();
        }

        // spacing 0 akzeptiert jeden Punkt, schlägt aber bei der Emission fehl
        let err = stroker.on_input(20.0, 0.0, 4.0, 0.0).unwrap_err();
        assert_eq!(err, StrokeError::ZeroSpacing);

        // Historie unverändert; mit gültigem Spacing geht es weiter
        stroker.on_input(20.0, 0.0, 4.0, 0.5).unwrap();
    }

    #[test]
    fn with_first_sample_can_emit_the_seed_dab() {
        let dabs = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = dabs.clone();
        let stroker = Stroker::with_first_sample(
            StrokerOptions::default(),
            move |dab| sink.borrow_mut().push(dab),
            true,
            3.0,
            4.0,
            4.0,
            0.5,
        )
        .unwrap();

        let dabs = dabs.borrow();
        assert_eq!(dabs.len(), 1);
        assert_eq!(dabs[0].position, DVec2::new(3.0, 4.0));
        assert_eq!(dabs[0].t, 0.0);
        assert_eq!(stroker.mpos(), DVec2::new(3.0, 4.0));
    }
}
