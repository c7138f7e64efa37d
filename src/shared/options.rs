//! Zentrale Konfiguration des Strokers.
//!
//! `StrokerOptions` enthält alle zur Laufzeit änderbaren Werte;
//! die `const`-Werte bleiben als Fallback/Default erhalten.

use serde::{Deserialize, Serialize};

use crate::curve::CurveKind;

// ── Eingabe-Filter ──────────────────────────────────────────────────

/// Standard-Verzögerungsfaktor: 1.0 heißt ungefiltert, größere Werte
/// fassen mehr Eingabepunkte zu einem Segment zusammen.
pub const DEFAULT_LAG: f64 = 1.0;

/// Laufzeit-Optionen des Strokers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrokerOptions {
    /// Verzögerungsfaktor der Eingabe-Verdichtung (mindestens 1.0).
    pub lag: f64,
    /// Kurven-Variante der erzeugten Segmente.
    pub curve: CurveKind,
}

impl Default for StrokerOptions {
    fn default() -> Self {
        Self {
            lag: DEFAULT_LAG,
            curve: CurveKind::default(),
        }
    }
}

impl StrokerOptions {
    /// Klemmt alle Werte in ihren gültigen Bereich.
    pub fn sanitize(mut self) -> Self {
        self.lag = self.lag.max(1.0);
        self
    }
}
