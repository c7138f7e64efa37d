//! Arc-Length-Tabelle: monotones Lookup von Bogenlänge auf Kurvenparameter.
//!
//! Wird von Bézier- und B-Spline-Variante geteilt, damit beide über
//! physikalische Distanz statt über den internen Parameter adressierbar sind.

use glam::DVec2;

/// Anzahl der Tabellen-Slots und der Parameter-Samples beim Aufbau.
pub const TABLE_SIZE: usize = 1024;

/// Lookup-Tabelle von normierter Bogenlänge auf Parameterwert t ∈ [0, 1].
///
/// Aufbau: die Kurve wird an `TABLE_SIZE` uniformen Parameterschritten
/// gesampelt, die Sehnenlänge laufend aufsummiert und jedes (s, t)-Paar in
/// einen Bucket einsortiert. Mehrfach belegte Buckets speichern das
/// arithmetische Mittel ihrer t-Werte. Leere Buckets werden anschließend
/// aufgefüllt: der Schwanz ab dem letzten belegten Bucket mit dessen t,
/// innere Lücken per linearer Interpolation zwischen den Nachbarn.
#[derive(Debug, Clone)]
pub struct ArcLengthTable {
    params: Vec<f64>,
    length: f64,
}

impl ArcLengthTable {
    /// Leere Tabelle (Länge 0); jede Abfrage liefert Parameter 0.
    pub fn empty() -> Self {
        Self {
            params: vec![0.0; TABLE_SIZE],
            length: 0.0,
        }
    }

    /// Baut die Tabelle aus einem parametrischen Evaluator über t ∈ [0, 1].
    pub fn build(eval: impl Fn(f64) -> DVec2) -> Self {
        let n = TABLE_SIZE;
        let dt = 1.0 / (n - 1) as f64;

        let mut samples = Vec::with_capacity(n);
        let mut s = 0.0;
        let mut last: Option<DVec2> = None;
        let mut t = 0.0;
        for _ in 0..n {
            let p = eval(t);
            if let Some(lp) = last {
                s += lp.distance(p);
            }
            samples.push((s, t));
            last = Some(p);
            t += dt;
        }

        let length = s;
        let inv_len = if length != 0.0 { 1.0 / length } else { 0.0 };

        let mut params = vec![f64::NAN; n];
        let mut counts = vec![0u32; n];
        for &(s, t) in &samples {
            let si = ((s * inv_len * (n - 1) as f64) as usize).min(n - 1);
            if counts[si] == 0 {
                params[si] = t;
            } else {
                params[si] += t;
            }
            counts[si] += 1;
        }
        for i in 0..n {
            if counts[i] > 1 {
                params[i] /= f64::from(counts[i]);
            }
        }

        // Schwanz: ab dem letzten belegten Bucket mit dessen Wert auffüllen
        let mut si = n - 1;
        while si > 0 && params[si].is_nan() {
            si -= 1;
        }
        let tail = if params[si].is_nan() { 1.0 } else { params[si] };
        for p in params.iter_mut().skip(si) {
            *p = tail;
        }

        // Innere Lücken linear interpolieren
        let mut i = 0;
        while i + 1 < n {
            if !params[i + 1].is_nan() {
                i += 1;
                continue;
            }
            let i1 = i;
            let mut i2 = i + 1;
            while params[i2].is_nan() {
                i2 += 1;
            }
            let a = params[i1];
            let b = params[i2];
            let step = 1.0 / (i2 - i1) as f64;
            for (j, p) in params.iter_mut().enumerate().take(i2 + 1).skip(i1 + 1) {
                *p = a + (b - a) * step * (j - i1) as f64;
            }
            i = i2;
        }

        // Endpunkte exakt pinnen, damit evaluate(0) und evaluate(length)
        // die Kurven-Endpunkte treffen
        params[0] = 0.0;
        params[n - 1] = 1.0;

        Self { params, length }
    }

    /// Gesamt-Bogenlänge der Kurve.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Parameterwert zur Bogenlänge `s`; `s` wird auf [0, length] geklemmt.
    pub fn param_at(&self, s: f64) -> f64 {
        if self.length <= 0.0 {
            return 0.0;
        }

        let s = s.clamp(0.0, self.length) / self.length;
        let si = s * (self.params.len() - 1) as f64;
        let i1 = si as usize;
        let frac = si - i1 as f64;
        let i2 = i1 + 1;

        if i2 < self.params.len() {
            self.params[i1] + (self.params[i2] - self.params[i1]) * frac
        } else {
            self.params[i1]
        }
    }
}
