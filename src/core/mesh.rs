//! Topologie-Container: Knoten und Kanten mit anhängenden Kurven.

use glam::DVec2;
use indexmap::IndexMap;

use crate::curve::{BSplineSolver, BezierSolver, ClothoidSolver, Curve, CurveKind};

/// Knoten mit Position und Rückverweisen auf anliegende Kanten.
#[derive(Debug, Clone)]
pub struct MeshVertex {
    pub id: u64,
    pub position: DVec2,
    pub edges: Vec<u64>,
}

/// Kante zwischen zwei Knoten; die Kurve entsteht lazy über `ensure_curves`.
#[derive(Debug, Clone)]
pub struct MeshEdge {
    pub id: u64,
    pub v1: u64,
    pub v2: u64,
    pub curve: Option<Curve>,
}

/// Ungerichteter Graph aus Knoten und Kanten.
///
/// Geordnete Maps halten die Einfüge-Reihenfolge stabil, damit Solver-Läufe
/// deterministisch bleiben.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    verts: IndexMap<u64, MeshVertex>,
    edges: IndexMap<u64, MeshEdge>,
    next_vert_id: u64,
    next_edge_id: u64,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legt einen Knoten an und liefert seine Id.
    pub fn add_vertex(&mut self, position: DVec2) -> u64 {
        let id = self.next_vert_id;
        self.next_vert_id += 1;

        self.verts.insert(
            id,
            MeshVertex {
                id,
                position,
                edges: Vec::new(),
            },
        );

        id
    }

    /// Legt eine Kante zwischen zwei existierenden Knoten an.
    ///
    /// Schleifen (v1 == v2) und Kanten an unbekannte Knoten werden
    /// abgelehnt.
    pub fn add_edge(&mut self, v1: u64, v2: u64) -> Option<u64> {
        if v1 == v2 || !self.verts.contains_key(&v1) || !self.verts.contains_key(&v2) {
            return None;
        }

        let id = self.next_edge_id;
        self.next_edge_id += 1;

        self.edges.insert(
            id,
            MeshEdge {
                id,
                v1,
                v2,
                curve: None,
            },
        );

        if let Some(v) = self.verts.get_mut(&v1) {
            v.edges.push(id);
        }
        if let Some(v) = self.verts.get_mut(&v2) {
            v.edges.push(id);
        }

        Some(id)
    }

    pub fn vertex(&self, id: u64) -> Option<&MeshVertex> {
        self.verts.get(&id)
    }

    pub fn edge(&self, id: u64) -> Option<&MeshEdge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: u64) -> Option<&mut MeshEdge> {
        self.edges.get_mut(&id)
    }

    pub fn vertex_position(&self, id: u64) -> Option<DVec2> {
        self.verts.get(&id).map(|v| v.position)
    }

    /// Verschiebt einen Knoten und invalidiert die Kurven aller
    /// anliegenden Kanten.
    pub fn move_vertex(&mut self, id: u64, position: DVec2) {
        let Some(v) = self.verts.get_mut(&id) else {
            return;
        };
        v.position = position;

        for edge_id in v.edges.clone() {
            let Some(edge) = self.edges.get(&edge_id) else {
                continue;
            };
            let (Some(p1), Some(p2)) = (
                self.vertex_position(edge.v1),
                self.vertex_position(edge.v2),
            ) else {
                continue;
            };

            if let Some(curve) = self.edges.get_mut(&edge_id).and_then(|e| e.curve.as_mut()) {
                curve.set_endpoints(p1, p2);
            }
        }
    }

    /// Gegenüberliegender Knoten einer Kante.
    pub fn other_vertex(&self, edge_id: u64, vert_id: u64) -> Option<u64> {
        let edge = self.edges.get(&edge_id)?;
        if edge.v1 == vert_id {
            Some(edge.v2)
        } else if edge.v2 == vert_id {
            Some(edge.v1)
        } else {
            None
        }
    }

    /// Die jeweils andere Kante an einem Knoten mit genau zwei Kanten.
    pub fn other_edge(&self, vert_id: u64, edge_id: u64) -> Option<u64> {
        let v = self.verts.get(&vert_id)?;
        v.edges.iter().copied().find(|&e| e != edge_id)
    }

    /// Kanten-Ids an einem Knoten (leer für unbekannte Knoten).
    pub fn edges_at(&self, vert_id: u64) -> &[u64] {
        self.verts
            .get(&vert_id)
            .map(|v| v.edges.as_slice())
            .unwrap_or(&[])
    }

    /// Knoten hinter `vert_id`, von der Kante `via_edge` aus gesehen:
    /// der Gegenknoten der anderen anliegenden Kante. Existiert keine
    /// andere Kante, fällt das Ergebnis auf `vert_id` selbst zurück
    /// (Kettenende verhält sich wie ein gespiegelter Nachbar).
    pub fn neighbor_behind(&self, vert_id: u64, via_edge: u64) -> u64 {
        self.other_edge(vert_id, via_edge)
            .and_then(|e| self.other_vertex(e, vert_id))
            .unwrap_or(vert_id)
    }

    pub fn verts_iter(&self) -> impl Iterator<Item = &MeshVertex> {
        self.verts.values()
    }

    pub fn edges_iter(&self) -> impl Iterator<Item = &MeshEdge> {
        self.edges.values()
    }

    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Stellt sicher, dass jede Kante eine Kurve der gewünschten Variante
    /// trägt. Bestehende Kurven passender Variante behalten ihren Zustand
    /// und bekommen nur die aktuellen Endpunkte.
    pub fn ensure_curves(&mut self, kind: CurveKind) {
        let updates: Vec<(u64, DVec2, DVec2)> = self
            .edges
            .values()
            .filter_map(|e| {
                let p1 = self.vertex_position(e.v1)?;
                let p2 = self.vertex_position(e.v2)?;
                Some((e.id, p1, p2))
            })
            .collect();

        for (id, p1, p2) in updates {
            let Some(edge) = self.edges.get_mut(&id) else {
                continue;
            };
            match &mut edge.curve {
                Some(curve) if curve.kind() == kind => curve.set_endpoints(p1, p2),
                slot => *slot = Some(Curve::new(kind, p1, p2)),
            }
        }
    }

    /// Baut die Kurven aller Kanten auf und lässt den passenden
    /// Stetigkeits-Solver laufen.
    pub fn solve(&mut self, kind: CurveKind) {
        self.ensure_curves(kind);

        match kind {
            CurveKind::Bezier => BezierSolver::solve(self),
            CurveKind::BSpline => BSplineSolver::solve(self),
            CurveKind::Clothoid => ClothoidSolver::default().solve(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chain(mesh: &mut Mesh, points: &[DVec2]) -> Vec<u64> {
        let verts: Vec<u64> = points.iter().map(|&p| mesh.add_vertex(p)).collect();
        for w in verts.windows(2) {
            mesh.add_edge(w[0], w[1]);
        }
        verts
    }

    #[test]
    fn rejects_loops_and_unknown_vertices() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(DVec2::ZERO);

        assert_eq!(mesh.add_edge(a, a), None);
        assert_eq!(mesh.add_edge(a, 999), None);
        assert_eq!(mesh.edge_count(), 0);
    }

    #[test]
    fn tracks_edge_back_references() {
        let mut mesh = Mesh::new();
        let verts = chain(
            &mut mesh,
            &[DVec2::ZERO, DVec2::new(10.0, 0.0), DVec2::new(20.0, 0.0)],
        );

        assert_eq!(mesh.edges_at(verts[0]).len(), 1);
        assert_eq!(mesh.edges_at(verts[1]).len(), 2);
        assert_eq!(mesh.edges_at(verts[2]).len(), 1);
    }

    #[test]
    fn neighbor_behind_walks_the_chain() {
        let mut mesh = Mesh::new();
        let verts = chain(
            &mut mesh,
            &[DVec2::ZERO, DVec2::new(10.0, 0.0), DVec2::new(20.0, 0.0)],
        );
        let e1 = mesh.edges_at(verts[0])[0];
        let e2 = mesh.edges_at(verts[2])[0];

        // Mittlerer Knoten: hinter v1 (via e1) liegt v2
        assert_eq!(mesh.neighbor_behind(verts[1], e2), verts[0]);
        assert_eq!(mesh.neighbor_behind(verts[1], e1), verts[2]);
        // Kettenende fällt auf sich selbst zurück
        assert_eq!(mesh.neighbor_behind(verts[0], e1), verts[0]);
    }

    #[test]
    fn ensure_curves_respects_existing_kind() {
        let mut mesh = Mesh::new();
        let verts = chain(&mut mesh, &[DVec2::ZERO, DVec2::new(10.0, 0.0)]);
        let edge_id = mesh.edges_at(verts[0])[0];

        mesh.ensure_curves(CurveKind::Clothoid);
        {
            let edge = mesh.edge_mut(edge_id).unwrap();
            let clothoid = edge.curve.as_mut().unwrap().as_clothoid_mut().unwrap();
            clothoid.fill_k(0.5);
        }

        // Gleiche Variante: Profil bleibt erhalten
        mesh.ensure_curves(CurveKind::Clothoid);
        let edge = mesh.edge(edge_id).unwrap();
        let clothoid = edge.curve.as_ref().unwrap().as_clothoid().unwrap();
        assert_eq!(clothoid.ks()[0], 0.5);

        // Andere Variante: Kurve wird ersetzt
        mesh.ensure_curves(CurveKind::Bezier);
        let edge = mesh.edge(edge_id).unwrap();
        assert!(edge.curve.as_ref().unwrap().as_bezier().is_some());
    }

    #[test]
    fn move_vertex_updates_attached_curves() {
        let mut mesh = Mesh::new();
        let verts = chain(&mut mesh, &[DVec2::ZERO, DVec2::new(10.0, 0.0)]);
        mesh.ensure_curves(CurveKind::Clothoid);

        mesh.move_vertex(verts[1], DVec2::new(20.0, 0.0));

        let edge_id = mesh.edges_at(verts[0])[0];
        let mut curve = mesh.edge(edge_id).unwrap().curve.clone().unwrap();
        let len = curve.length();
        assert_abs_diff_eq!(len, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            curve.evaluate(len).distance(DVec2::new(20.0, 0.0)),
            0.0,
            epsilon = 1e-9
        );
    }
}
