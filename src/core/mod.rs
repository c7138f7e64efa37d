//! Core-Domänentypen: Mesh, Knoten und Kanten.

pub mod mesh;

pub use mesh::{Mesh, MeshEdge, MeshVertex};
