//! Engine data structures: vertex layouts and loaded meshes.
//!
//! - `vertex_layout` describes how vertex bytes map to shader inputs, and the
//!   semantic-carrying descriptor the mesh loader packs against
//! - `mesh` holds GPU-resident geometry split into submeshes

pub mod mesh;
pub mod vertex_layout;
