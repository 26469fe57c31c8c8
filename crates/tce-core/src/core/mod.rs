//! # Core Module
//!
//! Stateless building blocks shared by the topology and engine layers.
//!
//! - **Lattices** ([`lattice`]) - Supported lattice structures and their static shell and
//!   triplet-closure tables
//! - **Geometry** ([`geometry`]) - Site positions, periodic boxes and supercell generation
//! - **Occupations** ([`state`]) - The site-by-type state matrix
//! - **Sparse relations** ([`sparse`]) - Pair, triplet and distance relations in compressed-row form
//! - **Dense tensors** ([`tensor`]) - Small dense correlation blocks and their symmetrization

pub mod geometry;
pub mod lattice;
pub mod sparse;
pub mod state;
pub mod tensor;
