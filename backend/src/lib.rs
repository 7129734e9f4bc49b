// khc — Kernel HLS Codegen
//
// Library root. Back-end stages are added as modules here.

pub mod dataflow;
pub mod diag;
pub mod dot;
pub mod emit;
pub mod ir;
pub mod provenance;
pub mod token_stream;
