// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire codec and test harness for cadview-port.
//!
//! This crate provides:
//! - decoding of compressed and plain wire arrays ([`decode_array`], [`revive`])
//! - encoders for the compressed form ([`encode_f32`], [`encode_i32`])
//! - scene document decoding with shared-instance resolution ([`SceneCodec`])
//! - MockViewer for headless testing of code driving a `ViewerPort`
//!
//! # Design
//!
//! Decoding is kept out of the port crate so cadview-port stays free of
//! compression and encoding dependencies.

mod array;
mod mock_viewer;
mod scene;

pub use array::*;
pub use mock_viewer::*;
pub use scene::*;
