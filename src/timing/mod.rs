// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the meter hierarchy and pulse timeline shared by
//! every track of a piece.

pub mod meter;

pub use meter::{Meter, Pulse};
