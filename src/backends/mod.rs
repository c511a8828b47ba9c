// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! Hardware access lives here; everything above this layer works on
//! normalized frames only.
//!
//! # Modules
//!
//! - [`camera`]: Frame sources (synthetic and V4L2), throttling and frame hand-off

pub mod camera;
