/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! A streaming preprocessor for text templates that interleave
//! literal output with delimited regions of embedded code.
//!
//! [`Scanner`](scanner::Scanner) drives the whole pipeline: it
//! reads a byte stream in fixed-size blocks through a
//! [`BlockReader`](block::BlockReader), matches tag text against
//! a compiled [`grammar`], and dispatches each matched region's
//! bytes through caller-supplied [`Transform`](transform::Transform)
//! hooks before writing the result out. [`grammar::default`]
//! builds the tag set this crate ships with out of the box;
//! callers that need a different delimiter syntax build their
//! own [`grammar::GroupHandle`] instead.
//!
//! It is currently still in development, and will likely
//! have multiple breaking changes to the exposed API before
//! stabilizing. Use at your own risk.
//!
//! The exposed APIs are grouped by module, and no high
//! level API yet exists for this library, though this will
//! change in the future.

#![allow(dead_code)]
#![allow(clippy::suspicious_else_formatting)]

pub mod block;
pub mod buffer;
pub mod error;
pub mod grammar;
pub mod position;
pub mod scanner;
pub mod transform;
