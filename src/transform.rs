/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

//! The external transform-callback contract (spec §6).
//!
//! The scanner core never interprets a region's payload
//! itself -- it hands the collected [`DataBuffer`] to an
//! opaque [`Transform`] (typically a binding into an embedded
//! scripting interpreter, which is explicitly out of scope
//! for this crate) and splices whatever comes back into the
//! output in the region's place.

use std::any::Any;

use crate::{buffer::DataBuffer, position::StreamLocationChain};

/// Status returned alongside a transform's output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus
{
    /// The transform ran to completion; `output` is its
    /// result
    Okay,

    /// The transform could not allocate memory it needed;
    /// fatal, aborts the scan
    ErrorMemory,

    /// The transform's own evaluation of the region's code
    /// failed (e.g. a syntax or runtime error in the
    /// embedded interpreter); non-fatal, `output` already
    /// contains the error's own rendered message
    ErrorCodeExecution,

    /// The transform could not write its output anywhere it
    /// needed to (e.g. a side channel it owns); fatal,
    /// aborts the scan
    ErrorWrite,
}

impl TransformStatus
{
    /// Statuses that unwind the scan immediately rather than
    /// being recorded on the processing entry and surfaced at
    /// pop time
    pub fn is_fatal(self) -> bool
    {
        matches!(self, Self::ErrorMemory | Self::ErrorWrite)
    }
}

/// The result of invoking a [`Transform`].
pub struct TransformOutcome
{
    pub output: DataBuffer,
    pub status: TransformStatus,
}

impl TransformOutcome
{
    pub fn okay(output: DataBuffer) -> Self
    {
        Self {
            output,
            status: TransformStatus::Okay,
        }
    }

    pub fn code_execution_error(output: DataBuffer) -> Self
    {
        Self {
            output,
            status: TransformStatus::ErrorCodeExecution,
        }
    }
}

/// An opaque hook invoked by the scanner driver to convert
/// one region's (or one continuation gap's) collected bytes
/// into output bytes.
///
/// `input` is always fully consumed. `user_data` is an
/// arbitrary, caller-owned slot (e.g. the embedded
/// interpreter's execution context) threaded through
/// unchanged; the core never inspects it.
pub trait Transform
{
    fn apply(
        &self,
        input: DataBuffer,
        locations: &StreamLocationChain,
        user_data: &mut dyn Any,
    ) -> TransformOutcome;
}

/// A [`Transform`] built from a plain closure, for tests and
/// small embeddings that don't need the full trait's
/// flexibility.
impl<F> Transform for F
where
    F: Fn(DataBuffer, &StreamLocationChain, &mut dyn Any) -> TransformOutcome,
{
    fn apply(
        &self,
        input: DataBuffer,
        locations: &StreamLocationChain,
        user_data: &mut dyn Any,
    ) -> TransformOutcome
    {
        (self)(input, locations, user_data)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn closure_transform_applies()
    {
        let upper: &dyn Transform = &(|mut input: DataBuffer, _: &StreamLocationChain, _: &mut dyn Any| {
            let bytes = input.unify(false).unwrap().to_vec();
            let mut out = DataBuffer::new();
            out.extend_with(&bytes.to_ascii_uppercase());
            TransformOutcome::okay(out)
        });

        let mut input = DataBuffer::new();
        input.extend_with(b"hi");

        let mut user_data = ();
        let outcome = upper.apply(input, &StreamLocationChain::new(), &mut user_data);

        assert_eq!(outcome.status, TransformStatus::Okay);

        let mut out = outcome.output;
        assert_eq!(out.unify(false).unwrap(), b"HI");
    }
}
