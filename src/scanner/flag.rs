/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use bitflags::bitflags;

/// An empty, zeroed flag set. This is the default set, with
/// all other flags disabled.
pub const O_ZEROED: Flags = Flags::empty();

/// Display an error when an unclosed tag is encountered, e.g.
/// `text1<? code1` with no matching `?>` before the stream
/// ends.
pub const O_ON_UNCLOSED_TAG_ERROR: Flags = Flags::ON_UNCLOSED_TAG_ERROR;

/// Display an error when an opening continuation is found with
/// no matching prior tag to continue, e.g. `text1<?... code1 ?>`.
pub const O_ON_CONTINUATION_UNMATCHED_TAG_ERROR: Flags = Flags::ON_CONTINUATION_UNMATCHED_TAG_ERROR;

/// Display an error when an opening continuation does not match
/// the family of the tag it's continuing, e.g.
/// `text1<? code1 ...?>text2<?=... code2 ?>text3`.
pub const O_ON_CONTINUATION_MISMATCHED_TAG_ERROR: Flags = Flags::ON_CONTINUATION_MISMATCHED_TAG_ERROR;

/// Allow a mismatched continuation to continue the original
/// tag's family rather than closing it and opening a new one.
pub const O_ON_CONTINUATION_MISMATCHED_TAG_CONTINUE: Flags = Flags::ON_CONTINUATION_MISMATCHED_TAG_CONTINUE;

/// Allow a tag to fully evaluate before its (non-fatal) error is
/// surfaced, rather than erroring as soon as the problem is
/// detected.
pub const O_ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT: Flags = Flags::ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT;

/// Treat what would otherwise be a non-fatal syntax error as a
/// successful scan (the offending region's error output is
/// still emitted, but the overall read status stays okay).
pub const O_TREAT_SYNTAX_ERRORS_AS_SUCCESS: Flags = Flags::TREAT_SYNTAX_ERRORS_AS_SUCCESS;

/// Substitute a non-fatal error's message directly into the
/// output stream, in place of the region that raised it, instead
/// of routing the message to a side error sink and dropping the
/// region's own output entirely. Mirrors the CLI's
/// `--inline-errors` flag setting `errorStream = NULL` in
/// `original_source/src/Main.c`.
pub const O_INLINE_ERRORS: Flags = Flags::INLINE_ERRORS;

bitflags! {
    /// Directives controlling various non-fatal-error and
    /// continuation behaviors of the [`Scanner`](crate::scanner::Scanner).
    /// See each `O_` constant for an explanation of how each
    /// works. Grounded on `PypReaderFlags` in
    /// `original_source/src/PypReader.h`.
    #[derive(Default)]
    pub struct Flags: u32 {
        const ON_UNCLOSED_TAG_ERROR                     = 0b0000_0001;
        const ON_CONTINUATION_UNMATCHED_TAG_ERROR        = 0b0000_0010;
        const ON_CONTINUATION_MISMATCHED_TAG_ERROR       = 0b0000_0100;
        const ON_CONTINUATION_MISMATCHED_TAG_CONTINUE    = 0b0000_1000;
        const ON_CONTINUATION_ALLOW_LATE_ERROR_OUTPUT    = 0b0001_0000;
        const TREAT_SYNTAX_ERRORS_AS_SUCCESS             = 0b0010_0000;
        const INLINE_ERRORS                              = 0b0100_0000;
    }
}
