/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::{error::Error as StdError, fmt};

/// Errors raised while assembling a user tag grammar, before
/// any scanning takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarError
{
    /// Two tags with identical `(text, arbitraryChars)` were
    /// added to the same [`TagGroup`](super::TagGroup)
    DuplicateTag,
}

impl fmt::Display for GrammarError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            GrammarError::DuplicateTag =>
            {
                f.write_str("two identical tags were added to the same tag group")
            },
        }
    }
}

impl StdError for GrammarError {}

impl From<GrammarError> for crate::error::Error
{
    fn from(err: GrammarError) -> Self
    {
        use crate::error::internal::{Error as Internal, ErrorCode};

        let code = match err
        {
            GrammarError::DuplicateTag => ErrorCode::DuplicateTag,
        };

        Internal::new(code).into()
    }
}
