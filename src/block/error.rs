/*
 * This Source Code Form is subject to the terms of the
 * Mozilla Public License, v. 2.0. If a copy of the MPL
 * was not distributed with this file, You can obtain one at http://mozilla.org/MPL/2.0/.
 */

use std::{error::Error as StdError, fmt, io};

/// Errors raised while pulling bytes from the underlying
/// source through a [`BlockReader`](super::BlockReader).
#[derive(Debug)]
pub enum BlockError
{
    /// The underlying `std::io::Read` source returned an error
    Io(io::Error),
}

impl fmt::Display for BlockError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            BlockError::Io(e) => write!(f, "failed to read from the input stream: {}", e),
        }
    }
}

impl StdError for BlockError
{
    fn source(&self) -> Option<&(dyn StdError + 'static)>
    {
        match self
        {
            BlockError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for BlockError
{
    fn from(e: io::Error) -> Self
    {
        BlockError::Io(e)
    }
}

impl From<BlockError> for crate::error::Error
{
    fn from(err: BlockError) -> Self
    {
        use crate::error::internal::{Error as Internal, SourceError};

        match err
        {
            BlockError::Io(e) => Internal::new(SourceError::from(e)).into(),
        }
    }
}
