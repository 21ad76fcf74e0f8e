// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: Copyright The Tessera Authors

use snafu::{Location, Snafu};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid user input: {source}, {location}"))]
    InvalidInput {
        source: BoxedError,
        location: Location,
    },
    #[snafu(display("Not supported: {source}, {location}"))]
    NotSupported {
        source: BoxedError,
        location: Location,
    },
    #[snafu(display("Schema error: {message}, {location}"))]
    Schema { message: String, location: Location },
    #[snafu(display("Encountered internal error. Please file a bug report at https://github.com/tessera-io/tessera/issues. {message}, {location}"))]
    Internal { message: String, location: Location },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(source: impl Into<BoxedError>, location: Location) -> Self {
        let source: BoxedError = source.into();
        Self::InvalidInput { source, location }
    }

    pub fn not_supported(source: impl Into<BoxedError>, location: Location) -> Self {
        let source: BoxedError = source.into();
        Self::NotSupported { source, location }
    }
}
