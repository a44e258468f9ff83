//! Error type for lookups.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::error;
use std::fmt::{Display, Formatter};

use domain::base::iana::Rcode;
use domain::base::name::FromStrError;
use domain::base::wire::ParseError;
use domain::net::client::request;

/// An error happened while performing a lookup.
///
/// The client transport keeps retrying when it cannot connect to the
/// provider, so dial and TLS handshake failures surface as [Error::Timeout].
#[derive(Clone, Debug)]
pub enum Error {
    /// The name to look up is not a valid domain name.
    InvalidName(FromStrError),

    /// Sending the query or receiving the response failed.
    Request(request::Error),

    /// The response could not be parsed.
    Parse(ParseError),

    /// The server answered with an error response code.
    Rcode(Rcode),

    /// The answer did not contain any addresses.
    NoAddresses,

    /// No response arrived in time.
    Timeout,
}

//--- From

impl From<FromStrError> for Error {
    fn from(err: FromStrError) -> Self {
        Error::InvalidName(err)
    }
}

impl From<request::Error> for Error {
    fn from(err: request::Error) -> Self {
        Error::Request(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

//--- Display and Error

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::InvalidName(err) => write!(f, "invalid name: {err}"),
            Error::Request(err) => write!(f, "request failed: {err}"),
            Error::Parse(err) => write!(f, "malformed response: {err}"),
            Error::Rcode(rcode) => {
                write!(f, "server responded with {rcode}")
            }
            Error::NoAddresses => write!(f, "no addresses found"),
            Error::Timeout => write!(f, "query timed out"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Request(err) => Some(err),
            _ => None,
        }
    }
}
