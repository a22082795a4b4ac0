use core::fmt::{self, Display};

use crate::auth::PLAIN;

/// SMTP service extensions advertised in the EHLO response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// AUTH (RFC 4954), `PLAIN` only
    Auth,

    /// SIZE extension (RFC 1870) - Message size declaration and enforcement.
    ///
    /// A declared `SIZE=` larger than the limit is refused at MAIL FROM, and
    /// a body that grows past it is refused once the data is complete. Both
    /// reply `552`. Zero means unlimited.
    Size(usize),
}

impl Display for Extension {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Auth => write!(fmt, "AUTH {PLAIN}"),
            Self::Size(0) => fmt.write_str("SIZE"),
            Self::Size(max) => write!(fmt, "SIZE {max}"),
        }
    }
}
