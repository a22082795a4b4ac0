use core::fmt::{self, Display, Formatter};

/// SMTP reply codes used by the relay
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    ServiceReady = 220,
    GoodBye = 221,
    AuthSuccess = 235,
    Ok = 250,
    AuthContinue = 334,
    StartMailInput = 354,
    Unavailable = 421,
    ActionUnavailable = 451,
    SyntaxError = 500,
    ArgumentError = 501,
    NotImplemented = 502,
    InvalidCommandSequence = 503,
    MechanismUnsupported = 504,
    AuthRequired = 530,
    AuthFailed = 535,
    ExceededStorage = 552,
}

impl Status {
    /// Checks if the status is a permanent rejection
    pub const fn is_permanent(self) -> bool {
        self.code() >= 500
    }

    /// Checks if the status is a temporary rejection
    pub const fn is_temporary(self) -> bool {
        self.code() >= 400 && self.code() < 500
    }

    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        value.code()
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.code())
    }
}
