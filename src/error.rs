#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    OOB,
    FrameBroken,
    FrameCRCError,
    PortClosed,
    WriteFailed,
    InvalidUnit,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &str = match self {
            ErrorKind::OOB => "OUT OF BUFFER",
            ErrorKind::FrameBroken => "FRAME BROKEN",
            ErrorKind::FrameCRCError => "FRAME CRC ERROR",
            ErrorKind::PortClosed => "PORT CLOSED",
            ErrorKind::WriteFailed => "WRITE FAILED OR INCOMPLETE",
            ErrorKind::InvalidUnit => "REGISTER UNIT NOT USABLE FOR REQUEST",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ErrorKind {}
