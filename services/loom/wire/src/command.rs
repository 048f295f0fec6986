//! Command, response, and file target codes.

use std::fmt;

/// Commands sent by the mobile application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Network name for a station-mode join
    ConnectWifi,
    /// Network password; triggers the join
    SendWifiPassword,
    /// Poll the network join status
    ConfirmWifiConnection,
    /// Report both file targets
    GetFileStatus,
    /// Open a file target for the bulk channel
    StartFileTransfer,
    /// Close the open file target
    EndFileTransfer,
    /// Pick value parameter (no handler)
    SetPickValue,
    /// Spindle speed parameter (no handler)
    SetRpm,
    /// Any other command byte
    Unknown(u8),
}

impl Command {
    /// Whether the dispatcher has a handler for this command
    pub fn is_handled(self) -> bool {
        !matches!(
            self,
            Command::SetPickValue | Command::SetRpm | Command::Unknown(_)
        )
    }
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        match value {
            0x10 => Command::ConnectWifi,
            0x11 => Command::SendWifiPassword,
            0x12 => Command::ConfirmWifiConnection,
            0x13 => Command::GetFileStatus,
            0x14 => Command::StartFileTransfer,
            0x15 => Command::EndFileTransfer,
            0x16 => Command::SetPickValue,
            0x17 => Command::SetRpm,
            other => Command::Unknown(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        match command {
            Command::ConnectWifi => 0x10,
            Command::SendWifiPassword => 0x11,
            Command::ConfirmWifiConnection => 0x12,
            Command::GetFileStatus => 0x13,
            Command::StartFileTransfer => 0x14,
            Command::EndFileTransfer => 0x15,
            Command::SetPickValue => 0x16,
            Command::SetRpm => 0x17,
            Command::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self, u8::from(*self))
    }
}

/// One-byte status carried by replies
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// Success
    Success = 0x00,
    /// Declared length did not match the frame
    LengthMismatch = 0x01,
    /// Payload checksum did not match
    ChecksumFailed = 0x02,
    /// Command has no handler (only sent with explicit errors enabled)
    UnknownCommand = 0x03,
    /// File target could not be opened (only sent with explicit errors enabled)
    TransferRejected = 0x04,
}

impl TryFrom<u8> for ResponseCode {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ResponseCode::Success),
            0x01 => Ok(ResponseCode::LengthMismatch),
            0x02 => Ok(ResponseCode::ChecksumFailed),
            0x03 => Ok(ResponseCode::UnknownCommand),
            0x04 => Ok(ResponseCode::TransferRejected),
            _ => Err(crate::WireError::Code(value)),
        }
    }
}

/// File target categories selectable by start-file-transfer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Fabric body pattern
    Body = 0x01,
    /// Fabric border pattern
    Border = 0x02,
}

impl TargetKind {
    /// Both categories in status-report order
    pub const ALL: [TargetKind; 2] = [TargetKind::Body, TargetKind::Border];
}

impl TryFrom<u8> for TargetKind {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(TargetKind::Body),
            0x02 => Ok(TargetKind::Border),
            _ => Err(crate::WireError::Target(value)),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Body => f.write_str("BODY"),
            TargetKind::Border => f.write_str("BORDER"),
        }
    }
}
