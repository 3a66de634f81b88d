//! [`CommandBuffer`] – the merged vehicle command.
//!
//! Fragments never replace the command wholesale.  [`CommandBuffer::commit`]
//! lets the caller edit only the fields a fragment owns, then bumps the
//! sequence number, so a sequence increment can never be forgotten or
//! doubled.

use twistgate_types::{Header, VehicleCommand};

/// Persistent accumulator for the latest accepted value of every actuation
/// field.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    command: VehicleCommand,
}

impl CommandBuffer {
    /// A buffer holding [`VehicleCommand::default`] with sequence 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current merged command.
    pub fn current(&self) -> &VehicleCommand {
        &self.command
    }

    /// Restore every actuation field to its documented default:
    /// `linear_velocity_cmd` to the "no target" sentinel, everything else to
    /// zero.
    ///
    /// The sequence number and header are kept.
    pub fn reset(&mut self) {
        let sequence = self.command.sequence;
        let header = std::mem::take(&mut self.command.header);
        self.command = VehicleCommand {
            sequence,
            header,
            ..VehicleCommand::default()
        };
    }

    /// Apply `edit`, restamp the header when the fragment carries one, and
    /// advance the sequence number by exactly one.
    ///
    /// Returns the updated command, ready to be emitted.
    pub fn commit(
        &mut self,
        header: Option<&Header>,
        edit: impl FnOnce(&mut VehicleCommand),
    ) -> &VehicleCommand {
        edit(&mut self.command);
        if let Some(header) = header {
            self.command.header.clone_from(header);
        }
        self.command.sequence += 1;
        &self.command
    }
}
