use twin_reconcile::{ActuatorError, ActuatorPort, Channel, StateVector, CHANNEL_COUNT};

/// Records every write and tracks the resulting output levels.
#[derive(Clone, Debug, Default)]
pub struct RecordingActuator {
    writes: Vec<(Channel, bool)>,
    levels: [bool; CHANNEL_COUNT],
    broken: Option<Channel>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes to `channel` fail with an IO error.
    pub fn break_channel(&mut self, channel: Channel) {
        self.broken = Some(channel);
    }

    pub fn writes(&self) -> &[(Channel, bool)] {
        &self.writes
    }

    /// Levels the outputs are physically at.
    pub fn levels(&self) -> StateVector {
        StateVector::new(self.levels)
    }
}

impl ActuatorPort for RecordingActuator {
    fn write(&mut self, channel: Channel, level: bool) -> Result<(), ActuatorError> {
        self.writes.push((channel, level));
        if self.broken == Some(channel) {
            return Err(ActuatorError::Io(format!("{channel} relay driver not responding")));
        }
        self.levels[channel.index()] = level;
        Ok(())
    }
}
