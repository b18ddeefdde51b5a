//! Actuator that logs each write and remembers the commanded level.
//!
//! The daemon has no relay driver; this is what the loop drives instead.

use tracing::info;
use twin_reconcile::{ActuatorError, ActuatorPort, Channel, StateVector, CHANNEL_COUNT};

#[derive(Debug, Default)]
pub struct LoggingActuator {
    levels: [bool; CHANNEL_COUNT],
    writes: u64,
}

impl LoggingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> StateVector {
        StateVector::new(self.levels)
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl ActuatorPort for LoggingActuator {
    fn write(&mut self, channel: Channel, level: bool) -> Result<(), ActuatorError> {
        let slot = self
            .levels
            .get_mut(channel.index())
            .ok_or(ActuatorError::ChannelOutOfRange(channel.index()))?;
        *slot = level;
        self.writes += 1;
        info!(%channel, level, "output driven");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_updates_level() {
        let mut a = LoggingActuator::new();
        a.write(Channel::new(3).unwrap(), true).unwrap();
        assert_eq!(a.levels(), StateVector::new([false, false, false, true]));
        assert_eq!(a.writes(), 1);
    }
}
