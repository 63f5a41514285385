use super::CounterBackup;

/// Store used when no backup directory is configured; every call is inert.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounterBackup;

impl CounterBackup for NoopCounterBackup {
    fn persist(&self, _name: &str, _value: i64) {}

    fn get(&self, _name: &str) -> i64 {
        0
    }

    fn cleanup(&self, _days_to_keep: u32) {}
}
