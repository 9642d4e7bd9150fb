use crate::model::RunType;

/// Run bookkeeping. The run number only ever goes up, one per started run.
#[derive(Debug, Clone, Default)]
pub struct RunManager {
    run_number: u64,
    run_type: RunType,
}

impl RunManager {
    pub fn current_run_number(&self) -> u64 {
        self.run_number
    }

    pub fn current_run_type(&self) -> RunType {
        self.run_type
    }

    pub fn begin_run(&mut self) {
        self.run_number += 1;
        self.run_type = RunType::Test;
    }

    pub fn end_run(&mut self) {
        self.run_type = RunType::Stopped;
    }
}
