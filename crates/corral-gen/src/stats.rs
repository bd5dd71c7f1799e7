//! Run statistics: aggregate counters plus per-iteration CSV rows.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Counters and timings accumulated over the whole run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub iterations: usize,
    pub start_states: usize,
    pub unsafe_paths: usize,
    pub unsafe_states_tested: usize,
    pub unsafe_states_verified: usize,
    pub dead_ends: usize,
    pub cycles: usize,
    pub total_testing_time: Duration,
    pub total_verification_time: Duration,
    pub total_refining_time: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        RunStats::default()
    }

    pub fn log_summary(&self) {
        info!(
            iterations = self.iterations,
            start_states = self.start_states,
            unsafe_paths = self.unsafe_paths,
            unsafe_states_tested = self.unsafe_states_tested,
            unsafe_states_verified = self.unsafe_states_verified,
            dead_ends = self.dead_ends,
            cycles = self.cycles,
            "run counters"
        );
        info!(
            testing_secs = self.total_testing_time.as_secs_f64(),
            verification_secs = self.total_verification_time.as_secs_f64(),
            refining_secs = self.total_refining_time.as_secs_f64(),
            "run timings"
        );
    }
}

/// Per-iteration CSV sink. One row per iteration; the header is
/// emitted on the first write and fields reset after every row.
pub struct IterationStats {
    writer: BufWriter<File>,
    header_written: bool,
    iteration: usize,
    mode: &'static str,
    unsafe_states: usize,
    search_time: f64,
    refining_time: f64,
    unsafety_eval: f64,
    sampling_time_limit_reached: usize,
    box_size: f64,
    start_condition_safe: &'static str,
}

impl IterationStats {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(IterationStats {
            writer: BufWriter::new(File::create(path)?),
            header_written: false,
            iteration: 0,
            mode: "",
            unsafe_states: 0,
            search_time: 0.0,
            refining_time: 0.0,
            unsafety_eval: 0.0,
            sampling_time_limit_reached: 0,
            box_size: 0.0,
            start_condition_safe: "UNKNOWN",
        })
    }

    pub fn testing_iteration(&mut self) {
        self.mode = "Testing";
    }

    pub fn verification_iteration(&mut self) {
        self.mode = "Verification";
    }

    pub fn set_start_condition_status(&mut self, safe: bool) {
        self.mode = "Start_Checking";
        self.start_condition_safe = if safe { "SAFE" } else { "NOT_SAFE" };
    }

    pub fn set_unsafe_states(&mut self, count: usize) {
        self.unsafe_states = count;
    }

    pub fn set_search_time(&mut self, elapsed: Duration) {
        self.search_time = elapsed.as_secs_f64();
    }

    pub fn set_refining_time(&mut self, elapsed: Duration) {
        self.refining_time = elapsed.as_secs_f64();
    }

    pub fn set_unsafety_eval(&mut self, elapsed: Duration) {
        self.unsafety_eval = elapsed.as_secs_f64();
    }

    pub fn set_sampling_time_limit_reached(&mut self, count: usize) {
        self.sampling_time_limit_reached = count;
    }

    pub fn set_box_size(&mut self, size: f64) {
        self.box_size = size;
    }

    /// Write the current row and reset for the next iteration.
    pub fn flush_row(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(
                self.writer,
                "Iteration,IterationMode,UnsafeStates,SearchTime,RefiningTime,\
                 UnsafetyEval,SamplingTimeLimitReached,BoxSize,StartConditionSafe"
            )?;
            self.header_written = true;
        }
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{}",
            self.iteration,
            self.mode,
            self.unsafe_states,
            self.search_time,
            self.refining_time,
            self.unsafety_eval,
            self.sampling_time_limit_reached,
            self.box_size,
            self.start_condition_safe,
        )?;
        self.writer.flush()?;

        self.iteration += 1;
        self.mode = "";
        self.unsafe_states = 0;
        self.search_time = 0.0;
        self.refining_time = 0.0;
        self.unsafety_eval = 0.0;
        self.sampling_time_limit_reached = 0;
        self.box_size = 0.0;
        self.start_condition_safe = "UNKNOWN";
        Ok(())
    }
}
