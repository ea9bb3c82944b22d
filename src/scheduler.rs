//! Batch-scheduler contract and a process-backed local implementation.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

pub type JobId = u64;

/// One alignment job: the command to run and the map file it must produce.
#[derive(Debug, Clone)]
pub struct AlignmentJob {
    pub method: String,
    pub command: Vec<String>,
    pub output: PathBuf,
}

/// Result of handing a job to the scheduler.
#[derive(Debug)]
pub enum SchedulerOutcome {
    Submitted(JobId),
    Failed(String),
}

/// The contract placed on the batch scheduler.
///
/// `wait_all` is the single synchronous barrier of the pipeline: it must not
/// return until every named job has ended. Scheduler failure is reported as
/// an `Err` reason that callers downgrade to a warning.
pub trait Scheduler {
    fn submit(&self, job: AlignmentJob) -> SchedulerOutcome;
    fn wait_all(&self, jobs: &[JobId]) -> Result<(), String>;
    /// Best-effort termination of outstanding jobs.
    fn cancel_all(&self, jobs: &[JobId]);
}

/// Runs alignment jobs as local child processes, stdout redirected to the
/// job's map file. Stands in for a cluster scheduler on a single host.
pub struct LocalScheduler {
    state: Mutex<LocalState>,
}

#[derive(Default)]
struct LocalState {
    next_id: JobId,
    children: BTreeMap<JobId, Child>,
}

impl LocalScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
        }
    }
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for LocalScheduler {
    fn submit(&self, job: AlignmentJob) -> SchedulerOutcome {
        let Some((program, args)) = job.command.split_first() else {
            return SchedulerOutcome::Failed(format!("{}: empty command", job.method));
        };
        let stdout = match File::create(&job.output) {
            Ok(f) => f,
            Err(e) => {
                return SchedulerOutcome::Failed(format!(
                    "{}: cannot create {}: {e}",
                    job.method,
                    job.output.display()
                ));
            }
        };
        match Command::new(program)
            .args(args)
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                let mut state = self.state.lock().expect("scheduler state poisoned");
                state.next_id += 1;
                let id = state.next_id;
                state.children.insert(id, child);
                SchedulerOutcome::Submitted(id)
            }
            Err(e) => SchedulerOutcome::Failed(format!("{}: failed to spawn {program}: {e}", job.method)),
        }
    }

    fn wait_all(&self, jobs: &[JobId]) -> Result<(), String> {
        let mut failures = Vec::new();
        for &id in jobs {
            let child = {
                let mut state = self.state.lock().expect("scheduler state poisoned");
                state.children.remove(&id)
            };
            let Some(mut child) = child else {
                failures.push(format!("job {id}: unknown job id"));
                continue;
            };
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => failures.push(format!("job {id}: exited with {status}")),
                Err(e) => failures.push(format!("job {id}: wait failed: {e}")),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    fn cancel_all(&self, jobs: &[JobId]) {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        for id in jobs {
            if let Some(mut child) = state.children.remove(id) {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
