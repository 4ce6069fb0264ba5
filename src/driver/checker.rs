//! CS-032: Checker. Polls a resource until it reaches an expected state.
//!
//! The first poll fires one period after start. Any fetch error ends the wait
//! immediately; reaching the deadline without a match is a `Timeout`.

use super::{param_int, param_str, require, CallResult, Ctx, DriverError};
use crate::core::log::Logger;
use crate::core::types::Params;
use std::time::{Duration, Instant};

/// Default polling period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// State reported when the resource no longer exists.
pub const NOT_FOUND: &str = "not-found";

pub type Fetch<'a> = Box<dyn FnMut() -> Result<String, DriverError> + 'a>;

pub struct Checker<'a> {
    pub description: String,
    pub timeout: Duration,
    pub frequency: Duration,
    pub fetch: Fetch<'a>,
    pub expect: String,
    pub logger: Logger,
    pub check_name: String,
}

impl<'a> Checker<'a> {
    pub fn new(description: &str, timeout: Duration, expect: &str, fetch: Fetch<'a>) -> Self {
        Checker {
            description: description.to_string(),
            timeout,
            frequency: DEFAULT_PERIOD,
            fetch,
            expect: expect.to_string(),
            logger: Logger::default(),
            check_name: "status".to_string(),
        }
    }

    pub fn frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn check_name(mut self, name: &str) -> Self {
        self.check_name = name.to_string();
        self
    }

    /// Block until the observed state matches or the timeout expires.
    pub fn check(mut self) -> Result<(), DriverError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut next_poll = start + self.frequency;
        loop {
            let now = Instant::now();
            if next_poll > deadline {
                std::thread::sleep(deadline.saturating_duration_since(now));
                return Err(DriverError::Timeout {
                    description: self.description,
                    timeout: self.timeout,
                });
            }
            std::thread::sleep(next_poll.saturating_duration_since(now));
            next_poll += self.frequency;

            let got = (self.fetch)()?;
            if got.eq_ignore_ascii_case(&self.expect) {
                self.logger.verbose(&format!(
                    "{} {} reached {}",
                    self.description, self.check_name, got
                ));
                return Ok(());
            }
            self.logger.info(&format!(
                "{} {} observed {}, expected {}, retry in {:?} (timeout {:?})",
                self.description, self.check_name, got, self.expect, self.frequency, self.timeout
            ));
        }
    }
}

/// Body shared by the `check <entity>` commands taking `id`, `state` and
/// `timeout` (seconds). `states` is the accepted state set; `fetch` receives
/// the resource id. Dry-run only validates.
pub fn await_state<'f, F>(
    ctx: &Ctx<'_>,
    params: &Params,
    states: &[&str],
    mut fetch: F,
) -> CallResult
where
    F: FnMut(&str) -> Result<String, DriverError> + 'f,
{
    require(params, &["id", "state", "timeout"])?;
    let id = param_str(params, "id")?;
    let state = param_str(params, "state")?;
    if !states.iter().any(|s| s.eq_ignore_ascii_case(&state)) {
        return Err(DriverError::invalid(
            "state",
            &format!("one of {}", states.join(", ")),
            format!("got '{}'", state),
        ));
    }
    let timeout = wait_timeout(params)?;
    if ctx.dry_run {
        ctx.logger.verbose(&format!("dry run: {} ok", ctx.command()));
        return Ok(None);
    }
    let description = format!("{} {}", ctx.entity, id);
    Checker::new(&description, timeout, &state, Box::new(move || fetch(&id)))
        .frequency(ctx.settings.poll_period())
        .logger(ctx.logger.clone())
        .check()?;
    Ok(None)
}

/// The `timeout` param as a duration in seconds.
pub fn wait_timeout(params: &Params) -> Result<Duration, DriverError> {
    let secs = param_int(params, "timeout")?;
    if secs < 0 {
        return Err(DriverError::invalid("timeout", "integer", "must not be negative"));
    }
    Ok(Duration::from_secs(secs as u64))
}
