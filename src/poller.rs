//! Periodic acquisition with stale-but-valid fallback
//!
//! A [`Poller`] owns one data source. Each tick fetches once; on failure it
//! hands back the last good result if there ever was one, and only reports
//! an update failure when nothing has been fetched successfully yet.

use tracing::{debug, error, warn};

use crate::errors::{FetchError, PollError};

/// A fetchable data source (device page, wallbox status, ...)
pub trait Source {
    type Output;

    /// Short label used in log lines.
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<Self::Output, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
}

/// Whether a tick's data was fetched now or replayed from an earlier tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

#[derive(Debug)]
pub struct Polled<'a, T> {
    pub data: &'a T,
    pub freshness: Freshness,
}

pub struct Poller<S: Source> {
    source: S,
    state: PollState,
    last_good: Option<S::Output>,
}

impl<S: Source> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: PollState::Idle,
            last_good: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// True once any fetch has succeeded. Never goes back to false.
    pub fn has_data(&self) -> bool {
        self.last_good.is_some()
    }

    /// Last successfully fetched data, if any.
    pub fn last_good(&self) -> Option<&S::Output> {
        self.last_good.as_ref()
    }

    /// Run one fetch. Ticks are serialized by `&mut self`.
    pub fn tick(&mut self) -> Result<Polled<'_, S::Output>, PollError> {
        self.state = PollState::Fetching;
        let result = self.source.fetch();
        self.state = PollState::Idle;

        match result {
            Ok(data) => {
                debug!("[{}] Update successful", self.source.name());
                let data = self.last_good.insert(data);
                Ok(Polled {
                    data,
                    freshness: Freshness::Fresh,
                })
            }
            Err(e) => match self.last_good.as_ref() {
                Some(data) => {
                    warn!(
                        "[{}] Error during update, using last known good values: {}",
                        self.source.name(),
                        e
                    );
                    Ok(Polled {
                        data,
                        freshness: Freshness::Stale,
                    })
                }
                None => {
                    error!("[{}] No previous data available: {}", self.source.name(), e);
                    Err(PollError::NoPriorData(e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays a fixed script of fetch results.
    struct Scripted {
        results: RefCell<VecDeque<Result<u32, FetchError>>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<u32, FetchError>>) -> Self {
            Self {
                results: RefCell::new(results.into()),
            }
        }
    }

    impl Source for Scripted {
        type Output = u32;

        fn name(&self) -> &str {
            "Scripted"
        }

        fn fetch(&self) -> Result<u32, FetchError> {
            self.results
                .borrow_mut()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn timeout() -> FetchError {
        FetchError::Timeout {
            url: "http://device".to_string(),
        }
    }

    #[test]
    fn test_first_failure_is_surfaced() {
        let mut poller = Poller::new(Scripted::new(vec![Err(timeout()), Ok(1)]));

        let result = poller.tick();
        assert!(matches!(result, Err(PollError::NoPriorData(FetchError::Timeout { .. }))));
        assert!(!poller.has_data());
        assert_eq!(poller.state(), PollState::Idle);

        let polled = poller.tick().unwrap();
        assert_eq!(*polled.data, 1);
        assert_eq!(polled.freshness, Freshness::Fresh);
    }

    #[test]
    fn test_failure_after_success_returns_last_good() {
        let mut results: Vec<Result<u32, FetchError>> = (1..=10).map(Ok).collect();
        results.push(Err(timeout()));
        results.push(Err(FetchError::Status {
            url: "http://device".to_string(),
            status: 500,
        }));
        let mut poller = Poller::new(Scripted::new(results));

        for i in 1..=10 {
            assert_eq!(*poller.tick().unwrap().data, i);
        }

        for _ in 0..2 {
            let polled = poller.tick().unwrap();
            assert_eq!(*polled.data, 10);
            assert_eq!(polled.freshness, Freshness::Stale);
        }
        assert!(poller.has_data());
        assert_eq!(poller.state(), PollState::Idle);
    }

    #[test]
    fn test_success_replaces_previous_data() {
        let mut poller = Poller::new(Scripted::new(vec![Ok(1), Err(timeout()), Ok(3)]));
        poller.tick().unwrap();
        poller.tick().unwrap();
        let polled = poller.tick().unwrap();
        assert_eq!(*polled.data, 3);
        assert_eq!(polled.freshness, Freshness::Fresh);
        assert_eq!(poller.last_good(), Some(&3));
    }
}
