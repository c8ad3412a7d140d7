//! Ordered process group.
//!
//! # Responsibilities
//! - Start members in registration order
//! - Wait for the first member to exit or for an external stop signal
//! - Stop the remaining members in reverse order, one at a time
//! - Surface the first member error

use std::future::Future;

use futures_util::future::{select_all, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type MemberFuture = BoxFuture<'static, Result<(), BoxError>>;
type StartFn = Box<dyn FnOnce(broadcast::Receiver<()>) -> MemberFuture + Send>;

/// A supervised member failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{name} exited with error: {source}")]
    Member {
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{name} panicked: {reason}")]
    Panicked { name: &'static str, reason: String },
}

impl Error {
    pub fn member(&self) -> &'static str {
        match self {
            Error::Member { name, .. } | Error::Panicked { name, .. } => *name,
        }
    }
}

struct Member {
    name: &'static str,
    start: StartFn,
}

struct Running {
    name: &'static str,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), BoxError>>,
}

#[derive(Default)]
pub struct Supervisor {
    members: Vec<Member>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member. `start` receives the member's own shutdown handle.
    pub fn member<F, Fut, E>(mut self, name: &'static str, start: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.members.push(Member {
            name,
            start: Box::new(move |shutdown| -> MemberFuture {
                start(shutdown).map(|result| result.map_err(Into::into)).boxed()
            }),
        });
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.members.iter().map(|m| m.name).collect()
    }

    /// Run until a member exits or SIGINT/SIGTERM arrives.
    pub async fn run(self) -> Result<(), Error> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until a member exits or `stop` resolves.
    pub async fn run_until<S>(self, stop: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let mut running: Vec<Running> = Vec::with_capacity(self.members.len());
        for member in self.members {
            let shutdown = Shutdown::new();
            let handle = tokio::spawn((member.start)(shutdown.subscribe()));
            tracing::info!(member = member.name, "member started");
            running.push(Running {
                name: member.name,
                shutdown,
                handle,
            });
        }

        if running.is_empty() {
            return Ok(());
        }

        let exited = tokio::select! {
            (result, index, _) = select_all(running.iter_mut().map(|m| &mut m.handle)) => Some((index, result)),
            _ = stop => None,
        };

        let mut first_error = None;
        match exited {
            Some((index, result)) => {
                let name = running.remove(index).name;
                match member_outcome(name, result) {
                    Ok(()) => tracing::info!(member = name, "member exited"),
                    Err(e) => {
                        tracing::error!(member = name, error = %e, "member failed");
                        first_error = Some(e);
                    }
                }
            }
            None => tracing::info!("stop requested"),
        }

        while let Some(member) = running.pop() {
            tracing::info!(member = member.name, "stopping member");
            member.shutdown.trigger();
            if let Err(e) = member_outcome(member.name, member.handle.await) {
                tracing::error!(member = member.name, error = %e, "member failed while stopping");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("all members stopped");
        first_error.map_or(Ok(()), Err)
    }
}

fn member_outcome(
    name: &'static str,
    result: Result<Result<(), BoxError>, tokio::task::JoinError>,
) -> Result<(), Error> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(Error::Member { name, source }),
        Err(e) => Err(Error::Panicked {
            name,
            reason: e.to_string(),
        }),
    }
}
