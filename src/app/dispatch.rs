//! Marshalling host commands onto the owning thread.
//!
//! Command senders may live on any thread. Commands are queued, and the
//! thread that owns the view drains the queue between frames, so the view
//! itself never needs a lock.

use crate::app::commands::{MethodCall, ViewerCommand};
use crate::error::ViewerError;
use serde::de::DeserializeOwned;
use std::sync::mpsc;
use std::time::Duration;

pub fn channel<K>() -> (CommandSender<K>, CommandQueue<K>) {
    let (sender, receiver) = mpsc::channel();
    (CommandSender { sender }, CommandQueue { receiver })
}

/// A command together with the channel its result goes back on.
pub struct PendingCall<K> {
    pub command: ViewerCommand<K>,
    pub reply: mpsc::Sender<Result<(), ViewerError>>,
}

impl<K> PendingCall<K> {
    /// Runs the command through `handler` and sends the result back.
    ///
    /// Returns whether the command succeeded.
    pub fn run_with<F>(self, handler: F) -> bool
    where
        F: FnOnce(ViewerCommand<K>) -> Result<(), ViewerError>,
    {
        let Self { command, reply } = self;
        let result = handler(command);
        let ok = result.is_ok();
        if reply.send(result).is_err() {
            log::debug!("Command caller went away before its reply");
        }
        ok
    }
}

pub struct CommandSender<K> {
    sender: mpsc::Sender<PendingCall<K>>,
}

impl<K> Clone for CommandSender<K> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<K> CommandSender<K> {
    pub fn send(&self, command: ViewerCommand<K>) -> Result<CommandReply, ViewerError> {
        let (reply, receiver) = mpsc::channel();
        self.sender
            .send(PendingCall { command, reply })
            .map_err(|_| ViewerError::ViewClosed)?;
        Ok(CommandReply { receiver })
    }
}

impl<K: DeserializeOwned> CommandSender<K> {
    /// Decodes a raw method call on the calling thread, then queues it.
    pub fn call(&self, call: MethodCall) -> Result<CommandReply, ViewerError> {
        self.send(ViewerCommand::from_call(call)?)
    }
}

/// Handle to the result of one queued command.
#[derive(Debug)]
pub struct CommandReply {
    receiver: mpsc::Receiver<Result<(), ViewerError>>,
}

impl CommandReply {
    /// Blocks until the owning thread handled the command.
    pub fn wait(self) -> Result<(), ViewerError> {
        self.receiver.recv().unwrap_or(Err(ViewerError::ViewClosed))
    }

    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<(), ViewerError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(ViewerError::ViewClosed)),
        }
    }

    /// Non-blocking check; `None` while the command is still queued.
    pub fn try_wait(&self) -> Option<Result<(), ViewerError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ViewerError::ViewClosed)),
        }
    }
}

/// Receiving end, drained by the owning thread.
pub struct CommandQueue<K> {
    receiver: mpsc::Receiver<PendingCall<K>>,
}

impl<K> CommandQueue<K> {
    pub fn try_iter(&self) -> impl Iterator<Item = PendingCall<K>> + '_ {
        self.receiver.try_iter()
    }
}
