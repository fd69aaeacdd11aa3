use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use log::{debug, trace};
use once_cell::sync::Lazy;

use crate::collector;
use crate::env::Env;
use crate::term::Term;

static NEXT_PID: AtomicU64 = AtomicU64::new(1);

/// Mailboxes of every live process, keyed by pid.
static MAILBOXES: Lazy<DashMap<Pid, Sender<Message>>> = Lazy::new(DashMap::new);

/// Process identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u64);

impl Pid {
    pub fn from_raw(raw: u64) -> Self {
        Pid(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<0.{}.0>", self.0)
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A delivered message. `term` is bound to `env`.
#[derive(Debug)]
pub struct Message {
    pub env: Env,
    pub term: Term,
}

/// A lightweight host process: an identity, an environment and a mailbox.
///
/// The process is unregistered when dropped; messages sent afterwards are
/// discarded.
pub struct Process {
    pid: Pid,
    env: Env,
    inbox: Receiver<Message>,
}

impl Process {
    pub fn spawn() -> Self {
        let pid = Pid(NEXT_PID.fetch_add(1, Ordering::Relaxed));
        let (sender, inbox) = channel::unbounded();
        MAILBOXES.insert(pid, sender);
        debug!("Spawned process {}", pid);
        Process {
            pid,
            env: Env::for_process(pid),
            inbox,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Runs `f` on the current thread inside this process's scheduler context.
    pub fn run<R>(&self, f: impl FnOnce(&Env) -> R) -> R {
        let _guard = collector::enter(&self.env);
        f(&self.env)
    }

    /// Waits up to `timeout` for the next message.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<Message> {
        self.inbox.recv_timeout(timeout).ok()
    }

    pub fn try_receive(&self) -> Option<Message> {
        self.inbox.try_recv().ok()
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        MAILBOXES.remove(&self.pid);
        debug!("Process {} exited", self.pid);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process").field("pid", &self.pid).finish()
    }
}

/// True while the process `pid` has not exited.
pub fn is_alive(pid: &Pid) -> bool {
    MAILBOXES.contains_key(pid)
}

/// Sends `msg`, bound to `msg_env`, to the process `to`.
///
/// `caller_env` is the environment of the sending call, or `None` when
/// sending from a thread the host did not create. May be called from any
/// thread. The message is copied into a fresh environment owned by the
/// receiver. Returns `false` if the receiver is not alive.
pub fn send(caller_env: Option<&Env>, to: &Pid, msg_env: &Env, msg: &Term) -> bool {
    // Clone the sender out so no map guard is held while the message moves.
    let sender = match MAILBOXES.get(to) {
        Some(entry) => entry.value().clone(),
        None => {
            trace!("Dropping message {} for dead process {}", msg, to);
            return false;
        }
    };
    if !msg.is_bound_to(msg_env) {
        trace!("Message {} is not bound to its message environment", msg);
    }
    let env = Env::for_message();
    let term = env.copy(msg);
    trace!(
        "Send {} to {} from {:?}",
        term,
        to,
        caller_env.map(Env::id)
    );
    sender.send(Message { env, term }).is_ok()
}
