use super::Locker;
use crate::error::{LockError, Result};
use crate::retry::{retry, CancelToken, RetryPolicy};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use tracing::debug;

/// Lock held by a listening TCP socket on a loopback port.
///
/// Only one socket can listen on an address at a time, and the OS closes it
/// when the owner dies, so the lock is crash-safe and needs no shared
/// filesystem. Cooperating processes must agree on the port number. The socket
/// never accepts connections.
#[derive(Debug)]
pub struct PortLock {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl PortLock {
    /// Lock on `127.0.0.1:port`. No I/O happens until the lock is taken.
    pub fn new(port: u16) -> Self {
        Self::with_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    /// Lock on an explicit address, e.g. `[::1]:port`
    pub fn with_addr(addr: SocketAddr) -> Self {
        PortLock {
            addr,
            listener: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_locked(&self) -> bool {
        self.listener.is_some()
    }

    /// Address actually bound while the lock is held
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl Locker for PortLock {
    /// Spin until the port can be bound, sleeping 1s, 1.2s, 1.44s, ... between tries.
    fn lock(&mut self) -> Result<()> {
        self.lock_with(&RetryPolicy::port(), None)
    }

    fn try_lock(&mut self) -> Result<bool> {
        if self.listener.is_some() {
            return Ok(true);
        }

        match TcpListener::bind(self.addr) {
            Ok(listener) => {
                self.listener = Some(listener);
                debug!("Lock acquired: port {}", self.addr);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(false),
            Err(e) => Err(LockError::Bind {
                addr: self.addr,
                source: e,
            }),
        }
    }

    /// Close the listener. Does nothing if the lock is not held.
    fn unlock(&mut self) -> Result<()> {
        if let Some(listener) = self.listener.take() {
            drop(listener);
            debug!("Lock released: port {}", self.addr);
        }
        Ok(())
    }

    fn target(&self) -> String {
        format!("port {}", self.addr)
    }

    /// Every bind failure counts as "busy" here, not only address-in-use.
    fn lock_with(&mut self, policy: &RetryPolicy, cancel: Option<&CancelToken>) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let addr = self.addr;
        let listener = retry(&self.target(), policy, cancel, || match TcpListener::bind(addr) {
            Ok(listener) => Ok(Some(listener)),
            Err(e) => {
                debug!("Spinning lock on {} ({})", addr, e);
                Ok(None)
            }
        })?;
        self.listener = Some(listener);
        Ok(())
    }
}
