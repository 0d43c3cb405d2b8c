//! ContractBinder: session-scoped, memoized contract handles.
//!
//! A binding holds only a weak reference to its session. Once the session is
//! released every operation on the binding fails with [`BindingError::Stale`].

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use relaypay_types::{CallRequest, SessionId, Submission, WalletProvider};
use thiserror::Error;

use crate::abi::ContractInterface;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("{interface} binding at {address} belongs to closed session {session_id}")]
    Stale {
        interface: &'static str,
        address: Address,
        session_id: SessionId,
    },
}

/// Provider plus identity of one open session. Owned by the session; bindings
/// only ever see it through a `Weak`.
pub(crate) struct SessionCore<P> {
    pub(crate) id: SessionId,
    pub(crate) provider: P,
}

/// Sender and transferred value for a state-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub from: Address,
    pub value: U256,
}

struct BindingInner<P> {
    interface: &'static str,
    address: Address,
    session_id: SessionId,
    session: Weak<SessionCore<P>>,
}

/// Callable handle for interface `I` deployed at a fixed address.
pub struct ContractBinding<I, P> {
    inner: Rc<BindingInner<P>>,
    _interface: PhantomData<fn() -> I>,
}

impl<I, P> Clone for ContractBinding<I, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            _interface: PhantomData,
        }
    }
}

impl<I, P> fmt::Debug for ContractBinding<I, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBinding")
            .field("interface", &self.inner.interface)
            .field("address", &self.inner.address)
            .field("session_id", &self.inner.session_id)
            .field("stale", &self.is_stale())
            .finish()
    }
}

impl<I, P> ContractBinding<I, P> {
    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    pub fn is_stale(&self) -> bool {
        self.inner.session.strong_count() == 0
    }

    /// True when both handles are the same memoized binding.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn live_session(&self) -> Result<Rc<SessionCore<P>>, BindingError> {
        self.inner.session.upgrade().ok_or(BindingError::Stale {
            interface: self.inner.interface,
            address: self.inner.address,
            session_id: self.inner.session_id,
        })
    }
}

impl<I, P> ContractBinding<I, P>
where
    I: ContractInterface,
    P: WalletProvider,
{
    /// ABI-encodes `call` without sending it.
    pub fn encode(&self, call: impl Into<I::Calls>) -> Result<Bytes, BindingError> {
        self.live_session()?;
        Ok(Bytes::from(call.into().abi_encode()))
    }

    /// Sends `call` to the bound address through the session's provider.
    pub fn send(
        &self,
        call: impl Into<I::Calls>,
        options: SendOptions,
    ) -> Result<Submission, BindingError> {
        let session = self.live_session()?;
        let request = CallRequest {
            from: options.from,
            to: self.inner.address,
            value: options.value,
            input: Bytes::from(call.into().abi_encode()),
        };
        Ok(session.provider.send_transaction(request))
    }
}

/// Produces bindings for one session, one per (interface, address).
pub struct ContractBinder<P> {
    session: Weak<SessionCore<P>>,
    session_id: SessionId,
    cache: HashMap<(TypeId, Address), Rc<BindingInner<P>>>,
}

impl<P> ContractBinder<P> {
    pub(crate) fn new(session: &Rc<SessionCore<P>>) -> Self {
        Self {
            session: Rc::downgrade(session),
            session_id: session.id,
            cache: HashMap::new(),
        }
    }

    pub fn bind<I: ContractInterface>(&mut self, address: Address) -> ContractBinding<I, P> {
        let session = &self.session;
        let session_id = self.session_id;
        let inner = self
            .cache
            .entry((TypeId::of::<I>(), address))
            .or_insert_with(|| {
                Rc::new(BindingInner {
                    interface: I::NAME,
                    address,
                    session_id,
                    session: Weak::clone(session),
                })
            });
        ContractBinding {
            inner: Rc::clone(inner),
            _interface: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
