//! The session lifecycle state machine.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::chains::{self, ChainMetadata};
use crate::domain::{
    Address, CallOutcome, Method, MethodCallResult, Session, SessionPhase, SessionSnapshot,
};
use crate::request::{self, GasOracle, NonceOracle};
use crate::transport::{
    ConnectOpts, SessionTransport, TransportError, TransportEvent, TransportFactory,
};
use crate::{Error, Result};

/// Which side of the pairing this controller plays. Supplied explicitly by
/// the caller, never probed from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Generates the pairing URI and proposes the session (the "dapp" peer).
    Initiator,
    /// Consumes the URI and approves or rejects proposals (the "wallet" peer).
    Responder,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Initiator => "initiator",
            Self::Responder => "responder",
        })
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub chain_id: Option<u64>,
    pub accounts: Option<Vec<Address>>,
}

struct Inner {
    /// Bumped on every reset. Results of calls that were in flight across a
    /// reset are detected by comparing against this and discarded.
    epoch: u64,
    transport: Option<Arc<dyn SessionTransport>>,
    session: Session,
}

/// Owns exactly one [`Session`] at a time. Clonable handle; all clones see
/// the same session.
///
/// Transport events must be fed through [`handle_event`](Self::handle_event)
/// one at a time, in delivery order. The controller holds no event queue of
/// its own.
#[derive(Clone)]
pub struct SessionController {
    role: Role,
    factory: Arc<dyn TransportFactory>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionController {
    /// Opens the controller in `role`. A Responder holding a persisted
    /// snapshot resumes the connected session without re-handshaking;
    /// everyone else gets a fresh transport and a new pairing URI.
    pub async fn initialize(
        role: Role,
        factory: Arc<dyn TransportFactory>,
        snapshot: Option<SessionSnapshot>,
    ) -> Result<Self> {
        let controller = Self {
            role,
            factory,
            inner: Arc::new(Mutex::new(Inner {
                epoch: 0,
                transport: None,
                session: Session::default(),
            })),
        };
        match (role, snapshot) {
            (Role::Responder, Some(snapshot)) => controller.restore(snapshot).await?,
            _ => controller.open_fresh().await?,
        }
        Ok(controller)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Snapshot of the current session value.
    pub fn session(&self) -> Result<Session> {
        Ok(self.lock()?.session.clone())
    }

    pub fn epoch(&self) -> Result<u64> {
        Ok(self.lock()?.epoch)
    }

    /// Resume blob for the presentation layer to persist, if the transport
    /// has one.
    pub fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self.lock()?.transport.as_ref().and_then(|t| t.snapshot()))
    }

    /// Re-initializes with a transport scoped to `uri` and awaits handshake
    /// completion. A refused handshake leaves the session Unpaired.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn connect_by_uri(&self, uri: &str) -> Result<()> {
        let uri: crate::PairingUri = uri.parse()?;
        let transport = match self.factory.connect(ConnectOpts::Uri(uri.clone())).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("handshake failed: {e}");
                let mut inner = self.lock()?;
                inner.session.phase = SessionPhase::Unpaired;
                return Err(Error::Handshake(e));
            }
        };
        {
            let mut inner = self.lock()?;
            // new transport identity; in-flight results against the old one
            // are stale
            inner.epoch += 1;
            inner.transport = Some(transport.clone());
            inner.session.phase = SessionPhase::Pairing { uri };
        }
        self.sync_connected(&transport)
    }

    /// Responder-only. Silent no-op unless a session proposal is pending;
    /// the reference behavior never treated a spurious approve as an error.
    pub async fn approve_session(&self, chain_id: u64, accounts: Vec<Address>) -> Result<()> {
        let transport = {
            let inner = self.lock()?;
            if self.role != Role::Responder {
                debug!(role = %self.role, "approve_session is responder-only, ignoring");
                return Ok(());
            }
            match &inner.session.phase {
                SessionPhase::AwaitingApproval { .. } => inner
                    .transport
                    .clone()
                    .ok_or(Error::Precondition("no transport"))?,
                phase => {
                    debug!(%phase, "approve_session with no pending proposal, ignoring");
                    return Ok(());
                }
            }
        };
        transport.approve_session(chain_id, accounts.clone()).await?;
        let mut inner = self.lock()?;
        let peer = match &inner.session.phase {
            SessionPhase::AwaitingApproval { peer } => peer.clone(),
            phase => {
                debug!(%phase, "session moved while approving, not applying");
                return Ok(());
            }
        };
        inner.session.phase = SessionPhase::Connected {
            peer,
            chain_id,
            accounts,
            chain: Self::refresh_chain(chain_id),
        };
        info!(chain_id, "session approved");
        Ok(())
    }

    /// Responder-only counterpart of [`approve_session`](Self::approve_session).
    /// Leaves chain/account context untouched.
    pub async fn reject_session(&self) -> Result<()> {
        let transport = {
            let inner = self.lock()?;
            match &inner.session.phase {
                SessionPhase::AwaitingApproval { .. } => inner
                    .transport
                    .clone()
                    .ok_or(Error::Precondition("no transport"))?,
                phase => {
                    debug!(%phase, "reject_session with no pending proposal, ignoring");
                    return Ok(());
                }
            }
        };
        transport.reject_session().await?;
        let mut inner = self.lock()?;
        if matches!(inner.session.phase, SessionPhase::AwaitingApproval { .. }) {
            inner.session.phase = SessionPhase::Unpaired;
            info!("session proposal rejected");
        }
        Ok(())
    }

    /// Terminates the transport, resets the session and immediately
    /// re-initializes, so the controller is always ready to pair again.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn kill_session(&self) -> Result<()> {
        let transport = self.lock()?.transport.clone();
        if let Some(transport) = transport {
            if let Err(e) = transport.kill_session().await {
                warn!("transport refused kill: {e}");
            }
        }
        self.reset()?;
        self.open_fresh().await
    }

    /// Merges `update` over the current context, pushes the merged value to
    /// the transport and applies it locally.
    pub async fn update_session(&self, update: SessionUpdate) -> Result<()> {
        let (transport, epoch, chain_id, accounts) = {
            let inner = self.lock()?;
            let SessionPhase::Connected {
                chain_id, accounts, ..
            } = &inner.session.phase
            else {
                return Err(Error::Precondition("no connected session to update"));
            };
            (
                inner
                    .transport
                    .clone()
                    .ok_or(Error::Precondition("no transport"))?,
                inner.epoch,
                update.chain_id.unwrap_or(*chain_id),
                update.accounts.unwrap_or_else(|| accounts.clone()),
            )
        };
        transport.update_session(chain_id, accounts.clone()).await?;
        let mut inner = self.lock()?;
        if inner.epoch != epoch {
            debug!("session reset while updating, discarding");
            return Ok(());
        }
        if let SessionPhase::Connected {
            chain_id: current_chain,
            accounts: current_accounts,
            chain,
            ..
        } = &mut inner.session.phase
        {
            *current_chain = chain_id;
            *current_accounts = accounts;
            *chain = Self::refresh_chain(chain_id);
        }
        Ok(())
    }

    /// Single dispatch point for transport events. An `Err` item models a
    /// transport-reported event error and is propagated before any state is
    /// touched.
    #[tracing::instrument(level = "debug", skip(self, event))]
    pub async fn handle_event(
        &self,
        event: std::result::Result<TransportEvent, TransportError>,
    ) -> Result<()> {
        let event = event?;
        debug!(%event, "transport event");
        match event {
            TransportEvent::SessionRequest { peer } => {
                let mut inner = self.lock()?;
                info!(peer = %peer.name, "incoming session proposal");
                inner.session.phase = SessionPhase::AwaitingApproval { peer };
                Ok(())
            }
            TransportEvent::SessionUpdate { chain_id, accounts } => {
                let mut inner = self.lock()?;
                match &mut inner.session.phase {
                    SessionPhase::Connected {
                        chain_id: current_chain,
                        accounts: current_accounts,
                        chain,
                        ..
                    } => {
                        *current_chain = chain_id;
                        *current_accounts = accounts;
                        *chain = Self::refresh_chain(chain_id);
                    }
                    phase => debug!(%phase, "session_update outside connected state, ignoring"),
                }
                Ok(())
            }
            TransportEvent::Connect { chain_id, accounts } => {
                let mut inner = self.lock()?;
                let peer = match &inner.session.phase {
                    SessionPhase::AwaitingApproval { peer } => peer.clone(),
                    _ => inner
                        .transport
                        .as_ref()
                        .and_then(|t| t.peer_metadata())
                        .unwrap_or_default(),
                };
                inner.session.phase = SessionPhase::Connected {
                    peer,
                    chain_id,
                    accounts,
                    chain: Self::refresh_chain(chain_id),
                };
                info!(chain_id, "session connected");
                Ok(())
            }
            TransportEvent::CallRequest(request) => {
                let mut inner = self.lock()?;
                // duplicate ids from a misbehaving peer are kept as separate
                // entries
                inner.session.pending_requests.push_back(request);
                Ok(())
            }
            TransportEvent::Disconnect => {
                info!("peer disconnected");
                self.reset()?;
                self.open_fresh().await
            }
        }
    }

    /// Builds and sends the zero-value self-transfer.
    pub async fn send_value_transfer(
        &self,
        gas: &dyn GasOracle,
        nonces: &dyn NonceOracle,
    ) -> Result<MethodCallResult> {
        let ctx = self.send_context()?;
        let chain = ctx.chain.ok_or(Error::UnknownChain(ctx.chain_id))?;
        let tx = request::value_transfer(&ctx.from, chain, gas, nonces).await?;
        let params = serde_json::to_value([tx])?;
        self.dispatch_call(ctx, Method::SendTransaction, params).await
    }

    pub async fn send_typed_data(&self) -> Result<MethodCallResult> {
        let ctx = self.send_context()?;
        let params = request::typed_data(&ctx.from, ctx.chain_id);
        self.dispatch_call(ctx, Method::SignTypedData, params).await
    }

    pub async fn send_message(&self) -> Result<MethodCallResult> {
        let ctx = self.send_context()?;
        let params = request::message(&ctx.from);
        self.dispatch_call(ctx, Method::Sign, params).await
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Lock)
    }

    /// Clears the session and forgets the transport. Always followed by a
    /// fresh initialize.
    fn reset(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.epoch += 1;
        inner.transport = None;
        inner.session = Session::default();
        debug!(epoch = inner.epoch, "session reset");
        Ok(())
    }

    async fn open_fresh(&self) -> Result<()> {
        let transport = self
            .factory
            .connect(ConnectOpts::Fresh)
            .await
            .map_err(Error::Handshake)?;
        let uri = transport.pairing_uri();
        {
            let mut inner = self.lock()?;
            inner.transport = Some(transport.clone());
            inner.session.phase = match uri {
                Some(uri) => SessionPhase::Pairing { uri },
                None => SessionPhase::Unpaired,
            };
            info!(role = %self.role, phase = %inner.session.phase, "initialized");
        }
        self.sync_connected(&transport)
    }

    async fn restore(&self, snapshot: SessionSnapshot) -> Result<()> {
        let transport = self
            .factory
            .connect(ConnectOpts::Restored(snapshot))
            .await
            .map_err(Error::Handshake)?;
        {
            let mut inner = self.lock()?;
            inner.transport = Some(transport.clone());
        }
        self.sync_connected(&transport)
    }

    /// Evaluates the transport's already-connected flag right after
    /// subscribing, so a connection that completed before we attached is
    /// not lost.
    fn sync_connected(&self, transport: &Arc<dyn SessionTransport>) -> Result<()> {
        if !transport.connected() {
            return Ok(());
        }
        let chain_id = transport.chain_id().unwrap_or(chains::DEFAULT_CHAIN_ID);
        let accounts = transport.accounts();
        let mut inner = self.lock()?;
        let peer = match &inner.session.phase {
            SessionPhase::AwaitingApproval { peer } => peer.clone(),
            _ => transport.peer_metadata().unwrap_or_default(),
        };
        inner.session.phase = SessionPhase::Connected {
            peer,
            chain_id,
            accounts,
            chain: Self::refresh_chain(chain_id),
        };
        info!(chain_id, "transport was already connected");
        Ok(())
    }

    fn refresh_chain(chain_id: u64) -> Option<&'static ChainMetadata> {
        match chains::lookup(chain_id) {
            Ok(chain) => Some(chain),
            Err(_) => {
                warn!(chain_id, "no chain metadata registered");
                None
            }
        }
    }

    fn send_context(&self) -> Result<SendContext> {
        let inner = self.lock()?;
        let SessionPhase::Connected {
            chain_id,
            accounts,
            chain,
            ..
        } = &inner.session.phase
        else {
            return Err(Error::Precondition("no connected session"));
        };
        let from = accounts
            .first()
            .cloned()
            .ok_or(Error::Precondition("no active address"))?;
        Ok(SendContext {
            transport: inner
                .transport
                .clone()
                .ok_or(Error::Precondition("no transport"))?,
            epoch: inner.epoch,
            from,
            chain_id: *chain_id,
            chain: *chain,
        })
    }

    async fn dispatch_call(
        &self,
        ctx: SendContext,
        method: Method,
        params: serde_json::Value,
    ) -> Result<MethodCallResult> {
        let outcome = match ctx.transport.send_method_call(method, params).await {
            Ok(outcome) => outcome,
            // a failed send is recorded, not raised, so the session survives
            Err(e) => CallOutcome::Rejected(e.to_string()),
        };
        let result = MethodCallResult { method, outcome };
        let mut inner = self.lock()?;
        if inner.epoch != ctx.epoch {
            debug!(%method, "session reset while call was in flight, discarding result");
            return Ok(result);
        }
        inner.session.results.push(result.clone());
        Ok(result)
    }
}

struct SendContext {
    transport: Arc<dyn SessionTransport>,
    epoch: u64,
    from: Address,
    chain_id: u64,
    chain: Option<&'static ChainMetadata>,
}
