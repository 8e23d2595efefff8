//! Session Task Implementation
//!
//! The session task owns the state machine and the dispatcher and serializes
//! UI commands, classified notifications and transport replies through one
//! `tokio::select!` loop. Nothing else mutates the session, so no locking is
//! needed beyond the registry's snapshot swap.

use offlinechat_core::{
    NotificationSource, PeerRegistry, PeerSnapshot, Result, SessionConfig, SessionError,
    SessionState, TransportAdapter,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channels::{create_command_channel, CommandReceiver, CommandSender, SessionCommand};
use crate::dispatcher::NotificationDispatcher;
use crate::machine::SessionStateMachine;

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// Event loop for one discovery session
pub struct SessionTask<A: TransportAdapter, S: NotificationSource> {
    machine: SessionStateMachine<A>,
    dispatcher: NotificationDispatcher<S>,
    command_receiver: CommandReceiver,
    running: bool,
}

impl<A: TransportAdapter, S: NotificationSource> SessionTask<A, S> {
    pub fn new(
        machine: SessionStateMachine<A>,
        dispatcher: NotificationDispatcher<S>,
        command_receiver: CommandReceiver,
    ) -> Self {
        Self {
            machine,
            dispatcher,
            command_receiver,
            running: true,
        }
    }

    /// Run until shutdown or until every command sender is dropped
    pub async fn run(mut self) -> Result<()> {
        info!("Session task starting");

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.process_command(command),
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                input = self.machine.next_input() => {
                    if let Some(input) = input {
                        self.machine.handle_input(input);
                    }
                }
            }
        }

        self.dispatcher.pause();
        self.machine.stop();
        info!("Session task stopped");
        Ok(())
    }

    fn process_command(&mut self, command: SessionCommand) {
        debug!("Processing command {:?}", command);
        match command {
            SessionCommand::Start { local_name } => self.machine.start(&local_name),
            SessionCommand::Stop => self.machine.stop(),
            SessionCommand::Resume => {
                self.dispatcher.resume();
            }
            SessionCommand::Pause => {
                self.dispatcher.pause();
            }
            SessionCommand::SetRadioEnabled(enabled) => self.machine.set_radio_enabled(enabled),
            SessionCommand::Shutdown => self.running = false,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// UI-facing handle to a running session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    command_sender: CommandSender,
    state_receiver: watch::Receiver<SessionState>,
    registry: PeerRegistry,
}

impl SessionHandle {
    pub async fn start(&self, local_name: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::Start {
            local_name: local_name.into(),
        })
        .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop).await
    }

    /// Foreground transition: register for notifications
    pub async fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume).await
    }

    /// Background transition: unregister from notifications
    pub async fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn set_radio_enabled(&self, enabled: bool) -> Result<()> {
        self.send(SessionCommand::SetRadioEnabled(enabled)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }

    pub fn current_state(&self) -> SessionState {
        self.state_receiver.borrow().clone()
    }

    pub fn peer_snapshot(&self) -> PeerSnapshot {
        self.registry.snapshot()
    }

    /// Receiver that observes every readiness change
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_receiver.clone()
    }

    /// Wait until the session state satisfies `predicate`
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut receiver = self.state_receiver.clone();
        loop {
            {
                let state = receiver.borrow_and_update();
                if predicate(&state) {
                    return Ok(state.clone());
                }
            }
            receiver
                .changed()
                .await
                .map_err(|_| SessionError::ChannelClosed)?;
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

// ----------------------------------------------------------------------------
// Spawning
// ----------------------------------------------------------------------------

/// Validate `config`, wire up a session over `adapter` and `source`, and spawn its task
///
/// The session starts stopped and unsubscribed; the UI drives it with
/// `resume` and `start`.
pub fn spawn_session<A, S>(
    adapter: A,
    source: S,
    config: SessionConfig,
) -> Result<(SessionHandle, JoinHandle<Result<()>>)>
where
    A: TransportAdapter + 'static,
    S: NotificationSource + 'static,
{
    config.validate()?;

    let registry = PeerRegistry::new();
    let machine = SessionStateMachine::new(adapter, registry.clone(), config.clone());
    let dispatcher = NotificationDispatcher::new(source, machine.inbox(), config.resync_on_resume);
    let (command_sender, command_receiver) = create_command_channel(&config);

    let handle = SessionHandle {
        command_sender,
        state_receiver: machine.subscribe_state(),
        registry,
    };

    let task = SessionTask::new(machine, dispatcher, command_receiver);
    let join = tokio::spawn(task.run());
    Ok((handle, join))
}
