use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{self, Instant},
};

use common::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Stops the heartbeat whenever the actor wrapper ends, aborted or not.
struct HeartbeatGuard(JoinHandle<()>);

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    /// Crashed actors waiting for the next check tick.
    pending_restarts: Vec<ActorType>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            pending_restarts: Vec::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let timeout_duration = Duration::from_secs(3);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if self.handles.contains_key(&actor_type) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            if let Some(handle) = self.handles.remove(&actor_type) {
                                handle.abort();
                            }
                        }
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                        }
                        ControlMessage::Crashed(actor_type, error_msg) => {
                            error!("Actor {:?} crashed: {}", actor_type, error_msg);
                            self.pulses.remove(&actor_type);
                            self.handles.remove(&actor_type);
                            if !self.pending_restarts.contains(&actor_type) {
                                self.pending_restarts.push(actor_type);
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let dead_timeout = Instant::now() - timeout_duration;

                    let mut restarts = std::mem::take(&mut self.pending_restarts);
                    for (key, &value) in self.pulses.iter() {
                        if value < dead_timeout {
                            warn!("{:?} is unresponsive!", key);
                            if let Some(handle) = self.handles.get(key) {
                                handle.abort();
                            }
                            restarts.push(*key);
                        }
                    }

                    for actor_type in restarts {
                        info!("Restarting {:?}", actor_type);
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };
        let mut new_actor = factory();
        let new_actor_handle = tokio::spawn(async move {
            let actor_id = new_actor.id();
            let heartbeat = HeartbeatGuard(new_actor.spawn_heartbeat(tx.clone()));

            // The run loop gets its own task so a panic surfaces as a JoinError.
            // Dropping the set on abort takes the run loop down with it.
            let mut run = JoinSet::new();
            let run_tx = tx.clone();
            run.spawn(async move { new_actor.run(run_tx).await });
            let result = run.join_next().await;
            drop(heartbeat);

            let msg = match result {
                Some(Ok(Ok(()))) => ControlMessage::Shutdown(actor_type),
                Some(Ok(Err(e))) => {
                    ControlMessage::Crashed(actor_type, format!("{} ({})", e, actor_id))
                }
                Some(Err(e)) => {
                    ControlMessage::Crashed(actor_type, format!("{} ({})", e, actor_id))
                }
                None => {
                    ControlMessage::Crashed(actor_type, format!("run loop missing ({})", actor_id))
                }
            };
            let _ = tx.send(msg).await;
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FailingActor;

    #[async_trait]
    impl Actor for FailingActor {
        fn name(&self) -> ActorType {
            ActorType::OrchestratorActor
        }

        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct PanickingActor;

    #[async_trait]
    impl Actor for PanickingActor {
        fn name(&self) -> ActorType {
            ActorType::OrchestratorActor
        }

        fn id(&self) -> Uuid {
            Uuid::nil()
        }

        async fn run(&mut self, _tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            panic!("run loop panicked")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_actor_is_restarted() {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();

        let mut supervisor = Supervisor::new();
        supervisor.register_actor(
            ActorType::OrchestratorActor,
            Box::new(move || -> Box<dyn Actor> {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(PanickingActor)
            }),
        );

        let _ = time::timeout(Duration::from_secs(5), supervisor.start()).await;

        assert!(starts.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_actor_is_restarted() {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();

        let mut supervisor = Supervisor::new();
        supervisor.register_actor(
            ActorType::OrchestratorActor,
            Box::new(move || -> Box<dyn Actor> {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(FailingActor)
            }),
        );

        let _ = time::timeout(Duration::from_secs(5), supervisor.start()).await;

        assert!(starts.load(Ordering::SeqCst) >= 3);
    }
}
