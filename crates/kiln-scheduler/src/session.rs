//! Live state of one running build.
//!
//! Every mutation happens under one lock and is followed, still under the
//! lock, by a store write and then an event publish. Log lines of a build are
//! therefore observed by the store and the sink in emission order.

use kiln_core::Result;
use kiln_core::build::{Build, BuildStatus};
use kiln_core::events::Event;
use kiln_core::ids::BuildId;
use kiln_core::ports::{BuildStore, EventSink};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Clone)]
pub(crate) struct BuildSession {
    id: BuildId,
    build: Arc<Mutex<Build>>,
    store: Arc<dyn BuildStore>,
    events: Arc<dyn EventSink>,
}

impl BuildSession {
    pub(crate) fn new(build: Build, store: Arc<dyn BuildStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            id: build.id,
            build: Arc::new(Mutex::new(build)),
            store,
            events,
        }
    }

    pub(crate) fn id(&self) -> BuildId {
        self.id
    }

    pub(crate) async fn snapshot(&self) -> Build {
        self.build.lock().await.clone()
    }

    /// Append a line to the build log, then persist and broadcast it.
    pub(crate) async fn log(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let mut build = self.build.lock().await;
        build.push_log(message.clone())?;
        info!(build_id = %self.id, "{}", message);
        self.persist(&build).await;
        self.publish(Event::log(self.id, message)).await;
        Ok(())
    }

    /// Move the build to `status`, then persist and broadcast the new snapshot.
    pub(crate) async fn transition(&self, status: BuildStatus) -> Result<()> {
        let mut build = self.build.lock().await;
        build.transition(status)?;
        info!(build_id = %self.id, status = %status, "Build status changed");
        self.persist(&build).await;
        self.publish(Event::BuildUpdate(build.clone())).await;
        Ok(())
    }

    /// Persist the accumulated state without changing it.
    pub(crate) async fn checkpoint(&self) {
        let build = self.build.lock().await;
        self.persist(&build).await;
    }

    /// Force the build to `failed` with a critical error marker.
    ///
    /// A build that already reached a terminal status is left untouched.
    pub(crate) async fn fail_critically(&self, reason: &str) {
        let mut build = self.build.lock().await;
        if build.is_terminal() {
            return;
        }

        let message = format!("Critical error: {}", reason);
        error!(build_id = %self.id, reason = %reason, "Build driver fault");

        let logged = build.push_log(message.clone()).is_ok();
        if let Err(e) = build.transition(BuildStatus::Failed) {
            // Only pending/running reach here, and both may move to failed.
            error!(build_id = %self.id, error = %e, "Could not force build to failed");
            return;
        }

        self.persist(&build).await;
        if logged {
            self.publish(Event::log(self.id, message)).await;
        }
        self.publish(Event::BuildUpdate(build.clone())).await;
    }

    async fn persist(&self, build: &Build) {
        if let Err(e) = self.store.save(build).await {
            warn!(build_id = %self.id, error = %e, "Failed to persist build");
        }
    }

    async fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.events.publish(event).await {
            warn!(build_id = %self.id, event = name, error = %e, "Failed to publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_core::Error;
    use kiln_core::build::TriggerKind;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        saved: StdMutex<Vec<Build>>,
        events: StdMutex<Vec<Event>>,
        journal: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl BuildStore for Recorder {
        async fn create(&self, build: &Build) -> Result<Build> {
            Ok(build.clone())
        }

        async fn save(&self, build: &Build) -> Result<()> {
            self.saved.lock().unwrap().push(build.clone());
            self.journal.lock().unwrap().push("save".to_string());
            Ok(())
        }

        async fn get(&self, _id: BuildId) -> Result<Option<Build>> {
            Ok(None)
        }

        async fn list(&self, _limit: u32) -> Result<Vec<Build>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl EventSink for Recorder {
        async fn publish(&self, event: Event) -> Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("publish {}", event.name()));
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl BuildStore for Broken {
        async fn create(&self, _build: &Build) -> Result<Build> {
            Err(Error::Database("down".into()))
        }

        async fn save(&self, _build: &Build) -> Result<()> {
            Err(Error::Database("down".into()))
        }

        async fn get(&self, _id: BuildId) -> Result<Option<Build>> {
            Err(Error::Database("down".into()))
        }

        async fn list(&self, _limit: u32) -> Result<Vec<Build>> {
            Err(Error::Database("down".into()))
        }
    }

    #[async_trait]
    impl EventSink for Broken {
        async fn publish(&self, _event: Event) -> Result<()> {
            Err(Error::EventBus("down".into()))
        }
    }

    fn session(recorder: &Arc<Recorder>) -> BuildSession {
        BuildSession::new(
            Build::new(TriggerKind::Manual, "user"),
            recorder.clone(),
            recorder.clone(),
        )
    }

    #[tokio::test]
    async fn test_log_persists_and_broadcasts() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);

        session.log("one").await.unwrap();
        session.log("two").await.unwrap();

        let saved = recorder.saved.lock().unwrap();
        assert_eq!(saved.last().unwrap().logs, vec!["one", "two"]);

        let events = recorder.events.lock().unwrap();
        let messages: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Log(p) => Some(p.message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_every_step_is_saved_before_it_is_published() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);

        session.transition(BuildStatus::Running).await.unwrap();
        session.log("working").await.unwrap();
        session.fail_critically("boom").await;

        let journal = recorder.journal.lock().unwrap();
        assert_eq!(
            *journal,
            vec![
                "save",
                "publish build-update",
                "save",
                "publish log",
                "save",
                "publish log",
                "publish build-update",
            ]
        );
    }

    #[tokio::test]
    async fn test_transition_rejects_backwards_moves() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);

        session.transition(BuildStatus::Running).await.unwrap();
        session.transition(BuildStatus::Success).await.unwrap();
        assert!(session.transition(BuildStatus::Running).await.is_err());
        assert!(session.log("late").await.is_err());

        let build = session.snapshot().await;
        assert_eq!(build.status, BuildStatus::Success);
        assert!(build.end_time.is_some());
    }

    #[tokio::test]
    async fn test_fail_critically() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);
        session.transition(BuildStatus::Running).await.unwrap();

        session.fail_critically("boom").await;

        let build = session.snapshot().await;
        assert_eq!(build.status, BuildStatus::Failed);
        assert!(build.end_time.is_some());
        assert_eq!(build.logs, vec!["Critical error: boom"]);

        let events = recorder.events.lock().unwrap();
        assert!(matches!(events.last(), Some(Event::BuildUpdate(b)) if b.status == BuildStatus::Failed));
    }

    #[tokio::test]
    async fn test_fail_critically_leaves_terminal_build_alone() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);
        session.transition(BuildStatus::Running).await.unwrap();
        session.transition(BuildStatus::Success).await.unwrap();

        session.fail_critically("late fault").await;

        let build = session.snapshot().await;
        assert_eq!(build.status, BuildStatus::Success);
        assert!(build.logs.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failures_do_not_affect_state() {
        let broken = Arc::new(Broken);
        let session = BuildSession::new(
            Build::new(TriggerKind::Manual, "user"),
            broken.clone(),
            broken,
        );

        session.transition(BuildStatus::Running).await.unwrap();
        session.log("still recorded").await.unwrap();
        session.transition(BuildStatus::Success).await.unwrap();

        let build = session.snapshot().await;
        assert_eq!(build.status, BuildStatus::Success);
        assert_eq!(build.logs, vec!["still recorded"]);
    }
}
